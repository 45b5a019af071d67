use crate::commands::{run_with_pool, CommandResult};
use deskline_db::{SqlTurnRepository, TurnRepository};

pub fn run(limit: u32) -> CommandResult {
    let result = run_with_pool("turns", |_config, pool| async move {
        let repository = SqlTurnRepository::new(pool);
        repository
            .list_turns(limit.clamp(1, 500))
            .await
            .map_err(|error| ("storage", error.to_string(), 6u8))
    });

    match result {
        Ok(turns) => match serde_json::to_string(&turns) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("turns", "serialization", error.to_string(), 1),
        },
        Err(failure) => failure,
    }
}
