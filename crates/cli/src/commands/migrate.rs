use crate::commands::{run_with_pool, CommandError, CommandResult};

/// The shared runner already connects and applies pending migrations; the
/// body has nothing left to do.
pub fn run() -> CommandResult {
    match run_with_pool("migrate", |_config, _pool| async { Ok::<_, CommandError>(()) }) {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
