use deskline_core::domain::PolicyVariant;
use deskline_core::routing::ResponseKind;

/// Response-style bundle for one policy variant: a system prompt plus one
/// instruction per handler.
pub struct VariantPrompts {
    pub system: &'static str,
    pub technical: &'static str,
    pub billing: &'static str,
    pub general: &'static str,
}

/// Variant A: concise and to the point.
static VARIANT_A: VariantPrompts = VariantPrompts {
    system: "You are a concise, accurate customer support agent. Ask a single clarifying \
             question if needed.",
    technical: "Provide a clear technical troubleshooting response with steps, checks, and next \
                actions.",
    billing: "Provide a billing support response. Be precise, confirm billing identifiers \
              needed, and propose next steps.",
    general: "Provide a friendly, clear general support response.",
};

/// Variant B: empathy first, then the fix.
static VARIANT_B: VariantPrompts = VariantPrompts {
    system: "You are an empathetic customer support agent. Acknowledge feelings, then solve. \
             Keep it brief.",
    technical: "Start with a short empathy line, then troubleshooting steps. End with an offer \
                to escalate.",
    billing: "Start with a short empathy line, then explain policy and next steps. End with an \
              escalation option.",
    general: "Start with empathy, then answer and link to next action.",
};

pub fn prompts_for(variant: PolicyVariant) -> &'static VariantPrompts {
    match variant {
        PolicyVariant::A => &VARIANT_A,
        PolicyVariant::B => &VARIANT_B,
    }
}

pub fn instruction(variant: PolicyVariant, kind: ResponseKind) -> &'static str {
    let prompts = prompts_for(variant);
    match kind {
        ResponseKind::Technical => prompts.technical,
        ResponseKind::Billing => prompts.billing,
        ResponseKind::General => prompts.general,
    }
}

#[cfg(test)]
mod tests {
    use deskline_core::domain::PolicyVariant;
    use deskline_core::routing::ResponseKind;

    use super::{instruction, prompts_for};

    #[test]
    fn every_variant_has_an_instruction_for_every_handler() {
        for variant in PolicyVariant::registered() {
            assert!(!prompts_for(*variant).system.is_empty());
            for kind in [ResponseKind::Technical, ResponseKind::Billing, ResponseKind::General] {
                assert!(!instruction(*variant, kind).is_empty());
            }
        }
    }

    #[test]
    fn variants_differ_in_tone() {
        assert_ne!(
            instruction(PolicyVariant::A, ResponseKind::Billing),
            instruction(PolicyVariant::B, ResponseKind::Billing)
        );
    }
}
