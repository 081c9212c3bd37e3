//! Operation-kind classification used by the mutation rules.

/// Kind of the pass-through node interposed in front of branch constructs.
pub const PASS_THROUGH_OP: &str = "Identity";

/// Name prefix of generated pass-through nodes (`ControlPin/<producer>_<port>`).
pub const CONTROL_PIN_PREFIX: &str = "ControlPin";

const BRANCH_OPS: &[&str] = &["Switch", "RefSwitch", "_SwitchN"];

/// Nodes whose outputs are selected at run time; a control edge on them
/// would not say which output it waits for.
pub fn is_branch_construct(op: &str) -> bool {
    BRANCH_OPS.contains(&op)
}

pub fn is_pass_through(op: &str) -> bool {
    op == PASS_THROUGH_OP
}

pub(crate) fn control_pin_name(producer: &str, port: i32) -> String {
    format!("{CONTROL_PIN_PREFIX}/{producer}_{port}")
}
