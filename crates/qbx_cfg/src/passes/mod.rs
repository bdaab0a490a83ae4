pub mod build;
pub mod eliminate;
pub mod jump_targets;
pub mod verify;
