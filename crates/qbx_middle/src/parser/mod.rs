//! The tree handed over by the parser and semantic analysis.
//!
//! Nothing in here is produced by this workspace: these are the types the CFG builder consumes.

pub mod expr;
pub mod statement;
