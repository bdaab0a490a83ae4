pub mod error;
pub mod linearize;
pub mod op;
pub mod options;

pub use linearize::{linearize, LinearizedRoutine};

#[cfg(test)]
mod test;
