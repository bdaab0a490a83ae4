pub mod indexvec;
pub mod parser;
pub mod sourcemap;
pub mod symbols;
pub mod util;
