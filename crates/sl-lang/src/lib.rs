pub mod ast;
mod checker;
mod compiler;
mod parse_utils;
pub mod plan;
mod slq_parser;

pub use checker::CheckError;
pub use compiler::compile;
pub use slq_parser::parse_slq;
