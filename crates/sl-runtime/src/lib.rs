#[macro_use]
mod log_macros;

mod pipeline;
pub mod tracing_init;

pub use pipeline::Pipeline;
