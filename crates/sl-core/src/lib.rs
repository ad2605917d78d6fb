pub mod error;
pub mod eval;
pub mod operator;
pub mod reducer;
pub mod row;
pub mod value;
pub mod window;

pub use error::{CoreError, EvalError};
pub use row::{AggregateRow, EgressRow, IngressRow, RowLayout};
pub use value::Value;
pub use window::{CloseReason, ClosedWindow, WindowMachine};
