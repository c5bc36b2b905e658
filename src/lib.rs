pub use crate::diagnostics::{to_error_source, ErrorContext, ErrorType, MacroError};
pub use crate::engine::{ExpanderConfig, Session};

pub mod ast;
pub mod cli;
pub mod diagnostics;
pub mod engine;
pub mod macros;
