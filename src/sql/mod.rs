//! SQL text handling: identifier quoting, statement builders and classification.

pub mod builders;
pub mod classifier;
pub mod ident;

pub use builders::ColumnSpec;
pub use classifier::{StatementType, classify};
