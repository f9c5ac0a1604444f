//! Warehouse access: provider traits, the Snowflake REST implementation, result
//! decoding and the gated executor.

pub mod executor;
pub mod provider;
pub mod snowflake;
pub mod types;

pub use executor::StatementExecutor;
pub use provider::{ConnectionProvider, SessionParams, WarehouseSession};
pub use snowflake::SnowflakeProvider;
pub use types::{ColumnMeta, ResultSet, Row};
