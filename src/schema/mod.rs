//! Latest schema, its creation and catalog introspection

pub mod create;
pub mod introspection;
pub mod tables;

pub use create::CreateTablesTransaction;
pub use introspection::{ForeignKeyConstraint, VarcharLength};
