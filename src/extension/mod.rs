//! Extension data reported by third-party plugins
//!
//! Plugins describe providers once and then report values per player or per server. Some
//! providers only make sense while a condition holds; [`invalidation`] removes their values when
//! it stops holding.

pub mod invalidation;
pub mod store;

pub use invalidation::{
    ConditionScope, RemoveUnsatisfiedConditionalPlayerResultsTransaction,
    RemoveUnsatisfiedConditionalServerResultsTransaction,
};
pub use store::{
    NumberValue, ProviderInformation, ProviderKey, StorePlayerBooleanResultTransaction,
    StorePlayerGroupsResultTransaction, StorePlayerNumberResultTransaction,
    StorePlayerStringResultTransaction, StorePlayerTableResultTransaction,
    StorePluginTransaction, StoreProviderTransaction, StoreServerBooleanResultTransaction,
    StoreServerNumberResultTransaction, StoreServerStringResultTransaction,
    StoreServerTableResultTransaction, StoreTableProviderTransaction, TableInformation,
};
