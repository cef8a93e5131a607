//! Table scan layer: splits, data sources and the connectors that create
//! them.
pub mod config;
pub mod connector;
pub mod data_source;
pub mod errors;
pub mod filter;
pub mod handle;
pub mod hive;
pub mod registry;
pub mod split;
pub mod tpch;
