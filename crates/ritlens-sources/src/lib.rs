//! ritlens-sources: where assessment records and reference tables come from.
//!
//! Provides a JSON-file record store, an in-memory source, national norm
//! table loading and the `ritlens.toml` configuration layer.

pub mod config;
pub mod error;
pub mod json_store;
pub mod memory;
pub mod norms;

pub use config::{create_engine, load_config, load_config_from, RitlensConfig};
pub use error::TableError;
pub use json_store::{JsonStoreSource, WriteSummary};
pub use memory::InMemorySource;
pub use norms::{load_norms, parse_norms};
