//! ritlens-core: Assessment export parsing and longitudinal analytics.
//!
//! This crate defines the record model, the export parser, the pure
//! analyzers (benchmark tiers, growth, cohorts, goals, Lexile, data quality,
//! tier transitions) and the async query engine that composes them.

pub mod classifier;
pub mod cohort;
pub mod engine;
pub mod error;
pub mod goals;
pub mod growth;
pub mod lexile;
pub mod model;
pub mod parser;
pub mod quality;
pub mod report;
pub mod statistics;
pub mod term;
pub mod traits;
pub mod transition;

#[cfg(test)]
mod testutil;
