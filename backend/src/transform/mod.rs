//! Transformation module.
//!
//! This module handles spreadsheet rows to protocol messages:
//! - Mapping: loading and validating mapping documents
//! - Coerce / Datetime: typed cell conversion
//! - Header: per-message header stamping
//! - Strategy / Grouper: flat and per-turbine payload emission
//! - Executor: the transformation driver
//! - Pipeline: file-level entry points

pub mod coerce;
pub mod datetime;
pub mod executor;
pub mod grouper;
pub mod header;
pub mod mapping;
pub mod pipeline;
pub mod strategy;

pub use coerce::{coerce, parse_duration_seconds};
pub use datetime::parse_epoch_millis;
pub use executor::{transform, Transformer};
pub use grouper::group_row;
pub use header::{
    make_header, Clock, FixedClock, HeaderFactory, IdGenerator, SequentialIds, SystemClock,
    UuidGenerator,
};
pub use mapping::{example_mapping, load_mapping};
pub use pipeline::*;
pub use strategy::{EmissionStrategy, TimestampSeeding};
