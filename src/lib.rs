//! Derives delivery metrics (lead time, cycle time, stage counters and issue
//! ages) from an ordered stream of issue lifecycle events.

pub mod classify;
pub mod config;
pub mod event;
pub mod generator;
pub mod metric;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod store;
