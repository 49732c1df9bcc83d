//! Analysis modules.
//!
//! Turns warehouse rows into per-coach aggregates.

pub mod aggregator;

pub use aggregator::*;
