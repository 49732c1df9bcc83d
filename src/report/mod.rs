//! Report generation module.

pub mod generator;

pub use generator::*;
