//! Alert condition engine.
//!
//! This crate contains the condition parser, the alert evaluator and the
//! technical indicators used for market summaries.

pub mod analysis;
pub mod evaluator;
pub mod indicators;
pub mod parser;

pub use analysis::*;
pub use evaluator::*;
pub use parser::*;
