//! Live price collection from exchanges.
//!
//! ## Architecture
//!
//! - `source` - the `PriceSource` trait every consumer depends on
//! - `rest` - Binance public REST implementation
//! - `cache` - TTL cache wrapping any source

pub mod cache;
pub mod error;
pub mod rest;
pub mod source;

pub use cache::*;
pub use error::*;
pub use rest::*;
pub use source::*;
