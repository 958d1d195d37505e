//! Core data types for the price alert bot.

pub mod alert;
pub mod condition;
pub mod portfolio;
pub mod price;
pub mod symbol;

pub use alert::*;
pub use condition::*;
pub use portfolio::*;
pub use price::*;
pub use symbol::*;
