//! Data models
//!
//! Shared between table-server and its clients (via the request layer).
//! IDs are UUID strings; table numbers are `u32`; timestamps are Unix millis.

pub mod catalog;
pub mod round;
pub mod stats;
pub mod table;
pub mod ticket;

// Re-exports
pub use catalog::*;
pub use round::*;
pub use stats::*;
pub use table::*;
pub use ticket::*;
