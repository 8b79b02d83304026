//! Foundational low-level utilities shared across Desk crates.
//!
//! Provides atomic file-write helpers and wall-clock utilities used by the
//! ticket store and the inactivity-expiry calculations.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_past_activity_deadline};
