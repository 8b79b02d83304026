//! Role-based gating for staff ticket actions.
//!
//! The evaluator is pure: it never touches the store or the platform, so
//! authorization decisions are testable in isolation from both.

pub mod staff_actions;

pub use staff_actions::*;
