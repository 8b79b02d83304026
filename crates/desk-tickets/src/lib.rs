//! Support-ticket lifecycle core.
//!
//! Tickets are channel-scoped support requests persisted as a single
//! whole-snapshot JSON document. This crate owns the lifecycle state machine
//! (open, claim toggle, close, reopen) and the periodic inactivity sweep;
//! the chat platform itself sits behind the [`PlatformGateway`] trait and is
//! out of scope here, as are rendering, transport, and configuration
//! delivery.
//!
//! Every mutation runs the full load-validate-mutate-save sequence under a
//! single mutation lock, so a button press racing the expiry sweep can never
//! resurrect a ticket the sweep just deleted.

pub mod ticket_config;
pub mod ticket_contract;
pub mod ticket_lifecycle;
pub mod ticket_registry;
pub mod ticket_render;
pub mod ticket_store;
pub mod ticket_sweeper;

pub use ticket_config::*;
pub use ticket_contract::*;
pub use ticket_lifecycle::*;
pub use ticket_registry::*;
pub use ticket_render::*;
pub use ticket_store::*;
pub use ticket_sweeper::*;
