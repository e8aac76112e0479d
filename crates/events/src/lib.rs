//! Engine event definitions.
//!
//! Every consequential lifecycle transition is published on a broadcast
//! channel as one of these variants. Subscribers (currently the Telegram
//! alerter) decide for themselves which events are worth surfacing.

pub mod messages;

pub use messages::EngineEvent;
