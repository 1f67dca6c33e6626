//! API Lambda handler and request normalisation

pub mod event_handler;
pub mod handler;
pub mod helpers;
pub mod interactive_handler;
pub mod parsing;
pub mod signature;
pub mod slash_handler;
pub mod sqs;
pub mod webhook;

pub use handler::handler;
