//! Worker Lambda: consumes queued events and drives the bot.

pub mod handler;

pub use handler::handler;
