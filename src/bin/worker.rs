pub use taskbot::worker::handler;
