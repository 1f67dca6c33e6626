//! Small shared helpers: ids, clocks, dates, retries and text.

pub mod clock;
pub mod dates;
pub mod ids;
pub mod retry;
pub mod text;
