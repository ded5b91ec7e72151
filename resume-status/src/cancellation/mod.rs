//! Cooperative cancellation for background tasks.

mod token;

pub use token::CancellationToken;
