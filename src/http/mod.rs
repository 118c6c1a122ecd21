//! HTTP client module with retry logic and error handling.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::{MAX_RETRIES, RETRY_DELAY_MS, RequestError, is_not_found};
