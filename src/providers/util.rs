use crate::core::error::{RateError, Result};
use reqwest::Response;
use reqwest::header::HeaderName;
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("xrate/", env!("CARGO_PKG_VERSION"));

/// Builds a client whose requests give up after `timeout`. There is no retry.
pub(crate) fn http_client(source_name: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| RateError::source_fetch(source_name, format!("Client error: {e}")))
}

/// Maps a transport error. The URL is dropped since it may carry an API key.
pub(crate) fn request_error(source_name: &str, err: reqwest::Error) -> RateError {
    if err.is_timeout() {
        RateError::source_fetch(source_name, "Request timed out")
    } else {
        let err = err.without_url();
        RateError::source_fetch(source_name, format!("Request error: {err}"))
    }
}

pub(crate) fn header_value(response: &Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
