use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::SelectorError;

const BASE_DELAY_MS: u64 = 200;

pub(crate) fn build_client(ceiling: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("kira-ss/", env!("CARGO_PKG_VERSION"))),
    );
    Client::builder()
        .default_headers(headers)
        .timeout(ceiling)
        .build()
}

/// Sends once, then up to `max_retries` more times on transient failures.
pub(crate) fn send_with_retries<F>(max_retries: usize, mut make_req: F) -> reqwest::Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < max_retries && is_retryable_status(status) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < max_retries && is_retryable_error(&err) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

/// Splits a response into success or `(status, body)` for the caller's
/// error variant.
pub(crate) fn check_status(response: Response) -> Result<Response, (u16, String)> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .ok()
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| "request failed".to_string());
    Err((status, truncate(message)))
}

pub(crate) fn client_build_error(err: reqwest::Error) -> SelectorError {
    SelectorError::InvalidConfig(format!("unable to build HTTP client: {err}"))
}

fn truncate(mut message: String) -> String {
    const LIMIT: usize = 200;
    if message.len() > LIMIT {
        let mut cut = LIMIT;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
        message.push('…');
    }
    message
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
