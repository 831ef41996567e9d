// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

use anyhow::anyhow;
use reqwest::StatusCode;
use serde::Deserialize;

/// A non-2xx backend response. Carried inside `anyhow::Error` so
/// callers that care about the status code can downcast to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "server returned {}", self.status)
        } else {
            write!(f, "server error ({}): {}", self.status, self.body)
        }
    }
}

impl std::error::Error for RequestError {}

pub(crate) fn request_error(status: StatusCode, body: &str) -> anyhow::Error {
    anyhow::Error::new(RequestError {
        status: status.as_u16(),
        body: clean_body(body),
    })
}

pub(crate) fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check that the backend is running and [api].base_url points at it ({})",
        base_url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    detail: Option<String>,
}

/// The backend wraps error messages in a `{"detail": "..."}` envelope.
/// Unwrap it when present; keep short plain-text bodies; drop the rest.
fn clean_body(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<DetailEnvelope>(body)
        && let Some(detail) = parsed.detail
        && !detail.is_empty()
    {
        return detail;
    }
    if body.len() < 200 && !body.contains('{') {
        return body.trim().to_owned();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::{RequestError, clean_body};

    #[test]
    fn detail_envelope_is_unwrapped() {
        assert_eq!(clean_body(r#"{"detail": "Not found."}"#), "Not found.");
    }

    #[test]
    fn short_plain_bodies_pass_through() {
        assert_eq!(clean_body("bad gateway\n"), "bad gateway");
    }

    #[test]
    fn unrecognized_json_is_dropped() {
        assert_eq!(clean_body(r#"{"trace": "0xdeadbeef"}"#), "");
    }

    #[test]
    fn display_includes_status_and_body() {
        let error = RequestError {
            status: 404,
            body: "Not found.".to_owned(),
        };
        assert_eq!(error.to_string(), "server error (404): Not found.");

        let bare = RequestError {
            status: 502,
            body: String::new(),
        };
        assert_eq!(bare.to_string(), "server returned 502");
    }
}
