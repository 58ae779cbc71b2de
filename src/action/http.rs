//! HTTP action.
//!
//! Sends a request described entirely by string params: `url`,
//! `method`, `body`, and any number of `header_<name>` entries. A
//! status of 400 or above is an action error, so the engine reports it
//! as a failed step.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

use super::{param, Action};

const HEADER_PREFIX: &str = "header_";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Executes an HTTP request with a fixed client timeout.
///
/// The client is built on first use, so a construction failure
/// surfaces as an action error rather than aborting the process.
pub struct HttpAction {
    client: OnceCell<Client>,
}

impl HttpAction {
    /// Create the action; the 60-second client is built lazily.
    pub fn new() -> Self {
        Self { client: OnceCell::new() }
    }

    fn client(&self) -> anyhow::Result<&Client> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| anyhow!("http: building client: {e}"))
        })
    }
}

impl Default for HttpAction {
    fn default() -> Self {
        Self::new()
    }
}

impl Action for HttpAction {
    fn execute(&self, params: &HashMap<String, String>) -> anyhow::Result<HashMap<String, String>> {
        let url = param(params, "url");
        if url.is_empty() {
            bail!("http: url is required");
        }

        let method_name = match param(params, "method") {
            "" => "GET",
            m => m,
        };
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| anyhow!("http: invalid method {method_name:?}"))?;

        let mut request = self.client()?.request(method, url);

        let mut has_content_type = false;
        for (key, value) in params {
            if let Some(name) = key.strip_prefix(HEADER_PREFIX) {
                if name.eq_ignore_ascii_case("content-type") {
                    has_content_type = true;
                }
                request = request.header(name, value);
            }
        }

        let body = param(params, "body");
        if !body.is_empty() {
            if !has_content_type {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body.to_string());
        }

        let response = request.send().map_err(|e| anyhow!("http: request failed: {e}"))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| anyhow!("http: failed to read response: {e}"))?;

        if status >= 400 {
            bail!("http: {status} {text}");
        }

        Ok(HashMap::from([
            ("stdout".to_string(), text),
            ("status_code".to_string(), status.to_string()),
        ]))
    }

    fn dry_run(&self, params: &HashMap<String, String>) -> String {
        let method = match param(params, "method") {
            "" => "GET",
            m => m,
        };
        format!("Would send {method} request to {}", param(params, "url"))
    }
}
