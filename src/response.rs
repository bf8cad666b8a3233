//! # Response
//!
//! One `Response` is created per top-level dispatch call and handed back to
//! the caller when that call returns. Besides the body, status and headers it
//! collects every failure the dispatch loop captured, in order, so that an
//! error handling plugin can inspect them and redispatch to an error page.

use std::sync::Arc;

use crate::request::HeaderVec;

#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: HeaderVec,
    body: String,
    exceptions: Vec<anyhow::Error>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty `200` HTML response.
    #[must_use]
    pub fn new() -> Self {
        let mut headers = HeaderVec::new();
        headers.push((
            Arc::from("content-type"),
            "text/html; charset=utf-8".to_string(),
        ));
        Self {
            status: 200,
            headers,
            body: String::new(),
            exceptions: Vec::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Get a header by name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn append_body(&mut self, content: &str) {
        self.body.push_str(content);
    }

    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    pub fn add_exception(&mut self, exception: anyhow::Error) {
        self.exceptions.push(exception);
    }

    #[must_use]
    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    #[must_use]
    pub fn exceptions(&self) -> &[anyhow::Error] {
        &self.exceptions
    }

    /// Remove and return the captured failures.
    pub fn take_exceptions(&mut self) -> Vec<anyhow::Error> {
        std::mem::take(&mut self.exceptions)
    }

    pub fn clear_exceptions(&mut self) {
        self.exceptions.clear();
    }

    /// Point the client at `url` with a 3xx status.
    pub fn redirect(&mut self, url: &str, status: u16) {
        self.set_header("Location", url);
        self.status = status;
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..=399).contains(&self.status)
    }
}
