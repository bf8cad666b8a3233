//! # Request
//!
//! The mutable request bag that flows through routing and dispatch.
//!
//! Rules read the relevant URL path and the GET/POST parameters and write the
//! module, controller and action names back. Plugins and actions may rewrite
//! those names and arm the redispatch flag to restart the dispatch loop.
//!
//! GET and POST parameters are kept in separate maps. [`Request::params`]
//! merges them on demand with POST taking precedence; nothing is merged in
//! place.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;
use tracing::debug;

use crate::ids::RequestId;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage: names are shared `Arc<str>`, lookups are case-insensitive.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// String keyed parameters, last write wins.
pub type Params = BTreeMap<String, String>;

/// What an error handler leaves behind when it forwards a request to an
/// error page: the request as it was and the failures it produced.
#[derive(Debug)]
pub struct ErrorForward {
    /// The request before it was rewritten to the error page
    pub request: Request,
    /// Failures captured while dispatching `request`, oldest first
    pub exceptions: Vec<anyhow::Error>,
}

/// Header carrying a caller supplied request id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    scheme: String,
    path: String,
    base_path: String,
    headers: HeaderVec,
    get_params: Params,
    post_params: Params,
    module: Option<String>,
    controller: Option<String>,
    action: Option<String>,
    redispatch: bool,
    forwarded: Option<Rc<ErrorForward>>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// An empty `GET /` request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: RequestId::new(),
            method: Method::GET,
            scheme: "http".to_string(),
            path: "/".to_string(),
            base_path: String::new(),
            headers: HeaderVec::new(),
            get_params: Params::new(),
            post_params: Params::new(),
            module: None,
            controller: None,
            action: None,
            redispatch: false,
            forwarded: None,
        }
    }

    /// Build a request from an absolute (`http://host/path?x=1`) or relative
    /// (`/path?x=1`) URL. The query string becomes the GET parameters.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let mut request = Self::new();
        request.set_url(url);
        request
    }

    /// Replace path, GET parameters and, for absolute URLs, scheme and host.
    pub fn set_url(&mut self, url: &str) {
        if url.contains("://") {
            if let Ok(parsed) = url::Url::parse(url) {
                self.scheme = parsed.scheme().to_string();
                if let Some(host) = parsed.host_str() {
                    let host = match parsed.port() {
                        Some(port) => format!("{host}:{port}"),
                        None => host.to_string(),
                    };
                    self.set_header("Host", host);
                }
                self.path = parsed.path().to_string();
                self.get_params = parsed
                    .query_pairs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                return;
            }
            debug!(url = %url, "Unparseable absolute URL, treating it as a path");
        }

        let (path, query) = match url.find('?') {
            Some(pos) => (&url[..pos], Some(&url[pos + 1..])),
            None => (url, None),
        };
        self.path = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
        self.get_params = query.map(parse_query_params).unwrap_or_default();
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = scheme.into();
    }

    /// The URL path as received, still percent-encoded, base path included.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Set the base path the application is mounted on. Stored as `""` or as
    /// `/segment[/segment...]` without a trailing slash.
    pub fn set_base_path(&mut self, base_path: &str) {
        let trimmed = base_path.trim_matches('/');
        self.base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
    }

    /// The decoded path with the base path removed.
    ///
    /// The base path is only removed when it is a whole-segment prefix: with
    /// base path `/test`, `/testme/` is left untouched.
    #[must_use]
    pub fn relevant_url_path(&self) -> String {
        let decoded = decode_path(&self.path);

        if self.base_path.is_empty() {
            return decoded;
        }

        let fixed_url = format!("{}/", decoded.trim_end_matches('/'));
        let fixed_base = format!("{}/", self.base_path.trim_end_matches('/'));

        if fixed_url.starts_with(&fixed_base) {
            return decoded
                .get(self.base_path.len()..)
                .unwrap_or_default()
                .to_string();
        }
        decoded
    }

    /// Point the request at `relevant` below the base path. Used by rules
    /// when encoding a request back into a URL.
    pub fn set_relevant_path(&mut self, relevant: &str) {
        let path = format!("{}{}", self.base_path, relevant);
        self.path = if path.is_empty() { "/".to_string() } else { path };
    }

    /// `scheme://host` followed by the base path, or only the base path when
    /// no `Host` header is known.
    #[must_use]
    pub fn base_url(&self) -> String {
        match self.header("host") {
            Some(host) => format!("{}://{}{}", self.scheme, host, self.base_path),
            None => self.base_path.clone(),
        }
    }

    /// Full URL: origin (when known), path and the GET parameters as query.
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = match self.header("host") {
            Some(host) => format!("{}://{}", self.scheme, host),
            None => String::new(),
        };
        if self.path.is_empty() {
            url.push('/');
        } else {
            url.push_str(&self.path);
        }
        if !self.get_params.is_empty() {
            url.push('?');
            url.push_str(&self.query_string());
        }
        url
    }

    /// The GET parameters, form-urlencoded.
    #[must_use]
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.get_params.iter())
            .finish()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    ///
    /// Setting [`REQUEST_ID_HEADER`] also re-seeds [`Request::id`] from the
    /// value; a value that is not a ULID gets a fresh id instead.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) {
            self.id = RequestId::from_header_or_new(Some(&value));
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn is_xml_http_request(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.is_xml_http_request()
    }

    #[must_use]
    pub fn get_params(&self) -> &Params {
        &self.get_params
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.get_params.get(name).map(String::as_str)
    }

    pub fn set_get_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.get_params.insert(name.into(), value.into());
    }

    pub fn remove_get_param(&mut self, name: &str) -> Option<String> {
        self.get_params.remove(name)
    }

    /// Merge `params` into the GET parameters, overwriting existing keys.
    pub fn set_get_params<I, K, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in params {
            self.get_params.insert(k.into(), v.into());
        }
    }

    pub fn clear_get_params(&mut self) {
        self.get_params.clear();
    }

    #[must_use]
    pub fn post_params(&self) -> &Params {
        &self.post_params
    }

    #[must_use]
    pub fn post_param(&self, name: &str) -> Option<&str> {
        self.post_params.get(name).map(String::as_str)
    }

    pub fn set_post_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.post_params.insert(name.into(), value.into());
    }

    pub fn clear_post_params(&mut self) {
        self.post_params.clear();
    }

    /// GET and POST parameters merged, POST wins.
    #[must_use]
    pub fn params(&self) -> Params {
        let mut params = self.get_params.clone();
        params.extend(
            self.post_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }

    /// Look a parameter up in POST first, then GET.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.post_param(name).or_else(|| self.get_param(name))
    }

    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn set_module(&mut self, module: Option<String>) {
        self.module = module;
    }

    #[must_use]
    pub fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    pub fn set_controller(&mut self, controller: Option<String>) {
        self.controller = controller;
    }

    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn set_action(&mut self, action: Option<String>) {
        self.action = action;
    }

    /// Set module, controller and action in one go.
    pub fn set_target(&mut self, module: &str, controller: &str, action: &str) {
        self.module = Some(module.to_string());
        self.controller = Some(controller.to_string());
        self.action = Some(action.to_string());
    }

    #[must_use]
    pub fn redispatch(&self) -> bool {
        self.redispatch
    }

    /// Arm (or disarm) the redispatch flag. The dispatch loop only looks at it
    /// at its checkpoints; code already running always finishes.
    pub fn set_redispatch(&mut self, redispatch: bool) {
        self.redispatch = redispatch;
    }

    #[must_use]
    pub fn forwarded(&self) -> Option<&ErrorForward> {
        self.forwarded.as_deref()
    }

    pub fn set_forwarded(&mut self, forward: ErrorForward) {
        self.forwarded = Some(Rc::new(forward));
    }
}

/// Parse a query string (without the leading `?`) into parameters.
#[must_use]
pub fn parse_query_params(query: &str) -> Params {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn decode_path(path: &str) -> String {
    let plus_decoded = path.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}
