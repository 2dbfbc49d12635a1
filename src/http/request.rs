//! Request handle passed down the layer chain.
//!
//! # Responsibilities
//! - Hold the immutable request identity (id, method, headers, original url, body)
//! - Carry the per-frame effective url and the stack of trimmed mount prefixes
//! - Offer typed extensions so layers can hand data to later layers
//!
//! # Design Decisions
//! - The head is shared (`Arc`); the url and mount stack are owned values, so each
//!   frame works on its own copy and a rewrite never leaks upward
//! - The original url is fixed at construction and never overwritten by nested frames
//! - Request ID taken from `x-request-id` when present, UUID v4 otherwise

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use axum::http::{request::Parts, Extensions, HeaderMap, HeaderValue, Method, Version};
use uuid::Uuid;

use crate::routing::path::{self, Trim};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generate a new random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    /// Reuse an upstream ID from a header value.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        value
            .to_str()
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| Self(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parts of a request that never change during dispatch.
#[derive(Debug)]
pub struct RequestHead {
    id: RequestId,
    method: Method,
    version: Version,
    headers: HeaderMap,
    original_url: String,
    body: Bytes,
    extensions: Mutex<Extensions>,
}

/// A request as seen by one frame of the dispatch chain.
#[derive(Debug, Clone)]
pub struct Request {
    head: Arc<RequestHead>,
    url: String,
    mounts: Vec<String>,
}

impl Request {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self::from_head(method, Version::HTTP_11, HeaderMap::new(), url.into(), Bytes::new())
    }

    /// Convert an incoming HTTP request.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let Parts {
            method,
            uri,
            version,
            headers,
            extensions,
            ..
        } = parts;
        let mut request = Self::from_head(method, version, headers, uri.to_string(), body);
        if let Some(head) = Arc::get_mut(&mut request.head) {
            *head.extensions.get_mut().unwrap_or_else(PoisonError::into_inner) = extensions;
        }
        request
    }

    fn from_head(
        method: Method,
        version: Version,
        headers: HeaderMap,
        url: String,
        body: Bytes,
    ) -> Self {
        let id = headers
            .get(X_REQUEST_ID)
            .and_then(RequestId::from_header)
            .unwrap_or_default();
        let head = RequestHead {
            id,
            method,
            version,
            headers,
            original_url: url.clone(),
            body,
            extensions: Mutex::new(Extensions::new()),
        };
        Self {
            head: Arc::new(head),
            url,
            mounts: Vec::new(),
        }
    }

    /// Builder-style header insertion, for requests built by hand.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        if let Some(head) = Arc::get_mut(&mut self.head) {
            head.headers.insert(name, HeaderValue::from_static(value));
            if name.eq_ignore_ascii_case(X_REQUEST_ID) {
                head.id = RequestId(value.into());
            }
        }
        self
    }

    /// Builder-style body, for requests built by hand.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        if let Some(head) = Arc::get_mut(&mut self.head) {
            head.body = body.into();
        }
        self
    }

    pub fn id(&self) -> &RequestId {
        &self.head.id
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.head.body
    }

    /// Effective url relative to the current mount point.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the effective url for the rest of this frame's chain.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Pathname of the effective url.
    pub fn path(&self) -> &str {
        path::pathname(&self.url)
    }

    /// Query string of the effective url, without the `?`.
    pub fn query(&self) -> Option<&str> {
        self.url
            .split_once('?')
            .map(|(_, query)| query.split('#').next().unwrap_or(query))
    }

    /// Url as it arrived, before any mount point trimmed it.
    pub fn original_url(&self) -> &str {
        &self.head.original_url
    }

    /// Concatenation of every prefix trimmed so far.
    pub fn base_url(&self) -> String {
        self.mounts.concat()
    }

    /// Store a typed value for later layers.
    pub fn insert_extension<T>(&self, value: T) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.head
            .extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(value)
    }

    /// Fetch a typed value stored by an earlier layer.
    pub fn extension<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.head
            .extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get::<T>()
            .cloned()
    }

    /// Trim `prefix_len` bytes of pathname, returning the undo record.
    pub(crate) fn descend(&mut self, prefix_len: usize, proto_host: Option<&str>) -> Option<Trim> {
        let (url, trim) = path::descend(&self.url, prefix_len, proto_host);
        if let Some(trim) = &trim {
            self.url = url;
            self.mounts.push(trim.prefix.clone());
        }
        trim
    }

    /// Undo a trim made by `descend`.
    pub(crate) fn ascend(&mut self, trim: &Trim, proto_host: Option<&str>) {
        self.url = path::ascend(&self.url, trim, proto_host);
        self.mounts.pop();
    }
}
