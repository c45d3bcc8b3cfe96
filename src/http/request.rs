use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::TransferDefaults;

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// GET - Retrieve a resource
    #[default]
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, typically uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a known method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use asyncurl::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }
}

/// Timing limits applied to a transfer.
///
/// A transfer whose average speed stays below `low_speed_limit` bytes per
/// second for `low_speed_time` is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransferLimits {
    fn default() -> Self {
        TransferLimits::from(&TransferDefaults::default())
    }
}

impl From<&TransferDefaults> for TransferLimits {
    fn from(defaults: &TransferDefaults) -> Self {
        Self {
            low_speed_limit: defaults.low_speed_limit,
            low_speed_time: Duration::from_secs(defaults.low_speed_time_secs),
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
        }
    }
}

/// Everything needed to start one transfer.
///
/// Built by [`RequestBuilder`] and handed to
/// [`Engine::submit`](crate::engine::Engine::submit).
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Target URL, always `http` or `https`
    pub url: Url,
    /// Request headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Request body, sent when non-empty
    pub body: Vec<u8>,
    pub limits: TransferLimits,
    pub user_agent: Option<String>,
    /// Hosts that bypass any configured proxy (`"*"` for all)
    pub no_proxy: Option<String>,
    /// Ask the transfer engine for verbose wire logging
    pub verbose: bool,
}

impl Request {
    /// Retrieves a header value by name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("url missing")]
    MissingUrl,
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Builder for constructing Request objects.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    limits: TransferLimits,
    user_agent: Option<String>,
    no_proxy: Option<String>,
    verbose: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::from_defaults(&TransferDefaults::default())
    }

    /// Start from configured transfer defaults.
    pub fn from_defaults(defaults: &TransferDefaults) -> Self {
        Self {
            method: Method::GET,
            url: None,
            headers: HashMap::new(),
            body: Vec::new(),
            limits: TransferLimits::from(defaults),
            user_agent: defaults.user_agent.clone(),
            no_proxy: None,
            verbose: defaults.verbose,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Abort when slower than `limit` bytes/s for `time`.
    pub fn low_speed(mut self, limit: u32, time: Duration) -> Self {
        self.limits.low_speed_limit = limit;
        self.limits.low_speed_time = time;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.limits.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn no_proxy(mut self, hosts: impl Into<String>) -> Self {
        self.no_proxy = Some(hosts.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> Result<Request, RequestError> {
        let raw = self.url.ok_or(RequestError::MissingUrl)?;
        let url = Url::parse(&raw)?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(RequestError::UnsupportedScheme(other.to_string())),
        }

        Ok(Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            limits: self.limits,
            user_agent: self.user_agent,
            no_proxy: self.no_proxy,
            verbose: self.verbose,
        })
    }
}
