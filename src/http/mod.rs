//! HTTP request and response types.
//!
//! The engine never speaks HTTP itself. This module only describes what a
//! transfer should do and what it produced:
//!
//! - **`request`**: Request description and its builder (method, URL, headers,
//!   body, timing limits)
//! - **`response`**: Completed response and the collector that assembles it
//!   from the transfer engine's header and body callbacks
//! - **`parser`**: Parses individual response header lines
//!
//! # Example
//!
//! ```ignore
//! use asyncurl::http::request::{Method, RequestBuilder};
//!
//! let request = RequestBuilder::new()
//!     .method(Method::POST)
//!     .url("http://localhost:3000/api")
//!     .header("Content-Type", "application/json")
//!     .body(b"{}".to_vec())
//!     .build()?;
//! ```

pub mod parser;
pub mod request;
pub mod response;
