//! Utility functions for common operations.
//!
//! - **URL validation**: scheme and host checks for feed urls
//! - **Text processing**: terminal-safe rendering of publisher-controlled text
//!
//! # Examples
//!
//! ```
//! use gator::util::{strip_control_chars, truncate_to_width, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(strip_control_chars("\x1b[31mred\x1b[0m"), "red");
//! assert_eq!(truncate_to_width("Long article title", 8), "Long ar…");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_feed_url, UrlValidationError};
