//! Wrapp Config provides the property source components are configured from.
//!
//! Wrapp Config is split into three parts:
//! 1. PropertySource: an immutable key/value mapping built from the environment, explicit
//!    pairs and parsed TOML tables
//! 2. Placeholders: `${key}` and `${key:default}` expressions, resolved recursively
//! 3. Converters: turn resolved strings into typed values, keyed by the target type
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//!
//! use wrapp_config::provider::PropertySource;
//!
//! let props = PropertySource::builder()
//!     .with_property("server.port", "8080")
//!     .with_property("server.timeout", "${timeout:15s}")
//!     .build();
//!
//! let port: u16 = props.get_required("${server.port}").unwrap();
//! let timeout: Duration = props.get_required("server.timeout").unwrap();
//! let host = props.get("${server.host:localhost}").unwrap();
//!
//! assert_eq!(port, 8080);
//! assert_eq!(timeout, Duration::from_secs(15));
//! assert_eq!(host.as_deref(), Some("localhost"));
//! ```

pub mod convert;
pub mod errors;
pub mod placeholder;
pub mod provider;

pub use errors::{PropertyError, RegisterConverterError};
pub use provider::{PropertySource, PropertySourceBuilder};
