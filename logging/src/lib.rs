//! `fibre_context` - Context-data propagation and hot-swappable logger
//! configuration.
//!
//! Loggers are obtained from a [`ContextRegistry`] and bound to its current
//! [`Configuration`]. A configuration can be replaced at any time without
//! stopping log calls in flight: every logger holds an immutable
//! [`ConfigBinding`] that is swapped atomically, and the old configuration
//! is only stopped once every logger has been rebound.
//!
//! Each event carries a frozen copy of the thread's ambient context
//! ([`ThreadContext`]), held in a [`SortedArrayStringMap`].
//!
//! ```no_run
//! use fibre_context::{LoggingSystem, ScopedContext};
//!
//! let logger = LoggingSystem::global().logger("my_app::db");
//! let _request = ScopedContext::with("request_id", "r-42");
//! logger.info("connected");
//! ```

// Declare modules following the file structure
pub mod appender;
pub mod binding;
pub mod config;
pub mod context;
pub mod delivery;
pub mod encoders;
pub mod error;
pub mod error_handling;
pub mod filter;
pub mod init;
pub mod level;
pub mod lifecycle;
pub mod logger;
pub mod map;
pub mod marker;
pub mod message;
pub mod model;
pub mod registry;
pub mod scratch;
pub mod status;
pub mod subscriber;
pub mod system;

// Re-export key public types for easier use by library consumers.
pub use binding::ConfigBinding;
pub use config::{Configuration, ConfigurationBuilder, ConfigurationListener, LoggerSpec, Property};
pub use context::{ContextDataInjector, ContextMapMode, ScopedContext, ThreadContext};
pub use delivery::DeliveryKind;
pub use error::{Error, Result};
pub use error_handling::{InternalErrorReport, InternalErrorSource};
pub use filter::{Filter, FilterResult};
pub use level::Level;
pub use logger::{LogBuilder, NamedLogger};
pub use map::{ContextValue, SortedArrayStringMap, StringMap};
pub use marker::Marker;
pub use message::{Message, MessageFactory};
pub use model::{LogEvent, Location};
pub use registry::{ContextChangeListener, ContextRegistry};
pub use status::StatusLogger;
pub use system::LoggingSystem;

// Public initialization functions
pub use init::{find_config_file, init_from_file, load_configuration, InitResult};
