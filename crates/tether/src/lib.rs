//! # Tether
//!
//! A dispatcher for remotely connected agents.
//!
//! Agents connect over TCP and announce themselves with a handshake. Each
//! connection becomes an addressable [`Host`]. An operator selects a subset of
//! hosts and issues named commands, which resolve either to a server command
//! (run once against the [`Dispatcher`]) or to a host command (run against
//! every selected host). Commands are contributed by [`Extension`]s.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use tether_proto as proto;

/// Error types for the Tether library
pub mod error;

/// Server configuration
pub mod config;

/// Connected agents
pub mod host;

/// Host registry and selection
pub mod registry;

/// Named command handlers
pub mod command;

/// Extension contract and catalog
pub mod extension;

/// Built-in `essentials` extension
pub mod essentials;

/// Accept loop and command dispatch
pub mod dispatcher;

pub use error::TetherError;
pub use config::ServerConfig;
pub use host::Host;
pub use registry::HostTable;
pub use command::{CommandRegistry, CommandScope, HostCommand, ServerCommand};
pub use extension::{Extension, ExtensionCatalog};
pub use dispatcher::{Dispatcher, DispatcherState, HostReport, HostStatus, Outcome};

/// Result type alias for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;
