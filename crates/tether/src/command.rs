//! Named command handlers
//!
//! Commands live in two namespaces. Server commands run once against the
//! [`Dispatcher`]; host commands run once per selected [`Host`]. Extensions
//! fill a [`CommandRegistry`] before the dispatcher starts, after which it is
//! only read.

use crate::{Dispatcher, Host, Result, TetherError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Handler operating on the dispatcher itself
#[async_trait]
pub trait ServerCommand: Send + Sync {
    /// Run the command
    async fn run(&self, dispatcher: &Dispatcher, args: &[String]) -> Result<()>;
}

/// Handler operating on a single host
#[async_trait]
pub trait HostCommand: Send + Sync {
    /// Run the command against one host, optionally returning text for the
    /// operator
    async fn run(&self, host: &Host, args: &[String]) -> Result<Option<String>>;
}

/// Command namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandScope {
    /// Runs against the dispatcher
    Server,
    /// Runs against each selected host
    Host,
}

impl fmt::Display for CommandScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Host => f.write_str("host"),
        }
    }
}

/// Registered handler with its help text
pub struct CommandEntry<H: ?Sized> {
    /// The handler
    pub handler: Arc<H>,
    /// One-line description
    pub help: String,
}

/// Server and host command tables, keyed by name
#[derive(Default)]
pub struct CommandRegistry {
    server: BTreeMap<String, CommandEntry<dyn ServerCommand>>,
    host: BTreeMap<String, CommandEntry<dyn HostCommand>>,
}

impl CommandRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server command. Fails if the name is already taken.
    pub fn register_server_command(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn ServerCommand>,
        help: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if self.server.contains_key(&name) {
            return Err(TetherError::DuplicateCommand { scope: CommandScope::Server, name });
        }
        debug!("Registered server command: {}", name);
        self.server.insert(name, CommandEntry { handler, help: help.into() });
        Ok(())
    }

    /// Register a host command. Fails if the name is already taken.
    pub fn register_host_command(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn HostCommand>,
        help: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if self.host.contains_key(&name) {
            return Err(TetherError::DuplicateCommand { scope: CommandScope::Host, name });
        }
        debug!("Registered host command: {}", name);
        self.host.insert(name, CommandEntry { handler, help: help.into() });
        Ok(())
    }

    /// Look up a server command
    pub fn lookup_server(&self, name: &str) -> Option<Arc<dyn ServerCommand>> {
        self.server.get(name).map(|entry| Arc::clone(&entry.handler))
    }

    /// Look up a host command
    pub fn lookup_host(&self, name: &str) -> Option<Arc<dyn HostCommand>> {
        self.host.get(name).map(|entry| Arc::clone(&entry.handler))
    }

    /// Server command names and help, sorted by name
    pub fn server_commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.server.iter().map(|(name, entry)| (name.as_str(), entry.help.as_str()))
    }

    /// Host command names and help, sorted by name
    pub fn host_commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.host.iter().map(|(name, entry)| (name.as_str(), entry.help.as_str()))
    }

    /// Number of commands in a namespace
    pub fn count(&self, scope: CommandScope) -> usize {
        match scope {
            CommandScope::Server => self.server.len(),
            CommandScope::Host => self.host.len(),
        }
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("server", &self.server.keys().collect::<Vec<_>>())
            .field("host", &self.host.keys().collect::<Vec<_>>())
            .finish()
    }
}
