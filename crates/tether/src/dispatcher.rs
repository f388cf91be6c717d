//! Accept loop and command dispatch

use crate::host::HostOptions;
use crate::{CommandRegistry, Host, HostTable, Result, ServerConfig, TetherError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Dispatcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Socket bound and listening, nothing accepted yet
    Created,
    /// Accept loop running
    Serving,
    /// Listener closed; open hosts are left as they are
    Shutdown,
}

/// Result of one host's share of a host command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    /// Handler returned successfully, with optional output
    Done(Option<String>),
    /// Handler failed with this message
    Failed(String),
    /// Host was already closed
    Skipped,
}

/// Per-host entry of a fan-out
#[derive(Debug, Clone)]
pub struct HostReport {
    /// Host the command ran against
    pub host: Arc<Host>,
    /// What happened
    pub status: HostStatus,
}

/// How [`Dispatcher::execute`] resolved a command
#[derive(Debug)]
pub enum Outcome {
    /// Empty command name
    Ignored,
    /// A server command ran
    Server,
    /// A host command ran across the selection
    Hosts(Vec<HostReport>),
    /// No server command, and no host command or no selection
    NotFound,
}

/// Owns the listener, the host table and the command registry
pub struct Dispatcher {
    config: ServerConfig,
    commands: Arc<CommandRegistry>,
    /// Hosts and selection, shared with the accept task
    table: Arc<RwLock<HostTable>>,
    local_addr: SocketAddr,
    /// Held until `serve` hands it to the accept task
    listener: Mutex<Option<TcpListener>>,
    accept_task: Mutex<Option<JoinHandle<Result<()>>>>,
    state: RwLock<DispatcherState>,
    output_tx: mpsc::UnboundedSender<String>,
    output_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    /// Set once the receiver has been handed out; lines are dropped before
    output_taken: AtomicBool,
}

impl Dispatcher {
    /// Bind the listening socket. Must be called inside a tokio runtime.
    ///
    /// Text printed by server commands is discarded until a front end calls
    /// [`Dispatcher::take_output`].
    pub async fn bind(config: ServerConfig, commands: CommandRegistry) -> Result<Self> {
        config.validate()?;

        let addr = config.socket_addr();
        let listener = Self::listen(addr, config.max_connections)
            .map_err(|source| TetherError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let (output_tx, output_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            commands: Arc::new(commands),
            table: Arc::new(RwLock::new(HostTable::new())),
            local_addr,
            listener: Mutex::new(Some(listener)),
            accept_task: Mutex::new(None),
            state: RwLock::new(DispatcherState::Created),
            output_tx,
            output_rx: Mutex::new(Some(output_rx)),
            output_taken: AtomicBool::new(false),
        })
    }

    fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(backlog)
    }

    /// Start the accept loop on its own task
    pub async fn serve(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != DispatcherState::Created {
            return Err(TetherError::Dispatcher(format!("Cannot serve from state {:?}", *state)));
        }

        let listener = self.listener.lock().await.take()
            .ok_or_else(|| TetherError::Dispatcher("Listener already taken".to_string()))?;
        let table = Arc::clone(&self.table);
        let options = HostOptions::from(&self.config);

        let handle = tokio::spawn(Self::accept_loop(listener, table, options));
        *self.accept_task.lock().await = Some(handle);
        *state = DispatcherState::Serving;

        info!("Serving on {}", self.local_addr);
        Ok(())
    }

    /// Accept connections forever. A failed handshake drops that connection
    /// only; a failed accept ends the loop.
    async fn accept_loop(
        listener: TcpListener,
        table: Arc<RwLock<HostTable>>,
        options: HostOptions,
    ) -> Result<()> {
        loop {
            let (stream, addr) = listener.accept().await.map_err(|e| {
                error!("Accept failed: {}", e);
                TetherError::Accept(e)
            })?;
            debug!("Accepted connection from {}", addr);

            match Host::connect_with(stream, addr, options).await {
                Ok(host) => {
                    Self::register(&table, host).await;
                }
                Err(e) => {
                    warn!("Dropping connection from {}: {}", addr, e);
                }
            }
        }
    }

    async fn register(table: &RwLock<HostTable>, host: Host) -> usize {
        let description = host.to_string();
        let index = table.write().await.push(Arc::new(host));
        info!("Host #{} connected: {}", index, description);
        index
    }

    /// Close the listener. Open hosts stay open. Returns the accept loop's
    /// error if it had already stopped on its own.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state == DispatcherState::Shutdown {
            return Ok(());
        }
        *state = DispatcherState::Shutdown;

        drop(self.listener.lock().await.take());

        let handle = self.accept_task.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            match handle.await {
                Ok(result) => result?,
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    return Err(TetherError::Dispatcher(format!("Accept task failed: {}", e)));
                }
            }
        }

        info!("Dispatcher shut down");
        Ok(())
    }

    /// Current lifecycle state
    pub async fn state(&self) -> DispatcherState {
        *self.state.read().await
    }

    /// Whether the accept loop is still running
    pub async fn is_accepting(&self) -> bool {
        self.accept_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether the accept loop ended by itself while still `Serving`.
    /// No new agents can connect; [`Dispatcher::shutdown`] returns the error.
    pub async fn accept_stopped(&self) -> bool {
        *self.state.read().await == DispatcherState::Serving && !self.is_accepting().await
    }

    /// Bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Configuration in use
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered commands
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Append an already connected host, returning its index
    pub async fn adopt(&self, host: Host) -> usize {
        Self::register(&self.table, host).await
    }

    /// Snapshot of all hosts
    pub async fn hosts(&self) -> Vec<Arc<Host>> {
        self.table.read().await.hosts().to_vec()
    }

    /// Snapshot of the selection
    pub async fn selected(&self) -> Vec<Arc<Host>> {
        self.table.read().await.selected().to_vec()
    }

    /// Update the selection; see [`HostTable::select`]
    pub async fn select<S: AsRef<str>>(&self, ids: Option<&[S]>) -> Result<Vec<Arc<Host>>> {
        let mut table = self.table.write().await;
        let selected = table.select(ids)?.to_vec();
        info!("Selection now has {} hosts", selected.len());
        Ok(selected)
    }

    /// Select every current host
    pub async fn select_all(&self) -> Vec<Arc<Host>> {
        let mut table = self.table.write().await;
        table.select_all();
        table.selected().to_vec()
    }

    /// Clear the selection
    pub async fn select_none(&self) {
        self.table.write().await.select_none();
    }

    /// Select hosts by registry index
    pub async fn select_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Arc<Host>>> {
        self.select(Some(ids)).await
    }

    /// Drop closed hosts; see [`HostTable::clean`]
    pub async fn clean(&self) -> usize {
        self.table.write().await.clean()
    }

    /// Command listing. Host commands are listed only while hosts are selected.
    pub async fn help(&self) -> String {
        let mut out = String::from("Server commands:\n");
        for (name, help) in self.commands.server_commands() {
            out.push_str(&format!("\t{}: {}\n", name, help));
        }

        if !self.table.read().await.selected().is_empty() {
            out.push_str("Host commands:\n");
            for (name, help) in self.commands.host_commands() {
                out.push_str(&format!("\t{}: {}\n", name, help));
            }
        }
        out
    }

    /// Send a line to whoever holds the output receiver. Dropped if the
    /// receiver has not been taken yet or is gone.
    pub fn print(&self, line: impl Into<String>) {
        let line = line.into();
        debug!("Output: {}", line);
        if !self.output_taken.load(Ordering::Acquire) {
            debug!("No output receiver taken, dropping line");
            return;
        }
        if self.output_tx.send(line).is_err() {
            debug!("Output receiver dropped");
        }
    }

    /// Take the receiving end of the output channel. Only the first call
    /// gets it.
    pub async fn take_output(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        let output = self.output_rx.lock().await.take();
        if output.is_some() {
            self.output_taken.store(true, Ordering::Release);
        }
        output
    }

    /// Run a command.
    ///
    /// Server commands win. Otherwise, if hosts are selected, a host command
    /// of that name runs against each selected host in order; a failing host
    /// is reported, and closed if its connection broke, while the rest still
    /// run. Anything else is `NotFound`.
    pub async fn execute(&self, name: &str, args: &[String]) -> Result<Outcome> {
        if name.is_empty() {
            return Ok(Outcome::Ignored);
        }

        if let Some(handler) = self.commands.lookup_server(name) {
            debug!("Running server command {} {:?}", name, args);
            handler.run(self, args).await?;
            return Ok(Outcome::Server);
        }

        let selected = self.selected().await;
        if !selected.is_empty() {
            if let Some(handler) = self.commands.lookup_host(name) {
                debug!("Running host command {} on {} hosts", name, selected.len());

                let mut reports = Vec::with_capacity(selected.len());
                for host in selected {
                    let status = if host.is_closed() {
                        HostStatus::Skipped
                    } else {
                        match handler.run(&host, args).await {
                            Ok(output) => HostStatus::Done(output),
                            Err(e) => {
                                warn!("Command {} failed on {}: {}", name, host, e);
                                if e.is_connection_fault() {
                                    host.close().await;
                                }
                                HostStatus::Failed(e.to_string())
                            }
                        }
                    };
                    reports.push(HostReport { host, status });
                }
                return Ok(Outcome::Hosts(reports));
            }
        }

        debug!("Command not found: {}", name);
        Ok(Outcome::NotFound)
    }
}
