//! Interactive operator console
//!
//! Reads one command per line, hands it to the dispatcher and prints whatever
//! comes back. The prompt shows what is selected.

use anyhow::Result;
use std::sync::Arc;
use tether::{Dispatcher, DispatcherState, Host, HostStatus, Outcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Message shown for unknown commands
pub const NOT_FOUND: &str = "Command not found. 'help' lists the available commands.";

/// Message shown when the listener has died under the console
pub const LISTENING_STOPPED: &str = "Listening stopped; no new agents can connect.";

/// Split a line into a command word and its arguments
pub fn parse_line(line: &str) -> (String, Vec<String>) {
    let mut words = line.split_whitespace().map(str::to_string);
    let name = words.next().unwrap_or_default();
    (name, words.collect())
}

/// Prompt for the current selection
pub fn render_prompt(selected: &[Arc<Host>], total: usize) -> String {
    match selected {
        [] => "~$ ".to_string(),
        [host] => format!("[{}]~$ ", host.ip()),
        _ if selected.len() == total => "[ALL]~$ ".to_string(),
        _ => "[MULTIPLE]~$ ".to_string(),
    }
}

/// Lines to show for a command outcome
pub fn describe(outcome: &Outcome) -> Vec<String> {
    match outcome {
        Outcome::Ignored | Outcome::Server => Vec::new(),
        Outcome::NotFound => vec![NOT_FOUND.to_string()],
        Outcome::Hosts(reports) => reports
            .iter()
            .filter_map(|report| {
                let addr = report.host.addr();
                match &report.status {
                    HostStatus::Done(Some(text)) => Some(format!("[{}] {}", addr, text)),
                    HostStatus::Done(None) => None,
                    HostStatus::Failed(message) => Some(format!("[{}] failed: {}", addr, message)),
                    HostStatus::Skipped => Some(format!("[{}] skipped, connection closed", addr)),
                }
            })
            .collect(),
    }
}

/// Line-driven front end over a dispatcher
pub struct Console {
    dispatcher: Arc<Dispatcher>,
    output: Option<mpsc::UnboundedReceiver<String>>,
}

impl Console {
    /// Attach to a dispatcher, taking its output channel if still available
    pub async fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let output = dispatcher.take_output().await;
        Self { dispatcher, output }
    }

    /// Run until input ends, the dispatcher shuts down or its accept loop
    /// fails
    pub async fn run<R, W>(&mut self, input: R, mut out: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        loop {
            if self.dispatcher.accept_stopped().await {
                warn!("Accept loop stopped, ending console");
                out.write_all(LISTENING_STOPPED.as_bytes()).await?;
                out.write_all(b"\n").await?;
                break;
            }

            let prompt = self.prompt().await;
            out.write_all(prompt.as_bytes()).await?;
            out.flush().await?;

            let Some(line) = lines.next_line().await? else {
                info!("Input closed");
                break;
            };

            let (name, args) = parse_line(&line);
            debug!("Console command: {} {:?}", name, args);

            let mut shown = match self.dispatcher.execute(&name, &args).await {
                Ok(outcome) => describe(&outcome),
                Err(e) => vec![format!("Error: {}", e)],
            };

            // handler output comes before the outcome summary
            let mut printed = self.drain_output();
            printed.append(&mut shown);
            for text in printed {
                out.write_all(text.as_bytes()).await?;
                out.write_all(b"\n").await?;
            }

            if self.dispatcher.state().await == DispatcherState::Shutdown {
                break;
            }
        }

        out.flush().await?;
        Ok(())
    }

    async fn prompt(&self) -> String {
        let selected = self.dispatcher.selected().await;
        let total = self.dispatcher.hosts().await.len();
        render_prompt(&selected, total)
    }

    fn drain_output(&mut self) -> Vec<String> {
        let mut printed = Vec::new();
        if let Some(output) = self.output.as_mut() {
            while let Ok(text) = output.try_recv() {
                printed.push(text);
            }
        }
        printed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tether::{CommandRegistry, ExtensionCatalog, ServerConfig};

    async fn dispatcher() -> Arc<Dispatcher> {
        let mut commands = CommandRegistry::new();
        ExtensionCatalog::builtin().load(&["essentials"], &mut commands).unwrap();
        let config = ServerConfig::default()
            .with_listen(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0);
        Arc::new(Dispatcher::bind(config, commands).await.unwrap())
    }

    async fn run_script(script: &str) -> String {
        let dispatcher = dispatcher().await;
        let mut console = Console::new(dispatcher).await;
        let mut out = Vec::new();
        console.run(script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("select 0  2"),
            ("select".to_string(), vec!["0".to_string(), "2".to_string()])
        );
        assert_eq!(parse_line("   "), (String::new(), Vec::new()));
        assert_eq!(parse_line("help"), ("help".to_string(), Vec::new()));
    }

    #[test]
    fn test_prompt_without_selection() {
        assert_eq!(render_prompt(&[], 3), "~$ ");
    }

    #[test]
    fn test_not_found_description() {
        assert_eq!(describe(&Outcome::NotFound), vec![NOT_FOUND.to_string()]);
        assert!(describe(&Outcome::Server).is_empty());
        assert!(describe(&Outcome::Ignored).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported() {
        let text = run_script("bogus\n").await;
        assert!(text.starts_with("~$ "));
        assert!(text.contains(NOT_FOUND));
    }

    #[tokio::test]
    async fn test_help_output_is_printed() {
        let text = run_script("help\n\n").await;
        assert!(text.contains("Server commands:"));
        assert!(text.contains("list_hosts"));
        assert!(!text.contains("Host commands:"));
    }

    #[tokio::test]
    async fn test_errors_are_printed() {
        let text = run_script("select 3\n").await;
        assert!(text.contains("Error: Invalid host id \"3\""));
    }

    #[tokio::test]
    async fn test_healthy_listener_keeps_console_running() {
        let dispatcher = dispatcher().await;
        dispatcher.serve().await.unwrap();
        let mut console = Console::new(Arc::clone(&dispatcher)).await;

        let mut out = Vec::new();
        console.run("help\n".as_bytes(), &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Server commands:"));
        assert!(!text.contains(LISTENING_STOPPED));

        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_exit_stops_console() {
        let text = run_script("exit\nhelp\n").await;
        assert!(!text.contains("Server commands:"));
    }
}
