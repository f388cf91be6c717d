//! Built-in `essentials` extension: listing, selection and housekeeping

use crate::{CommandRegistry, Dispatcher, Extension, Host, HostCommand, Result, ServerCommand};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// The `essentials` extension
pub struct Essentials;

impl Extension for Essentials {
    fn name(&self) -> &str {
        "essentials"
    }

    fn register(&self, registry: &mut CommandRegistry) -> Result<()> {
        registry.register_server_command("help", Arc::new(Help), "List available commands")?;
        registry.register_server_command("list_hosts", Arc::new(ListHosts), "List connected hosts")?;
        registry.register_server_command(
            "select",
            Arc::new(Select),
            "Select hosts by id; no ids clears the selection",
        )?;
        registry.register_server_command("all", Arc::new(SelectAll), "Select all hosts")?;
        registry.register_server_command("clean", Arc::new(Clean), "Forget closed hosts")?;
        registry.register_server_command(
            "exit",
            Arc::new(Exit),
            "Stop accepting and close every host",
        )?;
        registry.register_host_command("info", Arc::new(Info), "Show host details")?;
        registry.register_host_command("close", Arc::new(Close), "Close the host connection")?;
        Ok(())
    }
}

struct Help;

#[async_trait]
impl ServerCommand for Help {
    async fn run(&self, dispatcher: &Dispatcher, _args: &[String]) -> Result<()> {
        dispatcher.print(dispatcher.help().await.trim_end());
        Ok(())
    }
}

struct ListHosts;

#[async_trait]
impl ServerCommand for ListHosts {
    async fn run(&self, dispatcher: &Dispatcher, _args: &[String]) -> Result<()> {
        let hosts = dispatcher.hosts().await;
        if hosts.is_empty() {
            dispatcher.print("No hosts connected");
            return Ok(());
        }

        let selected = dispatcher.selected().await;
        for (index, host) in hosts.iter().enumerate() {
            let mark = if selected.contains(host) { "*" } else { " " };
            let state = if host.is_closed() { " [closed]" } else { "" };
            dispatcher.print(format!("{}[{}] {}{}", mark, index, host, state));
        }
        Ok(())
    }
}

struct Select;

#[async_trait]
impl ServerCommand for Select {
    async fn run(&self, dispatcher: &Dispatcher, args: &[String]) -> Result<()> {
        let selected = dispatcher.select_ids(args).await?;
        dispatcher.print(format!("Selected {} hosts", selected.len()));
        Ok(())
    }
}

struct SelectAll;

#[async_trait]
impl ServerCommand for SelectAll {
    async fn run(&self, dispatcher: &Dispatcher, _args: &[String]) -> Result<()> {
        let selected = dispatcher.select_all().await;
        dispatcher.print(format!("Selected {} hosts", selected.len()));
        Ok(())
    }
}

struct Clean;

#[async_trait]
impl ServerCommand for Clean {
    async fn run(&self, dispatcher: &Dispatcher, _args: &[String]) -> Result<()> {
        let removed = dispatcher.clean().await;
        dispatcher.print(format!("Removed {} closed hosts", removed));
        Ok(())
    }
}

struct Exit;

#[async_trait]
impl ServerCommand for Exit {
    async fn run(&self, dispatcher: &Dispatcher, _args: &[String]) -> Result<()> {
        let result = dispatcher.shutdown().await;
        for host in dispatcher.hosts().await {
            host.close().await;
        }
        info!("Exit requested");
        result
    }
}

struct Info;

#[async_trait]
impl HostCommand for Info {
    async fn run(&self, host: &Host, _args: &[String]) -> Result<Option<String>> {
        Ok(Some(format!("{} id={}", host, host.id())))
    }
}

struct Close;

#[async_trait]
impl HostCommand for Close {
    async fn run(&self, host: &Host, _args: &[String]) -> Result<Option<String>> {
        host.close().await;
        Ok(None)
    }
}
