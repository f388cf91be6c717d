//! Host registry and selection
//!
//! [`HostTable`] holds every accepted host in arrival order together with the
//! current selection. The dispatcher keeps one table behind a single lock so
//! the accept loop and command dispatch never observe each other half-way.

use crate::{Host, Result, TetherError};
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered hosts plus the selected subset
#[derive(Debug, Default)]
pub struct HostTable {
    /// All hosts, index = arrival order
    hosts: Vec<Arc<Host>>,
    /// Snapshot of selected hosts
    selected: Vec<Arc<Host>>,
}

impl HostTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a host, returning its index
    pub fn push(&mut self, host: Arc<Host>) -> usize {
        self.hosts.push(host);
        self.hosts.len() - 1
    }

    /// All hosts in arrival order
    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    /// Currently selected hosts
    pub fn selected(&self) -> &[Arc<Host>] {
        &self.selected
    }

    /// Host at a registry position
    pub fn get(&self, index: usize) -> Option<&Arc<Host>> {
        self.hosts.get(index)
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether there are no hosts
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Update the selection.
    ///
    /// `None` selects every host present right now; later arrivals are not
    /// added. An empty slice clears the selection. Otherwise each id is
    /// parsed as a registry index, in order, duplicates kept. All ids are
    /// resolved before anything changes, so on error the previous selection
    /// is left untouched.
    pub fn select<S: AsRef<str>>(&mut self, ids: Option<&[S]>) -> Result<&[Arc<Host>]> {
        match ids {
            None => self.select_all(),
            Some(ids) => {
                let resolved = self.resolve(ids)?;
                self.selected = resolved;
            }
        }
        debug!("Selected {} of {} hosts", self.selected.len(), self.hosts.len());
        Ok(&self.selected)
    }

    /// Select every host present right now
    pub fn select_all(&mut self) {
        self.selected = self.hosts.clone();
    }

    /// Clear the selection
    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    /// Resolve ids to hosts without touching the selection
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Arc<Host>>> {
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                let index: usize = id.trim().parse().map_err(|_| TetherError::InvalidHostId {
                    id: id.to_string(),
                    reason: "not a number".to_string(),
                })?;
                self.hosts.get(index).cloned().ok_or_else(|| TetherError::InvalidHostId {
                    id: id.to_string(),
                    reason: format!("out of range, {} hosts connected", self.hosts.len()),
                })
            })
            .collect()
    }

    /// Drop closed hosts from the registry and the selection, keeping the
    /// order of the rest. Returns how many registry entries were removed.
    pub fn clean(&mut self) -> usize {
        let before = self.hosts.len();
        self.hosts.retain(|host| !host.is_closed());
        self.selected.retain(|host| !host.is_closed());

        let removed = before - self.hosts.len();
        if removed > 0 {
            info!("Cleaned {} closed hosts, {} remaining", removed, self.hosts.len());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::connect_pair;
    use tokio::io::DuplexStream;

    const NONE: Option<&[&str]> = None;

    async fn table_of(n: u16) -> (HostTable, Vec<DuplexStream>) {
        let mut table = HostTable::new();
        let mut agents = Vec::new();
        for port in 0..n {
            let (host, agent) = connect_pair("1.0-full", port).await;
            table.push(Arc::new(host));
            agents.push(agent);
        }
        (table, agents)
    }

    fn ports(hosts: &[Arc<Host>]) -> Vec<u16> {
        hosts.iter().map(|h| h.port()).collect()
    }

    #[tokio::test]
    async fn test_push_returns_index() {
        let mut table = HostTable::new();
        let (host, _agent) = connect_pair("1.0-full", 7).await;
        assert_eq!(table.push(Arc::new(host)), 0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).unwrap().port(), 7);
    }

    #[tokio::test]
    async fn test_select_all() {
        let (mut table, _agents) = table_of(3).await;
        let selected = table.select(NONE).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[tokio::test]
    async fn test_select_all_is_a_snapshot() {
        let (mut table, _agents) = table_of(2).await;
        table.select(NONE).unwrap();

        let (late, _late_agent) = connect_pair("1.0-full", 99).await;
        table.push(Arc::new(late));

        assert_eq!(table.selected().len(), 2);
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_select_empty() {
        let (mut table, _agents) = table_of(3).await;
        table.select(NONE).unwrap();
        let empty: &[&str] = &[];
        assert!(table.select(Some(empty)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_select_ids_in_order() {
        let (mut table, _agents) = table_of(3).await;
        let selected = table.select(Some(&["0", "2"][..])).unwrap();
        assert_eq!(ports(selected), vec![0, 2]);

        let selected = table.select(Some(&["2", "0", "2"][..])).unwrap();
        assert_eq!(ports(selected), vec![2, 0, 2]);
    }

    #[tokio::test]
    async fn test_select_out_of_range_keeps_previous() {
        let (mut table, _agents) = table_of(3).await;
        table.select(Some(&["1"][..])).unwrap();

        let result = table.select(Some(&["0", "5"][..]));
        assert!(matches!(result, Err(TetherError::InvalidHostId { .. })));
        assert_eq!(ports(table.selected()), vec![1]);
    }

    #[tokio::test]
    async fn test_select_non_numeric_keeps_previous() {
        let (mut table, _agents) = table_of(3).await;
        table.select(NONE).unwrap();

        let result = table.select(Some(&["one"][..]));
        assert!(matches!(result, Err(TetherError::InvalidHostId { .. })));
        assert_eq!(table.selected().len(), 3);

        assert!(table.select(Some(&["-1"][..])).is_err());
    }

    #[tokio::test]
    async fn test_clean_removes_only_closed() {
        let (mut table, _agents) = table_of(4).await;
        table.select(NONE).unwrap();

        table.get(1).unwrap().close().await;
        table.get(3).unwrap().close().await;

        assert_eq!(table.clean(), 2);
        assert_eq!(ports(table.hosts()), vec![0, 2]);
        assert_eq!(ports(table.selected()), vec![0, 2]);
        assert!(table.hosts().iter().all(|h| !h.is_closed()));
    }

    #[tokio::test]
    async fn test_clean_without_closed_hosts() {
        let (mut table, _agents) = table_of(2).await;
        assert_eq!(table.clean(), 0);
        assert_eq!(table.len(), 2);
    }
}
