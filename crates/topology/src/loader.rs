//! Topology loader (C2, §4.2): pulls switches and links from the SDN
//! controller and builds the graph, pruning spurious one-way links.

use std::collections::HashMap;

use tracing::{debug, info};
use tsa_core::TsaError;
use tsa_graph::GraphStore;

use crate::rest::{LinkEntry, SwitchEntry};

pub struct TopologyLoader {
    client: reqwest::Client,
    base_url: String,
}

impl TopologyLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn fetch_switches(&self) -> Result<Vec<SwitchEntry>, TsaError> {
        let url = format!("{}/v1.0/topology/switches", self.base_url);
        let switches = self.client.get(&url).send().await?.json().await?;
        Ok(switches)
    }

    pub async fn fetch_links(&self) -> Result<Vec<LinkEntry>, TsaError> {
        let url = format!("{}/v1.0/topology/links", self.base_url);
        let links = self.client.get(&url).send().await?.json().await?;
        Ok(links)
    }

    /// Fetch switches and links and build the pruned graph in one call.
    pub async fn load(&self) -> Result<(GraphStore, Vec<SwitchEntry>), TsaError> {
        let switches = self.fetch_switches().await?;
        let links = self.fetch_links().await?;
        let graph = build_graph(&switches, &links);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "topology loaded"
        );
        Ok((graph, switches))
    }
}

/// Build the graph from a switches/links snapshot, including half-link
/// pruning. Exposed standalone so tests can exercise it without a
/// network round-trip.
pub fn build_graph(switches: &[SwitchEntry], links: &[LinkEntry]) -> GraphStore {
    let mut graph = GraphStore::new();

    for switch in switches {
        graph.add_node(&switch.dpid);
    }

    for link in links {
        debug!(src = %link.src.dpid, dst = %link.dst.dpid, "recording link");
        graph.add_directed_neighbor(&link.src.dpid, link.src.port_no, &link.dst.dpid);
    }

    graph.prune_asymmetric_links();
    graph
}

/// Find the dpid of the switch whose first port name has prefix
/// `"{switch_name}-"` (§4.3).
pub fn find_switch_by_name<'a>(switches: &'a [SwitchEntry], switch_name: &str) -> Option<&'a str> {
    let prefix = format!("{}-", switch_name);
    switches.iter().find_map(|s| {
        let first_port = s.ports.first()?;
        if first_port.name.starts_with(&prefix) {
            Some(s.dpid.as_str())
        } else {
            None
        }
    })
}

/// Index switches by dpid for convenience.
pub fn index_by_dpid(switches: &[SwitchEntry]) -> HashMap<&str, &SwitchEntry> {
    switches.iter().map(|s| (s.dpid.as_str(), s)).collect()
}
