//! The in-memory topology graph (§4.1).
//!
//! Nodes are switch dpids (lowercase hex strings); edges are undirected
//! and keyed canonically so `(a, b)` and `(b, a)` denote the same edge.
//! Path search is plain DFS with a transient `visited` bit per node —
//! topologies here are small (tens of switches), so no shortest-path
//! machinery is needed (§4.1).

use std::collections::HashMap;

use serde::Serialize;

/// A switch's neighbor entry: the local port leading to `dpid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    pub port: u32,
    pub dpid: String,
}

#[derive(Debug, Clone, Default)]
struct SwitchNode {
    neighbors: Vec<Neighbor>,
    visited: bool,
}

/// Canonical, order-independent key for an undirected edge.
fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// The undirected, labeled switch graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: HashMap<String, SwitchNode>,
    edges: std::collections::HashSet<(String, String)>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node if it doesn't already exist. Idempotent.
    pub fn add_node(&mut self, dpid: &str) {
        self.nodes.entry(dpid.to_string()).or_default();
    }

    /// Record an undirected edge between `a` and `b`, reached via
    /// `port_a` from `a`'s side and `port_b` from `b`'s side. Both
    /// directions are added to the respective neighbor lists if not
    /// already present.
    pub fn add_edge(&mut self, a: &str, port_a: u32, b: &str, port_b: u32) {
        self.add_node(a);
        self.add_node(b);
        self.edges.insert(edge_key(a, b));

        if let Some(node) = self.nodes.get_mut(a) {
            if !node.neighbors.iter().any(|n| n.dpid == b && n.port == port_a) {
                node.neighbors.push(Neighbor {
                    port: port_a,
                    dpid: b.to_string(),
                });
            }
        }
        if let Some(node) = self.nodes.get_mut(b) {
            if !node.neighbors.iter().any(|n| n.dpid == a && n.port == port_b) {
                node.neighbors.push(Neighbor {
                    port: port_b,
                    dpid: a.to_string(),
                });
            }
        }
    }

    /// Record a one-sided neighbor observation: `from` can reach `to`
    /// via `port`. Used by the topology loader, which ingests one
    /// directed link record at a time and relies on a separate
    /// reciprocal record (or pruning) to establish symmetry (§4.2).
    pub fn add_directed_neighbor(&mut self, from: &str, port: u32, to: &str) {
        self.add_node(from);
        self.add_node(to);
        self.edges.insert(edge_key(from, to));
        if let Some(node) = self.nodes.get_mut(from) {
            if !node.neighbors.iter().any(|n| n.dpid == to && n.port == port) {
                node.neighbors.push(Neighbor {
                    port,
                    dpid: to.to_string(),
                });
            }
        }
    }

    /// Drop every neighbor entry `a -> b` that lacks a reciprocal entry
    /// `b -> a` (ignoring port), and the edge between them (§4.2). The
    /// SDN controller's topology REST occasionally reports spurious
    /// one-way links on dense fat-tree topologies; this sweep removes
    /// them deterministically. Idempotent.
    pub fn prune_asymmetric_links(&mut self) {
        let dpids: Vec<String> = self.nodes.keys().cloned().collect();
        for dpid in &dpids {
            let neighbors = self.get_neighbors(dpid).to_vec();
            for nb in neighbors {
                let reciprocal = self
                    .nodes
                    .get(&nb.dpid)
                    .map(|n| n.neighbors.iter().any(|back| back.dpid == *dpid))
                    .unwrap_or(false);
                if !reciprocal {
                    if let Some(node) = self.nodes.get_mut(dpid) {
                        node.neighbors.retain(|n| n.dpid != nb.dpid);
                    }
                    self.edges.remove(&edge_key(dpid, &nb.dpid));
                }
            }
        }
    }

    /// Remove the edge between `a` and `b` and drop both neighbor entries.
    pub fn delete_edge(&mut self, a: &str, b: &str) -> bool {
        let removed = self.edges.remove(&edge_key(a, b));
        if removed {
            if let Some(node) = self.nodes.get_mut(a) {
                node.neighbors.retain(|n| n.dpid != b);
            }
            if let Some(node) = self.nodes.get_mut(b) {
                node.neighbors.retain(|n| n.dpid != a);
            }
        }
        removed
    }

    /// Drop a node, its neighbor entries, and every edge touching it.
    pub fn remove_node(&mut self, dpid: &str) {
        self.remove_all_edges_of(dpid);
        self.nodes.remove(dpid);
    }

    /// Delete every edge touching `dpid` without removing the node itself.
    pub fn remove_all_edges_of(&mut self, dpid: &str) {
        let neighbor_dpids: Vec<String> = self
            .nodes
            .get(dpid)
            .map(|n| n.neighbors.iter().map(|nb| nb.dpid.clone()).collect())
            .unwrap_or_default();
        for neighbor in neighbor_dpids {
            self.delete_edge(dpid, &neighbor);
        }
    }

    pub fn has_node(&self, dpid: &str) -> bool {
        self.nodes.contains_key(dpid)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Neighbors of `dpid` in insertion order, or an empty slice if the
    /// node doesn't exist.
    pub fn get_neighbors(&self, dpid: &str) -> &[Neighbor] {
        self.nodes
            .get(dpid)
            .map(|n| n.neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Port on `from` leading to `to`, or `None` if they aren't neighbors.
    pub fn port_to(&self, from: &str, to: &str) -> Option<u32> {
        self.get_neighbors(from)
            .iter()
            .find(|n| n.dpid == to)
            .map(|n| n.port)
    }

    pub fn set_visited(&mut self, dpid: &str, visited: bool) {
        if let Some(node) = self.nodes.get_mut(dpid) {
            node.visited = visited;
        }
    }

    /// Clear the visited bit on every node. Callers must do this before
    /// each `path` search (§4.1: "Caller must reset_visited before each
    /// search; this is the compiler's responsibility").
    pub fn reset_visited(&mut self) {
        for node in self.nodes.values_mut() {
            node.visited = false;
        }
    }

    /// Depth-first search from `src` to `dst`, returning the first
    /// discovered path (inclusive of both endpoints) in neighbor
    /// insertion order, or `None` if no path exists. Marks nodes
    /// visited along the way; does not reset visited bits itself.
    pub fn path(&mut self, src: &str, dst: &str) -> Option<Vec<String>> {
        if !self.nodes.contains_key(src) {
            return None;
        }
        self.path_inner(src, dst)
    }

    fn path_inner(&mut self, src: &str, dst: &str) -> Option<Vec<String>> {
        if self.nodes.get(src).map(|n| n.visited).unwrap_or(true) {
            return None;
        }
        self.set_visited(src, true);

        if src == dst {
            return Some(vec![src.to_string()]);
        }

        let neighbors: Vec<String> = self
            .get_neighbors(src)
            .iter()
            .map(|n| n.dpid.clone())
            .collect();

        for neighbor in neighbors {
            if let Some(mut tail) = self.path_inner(&neighbor, dst) {
                let mut out = vec![src.to_string()];
                out.append(&mut tail);
                return Some(out);
            }
        }

        None
    }
}
