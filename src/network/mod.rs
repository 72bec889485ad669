// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Water Network Topology

//! Water-distribution topology: typed elements, name lookup, and the two
//! mutations damage injection needs (`split_pipe`, `add_leak`).

pub mod elements;
pub mod snapshot;

pub use elements::{ElementRef, Leak, Link, LinkKind, Node, NodeKind, PipeAttributes};
pub use snapshot::NetworkSnapshot;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("unknown link '{0}'")]
    UnknownLink(String),

    #[error("link '{0}' is not a pipe")]
    NotAPipe(String),

    #[error("node '{0}' is not a junction")]
    NotAJunction(String),

    #[error("duplicate element id '{0}'")]
    DuplicateId(String),

    #[error("link '{link}' references missing node '{node}'")]
    DanglingLink { link: String, node: String },

    #[error("invalid leak area {area} at node '{node}'")]
    InvalidLeakArea { node: String, area: f64 },

    #[error("leak window [{start}, {end}] at node '{node}' is invalid")]
    InvalidLeakWindow { node: String, start: i64, end: i64 },

    #[error("failed to read network file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse network: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// WaterNetwork
// ---------------------------------------------------------------------------

/// Serialized form: plain element lists. Indexes are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkDef {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkDef", into = "NetworkDef")]
pub struct WaterNetwork {
    nodes: Vec<Node>,
    links: Vec<Link>,
    node_index: HashMap<String, usize>,
    link_index: HashMap<String, usize>,
}

impl TryFrom<NetworkDef> for WaterNetwork {
    type Error = NetworkError;

    fn try_from(def: NetworkDef) -> Result<Self, Self::Error> {
        let mut network = WaterNetwork::new();
        for node in def.nodes {
            network.add_node(node)?;
        }
        for link in def.links {
            network.add_link(link)?;
        }
        Ok(network)
    }
}

impl From<WaterNetwork> for NetworkDef {
    fn from(network: WaterNetwork) -> Self {
        NetworkDef { nodes: network.nodes, links: network.links }
    }
}

impl WaterNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, NetworkError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a network description written as `{"nodes": [...], "links": [...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, NetworkError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn id_taken(&self, id: &str) -> bool {
        self.node_index.contains_key(id) || self.link_index.contains_key(id)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), NetworkError> {
        if self.id_taken(&node.id) {
            return Err(NetworkError::DuplicateId(node.id));
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add a link. Both endpoints must already exist.
    pub fn add_link(&mut self, link: Link) -> Result<(), NetworkError> {
        if self.id_taken(&link.id) {
            return Err(NetworkError::DuplicateId(link.id));
        }
        for endpoint in [&link.start_node, &link.end_node] {
            if !self.node_index.contains_key(endpoint) {
                return Err(NetworkError::DanglingLink {
                    link: link.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        self.link_index.insert(link.id.clone(), self.links.len());
        self.links.push(link);
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.link_index.get(id).map(|&i| &self.links[i])
    }

    pub fn element(&self, id: &str) -> Option<ElementRef<'_>> {
        self.node(id)
            .map(ElementRef::Node)
            .or_else(|| self.link(id).map(ElementRef::Link))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_taken(id)
    }

    /// Pipe attributes for `id`, `None` if it is not a pipe (or unknown).
    pub fn pipe(&self, id: &str) -> Option<PipeAttributes> {
        self.link(id).and_then(Link::pipe_attributes)
    }

    /// Junctions in insertion order.
    pub fn junctions(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_junction())
    }

    pub fn links_for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links.iter().filter(move |l| l.connects(node_id))
    }

    pub fn leak_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.leak().is_some()).count()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Split pipe `pipe_id` at its midpoint.
    ///
    /// The original pipe keeps its id and now ends at a new junction
    /// `Leak_{pipe_id}`; a new pipe `{pipe_id}_B` carries the second half to
    /// the old end node. Returns the id of the new junction.
    pub fn split_pipe(&mut self, pipe_id: &str) -> Result<String, NetworkError> {
        let link_pos = *self
            .link_index
            .get(pipe_id)
            .ok_or_else(|| NetworkError::UnknownLink(pipe_id.to_string()))?;
        let (length, diameter, roughness) = match self.links[link_pos].kind {
            LinkKind::Pipe { length, diameter, roughness } => (length, diameter, roughness),
            _ => return Err(NetworkError::NotAPipe(pipe_id.to_string())),
        };

        let new_node_id = format!("Leak_{pipe_id}");
        let new_pipe_id = format!("{pipe_id}_B");
        for id in [&new_node_id, &new_pipe_id] {
            if self.id_taken(id) {
                return Err(NetworkError::DuplicateId(id.clone()));
            }
        }

        let start = self.links[link_pos].start_node.clone();
        let end = self.links[link_pos].end_node.clone();
        let elevation = match (self.node(&start), self.node(&end)) {
            (Some(a), Some(b)) => (a.elevation() + b.elevation()) / 2.0,
            _ => 0.0,
        };

        self.add_node(Node::junction(new_node_id.clone(), 0.0, elevation))?;

        let half = length / 2.0;
        {
            let original = &mut self.links[link_pos];
            original.end_node = new_node_id.clone();
            original.kind = LinkKind::Pipe { length: half, diameter, roughness };
        }
        self.add_link(Link {
            id: new_pipe_id,
            start_node: new_node_id.clone(),
            end_node: end,
            kind: LinkKind::Pipe { length: half, diameter, roughness },
        })?;

        Ok(new_node_id)
    }

    /// Attach an orifice leak to junction `node_id`.
    pub fn add_leak(
        &mut self,
        node_id: &str,
        area: f64,
        start_hours: i64,
        end_hours: i64,
    ) -> Result<(), NetworkError> {
        if !area.is_finite() || area < 0.0 {
            return Err(NetworkError::InvalidLeakArea { node: node_id.to_string(), area });
        }
        if start_hours < 0 || end_hours < start_hours {
            return Err(NetworkError::InvalidLeakWindow {
                node: node_id.to_string(),
                start: start_hours,
                end: end_hours,
            });
        }
        let pos = *self
            .node_index
            .get(node_id)
            .ok_or_else(|| NetworkError::UnknownNode(node_id.to_string()))?;
        match &mut self.nodes[pos].kind {
            NodeKind::Junction { leak, .. } => {
                *leak = Some(Leak { area, start_hours, end_hours });
                Ok(())
            }
            _ => Err(NetworkError::NotAJunction(node_id.to_string())),
        }
    }
}
