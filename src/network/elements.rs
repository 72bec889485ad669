// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Network Elements
//
// Typed node and link variants. Only pipes carry length and diameter;
// callers resolve capabilities by matching on the variant.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Leaks
// ---------------------------------------------------------------------------

/// Orifice leak attached to a junction, active over `[start_hours, end_hours]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leak {
    pub area: f64,
    pub start_hours: i64,
    pub end_hours: i64,
}

impl Leak {
    /// Whether the leak discharges at simulation time `hour`.
    pub fn is_active_at(&self, hour: f64) -> bool {
        hour >= self.start_hours as f64 && hour <= self.end_hours as f64
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Junction {
        base_demand: f64,
        #[serde(default)]
        elevation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leak: Option<Leak>,
    },
    Tank {
        elevation: f64,
        #[serde(default)]
        init_level: f64,
    },
    Reservoir {
        head: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn junction(id: impl Into<String>, base_demand: f64, elevation: f64) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Junction { base_demand, elevation, leak: None },
        }
    }

    pub fn tank(id: impl Into<String>, elevation: f64, init_level: f64) -> Self {
        Self { id: id.into(), kind: NodeKind::Tank { elevation, init_level } }
    }

    pub fn reservoir(id: impl Into<String>, head: f64) -> Self {
        Self { id: id.into(), kind: NodeKind::Reservoir { head } }
    }

    pub fn is_junction(&self) -> bool {
        matches!(self.kind, NodeKind::Junction { .. })
    }

    pub fn base_demand(&self) -> f64 {
        match self.kind {
            NodeKind::Junction { base_demand, .. } => base_demand,
            _ => 0.0,
        }
    }

    pub fn leak(&self) -> Option<&Leak> {
        match &self.kind {
            NodeKind::Junction { leak, .. } => leak.as_ref(),
            _ => None,
        }
    }

    /// Elevation for junctions and tanks, total head for reservoirs.
    pub fn elevation(&self) -> f64 {
        match self.kind {
            NodeKind::Junction { elevation, .. } => elevation,
            NodeKind::Tank { elevation, .. } => elevation,
            NodeKind::Reservoir { head } => head,
        }
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Physical attributes of a pipe. Length in feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeAttributes {
    pub pipe_id: String,
    pub length: f64,
    pub diameter: f64,
}

impl PipeAttributes {
    /// Full-bore cross-sectional area, `π (d/2)²`.
    pub fn cross_section_area(&self) -> f64 {
        std::f64::consts::PI * (self.diameter / 2.0).powi(2)
    }
}

fn default_roughness() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkKind {
    Pipe {
        length: f64,
        diameter: f64,
        #[serde(default = "default_roughness")]
        roughness: f64,
    },
    Pump {
        #[serde(default)]
        power: f64,
    },
    Valve {
        #[serde(default)]
        setting: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub start_node: String,
    pub end_node: String,
    #[serde(flatten)]
    pub kind: LinkKind,
}

impl Link {
    pub fn pipe(
        id: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
        length: f64,
        diameter: f64,
    ) -> Self {
        Self {
            id: id.into(),
            start_node: start_node.into(),
            end_node: end_node.into(),
            kind: LinkKind::Pipe { length, diameter, roughness: default_roughness() },
        }
    }

    pub fn pump(
        id: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
        power: f64,
    ) -> Self {
        Self {
            id: id.into(),
            start_node: start_node.into(),
            end_node: end_node.into(),
            kind: LinkKind::Pump { power },
        }
    }

    pub fn valve(
        id: impl Into<String>,
        start_node: impl Into<String>,
        end_node: impl Into<String>,
        setting: f64,
    ) -> Self {
        Self {
            id: id.into(),
            start_node: start_node.into(),
            end_node: end_node.into(),
            kind: LinkKind::Valve { setting },
        }
    }

    /// Pipe attributes, or `None` for pumps and valves.
    pub fn pipe_attributes(&self) -> Option<PipeAttributes> {
        match self.kind {
            LinkKind::Pipe { length, diameter, .. } => Some(PipeAttributes {
                pipe_id: self.id.clone(),
                length,
                diameter,
            }),
            LinkKind::Pump { .. } | LinkKind::Valve { .. } => None,
        }
    }

    pub fn connects(&self, node_id: &str) -> bool {
        self.start_node == node_id || self.end_node == node_id
    }
}

/// Any named element of a network.
#[derive(Debug, Clone, Copy)]
pub enum ElementRef<'a> {
    Node(&'a Node),
    Link(&'a Link),
}
