// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Damage Injection
//
// Turns a damage plan into a scenario-private network: every failed pipe is
// split at its midpoint and the new junction gets an orifice leak.

use tracing::trace;

use crate::config::HydraulicConfig;
use crate::damage::DamagePlan;
use crate::network::{NetworkError, NetworkSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("failed to inject leak at pipe '{pipe}': {source}")]
    Inject {
        pipe: String,
        #[source]
        source: NetworkError,
    },
}

/// Leak activity window, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakWindow {
    pub start_hours: i64,
    pub end_hours: i64,
}

impl From<&HydraulicConfig> for LeakWindow {
    fn from(config: &HydraulicConfig) -> Self {
        Self {
            start_hours: config.leak_start_time,
            end_hours: config.leak_end_time,
        }
    }
}

pub struct NetworkMutator {
    window: LeakWindow,
}

impl NetworkMutator {
    pub fn new(window: LeakWindow) -> Self {
        Self { window }
    }

    /// Produce a scenario-private snapshot with the plan's leaks inserted.
    ///
    /// `base` is only read. An empty plan returns a fork that still shares
    /// the base storage. Zero-area entries are inserted like any other.
    pub fn apply(
        &self,
        base: &NetworkSnapshot,
        plan: &DamagePlan,
    ) -> Result<NetworkSnapshot, MutationError> {
        let mut snapshot = base.fork();
        if plan.is_empty() {
            return Ok(snapshot);
        }

        let network = snapshot.make_mut();
        for entry in plan.entries() {
            let wrap = |source| MutationError::Inject { pipe: entry.pipe_id.clone(), source };
            let leak_node = network.split_pipe(&entry.pipe_id).map_err(wrap)?;
            network
                .add_leak(
                    &leak_node,
                    entry.orifice_area,
                    self.window.start_hours,
                    self.window.end_hours,
                )
                .map_err(wrap)?;
            trace!(pipe = %entry.pipe_id, node = %leak_node, area = entry.orifice_area, "leak inserted");
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Link, Node, WaterNetwork};

    fn base() -> NetworkSnapshot {
        let mut wn = WaterNetwork::new();
        wn.add_node(Node::reservoir("R1", 50.0)).unwrap();
        wn.add_node(Node::junction("J1", 0.01, 0.0)).unwrap();
        wn.add_node(Node::junction("J2", 0.01, 0.0)).unwrap();
        wn.add_link(Link::pipe("P1", "R1", "J1", 400.0, 0.3)).unwrap();
        wn.add_link(Link::pipe("P2", "J1", "J2", 400.0, 0.3)).unwrap();
        NetworkSnapshot::new(wn)
    }

    fn mutator() -> NetworkMutator {
        NetworkMutator::new(LeakWindow { start_hours: 1, end_hours: 12 })
    }

    #[test]
    fn test_empty_plan_shares_base() {
        let base = base();
        let out = mutator().apply(&base, &DamagePlan::new()).unwrap();
        assert!(out.shares_storage_with(&base));
        assert_eq!(out.network(), base.network());
    }

    #[test]
    fn test_leaks_inserted_without_touching_base() {
        let base = base();
        let before = base.network().clone();
        let mut plan = DamagePlan::new();
        plan.insert("P1", 0.002).unwrap();
        plan.insert("P2", 0.0).unwrap();

        let out = mutator().apply(&base, &plan).unwrap();
        assert_eq!(base.network(), &before);
        assert_eq!(out.leak_count(), 2);

        let leak = out.node("Leak_P1").unwrap().leak().copied().unwrap();
        assert!((leak.area - 0.002).abs() < f64::EPSILON);
        assert_eq!((leak.start_hours, leak.end_hours), (1, 12));
        // zero-area entries still produce a (structurally inert) leak node
        assert_eq!(out.node("Leak_P2").unwrap().leak().unwrap().area, 0.0);
    }

    #[test]
    fn test_plan_order_does_not_change_topology() {
        let base = base();
        let mut forward = DamagePlan::new();
        forward.insert("P1", 0.01).unwrap();
        forward.insert("P2", 0.02).unwrap();
        let mut reverse = DamagePlan::new();
        reverse.insert("P2", 0.02).unwrap();
        reverse.insert("P1", 0.01).unwrap();

        let a = mutator().apply(&base, &forward).unwrap();
        let b = mutator().apply(&base, &reverse).unwrap();
        for id in ["Leak_P1", "Leak_P2"] {
            assert_eq!(a.node(id), b.node(id));
        }
        for id in ["P1", "P1_B", "P2", "P2_B"] {
            assert_eq!(a.link(id), b.link(id));
        }
    }

    #[test]
    fn test_unknown_pipe_in_plan_fails() {
        let mut plan = DamagePlan::new();
        plan.insert("P404", 0.01).unwrap();
        let err = mutator().apply(&base(), &plan).unwrap_err();
        assert!(matches!(err, MutationError::Inject { ref pipe, .. } if pipe == "P404"));
    }
}
