// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Copy-on-Write Snapshots

use std::ops::Deref;
use std::sync::Arc;

use super::WaterNetwork;

/// Copy-on-write handle over a [`WaterNetwork`].
///
/// Forks share the underlying network until one of them asks for
/// [`make_mut`](Self::make_mut), which clones the network for that fork only.
/// Other holders, including the base, never observe the change.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    network: Arc<WaterNetwork>,
}

impl NetworkSnapshot {
    pub fn new(network: WaterNetwork) -> Self {
        Self { network: Arc::new(network) }
    }

    /// Cheap scenario-private handle. No data is copied until it is mutated.
    pub fn fork(&self) -> Self {
        Self { network: Arc::clone(&self.network) }
    }

    pub fn network(&self) -> &WaterNetwork {
        &self.network
    }

    pub fn make_mut(&mut self) -> &mut WaterNetwork {
        Arc::make_mut(&mut self.network)
    }

    /// Whether both handles still point at the same network storage.
    pub fn shares_storage_with(&self, other: &NetworkSnapshot) -> bool {
        Arc::ptr_eq(&self.network, &other.network)
    }
}

impl Deref for NetworkSnapshot {
    type Target = WaterNetwork;

    fn deref(&self) -> &WaterNetwork {
        &self.network
    }
}

impl From<WaterNetwork> for NetworkSnapshot {
    fn from(network: WaterNetwork) -> Self {
        Self::new(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Link, Node};

    #[test]
    fn test_fork_is_isolated_after_mutation() {
        let mut wn = WaterNetwork::new();
        wn.add_node(Node::junction("J1", 0.01, 0.0)).unwrap();
        wn.add_node(Node::junction("J2", 0.01, 0.0)).unwrap();
        wn.add_link(Link::pipe("P1", "J1", "J2", 100.0, 0.2)).unwrap();
        let base = NetworkSnapshot::new(wn);

        let mut fork = base.fork();
        assert!(fork.shares_storage_with(&base));

        fork.make_mut().split_pipe("P1").unwrap();
        assert!(!fork.shares_storage_with(&base));
        assert!(fork.node("Leak_P1").is_some());
        assert!(base.node("Leak_P1").is_none());
        assert!((base.pipe("P1").unwrap().length - 100.0).abs() < f64::EPSILON);
    }
}
