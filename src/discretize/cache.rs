//! Cache of local discretization results.
//!
//! Node entries are keyed by (entity, variable, operator), coupling entries by
//! (interface, coupling name). Every entry remembers what it was computed
//! from: the binding/term generation and the parameter version of each
//! entity it read. A coupling entry additionally remembers the stamps of the
//! two endpoint node entries it consumed, so recomputing an endpoint makes
//! every coupling built on it stale, and the sizes of the three blocks it
//! targets, so re-declaring a selected variable with another layout does too.

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::capability::{CouplingContribution, LocalDiscretization};
use crate::registry::names::{CouplingName, OperatorName, VariableName};
use crate::registry::registry::Registry;
use crate::topology::handle::{EntityId, InterfaceId};

/// Key of a node discretization result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub entity: EntityId,
    pub variable: VariableName,
    pub operator: OperatorName,
}

/// Key of a coupling discretization result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CouplingKey {
    pub interface: InterfaceId,
    pub name: CouplingName,
}

#[derive(Clone, Debug)]
pub(crate) struct NodeEntry {
    pub(crate) generation: u64,
    pub(crate) version: u64,
    pub(crate) stamp: u64,
    pub(crate) result: Arc<LocalDiscretization>,
}

#[derive(Clone, Debug)]
pub(crate) struct CouplingEntry {
    pub(crate) generation: u64,
    /// Parameter versions of (interface, primary, secondary).
    pub(crate) versions: [u64; 3],
    /// Stamps of the (primary, secondary) node entries consumed.
    pub(crate) endpoint_stamps: [u64; 2],
    /// Sizes of the (primary, secondary, interface) blocks written into.
    pub(crate) block_sizes: [usize; 3],
    pub(crate) endpoints: [EntityId; 2],
    pub(crate) result: Arc<CouplingContribution>,
}

/// Local results of the last successful discretization pass.
#[derive(Clone, Debug, Default)]
pub struct DiscretizationCache {
    nodes: HashMap<NodeKey, NodeEntry>,
    couplings: HashMap<CouplingKey, CouplingEntry>,
    next_stamp: u64,
}

impl DiscretizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached node result, if any.
    pub fn node(
        &self,
        entity: EntityId,
        variable: &VariableName,
        operator: &OperatorName,
    ) -> Option<&Arc<LocalDiscretization>> {
        let key = NodeKey {
            entity,
            variable: variable.clone(),
            operator: operator.clone(),
        };
        self.nodes.get(&key).map(|e| &e.result)
    }

    /// Cached coupling result, if any.
    pub fn coupling(
        &self,
        interface: InterfaceId,
        name: &CouplingName,
    ) -> Option<&Arc<CouplingContribution>> {
        let key = CouplingKey {
            interface,
            name: name.clone(),
        };
        self.couplings.get(&key).map(|e| &e.result)
    }

    /// Number of cached node results.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of cached coupling results.
    pub fn num_couplings(&self) -> usize {
        self.couplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.couplings.is_empty()
    }

    /// Drops every entry that read data of `entity`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_entity(&mut self, entity: EntityId) -> usize {
        let before = self.nodes.len() + self.couplings.len();
        self.nodes.retain(|k, _| k.entity != entity);
        self.couplings.retain(|k, e| {
            EntityId::from(k.interface) != entity && !e.endpoints.contains(&entity)
        });
        before - (self.nodes.len() + self.couplings.len())
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.couplings.clear();
    }

    /// Drops entries whose binding or coupling term is no longer registered.
    pub fn retain_registered(&mut self, registry: &Registry) {
        self.nodes.retain(|k, e| {
            registry
                .binding(k.entity, &k.variable, &k.operator)
                .is_some_and(|b| b.generation() == e.generation)
        });
        self.couplings.retain(|k, e| {
            registry
                .coupling(k.interface, &k.name)
                .is_some_and(|c| c.generation() == e.generation)
        });
    }

    pub(crate) fn node_entry(&self, key: &NodeKey) -> Option<&NodeEntry> {
        self.nodes.get(key)
    }

    pub(crate) fn coupling_entry(&self, key: &CouplingKey) -> Option<&CouplingEntry> {
        self.couplings.get(key)
    }

    pub(crate) fn fresh_stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    pub(crate) fn commit(
        &mut self,
        nodes: Vec<(NodeKey, NodeEntry)>,
        couplings: Vec<(CouplingKey, CouplingEntry)>,
    ) {
        self.nodes.extend(nodes);
        self.couplings.extend(couplings);
    }
}
