//! TopologyGraph: subdomains (nodes) and interfaces (edges) of a coupled problem.
//!
//! Each entity is an arena record indexed by its handle. The record owns the
//! entity's [`Geometry`] and an [`EntityData`] block carrying parameters and a
//! parameter version counter. Consumers address entities by handle only; the
//! graph never hands out long-lived references into its arenas, so the
//! dispatcher can read geometry and parameters of many entities at once.

use crate::assembly_error::{AssemblyError, ConfigurationError};
use crate::debug_invariants::DebugInvariants;
use crate::topology::geometry::Geometry;
use crate::topology::handle::{EntityId, InterfaceId, SubdomainId};
use crate::topology::parameters::{Keyword, ParamValue, Parameters};

/// Mutable per-entity data: parameters plus a version bumped on every change.
#[derive(Clone, Debug, Default)]
pub struct EntityData {
    parameters: Parameters,
    version: u64,
}

impl EntityData {
    /// Parameter sets of the entity.
    #[inline]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Monotonic version that changes whenever the parameters change.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

#[derive(Clone, Debug)]
struct SubdomainRecord {
    geometry: Geometry,
    data: EntityData,
    /// Incident interfaces in creation order.
    interfaces: Vec<InterfaceId>,
}

#[derive(Clone, Debug)]
struct InterfaceRecord {
    geometry: Geometry,
    data: EntityData,
    endpoints: (SubdomainId, SubdomainId),
}

/// Undirected graph of subdomains joined by interfaces.
#[derive(Clone, Debug, Default)]
pub struct TopologyGraph {
    subdomains: Vec<SubdomainRecord>,
    interfaces: Vec<InterfaceRecord>,
}

impl TopologyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subdomain and returns its handle.
    pub fn add_subdomain(&mut self, geometry: Geometry) -> SubdomainId {
        let id = SubdomainId::from_index(self.subdomains.len());
        self.subdomains.push(SubdomainRecord {
            geometry,
            data: EntityData::default(),
            interfaces: Vec::new(),
        });
        id
    }

    /// Adds an interface between two distinct, existing subdomains.
    ///
    /// # Errors
    /// `UnknownEntity` if either endpoint is not in this graph,
    /// `SelfLoopInterface` if `a == b`.
    pub fn add_interface(
        &mut self,
        a: SubdomainId,
        b: SubdomainId,
        geometry: Geometry,
    ) -> Result<InterfaceId, AssemblyError> {
        self.check_subdomain(a)?;
        self.check_subdomain(b)?;
        if a == b {
            return Err(ConfigurationError::SelfLoopInterface(a).into());
        }
        let id = InterfaceId::from_index(self.interfaces.len());
        self.interfaces.push(InterfaceRecord {
            geometry,
            data: EntityData::default(),
            endpoints: (a, b),
        });
        self.subdomains[a.index()].interfaces.push(id);
        self.subdomains[b.index()].interfaces.push(id);
        self.debug_assert_invariants();
        Ok(id)
    }

    /// Number of subdomains.
    #[inline]
    pub fn num_subdomains(&self) -> usize {
        self.subdomains.len()
    }

    /// Number of interfaces.
    #[inline]
    pub fn num_interfaces(&self) -> usize {
        self.interfaces.len()
    }

    /// Subdomain handles in creation order.
    pub fn subdomains(&self) -> impl Iterator<Item = SubdomainId> + '_ {
        (0..self.subdomains.len()).map(SubdomainId::from_index)
    }

    /// Interface handles in creation order.
    pub fn interfaces(&self) -> impl Iterator<Item = InterfaceId> + '_ {
        (0..self.interfaces.len()).map(InterfaceId::from_index)
    }

    /// All entities: subdomains first, then interfaces, each in creation order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.subdomains()
            .map(EntityId::from)
            .chain(self.interfaces().map(EntityId::from))
    }

    /// Whether `entity` belongs to this graph.
    pub fn contains(&self, entity: EntityId) -> bool {
        match entity {
            EntityId::Subdomain(s) => s.index() < self.subdomains.len(),
            EntityId::Interface(e) => e.index() < self.interfaces.len(),
        }
    }

    /// Geometry of an entity.
    pub fn geometry(&self, entity: EntityId) -> Result<&Geometry, AssemblyError> {
        match entity {
            EntityId::Subdomain(s) => self.subdomain(s).map(|r| &r.geometry),
            EntityId::Interface(e) => self.interface(e).map(|r| &r.geometry),
        }
    }

    /// Topological dimension of an entity.
    pub fn dimension(&self, entity: EntityId) -> Result<u8, AssemblyError> {
        self.geometry(entity).map(|g| g.dimension)
    }

    /// Parameter data record of an entity.
    pub fn data(&self, entity: EntityId) -> Result<&EntityData, AssemblyError> {
        match entity {
            EntityId::Subdomain(s) => self.subdomain(s).map(|r| &r.data),
            EntityId::Interface(e) => self.interface(e).map(|r| &r.data),
        }
    }

    /// Parameters of an entity.
    pub fn parameters(&self, entity: EntityId) -> Result<&Parameters, AssemblyError> {
        self.data(entity).map(EntityData::parameters)
    }

    /// Assigns a parameter value on an entity and bumps its version.
    ///
    /// Returns the previous value, if any.
    pub fn set_parameter(
        &mut self,
        entity: EntityId,
        keyword: &Keyword,
        name: impl Into<String>,
        value: ParamValue,
    ) -> Result<Option<ParamValue>, AssemblyError> {
        let data = self.data_mut(entity)?;
        let prev = data.parameters.set(keyword, name, value);
        data.touch();
        Ok(prev)
    }

    /// Replaces the whole parameter store of an entity and bumps its version.
    pub fn replace_parameters(
        &mut self,
        entity: EntityId,
        parameters: Parameters,
    ) -> Result<(), AssemblyError> {
        let data = self.data_mut(entity)?;
        data.parameters = parameters;
        data.touch();
        Ok(())
    }

    /// The two subdomains joined by `interface`, in the order given at creation.
    pub fn endpoints(
        &self,
        interface: InterfaceId,
    ) -> Result<(SubdomainId, SubdomainId), AssemblyError> {
        self.interface(interface).map(|r| r.endpoints)
    }

    /// Interfaces incident to `subdomain`, in creation order.
    pub fn interfaces_of(&self, subdomain: SubdomainId) -> Result<&[InterfaceId], AssemblyError> {
        self.subdomain(subdomain).map(|r| r.interfaces.as_slice())
    }

    /// Subdomains adjacent to `subdomain` through an interface, in interface order.
    pub fn neighbours(
        &self,
        subdomain: SubdomainId,
    ) -> Result<impl Iterator<Item = SubdomainId> + '_, AssemblyError> {
        let incident = self.interfaces_of(subdomain)?;
        Ok(incident.iter().map(move |&e| {
            let (a, b) = self.interfaces[e.index()].endpoints;
            if a == subdomain { b } else { a }
        }))
    }

    pub(crate) fn check_entity(&self, entity: EntityId) -> Result<(), AssemblyError> {
        if self.contains(entity) {
            Ok(())
        } else {
            Err(ConfigurationError::UnknownEntity(entity).into())
        }
    }

    fn check_subdomain(&self, s: SubdomainId) -> Result<(), AssemblyError> {
        self.check_entity(s.into())
    }

    fn subdomain(&self, s: SubdomainId) -> Result<&SubdomainRecord, AssemblyError> {
        self.subdomains
            .get(s.index())
            .ok_or_else(|| ConfigurationError::UnknownEntity(s.into()).into())
    }

    fn interface(&self, e: InterfaceId) -> Result<&InterfaceRecord, AssemblyError> {
        self.interfaces
            .get(e.index())
            .ok_or_else(|| ConfigurationError::UnknownEntity(e.into()).into())
    }

    fn data_mut(&mut self, entity: EntityId) -> Result<&mut EntityData, AssemblyError> {
        let slot = match entity {
            EntityId::Subdomain(s) => self.subdomains.get_mut(s.index()).map(|r| &mut r.data),
            EntityId::Interface(e) => self.interfaces.get_mut(e.index()).map(|r| &mut r.data),
        };
        slot.ok_or_else(|| ConfigurationError::UnknownEntity(entity).into())
    }
}

impl DebugInvariants for TopologyGraph {
    fn validate_invariants(&self) -> Result<(), AssemblyError> {
        for (i, rec) in self.interfaces.iter().enumerate() {
            let id = InterfaceId::from_index(i);
            let (a, b) = rec.endpoints;
            if a == b {
                return Err(AssemblyError::InvariantViolation(format!(
                    "{id} joins {a} to itself"
                )));
            }
            for s in [a, b] {
                let listed = self
                    .subdomains
                    .get(s.index())
                    .is_some_and(|r| r.interfaces.contains(&id));
                if !listed {
                    return Err(AssemblyError::InvariantViolation(format!(
                        "{id} missing from incidence list of {s}"
                    )));
                }
            }
        }
        for (i, rec) in self.subdomains.iter().enumerate() {
            let s = SubdomainId::from_index(i);
            for &e in &rec.interfaces {
                let joined = self
                    .interfaces
                    .get(e.index())
                    .is_some_and(|r| r.endpoints.0 == s || r.endpoints.1 == s);
                if !joined {
                    return Err(AssemblyError::InvariantViolation(format!(
                        "{s} lists {e} which does not touch it"
                    )));
                }
            }
        }
        Ok(())
    }
}
