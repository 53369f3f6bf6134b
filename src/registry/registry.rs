//! Registry: variables, operator bindings and coupling terms per entity.
//!
//! Registrations are stored in per-kind arenas indexed by the entity handle,
//! mirroring the [`TopologyGraph`] layout. Every registration call validates
//! its arguments against the graph and the current registry contents before
//! mutating anything, so a rejected call leaves the registry untouched.
//!
//! Each operator binding and coupling term receives a registry-unique
//! generation number. Caches key their entries by that generation, so
//! re-binding an operator under the same name is never mistaken for the old
//! binding.

use std::sync::Arc;

use crate::assembly_error::{AssemblyError, ConfigurationError};
use crate::registry::capability::{CouplingDiscretization, NodeDiscretization};
use crate::registry::layout::DofLayout;
use crate::registry::names::{CouplingName, OperatorName, VariableName};
use crate::topology::graph::TopologyGraph;
use crate::topology::handle::{EntityId, InterfaceId, SubdomainId};

/// A declared variable on an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: VariableName,
    pub layout: DofLayout,
}

/// (variable, operator) → discretization capability.
#[derive(Clone, Debug)]
pub struct OperatorBinding {
    pub variable: VariableName,
    pub operator: OperatorName,
    pub capability: Arc<dyn NodeDiscretization>,
    generation: u64,
}

impl OperatorBinding {
    /// Registry-unique id of this binding.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Selects the (variable, operator) binding of one coupling endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSelector {
    pub subdomain: SubdomainId,
    pub variable: VariableName,
    pub operator: OperatorName,
}

impl EndpointSelector {
    pub fn new(subdomain: SubdomainId, variable: VariableName, operator: OperatorName) -> Self {
        Self {
            subdomain,
            variable,
            operator,
        }
    }
}

/// Selects the interface variable and coupling scheme of a coupling term.
#[derive(Clone, Debug)]
pub struct InterfaceSelector {
    pub interface: InterfaceId,
    pub variable: VariableName,
    pub capability: Arc<dyn CouplingDiscretization>,
}

impl InterfaceSelector {
    pub fn new(
        interface: InterfaceId,
        variable: VariableName,
        capability: Arc<dyn CouplingDiscretization>,
    ) -> Self {
        Self {
            interface,
            variable,
            capability,
        }
    }
}

/// Two subdomain endpoints and one interface, discretized together.
#[derive(Clone, Debug)]
pub struct CouplingTerm {
    pub name: CouplingName,
    pub primary: EndpointSelector,
    pub secondary: EndpointSelector,
    pub interface: InterfaceSelector,
    generation: u64,
}

impl CouplingTerm {
    /// Registry-unique id of this coupling term.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Describe the term for logs and error messages.
    pub fn label(&self) -> String {
        format!("coupling `{}` on {}", self.name, self.interface.interface)
    }
}

#[derive(Clone, Debug, Default)]
struct EntityRegistration {
    variables: Vec<VariableSpec>,
    bindings: Vec<OperatorBinding>,
    couplings: Vec<CouplingTerm>,
}

/// Variable and discretization registry of a problem configuration.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    subdomains: Vec<EntityRegistration>,
    interfaces: Vec<EntityRegistration>,
    next_generation: u64,
    version: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic version bumped by every successful mutation.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Declares a variable on an entity.
    ///
    /// # Errors
    /// `UnknownEntity`, `EmptyDofLayout` or `DuplicateVariable`.
    pub fn register_variable(
        &mut self,
        graph: &TopologyGraph,
        entity: EntityId,
        name: VariableName,
        layout: DofLayout,
    ) -> Result<(), AssemblyError> {
        graph.check_entity(entity)?;
        if layout.is_empty() {
            return Err(ConfigurationError::EmptyDofLayout(name).into());
        }
        if self.variable(entity, &name).is_some() {
            return Err(ConfigurationError::DuplicateVariable {
                entity,
                variable: name,
            }
            .into());
        }
        log::debug!("register variable `{name}` on {entity}: {layout:?}");
        self.slot_mut(entity)
            .variables
            .push(VariableSpec { name, layout });
        self.bump();
        Ok(())
    }

    /// Removes a variable together with its operator bindings.
    ///
    /// Coupling terms selecting the variable are kept; they fail with
    /// `MissingBinding` at discretization until re-registered or removed.
    pub fn remove_variable(
        &mut self,
        entity: EntityId,
        name: &VariableName,
    ) -> Result<VariableSpec, AssemblyError> {
        let reg = self
            .slot_existing_mut(entity)
            .ok_or_else(|| undeclared(entity, name))?;
        let pos = reg
            .variables
            .iter()
            .position(|v| &v.name == name)
            .ok_or_else(|| undeclared(entity, name))?;
        let spec = reg.variables.remove(pos);
        reg.bindings.retain(|b| &b.variable != name);
        self.bump();
        Ok(spec)
    }

    /// Binds a discretization capability to a declared variable.
    ///
    /// Several operators may bind the same variable; their contributions add.
    ///
    /// # Errors
    /// `UnknownEntity`, `UndeclaredVariable` or `DuplicateOperator`.
    pub fn bind_operator(
        &mut self,
        graph: &TopologyGraph,
        entity: EntityId,
        variable: VariableName,
        operator: OperatorName,
        capability: Arc<dyn NodeDiscretization>,
    ) -> Result<(), AssemblyError> {
        graph.check_entity(entity)?;
        if self.variable(entity, &variable).is_none() {
            return Err(undeclared(entity, &variable));
        }
        if self.binding(entity, &variable, &operator).is_some() {
            return Err(ConfigurationError::DuplicateOperator {
                entity,
                variable,
                operator,
            }
            .into());
        }
        log::debug!("bind operator `{operator}` to `{variable}` on {entity}");
        let generation = self.fresh_generation();
        self.slot_mut(entity).bindings.push(OperatorBinding {
            variable,
            operator,
            capability,
            generation,
        });
        self.bump();
        Ok(())
    }

    /// Removes an operator binding.
    pub fn unbind_operator(
        &mut self,
        entity: EntityId,
        variable: &VariableName,
        operator: &OperatorName,
    ) -> Result<(), AssemblyError> {
        let unbound = || -> AssemblyError {
            ConfigurationError::UnboundOperator {
                entity,
                variable: variable.clone(),
                operator: operator.clone(),
            }
            .into()
        };
        let reg = self.slot_existing_mut(entity).ok_or_else(unbound)?;
        let pos = reg
            .bindings
            .iter()
            .position(|b| &b.variable == variable && &b.operator == operator)
            .ok_or_else(unbound)?;
        reg.bindings.remove(pos);
        self.bump();
        Ok(())
    }

    /// Registers a coupling term on an interface.
    ///
    /// # Errors
    /// `UnknownEntity`, `EndpointMismatch` if the selected subdomains are not
    /// exactly the interface's two endpoints, `UndeclaredVariable`,
    /// `UnboundOperator` or `DuplicateCoupling`.
    pub fn register_coupling(
        &mut self,
        graph: &TopologyGraph,
        name: CouplingName,
        primary: EndpointSelector,
        secondary: EndpointSelector,
        interface: InterfaceSelector,
    ) -> Result<(), AssemblyError> {
        let iface = interface.interface;
        let (a, b) = graph.endpoints(iface)?;
        let matches = (primary.subdomain == a && secondary.subdomain == b)
            || (primary.subdomain == b && secondary.subdomain == a);
        if !matches {
            return Err(ConfigurationError::EndpointMismatch {
                interface: iface,
                primary: primary.subdomain,
                secondary: secondary.subdomain,
            }
            .into());
        }
        for sel in [&primary, &secondary] {
            let entity = EntityId::from(sel.subdomain);
            if self.variable(entity, &sel.variable).is_none() {
                return Err(undeclared(entity, &sel.variable));
            }
            if self.binding(entity, &sel.variable, &sel.operator).is_none() {
                return Err(ConfigurationError::UnboundOperator {
                    entity,
                    variable: sel.variable.clone(),
                    operator: sel.operator.clone(),
                }
                .into());
            }
        }
        if self.variable(iface.into(), &interface.variable).is_none() {
            return Err(undeclared(iface.into(), &interface.variable));
        }
        if self.coupling(iface, &name).is_some() {
            return Err(ConfigurationError::DuplicateCoupling {
                interface: iface,
                coupling: name,
            }
            .into());
        }
        log::debug!(
            "register coupling `{name}` on {iface}: {} `{}`/`{}` <-> {} `{}`/`{}` via `{}`",
            primary.subdomain,
            primary.variable,
            primary.operator,
            secondary.subdomain,
            secondary.variable,
            secondary.operator,
            interface.variable
        );
        let generation = self.fresh_generation();
        self.slot_mut(iface.into()).couplings.push(CouplingTerm {
            name,
            primary,
            secondary,
            interface,
            generation,
        });
        self.bump();
        Ok(())
    }

    /// Removes a coupling term, returning it.
    pub fn remove_coupling(
        &mut self,
        interface: InterfaceId,
        name: &CouplingName,
    ) -> Result<CouplingTerm, AssemblyError> {
        let missing = || -> AssemblyError {
            ConfigurationError::UnknownCoupling {
                interface,
                coupling: name.clone(),
            }
            .into()
        };
        let reg = self
            .slot_existing_mut(interface.into())
            .ok_or_else(missing)?;
        let pos = reg
            .couplings
            .iter()
            .position(|c| &c.name == name)
            .ok_or_else(missing)?;
        let term = reg.couplings.remove(pos);
        self.bump();
        Ok(term)
    }

    /// Variables of an entity in declaration order.
    pub fn variables(&self, entity: EntityId) -> &[VariableSpec] {
        self.slot(entity)
            .map(|r| r.variables.as_slice())
            .unwrap_or_default()
    }

    /// A declared variable, if present.
    pub fn variable(&self, entity: EntityId, name: &VariableName) -> Option<&VariableSpec> {
        self.variables(entity).iter().find(|v| &v.name == name)
    }

    /// Operator bindings of an entity in binding order.
    pub fn bindings(&self, entity: EntityId) -> &[OperatorBinding] {
        self.slot(entity)
            .map(|r| r.bindings.as_slice())
            .unwrap_or_default()
    }

    /// Operators bound to `variable` on `entity`, in binding order.
    pub fn operators<'a>(
        &'a self,
        entity: EntityId,
        variable: &'a VariableName,
    ) -> impl Iterator<Item = &'a OperatorName> + 'a {
        self.bindings(entity)
            .iter()
            .filter(move |b| &b.variable == variable)
            .map(|b| &b.operator)
    }

    /// A single binding, if present.
    pub fn binding(
        &self,
        entity: EntityId,
        variable: &VariableName,
        operator: &OperatorName,
    ) -> Option<&OperatorBinding> {
        self.bindings(entity)
            .iter()
            .find(|b| &b.variable == variable && &b.operator == operator)
    }

    /// Coupling terms of an interface in registration order.
    pub fn couplings(&self, interface: InterfaceId) -> &[CouplingTerm] {
        self.slot(interface.into())
            .map(|r| r.couplings.as_slice())
            .unwrap_or_default()
    }

    /// A single coupling term, if present.
    pub fn coupling(&self, interface: InterfaceId, name: &CouplingName) -> Option<&CouplingTerm> {
        self.couplings(interface).iter().find(|c| &c.name == name)
    }

    /// All coupling terms: interfaces in creation order, terms in registration order.
    pub fn all_couplings(&self) -> impl Iterator<Item = &CouplingTerm> {
        self.interfaces.iter().flat_map(|r| r.couplings.iter())
    }

    fn slot(&self, entity: EntityId) -> Option<&EntityRegistration> {
        match entity {
            EntityId::Subdomain(s) => self.subdomains.get(s.index()),
            EntityId::Interface(e) => self.interfaces.get(e.index()),
        }
    }

    fn slot_existing_mut(&mut self, entity: EntityId) -> Option<&mut EntityRegistration> {
        match entity {
            EntityId::Subdomain(s) => self.subdomains.get_mut(s.index()),
            EntityId::Interface(e) => self.interfaces.get_mut(e.index()),
        }
    }

    /// Slot for `entity`, growing the arena; callers validate the handle first.
    fn slot_mut(&mut self, entity: EntityId) -> &mut EntityRegistration {
        let (arena, idx) = match entity {
            EntityId::Subdomain(s) => (&mut self.subdomains, s.index()),
            EntityId::Interface(e) => (&mut self.interfaces, e.index()),
        };
        if idx >= arena.len() {
            arena.resize_with(idx + 1, EntityRegistration::default);
        }
        &mut arena[idx]
    }

    fn fresh_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

fn undeclared(entity: EntityId, variable: &VariableName) -> AssemblyError {
    ConfigurationError::UndeclaredVariable {
        entity,
        variable: variable.clone(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly_error::CapabilityError;
    use crate::registry::capability::{
        CouplingContext, CouplingContribution, LocalDiscretization,
    };
    use crate::topology::geometry::Geometry;
    use crate::topology::parameters::Parameters;

    struct Identity;
    impl NodeDiscretization for Identity {
        fn discretize(
            &self,
            g: &Geometry,
            _p: &Parameters,
        ) -> Result<LocalDiscretization, CapabilityError> {
            Ok(LocalDiscretization::zeros(g.num_cells))
        }
    }

    struct Nothing;
    impl CouplingDiscretization for Nothing {
        fn discretize_coupling(
            &self,
            _ctx: CouplingContext<'_>,
        ) -> Result<CouplingContribution, CapabilityError> {
            Ok(CouplingContribution::new())
        }
    }

    fn var(s: &str) -> VariableName {
        VariableName::new(s).unwrap()
    }
    fn op(s: &str) -> OperatorName {
        OperatorName::new(s).unwrap()
    }

    fn setup() -> (TopologyGraph, Registry, SubdomainId, SubdomainId, InterfaceId) {
        let mut g = TopologyGraph::new();
        let a = g.add_subdomain(Geometry::new(2, 2, 7));
        let b = g.add_subdomain(Geometry::new(2, 2, 7));
        let e = g.add_interface(a, b, Geometry::interface(1, 1)).unwrap();
        let mut r = Registry::new();
        for s in [a, b] {
            r.register_variable(&g, s.into(), var("p"), DofLayout::cells(1))
                .unwrap();
            r.bind_operator(&g, s.into(), var("p"), op("flux"), Arc::new(Identity))
                .unwrap();
        }
        r.register_variable(&g, e.into(), var("lambda"), DofLayout::cells(1))
            .unwrap();
        (g, r, a, b, e)
    }

    #[test]
    fn duplicate_variable_rejected_without_side_effects() {
        let (g, mut r, a, _, _) = setup();
        let version = r.version();
        let err = r
            .register_variable(&g, a.into(), var("p"), DofLayout::faces(1))
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Configuration(ConfigurationError::DuplicateVariable { .. })
        ));
        assert_eq!(r.version(), version);
        assert_eq!(r.variables(a.into()).len(), 1);
        assert_eq!(r.variables(a.into())[0].layout, DofLayout::cells(1));
    }

    #[test]
    fn bind_requires_declared_variable() {
        let (g, mut r, a, _, _) = setup();
        let err = r
            .bind_operator(&g, a.into(), var("t"), op("adv"), Arc::new(Identity))
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Configuration(ConfigurationError::UndeclaredVariable { .. })
        ));
    }

    #[test]
    fn multiple_operators_per_variable_keep_order() {
        let (g, mut r, a, _, _) = setup();
        r.bind_operator(&g, a.into(), var("p"), op("source"), Arc::new(Identity))
            .unwrap();
        let p = var("p");
        let ops: Vec<_> = r.operators(a.into(), &p).cloned().collect();
        assert_eq!(ops, vec![op("flux"), op("source")]);
        assert!(r
            .bind_operator(&g, a.into(), var("p"), op("source"), Arc::new(Identity))
            .is_err());
    }

    #[test]
    fn coupling_validates_endpoints_and_selectors() {
        let (mut g, mut r, a, b, e) = setup();
        let c = g.add_subdomain(Geometry::new(2, 2, 7));
        let name = CouplingName::new("robin").unwrap();
        let iface = InterfaceSelector::new(e, var("lambda"), Arc::new(Nothing));

        let err = r
            .register_coupling(
                &g,
                name.clone(),
                EndpointSelector::new(a, var("p"), op("flux")),
                EndpointSelector::new(c, var("p"), op("flux")),
                iface.clone(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Configuration(ConfigurationError::EndpointMismatch { .. })
        ));

        let err = r
            .register_coupling(
                &g,
                name.clone(),
                EndpointSelector::new(a, var("p"), op("mass")),
                EndpointSelector::new(b, var("p"), op("flux")),
                iface.clone(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Configuration(ConfigurationError::UnboundOperator { .. })
        ));

        // Either orientation of the endpoints is accepted.
        r.register_coupling(
            &g,
            name.clone(),
            EndpointSelector::new(b, var("p"), op("flux")),
            EndpointSelector::new(a, var("p"), op("flux")),
            iface.clone(),
        )
        .unwrap();
        assert_eq!(r.couplings(e).len(), 1);

        let err = r
            .register_coupling(
                &g,
                name,
                EndpointSelector::new(a, var("p"), op("flux")),
                EndpointSelector::new(b, var("p"), op("flux")),
                iface,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Configuration(ConfigurationError::DuplicateCoupling { .. })
        ));
    }

    #[test]
    fn rebinding_gets_a_new_generation() {
        let (g, mut r, a, _, _) = setup();
        let first = r.binding(a.into(), &var("p"), &op("flux")).unwrap().generation();
        r.unbind_operator(a.into(), &var("p"), &op("flux")).unwrap();
        assert!(r.binding(a.into(), &var("p"), &op("flux")).is_none());
        r.bind_operator(&g, a.into(), var("p"), op("flux"), Arc::new(Identity))
            .unwrap();
        let second = r.binding(a.into(), &var("p"), &op("flux")).unwrap().generation();
        assert_ne!(first, second);
    }

    #[test]
    fn remove_variable_drops_its_bindings() {
        let (_, mut r, a, _, _) = setup();
        r.remove_variable(a.into(), &var("p")).unwrap();
        assert!(r.variables(a.into()).is_empty());
        assert!(r.bindings(a.into()).is_empty());
        assert!(r.remove_variable(a.into(), &var("p")).is_err());
    }
}
