//! Assembler: the lifecycle facade over graph, registry, numbering, cache
//! and scatter.
//!
//! ```text
//! Configured --build_dofs--> Numbered --discretize--> Discretized --assemble--> Assembled
//!     ^                         ^                                                   |
//!     |                         +------------------ set_parameter ------------------+
//!     +------------------------- registry / topology change -----------------------+
//! ```
//!
//! Every transition either succeeds completely or leaves the assembler in
//! the state it was in, with its previous layout, cache and system intact.

use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::DVector;

use crate::assembly::scatter;
use crate::assembly::system::LinearSystem;
use crate::assembly_error::AssemblyError;
use crate::debug_invariants::DebugInvariants;
use crate::discretize::cache::DiscretizationCache;
use crate::discretize::dispatcher::{self, DiscretizeReport, DispatchOptions};
use crate::dof::manager::DofManager;
use crate::registry::capability::NodeDiscretization;
use crate::registry::layout::DofLayout;
use crate::registry::names::{CouplingName, OperatorName, VariableName};
use crate::registry::registry::{CouplingTerm, EndpointSelector, InterfaceSelector, Registry};
use crate::solution::SolutionMap;
use crate::topology::geometry::Geometry;
use crate::topology::graph::TopologyGraph;
use crate::topology::handle::{EntityId, InterfaceId, SubdomainId};
use crate::topology::parameters::{Keyword, ParamValue, Parameters};

/// Lifecycle stage of an [`Assembler`]. Later stages compare greater.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssemblerState {
    /// Graph and registry populated, no numbering.
    #[default]
    Configured,
    /// Block tables built.
    Numbered,
    /// Every node and coupling term has a fresh cached result.
    Discretized,
    /// A global system was scattered from the cache.
    Assembled,
}

/// Run-time knobs of an [`Assembler`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Run each discretization phase on the rayon pool. Ignored without the
    /// `rayon` feature.
    pub parallel: bool,
    /// Skip exact zeros while scattering local blocks.
    pub drop_zeros: bool,
    /// Validate every freshly built layout, also in release builds.
    pub validate_layout: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            drop_zeros: true,
            validate_layout: false,
        }
    }
}

/// Owns one coupled problem and drives it from registration to a global system.
#[derive(Debug, Default)]
pub struct Assembler {
    graph: TopologyGraph,
    registry: Registry,
    dofs: Option<DofManager>,
    cache: DiscretizationCache,
    system: Option<LinearSystem>,
    state: AssemblerState,
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AssemblerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Starts from an already built topology graph.
    pub fn from_topology(graph: TopologyGraph, config: AssemblerConfig) -> Self {
        Self {
            graph,
            config,
            ..Self::default()
        }
    }

    #[inline]
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AssemblerConfig) {
        self.config = config;
    }

    #[inline]
    pub fn topology(&self) -> &TopologyGraph {
        &self.graph
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current block layout, once numbered.
    #[inline]
    pub fn dofs(&self) -> Option<&DofManager> {
        self.dofs.as_ref()
    }

    #[inline]
    pub fn cache(&self) -> &DiscretizationCache {
        &self.cache
    }

    /// The last assembled system, while the assembler is `Assembled`.
    #[inline]
    pub fn system(&self) -> Option<&LinearSystem> {
        self.system.as_ref()
    }

    // --- topology --------------------------------------------------------

    pub fn add_subdomain(&mut self, geometry: Geometry) -> SubdomainId {
        let id = self.graph.add_subdomain(geometry);
        self.reconfigure();
        id
    }

    pub fn add_interface(
        &mut self,
        a: SubdomainId,
        b: SubdomainId,
        geometry: Geometry,
    ) -> Result<InterfaceId, AssemblyError> {
        let id = self.graph.add_interface(a, b, geometry)?;
        self.reconfigure();
        Ok(id)
    }

    // --- registry --------------------------------------------------------

    pub fn register_variable(
        &mut self,
        entity: impl Into<EntityId>,
        name: VariableName,
        layout: DofLayout,
    ) -> Result<(), AssemblyError> {
        self.registry
            .register_variable(&self.graph, entity.into(), name, layout)?;
        self.reconfigure();
        Ok(())
    }

    /// Removes a variable and its bindings; cached results of those bindings are dropped.
    pub fn remove_variable(
        &mut self,
        entity: impl Into<EntityId>,
        name: &VariableName,
    ) -> Result<(), AssemblyError> {
        self.registry.remove_variable(entity.into(), name)?;
        self.reconfigure();
        Ok(())
    }

    pub fn bind_operator(
        &mut self,
        entity: impl Into<EntityId>,
        variable: VariableName,
        operator: OperatorName,
        capability: Arc<dyn NodeDiscretization>,
    ) -> Result<(), AssemblyError> {
        self.registry
            .bind_operator(&self.graph, entity.into(), variable, operator, capability)?;
        self.reconfigure();
        Ok(())
    }

    pub fn unbind_operator(
        &mut self,
        entity: impl Into<EntityId>,
        variable: &VariableName,
        operator: &OperatorName,
    ) -> Result<(), AssemblyError> {
        self.registry
            .unbind_operator(entity.into(), variable, operator)?;
        self.reconfigure();
        Ok(())
    }

    pub fn register_coupling(
        &mut self,
        name: CouplingName,
        primary: EndpointSelector,
        secondary: EndpointSelector,
        interface: InterfaceSelector,
    ) -> Result<(), AssemblyError> {
        self.registry
            .register_coupling(&self.graph, name, primary, secondary, interface)?;
        self.reconfigure();
        Ok(())
    }

    pub fn remove_coupling(
        &mut self,
        interface: InterfaceId,
        name: &CouplingName,
    ) -> Result<CouplingTerm, AssemblyError> {
        let term = self.registry.remove_coupling(interface, name)?;
        self.reconfigure();
        Ok(term)
    }

    // --- parameters ------------------------------------------------------

    pub fn parameters(&self, entity: impl Into<EntityId>) -> Result<&Parameters, AssemblyError> {
        self.graph.parameters(entity.into())
    }

    /// Sets one parameter value on `entity`.
    ///
    /// Cached results that read `entity` are dropped; every other entry is
    /// kept. A numbered assembler stays numbered, a later stage falls back to
    /// `Numbered`.
    pub fn set_parameter(
        &mut self,
        entity: impl Into<EntityId>,
        keyword: &Keyword,
        name: impl Into<String>,
        value: ParamValue,
    ) -> Result<Option<ParamValue>, AssemblyError> {
        let entity = entity.into();
        let prev = self.graph.set_parameter(entity, keyword, name, value)?;
        self.parameters_changed(entity);
        Ok(prev)
    }

    /// Replaces every parameter of `entity`; same invalidation as [`Self::set_parameter`].
    pub fn replace_parameters(
        &mut self,
        entity: impl Into<EntityId>,
        parameters: Parameters,
    ) -> Result<(), AssemblyError> {
        let entity = entity.into();
        self.graph.replace_parameters(entity, parameters)?;
        self.parameters_changed(entity);
        Ok(())
    }

    // --- lifecycle -------------------------------------------------------

    /// Builds the block tables. Rebuilding an unchanged registry keeps the
    /// current stage.
    pub fn build_dofs(&mut self) -> Result<&DofManager, AssemblyError> {
        let dofs = DofManager::build(&self.graph, &self.registry)?;
        if self.config.validate_layout {
            dofs.validate_invariants()?;
        }
        let unchanged = self
            .dofs
            .as_ref()
            .is_some_and(|old| old.registry_version() == dofs.registry_version() && *old == dofs);
        if !unchanged || self.state < AssemblerState::Numbered {
            self.system = None;
            self.transition(AssemblerState::Numbered);
        }
        Ok(&*self.dofs.insert(dofs))
    }

    /// Computes every stale local term; with `force`, every term.
    pub fn discretize(&mut self, force: bool) -> Result<DiscretizeReport, AssemblyError> {
        self.require("discretize", AssemblerState::Numbered)?;
        let options = DispatchOptions {
            force,
            parallel: self.config.parallel,
        };
        let report = dispatcher::discretize(&self.graph, &self.registry, &mut self.cache, options)?;
        let recomputed = report.computed_nodes + report.computed_couplings > 0;
        if recomputed || self.state < AssemblerState::Discretized {
            self.system = None;
            self.transition(AssemblerState::Discretized);
        }
        Ok(report)
    }

    /// Scatters the cache into the global system.
    ///
    /// Repeating this without intervening changes reproduces the same system
    /// bit for bit.
    pub fn assemble(&mut self) -> Result<&LinearSystem, AssemblyError> {
        self.require("assemble", AssemblerState::Discretized)?;
        let dofs = self.numbering("assemble")?;
        let system = scatter::assemble(
            &self.graph,
            &self.registry,
            dofs,
            &self.cache,
            self.config.drop_zeros,
            None,
        )?;
        self.transition(AssemblerState::Assembled);
        Ok(&*self.system.insert(system))
    }

    /// Assembles only the terms whose row and column blocks carry one of
    /// `variables`. Numbering is unchanged; other blocks stay empty. Does not
    /// change the lifecycle stage.
    pub fn assemble_filtered<I>(&self, variables: I) -> Result<LinearSystem, AssemblyError>
    where
        I: IntoIterator<Item = VariableName>,
    {
        self.require("assemble_filtered", AssemblerState::Discretized)?;
        let dofs = self.numbering("assemble_filtered")?;
        let filter: BTreeSet<VariableName> = variables.into_iter().collect();
        scatter::assemble(
            &self.graph,
            &self.registry,
            dofs,
            &self.cache,
            self.config.drop_zeros,
            Some(&filter),
        )
    }

    /// `(offset, size)` of the block of `variable` on `entity`.
    pub fn block_of(
        &self,
        entity: impl Into<EntityId>,
        variable: &VariableName,
    ) -> Result<(usize, usize), AssemblyError> {
        self.numbering("block_of")?.lookup(entity.into(), variable)
    }

    /// Total number of scalar DOFs of the current numbering.
    pub fn total_dofs(&self) -> Result<usize, AssemblyError> {
        Ok(self.numbering("total_dofs")?.total_dofs())
    }

    /// Splits a solution of the assembled system into per-block pieces.
    pub fn distribute_solution(&self, x: &DVector<f64>) -> Result<SolutionMap, AssemblyError> {
        SolutionMap::distribute(self.numbering("distribute_solution")?, x)
    }

    fn numbering(&self, operation: &'static str) -> Result<&DofManager, AssemblyError> {
        match &self.dofs {
            Some(dofs) if self.state >= AssemblerState::Numbered => Ok(dofs),
            _ => Err(AssemblyError::InvalidState {
                operation,
                required: AssemblerState::Numbered,
                current: self.state,
            }),
        }
    }

    fn require(&self, operation: &'static str, required: AssemblerState) -> Result<(), AssemblyError> {
        if self.state >= required {
            Ok(())
        } else {
            Err(AssemblyError::InvalidState {
                operation,
                required,
                current: self.state,
            })
        }
    }

    fn reconfigure(&mut self) {
        self.dofs = None;
        self.system = None;
        self.cache.retain_registered(&self.registry);
        self.transition(AssemblerState::Configured);
    }

    fn parameters_changed(&mut self, entity: EntityId) {
        let dropped = self.cache.invalidate_entity(entity);
        log::debug!("parameters of {entity} changed, {dropped} cached terms dropped");
        if self.state > AssemblerState::Numbered {
            self.system = None;
            self.transition(AssemblerState::Numbered);
        }
    }

    fn transition(&mut self, to: AssemblerState) {
        if self.state != to {
            log::info!("assembler {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}
