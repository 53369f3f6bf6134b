//! Two-phase discretization dispatch.
//!
//! Phase 1 invokes every node binding (entity, variable, operator). Phase 2
//! invokes every coupling term, handing it the phase-1 results of its two
//! endpoint bindings. Within a phase terms are independent and, with the
//! `rayon` feature and [`DispatchOptions::parallel`], run on the rayon pool;
//! the phase boundary is the only synchronization point.
//!
//! Results are staged and committed to the [`DiscretizationCache`] only
//! after both phases succeed, so a failing pass leaves the cache exactly as
//! it was.

use std::sync::Arc;

use crate::assembly_error::{AssemblyError, ConfigurationError};
use crate::discretize::cache::{
    CouplingEntry, CouplingKey, DiscretizationCache, NodeEntry, NodeKey,
};
use crate::registry::capability::{
    CouplingContext, CouplingContribution, EndpointView, EntityView, LocalDiscretization,
};
use crate::registry::registry::{CouplingTerm, EndpointSelector, OperatorBinding, Registry};
use crate::topology::geometry::Geometry;
use crate::topology::graph::TopologyGraph;
use crate::topology::handle::EntityId;
use crate::topology::parameters::Parameters;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Knobs of a discretization pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Recompute every term even if its cache entry is fresh.
    pub force: bool,
    /// Run each phase on the rayon pool (needs the `rayon` feature).
    pub parallel: bool,
}

/// What a discretization pass did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscretizeReport {
    pub computed_nodes: usize,
    pub cached_nodes: usize,
    pub computed_couplings: usize,
    pub cached_couplings: usize,
}

struct NodeJob<'a> {
    key: NodeKey,
    binding: &'a OperatorBinding,
    geometry: &'a Geometry,
    parameters: &'a Parameters,
    version: u64,
}

impl NodeJob<'_> {
    fn label(&self) -> String {
        format!(
            "operator `{}` of `{}` on {}",
            self.key.operator, self.key.variable, self.key.entity
        )
    }

    fn run(&self) -> Result<LocalDiscretization, AssemblyError> {
        log::debug!("discretize {}", self.label());
        self.binding
            .capability
            .discretize(self.geometry, self.parameters)
            .map_err(|e| AssemblyError::discretization(self.label(), e))
    }
}

struct ResolvedEndpoint<'a> {
    entity: EntityId,
    geometry: &'a Geometry,
    parameters: &'a Parameters,
    version: u64,
    stamp: u64,
    block_size: usize,
    result: Arc<LocalDiscretization>,
}

struct CouplingJob<'a> {
    key: CouplingKey,
    term: &'a CouplingTerm,
    interface: EntityView<'a>,
    interface_version: u64,
    block_sizes: [usize; 3],
    primary: ResolvedEndpoint<'a>,
    secondary: ResolvedEndpoint<'a>,
}

impl CouplingJob<'_> {
    fn run(&self) -> Result<CouplingContribution, AssemblyError> {
        log::debug!("discretize {}", self.term.label());
        fn view<'b>(ep: &'b ResolvedEndpoint<'_>, sel: &EndpointSelector) -> EndpointView<'b> {
            EndpointView {
                subdomain: sel.subdomain,
                geometry: ep.geometry,
                parameters: ep.parameters,
                result: ep.result.as_ref(),
            }
        }
        let ctx = CouplingContext {
            interface_id: self.key.interface,
            interface: self.interface,
            primary: view(&self.primary, &self.term.primary),
            secondary: view(&self.secondary, &self.term.secondary),
        };
        self.term
            .interface
            .capability
            .discretize_coupling(ctx)
            .map_err(|e| AssemblyError::discretization(self.term.label(), e))
    }

    fn entry(&self, generation: u64, result: CouplingContribution) -> CouplingEntry {
        CouplingEntry {
            generation,
            versions: [
                self.interface_version,
                self.primary.version,
                self.secondary.version,
            ],
            endpoint_stamps: [self.primary.stamp, self.secondary.stamp],
            block_sizes: self.block_sizes,
            endpoints: [self.primary.entity, self.secondary.entity],
            result: Arc::new(result),
        }
    }
}

/// Check that every bound capability finds its parameter set.
pub fn check_parameters(
    graph: &TopologyGraph,
    registry: &Registry,
) -> Result<(), AssemblyError> {
    for entity in graph.entities() {
        let params = graph.parameters(entity)?;
        for binding in registry.bindings(entity) {
            if let Some(kw) = binding.capability.keyword() {
                if !params.has_keyword(kw) {
                    return Err(ConfigurationError::MissingParameters {
                        entity,
                        keyword: kw.clone(),
                    }
                    .into());
                }
            }
        }
    }
    for term in registry.all_couplings() {
        let entity = EntityId::from(term.interface.interface);
        if let Some(kw) = term.interface.capability.keyword() {
            if !graph.parameters(entity)?.has_keyword(kw) {
                return Err(ConfigurationError::MissingParameters {
                    entity,
                    keyword: kw.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Run both discretization phases and commit the results to `cache`.
pub fn discretize(
    graph: &TopologyGraph,
    registry: &Registry,
    cache: &mut DiscretizationCache,
    options: DispatchOptions,
) -> Result<DiscretizeReport, AssemblyError> {
    check_parameters(graph, registry)?;
    let mut report = DiscretizeReport::default();

    // Phase 1: node terms.
    let mut node_jobs = Vec::new();
    for entity in graph.entities() {
        let data = graph.data(entity)?;
        for binding in registry.bindings(entity) {
            let key = NodeKey {
                entity,
                variable: binding.variable.clone(),
                operator: binding.operator.clone(),
            };
            let fresh = cache.node_entry(&key).is_some_and(|e| {
                e.generation == binding.generation() && e.version == data.version()
            });
            if fresh && !options.force {
                log::debug!(
                    "cache hit: operator `{}` of `{}` on {entity}",
                    key.operator,
                    key.variable
                );
                report.cached_nodes += 1;
                continue;
            }
            node_jobs.push(NodeJob {
                key,
                binding,
                geometry: graph.geometry(entity)?,
                parameters: data.parameters(),
                version: data.version(),
            });
        }
    }
    let node_results = run_phase(&node_jobs, options.parallel, NodeJob::run)?;
    report.computed_nodes = node_results.len();
    let mut staged_nodes = Vec::with_capacity(node_results.len());
    for (job, result) in node_jobs.into_iter().zip(node_results) {
        let entry = NodeEntry {
            generation: job.binding.generation(),
            version: job.version,
            stamp: cache.fresh_stamp(),
            result: Arc::new(result),
        };
        staged_nodes.push((job.key, entry));
    }

    // Phase 2: coupling terms, reading phase-1 results.
    let mut coupling_jobs = Vec::new();
    for term in registry.all_couplings() {
        let iface = term.interface.interface;
        let iface_entity = EntityId::from(iface);
        let iface_spec = registry
            .variable(iface_entity, &term.interface.variable)
            .ok_or_else(|| AssemblyError::MissingBinding {
                interface: iface,
                coupling: term.name.clone(),
                entity: iface_entity,
                variable: term.interface.variable.clone(),
                operator: None,
            })?;
        let primary =
            resolve_endpoint(graph, registry, &staged_nodes, cache, term, &term.primary)?;
        let secondary =
            resolve_endpoint(graph, registry, &staged_nodes, cache, term, &term.secondary)?;
        let iface_data = graph.data(iface_entity)?;
        let iface_geometry = graph.geometry(iface_entity)?;
        let block_sizes = [
            primary.block_size,
            secondary.block_size,
            iface_spec.layout.size_on(iface_geometry),
        ];
        let key = CouplingKey {
            interface: iface,
            name: term.name.clone(),
        };
        let fresh = cache.coupling_entry(&key).is_some_and(|e| {
            e.generation == term.generation()
                && e.versions == [iface_data.version(), primary.version, secondary.version]
                && e.endpoint_stamps == [primary.stamp, secondary.stamp]
                && e.block_sizes == block_sizes
        });
        if fresh && !options.force {
            log::debug!("cache hit: {}", term.label());
            report.cached_couplings += 1;
            continue;
        }
        coupling_jobs.push(CouplingJob {
            key,
            term,
            interface: EntityView {
                geometry: iface_geometry,
                parameters: iface_data.parameters(),
            },
            interface_version: iface_data.version(),
            block_sizes,
            primary,
            secondary,
        });
    }
    let coupling_results = run_phase(&coupling_jobs, options.parallel, CouplingJob::run)?;
    report.computed_couplings = coupling_results.len();
    let staged_couplings: Vec<_> = coupling_jobs
        .iter()
        .zip(coupling_results)
        .map(|(job, result)| (job.key.clone(), job.entry(job.term.generation(), result)))
        .collect();

    cache.commit(staged_nodes, staged_couplings);
    cache.retain_registered(registry);
    log::info!(
        "discretized: {} node terms computed, {} cached; {} coupling terms computed, {} cached",
        report.computed_nodes,
        report.cached_nodes,
        report.computed_couplings,
        report.cached_couplings
    );
    Ok(report)
}

/// Locate the node result a coupling endpoint selects: staged by this pass
/// if it was recomputed, otherwise from the cache.
fn resolve_endpoint<'a>(
    graph: &'a TopologyGraph,
    registry: &Registry,
    staged: &[(NodeKey, NodeEntry)],
    cache: &DiscretizationCache,
    term: &CouplingTerm,
    sel: &EndpointSelector,
) -> Result<ResolvedEndpoint<'a>, AssemblyError> {
    let entity = EntityId::from(sel.subdomain);
    let missing = || AssemblyError::MissingBinding {
        interface: term.interface.interface,
        coupling: term.name.clone(),
        entity,
        variable: sel.variable.clone(),
        operator: Some(sel.operator.clone()),
    };
    let spec = registry
        .variable(entity, &sel.variable)
        .ok_or_else(missing)?;
    let binding = registry
        .binding(entity, &sel.variable, &sel.operator)
        .ok_or_else(missing)?;
    let key = NodeKey {
        entity,
        variable: sel.variable.clone(),
        operator: sel.operator.clone(),
    };
    let node = staged
        .iter()
        .find(|(k, _)| k == &key)
        .map(|(_, e)| e)
        .or_else(|| cache.node_entry(&key))
        .filter(|e| e.generation == binding.generation())
        .ok_or_else(missing)?;
    let data = graph.data(entity)?;
    let geometry = graph.geometry(entity)?;
    Ok(ResolvedEndpoint {
        entity,
        geometry,
        parameters: data.parameters(),
        version: data.version(),
        stamp: node.stamp,
        block_size: spec.layout.size_on(geometry),
        result: Arc::clone(&node.result),
    })
}

/// Run one phase, serially or on the rayon pool. The first failure in job
/// order is reported, independent of scheduling.
fn run_phase<J, T, F>(jobs: &[J], parallel: bool, f: F) -> Result<Vec<T>, AssemblyError>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T, AssemblyError> + Sync + Send,
{
    let outcomes: Vec<Result<T, AssemblyError>> = if parallel {
        run_parallel(jobs, f)
    } else {
        jobs.iter().map(f).collect()
    };
    outcomes.into_iter().collect()
}

#[cfg(feature = "rayon")]
fn run_parallel<J, T, F>(jobs: &[J], f: F) -> Vec<Result<T, AssemblyError>>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T, AssemblyError> + Sync + Send,
{
    jobs.par_iter().map(f).collect()
}

#[cfg(not(feature = "rayon"))]
fn run_parallel<J, T, F>(jobs: &[J], f: F) -> Vec<Result<T, AssemblyError>>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T, AssemblyError> + Sync + Send,
{
    jobs.iter().map(f).collect()
}
