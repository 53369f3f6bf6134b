#![allow(dead_code)]
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mesh_coupling::prelude::*;
use nalgebra::{DMatrix, DVector};

pub fn var(s: &str) -> VariableName {
    VariableName::new(s).unwrap()
}

pub fn op(s: &str) -> OperatorName {
    OperatorName::new(s).unwrap()
}

pub fn cname(s: &str) -> CouplingName {
    CouplingName::new(s).unwrap()
}

pub fn flow() -> Keyword {
    Keyword::new("flow").unwrap()
}

/// Two-point-flux-like stencil: tridiagonal with `diag` / `off` over the
/// cells, rhs of ones, and a `trace` row picking the last cell.
pub struct Tpfa {
    pub diag: f64,
    pub off: f64,
    calls: AtomicUsize,
}

impl Tpfa {
    pub fn new(diag: f64, off: f64) -> Arc<Self> {
        Arc::new(Self {
            diag,
            off,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NodeDiscretization for Tpfa {
    fn discretize(
        &self,
        geometry: &Geometry,
        _parameters: &Parameters,
    ) -> Result<LocalDiscretization, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = geometry.num_cells;
        let matrix = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                self.diag
            } else if i.abs_diff(j) == 1 {
                self.off
            } else {
                0.0
            }
        });
        let trace = DMatrix::from_fn(1, n, |_, j| if j + 1 == n { 1.0 } else { 0.0 });
        Ok(LocalDiscretization::new(matrix, DVector::from_element(n, 1.0))
            .with_auxiliary("trace", trace))
    }
}

/// Scaled identity on the cells with rhs `value`.
pub struct Scaled(pub f64);

impl NodeDiscretization for Scaled {
    fn discretize(
        &self,
        geometry: &Geometry,
        _parameters: &Parameters,
    ) -> Result<LocalDiscretization, CapabilityError> {
        let n = geometry.num_cells;
        Ok(LocalDiscretization::new(
            DMatrix::identity(n, n) * self.0,
            DVector::from_element(n, self.0),
        ))
    }
}

/// Always fails.
pub struct Failing;

impl NodeDiscretization for Failing {
    fn discretize(
        &self,
        _geometry: &Geometry,
        _parameters: &Parameters,
    ) -> Result<LocalDiscretization, CapabilityError> {
        Err("singular stencil".into())
    }
}

/// Returns one row/column too many.
pub struct WrongShape;

impl NodeDiscretization for WrongShape {
    fn discretize(
        &self,
        geometry: &Geometry,
        _parameters: &Parameters,
    ) -> Result<LocalDiscretization, CapabilityError> {
        Ok(LocalDiscretization::zeros(geometry.num_cells + 1))
    }
}

/// Robin-type interface law with coefficient `kappa` read from the interface
/// parameter `param` under `flow`:
/// interface-interface `kappa * I`, node-interface `-kappa * trace^T` and its
/// transpose.
pub struct Robin {
    keyword: Keyword,
    param: String,
    calls: AtomicUsize,
}

impl Robin {
    pub fn new(param: &str) -> Arc<Self> {
        Arc::new(Self {
            keyword: flow(),
            param: param.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CouplingDiscretization for Robin {
    fn keyword(&self) -> Option<&Keyword> {
        Some(&self.keyword)
    }

    fn discretize_coupling(
        &self,
        ctx: CouplingContext<'_>,
    ) -> Result<CouplingContribution, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let kappa = ctx
            .interface
            .parameters
            .scalar(&self.keyword, &self.param)
            .ok_or_else(|| format!("interface has no `{}`", self.param))?;
        let m = ctx.interface.geometry.num_cells;
        let mut out = CouplingContribution::new();
        out.set_block(
            CouplingSlot::Interface,
            CouplingSlot::Interface,
            DMatrix::identity(m, m) * kappa,
        );
        for (slot, endpoint) in [
            (CouplingSlot::Primary, ctx.primary),
            (CouplingSlot::Secondary, ctx.secondary),
        ] {
            let trace = endpoint
                .result
                .auxiliary("trace")
                .ok_or("endpoint has no trace operator")?;
            out.set_block(slot, CouplingSlot::Interface, trace.transpose() * -kappa);
            out.set_block(CouplingSlot::Interface, slot, trace * -kappa);
        }
        Ok(out)
    }
}

/// Two 2-cell subdomains joined by a 1-cell interface.
///
/// `pressure` (one DOF per cell) on both subdomains, discretized by
/// [`Tpfa`] with diagonal 50 and off-diagonal -10; `mortar_flux` on the
/// interface; coupling `robin` reading `kn` on the interface.
pub struct TwoDomain {
    pub asm: Assembler,
    pub s0: SubdomainId,
    pub s1: SubdomainId,
    pub iface: InterfaceId,
    pub tpfa: Arc<Tpfa>,
    pub robin: Arc<Robin>,
}

impl TwoDomain {
    pub fn new(kappa: f64) -> Self {
        Self::with_config(kappa, AssemblerConfig::default())
    }

    pub fn with_config(kappa: f64, config: AssemblerConfig) -> Self {
        let mut asm = Assembler::with_config(config);
        let s0 = asm.add_subdomain(Geometry::new(2, 2, 7));
        let s1 = asm.add_subdomain(Geometry::new(2, 2, 7));
        let iface = asm
            .add_interface(s0, s1, Geometry::interface(1, 1))
            .unwrap();
        let tpfa = Tpfa::new(50.0, -10.0);
        let robin = Robin::new("kn");
        for s in [s0, s1] {
            asm.register_variable(s, var("pressure"), DofLayout::cells(1))
                .unwrap();
            asm.bind_operator(s, var("pressure"), op("tpfa"), tpfa.clone())
                .unwrap();
        }
        asm.register_variable(iface, var("mortar_flux"), DofLayout::cells(1))
            .unwrap();
        asm.set_parameter(iface, &flow(), "kn", ParamValue::Scalar(kappa))
            .unwrap();
        asm.register_coupling(
            cname("robin"),
            EndpointSelector::new(s0, var("pressure"), op("tpfa")),
            EndpointSelector::new(s1, var("pressure"), op("tpfa")),
            InterfaceSelector::new(iface, var("mortar_flux"), robin.clone()),
        )
        .unwrap();
        Self {
            asm,
            s0,
            s1,
            iface,
            tpfa,
            robin,
        }
    }

    /// Numbers, discretizes and assembles; returns a copy of the system.
    pub fn run(&mut self) -> LinearSystem {
        self.asm.build_dofs().unwrap();
        self.asm.discretize(false).unwrap();
        self.asm.assemble().unwrap().clone()
    }

    pub fn block(&self, entity: impl Into<EntityId>, variable: &str) -> BlockIndex {
        self.asm
            .dofs()
            .unwrap()
            .block_of(entity.into(), &var(variable))
            .unwrap()
    }
}

/// `n` 3-cell subdomains in a row, each pair joined by a 1-cell interface
/// with a `robin` coupling of coefficient `1 + i`.
pub fn chain(n: usize, config: AssemblerConfig) -> Assembler {
    let mut asm = Assembler::with_config(config);
    let tpfa = Tpfa::new(4.0, -1.0);
    let robin = Robin::new("kn");
    let subdomains: Vec<_> = (0..n)
        .map(|_| asm.add_subdomain(Geometry::new(2, 3, 10)))
        .collect();
    for &s in &subdomains {
        asm.register_variable(s, var("pressure"), DofLayout::cells(1))
            .unwrap();
        asm.bind_operator(s, var("pressure"), op("tpfa"), tpfa.clone())
            .unwrap();
    }
    for (i, pair) in subdomains.windows(2).enumerate() {
        let e = asm
            .add_interface(pair[0], pair[1], Geometry::interface(1, 1))
            .unwrap();
        asm.register_variable(e, var("mortar_flux"), DofLayout::cells(1))
            .unwrap();
        asm.set_parameter(e, &flow(), "kn", ParamValue::Scalar(1.0 + i as f64))
            .unwrap();
        asm.register_coupling(
            cname("robin"),
            EndpointSelector::new(pair[0], var("pressure"), op("tpfa")),
            EndpointSelector::new(pair[1], var("pressure"), op("tpfa")),
            InterfaceSelector::new(e, var("mortar_flux"), robin.clone()),
        )
        .unwrap();
    }
    asm
}

/// Bit patterns of the stored matrix values and the rhs.
pub fn bits(system: &LinearSystem) -> (Vec<u64>, Vec<u64>) {
    (
        system.matrix().values().iter().map(|v| v.to_bits()).collect(),
        system.rhs().iter().map(|v| v.to_bits()).collect(),
    )
}
