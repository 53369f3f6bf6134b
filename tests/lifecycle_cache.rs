mod util;
use mesh_coupling::prelude::*;
use util::*;

#[test]
fn stages_advance_in_order() {
    let mut td = TwoDomain::new(10.0);
    assert_eq!(td.asm.state(), AssemblerState::Configured);
    td.asm.build_dofs().unwrap();
    assert_eq!(td.asm.state(), AssemblerState::Numbered);
    let report = td.asm.discretize(false).unwrap();
    assert_eq!(td.asm.state(), AssemblerState::Discretized);
    assert_eq!(
        report,
        DiscretizeReport {
            computed_nodes: 2,
            cached_nodes: 0,
            computed_couplings: 1,
            cached_couplings: 0,
        }
    );
    td.asm.assemble().unwrap();
    assert_eq!(td.asm.state(), AssemblerState::Assembled);
    assert!(td.asm.system().is_some());
}

#[test]
fn second_pass_is_served_from_cache() {
    let mut td = TwoDomain::new(10.0);
    td.run();
    let report = td.asm.discretize(false).unwrap();
    assert_eq!(report.computed_nodes + report.computed_couplings, 0);
    assert_eq!(report.cached_nodes, 2);
    assert_eq!(report.cached_couplings, 1);
    assert_eq!(td.tpfa.calls(), 2);
    assert_eq!(td.robin.calls(), 1);
    // Nothing changed, so the assembled system is still current.
    assert_eq!(td.asm.state(), AssemblerState::Assembled);
}

#[test]
fn forced_pass_recomputes_everything() {
    let mut td = TwoDomain::new(10.0);
    let before = td.run();
    let report = td.asm.discretize(true).unwrap();
    assert_eq!(report.computed_nodes, 2);
    assert_eq!(report.computed_couplings, 1);
    assert_eq!(td.tpfa.calls(), 4);
    assert_eq!(td.asm.state(), AssemblerState::Discretized);
    let after = td.asm.assemble().unwrap();
    assert_eq!(bits(&before), bits(after));
}

#[test]
fn interface_parameter_change_only_touches_the_coupling() {
    let mut td = TwoDomain::new(10.0);
    td.run();
    td.asm
        .set_parameter(td.iface, &flow(), "kn", ParamValue::Scalar(20.0))
        .unwrap();
    assert_eq!(td.asm.state(), AssemblerState::Numbered);
    assert!(td.asm.dofs().is_some());
    assert_eq!(td.asm.cache().num_nodes(), 2);
    assert_eq!(td.asm.cache().num_couplings(), 0);

    let report = td.asm.discretize(false).unwrap();
    assert_eq!(report.cached_nodes, 2);
    assert_eq!(report.computed_nodes, 0);
    assert_eq!(report.computed_couplings, 1);
    assert_eq!(td.tpfa.calls(), 2);
    assert_eq!(td.robin.calls(), 2);

    let m = td.block(td.iface, "mortar_flux");
    let system = td.asm.assemble().unwrap();
    assert_eq!(system.block(m, m).unwrap()[(0, 0)], 20.0);
}

#[test]
fn subdomain_parameter_change_recomputes_dependent_terms() {
    let mut td = TwoDomain::new(10.0);
    td.run();
    let source = Keyword::new("transport").unwrap();
    td.asm
        .set_parameter(td.s0, &source, "porosity", ParamValue::Scalar(0.3))
        .unwrap();
    let report = td.asm.discretize(false).unwrap();
    assert_eq!(report.computed_nodes, 1);
    assert_eq!(report.cached_nodes, 1);
    // The coupling read the recomputed endpoint.
    assert_eq!(report.computed_couplings, 1);
    assert_eq!(td.tpfa.calls(), 3);
}

#[test]
fn unchanged_rebuild_keeps_the_stage() {
    let mut td = TwoDomain::new(10.0);
    td.asm.build_dofs().unwrap();
    td.asm.discretize(false).unwrap();
    let layout = td.asm.dofs().unwrap().clone();
    td.asm.build_dofs().unwrap();
    assert_eq!(td.asm.state(), AssemblerState::Discretized);
    assert_eq!(td.asm.dofs().unwrap(), &layout);
}

#[test]
fn registry_change_returns_to_configured_but_keeps_valid_cache() {
    let mut td = TwoDomain::new(10.0);
    td.run();
    td.asm
        .register_variable(td.s0, var("temperature"), DofLayout::cells(1))
        .unwrap();
    assert_eq!(td.asm.state(), AssemblerState::Configured);
    assert!(td.asm.dofs().is_none());
    assert!(td.asm.system().is_none());
    assert!(matches!(
        td.asm.discretize(false),
        Err(AssemblyError::InvalidState {
            operation: "discretize",
            ..
        })
    ));

    td.asm.build_dofs().unwrap();
    let report = td.asm.discretize(false).unwrap();
    assert_eq!(report.computed_nodes + report.computed_couplings, 0);
    assert_eq!(td.tpfa.calls(), 2);
}

#[test]
fn rebinding_an_operator_drops_its_cache_entry() {
    let mut td = TwoDomain::new(10.0);
    td.run();
    td.asm
        .unbind_operator(td.s1, &var("pressure"), &op("tpfa"))
        .unwrap();
    assert_eq!(td.asm.cache().num_nodes(), 1);
    td.asm
        .bind_operator(td.s1, var("pressure"), op("tpfa"), td.tpfa.clone())
        .unwrap();
    td.asm.build_dofs().unwrap();
    let report = td.asm.discretize(false).unwrap();
    assert_eq!(report.computed_nodes, 1);
    assert_eq!(report.cached_nodes, 1);
    assert_eq!(report.computed_couplings, 1);
}

#[test]
fn removing_a_coupling_removes_its_blocks() {
    let mut td = TwoDomain::new(10.0);
    td.run();
    td.asm.remove_coupling(td.iface, &cname("robin")).unwrap();
    assert_eq!(td.asm.cache().num_couplings(), 0);
    let system = td.run();
    let p0 = td.block(td.s0, "pressure");
    let m = td.block(td.iface, "mortar_flux");
    assert_eq!(system.block(p0, m).unwrap(), nalgebra::DMatrix::zeros(2, 1));
    assert_eq!(system.nrows(), 5);
}

#[test]
fn redeclared_interface_variable_recomputes_its_coupling() {
    let mut td = TwoDomain::new(10.0);
    let before = td.run();
    assert_eq!(td.robin.calls(), 1);

    td.asm.remove_variable(td.iface, &var("mortar_flux")).unwrap();
    td.asm
        .register_variable(td.iface, var("mortar_flux"), DofLayout::cells(2))
        .unwrap();
    td.asm.build_dofs().unwrap();
    assert_eq!(td.asm.total_dofs().unwrap(), 6);
    let report = td.asm.discretize(false).unwrap();
    assert_eq!(
        report,
        DiscretizeReport {
            computed_nodes: 0,
            cached_nodes: 2,
            computed_couplings: 1,
            cached_couplings: 0,
        }
    );
    assert_eq!(td.robin.calls(), 2);

    td.asm.remove_variable(td.iface, &var("mortar_flux")).unwrap();
    td.asm
        .register_variable(td.iface, var("mortar_flux"), DofLayout::cells(1))
        .unwrap();
    let after = td.run();
    assert_eq!(td.robin.calls(), 3);
    assert_eq!(bits(&before), bits(&after));
}
