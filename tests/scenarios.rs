//! Whole-pipeline scenarios exercising `compile` end to end, one function
//! per scenario, mirroring the top-level scenario suites in compiler repos
//! that drive the full pipeline rather than one pass at a time.

use patchgraph_core::canonical::{canonical_type, CanonicalType};
use patchgraph_core::compile;
use patchgraph_core::config::NormalizeConfig;
use patchgraph_core::diagnostics::DiagnosticCode;
use patchgraph_core::draft::{ConstValue, DefaultSource, DraftGraph, PortRef};
use patchgraph_core::extent::{Axis, Cardinality, DomainTypeId, Extent, InstanceId, InstanceRef};
use patchgraph_core::inference::InferenceCanonicalType;
use patchgraph_core::ir::{LowerCtx, LowerResult, LoweredOutput, LoweringError, ValueExpr};
use patchgraph_core::payload::PayloadType;
use patchgraph_core::registry::{
    AdapterSpec, BlockDefinition, BlockRegistry, Capability, CardinalityPolicy, ContractCompat, InputDef,
    LowerFn, LoweringPurity, OutputDef, PayloadCompat, PayloadMetadata, UnitCompat,
};
use patchgraph_core::unit::{AngleUnit, UnitType};
use patchgraph_core::CompileOutcome;
use rustc_hash::FxHashMap as Map;

fn noop_lower() -> LowerFn {
    Box::new(|_ctx: &mut LowerCtx, _inputs, _cfg: &NormalizeConfig| LowerResult::default())
}

fn source_lower(port: &'static str, value: f64) -> LowerFn {
    Box::new(move |ctx: &mut LowerCtx, _inputs, _cfg: &NormalizeConfig| {
        let mut result = LowerResult::default();
        let ty = ctx.out_types[&patchgraph_core::draft::PortId::new(port)].clone();
        let id = ctx.b.constant(ConstValue::Float(value), ty.clone());
        result.outputs_by_id.insert(
            patchgraph_core::draft::PortId::new(port),
            LoweredOutput { id, slot: None, ty, stride: 1 },
        );
        result
    })
}

fn sink_def(block_type: &str, payload: PayloadType, unit: UnitType) -> BlockDefinition {
    let mut inputs = Map::default();
    inputs.insert(
        patchgraph_core::draft::PortId::new("a"),
        InputDef::new(InferenceCanonicalType::concrete(payload, unit, Extent::default_extent(), None)),
    );
    BlockDefinition {
        block_type: block_type.to_string(),
        category: "sinks".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs,
        outputs: Map::default(),
        adapter_spec: None,
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: noop_lower(),
    }
}

fn source_def(block_type: &str, port: &'static str, payload: PayloadType, unit: UnitType) -> BlockDefinition {
    let mut outputs = Map::default();
    outputs.insert(
        patchgraph_core::draft::PortId::new(port),
        OutputDef::new(InferenceCanonicalType::concrete(payload, unit, Extent::default_extent(), None)),
    );
    BlockDefinition {
        block_type: block_type.to_string(),
        category: "sources".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs: Map::default(),
        outputs,
        adapter_spec: None,
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: source_lower(port, 0.5),
    }
}

/// Scenario 1: `InfiniteTimeRoot.phaseA (float:phase01) -> Add.a (float:scalar)`.
/// The fixpoint should splice a `phase01 -> scalar` adapter and converge clean.
#[test]
fn phase_to_radians_adapter_insertion_converges_with_no_errors() {
    let mut registry = BlockRegistry::new();
    registry.register(source_def(
        "InfiniteTimeRoot",
        "phaseA",
        PayloadType::Float,
        UnitType::Angle { unit: AngleUnit::Phase01 },
    ));
    registry.register(sink_def("Add", PayloadType::Float, UnitType::Scalar));
    registry.register(BlockDefinition {
        block_type: "PhaseToRadians".into(),
        category: "adapters".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs: {
            let mut m = Map::default();
            m.insert(
                patchgraph_core::draft::PortId::new("in"),
                InputDef::new(InferenceCanonicalType::concrete(
                    PayloadType::Float,
                    UnitType::Angle { unit: AngleUnit::Phase01 },
                    Extent::default_extent(),
                    None,
                )),
            );
            m
        },
        outputs: {
            let mut m = Map::default();
            m.insert(
                patchgraph_core::draft::PortId::new("out"),
                OutputDef::new(InferenceCanonicalType::concrete(
                    PayloadType::Float,
                    UnitType::Scalar,
                    Extent::default_extent(),
                    None,
                )),
            );
            m
        },
        adapter_spec: Some(AdapterSpec {
            from_payload: PayloadCompat::Same,
            from_unit: UnitCompat::Concrete(UnitType::Angle { unit: AngleUnit::Phase01 }),
            to_payload: PayloadCompat::Same,
            to_unit: UnitCompat::Concrete(UnitType::Scalar),
            to_contract: ContractCompat::Any,
            priority: 0,
        }),
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: Box::new(|ctx: &mut LowerCtx, inputs, _cfg| {
            let mut result = LowerResult::default();
            let input = &inputs[&patchgraph_core::draft::PortId::new("in")];
            let ty = ctx.out_types[&patchgraph_core::draft::PortId::new("out")].clone();
            let id = ctx.b.kernel_map(input.expr, patchgraph_core::ir::OpRef::new("phaseToRadians"), ty.clone());
            result.outputs_by_id.insert(
                patchgraph_core::draft::PortId::new("out"),
                LoweredOutput { id, slot: None, ty, stride: 1 },
            );
            result
        }),
    });

    let draft = DraftGraph::new();
    let (draft, root) = draft.add_block("InfiniteTimeRoot");
    let (draft, add) = draft.add_block("Add");
    let (draft, _) = draft.add_edge(PortRef::new(root, "phaseA"), PortRef::new(add, "a"), None);

    let config = NormalizeConfig::new();
    let (outcome, diagnostics) = compile(&draft, &registry, &config);
    assert!(diagnostics.iter().all(|d| d.code != DiagnosticCode::NoAdapter), "{diagnostics:?}");
    match outcome {
        CompileOutcome::Compiled(ir) => {
            assert!(ir
                .builder
                .get(patchgraph_core::ir::ValueExprId::new(0))
                .ty()
                .payload
                == PayloadType::Float);
        }
        other => panic!("expected a compiled graph, got {other:?}"),
    }
}

/// Scenario 2: incompatible payloads with no registered adapter must report
/// `ConflictingPayloads`/`NoAdapter` as a user patch type error and never
/// converge.
#[test]
fn incompatible_payloads_with_no_adapter_block_convergence() {
    let mut registry = BlockRegistry::new();
    registry.register(source_def("FloatSource", "out", PayloadType::Float, UnitType::Scalar));
    registry.register(sink_def("ColorSink", PayloadType::Color, UnitType::Color));

    let draft = DraftGraph::new();
    let (draft, a) = draft.add_block("FloatSource");
    let (draft, b) = draft.add_block("ColorSink");
    let (draft, _) = draft.add_edge(PortRef::new(a, "out"), PortRef::new(b, "a"), None);

    let config = NormalizeConfig::new();
    let (outcome, diagnostics) = compile(&draft, &registry, &config);
    assert!(matches!(outcome, CompileOutcome::Incomplete { .. }));
    assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::NoAdapter));
}

/// Scenario 3: a polymorphic `Const` feeding a block whose input accepts a
/// wide allowed set resolves to `float` (the first allowed entry) with no
/// errors, and lowers to one constant node.
#[test]
fn polymorphic_const_defaults_to_first_allowed_payload() {
    let mut registry = BlockRegistry::new();
    let var_payload = registry.intern_var("Const", "T");
    let mut outputs = Map::default();
    outputs.insert(
        patchgraph_core::draft::PortId::new("out"),
        OutputDef::new(InferenceCanonicalType {
            payload: patchgraph_core::inference::InferencePayload::Var(var_payload),
            unit: patchgraph_core::inference::InferenceUnit::Concrete(UnitType::None),
            extent: Extent::default_extent(),
            contract: None,
        }),
    );
    registry.register(BlockDefinition {
        block_type: "Const".into(),
        category: "sources".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs: Map::default(),
        outputs,
        adapter_spec: None,
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: source_lower("out", 1.0),
    });

    let mut payload_meta = PayloadMetadata::default();
    payload_meta.allowed_payloads.insert(
        patchgraph_core::draft::PortId::new("a"),
        vec![PayloadType::Float, PayloadType::Int, PayloadType::Vec2, PayloadType::Vec3, PayloadType::Color],
    );
    let mut inputs = Map::default();
    let var_a = registry.intern_var("Add", "T");
    inputs.insert(
        patchgraph_core::draft::PortId::new("a"),
        InputDef::new(InferenceCanonicalType {
            payload: patchgraph_core::inference::InferencePayload::Var(var_a),
            unit: patchgraph_core::inference::InferenceUnit::Concrete(UnitType::None),
            extent: Extent::default_extent(),
            contract: None,
        }),
    );
    registry.register(BlockDefinition {
        block_type: "Add".into(),
        category: "math".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs,
        outputs: Map::default(),
        adapter_spec: None,
        payload_metadata: Some(payload_meta),
        cardinality: CardinalityPolicy::default(),
        lower: noop_lower(),
    });

    let draft = DraftGraph::new();
    let (draft, c) = draft.add_block("Const");
    let (draft, add) = draft.add_block("Add");
    let (draft, _) = draft.add_edge(PortRef::new(c, "out"), PortRef::new(add, "a"), None);

    let config = NormalizeConfig::new();
    let (outcome, diagnostics) = compile(&draft, &registry, &config);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    match outcome {
        CompileOutcome::Compiled(ir) => assert_eq!(ir.builder.len(), 1),
        other => panic!("expected a compiled graph, got {other:?}"),
    }
}

/// Scenario 4: an unconnected input with a declared default source gets a
/// synthesized source block spliced in (`policies::synthesize_default_source`),
/// and the second fixpoint pass converges.
#[test]
fn unconnected_input_with_declared_default_is_materialized() {
    let mut registry = BlockRegistry::new();
    // `defaultSources.v1` splices this well-known block type (see
    // `policies::DEFAULT_CONST_SOURCE_BLOCK_TYPE`) when a declared `Const`
    // default needs to become a real source; the test registry has to carry
    // it the same way a real caller's registry would.
    registry.register(source_def(
        patchgraph_core::policies::DEFAULT_CONST_SOURCE_BLOCK_TYPE,
        "out",
        PayloadType::Float,
        UnitType::Scalar,
    ));
    let mut inputs = Map::default();
    inputs.insert(
        patchgraph_core::draft::PortId::new("a"),
        InputDef {
            inference_type: InferenceCanonicalType::concrete(
                PayloadType::Float,
                UnitType::Scalar,
                Extent::default_extent(),
                None,
            ),
            exposed_as_port: true,
            default_source: Some(DefaultSource::Const(ConstValue::Float(1.0))),
            ui_hint: None,
            collect: None,
        },
    );
    registry.register(BlockDefinition {
        block_type: "Add".into(),
        category: "math".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs,
        outputs: Map::default(),
        adapter_spec: None,
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: noop_lower(),
    });

    let draft = DraftGraph::new();
    let (draft, _add) = draft.add_block("Add");

    let config = NormalizeConfig::new();
    let (outcome, diagnostics) = compile(&draft, &registry, &config);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    match outcome {
        CompileOutcome::Compiled(ir) => assert_eq!(ir.builder.len(), 1),
        other => panic!("expected a compiled graph with the synthesized source, got {other:?}"),
    }
}

/// Scenario 5: a registered adapter whose output re-triggers the exact same
/// conflict never lets the fixpoint converge; the bounded loop must report
/// `NonConvergence` once `maxIterations` is hit.
#[test]
fn pathological_adapter_loop_reports_non_convergence() {
    let mut registry = BlockRegistry::new();
    registry.register(source_def("FloatSource", "out", PayloadType::Float, UnitType::Scalar));
    registry.register(sink_def("ColorSink", PayloadType::Color, UnitType::Color));
    registry.register(BlockDefinition {
        block_type: "FloatToColorLoop".into(),
        category: "adapters".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs: {
            let mut m = Map::default();
            m.insert(
                patchgraph_core::draft::PortId::new("in"),
                InputDef::new(InferenceCanonicalType::concrete(
                    PayloadType::Float,
                    UnitType::Scalar,
                    Extent::default_extent(),
                    None,
                )),
            );
            m
        },
        outputs: {
            let mut m = Map::default();
            // Declares an output payload that still mismatches the sink, so the
            // same `adapters.v1` obligation re-derives every iteration.
            m.insert(
                patchgraph_core::draft::PortId::new("out"),
                OutputDef::new(InferenceCanonicalType::concrete(
                    PayloadType::Float,
                    UnitType::Scalar,
                    Extent::default_extent(),
                    None,
                )),
            );
            m
        },
        adapter_spec: Some(AdapterSpec {
            from_payload: PayloadCompat::Concrete(PayloadType::Float),
            from_unit: UnitCompat::Any,
            to_payload: PayloadCompat::Concrete(PayloadType::Color),
            to_unit: UnitCompat::Any,
            to_contract: ContractCompat::Any,
            priority: 0,
        }),
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: noop_lower(),
    });

    let draft = DraftGraph::new();
    let (draft, a) = draft.add_block("FloatSource");
    let (draft, b) = draft.add_block("ColorSink");
    let (draft, _) = draft.add_edge(PortRef::new(a, "out"), PortRef::new(b, "a"), None);

    let mut config = NormalizeConfig::new();
    config.max_iterations = 4;
    let (outcome, diagnostics) = compile(&draft, &registry, &config);
    assert!(matches!(outcome, CompileOutcome::Incomplete { .. }));
    assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::NonConvergence));
}

/// Scenario 6: a pre-resolved field broadcast lowers through `kernelZipSig`
/// when one input is `many` and the other is a plain signal. Cardinality
/// resolution itself is not wired into `compile` in this version (see
/// DESIGN.md's axis-solver note), so this exercises lowering directly on an
/// already-typed graph rather than through `compile`.
#[test]
fn field_and_signal_inputs_lower_through_kernel_zip_sig() {
    use patchgraph_core::fixpoint::StrictTypedGraph;

    let instance = InstanceRef {
        domain_type_id: DomainTypeId::new("Array"),
        instance_id: InstanceId::new(0),
    };
    let mut field_extent = Extent::default_extent();
    field_extent.cardinality = Axis::Instantiated(Cardinality::Many);
    field_extent.many_instance = Some(instance);

    let field_ty = || CanonicalType {
        payload: PayloadType::Float,
        unit: UnitType::Scalar,
        extent: field_extent.clone(),
        contract: None,
    };
    let signal_ty = || canonical_type(PayloadType::Float, None, None, None).unwrap();

    let mut registry = BlockRegistry::new();
    registry.register(BlockDefinition {
        block_type: "Ellipse".into(),
        category: "shapes".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs: Map::default(),
        outputs: {
            let mut m = Map::default();
            m.insert(patchgraph_core::draft::PortId::new("shape"), OutputDef::new(InferenceCanonicalType::concrete(
                PayloadType::Float, UnitType::Scalar, field_extent.clone(), None,
            )));
            m
        },
        adapter_spec: None,
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: Box::new(move |ctx: &mut LowerCtx, _inputs, _cfg| {
            let mut result = LowerResult::default();
            let ty = ctx.out_types[&patchgraph_core::draft::PortId::new("shape")].clone();
            let id = ctx.b.constant(ConstValue::Float(0.0), ty.clone());
            result.outputs_by_id.insert(
                patchgraph_core::draft::PortId::new("shape"),
                LoweredOutput { id, slot: None, ty, stride: 1 },
            );
            result
        }),
    });
    registry.register(source_def("Offset", "out", PayloadType::Float, UnitType::Scalar));
    registry.register(BlockDefinition {
        block_type: "FieldMap".into(),
        category: "math".into(),
        capability: Capability::Pure,
        lowering_purity: LoweringPurity::Pure,
        inputs: {
            let mut m = Map::default();
            m.insert(patchgraph_core::draft::PortId::new("field"), InputDef::new(InferenceCanonicalType::concrete(
                PayloadType::Float, UnitType::Scalar, field_extent.clone(), None,
            )));
            m.insert(patchgraph_core::draft::PortId::new("offset"), InputDef::new(InferenceCanonicalType::concrete(
                PayloadType::Float, UnitType::Scalar, Extent::default_extent(), None,
            )));
            m
        },
        outputs: Map::default(),
        adapter_spec: None,
        payload_metadata: None,
        cardinality: CardinalityPolicy::default(),
        lower: Box::new(move |ctx: &mut LowerCtx, inputs, _cfg| {
            let field = &inputs[&patchgraph_core::draft::PortId::new("field")];
            let offset = &inputs[&patchgraph_core::draft::PortId::new("offset")];
            let out = patchgraph_core::ir::helpers::zip_auto(
                &[(field.expr, field.ty.clone()), (offset.expr, offset.ty.clone())],
                patchgraph_core::ir::OpRef::new("add"),
                field.ty.clone(),
                ctx.b,
            );
            let _ = out;
            LowerResult::default()
        }),
    });

    let draft = DraftGraph::new();
    let (draft, ellipse) = draft.add_block("Ellipse");
    let (draft, offset) = draft.add_block("Offset");
    let (draft, field_map) = draft.add_block("FieldMap");
    let (draft, _) = draft.add_edge(PortRef::new(ellipse, "shape"), PortRef::new(field_map, "field"), None);
    let (draft, _) = draft.add_edge(PortRef::new(offset, "out"), PortRef::new(field_map, "offset"), None);

    let mut port_types = Map::default();
    port_types.insert(PortRef::new(ellipse, "shape"), field_ty());
    port_types.insert(PortRef::new(field_map, "field"), field_ty());
    port_types.insert(PortRef::new(offset, "out"), signal_ty());
    port_types.insert(PortRef::new(field_map, "offset"), signal_ty());

    let graph = StrictTypedGraph { draft, port_types };
    let config = NormalizeConfig::new();
    let compiled = patchgraph_core::ir::lower_strict_graph(&graph, &registry, &config).unwrap();

    let saw_zip_sig = (0..compiled.builder.len()).any(|i| {
        matches!(
            compiled.builder.get(patchgraph_core::ir::ValueExprId::new(i)),
            ValueExpr::KernelZipSig { .. }
        )
    });
    assert!(saw_zip_sig, "expected a kernelZipSig node for the field+signal zip");
    let _: Result<_, LoweringError> = Ok(());
}
