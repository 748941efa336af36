//! End-to-end tests: build kernels through the public IR API and run the
//! matrix-core passes over them.

use mcore_analysis::verify_encodings;
use mcore_ir::*;
use mcore_opt::*;

fn blocked(func: &mut Function) -> Handle<Encoding> {
    func.intern_encoding(Encoding::Blocked(BlockedEncoding::new(
        [4, 4],
        [8, 8],
        [4, 1],
        [1, 0],
    )))
}

fn mfma(func: &mut Function) -> Handle<Encoding> {
    func.intern_encoding(Encoding::Mfma(MfmaEncoding {
        version_major: 2,
        version_minor: 0,
        warps_per_cta: [2, 2],
        m_dim: 32,
        n_dim: 32,
        is_transposed: false,
        cta_layout: CtaLayout::single(2),
    }))
}

fn dot_kind() -> OpKind {
    OpKind::Dot {
        allow_tf32: true,
        max_num_imprecise_acc: 0,
    }
}

fn store_kind() -> OpKind {
    OpKind::Store {
        cache: CacheModifier::Cs,
        evict: EvictionPolicy::EvictFirst,
    }
}

fn find(func: &Function, family: OpFamily) -> Vec<Handle<Operation>> {
    func.walk()
        .into_iter()
        .filter(|&op| func.op(op).kind.family() == family)
        .collect()
}

fn encoding_of(func: &Function, value: Handle<Value>) -> &Encoding {
    func.value_encoding(value).unwrap()
}

/// `c = dot(a, b, acc)`, `h = truncf(c)`, `store ptr, h`.
fn matmul_kernel(num_warps: u32) -> (Module, Handle<Function>) {
    let mut func = Function::new("matmul_kernel");
    let enc = blocked(&mut func);
    let body = func.body();
    let a = func.add_argument(body, TensorType::new([128, 64], Scalar::F16, enc));
    let b = func.add_argument(body, TensorType::new([64, 128], Scalar::F16, enc));
    let acc = func.add_argument(body, TensorType::new([128, 128], Scalar::F32, enc));
    let ptr = func.add_argument(body, TensorType::new([128, 128], Scalar::PTR, enc));
    let dot = func.append_op(
        body,
        dot_kind(),
        vec![a, b, acc],
        vec![TensorType::new([128, 128], Scalar::F32, enc).into()],
    );
    let trunc = func.append_op(
        body,
        OpKind::Cast(CastOp::TruncF),
        vec![func.result(dot).unwrap()],
        vec![TensorType::new([128, 128], Scalar::F16, enc).into()],
    );
    func.append_op(body, store_kind(), vec![ptr, func.result(trunc).unwrap()], vec![]);

    let mut module = Module::with_num_warps(num_warps);
    let handle = module.functions.append(func);
    (module, handle)
}

#[test]
fn full_pipeline_stores_from_accumulator_layout() {
    let (mut module, handle) = matmul_kernel(4);
    let pm = PassManager::for_matrix_core(AccelerateMatmulOptions::default());
    assert!(pm.run(&mut module).unwrap());

    let func = &module.functions[handle];
    let dots = find(func, OpFamily::Dot);
    assert_eq!(dots.len(), 1);
    let dot_out = func.result(dots[0]).unwrap();
    let acc_layout = encoding_of(func, dot_out).as_mfma().unwrap();
    assert_eq!(acc_layout.warps_per_cta, [2, 2]);
    assert_eq!((acc_layout.m_dim, acc_layout.n_dim), (32, 32));

    // truncf now consumes the accumulator directly and stays in its layout.
    let stores = find(func, OpFamily::Store);
    assert_eq!(stores.len(), 1);
    let store = func.op(stores[0]);
    assert_eq!(store.kind, store_kind());
    let stored = store.operands[1];
    let trunc = func.defining_op(stored).unwrap();
    assert_eq!(func.op(trunc).kind, OpKind::Cast(CastOp::TruncF));
    assert_eq!(func.op(trunc).operands[0], dot_out);
    assert!(encoding_of(func, stored).as_mfma().is_some());
    assert!(encoding_of(func, store.operands[0]).as_mfma().is_some());

    assert!(verify_encodings(func).is_empty());
    assert!(dump_module(&module).contains("#mfma<{versionMajor = 2"));
}

#[test]
fn lowering_is_idempotent() {
    let (mut module, handle) = matmul_kernel(8);
    let pass = AccelerateMatmul::new(AccelerateMatmulOptions::default());
    assert!(pass.run(&mut module).unwrap());
    let after_first = dump_function(&module.functions[handle]);
    assert!(!pass.run(&mut module).unwrap());
    assert_eq!(dump_function(&module.functions[handle]), after_first);

    let func = &module.functions[handle];
    let dot = find(func, OpFamily::Dot)[0];
    let layout = encoding_of(func, func.result(dot).unwrap()).as_mfma().unwrap();
    assert_eq!(layout.warps_per_cta, [2, 4]);
}

#[test]
fn chained_dots_use_one_dimensional_transposed_tiling() {
    let mut func = Function::new("attention");
    let enc = blocked(&mut func);
    let body = func.body();
    let q = func.add_argument(body, TensorType::new([128, 64], Scalar::F16, enc));
    let k = func.add_argument(body, TensorType::new([64, 128], Scalar::F16, enc));
    let v = func.add_argument(body, TensorType::new([128, 64], Scalar::F16, enc));
    let s_acc = func.add_argument(body, TensorType::new([128, 128], Scalar::F32, enc));
    let o_acc = func.add_argument(body, TensorType::new([128, 64], Scalar::F32, enc));
    let out = func.add_argument(body, TensorType::new([128, 64], Scalar::PTR, enc));

    let qk = func.append_op(
        body,
        dot_kind(),
        vec![q, k, s_acc],
        vec![TensorType::new([128, 128], Scalar::F32, enc).into()],
    );
    let p = func.append_op(
        body,
        OpKind::Cast(CastOp::TruncF),
        vec![func.result(qk).unwrap()],
        vec![TensorType::new([128, 128], Scalar::F16, enc).into()],
    );
    let pv = func.append_op(
        body,
        dot_kind(),
        vec![func.result(p).unwrap(), v, o_acc],
        vec![TensorType::new([128, 64], Scalar::F32, enc).into()],
    );
    func.append_op(body, store_kind(), vec![out, func.result(pv).unwrap()], vec![]);

    let mut module = Module::with_num_warps(4);
    let handle = module.functions.append(func);
    let pass = AccelerateMatmul::new(AccelerateMatmulOptions::default());
    assert!(pass.run(&mut module).unwrap());

    let func = &module.functions[handle];
    let dots = find(func, OpFamily::Dot);
    assert_eq!(dots.len(), 2);
    for dot in dots {
        let layout = encoding_of(func, func.result(dot).unwrap()).as_mfma().unwrap();
        assert_eq!(layout.warps_per_cta, [4, 1]);
        assert!(layout.is_transposed);
    }
}

#[test]
fn forced_instruction_size_without_table_entry_fails_the_pass() {
    let (mut module, _) = matmul_kernel(4);
    let pm = PassManager::for_matrix_core(AccelerateMatmulOptions {
        matrix_core_version: 2,
        matrix_instruction_size: 8,
    });
    let err = pm.run(&mut module).unwrap_err();
    assert_eq!(err.pass, "accelerate-amd-matmul");
    assert!(matches!(
        err.source,
        RewriteError::UnsupportedInstruction {
            m_dim: 8,
            n_dim: 8,
            version: 2,
            ..
        }
    ));
    assert!(err.to_string().contains("accelerate-amd-matmul"));
}

#[test]
fn forced_sixteen_selects_16x16() {
    let (mut module, handle) = matmul_kernel(4);
    let pass = AccelerateMatmul::new(AccelerateMatmulOptions {
        matrix_core_version: 3,
        matrix_instruction_size: 16,
    });
    assert!(pass.run(&mut module).unwrap());
    let func = &module.functions[handle];
    let dot = find(func, OpFamily::Dot)[0];
    let layout = encoding_of(func, func.result(dot).unwrap()).as_mfma().unwrap();
    assert_eq!((layout.m_dim, layout.n_dim), (16, 16));
    assert_eq!(layout.version_major, 3);
    let a_layout = encoding_of(func, func.op(dot).operands[0]).as_dot_operand().unwrap();
    assert_eq!(a_layout.k_width, 4);
}

#[test]
fn shallow_k_small_tile_is_not_lowered() {
    // An 8x8 result needs the 4x4 instruction, which needs K >= 64.
    let mut func = Function::new("tiny");
    let enc = blocked(&mut func);
    let body = func.body();
    let a = func.add_argument(body, TensorType::new([8, 32], Scalar::F16, enc));
    let b = func.add_argument(body, TensorType::new([32, 8], Scalar::F16, enc));
    let acc = func.add_argument(body, TensorType::new([8, 8], Scalar::F32, enc));
    let ptr = func.add_argument(body, TensorType::new([8, 8], Scalar::PTR, enc));
    let dot = func.append_op(
        body,
        dot_kind(),
        vec![a, b, acc],
        vec![TensorType::new([8, 8], Scalar::F32, enc).into()],
    );
    func.append_op(body, store_kind(), vec![ptr, func.result(dot).unwrap()], vec![]);

    let mut module = Module::default();
    let handle = module.functions.append(func);
    let pass = AccelerateMatmul::new(AccelerateMatmulOptions::default());
    assert!(!pass.run(&mut module).unwrap());
    assert!(module.functions[handle].is_live(dot));

    let err = choose_mfma_dimensions(
        &mcore_target_amd::DotProblem {
            m: 8,
            n: 8,
            k: 32,
            a: Scalar::F16,
            b: Scalar::F16,
        },
        mcore_target_amd::MatrixCoreVersion::V2,
        0,
    )
    .unwrap_err();
    assert!(matches!(err, RewriteError::InvariantViolation(_)));
}

struct Epilogue {
    module: Module,
    handle: Handle<Function>,
    convert: Handle<Operation>,
    cast: Handle<Operation>,
    negate: Handle<Operation>,
    store: Handle<Operation>,
    acc: Handle<Value>,
}

/// `convert(acc) -> truncf -> negf -> store ptr, _, mask?`
fn epilogue(with_mask: bool) -> Epilogue {
    let mut func = Function::new("epilogue");
    let enc = blocked(&mut func);
    let acc_enc = mfma(&mut func);
    let body = func.body();
    let acc = func.add_argument(body, TensorType::new([64, 64], Scalar::F32, acc_enc));
    let ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, enc));
    let mask = func.add_argument(body, TensorType::new([64, 64], Scalar::BOOL, enc));

    let convert = func.append_op(
        body,
        OpKind::ConvertLayout,
        vec![acc],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let cast = func.append_op(
        body,
        OpKind::Cast(CastOp::TruncF),
        vec![func.result(convert).unwrap()],
        vec![TensorType::new([64, 64], Scalar::F16, enc).into()],
    );
    let negate = func.append_op(
        body,
        OpKind::Unary(UnaryOp::NegF),
        vec![func.result(cast).unwrap()],
        vec![TensorType::new([64, 64], Scalar::F16, enc).into()],
    );
    let mut operands = vec![ptr, func.result(negate).unwrap()];
    if with_mask {
        operands.push(mask);
    }
    let store = func.append_op(body, store_kind(), operands, vec![]);

    let mut module = Module::default();
    let handle = module.functions.append(func);
    Epilogue {
        module,
        handle,
        convert,
        cast,
        negate,
        store,
        acc,
    }
}

#[test]
fn epilogue_chain_moves_into_accumulator_layout() {
    let Epilogue {
        mut module,
        handle,
        convert,
        cast,
        negate,
        store,
        acc,
    } = epilogue(false);
    assert!(OptimizeEpilogue.run(&mut module).unwrap());

    let func = &module.functions[handle];
    assert!(!func.is_live(convert));
    assert!(!func.is_live(store));
    assert_eq!(func.op(cast).operands[0], acc);
    assert_eq!(func.op(negate).operands[0], func.result(cast).unwrap());
    for op in [cast, negate] {
        let result = func.result(op).unwrap();
        assert!(encoding_of(func, result).as_mfma().is_some());
        assert_eq!(func.tensor_type(result).unwrap().scalar, Scalar::F16);
    }

    let stores = find(func, OpFamily::Store);
    assert_eq!(stores.len(), 1);
    let new_store = func.op(stores[0]);
    assert_eq!(new_store.kind, store_kind());
    assert_eq!(new_store.operands.len(), 2);
    assert_eq!(new_store.operands[1], func.result(negate).unwrap());
    assert!(encoding_of(func, new_store.operands[0]).as_mfma().is_some());
    assert!(verify_encodings(func).is_empty());

    assert!(!OptimizeEpilogue.run(&mut module).unwrap());
}

#[test]
fn epilogue_converts_the_mask() {
    let Epilogue {
        mut module, handle, ..
    } = epilogue(true);
    assert!(OptimizeEpilogue.run(&mut module).unwrap());

    let func = &module.functions[handle];
    let store = func.op(find(func, OpFamily::Store)[0]);
    assert_eq!(store.operands.len(), 3);
    let mask = store.operands[2];
    assert!(encoding_of(func, mask).as_mfma().is_some());
    assert_eq!(func.tensor_type(mask).unwrap().scalar, Scalar::BOOL);
    let mask_convert = func.defining_op(mask).unwrap();
    assert_eq!(func.op(mask_convert).kind, OpKind::ConvertLayout);
}

#[test]
fn epilogue_with_branching_chain_is_untouched() {
    let Epilogue {
        mut module,
        handle,
        cast,
        store,
        ..
    } = epilogue(false);
    {
        let func = &mut module.functions[handle];
        let body = func.body();
        let side = func.result(cast).unwrap();
        func.append_op(
            body,
            OpKind::Opaque {
                name: "debug_print".into(),
            },
            vec![side],
            vec![],
        );
    }
    let before = dump_module(&module);
    assert!(!OptimizeEpilogue.run(&mut module).unwrap());
    assert_eq!(dump_module(&module), before);
    assert!(module.functions[handle].is_live(store));
}

#[test]
fn epilogue_with_disallowed_op_is_untouched() {
    let mut func = Function::new("epilogue");
    let enc = blocked(&mut func);
    let acc_enc = mfma(&mut func);
    let body = func.body();
    let acc = func.add_argument(body, TensorType::new([64, 64], Scalar::F32, acc_enc));
    let ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, enc));
    let convert = func.append_op(
        body,
        OpKind::ConvertLayout,
        vec![acc],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let reduce = func.append_op(
        body,
        OpKind::Opaque {
            name: "tt.cumsum".into(),
        },
        vec![func.result(convert).unwrap()],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let store = func.append_op(body, store_kind(), vec![ptr, func.result(reduce).unwrap()], vec![]);

    let mut module = Module::default();
    let handle = module.functions.append(func);
    assert!(!OptimizeEpilogue.run(&mut module).unwrap());
    assert!(module.functions[handle].is_live(store));
    assert!(module.functions[handle].is_live(convert));
}

#[test]
fn epilogue_from_blocked_source_is_untouched() {
    let mut func = Function::new("epilogue");
    let enc = blocked(&mut func);
    let other = func.intern_encoding(Encoding::Blocked(BlockedEncoding::new(
        [1, 1],
        [64, 1],
        [4, 1],
        [0, 1],
    )));
    let body = func.body();
    let x = func.add_argument(body, TensorType::new([64, 64], Scalar::F32, other));
    let ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, enc));
    let convert = func.append_op(
        body,
        OpKind::ConvertLayout,
        vec![x],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    func.append_op(body, store_kind(), vec![ptr, func.result(convert).unwrap()], vec![]);

    let mut module = Module::default();
    module.functions.append(func);
    assert!(!OptimizeEpilogue.run(&mut module).unwrap());
}

#[test]
fn long_elementwise_epilogue_moves_into_accumulator_layout() {
    let mut func = Function::new("long_epilogue");
    let enc = blocked(&mut func);
    let body = func.body();
    let a = func.add_argument(body, TensorType::new([64, 64], Scalar::F16, enc));
    let b = func.add_argument(body, TensorType::new([64, 64], Scalar::F16, enc));
    let acc = func.add_argument(body, TensorType::new([64, 64], Scalar::F32, enc));
    let ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, enc));
    let dot = func.append_op(
        body,
        dot_kind(),
        vec![a, b, acc],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let mut v = func.result(dot).unwrap();
    for _ in 0..800 {
        let exp = func.append_op(
            body,
            OpKind::Unary(UnaryOp::Exp),
            vec![v],
            vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
        );
        v = func.result(exp).unwrap();
    }
    func.append_op(body, store_kind(), vec![ptr, v], vec![]);

    let mut module = Module::default();
    let handle = module.functions.append(func);
    let pm = PassManager::for_matrix_core(AccelerateMatmulOptions::default());
    assert!(pm.run(&mut module).unwrap());

    let func = &module.functions[handle];
    let exps = find(func, OpFamily::Unary);
    assert_eq!(exps.len(), 800);
    for exp in exps {
        let out = func.result(exp).unwrap();
        assert!(encoding_of(func, out).as_mfma().is_some());
    }
    let store = func.op(find(func, OpFamily::Store)[0]);
    assert!(encoding_of(func, store.operands[0]).as_mfma().is_some());
    assert!(find(func, OpFamily::ConvertLayout).len() <= 4);
    assert!(verify_encodings(func).is_empty());
}

#[test]
fn epilogue_with_shared_conversion_is_untouched() {
    let mut func = Function::new("epilogue");
    let enc = blocked(&mut func);
    let acc_enc = mfma(&mut func);
    let body = func.body();
    let acc = func.add_argument(body, TensorType::new([64, 64], Scalar::F32, acc_enc));
    let ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, enc));
    let convert = func.append_op(
        body,
        OpKind::ConvertLayout,
        vec![acc],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let converted = func.result(convert).unwrap();
    let negate = func.append_op(
        body,
        OpKind::Unary(UnaryOp::NegF),
        vec![converted],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let negated = func.result(negate).unwrap();
    let store = func.append_op(body, store_kind(), vec![ptr, negated], vec![]);
    func.append_op(
        body,
        OpKind::Opaque {
            name: "tt.reduce".into(),
        },
        vec![converted],
        vec![],
    );

    let mut module = Module::default();
    let handle = module.functions.append(func);
    let before = dump_module(&module);
    assert!(!OptimizeEpilogue.run(&mut module).unwrap());
    assert_eq!(dump_module(&module), before);
    assert!(module.functions[handle].is_live(store));
}

#[test]
fn store_outside_blocked_layout_is_untouched() {
    let mut func = Function::new("epilogue");
    let enc = blocked(&mut func);
    let acc_enc = mfma(&mut func);
    let body = func.body();
    let acc = func.add_argument(body, TensorType::new([64, 64], Scalar::F32, acc_enc));
    let ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, enc));
    let mfma_ptr = func.add_argument(body, TensorType::new([64, 64], Scalar::PTR, acc_enc));
    let convert = func.append_op(
        body,
        OpKind::ConvertLayout,
        vec![acc],
        vec![TensorType::new([64, 64], Scalar::F32, enc).into()],
    );
    let converted = func.result(convert).unwrap();
    // Value already in the accumulator layout.
    let direct = func.append_op(body, store_kind(), vec![ptr, acc], vec![]);
    // Pointer already in the accumulator layout.
    let mixed = func.append_op(body, store_kind(), vec![mfma_ptr, converted], vec![]);

    let mut module = Module::default();
    let handle = module.functions.append(func);
    let before = dump_module(&module);
    assert!(!OptimizeEpilogue.run(&mut module).unwrap());
    assert_eq!(dump_module(&module), before);
    let func = &module.functions[handle];
    assert!(func.is_live(direct));
    assert!(func.is_live(mixed));
    assert!(func.is_live(convert));
}
