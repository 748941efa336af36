//! Integration test: build a blocked matmul kernel through the public API
//! and verify graph queries and the text dump.

use mcore_ir::*;

/// ```text
/// %c  = dot %a, %b, %acc      : blocked
/// %h  = truncf %c             : blocked
///       store %ptr, %h        : blocked
/// ```
#[test]
fn build_matmul_kernel() {
    let mut module = Module::with_num_warps(8);
    let mut func = Function::new("matmul_kernel");

    let blocked = func.intern_encoding(Encoding::Blocked(BlockedEncoding::new(
        [4, 4],
        [8, 8],
        [8, 1],
        [1, 0],
    )));
    let body = func.body();
    let a = func.add_argument(body, TensorType::new([128, 64], Scalar::F16, blocked));
    let b = func.add_argument(body, TensorType::new([64, 128], Scalar::F16, blocked));
    let acc = func.add_argument(body, TensorType::new([128, 128], Scalar::F32, blocked));
    let ptr = func.add_argument(body, TensorType::new([128, 128], Scalar::PTR, blocked));

    let dot = func.append_op(
        body,
        OpKind::Dot {
            allow_tf32: true,
            max_num_imprecise_acc: 0,
        },
        vec![a, b, acc],
        vec![TensorType::new([128, 128], Scalar::F32, blocked).into()],
    );
    let c = func.result(dot).unwrap();
    let trunc = func.append_op(
        body,
        OpKind::Cast(CastOp::TruncF),
        vec![c],
        vec![TensorType::new([128, 128], Scalar::F16, blocked).into()],
    );
    let h = func.result(trunc).unwrap();
    let store = func.append_op(
        body,
        OpKind::Store {
            cache: CacheModifier::None,
            evict: EvictionPolicy::Normal,
        },
        vec![ptr, h],
        vec![],
    );

    assert_eq!(func.walk(), vec![dot, trunc, store]);
    assert_eq!(func.uses(h), vec![Use { op: store, operand: 1 }]);
    assert!(func.value_encoding(c).is_some_and(Encoding::is_blocked));
    assert_eq!(func.tensor_type(a).unwrap().shape, vec![128, 64]);

    let text = dump_function(&func);
    assert!(text.contains("func @matmul_kernel("));
    assert!(text.contains("%4 = dot %0, %1, %2 {allowTF32 = true, maxNumImpreciseAcc = 0}"));
    assert!(text.contains("%5 = truncf %4"));
    assert!(text.contains("store %3, %5 {cache = None, evict = Normal}"));

    module.functions.append(func);
    let module_text = dump_module(&module);
    assert!(module_text.starts_with("module attributes {num-warps = 8, threads-per-warp = 64}"));
}

#[test]
fn default_module_configuration() {
    let module = Module::default();
    assert_eq!(module.num_warps, DEFAULT_NUM_WARPS);
    assert_eq!(module.threads_per_warp, 64);
    assert!(module.functions.is_empty());
}
