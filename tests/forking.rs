//! Branch-protocol behavior: infeasible sides, fork caps, and symbolic
//! function pointers.

mod common;

use bitcode_expr::{KValue, FUNCTIONS_SEGMENT};
use bitcode_ir::{
    CallTarget, CastOp, FunctionBuilder, Instruction, Module, ModuleBuilder, Predicate,
};
use symbolic_bitcode::state::InstRef;
use symbolic_bitcode::Config;

use common::{declare_engine_api, run_module};

/// `x` is symbolic with `x > 0` assumed; the program then branches on
/// `x < 0`, whose true side is infeasible.
fn constrained_branch_program() -> Module {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let four = mb.constant_int(4, 64);
    let zero = mb.constant_int(0, 32);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    let negative = fb.create_block();
    let positive = fb.create_block();
    fb.begin_block(entry).unwrap();
    let p = fb.push(Instruction::Alloca { size: four });
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.make_symbolic),
        args: vec![p],
        result_width: None,
        signed_ret: false,
    });
    let x = fb.push(Instruction::Load {
        address: p,
        width: 32,
    });
    let is_positive = fb.push(Instruction::ICmp {
        predicate: Predicate::Sgt,
        lhs: x,
        rhs: zero,
    });
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.assume),
        args: vec![is_positive],
        result_width: None,
        signed_ret: false,
    });
    let is_negative = fb.push(Instruction::ICmp {
        predicate: Predicate::Slt,
        lhs: x,
        rhs: zero,
    });
    fb.push(Instruction::CondBr {
        condition: is_negative,
        then_dest: negative,
        else_dest: positive,
    });
    fb.begin_block(negative).unwrap();
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.abort),
        args: vec![],
        result_width: None,
        signed_ret: false,
    });
    fb.push(Instruction::Unreachable);
    fb.begin_block(positive).unwrap();
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();
    mb.build()
}

#[test]
fn unsatisfiable_branch_side_is_not_forked() {
    let (executor, handler) = run_module(constrained_branch_program(), Config::default());
    let handler = handler.borrow();
    assert_eq!(handler.records.len(), 1, "single surviving state");
    assert_eq!(handler.errors().count(), 0);
    assert_eq!(executor.stats.forks, 0, "no fork recorded");
}

/// An unconstrained symbolic branch under a zero fork budget.
fn unconstrained_branch_program() -> Module {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let four = mb.constant_int(4, 64);
    let zero = mb.constant_int(0, 32);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    let low = fb.create_block();
    let high = fb.create_block();
    fb.begin_block(entry).unwrap();
    let p = fb.push(Instruction::Alloca { size: four });
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.make_symbolic),
        args: vec![p],
        result_width: None,
        signed_ret: false,
    });
    let x = fb.push(Instruction::Load {
        address: p,
        width: 32,
    });
    let is_negative = fb.push(Instruction::ICmp {
        predicate: Predicate::Slt,
        lhs: x,
        rhs: zero,
    });
    fb.push(Instruction::CondBr {
        condition: is_negative,
        then_dest: low,
        else_dest: high,
    });
    fb.begin_block(low).unwrap();
    fb.push(Instruction::Ret { value: None });
    fb.begin_block(high).unwrap();
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();
    mb.build()
}

#[test]
fn symbolic_branch_explores_both_sides() {
    let (executor, handler) = run_module(unconstrained_branch_program(), Config::default());
    let handler = handler.borrow();
    assert_eq!(handler.clean_exits().count(), 2);
    assert_eq!(executor.stats.forks, 1);
    // The two paths recorded opposite directions at the fork point.
    let paths: Vec<&Vec<bool>> = handler.records.iter().map(|r| &r.path).collect();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0], paths[1]);
}

#[test]
fn max_forks_collapses_to_a_single_branch() {
    let config = Config {
        max_forks: Some(0),
        ..Config::default()
    };
    let (executor, handler) = run_module(unconstrained_branch_program(), config);
    let handler = handler.borrow();
    // Exactly one child survives, with the chosen side's constraint added.
    assert_eq!(handler.records.len(), 1);
    assert_eq!(handler.clean_exits().count(), 1);
    assert_eq!(executor.stats.forks, 0);
    assert_eq!(handler.records[0].path.len(), 1);
}

/// Call through a function pointer selected by a one-bit symbolic value.
fn function_pointer_program() -> (Module, InstRef, InstRef) {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let one_i32 = mb.constant_int(1, 32);
    let two_i32 = mb.constant_int(2, 32);
    let one_i64 = mb.constant_int(1, 64);

    let mut f = FunctionBuilder::new("f", &[]);
    let f_entry = f.create_block();
    f.begin_block(f_entry).unwrap();
    f.push(Instruction::Ret {
        value: Some(one_i32),
    });
    let f_id = mb.add_function(f).unwrap();

    let mut g = FunctionBuilder::new("g", &[]);
    let g_entry = g.create_block();
    g.begin_block(g_entry).unwrap();
    g.push(Instruction::Ret {
        value: Some(two_i32),
    });
    let g_id = mb.add_function(g).unwrap();

    let f_pointer = mb.constant(KValue::pointer(FUNCTIONS_SEGMENT, f_id.0 as u64));
    let g_pointer = mb.constant(KValue::pointer(FUNCTIONS_SEGMENT, g_id.0 as u64));

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    fb.begin_block(entry).unwrap();
    let s = fb.push(Instruction::Alloca { size: one_i64 });
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.make_symbolic),
        args: vec![s],
        result_width: None,
        signed_ret: false,
    });
    let selector_byte = fb.push(Instruction::Load {
        address: s,
        width: 8,
    });
    let selector = fb.push(Instruction::Cast {
        op: CastOp::Trunc,
        value: selector_byte,
        width: 1,
    });
    let target = fb.push(Instruction::Select {
        condition: selector,
        on_true: f_pointer,
        on_false: g_pointer,
    });
    fb.push(Instruction::Call {
        target: CallTarget::Indirect(target),
        args: vec![],
        result_width: Some(32),
        signed_ret: false,
    });
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();

    let f_entry = InstRef {
        function: f_id,
        index: 0,
    };
    let g_entry = InstRef {
        function: g_id,
        index: 0,
    };
    (mb.build(), f_entry, g_entry)
}

#[test]
fn symbolic_function_pointer_reaches_every_target() {
    let (module, f_entry, g_entry) = function_pointer_program();
    let (executor, handler) = run_module(module, Config::default());
    let handler = handler.borrow();
    assert_eq!(handler.clean_exits().count(), 2, "one path per callee");
    assert_eq!(handler.errors().count(), 0);
    // Both callees show up in the coverage counters.
    assert!(executor.covered_instructions().contains(&f_entry));
    assert!(executor.covered_instructions().contains(&g_entry));
}
