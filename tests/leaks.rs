//! Exit-time leak checking: the mem-cleanup mode reports anything on the
//! heap, the leak mode only what nothing points at anymore.

mod common;

use bitcode_ir::{CallTarget, FunctionBuilder, Instruction, Module, ModuleBuilder};
use symbolic_bitcode::Config;

use common::{declare_engine_api, run_module};

/// malloc a word and exit, optionally keeping the pointer alive in a local.
fn leaky_program(store_pointer: bool) -> Module {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let four = mb.constant_int(4, 64);
    let eight = mb.constant_int(8, 64);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    fb.begin_block(entry).unwrap();
    let keep = fb.push(Instruction::Alloca { size: eight });
    let p = fb.push(Instruction::Call {
        target: CallTarget::Direct(api.malloc),
        args: vec![four],
        result_width: Some(64),
        signed_ret: false,
    });
    if store_pointer {
        fb.push(Instruction::Store {
            value: p,
            address: keep,
        });
    }
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();
    mb.build()
}

#[test]
fn mem_cleanup_mode_reports_any_surviving_heap_object() {
    let config = Config {
        check_mem_cleanup: true,
        ..Config::default()
    };
    let (_executor, handler) = run_module(leaky_program(true), config);
    let handler = handler.borrow();
    let error = handler.errors().next().expect("leak error");
    assert_eq!(error.kind.as_deref(), Some("leak"));
    assert!(error
        .message
        .as_deref()
        .unwrap()
        .contains("memory not cleaned up"));
}

#[test]
fn leak_mode_reports_unreachable_heap() {
    let config = Config {
        check_leaks: true,
        ..Config::default()
    };
    let (_executor, handler) = run_module(leaky_program(false), config);
    let handler = handler.borrow();
    let error = handler.errors().next().expect("leak error");
    assert_eq!(error.kind.as_deref(), Some("leak"));
    assert!(error
        .message
        .as_deref()
        .unwrap()
        .contains("memory leak detected"));
}

#[test]
fn leak_mode_accepts_heap_still_reachable_from_a_local() {
    let config = Config {
        check_leaks: true,
        ..Config::default()
    };
    // The pointer stored into the local's segment plane keeps the heap
    // object reachable: the state terminates without an error and, since
    // the program could still have freed it, without a test case either.
    let (executor, handler) = run_module(leaky_program(true), config);
    let handler = handler.borrow();
    assert!(handler.records.is_empty(), "{:?}", handler.records);
    assert_eq!(executor.stats.completed_paths, 1);
}

#[test]
fn freed_heap_passes_the_cleanup_check() {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let four = mb.constant_int(4, 64);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    fb.begin_block(entry).unwrap();
    let p = fb.push(Instruction::Call {
        target: CallTarget::Direct(api.malloc),
        args: vec![four],
        result_width: Some(64),
        signed_ret: false,
    });
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.free),
        args: vec![p],
        result_width: None,
        signed_ret: false,
    });
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();

    let config = Config {
        check_mem_cleanup: true,
        ..Config::default()
    };
    let (_executor, handler) = run_module(mb.build(), config);
    let handler = handler.borrow();
    assert_eq!(handler.errors().count(), 0, "{:?}", handler.records);
    assert_eq!(handler.clean_exits().count(), 1);
}
