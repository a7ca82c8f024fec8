//! Programs working on objects at fixed host addresses.

mod common;

use bitcode_expr::KValue;
use bitcode_ir::{CallTarget, Instruction, Module, ModuleBuilder, FunctionBuilder, Predicate};
use symbolic_bitcode::Config;

use common::{declare_engine_api, run_module, EngineApi};

/// `sb_define_fixed_object((int*)0x80, 8)` followed by accesses at a given
/// word index, mirroring a program doing `p[index] = 10`.
fn fixed_object_program(word_index: u64) -> Module {
    let mut mb = ModuleBuilder::new();
    let api: EngineApi = declare_engine_api(&mut mb);

    let address = mb.constant_int(0x80, 64);
    let size = mb.constant_int(8, 64);
    let slot = mb.constant(KValue::pointer(0, 0x80 + word_index * 4));
    let ten = mb.constant_int(10, 32);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    let ok_block = fb.create_block();
    let bad_block = fb.create_block();
    fb.begin_block(entry).unwrap();
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.define_fixed_object),
        args: vec![address, size],
        result_width: None,
        signed_ret: false,
    });
    fb.set_location("fixed.c", 20);
    fb.push(Instruction::Store {
        value: ten,
        address: slot,
    });
    let loaded = fb.push(Instruction::Load {
        address: slot,
        width: 32,
    });
    let is_ten = fb.push(Instruction::ICmp {
        predicate: Predicate::Eq,
        lhs: loaded,
        rhs: ten,
    });
    fb.push(Instruction::CondBr {
        condition: is_ten,
        then_dest: ok_block,
        else_dest: bad_block,
    });
    fb.begin_block(ok_block).unwrap();
    fb.push(Instruction::Ret { value: None });
    fb.begin_block(bad_block).unwrap();
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.abort),
        args: vec![],
        result_width: None,
        signed_ret: false,
    });
    fb.push(Instruction::Unreachable);
    mb.add_function(fb).unwrap();
    mb.build()
}

#[test]
fn fixed_object_within_bounds_round_trips() {
    // p[1] = 10 lands at 0x84, inside the 8-byte object.
    let (executor, handler) = run_module(fixed_object_program(1), Config::default());
    let handler = handler.borrow();
    assert_eq!(handler.records.len(), 1);
    assert_eq!(handler.errors().count(), 0);
    assert_eq!(handler.clean_exits().count(), 1);
    assert_eq!(executor.stats.forks, 0);
}

#[test]
fn fixed_object_out_of_bounds_is_a_pointer_error() {
    // p[2] = 10 lands at 0x88, one word past the end.
    let (_executor, handler) = run_module(fixed_object_program(2), Config::default());
    let handler = handler.borrow();
    assert_eq!(handler.records.len(), 1);
    let error = handler.errors().next().expect("pointer error");
    assert_eq!(error.kind.as_deref(), Some("ptr"));
    let message = error.message.as_deref().unwrap();
    assert!(message.contains("out of bound pointer"), "{message}");
    // The report points at the offending store.
    assert!(message.contains("fixed.c:20"), "{message}");
}

#[test]
fn overlapping_fixed_allocation_is_reported() {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);

    let first_address = mb.constant_int(0x80, 64);
    let first_size = mb.constant_int(8, 64);
    let second_address = mb.constant_int(0x84, 64);
    let second_size = mb.constant_int(4, 64);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    fb.begin_block(entry).unwrap();
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.define_fixed_object),
        args: vec![first_address, first_size],
        result_width: None,
        signed_ret: false,
    });
    fb.push(Instruction::Call {
        target: CallTarget::Direct(api.define_fixed_object),
        args: vec![second_address, second_size],
        result_width: None,
        signed_ret: false,
    });
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();

    let (_executor, handler) = run_module(mb.build(), Config::default());
    let handler = handler.borrow();
    // The second allocation fails; no path reaches a clean exit.
    assert_eq!(handler.clean_exits().count(), 0);
    let error = handler.errors().next().expect("overlap error");
    assert_eq!(error.kind.as_deref(), Some("user"));
    assert!(error
        .message
        .as_deref()
        .unwrap()
        .contains("Trying to allocate an overlapping object"));
}
