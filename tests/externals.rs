//! External-call marshalling through the concrete caches.

mod common;

use bitcode_ir::{CallTarget, FunctionBuilder, Instruction, Module, ModuleBuilder, Predicate};
use symbolic_bitcode::externals::{ExternalCallError, ExternalDispatcher, ExternalMemory};
use symbolic_bitcode::{Config, ExternalCallPolicy};

use common::{declare_engine_api, run_module_with};

/// Dispatcher for two toy natives: `bump` increments the first byte of its
/// buffer argument, `scribble` overwrites it.
struct TestDispatcher;

impl ExternalDispatcher for TestDispatcher {
    fn resolves(&self, name: &str) -> bool {
        matches!(name, "bump" | "scribble")
    }

    fn call(
        &mut self,
        name: &str,
        args: &[u64],
        memory: &mut ExternalMemory,
    ) -> Result<u64, ExternalCallError> {
        let (buffer, offset) = memory
            .at_address(args[0])
            .ok_or_else(|| ExternalCallError::Failed("bad pointer".to_string()))?;
        match name {
            "bump" => {
                buffer[offset as usize] = buffer[offset as usize].wrapping_add(1);
                Ok(0)
            }
            "scribble" => {
                buffer[offset as usize] = 0xff;
                Ok(0)
            }
            _ => Err(ExternalCallError::UnknownSymbol(name.to_string())),
        }
    }
}

/// malloc a word, store into it, optionally mark it read-only, then hand it
/// to the named external and verify what came back.
fn external_program(native: &str, read_only: bool) -> Module {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let native_id = mb.declare_function(native, &[64]).unwrap();
    let four = mb.constant_int(4, 64);
    let init = mb.constant_int(5, 8);
    let expected = mb.constant_int(6, 8);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    let ok_block = fb.create_block();
    let bad_block = fb.create_block();
    fb.begin_block(entry).unwrap();
    let p = fb.push(Instruction::Call {
        target: CallTarget::Direct(api.malloc),
        args: vec![four],
        result_width: Some(64),
        signed_ret: false,
    });
    fb.push(Instruction::Store {
        value: init,
        address: p,
    });
    if read_only {
        fb.push(Instruction::Call {
            target: CallTarget::Direct(api.mark_read_only),
            args: vec![p],
            result_width: None,
            signed_ret: false,
        });
    }
    fb.push(Instruction::Call {
        target: CallTarget::Direct(native_id),
        args: vec![p],
        result_width: Some(32),
        signed_ret: false,
    });
    let value = fb.push(Instruction::Load {
        address: p,
        width: 8,
    });
    let bumped = fb.push(Instruction::ICmp {
        predicate: Predicate::Eq,
        lhs: value,
        rhs: expected,
    });
    fb.push(Instruction::CondBr {
        condition: bumped,
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
fn external_writes_propagate_back() {
    let (_executor, handler) = run_module_with(
        external_program("bump", false),
        Config::default(),
        Some(Box::new(TestDispatcher)),
    );
    let handler = handler.borrow();
    assert_eq!(handler.errors().count(), 0, "{:?}", handler.records);
    assert_eq!(handler.clean_exits().count(), 1);
}

#[test]
fn external_modification_of_read_only_object_is_an_error() {
    let (_executor, handler) = run_module_with(
        external_program("scribble", true),
        Config::default(),
        Some(Box::new(TestDispatcher)),
    );
    let handler = handler.borrow();
    let error = handler.errors().next().expect("external error");
    assert_eq!(error.kind.as_deref(), Some("external"));
    assert!(error
        .message
        .as_deref()
        .unwrap()
        .contains("external modified read-only object"));
}

#[test]
fn disallowed_external_calls_terminate_the_state() {
    let config = Config {
        external_calls: ExternalCallPolicy::None,
        ..Config::default()
    };
    let (_executor, handler) = run_module_with(
        external_program("bump", false),
        config,
        Some(Box::new(TestDispatcher)),
    );
    let handler = handler.borrow();
    let error = handler.errors().next().expect("external error");
    assert_eq!(error.kind.as_deref(), Some("external"));
}

#[test]
fn unresolvable_externals_fail_cleanly() {
    let (_executor, handler) = run_module_with(
        external_program("bump", false),
        Config::default(),
        None, // no dispatcher at all
    );
    let handler = handler.borrow();
    let error = handler.errors().next().expect("external error");
    assert!(error
        .message
        .as_deref()
        .unwrap()
        .contains("failed external call: bump"));
}
