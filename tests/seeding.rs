//! Seed replay: recorded inputs routed through forks.

mod common;

use std::sync::Arc;

use bitcode_ir::{CallTarget, FunctionBuilder, Instruction, Module, ModuleBuilder, Predicate};
use bitcode_solver::RangeSolver;
use symbolic_bitcode::handler::CollectingHandler;
use symbolic_bitcode::searcher::DfsSearcher;
use symbolic_bitcode::seeds::{TestCase, TestObject};
use symbolic_bitcode::{Config, Executor};

use common::declare_engine_api;

/// One symbolic byte, compared against 7.
fn branch_on_byte_program(num_symbolics: usize) -> Module {
    let mut mb = ModuleBuilder::new();
    let api = declare_engine_api(&mut mb);
    let one = mb.constant_int(1, 64);
    let seven = mb.constant_int(7, 8);

    let mut fb = FunctionBuilder::new("main", &[]);
    let entry = fb.create_block();
    let lucky = fb.create_block();
    let unlucky = fb.create_block();
    fb.begin_block(entry).unwrap();
    let mut last = None;
    for _ in 0..num_symbolics {
        let p = fb.push(Instruction::Alloca { size: one });
        fb.push(Instruction::Call {
            target: CallTarget::Direct(api.make_symbolic),
            args: vec![p],
            result_width: None,
            signed_ret: false,
        });
        last = Some(p);
    }
    let x = fb.push(Instruction::Load {
        address: last.expect("at least one symbolic"),
        width: 8,
    });
    let is_seven = fb.push(Instruction::ICmp {
        predicate: Predicate::Eq,
        lhs: x,
        rhs: seven,
    });
    fb.push(Instruction::CondBr {
        condition: is_seven,
        then_dest: lucky,
        else_dest: unlucky,
    });
    fb.begin_block(lucky).unwrap();
    fb.push(Instruction::Ret { value: None });
    fb.begin_block(unlucky).unwrap();
    fb.push(Instruction::Ret { value: None });
    mb.add_function(fb).unwrap();
    mb.build()
}

fn seed_of(bytes: Vec<Vec<u8>>) -> Arc<TestCase> {
    Arc::new(TestCase {
        objects: bytes
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| TestObject {
                name: format!("input_{i}"),
                bytes,
            })
            .collect(),
    })
}

fn run_seeded(
    module: Module,
    config: Config,
    seeds: Vec<Arc<TestCase>>,
) -> (Executor, std::rc::Rc<std::cell::RefCell<CollectingHandler>>) {
    let module = Arc::new(module);
    let main = module.function_by_name("main").unwrap();
    let handler = std::rc::Rc::new(std::cell::RefCell::new(CollectingHandler::new()));
    let mut executor = Executor::new(
        module,
        config,
        Box::new(RangeSolver::new()),
        Box::new(handler.clone()),
        Box::new(DfsSearcher::new()),
    );
    executor.set_seeds(seeds);
    executor.run_function_as_main(main, &["a.out"], &[]);
    (executor, handler)
}

#[test]
fn replay_only_mode_follows_the_seed() {
    let config = Config {
        only_replay_seeds: true,
        ..Config::default()
    };
    let (executor, handler) =
        run_seeded(branch_on_byte_program(1), config, vec![seed_of(vec![vec![7]])]);
    let handler = handler.borrow();
    // A single seed satisfies only the equal side; no fork happens and the
    // other side is never explored.
    assert_eq!(executor.stats.forks, 0);
    assert_eq!(handler.clean_exits().count(), 1);
    assert_eq!(handler.records[0].path, vec![true]);
}

#[test]
fn seeds_partition_across_a_fork() {
    let seeds = vec![seed_of(vec![vec![7]]), seed_of(vec![vec![9]])];
    let (executor, handler) = run_seeded(branch_on_byte_program(1), Config::default(), seeds);
    let handler = handler.borrow();
    assert_eq!(executor.stats.forks, 1);
    assert_eq!(handler.clean_exits().count(), 2);
}

#[test]
fn running_out_of_seed_inputs_is_a_user_error() {
    let (_executor, handler) = run_seeded(
        branch_on_byte_program(2),
        Config::default(),
        vec![seed_of(vec![vec![7]])],
    );
    let handler = handler.borrow();
    let error = handler.errors().next().expect("seeding error");
    assert_eq!(error.kind.as_deref(), Some("user"));
    assert!(error
        .message
        .as_deref()
        .unwrap()
        .contains("ran out of inputs during seeding"));
}

#[test]
fn zero_extension_fills_missing_inputs() {
    let config = Config {
        zero_seed_extension: true,
        ..Config::default()
    };
    let (_executor, handler) = run_seeded(
        branch_on_byte_program(2),
        config,
        vec![seed_of(vec![vec![7]])],
    );
    let handler = handler.borrow();
    assert_eq!(handler.errors().count(), 0);
    assert!(handler.clean_exits().count() >= 1);
}
