#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bitcode_ir::{FunctionId, Module, ModuleBuilder};
use bitcode_solver::RangeSolver;
use symbolic_bitcode::externals::ExternalDispatcher;
use symbolic_bitcode::handler::CollectingHandler;
use symbolic_bitcode::searcher::DfsSearcher;
use symbolic_bitcode::{Config, Executor};

/// The engine-API declarations programs in these tests call.
pub struct EngineApi {
    pub define_fixed_object: FunctionId,
    pub make_symbolic: FunctionId,
    pub mark_read_only: FunctionId,
    pub assume: FunctionId,
    pub abort: FunctionId,
    pub malloc: FunctionId,
    pub free: FunctionId,
}

pub fn declare_engine_api(mb: &mut ModuleBuilder) -> EngineApi {
    EngineApi {
        define_fixed_object: mb
            .declare_function("sb_define_fixed_object", &[64, 64])
            .unwrap(),
        make_symbolic: mb.declare_function("sb_make_symbolic", &[64]).unwrap(),
        mark_read_only: mb.declare_function("sb_mark_read_only", &[64]).unwrap(),
        assume: mb.declare_function("sb_assume", &[1]).unwrap(),
        abort: mb.declare_function("abort", &[]).unwrap(),
        malloc: mb.declare_function("malloc", &[64]).unwrap(),
        free: mb.declare_function("free", &[64]).unwrap(),
    }
}

pub fn run_module(module: Module, config: Config) -> (Executor, Rc<RefCell<CollectingHandler>>) {
    run_module_with(module, config, None)
}

pub fn run_module_with(
    module: Module,
    config: Config,
    dispatcher: Option<Box<dyn ExternalDispatcher>>,
) -> (Executor, Rc<RefCell<CollectingHandler>>) {
    let module = Arc::new(module);
    let main = module.function_by_name("main").expect("module has a main");
    let handler = Rc::new(RefCell::new(CollectingHandler::new()));
    let mut executor = Executor::new(
        module,
        config,
        Box::new(RangeSolver::new()),
        Box::new(handler.clone()),
        Box::new(DfsSearcher::new()),
    );
    if let Some(dispatcher) = dispatcher {
        executor.set_dispatcher(dispatcher);
    }
    executor.run_function_as_main(main, &["a.out"], &[]);
    (executor, handler)
}
