//! Symbolic execution core for prepared LLVM bitcode.
//!
//! The engine interprets an already-lowered instruction table
//! ([`bitcode_ir::Module`]) over a hybrid concrete/symbolic value domain.
//! Every pointer is a `(segment, offset)` pair rather than a flat integer:
//! segments name allocations, so aliasing questions become segment
//! questions and most pointer resolutions never reach the solver.
//!
//! Execution forks at branches the path condition does not decide. Forked
//! states share their address space through persistent maps and a
//! copy-on-write owner key, so a fork is O(1) and pays only for the objects
//! it later writes.
//!
//! ### Driving the engine
//!
//! Construct an [`Executor`] from a module, a [`bitcode_solver`] backend, a
//! test-case handler, and a searcher, then point it at a function:
//!
//! ```no_run
//! use std::sync::Arc;
//! use symbolic_bitcode::{Config, Executor};
//! use symbolic_bitcode::handler::CollectingHandler;
//! use symbolic_bitcode::searcher::DfsSearcher;
//! use bitcode_solver::RangeSolver;
//!
//! # fn build_module() -> bitcode_ir::Module { unimplemented!() }
//! let module = Arc::new(build_module());
//! let main = module.function_by_name("main").unwrap();
//! let mut executor = Executor::new(
//!     module,
//!     Config::default(),
//!     Box::new(RangeSolver::new()),
//!     Box::new(CollectingHandler::new()),
//!     Box::new(DfsSearcher::new()),
//! );
//! executor.run_function_as_main(main, &["program"], &[]);
//! ```

pub use bitcode_expr;
pub use bitcode_ir;
pub use bitcode_solver;

/// The segmented address space and pointer resolution.
pub mod address_space;

/// Engine configuration knobs.
pub mod config;

/// The interpreter loop, fork engine, and termination handling.
pub mod executor;

/// External-function dispatch and concrete marshalling.
pub mod externals;

/// Consumers of terminated states.
pub mod handler;

/// Memory objects and their per-state contents.
pub mod memory;

/// The fork-ancestry tree of all live states.
pub mod ptree;

/// State-selection strategies for the scheduler.
pub mod searcher;

/// Seed replay: recorded inputs biasing exploration.
pub mod seeds;

/// The engine-side solver wrapper.
pub mod solver;

/// Per-path interpreter state.
pub mod state;

pub use config::{Config, ExternalCallPolicy};
pub use executor::{Executor, StatePair, Stats, TerminateReason};
