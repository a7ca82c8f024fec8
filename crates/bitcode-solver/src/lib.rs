//! Constraint solver interface.
//!
//! The execution core only ever talks to a [`SolverBackend`]: validity
//! queries over a path condition, satisfying values, value ranges, and whole
//! counterexample assignments, each with a per-call timeout whose expiry is
//! reported separately from the answer. The built-in [`RangeSolver`] decides
//! queries by sound interval analysis; an SMT process can be plugged in
//! behind the same trait without the core noticing.

mod backend;
mod range;

pub use backend::{Error, Query, Result, SolverBackend, Validity};
pub use range::RangeSolver;
