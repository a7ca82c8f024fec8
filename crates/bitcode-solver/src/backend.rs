use std::time::Duration;

use bitcode_expr::{Array, Expr};

/// Outcome of a validity query against the current path condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// The expression is true in every model of the constraints.
    True,
    /// The expression is false in every model of the constraints.
    False,
    /// Both truth values are feasible (or the backend cannot tell).
    Unknown,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The per-call timeout expired before an answer was found. Callers
    /// treat the answer as unknown or abandon the querying state.
    #[error("solver query timed out")]
    Timeout,

    #[error("solver failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One query: an expression asked about under a conjunction of width-1
/// constraints that are all asserted true.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    pub constraints: &'a [Expr],
    pub expr: &'a Expr,
}

impl<'a> Query<'a> {
    pub fn new(constraints: &'a [Expr], expr: &'a Expr) -> Self {
        Query { constraints, expr }
    }
}

/// The solver abstraction the execution core consumes.
///
/// Implementations must be sound in both directions: `evaluate` may answer
/// [`Validity::Unknown`] freely, but `True`/`False` are claims about every
/// model of the constraints. `must_be_true` inherits the same contract and
/// `may_be_true` must never report an actually-feasible query as infeasible.
pub trait SolverBackend {
    /// Set the wall-clock budget for each subsequent call; `None` removes it.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Decide the validity of a width-1 expression.
    fn evaluate(&mut self, query: Query) -> Result<Validity>;

    fn must_be_true(&mut self, query: Query) -> Result<bool> {
        Ok(self.evaluate(query)? == Validity::True)
    }

    fn must_be_false(&mut self, query: Query) -> Result<bool> {
        Ok(self.evaluate(query)? == Validity::False)
    }

    fn may_be_true(&mut self, query: Query) -> Result<bool> {
        Ok(self.evaluate(query)? != Validity::False)
    }

    fn may_be_false(&mut self, query: Query) -> Result<bool> {
        Ok(self.evaluate(query)? != Validity::True)
    }

    /// Produce one value of `query.expr` that satisfies the constraints.
    fn get_value(&mut self, query: Query) -> Result<u128>;

    /// A `[min, max]` over-approximation of the values `query.expr` can
    /// take under the constraints.
    fn get_range(&mut self, query: Query) -> Result<(u128, u128)>;

    /// Construct concrete contents for `arrays` satisfying `constraints`,
    /// in the order given. The backbone of test-case generation.
    fn get_initial_values(
        &mut self,
        constraints: &[Expr],
        arrays: &[Array],
    ) -> Result<Vec<Vec<u8>>>;

    /// A printable form of the constraint set, for reports.
    fn constraint_log(&mut self, constraints: &[Expr]) -> String {
        constraints
            .iter()
            .map(|c| format!("{c:?}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
