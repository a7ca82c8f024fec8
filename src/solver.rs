use std::time::{Duration, Instant};

use bitcode_expr::{Array, Expr};
use bitcode_solver::{Query, Result, SolverBackend, Validity};

/// Engine-side solver wrapper: applies the configured per-query timeout,
/// short-circuits constant queries before they reach the backend, and
/// accounts query time for the static solve-percentage caps.
pub struct TimingSolver {
    backend: Box<dyn SolverBackend>,
    timeout: Option<Duration>,
    default_timeout: Option<Duration>,
    pub total_time: Duration,
    pub queries: u64,
}

impl TimingSolver {
    pub fn new(backend: Box<dyn SolverBackend>, default_timeout: Option<Duration>) -> Self {
        TimingSolver {
            backend,
            timeout: default_timeout,
            default_timeout,
            total_time: Duration::ZERO,
            queries: 0,
        }
    }

    /// Override the timeout for subsequent queries (seed batches scale it).
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn reset_timeout(&mut self) {
        self.timeout = self.default_timeout;
    }

    fn timed<T>(&mut self, f: impl FnOnce(&mut dyn SolverBackend) -> Result<T>) -> Result<T> {
        self.backend.set_timeout(self.timeout);
        let start = Instant::now();
        let result = f(self.backend.as_mut());
        self.total_time += start.elapsed();
        self.queries += 1;
        result
    }

    pub fn evaluate(&mut self, constraints: &[Expr], expr: &Expr) -> Result<Validity> {
        if let Some(v) = expr.as_constant() {
            return Ok(if v == 1 { Validity::True } else { Validity::False });
        }
        self.timed(|b| b.evaluate(Query::new(constraints, expr)))
    }

    pub fn must_be_true(&mut self, constraints: &[Expr], expr: &Expr) -> Result<bool> {
        if let Some(v) = expr.as_constant() {
            return Ok(v == 1);
        }
        self.timed(|b| b.must_be_true(Query::new(constraints, expr)))
    }

    pub fn must_be_false(&mut self, constraints: &[Expr], expr: &Expr) -> Result<bool> {
        if let Some(v) = expr.as_constant() {
            return Ok(v == 0);
        }
        self.timed(|b| b.must_be_false(Query::new(constraints, expr)))
    }

    pub fn may_be_true(&mut self, constraints: &[Expr], expr: &Expr) -> Result<bool> {
        if let Some(v) = expr.as_constant() {
            return Ok(v == 1);
        }
        self.timed(|b| b.may_be_true(Query::new(constraints, expr)))
    }

    pub fn may_be_false(&mut self, constraints: &[Expr], expr: &Expr) -> Result<bool> {
        if let Some(v) = expr.as_constant() {
            return Ok(v == 0);
        }
        self.timed(|b| b.may_be_false(Query::new(constraints, expr)))
    }

    pub fn get_value(&mut self, constraints: &[Expr], expr: &Expr) -> Result<u128> {
        if let Some(v) = expr.as_constant() {
            return Ok(v);
        }
        self.timed(|b| b.get_value(Query::new(constraints, expr)))
    }

    pub fn get_range(&mut self, constraints: &[Expr], expr: &Expr) -> Result<(u128, u128)> {
        if let Some(v) = expr.as_constant() {
            return Ok((v, v));
        }
        self.timed(|b| b.get_range(Query::new(constraints, expr)))
    }

    pub fn get_initial_values(
        &mut self,
        constraints: &[Expr],
        arrays: &[Array],
    ) -> Result<Vec<Vec<u8>>> {
        self.timed(|b| b.get_initial_values(constraints, arrays))
    }

    pub fn constraint_log(&mut self, constraints: &[Expr]) -> String {
        self.backend.constraint_log(constraints)
    }
}
