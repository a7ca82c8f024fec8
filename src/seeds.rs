use std::sync::Arc;

use bitcode_expr::{Assignment, Expr};

use crate::solver::TimingSolver;
use crate::state::ExecutionState;

/// One recorded input object of a test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestObject {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A previously recorded input used to bias exploration toward its trace.
#[derive(Debug, Clone, Default)]
pub struct TestCase {
    pub objects: Vec<TestObject>,
}

/// Seed state attached to one execution state: the recorded inputs plus the
/// concrete assignment built up as symbolic objects are created.
#[derive(Debug, Clone)]
pub struct SeedInfo {
    pub assignment: Assignment,
    test: Arc<TestCase>,
    position: usize,
}

impl SeedInfo {
    pub fn new(test: Arc<TestCase>) -> Self {
        SeedInfo {
            assignment: Assignment::new(),
            test,
            position: 0,
        }
    }

    /// The next input object for `name`. Positional by default; with named
    /// matching the object is looked up by name instead.
    pub fn next_input(&mut self, name: &str, named_matching: bool) -> Option<&TestObject> {
        if named_matching {
            self.test.objects.iter().find(|obj| obj.name == name)
        } else {
            let index = self.position;
            self.position += 1;
            self.test.objects.get(index)
        }
    }

    /// Evaluate `expr` under this seed's assignment; unassigned bytes
    /// default to zero.
    pub fn evaluate(&self, expr: &Expr) -> Option<u128> {
        self.assignment.evaluate(expr).ok()
    }

    /// Repair the assignment after a constraint contradicted it: ask the
    /// solver for fresh contents of every seeded array under the state's
    /// path condition plus `condition`.
    pub fn patch(
        &mut self,
        state: &ExecutionState,
        condition: &Expr,
        solver: &mut TimingSolver,
    ) -> bool {
        let arrays = state.symbolic_arrays();
        let mut constraints = state.constraints.as_slice().to_vec();
        constraints.push(condition.clone());
        match solver.get_initial_values(&constraints, &arrays) {
            Ok(values) => {
                for (array, bytes) in arrays.into_iter().zip(values) {
                    self.assignment.bind(array, bytes);
                }
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_case() -> Arc<TestCase> {
        Arc::new(TestCase {
            objects: vec![
                TestObject {
                    name: "a".to_string(),
                    bytes: vec![1, 2],
                },
                TestObject {
                    name: "b".to_string(),
                    bytes: vec![3],
                },
            ],
        })
    }

    #[test]
    fn positional_matching_consumes_in_order() {
        let mut seed = SeedInfo::new(test_case());
        assert_eq!(seed.next_input("whatever", false).unwrap().name, "a");
        assert_eq!(seed.next_input("whatever", false).unwrap().name, "b");
        assert!(seed.next_input("whatever", false).is_none());
    }

    #[test]
    fn named_matching_finds_by_name() {
        let mut seed = SeedInfo::new(test_case());
        assert_eq!(seed.next_input("b", true).unwrap().bytes, vec![3]);
        assert_eq!(seed.next_input("a", true).unwrap().bytes, vec![1, 2]);
        assert!(seed.next_input("missing", true).is_none());
    }
}
