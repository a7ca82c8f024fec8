use crate::state::ExecutionState;

/// One emitted record for a terminated state.
#[derive(Debug, Clone)]
pub struct TestCaseRecord {
    /// Error or early-termination message, `None` on a clean exit.
    pub message: Option<String>,
    /// Error-kind suffix ("ptr", "external", "early", ...).
    pub kind: Option<String>,
    /// Counterexample assignment: name and contents per symbolic object.
    pub inputs: Vec<(String, Vec<u8>)>,
    /// Branch directions this path took at fork points.
    pub path: Vec<bool>,
    /// Instruction count when the state terminated.
    pub steps: u64,
}

/// Consumer of terminated states. The engine core does not write artifacts
/// itself; a front end implements this to serialize test cases.
pub trait TestCaseHandler {
    fn process_test_case(&mut self, state: &ExecutionState, record: TestCaseRecord);

    fn paths_explored(&mut self);
}

/// Handler that drops everything, for runs driven purely by side effects.
#[derive(Debug, Default)]
pub struct NullHandler;

impl TestCaseHandler for NullHandler {
    fn process_test_case(&mut self, _state: &ExecutionState, _record: TestCaseRecord) {}

    fn paths_explored(&mut self) {}
}

/// Handler that keeps every record in memory; what the test suite asserts
/// against.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    pub records: Vec<TestCaseRecord>,
    pub paths: u64,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &TestCaseRecord> {
        self.records.iter().filter(|r| r.message.is_some())
    }

    pub fn clean_exits(&self) -> impl Iterator<Item = &TestCaseRecord> {
        self.records.iter().filter(|r| r.message.is_none())
    }
}

impl TestCaseHandler for CollectingHandler {
    fn process_test_case(&mut self, _state: &ExecutionState, record: TestCaseRecord) {
        self.records.push(record);
    }

    fn paths_explored(&mut self) {
        self.paths += 1;
    }
}

// Lets callers keep a handle on the records while the executor owns the
// handler.
impl TestCaseHandler for std::rc::Rc<std::cell::RefCell<CollectingHandler>> {
    fn process_test_case(&mut self, state: &ExecutionState, record: TestCaseRecord) {
        self.borrow_mut().process_test_case(state, record);
    }

    fn paths_explored(&mut self) {
        self.borrow_mut().paths_explored();
    }
}
