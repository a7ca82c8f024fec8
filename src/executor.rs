use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};

use bitcode_expr::{
    Array, Expr, KValue, UpdateList, Width, ERRNO_SEGMENT, FIRST_ORDINARY_SEGMENT,
    FUNCTIONS_SEGMENT, POINTER_WIDTH,
};
use bitcode_ir::{
    BlockId, CallTarget, CastOp, FloatOp, FloatPredicate, FunctionId, Instruction, Module, Operand,
    Predicate,
};
use bitcode_solver::{Error as SolverError, SolverBackend, Validity};

use crate::config::{Config, ExternalCallPolicy};
use crate::externals::{ExternalDispatcher, ExternalMemory};
use crate::handler::{TestCaseHandler, TestCaseRecord};
use crate::memory::{AllocSite, MemoryError, MemoryManager, MemoryObject, ObjectId, ObjectState};
use crate::ptree::{NodeId, PTree};
use crate::searcher::Searcher;
use crate::seeds::{SeedInfo, TestCase};
use crate::solver::TimingSolver;
use crate::state::{ExecutionState, InstRef, NondetValue, StackFrame, StateId};

/// Program-error taxonomy. Each kind has a stable short name used as the
/// emitted record's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    Abort,
    Assert,
    BadVectorAccess,
    Exec,
    External,
    Free,
    Leak,
    Model,
    Overflow,
    Ptr,
    ReadOnly,
    ReportError,
    User,
    Unhandled,
}

impl TerminateReason {
    pub fn name(self) -> &'static str {
        match self {
            TerminateReason::Abort => "abort",
            TerminateReason::Assert => "assert",
            TerminateReason::BadVectorAccess => "bad_vector_access",
            TerminateReason::Exec => "exec",
            TerminateReason::External => "external",
            TerminateReason::Free => "free",
            TerminateReason::Leak => "leak",
            TerminateReason::Model => "model",
            TerminateReason::Overflow => "overflow",
            TerminateReason::Ptr => "ptr",
            TerminateReason::ReadOnly => "readonly",
            TerminateReason::ReportError => "reporterror",
            TerminateReason::User => "user",
            TerminateReason::Unhandled => "unhandled",
        }
    }
}

/// Run counters, readable after [`Executor::run_function_as_main`].
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub instructions: u64,
    pub forks: u64,
    pub states_created: u64,
    pub max_live_states: usize,
    pub completed_paths: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SiteStats {
    forks: u64,
    solver_time: std::time::Duration,
}

/// Result of a two-way fork. The "true" child is always the original state
/// object, so schedulers observe stable identities.
pub enum StatePair {
    Both {
        true_state: Box<ExecutionState>,
        false_state: Box<ExecutionState>,
    },
    OnlyTrue(Box<ExecutionState>),
    OnlyFalse(Box<ExecutionState>),
    /// The forking state was terminated (solver timeout).
    Neither,
}

fn split_pair(pair: StatePair) -> (Option<Box<ExecutionState>>, Option<Box<ExecutionState>>) {
    match pair {
        StatePair::Both {
            true_state,
            false_state,
        } => (Some(true_state), Some(false_state)),
        StatePair::OnlyTrue(s) => (Some(s), None),
        StatePair::OnlyFalse(s) => (None, Some(s)),
        StatePair::Neither => (None, None),
    }
}

#[derive(thiserror::Error, Debug)]
enum ExecError {
    #[error("invalid operand")]
    InvalidOperand,

    #[error("use of uninitialized register {0}")]
    Uninitialized(usize),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("solver failure: {0}")]
    Solver(#[from] SolverError),
}

macro_rules! try_step {
    ($self:ident, $state:ident, $expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                let message = err.to_string();
                return $self.terminate_state_on_exec_error($state, &message);
            }
        }
    };
}

/// The symbolic interpreter: owns the live state set, the process tree, the
/// solver and the fork engine, and drives states one instruction at a time.
pub struct Executor {
    module: Arc<Module>,
    config: Config,
    solver: TimingSolver,
    memory: MemoryManager,
    states: FxHashMap<StateId, Box<ExecutionState>>,
    paused: FxHashSet<StateId>,
    searcher: Box<dyn Searcher>,
    handler: Box<dyn TestCaseHandler>,
    dispatcher: Option<Box<dyn ExternalDispatcher>>,
    ptree: PTree,
    seed_map: FxHashMap<StateId, Vec<SeedInfo>>,
    /// States surviving the current step, queued for re-insertion.
    pending: Vec<Box<ExecutionState>>,
    removed: Vec<StateId>,
    next_state_id: StateId,
    rng: StdRng,
    pub stats: Stats,
    site_stats: FxHashMap<InstRef, SiteStats>,
    covered: FxHashSet<InstRef>,
    emitted_errors: FxHashSet<(InstRef, String)>,
    warned_once: FxHashSet<String>,
    symbolic_addresses: FxHashMap<ObjectId, Expr>,
    halt: Arc<AtomicBool>,
    at_memory_limit: bool,
    errno_object: Option<Arc<MemoryObject>>,
    replay_path: Option<Vec<bool>>,
    replay_position: usize,
    using_seeds: Option<Vec<Arc<TestCase>>>,
    seed_phase_start: Option<Instant>,
}

impl Executor {
    pub fn new(
        module: Arc<Module>,
        config: Config,
        backend: Box<dyn SolverBackend>,
        handler: Box<dyn TestCaseHandler>,
        searcher: Box<dyn Searcher>,
    ) -> Self {
        let solver_timeout = config.solver_timeout;
        let rng = StdRng::seed_from_u64(config.rng_seed);
        Executor {
            module,
            config,
            solver: TimingSolver::new(backend, solver_timeout),
            memory: MemoryManager::new(),
            states: FxHashMap::default(),
            paused: FxHashSet::default(),
            searcher,
            handler,
            dispatcher: None,
            ptree: PTree::new(0),
            seed_map: FxHashMap::default(),
            pending: Vec::new(),
            removed: Vec::new(),
            next_state_id: 1,
            rng,
            stats: Stats::default(),
            site_stats: FxHashMap::default(),
            covered: FxHashSet::default(),
            emitted_errors: FxHashSet::default(),
            warned_once: FxHashSet::default(),
            symbolic_addresses: FxHashMap::default(),
            halt: Arc::new(AtomicBool::new(false)),
            at_memory_limit: false,
            errno_object: None,
            replay_path: None,
            replay_position: 0,
            using_seeds: None,
            seed_phase_start: None,
        }
    }

    pub fn set_dispatcher(&mut self, dispatcher: Box<dyn ExternalDispatcher>) {
        self.dispatcher = Some(dispatcher);
    }

    pub fn set_seeds(&mut self, seeds: Vec<Arc<TestCase>>) {
        self.using_seeds = Some(seeds);
    }

    pub fn set_replay_path(&mut self, path: Vec<bool>) {
        self.replay_path = Some(path);
    }

    /// The process-wide halt flag; timer callbacks and signal handlers set
    /// it to drain the run.
    pub fn halt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }

    pub fn num_live_states(&self) -> usize {
        self.states.len()
    }

    pub fn covered_instructions(&self) -> &FxHashSet<InstRef> {
        &self.covered
    }

    /// A printable form of a live state's path condition.
    pub fn constraint_log(&mut self, id: StateId) -> Option<String> {
        let constraints = self.states.get(&id)?.constraints.as_slice().to_vec();
        Some(self.solver.constraint_log(&constraints))
    }

    fn fresh_state_id(&mut self) -> StateId {
        let id = self.next_state_id;
        self.next_state_id += 1;
        self.stats.states_created += 1;
        id
    }

    fn warn_once(&mut self, key: &str, message: &str) {
        if self.warned_once.insert(key.to_string()) {
            log::warn!("{message}");
        }
    }

    // -- entry point -------------------------------------------------------

    /// Construct the initial state for `function` with the given argv/envp
    /// vector and run the scheduler to completion.
    pub fn run_function_as_main(&mut self, function: FunctionId, argv: &[&str], envp: &[&str]) {
        let module = Arc::clone(&self.module);
        let kf = module.function(function);
        let id = self.fresh_state_id();
        let entry = InstRef { function, index: 0 };
        let mut state = Box::new(ExecutionState::new(
            id,
            entry,
            kf.num_registers(),
            self.config.equality_substitution,
        ));
        self.ptree = PTree::new(id);
        state.ptree_node = NodeId::ROOT;

        let errno = self.memory.allocate_reserved(ERRNO_SEGMENT, 4, "errno");
        let mut errno_state = ObjectState::new(&errno, 4);
        errno_state.initialize_to_zero();
        state.address_space.bind_object(errno.clone(), errno_state);
        self.errno_object = Some(errno);

        let num_params = kf.num_params();
        if num_params >= 1 {
            state.stack[0].locals[0] = Some(KValue::from_constant(argv.len() as u128, 32));
        }
        if num_params >= 2 {
            let argv_pointer = self.setup_argv(&mut state, argv, envp);
            state.stack[0].locals[1] = Some(argv_pointer.clone());
            if num_params >= 3 {
                let envp_pointer = argv_pointer.add(&KValue::from_constant(
                    ((argv.len() + 1) * 8) as u128,
                    POINTER_WIDTH,
                ));
                state.stack[0].locals[2] = Some(envp_pointer);
            }
        }

        if let Some(seeds) = self.using_seeds.take() {
            let infos = seeds.iter().map(|t| SeedInfo::new(t.clone())).collect();
            self.seed_map.insert(id, infos);
            self.seed_phase_start = Some(Instant::now());
        }

        self.states.insert(id, state);
        self.searcher.update(None, &[id], &[]);
        self.run();
    }

    fn setup_argv(
        &mut self,
        state: &mut ExecutionState,
        argv: &[&str],
        envp: &[&str],
    ) -> KValue {
        // One pointer slot per arg and env entry plus their terminators.
        let slots = argv.len() + 1 + envp.len() + 1;
        let table = self.memory.allocate(
            Expr::constant((slots * 8) as u128, POINTER_WIDTH),
            false,
            true,
            "argv_table",
            None,
        );
        let mut table_state = ObjectState::new(&table, slots * 8);
        table_state.initialize_to_zero();

        let write_string = |executor: &mut Executor,
                                state: &mut ExecutionState,
                                text: &str|
         -> KValue {
            let bytes = text.as_bytes();
            let object = executor.memory.allocate(
                Expr::constant((bytes.len() + 1) as u128, POINTER_WIDTH),
                false,
                true,
                "arg_string",
                None,
            );
            let mut contents = ObjectState::new(&object, bytes.len() + 1);
            contents.initialize_to_zero();
            for (i, &b) in bytes.iter().enumerate() {
                contents
                    .write8(i, &Expr::constant(0, POINTER_WIDTH), &Expr::constant(b as u128, 8))
                    .expect("argv string write");
            }
            let pointer = object.pointer();
            state.address_space.bind_object(object, contents);
            pointer
        };

        for (slot, text) in argv.iter().enumerate() {
            let pointer = write_string(self, state, text);
            table_state
                .write(&Expr::constant((slot * 8) as u128, POINTER_WIDTH), &pointer)
                .expect("argv table write");
        }
        for (i, text) in envp.iter().enumerate() {
            let slot = argv.len() + 1 + i;
            let pointer = write_string(self, state, text);
            table_state
                .write(&Expr::constant((slot * 8) as u128, POINTER_WIDTH), &pointer)
                .expect("envp table write");
        }

        let pointer = table.pointer();
        state.address_space.bind_object(table, table_state);
        pointer
    }

    // -- scheduler ---------------------------------------------------------

    fn run(&mut self) {
        let deadline = self.config.max_time.map(|d| Instant::now() + d);
        loop {
            if self.halt.load(Ordering::Relaxed) {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    self.halt.store(true, Ordering::Relaxed);
                    break;
                }
            }
            if let Some(max) = self.config.max_instructions {
                if self.stats.instructions >= max {
                    self.halt.store(true, Ordering::Relaxed);
                    break;
                }
            }
            self.check_seed_time();

            let Some(id) = self.searcher.select_state() else {
                break;
            };
            let Some(state) = self.states.remove(&id) else {
                self.searcher.update(None, &[], &[id]);
                continue;
            };
            self.step(state);
            self.check_memory_usage();
            self.update_states(Some(id));
        }
        self.drain_states();
    }

    fn check_seed_time(&mut self) {
        let Some(seed_time) = self.config.seed_time else {
            return;
        };
        let Some(start) = self.seed_phase_start else {
            return;
        };
        if !self.seed_map.is_empty() && start.elapsed() > seed_time {
            let seeds: usize = self.seed_map.values().map(Vec::len).sum();
            log::warn!("seed time expired, {seeds} seeds remain; continuing without them");
            self.seed_map.clear();
        }
    }

    fn drain_states(&mut self) {
        if self.states.is_empty() {
            return;
        }
        log::info!("halting execution, dumping remaining states");
        let ids: Vec<StateId> = self.states.keys().copied().collect();
        for id in ids {
            if let Some(state) = self.states.remove(&id) {
                self.terminate_state_early(state, "Execution halting.");
            }
        }
        self.update_states(None);
    }

    fn step(&mut self, mut state: Box<ExecutionState>) {
        let iref = state.pc;
        if iref.index >= self.module.function(iref.function).num_instructions() {
            return self.terminate_state_on_exec_error(state, "fell off the end of a function");
        }
        self.stats.instructions += 1;
        state.steps += 1;
        if self.covered.insert(iref) {
            state.covered_new = true;
        }
        state.covered_lines.insert(iref);
        state.prev_pc = iref;
        state.pc = InstRef {
            function: iref.function,
            index: iref.index + 1,
        };
        self.execute_instruction(state, iref);
    }

    fn update_states(&mut self, current: Option<StateId>) {
        let mut added: Vec<StateId> = Vec::new();
        for state in std::mem::take(&mut self.pending) {
            if Some(state.id) != current {
                added.push(state.id);
            }
            self.states.insert(state.id, state);
        }
        let removed = std::mem::take(&mut self.removed);
        self.searcher.update(current, &added, &removed);
        self.stats.max_live_states = self.stats.max_live_states.max(self.states.len());
    }

    fn finish(&mut self, state: Box<ExecutionState>) {
        self.pending.push(state);
    }

    /// Take a live state out of scheduling without terminating it.
    pub fn pause_state(&mut self, id: StateId) {
        if self.states.contains_key(&id) && self.paused.insert(id) {
            self.searcher.update_paused(&[id], &[]);
        }
    }

    pub fn continue_state(&mut self, id: StateId) {
        if self.paused.remove(&id) {
            self.searcher.update_paused(&[], &[id]);
        }
    }

    fn check_memory_usage(&mut self) {
        let Some(cap_mb) = self.config.max_memory_mb else {
            return;
        };
        if self.stats.instructions & 0x3fff != 0 {
            return;
        }
        let used_bytes: u64 = self
            .states
            .values()
            .map(|s| s.address_space.approximate_bytes() + 4096)
            .sum();
        let used_mb = used_bytes >> 20;
        if used_mb <= cap_mb {
            self.at_memory_limit = false;
            return;
        }
        self.at_memory_limit = true;
        if used_mb <= cap_mb + 100 {
            return;
        }
        let num_states = self.states.len();
        let to_kill = (num_states - num_states * cap_mb as usize / used_mb as usize).max(1);
        log::warn!("killing {to_kill} states (over memory cap)");
        let mut ids: Vec<StateId> = self.states.keys().copied().collect();
        for _ in 0..to_kill.min(ids.len()) {
            let mut index = self.rng.gen_range(0..ids.len());
            // Make two pulls to try and not hit a state that covered new
            // code.
            if self
                .states
                .get(&ids[index])
                .map(|s| s.covered_new)
                .unwrap_or(false)
            {
                index = self.rng.gen_range(0..ids.len());
            }
            let id = ids.swap_remove(index);
            if let Some(state) = self.states.remove(&id) {
                self.terminate_state_early(state, "Memory limit exceeded.");
            }
        }
    }

    // -- operand plumbing --------------------------------------------------

    fn eval(&self, state: &ExecutionState, operand: Operand) -> Result<KValue, ExecError> {
        if let Some(register) = operand.as_register() {
            return state
                .frame()
                .locals
                .get(register)
                .cloned()
                .flatten()
                .ok_or(ExecError::Uninitialized(register));
        }
        if let Some(index) = operand.as_constant_index() {
            return Ok(self.module.constant(index).clone());
        }
        Err(ExecError::InvalidOperand)
    }

    fn bind_local(&self, state: &mut ExecutionState, target: InstRef, value: KValue) {
        let register = self
            .module
            .function(target.function)
            .result_register(target.index);
        state.frame_mut().locals[register] = Some(value);
    }

    fn transfer_to_block(&self, state: &mut ExecutionState, from: InstRef, dest: BlockId) {
        let function = self.module.function(from.function);
        state.incoming_block = Some(function.block_containing(from.index));
        state.pc = InstRef {
            function: from.function,
            index: function.block_entry(dest),
        };
    }

    /// Concretize `expr` against the current path, adding the binding
    /// equation as a constraint.
    fn to_constant(
        &mut self,
        state: &mut ExecutionState,
        expr: &Expr,
        reason: &str,
    ) -> Result<Expr, SolverError> {
        let expr = state.constraints.simplify(expr);
        if expr.is_constant() {
            return Ok(expr);
        }
        let value = self.solver.get_value(state.constraints.as_slice(), &expr)?;
        let constant = Expr::constant(value, expr.width());
        self.warn_once(
            &format!("concretize:{reason}"),
            &format!("silently concretizing (reason: {reason}) to {value}"),
        );
        self.add_constraint(state, Expr::eq(constant.clone(), expr));
        Ok(constant)
    }

    /// The unique constant value of `expr` on this path, if there is one.
    fn to_unique(&mut self, state: &ExecutionState, expr: &Expr) -> Expr {
        if expr.is_constant() {
            return expr.clone();
        }
        let constraints = state.constraints.as_slice();
        if let Ok(value) = self.solver.get_value(constraints, expr) {
            let constant = Expr::constant(value, expr.width());
            let unique = Expr::eq(constant.clone(), expr.clone());
            if self.solver.must_be_true(constraints, &unique).unwrap_or(false) {
                return constant;
            }
        }
        expr.clone()
    }

    fn add_constraint(&mut self, state: &mut ExecutionState, condition: Expr) {
        if let Some(value) = condition.as_constant() {
            if value != 1 {
                log::error!("attempt to add invalid constraint");
            }
            return;
        }
        if let Some(mut seeds) = self.seed_map.remove(&state.id) {
            let mut patched = false;
            for seed in seeds.iter_mut() {
                if seed.evaluate(&condition) != Some(1) {
                    seed.patch(state, &condition, &mut self.solver);
                    patched = true;
                }
            }
            if patched {
                log::warn!("seeds patched for violating constraint");
            }
            self.seed_map.insert(state.id, seeds);
        }
        state.constraints.add(condition);
    }

    /// A per-object symbolic address placeholder, shared by every state.
    fn symbolic_address(&mut self, object: &MemoryObject) -> Expr {
        if let Some(existing) = self.symbolic_addresses.get(&object.id()) {
            return existing.clone();
        }
        let array = Array::new_symbolic(format!("addr_of_{}", object.name()), 8);
        let updates = UpdateList::new(array);
        let mut value: Option<Expr> = None;
        for i in 0..8 {
            let byte = Expr::read(updates.clone(), Expr::constant(i, 32));
            value = Some(match value {
                None => byte,
                Some(acc) => Expr::concat(byte, acc),
            });
        }
        let value = value.expect("address placeholder");
        self.symbolic_addresses.insert(object.id(), value.clone());
        value
    }

    // -- fork engine -------------------------------------------------------

    fn max_forks_reached(&self) -> bool {
        self.config
            .max_forks
            .map(|max| self.stats.forks >= max)
            .unwrap_or(false)
    }

    /// Two-way fork on `condition`. Implements the full branch protocol:
    /// solver evaluation, replay steering, resource-cap collapse, seed
    /// partitioning, and the state-tree bookkeeping.
    pub fn fork(
        &mut self,
        mut current: Box<ExecutionState>,
        mut condition: Expr,
        is_internal: bool,
    ) -> StatePair {
        let is_seeding = self.seed_map.contains_key(&current.id);

        // Static per-site caps: concretize instead of forking on call
        // sites that dominate the fork budget.
        if !is_seeding
            && !condition.is_constant()
            && (self.config.max_static_fork_pct < 1.0 || self.config.max_static_solve_pct < 1.0)
        {
            let site = self
                .site_stats
                .get(&current.prev_pc)
                .copied()
                .unwrap_or_default();
            let over_forks = self.stats.forks > 0
                && site.forks as f64 > self.stats.forks as f64 * self.config.max_static_fork_pct;
            let total_solver = self.solver.total_time.as_secs_f64();
            let over_solver = total_solver > 0.0
                && site.solver_time.as_secs_f64()
                    > total_solver * self.config.max_static_solve_pct;
            if over_forks || over_solver {
                match self
                    .solver
                    .get_value(current.constraints.as_slice(), &condition)
                {
                    Ok(value) => {
                        let constant = Expr::constant(value, condition.width());
                        self.add_constraint(
                            &mut current,
                            Expr::eq(constant.clone(), condition.clone()),
                        );
                        condition = constant;
                    }
                    Err(_) => {
                        current.pc = current.prev_pc;
                        self.terminate_state_early(current, "Query timed out (fork).");
                        return StatePair::Neither;
                    }
                }
            }
        }

        if is_seeding {
            let batch = self.seed_map.get(&current.id).map(Vec::len).unwrap_or(1) as u32;
            if let Some(timeout) = self.config.solver_timeout {
                self.solver.set_timeout(Some(timeout * batch.max(1)));
            }
        }
        let query_start = Instant::now();
        let evaluated = self
            .solver
            .evaluate(current.constraints.as_slice(), &condition);
        self.solver.reset_timeout();
        self.site_stats
            .entry(current.prev_pc)
            .or_default()
            .solver_time += query_start.elapsed();
        let mut res = match evaluated {
            Ok(v) => v,
            Err(_) => {
                current.pc = current.prev_pc;
                self.terminate_state_early(current, "Query timed out (fork).");
                return StatePair::Neither;
            }
        };

        if !is_seeding {
            if self.replay_path.is_some() && !is_internal {
                let branch = {
                    let path = self.replay_path.as_ref().unwrap();
                    let b = path.get(self.replay_position).copied();
                    self.replay_position += 1;
                    b
                };
                match branch {
                    Some(true) if res != Validity::False => {
                        self.add_constraint(&mut current, condition.clone());
                        res = Validity::True;
                    }
                    Some(false) if res != Validity::True => {
                        self.add_constraint(&mut current, Expr::logical_not(condition.clone()));
                        res = Validity::False;
                    }
                    _ => {
                        self.terminate_state_on_exec_error(
                            current,
                            "hit invalid branch in replay path mode",
                        );
                        return StatePair::Neither;
                    }
                }
            } else if res == Validity::Unknown {
                let inhibited = (self.config.max_memory_inhibit && self.at_memory_limit)
                    || current.fork_disabled
                    || self.max_forks_reached();
                if inhibited {
                    if self.config.max_memory_inhibit && self.at_memory_limit {
                        self.warn_once("fork:memcap", "skipping fork (memory cap exceeded)");
                    } else if current.fork_disabled {
                        self.warn_once("fork:disabled", "skipping fork (fork disabled on current path)");
                    } else {
                        self.warn_once("fork:max", "skipping fork (max-forks reached)");
                    }
                    if self.rng.gen_bool(0.5) {
                        self.add_constraint(&mut current, condition.clone());
                        res = Validity::True;
                    } else {
                        self.add_constraint(&mut current, Expr::logical_not(condition.clone()));
                        res = Validity::False;
                    }
                }
            }
        }

        // In seed-replay mode a branch with seeds on only one side is not
        // forked; the constraint fixes the branch the seeds take.
        if is_seeding
            && (current.fork_disabled || self.config.only_replay_seeds)
            && res == Validity::Unknown
        {
            let (mut true_seed, mut false_seed) = (false, false);
            if let Some(seeds) = self.seed_map.get(&current.id) {
                for seed in seeds {
                    match seed.evaluate(&condition) {
                        Some(1) => true_seed = true,
                        _ => false_seed = true,
                    }
                    if true_seed && false_seed {
                        break;
                    }
                }
            }
            if !(true_seed && false_seed) {
                res = if true_seed {
                    self.add_constraint(&mut current, condition.clone());
                    Validity::True
                } else {
                    self.add_constraint(&mut current, Expr::logical_not(condition.clone()));
                    Validity::False
                };
            }
        }

        match res {
            Validity::True => {
                if !is_internal {
                    current.branch_history.push(true);
                }
                StatePair::OnlyTrue(current)
            }
            Validity::False => {
                if !is_internal {
                    current.branch_history.push(false);
                }
                StatePair::OnlyFalse(current)
            }
            Validity::Unknown => {
                self.stats.forks += 1;
                self.site_stats.entry(current.prev_pc).or_default().forks += 1;

                let false_id = self.fresh_state_id();
                let mut false_state = Box::new(current.branch(false_id));
                let (left, right) = self.ptree.attach(current.ptree_node, false_id, current.id);
                false_state.ptree_node = left;
                current.ptree_node = right;

                if let Some(seeds) = self.seed_map.remove(&current.id) {
                    let mut true_seeds = Vec::new();
                    let mut false_seeds = Vec::new();
                    for seed in seeds {
                        if seed.evaluate(&condition) == Some(1) {
                            true_seeds.push(seed);
                        } else {
                            false_seeds.push(seed);
                        }
                    }
                    // Novel-coverage credit follows the seeds when the
                    // original side lost all of them.
                    if true_seeds.is_empty() {
                        std::mem::swap(&mut current.covered_new, &mut false_state.covered_new);
                        std::mem::swap(&mut current.covered_lines, &mut false_state.covered_lines);
                    }
                    if !true_seeds.is_empty() {
                        self.seed_map.insert(current.id, true_seeds);
                    }
                    if !false_seeds.is_empty() {
                        self.seed_map.insert(false_id, false_seeds);
                    }
                }

                if !is_internal {
                    current.branch_history.push(true);
                    false_state.branch_history.push(false);
                }

                self.add_constraint(&mut current, condition.clone());
                self.add_constraint(&mut false_state, Expr::logical_not(condition));

                if let Some(max_depth) = self.config.max_depth {
                    if current.depth > max_depth {
                        self.terminate_state_early(current, "max-depth exceeded.");
                        self.terminate_state_early(false_state, "max-depth exceeded.");
                        return StatePair::Neither;
                    }
                }

                StatePair::Both {
                    true_state: current,
                    false_state,
                }
            }
        }
    }

    /// Multi-way branch over mutually exclusive `conditions`. The `i`-th
    /// result is `None` iff that case was infeasible or a cap killed it;
    /// seeds pick the first condition their assignment satisfies.
    pub fn branch(
        &mut self,
        state: Box<ExecutionState>,
        conditions: &[Expr],
    ) -> Vec<Option<Box<ExecutionState>>> {
        let n = conditions.len();
        debug_assert!(n > 0);
        let seeds = self.seed_map.remove(&state.id);
        let mut result: Vec<Option<Box<ExecutionState>>> = Vec::with_capacity(n);

        if self.max_forks_reached() {
            let chosen = self.rng.gen_range(0..n);
            result = (0..n).map(|_| None).collect();
            result[chosen] = Some(state);
        } else {
            self.stats.forks += (n - 1) as u64;
            result.push(Some(state));
            for i in 1..n {
                let source = self.rng.gen_range(0..i);
                let new_id = self.fresh_state_id();
                let (mut child, source_node, source_id) = {
                    let source_state = result[source]
                        .as_mut()
                        .expect("branch source disappeared");
                    let child = Box::new(source_state.branch(new_id));
                    (child, source_state.ptree_node, source_state.id)
                };
                let (left, right) = self.ptree.attach(source_node, new_id, source_id);
                child.ptree_node = left;
                result[source].as_mut().unwrap().ptree_node = right;
                result.push(Some(child));
            }
        }

        if let Some(seeds) = seeds {
            for seed in seeds {
                let mut chosen = None;
                for (i, condition) in conditions.iter().enumerate() {
                    if seed.evaluate(condition) == Some(1) {
                        chosen = Some(i);
                        break;
                    }
                }
                let index = chosen.unwrap_or_else(|| self.rng.gen_range(0..n));
                if let Some(target) = &result[index] {
                    self.seed_map.entry(target.id).or_default().push(seed);
                }
            }
            if self.config.only_replay_seeds {
                for slot in result.iter_mut() {
                    let lost = slot
                        .as_ref()
                        .map(|s| !self.seed_map.contains_key(&s.id))
                        .unwrap_or(false);
                    if lost {
                        let dead = slot.take().unwrap();
                        self.terminate_state(dead);
                    }
                }
            }
        }

        for (i, slot) in result.iter_mut().enumerate() {
            if slot.is_none() {
                continue;
            }
            let mut owned = slot.take().expect("checked above");
            self.add_constraint(&mut owned, conditions[i].clone());
            *slot = Some(owned);
        }
        result
    }

    // -- termination -------------------------------------------------------

    fn terminate_state(&mut self, state: Box<ExecutionState>) {
        self.handler.paths_explored();
        self.stats.completed_paths += 1;
        self.ptree.remove(state.ptree_node);
        self.seed_map.remove(&state.id);
        self.removed.push(state.id);
    }

    fn symbolic_solution(&mut self, state: &ExecutionState) -> Vec<(String, Vec<u8>)> {
        let arrays = state.symbolic_arrays();
        if arrays.is_empty() {
            return Vec::new();
        }
        match self
            .solver
            .get_initial_values(state.constraints.as_slice(), &arrays)
        {
            Ok(values) => arrays
                .iter()
                .zip(values)
                .map(|(a, v)| (a.name().to_string(), v))
                .collect(),
            Err(err) => {
                log::warn!("unable to compute counterexample: {err}");
                Vec::new()
            }
        }
    }

    fn emit_record(
        &mut self,
        state: &ExecutionState,
        message: Option<String>,
        kind: Option<String>,
    ) {
        let inputs = self.symbolic_solution(state);
        let record = TestCaseRecord {
            message,
            kind,
            inputs,
            path: state.branch_history.clone(),
            steps: state.steps,
        };
        self.handler.process_test_case(state, record);
    }

    /// Terminate without a verdict: engine conditions such as timeouts and
    /// resource caps.
    fn terminate_state_early(&mut self, state: Box<ExecutionState>, message: &str) {
        if self.config.exit_on_error_type.is_empty() {
            self.emit_record(&state, Some(message.to_string()), Some("early".to_string()));
        }
        self.terminate_state(state);
    }

    fn terminate_state_on_exit(&mut self, state: Box<ExecutionState>) {
        if self.config.check_mem_cleanup || self.config.check_leaks {
            let leaks: Vec<(ObjectId, String)> = state
                .address_space
                .iter()
                .filter(|(_, b)| {
                    !b.object.is_local && !b.object.is_global && !b.object.is_fixed
                })
                .map(|(id, b)| (*id, b.object.name().to_string()))
                .collect();
            if !leaks.is_empty() {
                if self.config.check_mem_cleanup {
                    let info =
                        format!("leaked: {}", leaks.iter().map(|(_, n)| n.as_str()).join(", "));
                    return self.terminate_state_on_error(
                        state,
                        "memory error: memory not cleaned up",
                        TerminateReason::Leak,
                        Some(info),
                    );
                }
                log::warn!("found unfreed memory, checking whether it can still be freed");
                let reachable = self.reachable_memory_objects(&state);
                if let Some((_, name)) = leaks.iter().find(|(id, _)| !reachable.contains(id)) {
                    let info = format!("leaked: {name}");
                    return self.terminate_state_on_error(
                        state,
                        "memory error: memory leak detected",
                        TerminateReason::Leak,
                        Some(info),
                    );
                }
                // Everything left is still reachable, so the program could
                // have freed it; no error and no test case.
                return self.terminate_state(state);
            }
        }
        self.emit_record(&state, None, None);
        self.terminate_state(state);
    }

    /// The objects reachable at exit: stack, global, and fixed objects
    /// seed the search, which then follows segment tags stored in their
    /// segment planes. Symbolic segment bytes cannot be followed and are
    /// reported once per object.
    fn reachable_memory_objects(&self, state: &ExecutionState) -> FxHashSet<ObjectId> {
        let mut reachable: FxHashSet<ObjectId> = FxHashSet::default();
        let mut queue: Vec<crate::address_space::Binding> = Vec::new();
        for (_, binding) in state.address_space.iter() {
            let object = &binding.object;
            if object.is_local || object.is_global || object.is_fixed {
                if reachable.insert(object.id()) {
                    queue.push(binding.clone());
                }
            }
        }
        while let Some(binding) = queue.pop() {
            if !binding.state.has_segment_plane() {
                continue;
            }
            let capacity = binding.state.capacity();
            let mut warned = false;
            // A pointer may sit at any byte offset, so slide a
            // pointer-sized window over the whole object.
            for offset in 0..capacity {
                let window = (capacity - offset).min(8);
                let Ok(value) = binding.state.read_const(offset as u64, (window * 8) as Width)
                else {
                    continue;
                };
                let Some(segment) = value.constant_segment() else {
                    if !warned {
                        log::warn!(
                            "cannot follow non-constant segment in {} during leak check",
                            binding.object.name()
                        );
                        warned = true;
                    }
                    continue;
                };
                if segment < FIRST_ORDINARY_SEGMENT {
                    continue;
                }
                let Some(target) = state.address_space.find_by_segment(segment) else {
                    continue;
                };
                if reachable.insert(target.object.id()) {
                    queue.push(target.clone());
                }
            }
        }
        reachable
    }

    fn terminate_state_silent(&mut self, state: Box<ExecutionState>) {
        self.terminate_state(state);
    }

    fn terminate_state_on_error(
        &mut self,
        state: Box<ExecutionState>,
        message: &str,
        reason: TerminateReason,
        info: Option<String>,
    ) {
        let key = (state.prev_pc, message.to_string());
        if self.config.emit_all_errors || self.emitted_errors.insert(key) {
            let full = match info {
                Some(info) => format!("{message}\n{info}"),
                None => message.to_string(),
            };
            let location = self
                .module
                .function(state.prev_pc.function)
                .location(state.prev_pc.index)
                .map(|l| format!("{}:{}", l.file, l.line));
            let full = match location {
                Some(loc) => format!("{full}\n\tat {loc}"),
                None => full,
            };
            self.emit_record(&state, Some(full), Some(reason.name().to_string()));
        }
        if self.config.exit_on_error_type.contains(&reason) {
            self.halt.store(true, Ordering::Relaxed);
        }
        self.terminate_state(state);
    }

    fn terminate_state_on_exec_error(&mut self, state: Box<ExecutionState>, message: &str) {
        self.terminate_state_on_error(state, message, TerminateReason::Exec, None);
    }

    fn kvalue_info(&mut self, state: &ExecutionState, pointer: &KValue) -> String {
        let mut info = format!(
            "\taddress: {:?}:{:?}\n",
            pointer.segment(),
            pointer.offset()
        );
        if !pointer.is_constant() {
            let constraints = state.constraints.as_slice();
            if let (Ok(seg), Ok(off)) = (
                self.solver.get_value(constraints, pointer.segment()),
                self.solver.get_value(constraints, pointer.offset()),
            ) {
                info.push_str(&format!("\texample: {seg}:{off}\n"));
            }
            if let Ok((min, max)) = self.solver.get_range(constraints, pointer.offset()) {
                info.push_str(&format!("\toffset range: [{min}, {max}]\n"));
            }
        }
        info
    }
}

// Instruction dispatch and the memory-operation primitive.
impl Executor {
    fn execute_instruction(&mut self, mut state: Box<ExecutionState>, iref: InstRef) {
        let module = Arc::clone(&self.module);
        let function = module.function(iref.function);
        let instruction = function.instruction(iref.index);

        match instruction {
            Instruction::Ret { value } => {
                let result = match value {
                    Some(op) => Some(try_step!(self, state, self.eval(&state, *op))),
                    None => None,
                };
                if state.stack.len() <= 1 {
                    state.pc = state.prev_pc;
                    return self.terminate_state_on_exit(state);
                }
                let frame = state.stack.pop().expect("checked depth");
                for object in &frame.allocas {
                    state.address_space.unbind_object(object);
                }
                if let Some(varargs) = &frame.varargs {
                    state.address_space.unbind_object(varargs);
                }
                let caller = frame.caller.expect("non-entry frame without caller");
                state.pc = InstRef {
                    function: caller.function,
                    index: caller.index + 1,
                };
                let caller_fn = module.function(caller.function);
                let Instruction::Call {
                    result_width,
                    signed_ret,
                    ..
                } = caller_fn.instruction(caller.index)
                else {
                    return self
                        .terminate_state_on_exec_error(state, "return to a non-call instruction");
                };
                if let Some(expected) = result_width {
                    let Some(mut value) = result else {
                        return self.terminate_state_on_exec_error(
                            state,
                            "return void when caller expected a result",
                        );
                    };
                    if value.width() != *expected {
                        value = if *signed_ret {
                            value.sext(*expected)
                        } else {
                            value.zext(*expected)
                        };
                    }
                    self.bind_local(&mut state, caller, value);
                }
                self.finish(state);
            }

            Instruction::Br { dest } => {
                self.transfer_to_block(&mut state, iref, *dest);
                self.finish(state);
            }

            Instruction::CondBr {
                condition,
                then_dest,
                else_dest,
            } => {
                let cond = try_step!(self, state, self.eval(&state, *condition));
                let (then_dest, else_dest) = (*then_dest, *else_dest);
                let pair = self.fork(state, cond.offset().clone(), false);
                let (true_side, false_side) = split_pair(pair);
                if let Some(mut s) = true_side {
                    self.transfer_to_block(&mut s, iref, then_dest);
                    self.finish(s);
                }
                if let Some(mut s) = false_side {
                    self.transfer_to_block(&mut s, iref, else_dest);
                    self.finish(s);
                }
            }

            Instruction::Switch {
                condition,
                default_dest,
                cases,
            } => {
                let cond_value = try_step!(self, state, self.eval(&state, *condition));
                let cond = self.to_unique(&state, cond_value.offset());
                if let Some(value) = cond.as_constant() {
                    let mut dest = *default_dest;
                    for case in cases {
                        let case_value = try_step!(self, state, self.eval(&state, case.value));
                        if case_value.offset().as_constant() == Some(value) {
                            dest = case.dest;
                            break;
                        }
                    }
                    self.transfer_to_block(&mut state, iref, dest);
                    return self.finish(state);
                }

                // Group case values by successor so each target forks once,
                // with the default as the negation of every match.
                let mut sorted_cases: Vec<(u128, BlockId)> = Vec::with_capacity(cases.len());
                for case in cases {
                    let value = try_step!(self, state, self.eval(&state, case.value));
                    let Some(value) = value.offset().as_constant() else {
                        return self
                            .terminate_state_on_exec_error(state, "non-constant switch case");
                    };
                    sorted_cases.push((value, case.dest));
                }
                sorted_cases.sort_by_key(|(value, _)| *value);

                let mut order: Vec<BlockId> = Vec::new();
                let mut targets: FxHashMap<BlockId, Expr> = FxHashMap::default();
                let mut default_value = Expr::bool_true();
                for (value, dest) in sorted_cases {
                    let matches = Expr::eq(cond.clone(), Expr::constant(value, cond.width()));
                    if dest == *default_dest {
                        continue;
                    }
                    default_value =
                        Expr::and_bool(default_value, Expr::logical_not(matches.clone()));
                    let feasible = try_step!(
                        self,
                        state,
                        self.solver
                            .may_be_true(state.constraints.as_slice(), &matches)
                            .map_err(ExecError::from)
                    );
                    if feasible {
                        match targets.get_mut(&dest) {
                            Some(existing) => {
                                *existing = Expr::or_bool(matches, existing.clone());
                            }
                            None => {
                                targets.insert(dest, matches);
                                order.push(dest);
                            }
                        }
                    }
                }
                let default_feasible = try_step!(
                    self,
                    state,
                    self.solver
                        .may_be_true(state.constraints.as_slice(), &default_value)
                        .map_err(ExecError::from)
                );
                if default_feasible {
                    targets.entry(*default_dest).or_insert(default_value.clone());
                    if !order.contains(default_dest) {
                        order.push(*default_dest);
                    }
                }

                let conditions: Vec<Expr> =
                    order.iter().map(|dest| targets[dest].clone()).collect();
                if conditions.is_empty() {
                    return self
                        .terminate_state_on_exec_error(state, "switch with no feasible successor");
                }
                let children = self.branch(state, &conditions);
                for (dest, child) in order.into_iter().zip(children) {
                    if let Some(mut child) = child {
                        self.transfer_to_block(&mut child, iref, dest);
                        self.finish(child);
                    }
                }
            }

            Instruction::IndirectBr {
                address,
                destinations,
            } => {
                let address_value = try_step!(self, state, self.eval(&state, *address));
                let address = self.to_unique(&state, address_value.offset());
                if let Some(value) = address.as_constant() {
                    let dest = BlockId(value as u32);
                    if !destinations.contains(&dest) {
                        return self.terminate_state_on_exec_error(
                            state,
                            "indirectbr: illegal label address",
                        );
                    }
                    self.transfer_to_block(&mut state, iref, dest);
                    return self.finish(state);
                }

                let mut seen: FxHashSet<BlockId> = FxHashSet::default();
                let mut targets: Vec<BlockId> = Vec::new();
                let mut conditions: Vec<Expr> = Vec::new();
                let mut error_case = Expr::bool_true();
                for dest in destinations {
                    if !seen.insert(*dest) {
                        continue;
                    }
                    let matches = Expr::eq(
                        address.clone(),
                        Expr::constant(dest.0 as u128, address.width()),
                    );
                    error_case =
                        Expr::and_bool(error_case, Expr::logical_not(matches.clone()));
                    let feasible = try_step!(
                        self,
                        state,
                        self.solver
                            .may_be_true(state.constraints.as_slice(), &matches)
                            .map_err(ExecError::from)
                    );
                    if feasible {
                        targets.push(*dest);
                        conditions.push(matches);
                    }
                }
                let error_feasible = try_step!(
                    self,
                    state,
                    self.solver
                        .may_be_true(state.constraints.as_slice(), &error_case)
                        .map_err(ExecError::from)
                );
                if error_feasible {
                    conditions.push(error_case);
                }
                if conditions.is_empty() {
                    return self.terminate_state_on_exec_error(
                        state,
                        "indirectbr: no feasible destination",
                    );
                }
                let mut children = self.branch(state, &conditions);
                if error_feasible {
                    if let Some(Some(error_state)) = children.pop() {
                        self.terminate_state_on_exec_error(
                            error_state,
                            "indirectbr: illegal label address",
                        );
                    }
                }
                for (dest, child) in targets.into_iter().zip(children) {
                    if let Some(mut child) = child {
                        self.transfer_to_block(&mut child, iref, dest);
                        self.finish(child);
                    }
                }
            }

            Instruction::Unreachable => {
                self.terminate_state_on_exec_error(state, "reached \"unreachable\" instruction");
            }

            Instruction::Call { target, args, .. } => {
                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(try_step!(self, state, self.eval(&state, *arg)));
                }
                match target {
                    CallTarget::Direct(fid) => {
                        self.execute_call(state, iref, *fid, arguments);
                    }
                    CallTarget::Indirect(op) => {
                        let pointer = try_step!(self, state, self.eval(&state, *op));
                        self.execute_indirect_call(state, iref, pointer, arguments);
                    }
                }
            }

            Instruction::Phi { entries, .. } => {
                let Some(incoming) = state.incoming_block else {
                    return self
                        .terminate_state_on_exec_error(state, "phi without incoming block");
                };
                let Some((_, operand)) = entries.iter().find(|(block, _)| *block == incoming)
                else {
                    return self.terminate_state_on_exec_error(
                        state,
                        "phi has no entry for incoming block",
                    );
                };
                let value = try_step!(self, state, self.eval(&state, *operand));
                self.bind_local(&mut state, iref, value);
                self.finish(state);
            }

            Instruction::Select {
                condition,
                on_true,
                on_false,
            } => {
                let cond = try_step!(self, state, self.eval(&state, *condition));
                let t = try_step!(self, state, self.eval(&state, *on_true));
                let f = try_step!(self, state, self.eval(&state, *on_false));
                let value = KValue::select(cond.offset().clone(), &t, &f);
                self.bind_local(&mut state, iref, value);
                self.finish(state);
            }

            Instruction::BinaryOp { op, lhs, rhs } => {
                let left = try_step!(self, state, self.eval(&state, *lhs));
                let right = try_step!(self, state, self.eval(&state, *rhs));
                self.bind_local(&mut state, iref, left.binary(*op, &right));
                self.finish(state);
            }

            Instruction::ICmp {
                predicate,
                lhs,
                rhs,
            } => {
                let left = try_step!(self, state, self.eval(&state, *lhs));
                let right = try_step!(self, state, self.eval(&state, *rhs));
                let value = self.compare(&mut state, *predicate, left, right);
                self.bind_local(&mut state, iref, value);
                self.finish(state);
            }

            Instruction::Cast { op, value, width } => {
                let v = try_step!(self, state, self.eval(&state, *value));
                let result = match op {
                    CastOp::Trunc => v.extract(0, *width),
                    CastOp::SExt => v.sext(*width),
                    CastOp::ZExt | CastOp::IntToPtr | CastOp::PtrToInt => v.zext(*width),
                    CastOp::BitCast => v,
                };
                self.bind_local(&mut state, iref, result);
                self.finish(state);
            }

            Instruction::Alloca { size } => {
                let size = try_step!(self, state, self.eval(&state, *size));
                let size_expr = Expr::zext(size.offset().clone(), POINTER_WIDTH);
                self.execute_alloc(state, size_expr, true, iref, false);
            }

            Instruction::Load { address, width } => {
                let address = try_step!(self, state, self.eval(&state, *address));
                self.execute_memory_operation(state, false, address, None, Some((iref, *width)));
            }

            Instruction::Store { value, address } => {
                let value = try_step!(self, state, self.eval(&state, *value));
                let address = try_step!(self, state, self.eval(&state, *address));
                self.execute_memory_operation(state, true, address, Some(value), None);
            }

            Instruction::GetElementPtr {
                base,
                indices,
                offset,
            } => {
                let mut pointer = try_step!(self, state, self.eval(&state, *base));
                for index in indices {
                    let value = try_step!(self, state, self.eval(&state, index.operand));
                    let scaled = KValue::from_expr(Expr::mul(
                        Expr::sext(value.offset().clone(), POINTER_WIDTH),
                        Expr::constant(index.stride as u128, POINTER_WIDTH),
                    ));
                    pointer = pointer.add(&scaled);
                }
                if *offset != 0 {
                    pointer =
                        pointer.add(&KValue::from_constant(*offset as u128, POINTER_WIDTH));
                }
                self.bind_local(&mut state, iref, pointer);
                self.finish(state);
            }

            Instruction::ExtractValue {
                aggregate,
                offset,
                width,
            } => {
                let aggregate = try_step!(self, state, self.eval(&state, *aggregate));
                let value = aggregate.extract((*offset * 8) as Width, *width);
                self.bind_local(&mut state, iref, value);
                self.finish(state);
            }

            Instruction::InsertValue {
                aggregate,
                value,
                offset,
            } => {
                let aggregate = try_step!(self, state, self.eval(&state, *aggregate));
                let value = try_step!(self, state, self.eval(&state, *value));
                let result = insert_bits(&aggregate, &value, (*offset * 8) as Width);
                self.bind_local(&mut state, iref, result);
                self.finish(state);
            }

            Instruction::ExtractElement {
                vector,
                index,
                element_width,
            } => {
                let vector = try_step!(self, state, self.eval(&state, *vector));
                let index_value = try_step!(self, state, self.eval(&state, *index));
                let index = self.to_unique(&state, index_value.offset());
                let Some(index) = index.as_constant() else {
                    return self.terminate_state_on_exec_error(
                        state,
                        "extractelement: symbolic index",
                    );
                };
                let count = (vector.width() / element_width) as u128;
                if index >= count {
                    return self.terminate_state_on_error(
                        state,
                        "Out of bounds read when extracting element",
                        TerminateReason::BadVectorAccess,
                        None,
                    );
                }
                let value = vector.extract(index as Width * element_width, *element_width);
                self.bind_local(&mut state, iref, value);
                self.finish(state);
            }

            Instruction::InsertElement {
                vector,
                element,
                index,
                element_width,
            } => {
                let vector = try_step!(self, state, self.eval(&state, *vector));
                let element = try_step!(self, state, self.eval(&state, *element));
                let index_value = try_step!(self, state, self.eval(&state, *index));
                let index = self.to_unique(&state, index_value.offset());
                let Some(index) = index.as_constant() else {
                    return self.terminate_state_on_exec_error(
                        state,
                        "insertelement: symbolic index",
                    );
                };
                let count = (vector.width() / element_width) as u128;
                if index >= count {
                    return self.terminate_state_on_error(
                        state,
                        "Out of bounds write when inserting element",
                        TerminateReason::BadVectorAccess,
                        None,
                    );
                }
                let result = insert_bits(&vector, &element, index as Width * element_width);
                self.bind_local(&mut state, iref, result);
                self.finish(state);
            }

            Instruction::FBinaryOp { op, lhs, rhs, width } => {
                let (op, width) = (*op, *width);
                let left = try_step!(self, state, self.eval(&state, *lhs));
                let right = try_step!(self, state, self.eval(&state, *rhs));
                let left = try_step!(
                    self,
                    state,
                    self.to_constant(&mut state, &left.offset().clone(), "floating point")
                        .map_err(ExecError::from)
                );
                let right = try_step!(
                    self,
                    state,
                    self.to_constant(&mut state, &right.offset().clone(), "floating point")
                        .map_err(ExecError::from)
                );
                let result = match float_binary(
                    op,
                    left.as_constant().unwrap_or(0),
                    right.as_constant().unwrap_or(0),
                    width,
                ) {
                    Some(bits) => bits,
                    None => {
                        return self.terminate_state_on_exec_error(
                            state,
                            "unsupported floating point operation",
                        )
                    }
                };
                self.bind_local(&mut state, iref, KValue::from_constant(result, width));
                self.finish(state);
            }

            Instruction::FCmp {
                predicate,
                lhs,
                rhs,
                width,
            } => {
                let (predicate, width) = (*predicate, *width);
                let left = try_step!(self, state, self.eval(&state, *lhs));
                let right = try_step!(self, state, self.eval(&state, *rhs));
                let left = try_step!(
                    self,
                    state,
                    self.to_constant(&mut state, &left.offset().clone(), "floating point")
                        .map_err(ExecError::from)
                );
                let right = try_step!(
                    self,
                    state,
                    self.to_constant(&mut state, &right.offset().clone(), "floating point")
                        .map_err(ExecError::from)
                );
                let result = match float_compare(
                    predicate,
                    left.as_constant().unwrap_or(0),
                    right.as_constant().unwrap_or(0),
                    width,
                ) {
                    Some(b) => b,
                    None => {
                        return self.terminate_state_on_exec_error(
                            state,
                            "unsupported floating point comparison",
                        )
                    }
                };
                self.bind_local(&mut state, iref, KValue::from_constant(result as u128, 1));
                self.finish(state);
            }
        }
    }

    /// Pointer comparisons between two distinct objects cannot use the
    /// segment plane directly: the objects' relative placement is unknown,
    /// so the comparison is carried out on symbolic address placeholders.
    fn compare(
        &mut self,
        state: &mut ExecutionState,
        predicate: Predicate,
        left: KValue,
        right: KValue,
    ) -> KValue {
        let (mut left, mut right) = (left, right);
        if let (Some(ls), Some(rs)) = (left.constant_segment(), right.constant_segment()) {
            if ls != 0 && rs != 0 && ls != rs {
                let left_object = state
                    .address_space
                    .find_by_segment(ls)
                    .map(|b| b.object.clone());
                let right_object = state
                    .address_space
                    .find_by_segment(rs)
                    .map(|b| b.object.clone());
                if let (Some(lo), Some(ro)) = (left_object, right_object) {
                    log::warn!(
                        "comparing pointers into different objects, using symbolic addresses"
                    );
                    let left_address = self.symbolic_address(&lo);
                    let right_address = self.symbolic_address(&ro);
                    left = KValue::from_expr(Expr::add(
                        left_address,
                        Expr::zext(left.offset().clone(), POINTER_WIDTH),
                    ));
                    right = KValue::from_expr(Expr::add(
                        right_address,
                        Expr::zext(right.offset().clone(), POINTER_WIDTH),
                    ));
                }
            }
        }
        match predicate {
            Predicate::Eq => left.eq(&right),
            Predicate::Ne => left.ne(&right),
            Predicate::Ugt => right.ult(&left),
            Predicate::Uge => right.ule(&left),
            Predicate::Ult => left.ult(&right),
            Predicate::Ule => left.ule(&right),
            Predicate::Sgt => right.slt(&left),
            Predicate::Sge => right.sle(&left),
            Predicate::Slt => left.slt(&right),
            Predicate::Sle => left.sle(&right),
        }
    }

    // -- calls -------------------------------------------------------------

    fn execute_call(
        &mut self,
        mut state: Box<ExecutionState>,
        caller: InstRef,
        fid: FunctionId,
        arguments: Vec<KValue>,
    ) {
        let module = Arc::clone(&self.module);
        let function = module.function(fid);
        if function.is_declaration() {
            return self.execute_declared_call(state, caller, fid, arguments);
        }
        if let Some(max) = self.config.max_stack_frames {
            if state.stack.len() >= max {
                return self.terminate_state_early(state, "max stack size exceeded");
            }
        }
        let num_params = function.num_params();
        if arguments.len() < num_params {
            return self.terminate_state_on_exec_error(
                state,
                "calling function with too few arguments",
            );
        }
        let mut frame = StackFrame::new(fid, Some(caller), function.num_registers());
        for (i, argument) in arguments.iter().take(num_params).enumerate() {
            let expected = function.params()[i];
            let value = if argument.width() == expected {
                argument.clone()
            } else if argument.width() < expected {
                argument.zext(expected)
            } else {
                argument.extract(0, expected)
            };
            frame.locals[i] = Some(value);
        }
        if arguments.len() > num_params {
            // Remaining arguments go into a frame varargs object, packed at
            // eight-byte slots.
            let extra = &arguments[num_params..];
            let size = (extra.len() * 8) as u64;
            let object = self.memory.allocate(
                Expr::constant(size as u128, POINTER_WIDTH),
                true,
                false,
                "varargs",
                Some(AllocSite {
                    function: caller.function,
                    instruction: caller.index,
                }),
            );
            let mut contents = ObjectState::new(&object, size as usize);
            contents.initialize_to_zero();
            for (slot, value) in extra.iter().enumerate() {
                let widened = value.zext(POINTER_WIDTH);
                if contents
                    .write(&Expr::constant((slot * 8) as u128, POINTER_WIDTH), &widened)
                    .is_err()
                {
                    return self
                        .terminate_state_on_exec_error(state, "failed to populate varargs");
                }
            }
            state.address_space.bind_object(object.clone(), contents);
            frame.varargs = Some(object);
        }
        state.stack.push(frame);
        state.pc = InstRef {
            function: fid,
            index: 0,
        };
        state.incoming_block = None;
        self.finish(state);
    }

    fn execute_indirect_call(
        &mut self,
        state: Box<ExecutionState>,
        caller: InstRef,
        pointer: KValue,
        arguments: Vec<KValue>,
    ) {
        let module = Arc::clone(&self.module);
        match pointer.constant_segment() {
            Some(FUNCTIONS_SEGMENT) => {}
            Some(_) => {
                return self.terminate_state_on_exec_error(state, "invalid function pointer");
            }
            None => {
                return self.terminate_state_on_exec_error(
                    state,
                    "call through pointer with symbolic segment",
                );
            }
        }
        if let Some(id) = pointer.offset().as_constant() {
            if (id as usize) < module.num_functions() {
                return self.execute_call(state, caller, FunctionId(id as u32), arguments);
            }
            return self.terminate_state_on_exec_error(state, "invalid function pointer");
        }

        // Symbolic target: enumerate feasible functions by sampling, one
        // fork per candidate, threading the residual through.
        let selector = pointer.offset().clone();
        let mut free = Some(state);
        let mut first = true;
        while let Some(current) = free {
            let value = match self
                .solver
                .get_value(current.constraints.as_slice(), &selector)
            {
                Ok(v) => v,
                Err(_) => {
                    self.terminate_state_early(current, "Query timed out (function pointer).");
                    return;
                }
            };
            let matches = Expr::eq(
                Expr::constant(value, selector.width()),
                selector.clone(),
            );
            let pair = self.fork(current, matches, true);
            let (bound, residual) = split_pair(pair);
            if let Some(bound) = bound {
                if (value as usize) < module.num_functions() {
                    let fid = FunctionId(value as u32);
                    if residual.is_some() || !first {
                        let name = module.function(fid).name().to_string();
                        self.warn_once(
                            &format!("fptr:{value}"),
                            &format!("resolved symbolic function pointer to {name}"),
                        );
                    }
                    self.execute_call(bound, caller, fid, arguments.clone());
                } else {
                    self.terminate_state_on_exec_error(bound, "invalid function pointer");
                }
            }
            first = false;
            free = residual;
        }
    }

    // -- allocation and free -----------------------------------------------

    fn execute_alloc(
        &mut self,
        mut state: Box<ExecutionState>,
        size: Expr,
        is_local: bool,
        target: InstRef,
        zero_memory: bool,
    ) {
        let size = if size.is_constant() {
            size
        } else {
            try_step!(
                self,
                state,
                self.to_constant(&mut state, &size, "symbolic allocation size")
                    .map_err(ExecError::from)
            )
        };
        let capacity = size.as_constant().unwrap_or(0) as usize;
        let name = if is_local { "alloca" } else { "heap" };
        let object = self.memory.allocate(
            size,
            is_local,
            false,
            name,
            Some(AllocSite {
                function: target.function,
                instruction: target.index,
            }),
        );
        let mut contents = ObjectState::new(&object, capacity);
        if zero_memory {
            contents.initialize_to_zero();
        } else {
            contents.initialize_to_random(&mut self.rng);
        }
        let pointer = object.pointer();
        state.address_space.bind_object(object.clone(), contents);
        if is_local {
            state.frame_mut().allocas.push(object);
        }
        self.bind_local(&mut state, target, pointer);
        self.finish(state);
    }

    fn execute_free(
        &mut self,
        state: Box<ExecutionState>,
        address: KValue,
        target: Option<InstRef>,
    ) {
        let pair = self.fork(state, address.create_is_zero(), true);
        let (zero_side, nonzero_side) = split_pair(pair);
        if let Some(mut s) = zero_side {
            if let Some(target) = target {
                self.bind_local(&mut s, target, KValue::null_pointer());
            }
            self.finish(s);
        }
        let Some(s) = nonzero_side else {
            return;
        };
        for (binding, mut bound) in self.resolve_exact(s, &address, "free") {
            if binding.object.is_local {
                let info = self.kvalue_info(&bound, &address);
                self.terminate_state_on_error(
                    bound,
                    "free of alloca",
                    TerminateReason::Free,
                    Some(info),
                );
            } else if binding.object.is_global {
                let info = self.kvalue_info(&bound, &address);
                self.terminate_state_on_error(
                    bound,
                    "free of global",
                    TerminateReason::Free,
                    Some(info),
                );
            } else {
                bound.address_space.unbind_object(&binding.object);
                if let Some(target) = target {
                    self.bind_local(&mut bound, target, KValue::null_pointer());
                }
                self.finish(bound);
            }
        }
    }

    /// Fork one state per object the pointer may exactly equal; the
    /// residual (pointing at none of them) terminates with a pointer error.
    fn resolve_exact(
        &mut self,
        state: Box<ExecutionState>,
        address: &KValue,
        name: &str,
    ) -> Vec<(crate::address_space::Binding, Box<ExecutionState>)> {
        let (resolutions, _incomplete) = state.address_space.resolve(
            state.constraints.as_slice(),
            &mut self.solver,
            address,
            0,
            self.config.solver_timeout.map(|t| Instant::now() + t),
        );
        let mut results = Vec::new();
        let mut unbound = Some(state);
        for binding in resolutions {
            let Some(current) = unbound else {
                break;
            };
            let matches = address.eq(&binding.object.pointer()).offset().clone();
            let pair = self.fork(current, matches, true);
            let (bound, residual) = split_pair(pair);
            if let Some(bound) = bound {
                results.push((binding, bound));
            }
            unbound = residual;
        }
        if let Some(unbound) = unbound {
            let info = self.kvalue_info(&unbound, address);
            self.terminate_state_on_error(
                unbound,
                &format!("memory error: invalid pointer: {name}"),
                TerminateReason::Ptr,
                Some(info),
            );
        }
        results
    }

    // -- the memory operation primitive ------------------------------------

    fn execute_memory_operation(
        &mut self,
        mut state: Box<ExecutionState>,
        is_write: bool,
        mut address: KValue,
        value: Option<KValue>,
        target: Option<(InstRef, Width)>,
    ) {
        let width = match (&value, target) {
            (Some(v), _) => v.width(),
            (None, Some((_, w))) => w,
            (None, None) => unreachable!("memory op without value or target"),
        };
        let bytes = width.div_ceil(8) as u64;

        if self.config.simplify_sym_indices {
            address = KValue::new(
                state.constraints.simplify(address.segment()),
                state.constraints.simplify(address.offset()),
            );
        }

        // Fast path: a single resolution whose segment and bounds are
        // provably right.
        let resolution = state.address_space.resolve_one(
            state.constraints.as_slice(),
            &mut self.solver,
            &address,
        );
        let resolution = match resolution {
            Ok(r) => r,
            Err(_) => {
                // Solver failure: concretize the pointer and retry without
                // the solver.
                let segment = match self.to_constant(&mut state, &address.segment().clone(), "resolve failure") {
                    Ok(s) => s,
                    Err(_) => {
                        state.pc = state.prev_pc;
                        return self.terminate_state_early(state, "Query timed out (resolve).");
                    }
                };
                let offset = match self.to_constant(&mut state, &address.offset().clone(), "resolve failure") {
                    Ok(o) => o,
                    Err(_) => {
                        state.pc = state.prev_pc;
                        return self.terminate_state_early(state, "Query timed out (resolve).");
                    }
                };
                address = KValue::new(segment, offset);
                state.address_space.resolve_constant_address(&address)
            }
        };

        if let Some((binding, recovered_offset)) = resolution {
            let object = binding.object.clone();

            if let Some(max) = self.config.max_sym_array_size {
                let large = object.concrete_size().map(|s| s >= max).unwrap_or(true);
                if large && !address.offset().is_constant() {
                    let offset = try_step!(
                        self,
                        state,
                        self.to_constant(&mut state, &address.offset().clone(), "max-sym-array-size")
                            .map_err(ExecError::from)
                    );
                    address = KValue::new(address.segment().clone(), offset);
                }
            }

            let (segment_expr, offset_expr) = match recovered_offset {
                Some(offset) => (
                    object.segment_expr(),
                    Expr::constant(offset as u128, POINTER_WIDTH),
                ),
                None => (address.segment().clone(), address.offset().clone()),
            };
            let segment_matches = Expr::eq(object.segment_expr(), segment_expr);
            let in_bounds = object.bounds_check_offset(&offset_expr, bytes);

            let constraints = state.constraints.as_slice();
            let checks = self
                .solver
                .must_be_true(constraints, &segment_matches)
                .and_then(|seg_ok| {
                    self.solver
                        .must_be_true(constraints, &in_bounds)
                        .map(|off_ok| (seg_ok, off_ok))
                });
            let (segment_ok, bounds_ok) = match checks {
                Ok(pair) => pair,
                Err(_) => {
                    state.pc = state.prev_pc;
                    return self.terminate_state_early(state, "Query timed out (bounds check).");
                }
            };

            if segment_ok && bounds_ok {
                if is_write {
                    if binding.state.is_read_only() {
                        return self.terminate_state_on_error(
                            state,
                            "memory error: object read only",
                            TerminateReason::ReadOnly,
                            None,
                        );
                    }
                    let value = value.expect("write without value");
                    let os = state
                        .address_space
                        .get_writeable(object.id())
                        .expect("resolved object vanished");
                    try_step!(self, state, os.write(&offset_expr, &value).map_err(ExecError::from));
                } else {
                    let result = if let Some(base) = offset_expr.as_constant() {
                        binding.state.read_const(base as u64, width)
                    } else {
                        let os = state
                            .address_space
                            .get_writeable(object.id())
                            .expect("resolved object vanished");
                        os.read(&offset_expr, width)
                    };
                    let result = try_step!(self, state, result.map_err(ExecError::from));
                    let (target_ref, _) = target.expect("read without target");
                    self.bind_local(&mut state, target_ref, result);
                }
                return self.finish(state);
            }
        }

        // Error path: no resolution, multiple resolutions, or one that may
        // be out of bounds. Enumerate aliases and fork per object.
        let deadline = self.config.solver_timeout.map(|t| Instant::now() + t);
        let (resolutions, incomplete) = state.address_space.resolve(
            state.constraints.as_slice(),
            &mut self.solver,
            &address,
            0,
            deadline,
        );

        let mut unbound = Some(state);
        for binding in resolutions {
            let Some(current) = unbound else {
                break;
            };
            let in_bounds = binding.object.bounds_check_pointer(&address, bytes);
            let pair = self.fork(current, in_bounds, true);
            let (bound, residual) = split_pair(pair);
            if let Some(mut bound) = bound {
                if is_write {
                    if binding.state.is_read_only() {
                        self.terminate_state_on_error(
                            bound,
                            "memory error: object read only",
                            TerminateReason::ReadOnly,
                            None,
                        );
                    } else {
                        let value = value.clone().expect("write without value");
                        let os = bound
                            .address_space
                            .get_writeable(binding.object.id())
                            .expect("resolved object vanished");
                        match os.write(address.offset(), &value) {
                            Ok(()) => self.finish(bound),
                            Err(err) => {
                                let message = err.to_string();
                                self.terminate_state_on_exec_error(bound, &message);
                            }
                        }
                    }
                } else {
                    let os = bound
                        .address_space
                        .get_writeable(binding.object.id())
                        .expect("resolved object vanished");
                    match os.read(address.offset(), width) {
                        Ok(result) => {
                            let (target_ref, _) = target.expect("read without target");
                            self.bind_local(&mut bound, target_ref, result);
                            self.finish(bound);
                        }
                        Err(err) => {
                            let message = err.to_string();
                            self.terminate_state_on_exec_error(bound, &message);
                        }
                    }
                }
            }
            unbound = residual;
        }

        if let Some(unbound) = unbound {
            if incomplete {
                self.terminate_state_early(unbound, "Query timed out (resolve).");
            } else {
                let info = self.kvalue_info(&unbound, &address);
                self.terminate_state_on_error(
                    unbound,
                    "memory error: out of bound pointer",
                    TerminateReason::Ptr,
                    Some(info),
                );
            }
        }
    }
}

// Calls into body-less functions: the engine's own API by name, everything
// else through the external dispatcher.
impl Executor {
    fn execute_declared_call(
        &mut self,
        mut state: Box<ExecutionState>,
        caller: InstRef,
        fid: FunctionId,
        arguments: Vec<KValue>,
    ) {
        let module = Arc::clone(&self.module);
        let name = module.function(fid).name().to_string();
        let required_args = match name.as_str() {
            "sb_define_fixed_object" | "calloc" => 2,
            "sb_make_symbolic" | "sb_make_concrete" | "sb_mark_read_only" | "sb_assume"
            | "sb_get_value" | "sb_set_forking" | "malloc" | "free" => 1,
            _ => 0,
        };
        if arguments.len() < required_args {
            return self.terminate_state_on_error(
                state,
                &format!("invalid number of arguments to {name}"),
                TerminateReason::User,
                None,
            );
        }
        match name.as_str() {
            "sb_define_fixed_object" => {
                let address = try_step!(
                    self,
                    state,
                    self.to_constant(&mut state, &arguments[0].offset().clone(), "fixed address")
                        .map_err(ExecError::from)
                );
                let size = try_step!(
                    self,
                    state,
                    self.to_constant(&mut state, &arguments[1].offset().clone(), "fixed size")
                        .map_err(ExecError::from)
                );
                let address = address.as_constant().unwrap_or(0) as u64;
                let size = size.as_constant().unwrap_or(0) as u64;
                let object = match self.memory.allocate_fixed(
                    address,
                    size,
                    format!("fixed_{address:#x}"),
                    Some(AllocSite {
                        function: caller.function,
                        instruction: caller.index,
                    }),
                ) {
                    Ok(object) => object,
                    Err(err) => {
                        let message = err.to_string();
                        return self.terminate_state_on_error(
                            state,
                            &message,
                            TerminateReason::User,
                            None,
                        );
                    }
                };
                let mut contents = ObjectState::new(&object, size as usize);
                contents.initialize_to_zero();
                state
                    .address_space
                    .register_concrete_address(address, object.segment());
                state.address_space.bind_object(object, contents);
                self.finish(state);
            }

            "sb_make_symbolic" => {
                let pointer = arguments[0].clone();
                let resolved = state.address_space.resolve_one(
                    state.constraints.as_slice(),
                    &mut self.solver,
                    &pointer,
                );
                match resolved {
                    Ok(Some((binding, _))) => {
                        let object = binding.object.clone();
                        self.execute_make_symbolic(state, object);
                    }
                    Ok(None) | Err(_) => {
                        self.terminate_state_on_error(
                            state,
                            "make_symbolic of an unresolved pointer",
                            TerminateReason::User,
                            None,
                        );
                    }
                }
            }

            "sb_make_concrete" => {
                let pointer = arguments[0].clone();
                let resolved = state.address_space.resolve_one(
                    state.constraints.as_slice(),
                    &mut self.solver,
                    &pointer,
                );
                match resolved {
                    Ok(Some((binding, _))) => {
                        let constraints: Vec<Expr> = state.constraints.as_slice().to_vec();
                        let solver = &mut self.solver;
                        if !binding.state.is_read_only() {
                            let os = state
                                .address_space
                                .get_writeable(binding.object.id())
                                .expect("resolved object vanished");
                            let _ = os.flush_to_concrete_store(|expr| {
                                solver.get_value(&constraints, expr).ok()
                            });
                        }
                        self.finish(state);
                    }
                    Ok(None) | Err(_) => {
                        self.terminate_state_on_error(
                            state,
                            "make_concrete of an unresolved pointer",
                            TerminateReason::User,
                            None,
                        );
                    }
                }
            }

            "sb_mark_read_only" => {
                let pointer = arguments[0].clone();
                let resolved = state.address_space.resolve_one(
                    state.constraints.as_slice(),
                    &mut self.solver,
                    &pointer,
                );
                match resolved {
                    Ok(Some((binding, _))) => {
                        let os = state
                            .address_space
                            .get_writeable(binding.object.id())
                            .expect("resolved object vanished");
                        os.set_read_only();
                        self.finish(state);
                    }
                    Ok(None) | Err(_) => {
                        self.terminate_state_on_error(
                            state,
                            "mark_read_only of an unresolved pointer",
                            TerminateReason::User,
                            None,
                        );
                    }
                }
            }

            "sb_assume" => {
                let mut condition = arguments[0].offset().clone();
                if condition.width() != 1 {
                    condition = Expr::logical_not(Expr::is_zero_expr(condition));
                }
                let provably_false = try_step!(
                    self,
                    state,
                    self.solver
                        .must_be_false(state.constraints.as_slice(), &condition)
                        .map_err(ExecError::from)
                );
                if provably_false {
                    return self.terminate_state_on_error(
                        state,
                        "invalid assume call (provably false)",
                        TerminateReason::User,
                        None,
                    );
                }
                self.add_constraint(&mut state, condition);
                self.finish(state);
            }

            "sb_get_value" => {
                let kv = &arguments[0];
                let constraints = state.constraints.as_slice();
                let values = self
                    .solver
                    .get_value(constraints, kv.segment())
                    .and_then(|seg| self.solver.get_value(constraints, kv.offset()).map(|off| (seg, off)));
                let (segment, offset) = try_step!(self, state, values.map_err(ExecError::from));
                let value = KValue::new(
                    Expr::constant(segment, POINTER_WIDTH),
                    Expr::constant(offset, kv.width()),
                );
                self.bind_local(&mut state, caller, value);
                self.finish(state);
            }

            "sb_set_forking" => {
                state.fork_disabled = arguments[0].offset().is_zero();
                self.finish(state);
            }

            "sb_silent_exit" => {
                self.terminate_state_silent(state);
            }

            "sb_report_error" => {
                self.terminate_state_on_error(
                    state,
                    "error reported by program",
                    TerminateReason::ReportError,
                    None,
                );
            }

            "sb_warning" => {
                log::warn!("program warning at {:?}", state.prev_pc);
                self.finish(state);
            }

            "sb_prefer_cex" => {
                self.finish(state);
            }

            "sb_nondet_i32" | "sb_nondet_u32" => {
                let signed = name.ends_with("i32");
                self.execute_nondet(state, caller, 32, signed, &name);
            }

            "sb_nondet_i64" | "sb_nondet_u64" => {
                let signed = name.ends_with("i64");
                self.execute_nondet(state, caller, 64, signed, &name);
            }

            "sb_errno_location" | "__errno_location" => {
                let pointer = KValue::pointer(ERRNO_SEGMENT, 0);
                self.bind_local(&mut state, caller, pointer);
                self.finish(state);
            }

            "malloc" => {
                let size = Expr::zext(arguments[0].offset().clone(), POINTER_WIDTH);
                self.execute_alloc(state, size, false, caller, false);
            }

            "calloc" => {
                let count = Expr::zext(arguments[0].offset().clone(), POINTER_WIDTH);
                let unit = Expr::zext(arguments[1].offset().clone(), POINTER_WIDTH);
                self.execute_alloc(state, Expr::mul(count, unit), false, caller, true);
            }

            "free" => {
                let address = arguments[0].clone();
                self.execute_free(state, address, Some(caller));
            }

            "abort" => {
                self.terminate_state_on_error(
                    state,
                    "abort failure",
                    TerminateReason::Abort,
                    None,
                );
            }

            "exit" | "_exit" => {
                self.terminate_state_on_exit(state);
            }

            "__assert_fail" | "assert_fail" => {
                self.terminate_state_on_error(
                    state,
                    "ASSERTION FAIL",
                    TerminateReason::Assert,
                    None,
                );
            }

            _ if name.starts_with("__ubsan_handle_") => {
                self.terminate_state_on_error(
                    state,
                    "overflow on arithmetic operation",
                    TerminateReason::Overflow,
                    None,
                );
            }

            _ => {
                self.execute_external_call(state, caller, &name, arguments);
            }
        }
    }

    fn execute_nondet(
        &mut self,
        mut state: Box<ExecutionState>,
        caller: InstRef,
        width: Width,
        is_signed: bool,
        name: &str,
    ) {
        let unique = state.unique_array_name(name);
        let array = Array::new_symbolic(unique, (width / 8) as u64);
        let updates = UpdateList::new(array);
        let mut value: Option<Expr> = None;
        for i in 0..width / 8 {
            let byte = Expr::read(updates.clone(), Expr::constant(i as u128, 32));
            value = Some(match value {
                None => byte,
                Some(acc) => Expr::concat(byte, acc),
            });
        }
        let value = KValue::from_expr(value.expect("zero-width nondet"));
        state.nondet_values.push(NondetValue {
            value: value.clone(),
            name: name.to_string(),
            is_signed,
            origin: caller,
        });
        self.bind_local(&mut state, caller, value);
        self.finish(state);
    }

    fn execute_make_symbolic(&mut self, mut state: Box<ExecutionState>, object: Arc<MemoryObject>) {
        let name = object.name().to_string();
        let size = object.concrete_size().unwrap_or(0) as usize;

        // Route recorded inputs into the new symbolic object first, so a
        // policy violation terminates before anything is bound.
        let mut seed_bindings: Vec<Vec<u8>> = Vec::new();
        if let Some(mut seeds) = self.seed_map.remove(&state.id) {
            for seed in seeds.iter_mut() {
                let input = seed
                    .next_input(&name, self.config.named_seed_matching)
                    .cloned();
                let bytes = match input {
                    None => {
                        if self.config.zero_seed_extension {
                            vec![0; size]
                        } else if !self.config.allow_seed_extension {
                            self.seed_map.insert(state.id, seeds);
                            return self.terminate_state_on_error(
                                state,
                                "ran out of inputs during seeding",
                                TerminateReason::User,
                                None,
                            );
                        } else {
                            vec![0; size]
                        }
                    }
                    Some(object_input) => {
                        let recorded = object_input.bytes.len();
                        let extension_ok = self.config.allow_seed_extension
                            || self.config.zero_seed_extension;
                        if recorded != size
                            && ((recorded < size && !extension_ok)
                                || (recorded > size && !self.config.allow_seed_truncation))
                        {
                            let message = format!(
                                "replace size mismatch: {name}[{size}] vs {}[{recorded}] in test",
                                object_input.name
                            );
                            self.seed_map.insert(state.id, seeds);
                            return self.terminate_state_on_error(
                                state,
                                &message,
                                TerminateReason::User,
                                None,
                            );
                        }
                        let mut bytes = object_input.bytes.clone();
                        bytes.resize(size, 0);
                        bytes
                    }
                };
                seed_bindings.push(bytes);
            }
            self.seed_map.insert(state.id, seeds);
        }

        let unique = state.unique_array_name(&name);
        let array = Array::new_symbolic(unique, size as u64);
        state.address_space.unbind_object(&object);
        let contents = ObjectState::new_symbolic(&object, size, array.clone());
        state.address_space.bind_object(object.clone(), contents);
        state.add_symbolic(object, array.clone());

        if let Some(seeds) = self.seed_map.get_mut(&state.id) {
            for (seed, bytes) in seeds.iter_mut().zip(seed_bindings) {
                seed.assignment.bind(array.clone(), bytes);
            }
        }
        self.finish(state);
    }

    fn execute_external_call(
        &mut self,
        mut state: Box<ExecutionState>,
        caller: InstRef,
        name: &str,
        arguments: Vec<KValue>,
    ) {
        match self.config.external_calls {
            ExternalCallPolicy::None => {
                return self.terminate_state_on_error(
                    state,
                    &format!("failed external call: {name} (external calls disallowed)"),
                    TerminateReason::External,
                    None,
                );
            }
            ExternalCallPolicy::Concrete => {
                if arguments.iter().any(|a| !a.is_constant()) {
                    return self.terminate_state_on_error(
                        state,
                        &format!("external call with symbolic argument: {name}"),
                        TerminateReason::External,
                        None,
                    );
                }
            }
            ExternalCallPolicy::Pure => {
                let pure = self
                    .dispatcher
                    .as_ref()
                    .map(|d| d.is_pure(name))
                    .unwrap_or(false);
                if !pure {
                    return self.terminate_state_on_error(
                        state,
                        &format!("failed external call: {name} (not known to be pure)"),
                        TerminateReason::External,
                        None,
                    );
                }
            }
            ExternalCallPolicy::All => {}
        }
        if self.dispatcher.as_ref().map(|d| !d.resolves(name)).unwrap_or(true) {
            return self.terminate_state_on_error(
                state,
                &format!("failed external call: {name}"),
                TerminateReason::External,
                None,
            );
        }

        // Marshal arguments: pointers become flat addresses of per-segment
        // buffers filled from the concrete caches.
        let mut external = ExternalMemory::new();
        let mut flat_args = Vec::with_capacity(arguments.len());
        for argument in &arguments {
            let segment = match argument.constant_segment() {
                Some(s) => s,
                None => {
                    let concretized = try_step!(
                        self,
                        state,
                        self.to_constant(&mut state, &argument.segment().clone(), "external call")
                            .map_err(ExecError::from)
                    );
                    concretized.as_constant().unwrap_or(0) as u64
                }
            };
            let offset_expr = argument.offset().clone();
            let offset = match offset_expr.as_constant() {
                Some(v) => v as u64,
                None => {
                    let concretized = try_step!(
                        self,
                        state,
                        self.to_constant(&mut state, &offset_expr, "external call")
                            .map_err(ExecError::from)
                    );
                    concretized.as_constant().unwrap_or(0) as u64
                }
            };
            if segment == 0 {
                flat_args.push(offset);
                continue;
            }
            let Some(binding) = state.address_space.find_by_segment(segment).cloned() else {
                return self.terminate_state_on_error(
                    state,
                    &format!("external call with dangling pointer: {name}"),
                    TerminateReason::External,
                    None,
                );
            };
            let capacity = binding.state.capacity();
            if !binding.state.is_read_only() && !binding.state.is_fully_concrete() {
                let constraints: Vec<Expr> = state.constraints.as_slice().to_vec();
                let solver = &mut self.solver;
                let os = state
                    .address_space
                    .get_writeable(binding.object.id())
                    .expect("resolved object vanished");
                let _ = os
                    .flush_to_concrete_store(|expr| solver.get_value(&constraints, expr).ok());
            }
            external.add_object(segment, capacity);
            flat_args.push(external.host_address(segment, offset));
        }
        if let Some(errno) = &self.errno_object {
            if state.address_space.find_by_segment(errno.segment()).is_some() {
                external.add_object(errno.segment(), 4);
            }
        }

        state.address_space.copy_out_concretes(&mut external);

        let dispatcher = self.dispatcher.as_mut().expect("checked above");
        let result = dispatcher.call(name, &flat_args, &mut external);
        let errno_value = dispatcher.errno();
        let return_value = match result {
            Ok(v) => v,
            Err(err) => {
                let message = err.to_string();
                return self.terminate_state_on_error(
                    state,
                    &message,
                    TerminateReason::External,
                    None,
                );
            }
        };

        if !state.address_space.copy_in_concretes(&external) {
            return self.terminate_state_on_error(
                state,
                "external modified read-only object",
                TerminateReason::External,
                None,
            );
        }

        if errno_value != 0 {
            if let Some(errno) = self.errno_object.clone() {
                if let Some(os) = state.address_space.get_writeable(errno.id()) {
                    let _ = os.write(
                        &Expr::constant(0, POINTER_WIDTH),
                        &KValue::from_constant(errno_value as u32 as u128, 32),
                    );
                }
            }
        }

        let module = Arc::clone(&self.module);
        let caller_fn = module.function(caller.function);
        if let Instruction::Call {
            result_width: Some(width),
            ..
        } = caller_fn.instruction(caller.index)
        {
            let value = KValue::from_constant(return_value as u128, *width);
            self.bind_local(&mut state, caller, value);
        }
        self.finish(state);
    }
}

fn insert_bits(aggregate: &KValue, value: &KValue, bit_offset: Width) -> KValue {
    let total = aggregate.width();
    let width = value.width();
    debug_assert!(bit_offset + width <= total);
    let mut result = value.offset().clone();
    if bit_offset > 0 {
        let low = Expr::extract(aggregate.offset().clone(), 0, bit_offset);
        result = Expr::concat(result, low);
    }
    if bit_offset + width < total {
        let high = Expr::extract(
            aggregate.offset().clone(),
            bit_offset + width,
            total - bit_offset - width,
        );
        result = Expr::concat(high, result);
    }
    KValue::new(aggregate.segment().clone(), result)
}

fn float_binary(op: FloatOp, lhs: u128, rhs: u128, width: Width) -> Option<u128> {
    match width {
        32 => {
            let (l, r) = (f32::from_bits(lhs as u32), f32::from_bits(rhs as u32));
            let result = match op {
                FloatOp::FAdd => l + r,
                FloatOp::FSub => l - r,
                FloatOp::FMul => l * r,
                FloatOp::FDiv => l / r,
                FloatOp::FRem => l % r,
            };
            Some(result.to_bits() as u128)
        }
        64 => {
            let (l, r) = (f64::from_bits(lhs as u64), f64::from_bits(rhs as u64));
            let result = match op {
                FloatOp::FAdd => l + r,
                FloatOp::FSub => l - r,
                FloatOp::FMul => l * r,
                FloatOp::FDiv => l / r,
                FloatOp::FRem => l % r,
            };
            Some(result.to_bits() as u128)
        }
        _ => None,
    }
}

fn float_compare(predicate: FloatPredicate, lhs: u128, rhs: u128, width: Width) -> Option<bool> {
    let (l, r) = match width {
        32 => (
            f32::from_bits(lhs as u32) as f64,
            f32::from_bits(rhs as u32) as f64,
        ),
        64 => (f64::from_bits(lhs as u64), f64::from_bits(rhs as u64)),
        _ => return None,
    };
    Some(match predicate {
        FloatPredicate::Oeq => l == r,
        FloatPredicate::One => l != r && !l.is_nan() && !r.is_nan(),
        FloatPredicate::Olt => l < r,
        FloatPredicate::Ole => l <= r,
        FloatPredicate::Ogt => l > r,
        FloatPredicate::Oge => l >= r,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::handler::CollectingHandler;
    use crate::searcher::DfsSearcher;
    use bitcode_ir::{FunctionBuilder, GepIndex, ModuleBuilder};
    use bitcode_solver::RangeSolver;

    fn run_main(mb: ModuleBuilder, config: Config) -> (Executor, Rc<RefCell<CollectingHandler>>) {
        let module = Arc::new(mb.build());
        let main = module.function_by_name("main").expect("module has a main");
        let handler = Rc::new(RefCell::new(CollectingHandler::new()));
        let mut executor = Executor::new(
            module,
            config,
            Box::new(RangeSolver::new()),
            Box::new(handler.clone()),
            Box::new(DfsSearcher::new()),
        );
        executor.run_function_as_main(main, &["a.out"], &[]);
        (executor, handler)
    }

    #[test]
    fn float_binary_uses_ieee_semantics() {
        let a = (1.5f32).to_bits() as u128;
        let b = (2.25f32).to_bits() as u128;
        assert_eq!(
            float_binary(FloatOp::FAdd, a, b, 32),
            Some((3.75f32).to_bits() as u128)
        );

        let one = (1.0f64).to_bits() as u128;
        let four = (4.0f64).to_bits() as u128;
        assert_eq!(
            float_binary(FloatOp::FDiv, one, four, 64),
            Some((0.25f64).to_bits() as u128)
        );

        let seven_half = (7.5f64).to_bits() as u128;
        let two = (2.0f64).to_bits() as u128;
        assert_eq!(
            float_binary(FloatOp::FRem, seven_half, two, 64),
            Some((1.5f64).to_bits() as u128)
        );

        // Division by zero follows IEEE 754, it does not trap.
        let zero = (0.0f32).to_bits() as u128;
        let one_f32 = (1.0f32).to_bits() as u128;
        assert_eq!(
            float_binary(FloatOp::FDiv, one_f32, zero, 32),
            Some(f32::INFINITY.to_bits() as u128)
        );

        assert_eq!(float_binary(FloatOp::FAdd, 0, 0, 16), None);
    }

    #[test]
    fn float_compare_ordered_predicates_reject_nan() {
        let nan = f64::NAN.to_bits() as u128;
        let one = (1.0f64).to_bits() as u128;
        let two = (2.0f64).to_bits() as u128;
        assert_eq!(float_compare(FloatPredicate::Oeq, nan, nan, 64), Some(false));
        assert_eq!(float_compare(FloatPredicate::One, nan, one, 64), Some(false));
        assert_eq!(float_compare(FloatPredicate::Olt, nan, one, 64), Some(false));
        assert_eq!(float_compare(FloatPredicate::Olt, one, two, 64), Some(true));
        assert_eq!(float_compare(FloatPredicate::Ole, one, one, 64), Some(true));
        assert_eq!(float_compare(FloatPredicate::Ogt, two, one, 64), Some(true));
        assert_eq!(float_compare(FloatPredicate::Oge, one, two, 64), Some(false));
        assert_eq!(float_compare(FloatPredicate::Oeq, one, one, 8), None);
    }

    #[test]
    fn float_instructions_fold_through_the_solver() {
        let mut mb = ModuleBuilder::new();
        let abort = mb.declare_function("abort", &[]).unwrap();
        let lhs = mb.constant_int((1.5f64).to_bits() as u128, 64);
        let rhs = mb.constant_int((2.25f64).to_bits() as u128, 64);
        let expected = mb.constant_int((3.75f64).to_bits() as u128, 64);

        let mut fb = FunctionBuilder::new("main", &[]);
        let entry = fb.create_block();
        let ok_block = fb.create_block();
        let bad_block = fb.create_block();
        fb.begin_block(entry).unwrap();
        let sum = fb.push(Instruction::FBinaryOp {
            op: FloatOp::FAdd,
            lhs,
            rhs,
            width: 64,
        });
        let is_expected = fb.push(Instruction::FCmp {
            predicate: FloatPredicate::Oeq,
            lhs: sum,
            rhs: expected,
            width: 64,
        });
        fb.push(Instruction::CondBr {
            condition: is_expected,
            then_dest: ok_block,
            else_dest: bad_block,
        });
        fb.begin_block(ok_block).unwrap();
        fb.push(Instruction::Ret { value: None });
        fb.begin_block(bad_block).unwrap();
        fb.push(Instruction::Call {
            target: CallTarget::Direct(abort),
            args: vec![],
            result_width: None,
            signed_ret: false,
        });
        fb.push(Instruction::Unreachable);
        mb.add_function(fb).unwrap();

        let (_executor, handler) = run_main(mb, Config::default());
        let handler = handler.borrow();
        assert_eq!(handler.errors().count(), 0, "{:?}", handler.records);
        assert_eq!(handler.clean_exits().count(), 1);
    }

    #[test]
    fn free_of_alloca_reports_a_free_error() {
        let mut mb = ModuleBuilder::new();
        let free = mb.declare_function("free", &[64]).unwrap();
        let four = mb.constant_int(4, 64);

        let mut fb = FunctionBuilder::new("main", &[]);
        let entry = fb.create_block();
        fb.begin_block(entry).unwrap();
        let p = fb.push(Instruction::Alloca { size: four });
        fb.push(Instruction::Call {
            target: CallTarget::Direct(free),
            args: vec![p],
            result_width: None,
            signed_ret: false,
        });
        fb.push(Instruction::Ret { value: None });
        mb.add_function(fb).unwrap();

        let (_executor, handler) = run_main(mb, Config::default());
        let handler = handler.borrow();
        let error = handler.errors().next().expect("free error");
        assert_eq!(error.kind.as_deref(), Some("free"));
        assert!(error.message.as_deref().unwrap().contains("free of alloca"));
        assert_eq!(handler.clean_exits().count(), 0);
    }

    #[test]
    fn free_of_global_reports_a_free_error() {
        let mut mb = ModuleBuilder::new();
        let errno_location = mb.declare_function("sb_errno_location", &[]).unwrap();
        let free = mb.declare_function("free", &[64]).unwrap();

        let mut fb = FunctionBuilder::new("main", &[]);
        let entry = fb.create_block();
        fb.begin_block(entry).unwrap();
        let p = fb.push(Instruction::Call {
            target: CallTarget::Direct(errno_location),
            args: vec![],
            result_width: Some(64),
            signed_ret: false,
        });
        fb.push(Instruction::Call {
            target: CallTarget::Direct(free),
            args: vec![p],
            result_width: None,
            signed_ret: false,
        });
        fb.push(Instruction::Ret { value: None });
        mb.add_function(fb).unwrap();

        let (_executor, handler) = run_main(mb, Config::default());
        let handler = handler.borrow();
        let error = handler.errors().next().expect("free error");
        assert_eq!(error.kind.as_deref(), Some("free"));
        assert!(error.message.as_deref().unwrap().contains("free of global"));
    }

    #[test]
    fn extra_call_arguments_spill_into_a_varargs_object() {
        let mut mb = ModuleBuilder::new();
        let abort = mb.declare_function("abort", &[]).unwrap();
        let one = mb.constant_int(1, 32);
        let two = mb.constant_int(2, 32);
        let three = mb.constant_int(3, 32);

        // The callee declares one parameter; the surplus arguments land in
        // the frame varargs object and are released on return.
        let mut callee = FunctionBuilder::new("first", &[32]);
        let callee_entry = callee.create_block();
        callee.begin_block(callee_entry).unwrap();
        let param = callee.param(0);
        callee.push(Instruction::Ret { value: Some(param) });
        let callee_id = mb.add_function(callee).unwrap();

        let mut fb = FunctionBuilder::new("main", &[]);
        let entry = fb.create_block();
        let ok_block = fb.create_block();
        let bad_block = fb.create_block();
        fb.begin_block(entry).unwrap();
        let result = fb.push(Instruction::Call {
            target: CallTarget::Direct(callee_id),
            args: vec![one, two, three],
            result_width: Some(32),
            signed_ret: false,
        });
        let is_one = fb.push(Instruction::ICmp {
            predicate: Predicate::Eq,
            lhs: result,
            rhs: one,
        });
        fb.push(Instruction::CondBr {
            condition: is_one,
            then_dest: ok_block,
            else_dest: bad_block,
        });
        fb.begin_block(ok_block).unwrap();
        fb.push(Instruction::Ret { value: None });
        fb.begin_block(bad_block).unwrap();
        fb.push(Instruction::Call {
            target: CallTarget::Direct(abort),
            args: vec![],
            result_width: None,
            signed_ret: false,
        });
        fb.push(Instruction::Unreachable);
        mb.add_function(fb).unwrap();

        let (_executor, handler) = run_main(mb, Config::default());
        let handler = handler.borrow();
        assert_eq!(handler.errors().count(), 0, "{:?}", handler.records);
        assert_eq!(handler.clean_exits().count(), 1);
    }

    #[test]
    fn max_sym_array_size_concretizes_symbolic_offsets() {
        let mut mb = ModuleBuilder::new();
        let make_symbolic = mb.declare_function("sb_make_symbolic", &[64]).unwrap();
        let eight = mb.constant_int(8, 64);
        let one = mb.constant_int(1, 64);
        let byte = mb.constant_int(0x7f, 8);

        let mut fb = FunctionBuilder::new("main", &[]);
        let entry = fb.create_block();
        fb.begin_block(entry).unwrap();
        let buf = fb.push(Instruction::Alloca { size: eight });
        let index_cell = fb.push(Instruction::Alloca { size: one });
        fb.push(Instruction::Call {
            target: CallTarget::Direct(make_symbolic),
            args: vec![index_cell],
            result_width: None,
            signed_ret: false,
        });
        let index = fb.push(Instruction::Load {
            address: index_cell,
            width: 8,
        });
        let slot = fb.push(Instruction::GetElementPtr {
            base: buf,
            indices: vec![GepIndex {
                operand: index,
                stride: 1,
            }],
            offset: 0,
        });
        fb.push(Instruction::Store {
            value: byte,
            address: slot,
        });
        fb.push(Instruction::Ret { value: None });
        mb.add_function(fb).unwrap();

        let config = Config {
            max_sym_array_size: Some(4),
            ..Config::default()
        };
        let (executor, handler) = run_main(mb, config);
        let handler = handler.borrow();
        // The symbolic offset is concretized against the path, so the
        // store neither forks nor reaches the out-of-bounds error path.
        assert_eq!(handler.errors().count(), 0, "{:?}", handler.records);
        assert_eq!(handler.clean_exits().count(), 1);
        assert_eq!(executor.stats.forks, 0);
    }

    #[test]
    fn memory_operation_forks_across_aliasing_objects() {
        let mut mb = ModuleBuilder::new();
        let make_symbolic = mb.declare_function("sb_make_symbolic", &[64]).unwrap();
        let abort = mb.declare_function("abort", &[]).unwrap();
        let one = mb.constant_int(1, 64);
        let four = mb.constant_int(4, 64);
        let first_value = mb.constant_int(0x11, 32);
        let second_value = mb.constant_int(0x22, 32);

        let mut fb = FunctionBuilder::new("main", &[]);
        let entry = fb.create_block();
        let first_exit = fb.create_block();
        let second_check = fb.create_block();
        let second_exit = fb.create_block();
        let bad_block = fb.create_block();
        fb.begin_block(entry).unwrap();
        let selector_cell = fb.push(Instruction::Alloca { size: one });
        fb.push(Instruction::Call {
            target: CallTarget::Direct(make_symbolic),
            args: vec![selector_cell],
            result_width: None,
            signed_ret: false,
        });
        let selector_byte = fb.push(Instruction::Load {
            address: selector_cell,
            width: 8,
        });
        let selector = fb.push(Instruction::Cast {
            op: CastOp::Trunc,
            value: selector_byte,
            width: 1,
        });
        let a = fb.push(Instruction::Alloca { size: four });
        fb.push(Instruction::Store {
            value: first_value,
            address: a,
        });
        let b = fb.push(Instruction::Alloca { size: four });
        fb.push(Instruction::Store {
            value: second_value,
            address: b,
        });
        // A pointer whose segment depends on the symbolic selector: it may
        // alias either object, so the load must fork per candidate.
        let pointer = fb.push(Instruction::Select {
            condition: selector,
            on_true: a,
            on_false: b,
        });
        let loaded = fb.push(Instruction::Load {
            address: pointer,
            width: 32,
        });
        let is_first = fb.push(Instruction::ICmp {
            predicate: Predicate::Eq,
            lhs: loaded,
            rhs: first_value,
        });
        fb.push(Instruction::CondBr {
            condition: is_first,
            then_dest: first_exit,
            else_dest: second_check,
        });
        fb.begin_block(first_exit).unwrap();
        fb.push(Instruction::Ret { value: None });
        fb.begin_block(second_check).unwrap();
        let is_second = fb.push(Instruction::ICmp {
            predicate: Predicate::Eq,
            lhs: loaded,
            rhs: second_value,
        });
        fb.push(Instruction::CondBr {
            condition: is_second,
            then_dest: second_exit,
            else_dest: bad_block,
        });
        fb.begin_block(second_exit).unwrap();
        fb.push(Instruction::Ret { value: None });
        fb.begin_block(bad_block).unwrap();
        fb.push(Instruction::Call {
            target: CallTarget::Direct(abort),
            args: vec![],
            result_width: None,
            signed_ret: false,
        });
        fb.push(Instruction::Unreachable);
        mb.add_function(fb).unwrap();

        let (executor, handler) = run_main(mb, Config::default());
        let handler = handler.borrow();
        // One state per aliased object, each observing that object's
        // contents; the residual is infeasible and produces no error.
        assert_eq!(handler.errors().count(), 0, "{:?}", handler.records);
        assert_eq!(handler.clean_exits().count(), 2);
        assert_eq!(executor.stats.forks, 1);
    }
}
