use std::time::Duration;

use crate::executor::TerminateReason;

/// Policy for calls into functions with no body in the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalCallPolicy {
    /// No external calls are allowed.
    None,
    /// Only calls the dispatcher marks side-effect free.
    Pure,
    /// Only calls whose arguments are all concrete.
    Concrete,
    /// Any call; symbolic arguments are concretized first.
    All,
}

/// Tunable limits and feature switches of the execution core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Wall-clock cap on the whole run; sets the halt flag when exceeded.
    pub max_time: Option<Duration>,
    /// Total fork cap; past it every fork collapses to a single branch.
    pub max_forks: Option<u64>,
    /// States deeper than this terminate with "max-depth exceeded".
    pub max_depth: Option<u32>,
    /// Frame-count cap per state.
    pub max_stack_frames: Option<usize>,
    /// Instruction budget for the whole run.
    pub max_instructions: Option<u64>,
    /// Approximate live-memory cap in megabytes.
    pub max_memory_mb: Option<u64>,
    /// Kill states instead of merely inhibiting forks at the memory cap.
    pub max_memory_inhibit: bool,

    pub external_calls: ExternalCallPolicy,

    /// Per-query solver budget.
    pub solver_timeout: Option<Duration>,

    // Seed handling.
    pub only_replay_seeds: bool,
    pub zero_seed_extension: bool,
    pub allow_seed_extension: bool,
    pub allow_seed_truncation: bool,
    pub named_seed_matching: bool,
    pub seed_time: Option<Duration>,

    /// Simplify addresses and stored values against the path condition
    /// before memory operations.
    pub simplify_sym_indices: bool,
    /// Rewrite expressions through equality constraints as they are added.
    pub equality_substitution: bool,
    /// Concretize addresses into objects at least this large.
    pub max_sym_array_size: Option<u64>,

    /// Report every error occurrence instead of one per instruction.
    pub emit_all_errors: bool,
    /// Error kinds that halt the whole run after reporting.
    pub exit_on_error_type: Vec<TerminateReason>,

    /// Per-call-site fraction of all forks past which the engine
    /// concretizes conditions instead of forking.
    pub max_static_fork_pct: f64,
    /// Per-call-site fraction of total solver time with the same effect.
    pub max_static_solve_pct: f64,

    /// Report any heap allocation still bound on normal exit, whether or
    /// not the program could still free it.
    pub check_mem_cleanup: bool,
    /// Report heap allocations that are unreachable on normal exit: nothing
    /// on the stack or in a global points at them anymore. Weaker than
    /// `check_mem_cleanup`.
    pub check_leaks: bool,

    /// Seed for the engine's deterministic RNG.
    pub rng_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_time: None,
            max_forks: None,
            max_depth: None,
            max_stack_frames: Some(8192),
            max_instructions: None,
            max_memory_mb: Some(2048),
            max_memory_inhibit: true,
            external_calls: ExternalCallPolicy::Concrete,
            solver_timeout: None,
            only_replay_seeds: false,
            zero_seed_extension: false,
            allow_seed_extension: false,
            allow_seed_truncation: false,
            named_seed_matching: false,
            seed_time: None,
            simplify_sym_indices: false,
            equality_substitution: true,
            max_sym_array_size: None,
            emit_all_errors: false,
            exit_on_error_type: Vec::new(),
            max_static_fork_pct: 1.0,
            max_static_solve_pct: 1.0,
            check_mem_cleanup: false,
            check_leaks: false,
            rng_seed: 0x5eed,
        }
    }
}
