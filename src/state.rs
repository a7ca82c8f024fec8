use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use bitcode_expr::{Array, BinOp, Expr, ExprKind, KValue};
use bitcode_ir::{BlockId, FunctionId};

use crate::address_space::AddressSpace;
use crate::memory::MemoryObject;
use crate::ptree::NodeId;

pub type StateId = u64;

/// A position in a function's flat instruction array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstRef {
    pub function: FunctionId,
    pub index: usize,
}

/// The conjunction of branch predicates asserted true on this path.
/// Optionally maintains an equality-substitution map so expressions added
/// later can be rewritten through earlier `x == c` facts.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Expr>,
    equalities: FxHashMap<Expr, Expr>,
    use_equalities: bool,
}

impl ConstraintSet {
    pub fn new(use_equalities: bool) -> Self {
        ConstraintSet {
            constraints: Vec::new(),
            equalities: FxHashMap::default(),
            use_equalities,
        }
    }

    pub fn as_slice(&self) -> &[Expr] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        self.constraints.iter()
    }

    /// Assert `constraint` on this path. Top-level conjunctions are split
    /// so each conjunct refines independently.
    pub fn add(&mut self, constraint: Expr) {
        debug_assert_eq!(constraint.width(), 1);
        if constraint.is_true() {
            return;
        }
        if let ExprKind::Binary {
            op: BinOp::And,
            lhs,
            rhs,
        } = constraint.kind()
        {
            let (lhs, rhs) = (lhs.clone(), rhs.clone());
            self.add(lhs);
            self.add(rhs);
            return;
        }
        if self.use_equalities {
            if let ExprKind::Cmp {
                op: bitcode_expr::CmpOp::Eq,
                lhs,
                rhs,
            } = constraint.kind()
            {
                if lhs.is_constant() && !rhs.is_constant() {
                    self.equalities.insert(rhs.clone(), lhs.clone());
                }
            }
        }
        self.constraints.push(constraint);
    }

    /// Rewrite `expr` through the recorded equalities.
    pub fn simplify(&self, expr: &Expr) -> Expr {
        if !self.use_equalities || self.equalities.is_empty() {
            return expr.clone();
        }
        self.rewrite(expr)
    }

    fn rewrite(&self, expr: &Expr) -> Expr {
        if let Some(replacement) = self.equalities.get(expr) {
            return replacement.clone();
        }
        match expr.kind() {
            ExprKind::Constant(_) | ExprKind::Read { .. } => expr.clone(),
            ExprKind::Select {
                cond,
                on_true,
                on_false,
            } => Expr::select(
                self.rewrite(cond),
                self.rewrite(on_true),
                self.rewrite(on_false),
            ),
            ExprKind::Concat { msb, lsb } => Expr::concat(self.rewrite(msb), self.rewrite(lsb)),
            ExprKind::Extract { expr: e, bit_offset } => {
                Expr::extract(self.rewrite(e), *bit_offset, expr.width())
            }
            ExprKind::ZExt(e) => Expr::zext(self.rewrite(e), expr.width()),
            ExprKind::SExt(e) => Expr::sext(self.rewrite(e), expr.width()),
            ExprKind::Not(e) => Expr::not(self.rewrite(e)),
            ExprKind::Binary { op, lhs, rhs } => {
                Expr::binary(*op, self.rewrite(lhs), self.rewrite(rhs))
            }
            ExprKind::Cmp { op, lhs, rhs } => {
                Expr::cmp(*op, self.rewrite(lhs), self.rewrite(rhs))
            }
        }
    }
}

/// One active call.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function: FunctionId,
    /// The call instruction to return to, `None` in the entry frame.
    pub caller: Option<InstRef>,
    /// Register cells, one per parameter and per instruction.
    pub locals: Vec<Option<KValue>>,
    /// Objects to release when this frame pops.
    pub allocas: Vec<Arc<MemoryObject>>,
    pub varargs: Option<Arc<MemoryObject>>,
}

impl StackFrame {
    pub fn new(function: FunctionId, caller: Option<InstRef>, num_registers: usize) -> Self {
        StackFrame {
            function,
            caller,
            locals: vec![None; num_registers],
            allocas: Vec::new(),
            varargs: None,
        }
    }
}

/// A value drawn fresh from the environment, recorded for replay and test
/// generation.
#[derive(Debug, Clone)]
pub struct NondetValue {
    pub value: KValue,
    pub name: String,
    pub is_signed: bool,
    pub origin: InstRef,
}

/// The unit of symbolic execution: one explored path through the program.
#[derive(Debug)]
pub struct ExecutionState {
    pub id: StateId,
    pub pc: InstRef,
    pub prev_pc: InstRef,
    /// Predecessor block, consulted by phi nodes.
    pub incoming_block: Option<BlockId>,
    pub stack: Vec<StackFrame>,
    pub constraints: ConstraintSet,
    pub address_space: AddressSpace,
    /// Symbolic objects by creation order: the object and its backing array.
    pub symbolics: Vec<(Arc<MemoryObject>, Array)>,
    /// Names already taken by symbolic arrays in this state.
    pub array_names: FxHashSet<String>,
    pub nondet_values: Vec<NondetValue>,
    pub covered_new: bool,
    pub covered_lines: FxHashSet<InstRef>,
    pub steps: u64,
    pub depth: u32,
    pub weight: f64,
    pub fork_disabled: bool,
    pub ptree_node: NodeId,
    /// Branch directions taken at fork points, oldest first.
    pub branch_history: Vec<bool>,
}

impl ExecutionState {
    pub fn new(id: StateId, entry: InstRef, num_registers: usize, use_equalities: bool) -> Self {
        ExecutionState {
            id,
            pc: entry,
            prev_pc: entry,
            incoming_block: None,
            stack: vec![StackFrame::new(entry.function, None, num_registers)],
            constraints: ConstraintSet::new(use_equalities),
            address_space: AddressSpace::new(),
            symbolics: Vec::new(),
            array_names: FxHashSet::default(),
            nondet_values: Vec::new(),
            covered_new: false,
            covered_lines: FxHashSet::default(),
            steps: 0,
            depth: 0,
            weight: 1.0,
            fork_disabled: false,
            ptree_node: NodeId::ROOT,
            branch_history: Vec::new(),
        }
    }

    pub fn frame(&self) -> &StackFrame {
        self.stack.last().expect("state with empty stack")
    }

    pub fn frame_mut(&mut self) -> &mut StackFrame {
        self.stack.last_mut().expect("state with empty stack")
    }

    /// Fork this state. The clone shares address-space structure through
    /// the bumped cow key; coverage novelty stays with the original.
    pub fn branch(&mut self, new_id: StateId) -> ExecutionState {
        self.depth += 1;
        ExecutionState {
            id: new_id,
            pc: self.pc,
            prev_pc: self.prev_pc,
            incoming_block: self.incoming_block,
            stack: self.stack.clone(),
            constraints: self.constraints.clone(),
            address_space: self.address_space.fork_copy(),
            symbolics: self.symbolics.clone(),
            array_names: self.array_names.clone(),
            nondet_values: self.nondet_values.clone(),
            covered_new: false,
            covered_lines: FxHashSet::default(),
            steps: self.steps,
            depth: self.depth,
            weight: self.weight * 0.5,
            fork_disabled: self.fork_disabled,
            ptree_node: self.ptree_node,
            branch_history: self.branch_history.clone(),
        }
    }

    pub fn add_symbolic(&mut self, object: Arc<MemoryObject>, array: Array) {
        self.symbolics.push((object, array));
    }

    /// A unique array name within this state, derived from `name`.
    pub fn unique_array_name(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut counter = 0;
        while !self.array_names.insert(candidate.clone()) {
            counter += 1;
            candidate = format!("{name}_{counter}");
        }
        candidate
    }

    pub fn symbolic_arrays(&self) -> Vec<Array> {
        self.symbolics.iter().map(|(_, a)| a.clone()).collect()
    }
}
