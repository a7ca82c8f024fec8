//! Hash-consed fixed-width bitvector expressions.
//!
//! Every expression is an immutable node interned in a global weak table, so
//! structural equality coincides with node identity. Constructors perform
//! constant folding and a small set of local rewrites, which keeps the DAG
//! canonical: two structurally equal expressions are always the same node.
//!
//! Symbolic data enters through named byte [`Array`]s read via
//! [`Expr::read`]; writes at symbolic indices are layered on top of an array
//! with an [`UpdateList`].

mod array;
mod eval;
mod expr;
mod kvalue;

pub use array::{Array, UpdateList, UpdateNode};
pub use eval::{Assignment, EvalError};
pub use expr::{BinOp, CmpOp, Expr, ExprKind, Width, BOOL_WIDTH};
pub use kvalue::{
    KValue, ERRNO_SEGMENT, FIRST_ORDINARY_SEGMENT, FUNCTIONS_SEGMENT, POINTER_WIDTH,
};
