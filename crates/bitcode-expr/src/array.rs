use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::expr::Expr;

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(0);

struct ArrayInner {
    id: u64,
    name: String,
    size: u64,
    constant_values: Option<Vec<u8>>,
}

/// A named array of bytes, the leaves of the symbolic expression DAG.
///
/// A symbolic array has no contents of its own; its bytes are the unknowns a
/// solver assigns. A constant array carries its contents and reads from it
/// fold to constants.
#[derive(Clone)]
pub struct Array(Arc<ArrayInner>);

impl Array {
    pub fn new_symbolic(name: impl Into<String>, size: u64) -> Self {
        Array(Arc::new(ArrayInner {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            size,
            constant_values: None,
        }))
    }

    pub fn new_constant(name: impl Into<String>, values: Vec<u8>) -> Self {
        Array(Arc::new(ArrayInner {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            size: values.len() as u64,
            constant_values: Some(values),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn size(&self) -> u64 {
        self.0.size
    }

    pub fn is_symbolic(&self) -> bool {
        self.0.constant_values.is_none()
    }

    pub fn constant_value(&self, index: u64) -> Option<u8> {
        self.0
            .constant_values
            .as_ref()
            .and_then(|v| v.get(index as usize).copied())
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Array {}

impl Hash for Array {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.0.name, self.0.size)
    }
}

/// One write layered over an array: `index := value`, both byte-sized
/// expressions. Nodes form an immutable singly linked list, newest first, so
/// extending an update list never disturbs readers of the old list.
pub struct UpdateNode {
    index: Expr,
    value: Expr,
    next: Option<Arc<UpdateNode>>,
    len: usize,
}

impl UpdateNode {
    pub fn index(&self) -> &Expr {
        &self.index
    }

    pub fn value(&self) -> &Expr {
        &self.value
    }

    pub fn next(&self) -> Option<&Arc<UpdateNode>> {
        self.next.as_ref()
    }
}

/// A (possibly empty) list of writes over an [`Array`].
#[derive(Clone)]
pub struct UpdateList {
    array: Array,
    head: Option<Arc<UpdateNode>>,
}

impl UpdateList {
    pub fn new(array: Array) -> Self {
        UpdateList { array, head: None }
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn head(&self) -> Option<&Arc<UpdateNode>> {
        self.head.as_ref()
    }

    pub fn len(&self) -> usize {
        self.head.as_ref().map(|n| n.len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Layer a new write on top of this list.
    pub fn extend(&mut self, index: Expr, value: Expr) {
        debug_assert_eq!(value.width(), 8, "update values are bytes");
        let len = self.len() + 1;
        self.head = Some(Arc::new(UpdateNode {
            index,
            value,
            next: self.head.take(),
            len,
        }));
    }

    /// Iterate writes newest-first.
    pub fn iter(&self) -> UpdateIter<'_> {
        UpdateIter {
            node: self.head.as_deref(),
        }
    }
}

impl PartialEq for UpdateList {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
            && match (&self.head, &other.head) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

impl Eq for UpdateList {}

impl Hash for UpdateList {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.array.hash(state);
        if let Some(head) = &self.head {
            (Arc::as_ptr(head) as usize).hash(state);
        }
    }
}

impl std::fmt::Debug for UpdateList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}+{}w", self.array, self.len())
    }
}

pub struct UpdateIter<'a> {
    node: Option<&'a UpdateNode>,
}

impl<'a> Iterator for UpdateIter<'a> {
    type Item = (&'a Expr, &'a Expr);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.node?;
        self.node = node.next.as_deref();
        Some((&node.index, &node.value))
    }
}
