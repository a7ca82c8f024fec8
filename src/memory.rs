use std::sync::Arc;

use rand::Rng;

use bitcode_expr::{Array, Expr, KValue, UpdateList, Width, POINTER_WIDTH};
use bitcode_ir::FunctionId;

#[derive(thiserror::Error, Debug)]
pub enum MemoryError {
    #[error("Trying to allocate an overlapping object")]
    OverlappingAllocation,

    #[error("write to read-only object")]
    ReadOnly,

    #[error("access at byte {index} beyond object capacity {capacity}")]
    OutOfCapacity { index: u64, capacity: usize },
}

pub type Result<T> = std::result::Result<T, MemoryError>;

pub type ObjectId = u64;

/// Allocation site of a memory object, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocSite {
    pub function: FunctionId,
    pub instruction: usize,
}

/// An allocation record. Contents live in per-state [`ObjectState`]s; the
/// object itself is immutable and shared by every state that can reach it.
#[derive(Debug)]
pub struct MemoryObject {
    id: ObjectId,
    segment: u64,
    size: Expr,
    /// Host address for fixed allocations made visible to external code.
    address: Option<u64>,
    name: String,
    alloc_site: Option<AllocSite>,
    pub is_local: bool,
    pub is_global: bool,
    pub is_fixed: bool,
    pub is_user_specified: bool,
    pub is_read_only: bool,
}

impl MemoryObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn segment(&self) -> u64 {
        self.segment
    }

    pub fn size(&self) -> &Expr {
        &self.size
    }

    pub fn concrete_size(&self) -> Option<u64> {
        self.size.as_constant().map(|v| v as u64)
    }

    pub fn address(&self) -> Option<u64> {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alloc_site(&self) -> Option<AllocSite> {
        self.alloc_site
    }

    pub fn segment_expr(&self) -> Expr {
        Expr::constant(self.segment as u128, POINTER_WIDTH)
    }

    /// The pointer to this object's first byte.
    pub fn pointer(&self) -> KValue {
        KValue::pointer(self.segment, 0)
    }

    /// `offset + bytes <= size`, arranged so the addition cannot wrap.
    pub fn bounds_check_offset(&self, offset: &Expr, bytes: u64) -> Expr {
        let width = offset.width();
        if let Some(size) = self.concrete_size() {
            if bytes > size {
                return Expr::bool_false();
            }
            return Expr::ule(offset.clone(), Expr::constant((size - bytes) as u128, width));
        }
        let size = Expr::zext(self.size.clone(), width);
        let bytes_expr = Expr::constant(bytes as u128, width);
        Expr::and_bool(
            Expr::ule(bytes_expr.clone(), size.clone()),
            Expr::ule(offset.clone(), Expr::sub(size, bytes_expr)),
        )
    }

    /// `offset < size`, the check that a pointer's first byte is inside.
    pub fn bounds_check_start(&self, offset: &Expr) -> Expr {
        Expr::ult(offset.clone(), Expr::zext(self.size.clone(), offset.width()))
    }

    /// Segment equality compounded with the offset bounds check.
    pub fn bounds_check_pointer(&self, pointer: &KValue, bytes: u64) -> Expr {
        Expr::and_bool(
            Expr::eq(self.segment_expr(), pointer.segment().clone()),
            self.bounds_check_offset(pointer.offset(), bytes),
        )
    }
}

/// Hands out objects with fresh ids and segments; checks fixed allocations
/// for overlap against everything fixed allocated before them.
pub struct MemoryManager {
    next_id: ObjectId,
    next_segment: u64,
    fixed_ranges: Vec<(u64, u64)>,
    allocated_bytes: u64,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    pub fn new() -> Self {
        MemoryManager {
            next_id: 1,
            next_segment: bitcode_expr::FIRST_ORDINARY_SEGMENT,
            fixed_ranges: Vec::new(),
            allocated_bytes: 0,
        }
    }

    fn fresh_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn fresh_segment(&mut self) -> u64 {
        let segment = self.next_segment;
        self.next_segment += 1;
        segment
    }

    /// Bytes handed out so far, the input to the memory-cap heuristic.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub fn allocate(
        &mut self,
        size: Expr,
        is_local: bool,
        is_global: bool,
        name: impl Into<String>,
        alloc_site: Option<AllocSite>,
    ) -> Arc<MemoryObject> {
        self.allocated_bytes += size.as_constant().unwrap_or(0) as u64;
        Arc::new(MemoryObject {
            id: self.fresh_id(),
            segment: self.fresh_segment(),
            size,
            address: None,
            name: name.into(),
            alloc_site,
            is_local,
            is_global,
            is_fixed: false,
            is_user_specified: false,
            is_read_only: false,
        })
    }

    /// Allocate at a fixed host address, as the program's own API requests.
    pub fn allocate_fixed(
        &mut self,
        address: u64,
        size: u64,
        name: impl Into<String>,
        alloc_site: Option<AllocSite>,
    ) -> Result<Arc<MemoryObject>> {
        for &(start, len) in &self.fixed_ranges {
            if address < start.saturating_add(len) && start < address.saturating_add(size) {
                return Err(MemoryError::OverlappingAllocation);
            }
        }
        self.fixed_ranges.push((address, size));
        self.allocated_bytes += size;
        Ok(Arc::new(MemoryObject {
            id: self.fresh_id(),
            segment: self.fresh_segment(),
            size: Expr::constant(size as u128, POINTER_WIDTH),
            address: Some(address),
            name: name.into(),
            alloc_site,
            is_local: false,
            is_global: false,
            is_fixed: true,
            is_user_specified: true,
            is_read_only: false,
        }))
    }

    /// Allocate in a reserved segment (errno, functions).
    pub fn allocate_reserved(
        &mut self,
        segment: u64,
        size: u64,
        name: impl Into<String>,
    ) -> Arc<MemoryObject> {
        debug_assert!(segment < bitcode_expr::FIRST_ORDINARY_SEGMENT);
        self.allocated_bytes += size;
        Arc::new(MemoryObject {
            id: self.fresh_id(),
            segment,
            size: Expr::constant(size as u128, POINTER_WIDTH),
            address: None,
            name: name.into(),
            alloc_site: None,
            is_local: false,
            is_global: true,
            is_fixed: true,
            is_user_specified: false,
            is_read_only: false,
        })
    }
}

/// Which representation currently holds a byte's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteState {
    /// The concrete cache holds the value.
    Concrete,
    /// `known_symbolics` holds the value at a concrete index.
    KnownSymbolic,
    /// The update list holds the value.
    Flushed,
}

/// One plane of an object's contents: a concrete byte cache, per-byte
/// symbolic values at concrete indices, and an update list that takes over
/// once any access uses a symbolic index.
#[derive(Debug, Clone)]
struct Plane {
    store: Vec<u8>,
    byte_state: Vec<ByteState>,
    /// Bytes already mirrored into the update list.
    flushed_mask: Vec<bool>,
    known_symbolics: Vec<Option<Expr>>,
    updates: Option<UpdateList>,
    label: &'static str,
    object_id: ObjectId,
}

impl Plane {
    fn new_concrete(object_id: ObjectId, size: usize, label: &'static str) -> Self {
        Plane {
            store: vec![0; size],
            byte_state: vec![ByteState::Concrete; size],
            flushed_mask: vec![false; size],
            known_symbolics: vec![None; size],
            updates: None,
            label,
            object_id,
        }
    }

    fn new_symbolic(object_id: ObjectId, size: usize, array: Array, label: &'static str) -> Self {
        Plane {
            store: vec![0; size],
            byte_state: vec![ByteState::Flushed; size],
            flushed_mask: vec![true; size],
            known_symbolics: vec![None; size],
            updates: Some(UpdateList::new(array)),
            label,
            object_id,
        }
    }

    fn size(&self) -> usize {
        self.store.len()
    }

    fn updates_mut(&mut self) -> &mut UpdateList {
        if self.updates.is_none() {
            let array = Array::new_symbolic(
                format!("obj{}_{}", self.object_id, self.label),
                self.store.len() as u64,
            );
            self.updates = Some(UpdateList::new(array));
        }
        self.updates.as_mut().unwrap()
    }

    fn read8(&self, index: usize) -> Expr {
        match self.byte_state[index] {
            ByteState::Concrete => Expr::constant(self.store[index] as u128, 8),
            ByteState::KnownSymbolic => self.known_symbolics[index]
                .clone()
                .expect("known-symbolic byte without an expression"),
            ByteState::Flushed => Expr::read(
                self.updates
                    .clone()
                    .expect("flushed byte without an update list"),
                Expr::constant(index as u128, POINTER_WIDTH),
            ),
        }
    }

    fn read8_symbolic(&mut self, index: &Expr) -> Expr {
        self.flush_for_read();
        Expr::read(self.updates_mut().clone(), index.clone())
    }

    fn write8(&mut self, index: usize, value: &Expr) {
        if let Some(byte) = value.as_constant() {
            self.store[index] = byte as u8;
            self.byte_state[index] = ByteState::Concrete;
        } else {
            self.known_symbolics[index] = Some(value.clone());
            self.byte_state[index] = ByteState::KnownSymbolic;
        }
        self.flushed_mask[index] = false;
    }

    fn write8_symbolic(&mut self, index: &Expr, value: Expr) {
        self.flush_for_write();
        let index = index.clone();
        self.updates_mut().extend(index, value);
    }

    /// Mirror every unflushed byte into the update list so a symbolic-index
    /// read observes current contents. Cached representations stay valid.
    fn flush_for_read(&mut self) {
        for index in 0..self.store.len() {
            if self.flushed_mask[index] {
                continue;
            }
            let value = self.read8(index);
            let index_expr = Expr::constant(index as u128, POINTER_WIDTH);
            self.updates_mut().extend(index_expr, value);
            self.flushed_mask[index] = true;
        }
    }

    /// Like [`Plane::flush_for_read`], but a following symbolic-index write
    /// may shadow any byte, so every cached representation is dropped.
    fn flush_for_write(&mut self) {
        self.flush_for_read();
        for index in 0..self.store.len() {
            self.byte_state[index] = ByteState::Flushed;
            self.known_symbolics[index] = None;
        }
    }

    fn is_fully_concrete(&self) -> bool {
        self.byte_state.iter().all(|&s| s == ByteState::Concrete)
    }
}

/// Per-state contents of a [`MemoryObject`]: the offset plane holds data
/// bytes, the segment plane (created on the first pointer write) holds the
/// segment value of each byte so pointers survive a round trip through
/// memory.
#[derive(Debug, Clone)]
pub struct ObjectState {
    object_id: ObjectId,
    /// Owner key; the address space whose cow key matches may mutate this
    /// state in place.
    pub(crate) copy_on_write_owner: u32,
    read_only: bool,
    offset_plane: Plane,
    segment_plane: Option<Plane>,
}

impl ObjectState {
    /// Fresh contents, zero filled.
    pub fn new(object: &MemoryObject, capacity: usize) -> Self {
        ObjectState {
            object_id: object.id(),
            copy_on_write_owner: 0,
            read_only: false,
            offset_plane: Plane::new_concrete(object.id(), capacity, "off"),
            segment_plane: None,
        }
    }

    /// Contents backed by a symbolic array: every byte reads back as an
    /// unconstrained symbolic value.
    pub fn new_symbolic(object: &MemoryObject, capacity: usize, array: Array) -> Self {
        ObjectState {
            object_id: object.id(),
            copy_on_write_owner: 0,
            read_only: false,
            offset_plane: Plane::new_symbolic(object.id(), capacity, array, "off"),
            segment_plane: None,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn capacity(&self) -> usize {
        self.offset_plane.size()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether any byte of this state has ever carried a segment tag. An
    /// object without a segment plane cannot hold pointers.
    pub fn has_segment_plane(&self) -> bool {
        self.segment_plane.is_some()
    }

    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    pub fn owner(&self) -> u32 {
        self.copy_on_write_owner
    }

    pub fn initialize_to_zero(&mut self) {
        let zero = Expr::constant(0, 8);
        for i in 0..self.capacity() {
            self.offset_plane.write8(i, &zero);
        }
        self.segment_plane = None;
    }

    pub fn initialize_to_random(&mut self, rng: &mut impl Rng) {
        for i in 0..self.capacity() {
            let byte = Expr::constant(rng.gen::<u8>() as u128, 8);
            self.offset_plane.write8(i, &byte);
        }
        self.segment_plane = None;
    }

    fn segment_plane_mut(&mut self) -> &mut Plane {
        if self.segment_plane.is_none() {
            self.segment_plane = Some(Plane::new_concrete(
                self.object_id,
                self.offset_plane.size(),
                "seg",
            ));
        }
        self.segment_plane.as_mut().unwrap()
    }

    /// Read `width` bits at a byte offset, little-endian. Symbolic offsets
    /// flush the planes into their update lists, hence `&mut`; use
    /// [`ObjectState::read_const`] when the offset is known concrete.
    pub fn read(&mut self, offset: &Expr, width: Width) -> Result<KValue> {
        if let Some(base) = offset.as_constant() {
            return self.read_const(base as u64, width);
        }
        let bytes = width.div_ceil(8) as usize;
        let offset_value = self.read_plane_offset(offset, bytes, false)?;
        let segment_value = if self.segment_plane.is_some() {
            let raw = self.read_plane_offset(offset, bytes, true)?;
            Expr::zext(raw, POINTER_WIDTH)
        } else {
            Expr::constant(0, POINTER_WIDTH)
        };
        let offset_value = Expr::extract(offset_value, 0, width);
        Ok(KValue::new(segment_value, offset_value))
    }

    /// Read `width` bits at a concrete byte offset without mutating any
    /// cached representation.
    pub fn read_const(&self, base: u64, width: Width) -> Result<KValue> {
        let bytes = width.div_ceil(8) as usize;
        let offset_value = self.read_plane_const(&self.offset_plane, base, bytes)?;
        let segment_value = match &self.segment_plane {
            Some(plane) => Expr::zext(self.read_plane_const(plane, base, bytes)?, POINTER_WIDTH),
            None => Expr::constant(0, POINTER_WIDTH),
        };
        let offset_value = Expr::extract(offset_value, 0, width);
        Ok(KValue::new(segment_value, offset_value))
    }

    fn read_plane_const(&self, plane: &Plane, base: u64, bytes: usize) -> Result<Expr> {
        let mut value: Option<Expr> = None;
        for k in 0..bytes {
            let index = base as usize + k;
            if index >= plane.size() {
                return Err(MemoryError::OutOfCapacity {
                    index: index as u64,
                    capacity: plane.size(),
                });
            }
            let byte = plane.read8(index);
            value = Some(match value {
                None => byte,
                Some(acc) => Expr::concat(byte, acc),
            });
        }
        Ok(value.expect("zero-width read"))
    }

    fn read_plane_offset(&mut self, offset: &Expr, bytes: usize, segment: bool) -> Result<Expr> {
        let plane_size = self.offset_plane.size();
        let plane = if segment {
            self.segment_plane_mut()
        } else {
            &mut self.offset_plane
        };
        let mut value: Option<Expr> = None;
        if let Some(base) = offset.as_constant() {
            let base = base as u64;
            for k in 0..bytes {
                let index = base as usize + k;
                if index >= plane_size {
                    return Err(MemoryError::OutOfCapacity {
                        index: index as u64,
                        capacity: plane_size,
                    });
                }
                let byte = plane.read8(index);
                value = Some(match value {
                    None => byte,
                    Some(acc) => Expr::concat(byte, acc),
                });
            }
        } else {
            for k in 0..bytes {
                let index = Expr::add(
                    Expr::zext(offset.clone(), POINTER_WIDTH),
                    Expr::constant(k as u128, POINTER_WIDTH),
                );
                let byte = plane.read8_symbolic(&index);
                value = Some(match value {
                    None => byte,
                    Some(acc) => Expr::concat(byte, acc),
                });
            }
        }
        Ok(value.expect("zero-width read"))
    }

    /// Write a value at a byte offset, little-endian. A concrete source
    /// also lands in the concrete cache so external-call marshalling can
    /// elide symbolic I/O.
    pub fn write(&mut self, offset: &Expr, value: &KValue) -> Result<()> {
        if self.read_only {
            return Err(MemoryError::ReadOnly);
        }
        let width = value.width();
        let bytes = width.div_ceil(8) as usize;
        let padded = Expr::zext(value.offset().clone(), (bytes * 8) as Width);
        self.write_plane_offset(offset, &padded, bytes, false)?;

        let writes_segment = !value.segment().is_zero() || self.segment_plane.is_some();
        if writes_segment {
            let plane_width = (bytes * 8) as Width;
            let segment_bits = if plane_width <= POINTER_WIDTH {
                Expr::extract(value.segment().clone(), 0, plane_width)
            } else {
                Expr::zext(value.segment().clone(), plane_width)
            };
            self.segment_plane_mut();
            self.write_plane_offset(offset, &segment_bits, bytes, true)?;
        }
        Ok(())
    }

    fn write_plane_offset(
        &mut self,
        offset: &Expr,
        value: &Expr,
        bytes: usize,
        segment: bool,
    ) -> Result<()> {
        let plane_size = self.offset_plane.size();
        let plane = if segment {
            self.segment_plane_mut()
        } else {
            &mut self.offset_plane
        };
        if let Some(base) = offset.as_constant() {
            let base = base as u64;
            for k in 0..bytes {
                let index = base as usize + k;
                if index >= plane_size {
                    return Err(MemoryError::OutOfCapacity {
                        index: index as u64,
                        capacity: plane_size,
                    });
                }
                let byte = Expr::extract(value.clone(), (k * 8) as Width, 8);
                plane.write8(index, &byte);
            }
        } else {
            for k in 0..bytes {
                let index = Expr::add(
                    Expr::zext(offset.clone(), POINTER_WIDTH),
                    Expr::constant(k as u128, POINTER_WIDTH),
                );
                let byte = Expr::extract(value.clone(), (k * 8) as Width, 8);
                plane.write8_symbolic(&index, byte);
            }
        }
        Ok(())
    }

    /// Write one byte on both planes at a concrete index.
    pub fn write8(&mut self, index: usize, segment: &Expr, value: &Expr) -> Result<()> {
        if self.read_only {
            return Err(MemoryError::ReadOnly);
        }
        if index >= self.capacity() {
            return Err(MemoryError::OutOfCapacity {
                index: index as u64,
                capacity: self.capacity(),
            });
        }
        self.offset_plane.write8(index, value);
        if !segment.is_zero() || self.segment_plane.is_some() {
            let byte = Expr::extract(segment.clone(), 0, 8);
            self.segment_plane_mut().write8(index, &byte);
        }
        Ok(())
    }

    pub fn read8(&mut self, index: usize) -> Result<Expr> {
        if index >= self.capacity() {
            return Err(MemoryError::OutOfCapacity {
                index: index as u64,
                capacity: self.capacity(),
            });
        }
        Ok(self.offset_plane.read8(index))
    }

    /// The offset plane's concrete cache. For bytes currently represented
    /// symbolically this is the last cached concrete value, which is
    /// exactly what external-call marshalling wants.
    pub fn concrete_cache(&self) -> &[u8] {
        &self.offset_plane.store
    }

    pub fn is_fully_concrete(&self) -> bool {
        self.offset_plane.is_fully_concrete()
    }

    /// Materialize every byte of the offset plane into the concrete cache,
    /// sampling symbolic bytes through `sample`. Used before handing the
    /// buffer to an external function.
    pub fn flush_to_concrete_store(
        &mut self,
        mut sample: impl FnMut(&Expr) -> Option<u128>,
    ) -> Result<()> {
        for index in 0..self.capacity() {
            if self.offset_plane.byte_state[index] == ByteState::Concrete {
                continue;
            }
            let expr = self.offset_plane.read8(index);
            let byte = sample(&expr).unwrap_or(0);
            self.offset_plane.write8(index, &Expr::constant(byte & 0xff, 8));
        }
        Ok(())
    }

    /// Overwrite the concrete cache from external memory. Bytes arrive as
    /// plain data; the segment plane does not participate.
    pub fn overwrite_concrete(&mut self, bytes: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(MemoryError::ReadOnly);
        }
        for (index, &byte) in bytes.iter().enumerate().take(self.capacity()) {
            self.offset_plane
                .write8(index, &Expr::constant(byte as u128, 8));
        }
        Ok(())
    }
}
