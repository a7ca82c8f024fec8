use std::sync::Arc;
use std::time::Instant;

use im::OrdMap;

use bitcode_expr::{Expr, KValue, POINTER_WIDTH};
use bitcode_solver::Error as SolverError;

use crate::memory::{MemoryObject, ObjectId, ObjectState};
use crate::solver::TimingSolver;

/// A memory object together with its per-state contents.
#[derive(Debug, Clone)]
pub struct Binding {
    pub object: Arc<MemoryObject>,
    pub state: Arc<ObjectState>,
}

pub type ResolutionList = Vec<Binding>;

/// The segmented address space of one execution state.
///
/// All maps are persistent: copying an address space is O(1) and shares the
/// underlying nodes. Ownership of object states is tracked through the
/// `cow_key`: a fork bumps the shared counter so that neither copy owns the
/// shared nodes, and [`AddressSpace::get_writeable`] is the only path to
/// in-place mutation.
#[derive(Debug)]
pub struct AddressSpace {
    cow_key: u32,
    /// Objects by id; ids grow monotonically, so iteration order is the
    /// allocation order and deterministic for a given history.
    objects: OrdMap<ObjectId, Binding>,
    /// Non-zero segments to their objects.
    segment_map: OrdMap<u64, Arc<MemoryObject>>,
    /// Real host addresses of fixed objects, for resolution of integer
    /// pointers and external-call marshalling.
    concrete_address_map: OrdMap<u64, u64>,
    /// Running estimate of bound contents, for the memory cap.
    approximate_bytes: u64,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace {
            cow_key: 1,
            objects: OrdMap::new(),
            segment_map: OrdMap::new(),
            concrete_address_map: OrdMap::new(),
            approximate_bytes: 0,
        }
    }

    pub fn cow_key(&self) -> u32 {
        self.cow_key
    }

    pub fn approximate_bytes(&self) -> u64 {
        self.approximate_bytes
    }

    /// The O(1) copy used by state forking. Bumps this space's key as well,
    /// so neither the original nor the copy may mutate shared object
    /// states in place afterwards.
    pub fn fork_copy(&mut self) -> AddressSpace {
        self.cow_key += 1;
        AddressSpace {
            cow_key: self.cow_key,
            objects: self.objects.clone(),
            segment_map: self.segment_map.clone(),
            concrete_address_map: self.concrete_address_map.clone(),
            approximate_bytes: self.approximate_bytes,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Binding)> {
        self.objects.iter()
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// Install an object. The state must be fresh: ownership transfers to
    /// this address space.
    pub fn bind_object(&mut self, object: Arc<MemoryObject>, mut state: ObjectState) {
        assert_eq!(state.owner(), 0, "object state already has an owner");
        state.copy_on_write_owner = self.cow_key;
        self.approximate_bytes += state.capacity() as u64;
        if object.segment() != 0 {
            self.segment_map.insert(object.segment(), object.clone());
        }
        self.objects.insert(object.id(), Binding {
            object,
            state: Arc::new(state),
        });
    }

    /// Remove an object from both maps.
    pub fn unbind_object(&mut self, object: &MemoryObject) {
        if object.segment() != 0 {
            self.segment_map.remove(&object.segment());
        }
        if let Some(binding) = self.objects.remove(&object.id()) {
            self.approximate_bytes = self
                .approximate_bytes
                .saturating_sub(binding.state.capacity() as u64);
        }
    }

    pub fn find_object(&self, object: &MemoryObject) -> Option<&Binding> {
        self.objects.get(&object.id())
    }

    pub fn find_by_id(&self, id: ObjectId) -> Option<&Binding> {
        self.objects.get(&id)
    }

    pub fn find_by_segment(&self, segment: u64) -> Option<&Binding> {
        let object = self.segment_map.get(&segment)?;
        self.objects.get(&object.id())
    }

    /// Record the host address a fixed object lives at.
    pub fn register_concrete_address(&mut self, address: u64, segment: u64) {
        self.concrete_address_map.insert(address, segment);
    }

    pub fn concrete_addresses(&self) -> impl Iterator<Item = (&u64, &u64)> {
        self.concrete_address_map.iter()
    }

    /// Obtain an object state suitable for writing. If this address space
    /// owns the state it is handed back as-is; otherwise it is cloned, the
    /// clone is tagged with our key and re-bound, and the clone returned.
    /// This is the sole path to in-place mutation.
    pub fn get_writeable(&mut self, id: ObjectId) -> Option<&mut ObjectState> {
        let cow_key = self.cow_key;
        let binding = self.objects.get_mut(&id)?;
        if binding.state.owner() != cow_key {
            let mut copy = ObjectState::clone(&binding.state);
            copy.copy_on_write_owner = cow_key;
            binding.state = Arc::new(copy);
        }
        Some(Arc::make_mut(&mut binding.state))
    }

    // -- pointer resolution ------------------------------------------------

    /// Resolution by a concrete (segment, offset) pair alone, without the
    /// solver: non-zero segments go through the segment map, segment-zero
    /// addresses through an exact concrete-address lookup. Interior
    /// addresses of fixed objects are recovered (with a bounds check) by
    /// [`AddressSpace::resolve_address_with_offset`] instead. No bounds
    /// check happens here; callers re-check before acting on the result.
    pub fn resolve_constant_address(&self, pointer: &KValue) -> Option<(Binding, Option<u64>)> {
        let mut segment = pointer.constant_segment()?;
        let mut offset = None;
        if segment == 0 {
            let address = pointer.offset().as_constant()? as u64;
            if address == 0 {
                return None;
            }
            segment = *self.concrete_address_map.get(&address)?;
            offset = Some(0);
        }
        self.find_by_segment(segment)
            .cloned()
            .map(|binding| (binding, offset))
    }

    /// Resolve a pointer when at most one object is expected. Concrete
    /// segments are a map lookup; a symbolic segment is sampled; the
    /// fallback is a directional scan over the objects, widest first, that
    /// stops as soon as the offset is proven past every remaining
    /// candidate region.
    ///
    /// Returns `Ok(None)` when no object matches; a solver failure is an
    /// `Err` and the caller decides whether to concretize and retry.
    pub fn resolve_one(
        &self,
        constraints: &[Expr],
        solver: &mut TimingSolver,
        pointer: &KValue,
    ) -> Result<Option<(Binding, Option<u64>)>, SolverError> {
        if pointer.is_constant() {
            if let Some(found) = self.resolve_constant_address(pointer) {
                return Ok(Some(found));
            }
            let list = self.resolve_address_with_offset(constraints, solver, pointer.offset())?;
            return Ok(match <[_; 1]>::try_from(list) {
                Ok([(binding, offset)]) => Some((binding, Some(offset))),
                Err(_) => None,
            });
        }

        // Sample the segment; a unique non-zero value short-circuits to the
        // segment map.
        let segment = match pointer.constant_segment() {
            Some(s) => s,
            None => solver.get_value(constraints, pointer.segment())? as u64,
        };
        if segment != 0 {
            let sampled = KValue::new(
                Expr::constant(segment as u128, POINTER_WIDTH),
                pointer.offset().clone(),
            );
            return Ok(self.resolve_constant_address(&sampled));
        }

        // Directional scan, widest object first. Offsets are
        // segment-relative, so exclusion by `offset >= size` is monotonic
        // in descending size: once the offset is proven at or past the
        // widest remaining object, it is past every remaining object and
        // the scan stops. Ties keep allocation order for determinism.
        let mut candidates: Vec<&Binding> = self.objects.iter().map(|(_, b)| b).collect();
        candidates.sort_by(|a, b| {
            let size_a = a.object.concrete_size().unwrap_or(u64::MAX);
            let size_b = b.object.concrete_size().unwrap_or(u64::MAX);
            size_b
                .cmp(&size_a)
                .then_with(|| a.object.id().cmp(&b.object.id()))
        });
        for binding in candidates {
            let in_bounds = binding.object.bounds_check_pointer(pointer, 1);
            if solver.may_be_true(constraints, &in_bounds)? {
                return Ok(Some((binding.clone(), None)));
            }
            let past_extent = Expr::uge(
                pointer.offset().clone(),
                Expr::zext(binding.object.size().clone(), pointer.offset().width()),
            );
            if solver.must_be_true(constraints, &past_extent)? {
                break;
            }
        }
        Ok(None)
    }

    /// Enumerate every object the pointer may alias. Returns the list and
    /// an incompleteness flag: `true` when the cap or deadline cut the
    /// enumeration short or a query failed.
    pub fn resolve(
        &self,
        constraints: &[Expr],
        solver: &mut TimingSolver,
        pointer: &KValue,
        max_resolutions: usize,
        deadline: Option<Instant>,
    ) -> (ResolutionList, bool) {
        let mut list = ResolutionList::new();
        match self.resolve_inner(constraints, solver, pointer, max_resolutions, deadline, &mut list)
        {
            Ok(incomplete) => (list, incomplete),
            Err(_) => (list, true),
        }
    }

    fn resolve_inner(
        &self,
        constraints: &[Expr],
        solver: &mut TimingSolver,
        pointer: &KValue,
        max_resolutions: usize,
        deadline: Option<Instant>,
        list: &mut ResolutionList,
    ) -> Result<bool, SolverError> {
        if pointer.constant_segment().is_some() {
            return self.resolve_constant_segment(constraints, solver, pointer, list);
        }

        let zero_segment = Expr::is_zero_expr(pointer.segment().clone());
        if solver.may_be_true(constraints, &zero_segment)? {
            let zeroed = KValue::new(
                Expr::constant(0, POINTER_WIDTH),
                pointer.offset().clone(),
            );
            self.resolve_constant_segment(constraints, solver, &zeroed, list)?;
        }

        for (segment, object) in self.segment_map.iter() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(true);
                }
            }
            if max_resolutions != 0 && list.len() >= max_resolutions {
                return Ok(true);
            }
            let matches = Expr::eq(
                pointer.segment().clone(),
                Expr::constant(*segment as u128, POINTER_WIDTH),
            );
            if solver.may_be_true(constraints, &matches)? {
                if let Some(binding) = self.objects.get(&object.id()) {
                    list.push(binding.clone());
                }
            }
        }
        Ok(false)
    }

    fn resolve_constant_segment(
        &self,
        constraints: &[Expr],
        solver: &mut TimingSolver,
        pointer: &KValue,
        list: &mut ResolutionList,
    ) -> Result<bool, SolverError> {
        let segment = pointer.constant_segment().expect("constant segment");
        if segment != 0 {
            if let Some((binding, _)) = self.resolve_constant_address(pointer) {
                list.push(binding);
            }
            return Ok(false);
        }
        for (binding, _) in self.resolve_address_with_offset(constraints, solver, pointer.offset())?
        {
            list.push(binding);
        }
        Ok(false)
    }

    /// Recover objects from a concrete integer address by searching the
    /// concrete address map; the returned offset is relative to the found
    /// object's base address.
    pub fn resolve_address_with_offset(
        &self,
        constraints: &[Expr],
        solver: &mut TimingSolver,
        address: &Expr,
    ) -> Result<Vec<(Binding, u64)>, SolverError> {
        let mut results = Vec::new();
        let Some(address_value) = address.as_constant() else {
            return Ok(results);
        };
        for (base, segment) in self.concrete_address_map.iter() {
            let Some(binding) = self.find_by_segment(*segment) else {
                continue;
            };
            let offset = Expr::sub(
                Expr::constant(address_value, POINTER_WIDTH),
                Expr::constant(*base as u128, POINTER_WIDTH),
            );
            let check = binding.object.bounds_check_start(&offset);
            if solver.may_be_true(constraints, &check)? {
                let offset_value = address_value.wrapping_sub(*base as u128) as u64;
                results.push((binding.clone(), offset_value));
            }
        }
        Ok(results)
    }

    // -- external-call marshalling -----------------------------------------

    /// Project concrete byte caches of the named segments into external
    /// buffers. Read-only objects are copied too unless the caller opts
    /// out; user-specified objects never participate.
    pub fn copy_out_concretes(&self, buffers: &mut crate::externals::ExternalMemory) {
        for (_, binding) in self.objects.iter() {
            let segment = binding.object.segment();
            let Some(buffer) = buffers.object_mut(segment) else {
                continue;
            };
            if binding.object.is_user_specified {
                continue;
            }
            let cache = binding.state.concrete_cache();
            let len = cache.len().min(buffer.len());
            buffer[..len].copy_from_slice(&cache[..len]);
        }
    }

    /// Copy external buffers back over the concrete caches, cloning object
    /// states through the usual ownership path. Returns `false` when an
    /// inbound write would modify a read-only object.
    pub fn copy_in_concretes(&mut self, buffers: &crate::externals::ExternalMemory) -> bool {
        let ids: Vec<(ObjectId, u64)> = self
            .objects
            .iter()
            .filter(|(_, b)| !b.object.is_user_specified)
            .map(|(id, b)| (*id, b.object.segment()))
            .collect();
        for (id, segment) in ids {
            let Some(buffer) = buffers.object(segment) else {
                continue;
            };
            let binding = self.objects.get(&id).expect("binding disappeared");
            // Compare against the offset plane's concrete cache only.
            if binding.state.concrete_cache() == &buffer[..] {
                continue;
            }
            if binding.state.is_read_only() {
                return false;
            }
            let state = self.get_writeable(id).expect("writeable binding");
            if state.overwrite_concrete(buffer).is_err() {
                return false;
            }
        }
        true
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryManager;
    use bitcode_solver::RangeSolver;

    fn solver() -> TimingSolver {
        TimingSolver::new(Box::new(RangeSolver::new()), None)
    }

    fn alloc(mm: &mut MemoryManager, size: u64) -> Arc<MemoryObject> {
        mm.allocate(
            Expr::constant(size as u128, POINTER_WIDTH),
            false,
            false,
            "obj",
            None,
        )
    }

    fn bind(space: &mut AddressSpace, object: &Arc<MemoryObject>) {
        let state = ObjectState::new(object, object.concrete_size().unwrap() as usize);
        space.bind_object(object.clone(), state);
    }

    #[test]
    fn bind_and_segment_map_stay_consistent() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 8);
        bind(&mut space, &mo);

        assert!(space.find_object(&mo).is_some());
        assert!(space.find_by_segment(mo.segment()).is_some());

        space.unbind_object(&mo);
        assert!(space.find_object(&mo).is_none());
        assert!(space.find_by_segment(mo.segment()).is_none());
    }

    #[test]
    fn fork_copy_disowns_both_sides() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 8);
        bind(&mut space, &mo);

        let original_key = space.cow_key();
        let copy = space.fork_copy();
        assert_eq!(space.cow_key(), copy.cow_key());
        assert!(space.cow_key() > original_key);

        let binding = space.find_object(&mo).unwrap();
        assert!(binding.state.owner() < space.cow_key());
    }

    #[test]
    fn owner_key_invariant_holds_across_writes() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 8);
        bind(&mut space, &mo);

        let mut copy = space.fork_copy();

        // Writing through the copy clones; the original keeps old contents.
        let value = KValue::from_constant(0xaa, 8);
        copy.get_writeable(mo.id())
            .unwrap()
            .write(&Expr::constant(0, POINTER_WIDTH), &value)
            .unwrap();

        let read_copy = copy
            .find_object(&mo)
            .unwrap()
            .state
            .read_const(0, 8)
            .unwrap();
        let read_orig = space
            .find_object(&mo)
            .unwrap()
            .state
            .read_const(0, 8)
            .unwrap();
        assert_eq!(read_copy.offset().as_constant(), Some(0xaa));
        assert_eq!(read_orig.offset().as_constant(), Some(0));

        // Every reachable state satisfies owner <= cow_key.
        for (_, binding) in space.iter() {
            assert!(binding.state.owner() <= space.cow_key());
        }
        for (_, binding) in copy.iter() {
            assert!(binding.state.owner() <= copy.cow_key());
        }
    }

    #[test]
    fn second_write_after_fork_mutates_in_place() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 8);
        bind(&mut space, &mo);
        let _copy = space.fork_copy();

        space
            .get_writeable(mo.id())
            .unwrap()
            .write(
                &Expr::constant(0, POINTER_WIDTH),
                &KValue::from_constant(1, 8),
            )
            .unwrap();
        let owner_after_first = space.find_object(&mo).unwrap().state.owner();
        assert_eq!(owner_after_first, space.cow_key());

        // Second write must not clone again.
        let before = Arc::as_ptr(&space.find_object(&mo).unwrap().state);
        space
            .get_writeable(mo.id())
            .unwrap()
            .write(
                &Expr::constant(1, POINTER_WIDTH),
                &KValue::from_constant(2, 8),
            )
            .unwrap();
        let after = Arc::as_ptr(&space.find_object(&mo).unwrap().state);
        assert_eq!(before, after);
    }

    #[test]
    fn resolve_one_finds_concrete_segment() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 8);
        bind(&mut space, &mo);

        let mut solver = solver();
        let pointer = KValue::pointer(mo.segment(), 4);
        let found = space.resolve_one(&[], &mut solver, &pointer).unwrap();
        let (binding, offset) = found.expect("resolution");
        assert_eq!(binding.object.id(), mo.id());
        assert_eq!(offset, None);
    }

    #[test]
    fn resolve_recovers_fixed_objects_by_address() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = mm.allocate_fixed(0x80, 8, "fixed", None).unwrap();
        let state = ObjectState::new(&mo, 8);
        space.bind_object(mo.clone(), state);
        space.register_concrete_address(0x80, mo.segment());

        let mut solver = solver();
        // 0x84 is inside; resolution reports offset 4.
        let inside = KValue::pointer(0, 0x84);
        let found = space.resolve_one(&[], &mut solver, &inside).unwrap();
        let (binding, offset) = found.expect("resolution");
        assert_eq!(binding.object.id(), mo.id());
        assert_eq!(offset, Some(4));

        // 0x88 is one past the end.
        let outside = KValue::pointer(0, 0x88);
        let found = space.resolve_one(&[], &mut solver, &outside).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn resolve_one_agrees_with_capped_resolve() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 8);
        bind(&mut space, &mo);

        let mut solver = solver();
        let pointer = KValue::pointer(mo.segment(), 0);
        let one = space.resolve_one(&[], &mut solver, &pointer).unwrap();
        let (list, incomplete) = space.resolve(&[], &mut solver, &pointer, 1, None);
        assert!(!incomplete);
        assert_eq!(list.len(), 1);
        assert_eq!(
            one.unwrap().0.object.id(),
            list[0].object.id(),
        );
    }

    #[test]
    fn resolve_enumerates_symbolic_segment_aliases() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let a = alloc(&mut mm, 8);
        let b = alloc(&mut mm, 8);
        bind(&mut space, &a);
        bind(&mut space, &b);

        // A pointer whose segment is entirely unknown may alias both.
        let array = bitcode_expr::Array::new_symbolic("seg", 8);
        let updates = bitcode_expr::UpdateList::new(array);
        let mut segment: Option<Expr> = None;
        for i in 0..8 {
            let byte = Expr::read(updates.clone(), Expr::constant(i, 32));
            segment = Some(match segment {
                None => byte,
                Some(acc) => Expr::concat(byte, acc),
            });
        }
        let pointer = KValue::new(segment.unwrap(), Expr::constant(0, POINTER_WIDTH));

        let mut solver = solver();
        let (list, incomplete) = space.resolve(&[], &mut solver, &pointer, 0, None);
        assert!(!incomplete);
        let ids: Vec<ObjectId> = list.iter().map(|b| b.object.id()).collect();
        assert!(ids.contains(&a.id()));
        assert!(ids.contains(&b.id()));

        // With a cap of one, the enumeration reports itself incomplete.
        let (capped, incomplete) = space.resolve(&[], &mut solver, &pointer, 1, None);
        assert!(incomplete);
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn copy_out_then_in_is_a_no_op() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 4);
        bind(&mut space, &mo);
        space
            .get_writeable(mo.id())
            .unwrap()
            .write(
                &Expr::constant(0, POINTER_WIDTH),
                &KValue::from_constant(0xcafe, 16),
            )
            .unwrap();

        let mut buffers = crate::externals::ExternalMemory::new();
        buffers.add_object(mo.segment(), 4);
        space.copy_out_concretes(&mut buffers);

        let key_before = space.cow_key();
        assert!(space.copy_in_concretes(&buffers));
        // Nothing changed, so no object state was cloned.
        assert_eq!(space.cow_key(), key_before);
        let read = space
            .find_object(&mo)
            .unwrap()
            .state
            .read_const(0, 16)
            .unwrap();
        assert_eq!(read.offset().as_constant(), Some(0xcafe));
    }

    #[test]
    fn copy_in_refuses_read_only_modification() {
        let mut mm = MemoryManager::new();
        let mut space = AddressSpace::new();
        let mo = alloc(&mut mm, 4);
        let mut state = ObjectState::new(&mo, 4);
        state.set_read_only();
        space.bind_object(mo.clone(), state);

        let mut buffers = crate::externals::ExternalMemory::new();
        buffers.add_object(mo.segment(), 4);
        space.copy_out_concretes(&mut buffers);
        buffers.object_mut(mo.segment()).unwrap()[0] = 0xff;

        assert!(!space.copy_in_concretes(&buffers));
    }
}
