use rustc_hash::FxHashMap;

/// Fake base for marshalled buffers; segments map to disjoint windows so
/// every (segment, offset) has a stable flat address for the callee.
const HOST_WINDOW_BASE: u64 = 0x7f00_0000_0000;
const HOST_WINDOW_SIZE: u64 = 1 << 24;

#[derive(thiserror::Error, Debug)]
pub enum ExternalCallError {
    #[error("failed external call: {0}")]
    Failed(String),

    #[error("external function not found: {0}")]
    UnknownSymbol(String),
}

/// The flat memory view an external call sees: one buffer per marshalled
/// segment, addressable both by segment and by fake host address.
#[derive(Debug, Default)]
pub struct ExternalMemory {
    buffers: FxHashMap<u64, Vec<u8>>,
}

impl ExternalMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, segment: u64, size: usize) {
        self.buffers.entry(segment).or_insert_with(|| vec![0; size]);
    }

    pub fn object(&self, segment: u64) -> Option<&Vec<u8>> {
        self.buffers.get(&segment)
    }

    pub fn object_mut(&mut self, segment: u64) -> Option<&mut Vec<u8>> {
        self.buffers.get_mut(&segment)
    }

    /// The flat address of `(segment, offset)` in the callee's view.
    pub fn host_address(&self, segment: u64, offset: u64) -> u64 {
        HOST_WINDOW_BASE + segment * HOST_WINDOW_SIZE + offset
    }

    /// Translate a flat address back into one of the marshalled buffers.
    pub fn at_address(&mut self, address: u64) -> Option<(&mut Vec<u8>, u64)> {
        if address < HOST_WINDOW_BASE {
            return None;
        }
        let segment = (address - HOST_WINDOW_BASE) / HOST_WINDOW_SIZE;
        let offset = (address - HOST_WINDOW_BASE) % HOST_WINDOW_SIZE;
        self.buffers.get_mut(&segment).map(|buf| (buf, offset))
    }

    pub fn segments(&self) -> impl Iterator<Item = &u64> {
        self.buffers.keys()
    }
}

/// Resolves names to native symbols and performs concrete calls over
/// marshalled argument buffers. Pointer arguments arrive as flat addresses
/// inside the provided [`ExternalMemory`].
pub trait ExternalDispatcher {
    /// Whether `name` resolves to a callable symbol.
    fn resolves(&self, name: &str) -> bool;

    /// Whether a call to `name` is known side-effect free. Gates the
    /// `Pure` external-call policy.
    fn is_pure(&self, _name: &str) -> bool {
        false
    }

    fn call(
        &mut self,
        name: &str,
        args: &[u64],
        memory: &mut ExternalMemory,
    ) -> Result<u64, ExternalCallError>;

    /// The errno value after the last call.
    fn errno(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_addresses_round_trip() {
        let mut memory = ExternalMemory::new();
        memory.add_object(5, 16);
        let address = memory.host_address(5, 12);
        let (buffer, offset) = memory.at_address(address).expect("translation");
        assert_eq!(buffer.len(), 16);
        assert_eq!(offset, 12);
    }

    #[test]
    fn unknown_addresses_do_not_translate() {
        let mut memory = ExternalMemory::new();
        memory.add_object(1, 4);
        assert!(memory.at_address(0x1000).is_none());
        let bogus = memory.host_address(9, 0);
        assert!(memory.at_address(bogus).is_none());
    }
}
