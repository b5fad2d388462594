//! Monotonic VLAN / PCID allocators (C4, §4.4).
//!
//! Both counters are seeded once and never reclaim a value, by design
//! (§9: "VLAN IDs are allocated monotonically and never reclaimed; a
//! long-running TSA will exhaust the 12-bit VLAN space"). A future
//! revision could reclaim on remove; this implementation documents the
//! limit instead of working around it, per the open question in §9.

/// Issues VLAN ids starting at 1, never reused within the process
/// lifetime. A process that adds and removes ~4000 chains will exhaust
/// the 12-bit VLAN space and start handing out unusable ids; this is a
/// known limitation carried over from the source design, not a bug in
/// this allocator.
#[derive(Debug, Clone)]
pub struct VlanAllocator {
    next: u32,
}

impl Default for VlanAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl VlanAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Issues policy-chain ids starting at 0. Stable across rewrites: a
/// PCID is assigned once at chain creation and survives unregister /
/// replace-DPI-instance mutations (§3).
#[derive(Debug, Clone)]
pub struct PcidAllocator {
    next: u32,
}

impl Default for PcidAllocator {
    fn default() -> Self {
        Self { next: 0 }
    }
}

impl PcidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pcid the next `allocate()` would return, without consuming
    /// it. Used when a pcid must be quoted to a peer before the
    /// operation that earns it is known to succeed (§4.9
    /// `addpolicychain`: the pcid is sent to the DPI controller before
    /// the chain is committed to the store).
    pub fn peek(&self) -> u32 {
        self.next
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlan_ids_start_at_one_and_are_monotonic() {
        let mut alloc = VlanAllocator::new();
        assert_eq!(alloc.allocate(), 1);
        assert_eq!(alloc.allocate(), 2);
        assert_eq!(alloc.allocate(), 3);
    }

    #[test]
    fn pcids_start_at_zero_and_are_monotonic() {
        let mut alloc = PcidAllocator::new();
        assert_eq!(alloc.allocate(), 0);
        assert_eq!(alloc.allocate(), 1);
    }
}
