//! Policy-chain store (C5, §3): canonical key -> record, plus the
//! bidirectional PCID <-> key mapping and the two allocators.

use std::collections::HashMap;

use tsa_core::TsaError;

use crate::allocator::{PcidAllocator, VlanAllocator};
use crate::record::ChainRecord;

#[derive(Debug, Default)]
pub struct ChainStore {
    records: HashMap<String, ChainRecord>,
    pcid_to_key: HashMap<u32, String>,
    vlan_alloc: VlanAllocator,
    pcid_alloc: PcidAllocator,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_vlan(&mut self) -> u32 {
        self.vlan_alloc.allocate()
    }

    pub fn alloc_pcid(&mut self) -> u32 {
        self.pcid_alloc.allocate()
    }

    /// Peek the pcid the next `alloc_pcid()` call would return, without
    /// consuming it.
    pub fn peek_pcid(&self) -> u32 {
        self.pcid_alloc.peek()
    }

    pub fn get(&self, key: &str) -> Option<&ChainRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ChainRecord> {
        self.records.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Insert a record and bind it to `pcid`, overwriting any prior
    /// binding for that key.
    pub fn insert(&mut self, key: String, pcid: u32, record: ChainRecord) {
        self.pcid_to_key.insert(pcid, key.clone());
        self.records.insert(key, record);
    }

    pub fn remove(&mut self, key: &str) -> Option<ChainRecord> {
        if let Some(pcid) = self.pcid_of(key) {
            self.pcid_to_key.remove(&pcid);
        }
        self.records.remove(key)
    }

    /// Linear scan for the PCID bound to `key` (mirrors the original's
    /// `getPcid`, which scans the bidirectional map the same way).
    pub fn pcid_of(&self, key: &str) -> Option<u32> {
        self.pcid_to_key
            .iter()
            .find(|(_, k)| k.as_str() == key)
            .map(|(pcid, _)| *pcid)
    }

    pub fn key_of(&self, pcid: u32) -> Option<&str> {
        self.pcid_to_key.get(&pcid).map(String::as_str)
    }

    /// Re-bind `pcid` from `old_key` to `new_key`, moving the record
    /// across (§4.7: "move PCID to new key; delete old record").
    pub fn rekey(&mut self, old_key: &str, new_key: String, pcid: u32) -> Result<(), TsaError> {
        let record = self
            .records
            .remove(old_key)
            .ok_or_else(|| TsaError::NotFound(format!("policy-chain key {}", old_key)))?;
        self.pcid_to_key.insert(pcid, new_key.clone());
        self.records.insert(new_key, record);
        Ok(())
    }

    /// Keys of every record whose chain contains `middlebox` (§4.7
    /// unregister: "for every record whose chain contains m").
    pub fn keys_containing(&self, middlebox: &str) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, record)| record.chain.iter().any(|m| m == middlebox))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
