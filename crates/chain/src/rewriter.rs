//! Chain rewriter (C8, §4.7): unregister-middlebox and
//! replace-DPI-instance flows. Both uninstall the affected trail,
//! mutate the chain, and recompile in place.

use tracing::warn;
use tsa_core::TsaError;
use tsa_graph::GraphStore;
use tsa_topology::AttachmentRegistry;

use crate::compiler::ChainCompiler;
use crate::installer::FlowInstaller;
use crate::key;
use crate::store::ChainStore;
use crate::uninstall::uninstall;

/// Unregister `middlebox` from every policy chain that contains it.
/// Failures are accumulated per affected key rather than aborting the
/// whole sweep (§4.7, §7: "Failures are accumulated and reported per
/// affected chain"; narrowed from the source's bare `except:` to the
/// `TsaError` surface, per the design note in §9).
pub async fn unregister_middlebox(
    middlebox: &str,
    store: &mut ChainStore,
    graph: &mut GraphStore,
    registry: &AttachmentRegistry,
    installer: &dyn FlowInstaller,
) -> Vec<(String, TsaError)> {
    let mut failures = Vec::new();

    for old_key in store.keys_containing(middlebox) {
        let Some(pcid) = store.pcid_of(&old_key) else {
            warn!(key = %old_key, "no pcid bound to policy-chain key during unregister");
            continue;
        };
        let (sender, _, fields) = match key::parse(&old_key) {
            Ok(parsed) => parsed,
            Err(e) => {
                failures.push((old_key, e));
                continue;
            }
        };
        let sender = sender.to_string();

        let Some(record) = store.remove(&old_key) else {
            continue;
        };
        uninstall(&record, &fields, installer).await;

        let new_chain: Vec<String> = record.chain.into_iter().filter(|m| m != middlebox).collect();
        let new_key = match key::without_middlebox(&old_key, middlebox) {
            Ok(k) => k,
            Err(e) => {
                failures.push((old_key, e));
                continue;
            }
        };

        let mut compiler = ChainCompiler::new(graph, registry, installer);
        match compiler.compile(&sender, &new_chain, &fields, record.vlan_id).await {
            Ok(new_record) => store.insert(new_key, pcid, new_record),
            Err(e) => failures.push((old_key, e)),
        }
    }

    failures
}

/// Replace the DPI instance of the record identified by `pcid` with
/// `new_instance` (§4.7).
pub async fn replace_dpi_instance(
    pcid: u32,
    new_instance: &str,
    store: &mut ChainStore,
    graph: &mut GraphStore,
    registry: &AttachmentRegistry,
    installer: &dyn FlowInstaller,
) -> Result<(), TsaError> {
    let key = store
        .key_of(pcid)
        .map(str::to_string)
        .ok_or_else(|| TsaError::NotFound(format!("pcid {}", pcid)))?;
    let (sender, _, fields) = key::parse(&key)?;
    let sender = sender.to_string();

    let record = store
        .remove(&key)
        .ok_or_else(|| TsaError::NotFound(format!("policy-chain key {}", key)))?;
    uninstall(&record, &fields, installer).await;

    let mut new_chain = record.chain;
    if let Some(first) = new_chain.first_mut() {
        *first = new_instance.to_string();
    } else {
        new_chain.push(new_instance.to_string());
    }

    let mut compiler = ChainCompiler::new(graph, registry, installer);
    let new_record = compiler.compile(&sender, &new_chain, &fields, record.vlan_id).await?;
    store.insert(key, pcid, new_record);
    Ok(())
}
