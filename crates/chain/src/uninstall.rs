//! Uninstall (§4.8): walk a record's install trail and reverse it.

use tracing::warn;
use tsa_core::MatchField;

use crate::installer::FlowInstaller;
use crate::record::{as_sentinel, ChainRecord};

/// Delete every flow a record's trail recorded: the first non-sentinel
/// entry (the switch adjacent to the sender host) via delete-by-match,
/// every subsequent non-sentinel entry via delete-by-vlan.
pub async fn uninstall(record: &ChainRecord, fields: &[MatchField], installer: &dyn FlowInstaller) {
    let mut seen_first = false;
    for entry in &record.install_trail {
        if as_sentinel(entry).is_some() {
            continue;
        }
        if !seen_first {
            seen_first = true;
            if let Err(e) = installer.delete_by_match_fields(entry, fields).await {
                warn!(dpid = %entry, error = %e, "failed to uninstall match-fields rule");
            }
        } else if let Err(e) = installer.delete_by_vlan(entry, record.vlan_id).await {
            warn!(dpid = %entry, error = %e, "failed to uninstall vlan rule");
        }
    }
}
