//! Policy-chain record (§3): `(full_chain_with_dpi, vlan_id, install_trail)`.

use serde::Serialize;

/// The value half of the policy-chain store. `chain` is `[dpi_instance,
/// m_i1, ..., m_ik]` — the DPI instance occupies slot 0 once the DPI
/// controller has assigned one. `install_trail` interleaves `$name`
/// sentinel markers (sender, then each middlebox) with the dpids of
/// every switch a rule was installed on, in installation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainRecord {
    pub chain: Vec<String>,
    pub vlan_id: u32,
    pub install_trail: Vec<String>,
}

impl ChainRecord {
    pub fn new(sender: &str, chain: Vec<String>, vlan_id: u32) -> Self {
        Self {
            chain,
            vlan_id,
            install_trail: vec![sentinel(sender)],
        }
    }
}

/// Format a boundary marker for the install trail (§4.6 step 3, §4.7).
pub fn sentinel(name: &str) -> String {
    format!("${}", name)
}

/// `Some(name)` if `entry` is a sentinel marker, else `None`.
pub fn as_sentinel(entry: &str) -> Option<&str> {
    entry.strip_prefix('$')
}
