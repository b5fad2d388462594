//! Attachment registry (C3, §4.3): maps middlebox/host names to the
//! switch port they're physically attached to.

use std::collections::HashMap;

use tracing::{debug, warn};
use tsa_core::TsaError;

use crate::config_file::{self, ConfigEntry};
use crate::loader::find_switch_by_name;
use crate::rest::{FlowEntry, SwitchEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub dpid: String,
    pub port: u32,
}

/// Middlebox (`m<k>`) and sender-host (`h<k>`) attachments, and whether
/// the registry has at least one of each (§4.3: "defers policy commands
/// until at least one middlebox and one sender host entry exist").
#[derive(Debug, Clone, Default)]
pub struct AttachmentRegistry {
    pub middleboxes: HashMap<String, Attachment>,
    pub hosts: HashMap<String, Attachment>,
}

impl AttachmentRegistry {
    pub fn is_ready(&self) -> bool {
        !self.middleboxes.is_empty() && !self.hosts.is_empty()
    }

    pub async fn load(
        client: &reqwest::Client,
        base_url: &str,
        switches: &[SwitchEntry],
        config_contents: &str,
    ) -> Result<Self, TsaError> {
        let parsed = config_file::parse(config_contents)?;
        let mut registry = AttachmentRegistry::default();

        for entry in &parsed.middleboxes {
            let name = format!("m{}", entry.host_id);
            if let Some(attachment) = resolve_attachment(client, base_url, switches, entry).await? {
                registry.middleboxes.insert(name, attachment);
            } else {
                warn!(middlebox = %name, "attachment not resolved, registry not ready");
            }
        }

        for entry in &parsed.hosts {
            let name = format!("h{}", entry.host_id);
            if let Some(attachment) = resolve_attachment(client, base_url, switches, entry).await? {
                registry.hosts.insert(name, attachment);
            } else {
                warn!(host = %name, "attachment not resolved, registry not ready");
            }
        }

        Ok(registry)
    }
}

async fn resolve_attachment(
    client: &reqwest::Client,
    base_url: &str,
    switches: &[SwitchEntry],
    entry: &ConfigEntry,
) -> Result<Option<Attachment>, TsaError> {
    let Some(dpid) = find_switch_by_name(switches, &entry.switch_name) else {
        debug!(switch = %entry.switch_name, "no switch matched prefix");
        return Ok(None);
    };
    let dpid = dpid.to_string();

    let dpid_decimal = u64::from_str_radix(&dpid, 16)
        .map_err(|e| TsaError::Config(format!("invalid dpid {}: {}", dpid, e)))?;

    let url = format!("{}/stats/flow/{}", base_url, dpid_decimal);
    let response: HashMap<String, Vec<FlowEntry>> = client.get(&url).send().await?.json().await?;

    let Some(rules) = response.get(&dpid_decimal.to_string()) else {
        return Ok(None);
    };

    let port = rules.iter().find_map(|rule| {
        let dl_dst = rule.match_.get("dl_dst")?;
        if dl_dst != &entry.mac {
            return None;
        }
        let action = rule.actions.first()?;
        parse_output_port(action)
    });

    Ok(port.map(|port| Attachment { dpid, port }))
}

/// Parse the port number out of an action's textual form (§6: "the port
/// is parsed from the textual form by skipping the first 7
/// characters", e.g. `"OUTPUT:3"` -> `3`).
fn parse_output_port(action: &str) -> Option<u32> {
    action.get(7..)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_output_action_port() {
        assert_eq!(parse_output_port("OUTPUT:3"), Some(3));
        assert_eq!(parse_output_port("OUTPUT:42"), Some(42));
    }

    #[test]
    fn rejects_short_or_malformed_actions() {
        assert_eq!(parse_output_port("OUT"), None);
        assert_eq!(parse_output_port("STRIP_V"), None);
    }

    #[test]
    fn readiness_requires_both_namespaces() {
        let mut registry = AttachmentRegistry::default();
        assert!(!registry.is_ready());
        registry.hosts.insert(
            "h1".to_string(),
            Attachment {
                dpid: "s1".to_string(),
                port: 1,
            },
        );
        assert!(!registry.is_ready());
        registry.middleboxes.insert(
            "m1".to_string(),
            Attachment {
                dpid: "s2".to_string(),
                port: 2,
            },
        );
        assert!(registry.is_ready());
    }
}
