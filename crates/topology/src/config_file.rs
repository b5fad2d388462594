//! Parser for the attachment configuration file (`tsaConfigFile.txt`, §6).
//!
//! Two sections separated by a blank line: middleboxes first, sender
//! hosts second. Lines are `host_id switch_name mac_address`; `#`
//! starts a comment line.

use tsa_core::TsaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub host_id: String,
    pub switch_name: String,
    pub mac: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedConfig {
    pub middleboxes: Vec<ConfigEntry>,
    pub hosts: Vec<ConfigEntry>,
}

pub fn parse(contents: &str) -> Result<ParsedConfig, TsaError> {
    let mut parsed = ParsedConfig::default();
    let mut in_hosts_section = false;

    for line in contents.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            in_hosts_section = true;
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(TsaError::Config(format!(
                "malformed attachment config line: {}",
                line
            )));
        }

        let entry = ConfigEntry {
            host_id: fields[0].to_string(),
            switch_name: fields[1].to_string(),
            mac: fields[2].to_string(),
        };

        if in_hosts_section {
            parsed.hosts.push(entry);
        } else {
            parsed.middleboxes.push(entry);
        }
    }

    Ok(parsed)
}
