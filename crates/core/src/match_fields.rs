use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single `(field_name, value)` constraint on packet headers.
///
/// `Ord` is derived field-then-value, which gives the lexicographic
/// sort the canonical policy-chain key requires (§3, §8: "Building the
/// canonical key is invariant under permutations of match-field input
/// order").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchField {
    pub name: String,
    pub value: String,
}

impl MatchField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Return `fields` sorted lexicographically by field name, then value.
pub fn sorted(fields: &[MatchField]) -> Vec<MatchField> {
    let mut out = fields.to_vec();
    out.sort();
    out
}

/// Expand user-supplied match fields with the derived fields required
/// by the OpenFlow match encoding (§3): a transport port implies
/// `nw_proto=6, dl_type=2048`; a network address implies `dl_type=2048`.
pub fn full_match_fields(fields: &[MatchField]) -> BTreeMap<String, String> {
    let mut full = BTreeMap::new();
    for f in fields {
        full.insert(f.name.clone(), f.value.clone());
        match f.name.as_str() {
            "tp_src" | "tp_dst" => {
                full.insert("nw_proto".to_string(), "6".to_string());
                full.insert("dl_type".to_string(), "2048".to_string());
            }
            "nw_src" | "nw_dst" => {
                full.insert("dl_type".to_string(), "2048".to_string());
            }
            _ => {}
        }
    }
    full
}

/// Encode sorted match fields into the `f1:v1*f2:v2*...` fragment of a
/// policy-chain key.
pub fn encode(fields: &[MatchField]) -> String {
    sorted(fields)
        .iter()
        .map(|f| format!("{}:{}", f.name, f.value))
        .collect::<Vec<_>>()
        .join("*")
}

/// Parse the `f1:v1*f2:v2*...` fragment of a policy-chain key back into
/// a match field list.
pub fn decode(encoded: &str) -> Vec<MatchField> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded
        .split('*')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, ':');
            let name = parts.next()?;
            let value = parts.next()?;
            Some(MatchField::new(name, value))
        })
        .collect()
}
