//! Parsers for the free-form FE/DPI-controller command bodies (§6:
//! "each with a free-form string argument parsed by regex
//! `"(chain){matchfields}"`").

use tsa_core::{MatchField, TsaError};

/// Parse `"h1,m2,m3 {tp_dst=80, dl_src=aa}"` into `(sender,
/// user_chain, fields)`. An empty match-field body is rejected — the
/// original's key builder indexes into the (sorted) match-field list
/// unconditionally and throws on an empty one (§8 scenario 5: "empty
/// match: parser ... causing a key-generation error").
pub fn parse_chain_command(body: &str) -> Result<(String, Vec<String>, Vec<MatchField>), TsaError> {
    let open = body
        .find('{')
        .ok_or_else(|| TsaError::ParseError("missing '{' in command body".to_string()))?;
    let close = body
        .find('}')
        .filter(|&c| c > open)
        .ok_or_else(|| TsaError::ParseError("missing '}' in command body".to_string()))?;

    let chain_part = body[..open].trim();
    let fields_part = &body[open + 1..close];

    let mut names: Vec<String> = chain_part
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(TsaError::ParseError("empty policy chain".to_string()));
    }
    let sender = names.remove(0);

    let fields = parse_match_fields(fields_part);
    if fields.is_empty() {
        return Err(TsaError::ParseError("empty match fields".to_string()));
    }

    Ok((sender, names, fields))
}

/// Parse `"key1=value1, key2=value2"` into match fields.
fn parse_match_fields(fields: &str) -> Vec<MatchField> {
    fields
        .split(',')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let mut parts = pair.splitn(2, '=');
            let name = parts.next()?.trim();
            let value = parts.next()?.trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(MatchField::new(name, value))
        })
        .collect()
}

/// Parse `"<newInstance> <pcid>"` — exactly two whitespace-separated
/// tokens (§9: flagged as a deliberately separate parser from
/// [`parse_chain_command`], since the DPI controller's
/// `replacedpiinstancecommand` body never carries a sender host).
pub fn parse_replace_command(body: &str) -> Result<(String, u32), TsaError> {
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let [instance, pcid] = tokens.as_slice() else {
        return Err(TsaError::ParseError(format!(
            "expected '<newInstance> <pcid>', got: {}",
            body
        )));
    };
    let pcid: u32 = pcid
        .parse()
        .map_err(|_| TsaError::ParseError(format!("invalid pcid: {}", pcid)))?;
    Ok((instance.to_string(), pcid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chain_and_match_fields() {
        let (sender, chain, fields) = parse_chain_command("h1, m2, m3 {tp_dst=80}").unwrap();
        assert_eq!(sender, "h1");
        assert_eq!(chain, vec!["m2".to_string(), "m3".to_string()]);
        assert_eq!(fields, vec![MatchField::new("tp_dst", "80")]);
    }

    #[test]
    fn rejects_empty_match_fields() {
        assert!(parse_chain_command("h1 {}").is_err());
    }

    #[test]
    fn rejects_missing_braces() {
        assert!(parse_chain_command("h1,m2,m3").is_err());
    }

    #[test]
    fn parses_replace_command() {
        let (instance, pcid) = parse_replace_command("m7 0").unwrap();
        assert_eq!(instance, "m7");
        assert_eq!(pcid, 0);
    }

    #[test]
    fn rejects_malformed_replace_command() {
        assert!(parse_replace_command("m7").is_err());
        assert!(parse_replace_command("m7 0 extra").is_err());
    }
}
