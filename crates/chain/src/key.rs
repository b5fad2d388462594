//! Canonical policy-chain key (§3): `"<sender>$<m1,...,mk>$<f1:v1*...>"`.
//!
//! The key is built from the user-declared chain (before DPI-instance
//! assignment), not the stored record's `chain` field — replacing the
//! DPI instance or unregistering a middlebox changes the record's
//! `chain` but the key only tracks the middleboxes the operator named.

use tsa_core::{match_fields, MatchField, TsaError};

/// Build the canonical key from a sender, the user-declared middlebox
/// list (no DPI instance), and match fields.
pub fn generate(sender: &str, user_chain: &[String], fields: &[MatchField]) -> String {
    format!(
        "{}${}${}",
        sender,
        user_chain.join(","),
        match_fields::encode(fields)
    )
}

/// Split a key into `(sender, user_chain, fields)`.
pub fn parse(key: &str) -> Result<(&str, Vec<String>, Vec<MatchField>), TsaError> {
    let parts: Vec<&str> = key.splitn(3, '$').collect();
    if parts.len() != 3 {
        return Err(TsaError::ParseError(format!("malformed policy-chain key: {}", key)));
    }
    let (sender, chain, fields) = (parts[0], parts[1], parts[2]);
    let user_chain = if chain.is_empty() {
        Vec::new()
    } else {
        chain.split(',').map(str::to_string).collect()
    };
    Ok((sender, user_chain, match_fields::decode(fields)))
}

/// Recompute a key with `middlebox` removed from its user-chain segment
/// (§4.7 unregister: "compute the new key").
pub fn without_middlebox(key: &str, middlebox: &str) -> Result<String, TsaError> {
    let (sender, chain, fields) = parse(key)?;
    let new_chain: Vec<String> = chain.into_iter().filter(|m| m != middlebox).collect();
    Ok(generate(sender, &new_chain, &fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_order_invariant_over_match_fields() {
        let a = generate(
            "h1",
            &["m2".to_string(), "m3".to_string()],
            &[MatchField::new("tp_dst", "80"), MatchField::new("dl_src", "aa")],
        );
        let b = generate(
            "h1",
            &["m2".to_string(), "m3".to_string()],
            &[MatchField::new("dl_src", "aa"), MatchField::new("tp_dst", "80")],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn parse_roundtrips_generate() {
        let key = generate(
            "h1",
            &["m2".to_string(), "m3".to_string()],
            &[MatchField::new("tp_dst", "80")],
        );
        let (sender, chain, fields) = parse(&key).unwrap();
        assert_eq!(sender, "h1");
        assert_eq!(chain, vec!["m2".to_string(), "m3".to_string()]);
        assert_eq!(fields, vec![MatchField::new("tp_dst", "80")]);
    }

    #[test]
    fn without_middlebox_drops_only_the_named_one() {
        let key = generate(
            "h1",
            &["m2".to_string(), "m3".to_string()],
            &[MatchField::new("tp_dst", "80")],
        );
        let rewritten = without_middlebox(&key, "m3").unwrap();
        let (sender, chain, _) = parse(&rewritten).unwrap();
        assert_eq!(sender, "h1");
        assert_eq!(chain, vec!["m2".to_string()]);
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(parse("onlyonepart").is_err());
    }
}
