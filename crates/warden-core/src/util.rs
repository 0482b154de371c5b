//! Shared helpers: safe copies, expansion parsing, key and
//! untyped-metadata list manipulation.

use warden_proto::{Entity, REDACTED_SECRET};

use crate::error::{Result, TreeError};

/// Marker suffix that makes an untyped-meta key multi-valued.
pub const MULTIVALUE_MARKER: char = '*';

/// An expansion operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpansionOp {
    /// Pull in the target group's expansion.
    Include,
    /// Mask out the target group's expansion.
    Exclude,
    /// Remove existing rules referencing the target.
    Drop,
}

impl ExpansionOp {
    /// The wire spelling of this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpansionOp::Include => "INCLUDE",
            ExpansionOp::Exclude => "EXCLUDE",
            ExpansionOp::Drop => "DROP",
        }
    }
}

/// Parse an `OP:target` expansion token.
pub fn parse_expansion(raw: &str) -> Result<(ExpansionOp, &str)> {
    let (op, target) = raw
        .split_once(':')
        .ok_or_else(|| TreeError::MalformedExpansion(raw.to_string()))?;
    if target.is_empty() {
        return Err(TreeError::MalformedExpansion(raw.to_string()));
    }
    let op = match op {
        "INCLUDE" => ExpansionOp::Include,
        "EXCLUDE" => ExpansionOp::Exclude,
        "DROP" => ExpansionOp::Drop,
        _ => return Err(TreeError::MalformedExpansion(raw.to_string())),
    };
    Ok((op, target))
}

/// Deep-copy an entity for return outside the directory.
///
/// The verifier never leaves storage: the copy's secret is the literal
/// `<REDACTED>`.
pub fn safe_copy_entity(entity: &Entity) -> Entity {
    let mut copy = entity.clone();
    copy.secret = Some(REDACTED_SECRET.to_string());
    copy
}

/// Add a `TYPE:VALUE` key to a key list. The type is uppercased; exact
/// duplicates are ignored.
pub fn add_key(keys: &mut Vec<String>, keytype: &str, value: &str) {
    let entry = format!("{}:{}", keytype.to_uppercase(), value);
    if !keys.contains(&entry) {
        keys.push(entry);
    }
}

/// Remove keys whose value part starts with `value`.
///
/// Keys without a `TYPE:` prefix are matched on the whole string.
pub fn del_key(keys: &mut Vec<String>, value: &str) {
    keys.retain(|k| {
        let v = k.split_once(':').map(|(_, v)| v).unwrap_or(k.as_str());
        !v.starts_with(value)
    });
}

/// Whether an untyped-meta key is multi-valued.
fn is_multivalue(key: &str) -> bool {
    key.ends_with(MULTIVALUE_MARKER)
}

fn kv_key(entry: &str) -> &str {
    entry.split_once(':').map(|(k, _)| k).unwrap_or(entry)
}

/// Insert or replace a `key:value` pair.
///
/// Keys are unique, so an existing pair under the same key is replaced.
/// Keys ending in the multi-value marker accumulate instead: each upsert
/// appends, with exact duplicates ignored.
pub fn upsert_kv(list: &mut Vec<String>, key: &str, value: &str) {
    let entry = format!("{}:{}", key, value);
    if is_multivalue(key) {
        if !list.contains(&entry) {
            list.push(entry);
        }
        return;
    }
    if let Some(existing) = list.iter_mut().find(|e| kv_key(e) == key) {
        *existing = entry;
    } else {
        list.push(entry);
    }
}

/// Read `key:value` pairs. Key `*` reads everything.
pub fn read_kv(list: &[String], key: &str) -> Vec<String> {
    if key == "*" {
        return list.to_vec();
    }
    list.iter().filter(|e| kv_key(e) == key).cloned().collect()
}

/// Remove the pair matching both key and value exactly.
pub fn clear_exact_kv(list: &mut Vec<String>, key: &str, value: &str) {
    let entry = format!("{}:{}", key, value);
    list.retain(|e| *e != entry);
}

/// Remove every pair under a key, values ignored.
pub fn clear_fuzzy_kv(list: &mut Vec<String>, key: &str) {
    list.retain(|e| kv_key(e) != key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn expansion_parsing() {
        assert_eq!(
            parse_expansion("INCLUDE:ops").unwrap(),
            (ExpansionOp::Include, "ops")
        );
        assert_eq!(
            parse_expansion("EXCLUDE:interns").unwrap(),
            (ExpansionOp::Exclude, "interns")
        );
        assert_eq!(
            parse_expansion("DROP:gone").unwrap(),
            (ExpansionOp::Drop, "gone")
        );

        for bad in ["", "INCLUDE", "INCLUDE:", "include:ops", "GRANT:ops"] {
            assert!(matches!(
                parse_expansion(bad),
                Err(TreeError::MalformedExpansion(_))
            ));
        }
    }

    #[test]
    fn safe_copy_redacts_secret_only() {
        let mut e = Entity::with_id("foo");
        e.number = 3;
        e.secret = Some("verifier-material".to_string());
        e.keys.push("SIMPLE:KEYCODE".to_string());

        let copy = safe_copy_entity(&e);
        assert_eq!(copy.secret.as_deref(), Some(REDACTED_SECRET));
        assert_eq!(copy.id, e.id);
        assert_eq!(copy.number, e.number);
        assert_eq!(copy.keys, e.keys);
        // The original is untouched.
        assert_eq!(e.secret.as_deref(), Some("verifier-material"));
    }

    #[test]
    fn key_add_uppercases_and_dedupes() {
        let mut keys = Vec::new();
        add_key(&mut keys, "simple", "KEYCODE");
        add_key(&mut keys, "SIMPLE", "KEYCODE");
        assert_eq!(keys, vec!["SIMPLE:KEYCODE"]);
    }

    #[test]
    fn key_del_matches_value_prefix() {
        let mut keys = vec!["SIMPLE:KEYCODE".to_string(), "SSH:aaaa".to_string()];
        del_key(&mut keys, "KEY");
        assert_eq!(keys, vec!["SSH:aaaa"]);
        del_key(&mut keys, "zzz");
        assert_eq!(keys, vec!["SSH:aaaa"]);
    }

    #[test]
    fn kv_upsert_replaces_unique_keys() {
        let mut list = Vec::new();
        upsert_kv(&mut list, "k1", "v1");
        upsert_kv(&mut list, "k1", "v2");
        assert_eq!(list, vec!["k1:v2"]);
    }

    #[test]
    fn kv_multivalue_keys_accumulate() {
        let mut list = Vec::new();
        upsert_kv(&mut list, "phone*", "555-1234");
        upsert_kv(&mut list, "phone*", "555-9876");
        upsert_kv(&mut list, "phone*", "555-9876");
        assert_eq!(list, vec!["phone*:555-1234", "phone*:555-9876"]);
    }

    #[test]
    fn kv_read_star_returns_all() {
        let list = vec!["k1:v1".to_string(), "k2:v2".to_string()];
        assert_eq!(read_kv(&list, "*"), list);
        assert_eq!(read_kv(&list, "k2"), vec!["k2:v2"]);
        assert!(read_kv(&list, "k3").is_empty());
    }

    #[test]
    fn kv_clear_modes() {
        let mut list = vec![
            "phone*:555-1234".to_string(),
            "phone*:555-9876".to_string(),
            "k1:v1".to_string(),
        ];
        clear_exact_kv(&mut list, "phone*", "555-1234");
        assert_eq!(list, vec!["phone*:555-9876", "k1:v1"]);

        clear_fuzzy_kv(&mut list, "phone*");
        assert_eq!(list, vec!["k1:v1"]);
    }

    proptest! {
        #[test]
        fn prop_upsert_keeps_plain_keys_unique(values in prop::collection::vec("[a-z0-9]{1,8}", 1..20)) {
            let mut list = Vec::new();
            for v in &values {
                upsert_kv(&mut list, "k", v);
            }
            prop_assert_eq!(list.len(), 1);
            prop_assert_eq!(&list[0], &format!("k:{}", values.last().unwrap()));
        }

        #[test]
        fn prop_roundtrip_expansion(op in prop::sample::select(vec!["INCLUDE", "EXCLUDE", "DROP"]),
                                    target in "[a-z][a-z0-9-]{0,16}") {
            let raw = format!("{}:{}", op, target);
            let (parsed_op, parsed_target) = parse_expansion(&raw).unwrap();
            prop_assert_eq!(parsed_op.as_str(), op);
            prop_assert_eq!(parsed_target, target);
        }
    }
}
