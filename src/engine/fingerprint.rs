//! Symbol fingerprints for blast-radius diffing.
//!
//! Symbol row ids are not stable across re-extractions, so change
//! detection compares fingerprints instead: an identity key
//! `(name, kind, parent symbol id or 0)` paired with a signature hash
//! computed deterministically from the symbol's declared shape (name,
//! kind, visibility, modifiers, ordered members, ordered parameters,
//! ordered type parameters). Same key + same hash means the declaration
//! is unchanged as far as other files can observe.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::store::{SymbolRecord, SymbolRow};

/// Cross-run identity of a symbol within its file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub name: String,
    pub kind: crate::models::SymbolKind,
    pub parent_symbol_id: i64,
}

/// One symbol's stable handle: identity plus signature hash, along with
/// the row id it had when captured.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub key: IdentityKey,
    pub signature_hash: String,
    pub symbol_id: i64,
}

/// Compute the signature hash for a pending symbol.
///
/// Dependent rows are hashed in their recorded order, which extraction
/// guarantees to be source order, so the hash is deterministic for a
/// given file content.
pub fn signature_hash(symbol: &SymbolRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(symbol.name.as_bytes());
    hasher.update([0]);
    hasher.update(symbol.kind.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(symbol.visibility.as_str().as_bytes());
    hasher.update([0]);
    for modifier in &symbol.modifiers {
        hasher.update(modifier.as_bytes());
        hasher.update([1]);
    }
    hasher.update([0]);
    for member in &symbol.members {
        hasher.update(member.name.as_bytes());
        hasher.update([1]);
        hasher.update(member.kind.as_str().as_bytes());
        hasher.update([1]);
        hasher.update(member.type_expr.as_bytes());
        hasher.update([1]);
        hasher.update(member.visibility.as_str().as_bytes());
        hasher.update([2]);
    }
    hasher.update([0]);
    for param in &symbol.params {
        hasher.update(param.ordinal.to_le_bytes());
        hasher.update(param.name.as_bytes());
        hasher.update([1]);
        hasher.update(param.type_expr.as_bytes());
        hasher.update([1]);
        hasher.update([param.is_receiver as u8, param.is_return as u8, 2]);
    }
    hasher.update([0]);
    for type_param in &symbol.type_params {
        hasher.update(type_param.ordinal.to_le_bytes());
        hasher.update(type_param.name.as_bytes());
        hasher.update([1]);
        hasher.update(type_param.constraints.as_bytes());
        hasher.update([2]);
    }

    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Fingerprints of symbols already in the store, keyed as captured.
pub fn from_rows(rows: &[SymbolRow]) -> Vec<Fingerprint> {
    rows.iter()
        .map(|row| Fingerprint {
            key: IdentityKey {
                name: row.name.clone(),
                kind: row.kind,
                parent_symbol_id: row.parent_symbol_id.unwrap_or(0),
            },
            signature_hash: row.signature_hash.clone(),
            symbol_id: row.id,
        })
        .collect()
}

/// Fingerprints of a fresh extraction, using the just-assigned row ids.
pub fn from_extraction(symbols: &[SymbolRecord], symbol_ids: &[i64]) -> Vec<Fingerprint> {
    symbols
        .iter()
        .zip(symbol_ids)
        .map(|(symbol, &symbol_id)| Fingerprint {
            key: IdentityKey {
                name: symbol.name.clone(),
                kind: symbol.kind,
                parent_symbol_id: symbol
                    .parent
                    .map(|index| symbol_ids[index])
                    .unwrap_or(0),
            },
            signature_hash: symbol.signature_hash.clone(),
            symbol_id,
        })
        .collect()
}

/// Outcome of diffing old vs new fingerprints by identity key.
#[derive(Debug, Default)]
pub struct FingerprintDiff {
    /// Old symbol ids whose identity disappeared or whose signature
    /// changed. Files referencing these need re-resolution.
    pub invalidated_old_ids: Vec<i64>,
    /// Whether any identity was added or removed (drives the
    /// package-import part of the blast radius).
    pub set_changed: bool,
}

/// Diff two fingerprint captures. The comparison is keyed on identity
/// and is commutative over the order symbols were captured in.
pub fn diff(old: &[Fingerprint], new: &[Fingerprint]) -> FingerprintDiff {
    let new_by_key: HashMap<&IdentityKey, &Fingerprint> =
        new.iter().map(|fp| (&fp.key, fp)).collect();
    let old_keys: std::collections::HashSet<&IdentityKey> =
        old.iter().map(|fp| &fp.key).collect();

    let mut invalidated = Vec::new();
    let mut removed_any = false;
    for fingerprint in old {
        match new_by_key.get(&fingerprint.key) {
            None => {
                removed_any = true;
                invalidated.push(fingerprint.symbol_id);
            }
            Some(counterpart) if counterpart.signature_hash != fingerprint.signature_hash => {
                invalidated.push(fingerprint.symbol_id);
            }
            Some(_) => {}
        }
    }

    let added_any = new.iter().any(|fp| !old_keys.contains(&fp.key));

    FingerprintDiff {
        invalidated_old_ids: invalidated,
        set_changed: removed_any || added_any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Span, SymbolKind, Visibility};
    use crate::store::{MemberRecord, ParamRecord, SymbolRecord};

    fn record(name: &str) -> SymbolRecord {
        SymbolRecord::new(name, SymbolKind::Function, Visibility::Public, Span::new(0, 0, 1, 0))
    }

    fn fingerprint(name: &str, sig: &str, id: i64) -> Fingerprint {
        Fingerprint {
            key: IdentityKey {
                name: name.to_string(),
                kind: SymbolKind::Function,
                parent_symbol_id: 0,
            },
            signature_hash: sig.to_string(),
            symbol_id: id,
        }
    }

    #[test]
    fn hash_is_deterministic_and_position_independent() {
        let mut a = record("serve");
        a.span = Span::new(0, 0, 5, 0);
        let mut b = record("serve");
        b.span = Span::new(40, 0, 45, 0);
        assert_eq!(signature_hash(&a), signature_hash(&b));
    }

    #[test]
    fn hash_changes_with_params_and_members() {
        let base = record("serve");
        let mut with_param = record("serve");
        with_param.params.push(ParamRecord {
            ordinal: 0,
            name: "addr".to_string(),
            type_expr: "string".to_string(),
            is_receiver: false,
            is_return: false,
        });
        assert_ne!(signature_hash(&base), signature_hash(&with_param));

        let mut with_member = record("serve");
        with_member.members.push(MemberRecord {
            name: "x".to_string(),
            kind: crate::models::MemberKind::Field,
            type_expr: "int".to_string(),
            visibility: Visibility::Public,
        });
        assert_ne!(signature_hash(&base), signature_hash(&with_member));
    }

    #[test]
    fn diff_flags_removed_and_signature_changed() {
        let old = vec![
            fingerprint("kept", "s1", 1),
            fingerprint("removed", "s2", 2),
            fingerprint("changed", "s3", 3),
        ];
        let new = vec![
            fingerprint("kept", "s1", 11),
            fingerprint("changed", "s3-new", 13),
        ];

        let diff = diff(&old, &new);
        assert_eq!(diff.invalidated_old_ids, vec![2, 3]);
        assert!(diff.set_changed);
    }

    #[test]
    fn diff_is_quiet_when_nothing_changed() {
        let old = vec![fingerprint("same", "s1", 1)];
        let new = vec![fingerprint("same", "s1", 21)];
        let diff = diff(&old, &new);
        assert!(diff.invalidated_old_ids.is_empty());
        assert!(!diff.set_changed);
    }

    #[test]
    fn added_symbol_marks_set_changed_without_invalidations() {
        let old = vec![fingerprint("a", "s1", 1)];
        let new = vec![fingerprint("a", "s1", 11), fingerprint("b", "s2", 12)];
        let diff = diff(&old, &new);
        assert!(diff.invalidated_old_ids.is_empty());
        assert!(diff.set_changed);
    }
}
