//! De-duplication of variant IDs by appending a numeric version suffix.
//!
//! Ported from `variant.version_id`: a duplicated ID keeps its first
//! occurrence unchanged and every later occurrence is renamed to
//! `{id}.{n}` for the smallest `n` that doesn't collide with anything
//! already used.

use std::collections::HashSet;

use crate::strucvars::merge::error::MergeError;

/// Rewrite `ids` in place so that every element is unique, given the set of
/// `existing` IDs that must also be avoided (may be empty).
///
/// IDs with no duplicate (in `ids` or `existing`) are returned verbatim.
/// This function is idempotent: running it twice on an already-unique list
/// is a no-op.
pub fn version_id(ids: &[String], existing: &HashSet<String>) -> Result<Vec<String>, MergeError> {
    let mut used: HashSet<String> = existing.clone();
    let mut out = Vec::with_capacity(ids.len());

    for id in ids {
        if !used.contains(id) {
            used.insert(id.clone());
            out.push(id.clone());
            continue;
        }

        let (stem, mut version) = match id.rsplit_once('.') {
            None => (id.as_str(), 1usize),
            Some((stem, suffix)) => match suffix.parse::<usize>() {
                Ok(n) => (stem, n + 1),
                Err(_) => return Err(MergeError::MalformedVersionSuffix(id.clone())),
            },
        };

        let mut new_id = format!("{stem}.{version}");
        while used.contains(&new_id) {
            version += 1;
            new_id = format!("{stem}.{version}");
        }

        used.insert(new_id.clone());
        out.push(new_id);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_duplicates_is_identity() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = version_id(&ids, &HashSet::new()).unwrap();
        assert_eq!(out, ids);
    }

    #[test]
    fn idempotent_on_already_unique_ids() {
        let ids = vec!["a".to_string(), "a.1".to_string()];
        let out = version_id(&ids, &HashSet::new()).unwrap();
        assert_eq!(out, ids);
        let out2 = version_id(&out, &HashSet::new()).unwrap();
        assert_eq!(out2, out);
    }

    #[test]
    fn duplicate_gets_versioned() {
        let ids = vec!["a".to_string(), "a".to_string(), "a".to_string()];
        let out = version_id(&ids, &HashSet::new()).unwrap();
        assert_eq!(out, vec!["a", "a.1", "a.2"]);
    }

    #[test]
    fn versioned_duplicate_increments_from_suffix() {
        let ids = vec!["a.1".to_string(), "a.1".to_string()];
        let out = version_id(&ids, &HashSet::new()).unwrap();
        assert_eq!(out, vec!["a.1", "a.2"]);
    }

    #[test]
    fn collision_with_existing_versions_is_skipped() {
        let mut existing = HashSet::new();
        existing.insert("a.2".to_string());
        let ids = vec!["a".to_string(), "a".to_string()];
        let out = version_id(&ids, &existing).unwrap();
        assert_eq!(out, vec!["a", "a.1"]);

        let ids2 = vec!["a".to_string(), "a".to_string(), "a".to_string()];
        let out2 = version_id(&ids2, &existing).unwrap();
        assert_eq!(out2, vec!["a", "a.1", "a.3"]);
    }

    #[test]
    fn collision_with_id_in_existing_set_triggers_versioning() {
        let mut existing = HashSet::new();
        existing.insert("a".to_string());
        let ids = vec!["a".to_string()];
        let out = version_id(&ids, &existing).unwrap();
        assert_eq!(out, vec!["a.1"]);
    }

    #[test]
    fn malformed_suffix_is_an_error() {
        let ids = vec!["a.x".to_string(), "a.x".to_string()];
        let err = version_id(&ids, &HashSet::new()).unwrap_err();
        assert!(matches!(err, MergeError::MalformedVersionSuffix(_)));
    }
}
