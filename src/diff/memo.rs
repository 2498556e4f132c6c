use super::lines::{LineError, process_line_changes_with_context};
use super::side_by_side::process_side_by_side_changes;
use super::types::{Change, DiffLineData, DiffMode, SideBySideRowData};
use crate::lru::Lru;
use std::sync::Arc;
use xxhash_rust::xxh64::Xxh64;

type MemoKey = (u64, DiffMode, usize);

/// Memoizes line reconstruction keyed by a content fingerprint of the changes.
///
/// Purely an optimization: every result can be recomputed from its inputs.
pub struct ReconstructionMemo {
    context_size: usize,
    unified: Lru<MemoKey, Arc<Vec<DiffLineData>>>,
    side_by_side: Lru<MemoKey, Arc<Vec<SideBySideRowData>>>,
}

impl ReconstructionMemo {
    pub fn new(capacity: usize, context_size: usize) -> Self {
        Self {
            context_size,
            unified: Lru::new(capacity),
            side_by_side: Lru::new(capacity),
        }
    }

    pub fn unified(
        &mut self,
        changes: &[Change],
        mode: DiffMode,
    ) -> Result<Arc<Vec<DiffLineData>>, LineError> {
        let key = (fingerprint(changes), mode, self.context_size);
        self.unified_for_key(key, changes)
    }

    pub fn side_by_side(
        &mut self,
        changes: &[Change],
        mode: DiffMode,
    ) -> Result<Arc<Vec<SideBySideRowData>>, LineError> {
        let key = (fingerprint(changes), mode, self.context_size);
        if let Some(rows) = self.side_by_side.get(&key) {
            return Ok(Arc::clone(rows));
        }

        let lines = self.unified_for_key(key, changes)?;
        let rows = Arc::new(process_side_by_side_changes(&lines));
        self.side_by_side.insert(key, Arc::clone(&rows));
        Ok(rows)
    }

    pub fn len(&self) -> usize {
        self.unified.len() + self.side_by_side.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.unified.clear();
        self.side_by_side.clear();
    }

    fn unified_for_key(
        &mut self,
        key: MemoKey,
        changes: &[Change],
    ) -> Result<Arc<Vec<DiffLineData>>, LineError> {
        if let Some(lines) = self.unified.get(&key) {
            return Ok(Arc::clone(lines));
        }

        let lines = Arc::new(process_line_changes_with_context(
            changes,
            key.1,
            self.context_size,
        )?);
        self.unified.insert(key, Arc::clone(&lines));
        Ok(lines)
    }
}

/// Structural xxh64 hash of a change sequence, nested parts included
pub fn fingerprint(changes: &[Change]) -> u64 {
    let mut hasher = Xxh64::new(0);
    hash_changes(&mut hasher, changes);
    hasher.digest()
}

fn hash_changes(hasher: &mut Xxh64, changes: &[Change]) {
    hasher.update(&(changes.len() as u64).to_le_bytes());
    for change in changes {
        hasher.update(&(change.value.len() as u64).to_le_bytes());
        hasher.update(change.value.as_bytes());
        hasher.update(&[u8::from(change.added), u8::from(change.removed)]);
        match change.count {
            Some(count) => {
                hasher.update(&[1]);
                hasher.update(&(count as u64).to_le_bytes());
            }
            None => hasher.update(&[0]),
        }
        match &change.parts {
            Some(parts) => {
                hasher.update(&[1]);
                hash_changes(hasher, parts);
            }
            None => hasher.update(&[0]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute::compute_changes;

    #[test]
    fn test_fingerprint_is_structural() {
        let a = vec![Change::unchanged("ab", 1)];
        let b = vec![Change::unchanged("a", 1), Change::unchanged("b", 1)];
        let c = vec![Change::added("ab", 1)];
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));

        let with_parts = vec![Change::added("ab", 1).with_parts(vec![Change::added("ab", 1)])];
        assert_ne!(fingerprint(&c), fingerprint(&with_parts));
    }

    #[test]
    fn test_memo_reuses_results() {
        let mut memo = ReconstructionMemo::new(4, 3);
        let changes = compute_changes(DiffMode::Smart, "a\nb\n", "a\nc\n");

        let first = memo.unified(&changes, DiffMode::Smart).unwrap();
        let second = memo.unified(&changes.clone(), DiffMode::Smart).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let rows = memo.side_by_side(&changes, DiffMode::Smart).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(memo.len(), 2);

        // a different mode is a different entry
        let words = memo.unified(&changes, DiffMode::Words).unwrap();
        assert!(!Arc::ptr_eq(&first, &words));

        memo.clear();
        assert!(memo.is_empty());
    }

    #[test]
    fn test_memo_propagates_invariant_violations() {
        let mut memo = ReconstructionMemo::new(4, 3);
        let mut bad = Change::added("x", 1);
        bad.removed = true;
        assert!(memo.side_by_side(&[bad], DiffMode::Lines).is_err());
        assert!(memo.is_empty());
    }
}
