use super::types::{Change, DiffMode};
use similar::{Algorithm, ChangeTag, TextDiff};

/// Compute the change sequence between `old` and `new` at the requested granularity
pub fn compute_changes(mode: DiffMode, old: &str, new: &str) -> Vec<Change> {
    match mode {
        DiffMode::Lines => line_changes(old, new),
        DiffMode::Words => {
            let diff = TextDiff::configure()
                .algorithm(Algorithm::Myers)
                .diff_words(old, new);
            collect_changes(&diff)
        }
        DiffMode::Chars => {
            let diff = TextDiff::configure()
                .algorithm(Algorithm::Myers)
                .diff_chars(old, new);
            collect_changes(&diff)
        }
        DiffMode::Json => json_changes(old, new),
        DiffMode::Smart => smart_changes(old, new),
    }
}

/// Serialize a change sequence the way it crosses the worker boundary
pub fn encode_changes(changes: &[Change]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(changes)
}

pub fn decode_changes(bytes: &[u8]) -> Result<Vec<Change>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

fn line_changes(old: &str, new: &str) -> Vec<Change> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old, new);
    collect_changes(&diff)
}

/// Merge runs of equally tagged tokens into one `Change` each
fn collect_changes<'a>(diff: &TextDiff<'a, 'a, 'a, str>) -> Vec<Change> {
    let mut changes: Vec<Change> = Vec::new();

    for change in diff.iter_all_changes() {
        let (added, removed) = match change.tag() {
            ChangeTag::Insert => (true, false),
            ChangeTag::Delete => (false, true),
            ChangeTag::Equal => (false, false),
        };

        match changes.last_mut() {
            Some(last) if last.added == added && last.removed == removed => {
                last.value.push_str(change.value());
                last.count = Some(last.count.unwrap_or(0) + 1);
            }
            _ => changes.push(Change {
                value: change.value().to_string(),
                added,
                removed,
                count: Some(1),
                parts: None,
            }),
        }
    }

    changes
}

/// Line diff of canonically pretty-printed JSON; falls back to a plain line diff
/// when either side does not parse.
fn json_changes(old: &str, new: &str) -> Vec<Change> {
    match (canonical_json(old), canonical_json(new)) {
        (Some(old), Some(new)) => line_changes(&old, &new),
        _ => {
            tracing::debug!("JSON diff input did not parse, using line diff");
            line_changes(old, new)
        }
    }
}

fn canonical_json(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let mut pretty = serde_json::to_string_pretty(&value).ok()?;
    pretty.push('\n');
    Some(pretty)
}

/// Line diff where every removed block directly followed by an added block gets
/// word-level `parts` describing the edit on both changes.
fn smart_changes(old: &str, new: &str) -> Vec<Change> {
    let mut changes = line_changes(old, new);

    for i in 1..changes.len() {
        if changes[i - 1].removed && changes[i].added {
            let parts = {
                let diff = TextDiff::configure()
                    .algorithm(Algorithm::Myers)
                    .diff_words(changes[i - 1].value.as_str(), changes[i].value.as_str());
                collect_changes(&diff)
            };
            changes[i - 1].parts = Some(parts.clone());
            changes[i].parts = Some(parts);
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_changes_group_runs() {
        let changes = compute_changes(DiffMode::Lines, "a\nb\nc", "a\nx\nc");
        assert_eq!(
            changes,
            vec![
                Change::unchanged("a\n", 1),
                Change::removed("b\n", 1),
                Change::added("x\n", 1),
                Change::unchanged("c", 1),
            ]
        );
    }

    #[test]
    fn test_identical_input_has_no_edits() {
        let text = "one\ntwo\nthree\n";
        let changes = compute_changes(DiffMode::Lines, text, text);
        assert_eq!(changes, vec![Change::unchanged(text, 3)]);
        assert!(compute_changes(DiffMode::Chars, "", "").is_empty());
    }

    #[test]
    fn test_word_changes() {
        let changes = compute_changes(DiffMode::Words, "hello cat", "hello dog");
        let removed: String = changes
            .iter()
            .filter(|c| c.removed)
            .map(|c| c.value.as_str())
            .collect();
        let added: String = changes
            .iter()
            .filter(|c| c.added)
            .map(|c| c.value.as_str())
            .collect();
        assert_eq!(removed, "cat");
        assert_eq!(added, "dog");
        assert_eq!(changes[0], Change::unchanged("hello ", 2));
    }

    #[test]
    fn test_char_changes_count_unicode_scalars() {
        let changes = compute_changes(DiffMode::Chars, "我爱你", "我不爱你");
        let added: Vec<&Change> = changes.iter().filter(|c| c.added).collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].value, "不");
        assert_eq!(added[0].count, Some(1));
    }

    #[test]
    fn test_json_mode_ignores_formatting() {
        let old = r#"{"b": 1, "a": [1, 2]}"#;
        let new = "{\n  \"a\": [1, 2],\n  \"b\": 1\n}";
        let changes = compute_changes(DiffMode::Json, old, new);
        assert!(changes.iter().all(|c| !c.added && !c.removed));

        let fallback = compute_changes(DiffMode::Json, "not json", "still not");
        assert!(fallback.iter().any(|c| c.removed));
    }

    #[test]
    fn test_smart_mode_attaches_word_parts() {
        let changes = compute_changes(
            DiffMode::Smart,
            "keep\nthe red fox\n",
            "keep\nthe blue fox\n",
        );
        assert_eq!(changes.len(), 3);
        let removed = &changes[1];
        let added = &changes[2];
        assert!(removed.removed && added.added);

        let parts = removed.parts.as_ref().unwrap();
        assert_eq!(added.parts.as_ref(), Some(parts));
        assert!(parts.iter().any(|p| p.removed && p.value == "red"));
        assert!(parts.iter().any(|p| p.added && p.value == "blue"));
        assert!(changes[0].parts.is_none());
    }

    #[test]
    fn test_encode_decode() {
        let changes = compute_changes(DiffMode::Smart, "a b\n", "a c\n");
        let bytes = encode_changes(&changes).unwrap();
        assert_eq!(decode_changes(&bytes).unwrap(), changes);
        assert!(decode_changes(b"{\"value\":1}").is_err());
    }
}
