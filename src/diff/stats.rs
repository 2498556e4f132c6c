use super::types::Change;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub added_chars: usize,
    pub removed_chars: usize,
    pub added_lines: usize,
    pub removed_lines: usize,
}

/// Character and line statistics for a change sequence.
///
/// Characters are counted as Unicode scalar values so CJK text counts one per glyph.
/// Newlines are not counted as characters.
pub fn calculate_stats(changes: &[Change]) -> DiffStats {
    let mut stats = DiffStats::default();

    for change in changes {
        let chars = change.value.chars().filter(|c| *c != '\n').count();
        let lines = line_count(&change.value);
        if change.added {
            stats.added_chars += chars;
            stats.added_lines += lines;
        } else if change.removed {
            stats.removed_chars += chars;
            stats.removed_lines += lines;
        }
    }

    stats
}

/// Whether any added or removed change carries non-whitespace content
pub fn has_meaningful_changes(changes: &[Change]) -> bool {
    changes
        .iter()
        .any(|change| (change.added || change.removed) && !change.value.trim().is_empty())
}

fn line_count(value: &str) -> usize {
    if value.is_empty() {
        0
    } else {
        value.matches('\n').count() + usize::from(!value.ends_with('\n'))
    }
}
