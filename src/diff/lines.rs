//! Turn a raw change sequence into renderable unified lines.

use super::types::{
    Change, ChangeSide, DiffLineData, DiffLineSegment, DiffLineType, DiffMode, SegmentType,
};
use crate::constant::CONTEXT_SIZE;
use thiserror::Error;

/// Structurally invalid input from the diff producer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("Invariant violation: change {index} is flagged both added and removed")]
    ConflictingFlags { index: usize },
}

impl LineError {
    pub fn code(&self) -> &'static str {
        match self {
            LineError::ConflictingFlags { .. } => "INVARIANT_VIOLATION",
        }
    }
}

/// Build unified lines using the default context size
pub fn process_line_changes(
    changes: &[Change],
    mode: DiffMode,
) -> Result<Vec<DiffLineData>, LineError> {
    process_line_changes_with_context(changes, mode, CONTEXT_SIZE)
}

pub fn process_line_changes_with_context(
    changes: &[Change],
    mode: DiffMode,
    context_size: usize,
) -> Result<Vec<DiffLineData>, LineError> {
    if let Some(index) = changes.iter().position(|c| c.added && c.removed) {
        return Err(LineError::ConflictingFlags { index });
    }

    let mut emitter = LineEmitter::default();
    match mode {
        DiffMode::Lines | DiffMode::Json => split_by_line(&mut emitter, changes, None),
        DiffMode::Smart => split_by_line(&mut emitter, changes, Some(context_size)),
        DiffMode::Words | DiffMode::Chars => stream_inline(&mut emitter, changes),
    }
    Ok(emitter.lines)
}

/// Group intra-line parts into one segment list per line of `side`.
///
/// Parts of the opposite side are dropped. A new list starts every time a part
/// crosses a newline; empty fragments produce no segment.
pub fn split_parts_to_lines(parts: &[Change], side: ChangeSide) -> Vec<Vec<DiffLineSegment>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();

    for part in parts.iter().filter(|part| !side.excludes(part)) {
        let segment_type = part.segment_type();
        let mut fragments = part.value.split('\n').peekable();
        while let Some(fragment) = fragments.next() {
            if !fragment.is_empty() {
                current.push(DiffLineSegment {
                    text: fragment.to_string(),
                    segment_type,
                });
            }
            if fragments.peek().is_some() {
                lines.push(std::mem::take(&mut current));
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Assigns indices, keys and per-side line numbers as lines are emitted
#[derive(Default)]
struct LineEmitter {
    lines: Vec<DiffLineData>,
    old_line: usize,
    new_line: usize,
}

impl LineEmitter {
    fn push(
        &mut self,
        line_type: DiffLineType,
        content: String,
        change_index: usize,
        segments: Option<Vec<DiffLineSegment>>,
    ) {
        let (old_line_num, new_line_num) = match line_type {
            DiffLineType::Add => {
                self.new_line += 1;
                (None, Some(self.new_line))
            }
            DiffLineType::Remove => {
                self.old_line += 1;
                (Some(self.old_line), None)
            }
            DiffLineType::Context => {
                self.old_line += 1;
                self.new_line += 1;
                (Some(self.old_line), Some(self.new_line))
            }
            DiffLineType::Collapsed => (None, None),
        };

        let is_modified = segments.as_deref().is_some_and(has_both_sides);
        let index = self.lines.len();
        self.lines.push(DiffLineData {
            key: format!("{}-{}", line_type, index),
            index,
            line_type,
            content,
            original_change_index: change_index,
            segments,
            is_modified,
            old_line_num,
            new_line_num,
            hidden_lines: None,
        });
    }

    /// Emit a collapsed marker and advance both counters past the hidden lines
    fn collapse(&mut self, change_index: usize, hidden: usize) {
        self.push(DiffLineType::Collapsed, String::new(), change_index, None);
        if let Some(marker) = self.lines.last_mut() {
            marker.hidden_lines = Some(hidden);
        }
        self.old_line += hidden;
        self.new_line += hidden;
    }
}

fn has_both_sides(segments: &[DiffLineSegment]) -> bool {
    let added = segments.iter().any(|s| s.segment_type == SegmentType::Add);
    let removed = segments.iter().any(|s| s.segment_type == SegmentType::Remove);
    added && removed
}

fn line_type_of(change: &Change) -> DiffLineType {
    if change.added {
        DiffLineType::Add
    } else if change.removed {
        DiffLineType::Remove
    } else {
        DiffLineType::Context
    }
}

/// Split a change value into lines, dropping the empty fragment after a final newline
fn split_value_lines(value: &str) -> Vec<&str> {
    if value.is_empty() {
        return Vec::new();
    }
    let mut fragments: Vec<&str> = value.split('\n').collect();
    if value.ends_with('\n') {
        fragments.pop();
    }
    fragments
}

/// Line-oriented modes. `collapse_context` is set for smart mode and carries the
/// number of context lines kept around a collapsed block.
fn split_by_line(emitter: &mut LineEmitter, changes: &[Change], collapse_context: Option<usize>) {
    for (change_index, change) in changes.iter().enumerate() {
        let line_type = line_type_of(change);
        let fragments = split_value_lines(&change.value);

        if let Some(context_size) = collapse_context
            && line_type == DiffLineType::Context
        {
            let count = change.count.unwrap_or(fragments.len());
            let threshold = context_size * 2;
            if count > threshold && fragments.len() > threshold {
                let hidden = fragments.len() - threshold;
                for fragment in &fragments[..context_size] {
                    emitter.push(line_type, fragment.to_string(), change_index, None);
                }
                emitter.collapse(change_index, hidden);
                for fragment in &fragments[fragments.len() - context_size..] {
                    emitter.push(line_type, fragment.to_string(), change_index, None);
                }
                continue;
            }
        }

        let side = match line_type {
            DiffLineType::Add => Some(ChangeSide::Add),
            DiffLineType::Remove => Some(ChangeSide::Remove),
            _ => None,
        };
        let mut segments_per_line = match (collapse_context, side, &change.parts) {
            (Some(_), Some(side), Some(parts)) => split_parts_to_lines(parts, side).into_iter(),
            _ => Vec::new().into_iter(),
        };

        for fragment in fragments {
            emitter.push(
                line_type,
                fragment.to_string(),
                change_index,
                segments_per_line.next(),
            );
        }
    }
}

/// Word and char modes: segments stream across changes and a line is flushed at
/// every newline found in any change value.
fn stream_inline(emitter: &mut LineEmitter, changes: &[Change]) {
    let mut current: Vec<DiffLineSegment> = Vec::new();
    let mut line_origin: Option<usize> = None;

    for (change_index, change) in changes.iter().enumerate() {
        let segment_type = change.segment_type();
        let mut fragments = change.value.split('\n').peekable();

        while let Some(fragment) = fragments.next() {
            if !fragment.is_empty() {
                current.push(DiffLineSegment {
                    text: fragment.to_string(),
                    segment_type,
                });
                line_origin.get_or_insert(change_index);
            }
            if fragments.peek().is_some() {
                let origin = line_origin.take().unwrap_or(change_index);
                flush_inline(emitter, std::mem::take(&mut current), origin);
            }
        }
    }

    if !current.is_empty() {
        let origin = line_origin.unwrap_or(0);
        flush_inline(emitter, current, origin);
    }
}

fn flush_inline(emitter: &mut LineEmitter, segments: Vec<DiffLineSegment>, change_index: usize) {
    let added = segments.iter().any(|s| s.segment_type == SegmentType::Add);
    let removed = segments.iter().any(|s| s.segment_type == SegmentType::Remove);
    let line_type = match (added, removed) {
        (true, false) => DiffLineType::Add,
        (false, true) => DiffLineType::Remove,
        _ => DiffLineType::Context,
    };
    let content: String = segments.iter().map(|s| s.text.as_str()).collect();
    emitter.push(line_type, content, change_index, Some(segments));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute::compute_changes;

    fn numbers(line: &DiffLineData) -> (Option<usize>, Option<usize>) {
        (line.old_line_num, line.new_line_num)
    }

    #[test]
    fn test_no_op_diff_is_all_context() {
        let text = "alpha\nbeta\n\ngamma\ndelta";
        let changes = compute_changes(DiffMode::Lines, text, text);
        let lines = process_line_changes(&changes, DiffMode::Lines).unwrap();

        assert_eq!(lines.len(), text.lines().count());
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line.line_type, DiffLineType::Context);
            assert_eq!(line.old_line_num, line.new_line_num);
            assert_eq!(line.old_line_num, Some(i + 1));
        }
    }

    #[test]
    fn test_end_to_end_line_example() {
        let changes = compute_changes(DiffMode::Lines, "a\nb\nc", "a\nx\nc");
        let lines = process_line_changes(&changes, DiffMode::Lines).unwrap();

        let summary: Vec<(DiffLineType, &str, (Option<usize>, Option<usize>))> = lines
            .iter()
            .map(|l| (l.line_type, l.content.as_str(), numbers(l)))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DiffLineType::Context, "a", (Some(1), Some(1))),
                (DiffLineType::Remove, "b", (Some(2), None)),
                (DiffLineType::Add, "x", (None, Some(2))),
                (DiffLineType::Context, "c", (Some(3), Some(3))),
            ]
        );
        assert_eq!(lines[2].key, "add-2");
        assert_eq!(lines[2].original_change_index, 2);
    }

    #[test]
    fn test_smart_collapses_long_context() {
        let long: String = (1..=5 * CONTEXT_SIZE).map(|i| format!("same {}\n", i)).collect();
        let changes = vec![
            Change::removed("old head\n", 1),
            Change::unchanged(long, 5 * CONTEXT_SIZE),
            Change::added("new tail\n", 1),
        ];
        let lines = process_line_changes(&changes, DiffMode::Smart).unwrap();

        let collapsed: Vec<&DiffLineData> = lines
            .iter()
            .filter(|l| l.line_type == DiffLineType::Collapsed)
            .collect();
        assert_eq!(collapsed.len(), 1);

        let marker = lines
            .iter()
            .position(|l| l.line_type == DiffLineType::Collapsed)
            .unwrap();
        let before = &lines[1..marker];
        let after = &lines[marker + 1..lines.len() - 1];
        assert_eq!(before.len(), CONTEXT_SIZE);
        assert_eq!(after.len(), CONTEXT_SIZE);
        assert!(before.iter().chain(after).all(|l| l.line_type == DiffLineType::Context));

        let skipped = 5 * CONTEXT_SIZE - 2 * CONTEXT_SIZE;
        assert_eq!(lines[marker].hidden_lines, Some(skipped));
        assert_eq!(numbers(&lines[marker]), (None, None));
        assert_eq!(lines[marker].content, "");

        // old: removed line 1, context 2..=16 ; new: context 1..=15, added 16
        assert_eq!(before[0].old_line_num, Some(2));
        assert_eq!(before[0].new_line_num, Some(1));
        assert_eq!(after[0].old_line_num, Some(2 + CONTEXT_SIZE + skipped));
        assert_eq!(after[0].new_line_num, Some(1 + CONTEXT_SIZE + skipped));
        assert_eq!(after[0].content, format!("same {}", CONTEXT_SIZE + skipped + 1));
        let last = lines.last().unwrap();
        assert_eq!(numbers(last), (None, Some(5 * CONTEXT_SIZE + 1)));
    }

    #[test]
    fn test_lines_mode_never_collapses() {
        let long: String = (0..20).map(|i| format!("{}\n", i)).collect();
        let changes = vec![Change::unchanged(long, 20)];
        let lines = process_line_changes(&changes, DiffMode::Lines).unwrap();
        assert_eq!(lines.len(), 20);

        let short: String = (0..6).map(|i| format!("{}\n", i)).collect();
        let smart = process_line_changes(&[Change::unchanged(short, 6)], DiffMode::Smart).unwrap();
        assert_eq!(smart.len(), 6);
    }

    #[test]
    fn test_smart_segments_follow_parts() {
        let changes = compute_changes(DiffMode::Smart, "the red fox\n", "the blue fox\n");
        let lines = process_line_changes(&changes, DiffMode::Smart).unwrap();
        assert_eq!(lines.len(), 2);

        let removed = &lines[0];
        let segments = removed.segments.as_ref().unwrap();
        assert!(segments.iter().all(|s| s.segment_type != SegmentType::Add));
        assert!(
            segments
                .iter()
                .any(|s| s.segment_type == SegmentType::Remove && s.text == "red")
        );
        assert!(!removed.is_modified);

        let added = &lines[1];
        let text: String = added
            .segments
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(text, added.content);
    }

    #[test]
    fn test_split_parts_to_lines() {
        let parts = vec![
            Change::unchanged("one ", 1),
            Change::removed("two", 1),
            Change::added("deux", 1),
            Change::unchanged("\nthree\n", 1),
        ];

        let removed = split_parts_to_lines(&parts, ChangeSide::Remove);
        assert_eq!(removed.len(), 2);
        let texts: Vec<Vec<&str>> = removed
            .iter()
            .map(|line| line.iter().map(|s| s.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec![vec!["one ", "two"], vec!["three"]]);

        let added = split_parts_to_lines(&parts, ChangeSide::Add);
        assert_eq!(added[0][1].text, "deux");
        assert_eq!(added[0][1].segment_type, SegmentType::Add);
    }

    #[test]
    fn test_split_parts_keeps_empty_lines_aligned() {
        let parts = vec![Change::added("a\n\nb\n", 3)];
        let lines = split_parts_to_lines(&parts, ChangeSide::Add);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].is_empty());
    }

    #[test]
    fn test_word_mode_builds_composite_lines() {
        let changes = compute_changes(
            DiffMode::Words,
            "hello cat\nbye\n",
            "hello dog\nbye\nnew\n",
        );
        let lines = process_line_changes(&changes, DiffMode::Words).unwrap();

        assert_eq!(lines[0].line_type, DiffLineType::Context);
        assert!(lines[0].is_modified);
        assert_eq!(lines[0].content, "hello catdog");
        assert_eq!(numbers(&lines[0]), (Some(1), Some(1)));

        assert_eq!(lines[1].content, "bye");
        assert!(!lines[1].is_modified);

        assert_eq!(lines[2].line_type, DiffLineType::Add);
        assert_eq!(lines[2].content, "new");
        assert_eq!(numbers(&lines[2]), (None, Some(3)));
    }

    #[test]
    fn test_char_mode_flushes_trailing_segments() {
        let changes = vec![Change::unchanged("ab", 2), Change::removed("c", 1)];
        let lines = process_line_changes(&changes, DiffMode::Chars).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_type, DiffLineType::Remove);
        assert_eq!(lines[0].content, "abc");
        assert_eq!(lines[0].original_change_index, 0);
    }

    #[test]
    fn test_conflicting_flags_fail_loudly() {
        let mut bad = Change::added("x", 1);
        bad.removed = true;
        let changes = vec![Change::unchanged("a\n", 1), bad];
        assert_eq!(
            process_line_changes(&changes, DiffMode::Lines),
            Err(LineError::ConflictingFlags { index: 1 })
        );
        let err = process_line_changes(&changes, DiffMode::Smart).unwrap_err();
        assert_eq!(err.code(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn test_empty_changes() {
        assert!(process_line_changes(&[], DiffMode::Smart).unwrap().is_empty());
        assert!(process_line_changes(&[], DiffMode::Words).unwrap().is_empty());
    }
}
