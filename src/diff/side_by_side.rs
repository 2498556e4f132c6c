use super::types::{DiffLineData, DiffLineType, SideBySideRowData};

/// Pair unified lines into side-by-side rows.
///
/// Removed and added lines are buffered until the next context, collapsed or
/// modified line (or the end of input), then zipped index by index. The shorter
/// run leaves its slot empty. Context-like lines appear on both sides.
pub fn process_side_by_side_changes(lines: &[DiffLineData]) -> Vec<SideBySideRowData> {
    let mut rows = Vec::new();
    let mut removed: Vec<&DiffLineData> = Vec::new();
    let mut added: Vec<&DiffLineData> = Vec::new();

    for line in lines {
        match line.line_type {
            DiffLineType::Remove if !line.is_modified => removed.push(line),
            DiffLineType::Add if !line.is_modified => added.push(line),
            _ => {
                flush_buffers(&mut rows, &mut removed, &mut added);
                push_row(&mut rows, Some(line.clone()), Some(line.clone()));
            }
        }
    }

    flush_buffers(&mut rows, &mut removed, &mut added);
    rows
}

fn flush_buffers(
    rows: &mut Vec<SideBySideRowData>,
    removed: &mut Vec<&DiffLineData>,
    added: &mut Vec<&DiffLineData>,
) {
    let pairs = removed.len().max(added.len());
    for i in 0..pairs {
        let left = removed.get(i).map(|line| (*line).clone());
        let right = added.get(i).map(|line| (*line).clone());
        push_row(rows, left, right);
    }
    removed.clear();
    added.clear();
}

fn push_row(
    rows: &mut Vec<SideBySideRowData>,
    left: Option<DiffLineData>,
    right: Option<DiffLineData>,
) {
    let row_index = rows.len();
    rows.push(SideBySideRowData {
        key: format!("row-{}", row_index),
        left,
        right,
        row_index,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute::compute_changes;
    use crate::diff::lines::process_line_changes;
    use crate::diff::types::DiffMode;

    fn line(line_type: DiffLineType, content: &str, index: usize) -> DiffLineData {
        DiffLineData {
            key: format!("{}-{}", line_type, index),
            index,
            line_type,
            content: content.to_string(),
            original_change_index: index,
            segments: None,
            is_modified: false,
            old_line_num: None,
            new_line_num: None,
            hidden_lines: None,
        }
    }

    fn content(slot: &Option<DiffLineData>) -> Option<&str> {
        slot.as_ref().map(|l| l.content.as_str())
    }

    #[test]
    fn test_pairs_buffered_runs() {
        let lines = vec![
            line(DiffLineType::Remove, "A", 0),
            line(DiffLineType::Remove, "B", 1),
            line(DiffLineType::Remove, "C", 2),
            line(DiffLineType::Add, "X", 3),
            line(DiffLineType::Context, "ctx", 4),
        ];
        let rows = process_side_by_side_changes(&lines);

        assert_eq!(rows.len(), 4);
        assert_eq!((content(&rows[0].left), content(&rows[0].right)), (Some("A"), Some("X")));
        assert_eq!((content(&rows[1].left), content(&rows[1].right)), (Some("B"), None));
        assert_eq!((content(&rows[2].left), content(&rows[2].right)), (Some("C"), None));
        assert_eq!(rows[3].left, rows[3].right);
        assert_eq!(content(&rows[3].left), Some("ctx"));
        assert_eq!(rows[3].row_index, 3);
        assert_eq!(rows[3].key, "row-3");
    }

    #[test]
    fn test_trailing_buffers_flush_at_end() {
        let lines = vec![
            line(DiffLineType::Context, "a", 0),
            line(DiffLineType::Add, "x", 1),
            line(DiffLineType::Add, "y", 2),
        ];
        let rows = process_side_by_side_changes(&lines);
        assert_eq!(rows.len(), 3);
        assert_eq!((content(&rows[1].left), content(&rows[1].right)), (None, Some("x")));
        assert_eq!((content(&rows[2].left), content(&rows[2].right)), (None, Some("y")));
    }

    #[test]
    fn test_modified_and_collapsed_lines_span_both_sides() {
        let mut modified = line(DiffLineType::Context, "hello catdog", 1);
        modified.is_modified = true;
        let lines = vec![
            line(DiffLineType::Remove, "gone", 0),
            modified,
            line(DiffLineType::Collapsed, "", 2),
        ];
        let rows = process_side_by_side_changes(&lines);
        assert_eq!(rows.len(), 3);
        assert_eq!((content(&rows[0].left), content(&rows[0].right)), (Some("gone"), None));
        assert!(rows[1].left.as_ref().unwrap().is_modified);
        assert_eq!(rows[1].left, rows[1].right);
        assert_eq!(rows[2].left.as_ref().unwrap().line_type, DiffLineType::Collapsed);
    }

    #[test]
    fn test_from_real_diff() {
        let changes = compute_changes(DiffMode::Lines, "a\nb\nc\n", "a\nx\ny\nc\n");
        let lines = process_line_changes(&changes, DiffMode::Lines).unwrap();
        let rows = process_side_by_side_changes(&lines);

        // a | (b,x) | (-,y) | c
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].left.as_ref().unwrap().old_line_num, Some(2));
        assert_eq!(rows[1].right.as_ref().unwrap().new_line_num, Some(2));
        assert!(rows[2].left.is_none());
        assert_eq!(rows[3].right.as_ref().unwrap().new_line_num, Some(4));
        assert!(process_side_by_side_changes(&[]).is_empty());
    }
}
