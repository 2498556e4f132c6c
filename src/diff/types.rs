use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Granularity of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    Lines,
    Words,
    Chars,
    Json,
    /// Line diff with word-level detail attached to replaced lines
    Smart,
}

impl DiffMode {
    pub const ALL: [DiffMode; 5] = [
        DiffMode::Lines,
        DiffMode::Words,
        DiffMode::Chars,
        DiffMode::Json,
        DiffMode::Smart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiffMode::Lines => "lines",
            DiffMode::Words => "words",
            DiffMode::Chars => "chars",
            DiffMode::Json => "json",
            DiffMode::Smart => "smart",
        }
    }
}

impl fmt::Display for DiffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown diff mode: {0}")]
pub struct UnknownDiffMode(pub String);

impl FromStr for DiffMode {
    type Err = UnknownDiffMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiffMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownDiffMode(s.to_string()))
    }
}

/// One atomic diff operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub value: String,
    #[serde(default)]
    pub added: bool,
    #[serde(default)]
    pub removed: bool,
    /// Number of tokens (lines, words or chars) merged into this change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Intra-line detail for replaced lines in smart mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Change>>,
}

impl Change {
    pub fn unchanged(value: impl Into<String>, count: usize) -> Self {
        Self {
            value: value.into(),
            count: Some(count),
            ..Self::default()
        }
    }

    pub fn added(value: impl Into<String>, count: usize) -> Self {
        Self {
            value: value.into(),
            added: true,
            count: Some(count),
            ..Self::default()
        }
    }

    pub fn removed(value: impl Into<String>, count: usize) -> Self {
        Self {
            value: value.into(),
            removed: true,
            count: Some(count),
            ..Self::default()
        }
    }

    pub fn with_parts(mut self, parts: Vec<Change>) -> Self {
        self.parts = Some(parts);
        self
    }

    pub fn segment_type(&self) -> SegmentType {
        if self.added {
            SegmentType::Add
        } else if self.removed {
            SegmentType::Remove
        } else {
            SegmentType::Unchanged
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Add,
    Remove,
    Unchanged,
}

/// Which side of a replaced line a segment list is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSide {
    Add,
    Remove,
}

impl ChangeSide {
    /// Whether `change` belongs to the other side and must be skipped
    pub fn excludes(&self, change: &Change) -> bool {
        match self {
            ChangeSide::Add => change.removed,
            ChangeSide::Remove => change.added,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLineSegment {
    pub text: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineType {
    Add,
    Remove,
    Context,
    Collapsed,
}

impl DiffLineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffLineType::Add => "add",
            DiffLineType::Remove => "remove",
            DiffLineType::Context => "context",
            DiffLineType::Collapsed => "collapsed",
        }
    }
}

impl fmt::Display for DiffLineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One renderable line in the unified layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLineData {
    pub key: String,
    pub index: usize,
    #[serde(rename = "type")]
    pub line_type: DiffLineType,
    pub content: String,
    pub original_change_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<DiffLineSegment>>,
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_line_num: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_line_num: Option<usize>,
    /// Number of unchanged lines a `collapsed` marker stands for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_lines: Option<usize>,
}

/// One row of the side-by-side layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideBySideRowData {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<DiffLineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<DiffLineData>,
    pub row_index: usize,
}
