//! Action-tag codec — the only datum a notification's buttons carry.
//!
//! Current tags are `<accept|reject>_<source-index>_<row>`, embedding the
//! originating source's registry index so the decision engine acts on the
//! right sheet even when two sources have a populated row at the same
//! index. Two-part tags (`accept_17`) from notifications published by older
//! builds still decode; they carry no source and resolve by registry-order
//! trial instead.

use crate::error::DecisionError;

/// Terminal decision kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Accept,
    Reject,
}

impl DecisionKind {
    fn as_tag(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "Accepted"),
            Self::Reject => write!(f, "Rejected"),
        }
    }
}

/// Reference to one row in one (possibly unknown) source.
///
/// `row` is the absolute 1-based sheet row, header included, so data row
/// `i` (0-based) is `i + 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRef {
    /// Registry index of the originating source. `None` for legacy tags;
    /// the engine then tries every source in registry order.
    pub source_index: Option<usize>,
    pub row: u32,
}

/// One decoded reviewer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTag {
    pub kind: DecisionKind,
    pub row_ref: RowRef,
}

impl ActionTag {
    pub fn new(kind: DecisionKind, source_index: usize, row: u32) -> Self {
        Self {
            kind,
            row_ref: RowRef {
                source_index: Some(source_index),
                row,
            },
        }
    }

    /// Encode for embedding in a button's custom id.
    pub fn encode(&self) -> String {
        match self.row_ref.source_index {
            Some(idx) => format!("{}_{}_{}", self.kind.as_tag(), idx, self.row_ref.row),
            None => format!("{}_{}", self.kind.as_tag(), self.row_ref.row),
        }
    }

    /// Decode a tag from a reviewer event.
    pub fn decode(tag: &str) -> Result<Self, DecisionError> {
        let bad = || DecisionError::BadActionTag(tag.to_string());

        let parts: Vec<&str> = tag.split('_').collect();
        let kind = match parts.first() {
            Some(&"accept") => DecisionKind::Accept,
            Some(&"reject") => DecisionKind::Reject,
            _ => return Err(bad()),
        };

        match parts.as_slice() {
            [_, row] => {
                let row = row.parse().map_err(|_| bad())?;
                Ok(Self {
                    kind,
                    row_ref: RowRef {
                        source_index: None,
                        row,
                    },
                })
            }
            [_, idx, row] => {
                let idx = idx.parse().map_err(|_| bad())?;
                let row = row.parse().map_err(|_| bad())?;
                Ok(Self {
                    kind,
                    row_ref: RowRef {
                        source_index: Some(idx),
                        row,
                    },
                })
            }
            _ => Err(bad()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let tag = ActionTag::new(DecisionKind::Accept, 2, 17);
        assert_eq!(tag.encode(), "accept_2_17");
        assert_eq!(ActionTag::decode("accept_2_17").unwrap(), tag);
    }

    #[test]
    fn legacy_two_part_tag_has_no_source() {
        let tag = ActionTag::decode("reject_5").unwrap();
        assert_eq!(tag.kind, DecisionKind::Reject);
        assert_eq!(tag.row_ref.source_index, None);
        assert_eq!(tag.row_ref.row, 5);
    }

    #[test]
    fn malformed_tags_are_rejected() {
        for bad in ["", "accept", "banhammer_5", "accept_x", "accept_1_2_3", "accept_1_x"] {
            assert!(ActionTag::decode(bad).is_err(), "{bad:?} should not decode");
        }
    }
}
