//! Structural diffs between two snapshots of the same kind

use std::collections::{HashMap, VecDeque};
use std::fmt;

use super::fields::{FieldValue, Record};
use super::table;
use crate::gateway::{PositionRecord, PositionSide};

/// One field whose value differs between snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: FieldValue,
    pub new: FieldValue,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old, self.new)
    }
}

/// Fields that changed from `old` to `new`.
///
/// A field that is a placeholder on both sides is never reported, even if the
/// placeholders differ (`N/A` -> `0`).
pub fn diff_records<R: Record>(old: &R, new: &R) -> Vec<FieldChange> {
    old.fields()
        .into_iter()
        .zip(new.fields())
        .filter(|((_, o), (_, n))| !(o.is_placeholder() && n.is_placeholder()) && o != n)
        .map(|((field, old), (_, new))| FieldChange { field, old, new })
        .collect()
}

/// Identity of a position row across snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub code: String,
    pub side: PositionSide,
}

impl PositionKey {
    pub fn of(record: &PositionRecord) -> Self {
        Self {
            code: record.code.clone(),
            side: record.position_side,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.side)
    }
}

/// Change to one position row
#[derive(Debug, Clone, PartialEq)]
pub enum PositionChange {
    /// Row present now but not before
    Opened(PositionRecord),
    /// Row present before but not now
    Closed(PositionRecord),
    /// Row present in both with differing fields
    Updated {
        key: PositionKey,
        changes: Vec<FieldChange>,
    },
}

impl fmt::Display for PositionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionChange::Opened(r) => {
                write!(f, "+ {}\n{}", PositionKey::of(r), table::render_record(r))
            }
            PositionChange::Closed(r) => {
                write!(f, "- {}\n{}", PositionKey::of(r), table::render_record(r))
            }
            PositionChange::Updated { key, changes } => {
                write!(f, "~ {}", key)?;
                for change in changes {
                    write!(f, "\n\t{}", change)?;
                }
                Ok(())
            }
        }
    }
}

/// Row changes from `old` to `new`.
///
/// Rows are paired by code and side; a repeated identity pairs in order of
/// appearance. Updates and openings follow the order of `new`, closings the
/// order of `old`. Reordering alone is not a change.
pub fn diff_positions(old: &[PositionRecord], new: &[PositionRecord]) -> Vec<PositionChange> {
    let mut unmatched: HashMap<PositionKey, VecDeque<usize>> = HashMap::new();
    for (i, record) in old.iter().enumerate() {
        unmatched
            .entry(PositionKey::of(record))
            .or_default()
            .push_back(i);
    }

    let mut matched = vec![false; old.len()];
    let mut changes = Vec::new();

    for record in new {
        let key = PositionKey::of(record);
        match unmatched.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(i) => {
                matched[i] = true;
                let field_changes = diff_records(&old[i], record);
                if !field_changes.is_empty() {
                    changes.push(PositionChange::Updated {
                        key,
                        changes: field_changes,
                    });
                }
            }
            None => changes.push(PositionChange::Opened(record.clone())),
        }
    }

    for (record, _) in old.iter().zip(&matched).filter(|(_, m)| !**m) {
        changes.push(PositionChange::Closed(record.clone()));
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AccountInfo;

    fn position(code: &str, qty: f64) -> PositionRecord {
        PositionRecord {
            code: code.to_string(),
            qty,
            can_sell_qty: qty,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_field_change() {
        let old = AccountInfo {
            cash: Some(1000.0),
            power: Some(5000.0),
            currency: Some("HKD".to_string()),
            ..Default::default()
        };
        let new = AccountInfo {
            cash: Some(1500.0),
            ..old.clone()
        };

        let changes = diff_records(&old, &new);
        assert_eq!(
            changes,
            vec![FieldChange {
                field: "cash",
                old: FieldValue::Number(1000.0),
                new: FieldValue::Number(1500.0),
            }]
        );
        assert_eq!(changes[0].to_string(), "cash: 1000 -> 1500");
    }

    #[test]
    fn test_identical_records_have_no_diff() {
        let info = AccountInfo {
            cash: Some(1000.0),
            ..Default::default()
        };
        assert!(diff_records(&info, &info.clone()).is_empty());
    }

    #[test]
    fn test_placeholders_on_both_sides_are_ignored() {
        let old = AccountInfo {
            frozen_cash: None,
            ..Default::default()
        };
        let new = AccountInfo {
            frozen_cash: Some(0.0),
            ..Default::default()
        };
        assert!(diff_records(&old, &new).is_empty());

        // A placeholder turning into a real value is a change
        let new = AccountInfo {
            frozen_cash: Some(250.0),
            ..Default::default()
        };
        let changes = diff_records(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, FieldValue::Missing);
    }

    #[test]
    fn test_position_opened_closed_updated() {
        let old = vec![position("HK.00700", 100.0), position("HK.09618", 200.0)];
        let new = vec![position("HK.09618", 150.0), position("HK.03690", 50.0)];

        let changes = diff_positions(&old, &new);
        assert_eq!(changes.len(), 3);

        match &changes[0] {
            PositionChange::Updated { key, changes } => {
                assert_eq!(key.code, "HK.09618");
                let fields: Vec<_> = changes.iter().map(|c| c.field).collect();
                assert_eq!(fields, vec!["qty", "can_sell_qty"]);
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert!(matches!(&changes[1], PositionChange::Opened(r) if r.code == "HK.03690"));
        assert!(matches!(&changes[2], PositionChange::Closed(r) if r.code == "HK.00700"));
    }

    #[test]
    fn test_reordered_positions_are_unchanged() {
        let old = vec![position("HK.00700", 100.0), position("HK.09618", 200.0)];
        let new = vec![position("HK.09618", 200.0), position("HK.00700", 100.0)];
        assert!(diff_positions(&old, &new).is_empty());
    }

    #[test]
    fn test_long_and_short_rows_are_distinct() {
        let long = position("US.AAPL", 10.0);
        let short = PositionRecord {
            position_side: PositionSide::Short,
            ..position("US.AAPL", 5.0)
        };

        let changes = diff_positions(&[long.clone()], &[long, short]);
        assert_eq!(changes.len(), 1);
        assert!(matches!(
            &changes[0],
            PositionChange::Opened(r) if r.position_side == PositionSide::Short
        ));
    }
}
