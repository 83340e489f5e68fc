//! State column indexing
//!
//! Recordings annotated after the session carry a trailing `State` column.
//! The index built here maps each label to the rows that carry it, so a
//! single experimental phase can be replayed on its own.

use crate::core::SegmentLabel;
use crate::error::{ReplayError, Result};
use crate::input::csv::{parse_row, RowStore};
use tracing::{debug, info};

/// Header name that marks the last column as a state label
pub const STATE_COLUMN: &str = "State";

/// Label for rows that still need a human decision
pub const MANUAL_REVIEW: &str = "MANUAL_REVIEW";

/// Row indices per segment label, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateIndex {
    has_state_column: bool,
    buckets: [Vec<usize>; SegmentLabel::COUNT],
}

impl StateIndex {
    /// Scan the recording once and bucket every data row by its label
    pub fn build(store: &RowStore) -> Result<Self> {
        let mut index = Self::default();
        let mut rows = store.scan()?;

        let header = match rows.next() {
            Some((_, line)) => line?,
            None => return Ok(index),
        };

        let header = parse_row(&header);
        if header.last().map(|name| name.trim()) != Some(STATE_COLUMN) {
            debug!("No {} column; segment playback disabled", STATE_COLUMN);
            return Ok(index);
        }
        index.has_state_column = true;

        for (row, line) in rows {
            let fields = parse_row(&line?);
            let label = fields.last().map(|f| f.trim()).unwrap_or_default();
            index.buckets[classify(label, row)?.index()].push(row);
        }

        info!(
            "Indexed states: {}",
            SegmentLabel::ALL
                .iter()
                .map(|label| format!("{}={}", label, index.rows(*label).len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(index)
    }

    /// Whether the recording's last column is a state label
    pub fn has_state_column(&self) -> bool {
        self.has_state_column
    }

    /// Rows labeled `label`, in file order
    pub fn rows(&self, label: SegmentLabel) -> &[usize] {
        &self.buckets[label.index()]
    }

    /// Labels that have at least one row
    pub fn available_states(&self) -> Vec<SegmentLabel> {
        SegmentLabel::ALL
            .into_iter()
            .filter(|label| !self.rows(*label).is_empty())
            .collect()
    }
}

fn classify(label: &str, row: usize) -> Result<SegmentLabel> {
    if label == MANUAL_REVIEW {
        return Err(ReplayError::ManualReviewRequired { row });
    }

    SegmentLabel::from_label(label).ok_or_else(|| ReplayError::UnrecognizedState {
        label: label.to_string(),
        row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn index_of(contents: &str) -> Result<StateIndex> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        StateIndex::build(&RowStore::open(file.path()).unwrap())
    }

    #[test]
    fn test_state_less_recording() {
        let index = index_of("Time,A,B\n0,1,2\n1,3,4\n").unwrap();
        assert!(!index.has_state_column());
        assert!(index.available_states().is_empty());
        for label in SegmentLabel::ALL {
            assert!(index.rows(label).is_empty());
        }
    }

    #[test]
    fn test_rows_are_partitioned() {
        let index = index_of(
            "Time,A,State\n\
             0,1,Baseline\n\
             1,2,Flow\n\
             2,3,Baseline\n\
             3,4, Flow\n\
             4,5,Transition_to_TH\n",
        )
        .unwrap();

        assert!(index.has_state_column());
        assert_eq!(index.rows(SegmentLabel::Baseline), &[1, 3]);
        assert_eq!(index.rows(SegmentLabel::Flow), &[2, 4]);
        assert_eq!(index.rows(SegmentLabel::TransitionToTh), &[5]);
        assert!(index.rows(SegmentLabel::TransientHypofrontality).is_empty());

        let mut all: Vec<usize> = SegmentLabel::ALL
            .iter()
            .flat_map(|label| index.rows(*label).to_vec())
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);

        assert_eq!(
            index.available_states(),
            vec![SegmentLabel::Baseline, SegmentLabel::TransitionToTh, SegmentLabel::Flow]
        );
    }

    #[test]
    fn test_manual_review_is_fatal() {
        let err = index_of("Time,A,State\n0,1,Baseline\n1,2,MANUAL_REVIEW\n").unwrap_err();
        assert!(matches!(err, ReplayError::ManualReviewRequired { row: 2 }));
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let err = index_of("Time,A,State\n0,1,Baseline\n1,2,Sleep\n").unwrap_err();
        match err {
            ReplayError::UnrecognizedState { label, row } => {
                assert_eq!(label, "Sleep");
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
