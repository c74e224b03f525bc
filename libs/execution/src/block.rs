use anyhow::Result;
use derive_more::Display;
use quarry_array::Scalar;
use serde::{Deserialize, Serialize};

use crate::aggregation::Accumulator;
use crate::group_by::GroupByResult;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, Serialize, Deserialize)]
pub enum ExceptionKind {
    #[display(fmt = "execution")]
    Execution,
    #[display(fmt = "timeout")]
    Timeout,
    #[display(fmt = "decode")]
    Decode,
}

/// A non-fatal failure attached to a result: the answer is still returned,
/// built from the sources that did not fail.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProcessingException {
    pub kind: ExceptionKind,
    /// Segment or server the failure comes from.
    pub source: String,
    pub message: String,
}

impl ProcessingException {
    pub fn new(kind: ExceptionKind, source: impl Into<String>, message: impl ToString) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.to_string(),
        }
    }
}

/// Rows of a selection query, capped at `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
    pub limit: usize,
}

impl SelectionResult {
    pub fn new(columns: Vec<String>, limit: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            limit,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.limit
    }

    pub fn merge(&mut self, other: SelectionResult) -> Result<()> {
        anyhow::ensure!(
            self.columns == other.columns,
            "cannot merge selections over different columns"
        );
        let remaining = self.limit.saturating_sub(self.rows.len());
        self.rows.extend(other.rows.into_iter().take(remaining));
        Ok(())
    }
}

fn merge_optional<T>(
    this: &mut Option<T>,
    other: Option<T>,
    merge: impl FnOnce(&mut T, T) -> Result<()>,
) -> Result<()> {
    if let Some(other) = other {
        if let Some(current) = this.as_mut() {
            return merge(current, other);
        }
        *this = Some(other);
    }
    Ok(())
}

/// The intermediate result of executing a plan over one or more segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultBlock {
    pub num_docs_scanned: u64,
    pub total_docs: u64,
    pub time_used_ms: u64,
    /// One accumulator per aggregation of the request.
    pub aggregation_result: Option<Vec<Accumulator>>,
    pub group_by_result: Option<GroupByResult>,
    pub selection_result: Option<SelectionResult>,
    /// Set when some inputs did not finish before the deadline.
    pub partial: bool,
    pub num_unfinished: usize,
    pub exceptions: Vec<ProcessingException>,
}

impl ResultBlock {
    /// Folds `other` into `self`. Doc counts and time add up, results merge
    /// with the accumulator rules and exceptions are concatenated.
    pub fn merge(&mut self, other: ResultBlock) -> Result<()> {
        self.num_docs_scanned += other.num_docs_scanned;
        self.total_docs += other.total_docs;
        self.time_used_ms += other.time_used_ms;
        self.partial |= other.partial;
        self.num_unfinished += other.num_unfinished;
        self.exceptions.extend(other.exceptions);

        merge_optional(
            &mut self.aggregation_result,
            other.aggregation_result,
            |accumulators, other| {
                anyhow::ensure!(
                    accumulators.len() == other.len(),
                    "cannot merge {} aggregation results into {}",
                    other.len(),
                    accumulators.len()
                );
                for (accumulator, other) in accumulators.iter_mut().zip(&other) {
                    accumulator.merge(other)?;
                }
                Ok(())
            },
        )?;
        merge_optional(
            &mut self.group_by_result,
            other.group_by_result,
            GroupByResult::merge,
        )?;
        merge_optional(
            &mut self.selection_result,
            other.selection_result,
            SelectionResult::merge,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_counts_and_aggregations() {
        let mut a = ResultBlock {
            num_docs_scanned: 10,
            total_docs: 20,
            time_used_ms: 3,
            aggregation_result: Some(vec![Accumulator::Count(10), Accumulator::Max(None)]),
            ..Default::default()
        };
        let b = ResultBlock {
            num_docs_scanned: 5,
            total_docs: 5,
            time_used_ms: 1,
            aggregation_result: Some(vec![Accumulator::Count(5), Accumulator::Max(Some(7.0))]),
            exceptions: vec![ProcessingException::new(
                ExceptionKind::Execution,
                "segment_1",
                "boom",
            )],
            ..Default::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.num_docs_scanned, 15);
        assert_eq!(a.total_docs, 25);
        assert_eq!(a.time_used_ms, 4);
        assert_eq!(
            a.aggregation_result,
            Some(vec![Accumulator::Count(15), Accumulator::Max(Some(7.0))])
        );
        assert_eq!(a.exceptions.len(), 1);
    }

    #[test]
    fn test_merge_into_empty() {
        let mut a = ResultBlock::default();
        a.merge(ResultBlock {
            aggregation_result: Some(vec![Accumulator::Sum(2.0)]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(a.aggregation_result, Some(vec![Accumulator::Sum(2.0)]));
    }

    #[test]
    fn test_selection_merge_truncates() {
        let mut a = SelectionResult::new(vec!["name".to_string()], 3);
        a.rows = vec![vec!["a".into()], vec!["b".into()]];
        let mut b = SelectionResult::new(vec!["name".to_string()], 3);
        b.rows = vec![vec!["c".into()], vec!["d".into()]];
        a.merge(b).unwrap();
        assert_eq!(
            a.rows,
            vec![vec![Scalar::from("a")], vec![Scalar::from("b")], vec![Scalar::from("c")]]
        );
        assert!(a.is_full());
    }
}
