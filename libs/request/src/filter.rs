use itertools::Itertools;
use quarry_array::Scalar;
use serde::{Deserialize, Serialize};

/// A predicate over segment columns.
///
/// The filter is evaluated by the segment (see `IndexSegment::doc_id_source`);
/// the execution core only validates the columns it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterQuery {
    Eq {
        column: String,
        value: Scalar,
    },
    In {
        column: String,
        values: Vec<Scalar>,
    },
    /// Inclusive range; a missing bound is unbounded.
    Range {
        column: String,
        lower: Option<Scalar>,
        upper: Option<Scalar>,
    },
    And(Vec<FilterQuery>),
    Or(Vec<FilterQuery>),
}

impl FilterQuery {
    pub fn eq(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        FilterQuery::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn range(
        column: impl Into<String>,
        lower: Option<Scalar>,
        upper: Option<Scalar>,
    ) -> Self {
        FilterQuery::Range {
            column: column.into(),
            lower,
            upper,
        }
    }

    /// Returns the distinct columns referenced by this filter, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns.into_iter().unique().collect()
    }

    fn collect_columns<'a>(&'a self, columns: &mut Vec<&'a str>) {
        match self {
            FilterQuery::Eq { column, .. }
            | FilterQuery::In { column, .. }
            | FilterQuery::Range { column, .. } => columns.push(column),
            FilterQuery::And(children) | FilterQuery::Or(children) => {
                for child in children {
                    child.collect_columns(columns);
                }
            }
        }
    }
}
