use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{AggregationInfo, FilterQuery, GroupBy};

/// Projected columns of a selection query and the maximum number of rows to return.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub columns: Vec<String>,
    pub size: usize,
}

impl Selection {
    pub fn new<I, S>(columns: I, size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            size,
        }
    }
}

pub type RequestRef = Arc<Request>;

/// An already validated analytical request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub filter: Option<FilterQuery>,
    #[serde(default)]
    pub selection: Option<Selection>,
    #[serde(default)]
    pub aggregations: Vec<AggregationInfo>,
    #[serde(default)]
    pub group_by: Option<GroupBy>,
}

impl Request {
    pub fn with_filter(self, filter: FilterQuery) -> Self {
        Self {
            filter: Some(filter),
            ..self
        }
    }

    pub fn with_selection(self, selection: Selection) -> Self {
        Self {
            selection: Some(selection),
            ..self
        }
    }

    pub fn with_aggregation(mut self, aggregation: AggregationInfo) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    pub fn with_group_by(self, group_by: GroupBy) -> Self {
        Self {
            group_by: Some(group_by),
            ..self
        }
    }

    #[inline]
    pub fn is_aggregation(&self) -> bool {
        !self.aggregations.is_empty()
    }

    #[inline]
    pub fn is_group_by(&self) -> bool {
        self.group_by.is_some()
    }

    /// Columns that must be projected to answer the request: group-by columns
    /// first, then aggregation inputs, then selected columns. Filter-only
    /// columns are not included since the segment evaluates the filter itself.
    pub fn projected_columns(&self) -> Vec<&str> {
        let group_columns = self
            .group_by
            .iter()
            .flat_map(|group_by| group_by.columns.iter().map(String::as_str));
        let aggregation_columns = self
            .aggregations
            .iter()
            .filter_map(AggregationInfo::input_column);
        let selection_columns = self
            .selection
            .iter()
            .flat_map(|selection| selection.columns.iter().map(String::as_str));

        group_columns
            .chain(aggregation_columns)
            .chain(selection_columns)
            .unique()
            .collect()
    }
}
