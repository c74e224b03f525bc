use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Column name used by `count(*)`.
pub const COUNT_STAR_COLUMN: &str = "*";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    #[display(fmt = "count")]
    Count,
    #[display(fmt = "sum")]
    Sum,
    #[display(fmt = "min")]
    Min,
    #[display(fmt = "max")]
    Max,
    #[display(fmt = "avg")]
    Avg,
}

impl AggregationType {
    /// Returns `true` if the function reads the numeric value of its column.
    #[inline]
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, AggregationType::Count)
    }
}

impl FromStr for AggregationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregationType::Count),
            "sum" => Ok(AggregationType::Sum),
            "min" => Ok(AggregationType::Min),
            "max" => Ok(AggregationType::Max),
            "avg" => Ok(AggregationType::Avg),
            _ => anyhow::bail!("unknown aggregation function: '{}'", s),
        }
    }
}

/// One aggregation of a request: a function applied to a column.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AggregationInfo {
    pub aggregation_type: AggregationType,
    pub column: String,
}

impl AggregationInfo {
    pub fn new(aggregation_type: AggregationType, column: impl Into<String>) -> Self {
        Self {
            aggregation_type,
            column: column.into(),
        }
    }

    pub fn count_star() -> Self {
        Self::new(AggregationType::Count, COUNT_STAR_COLUMN)
    }

    #[inline]
    pub fn is_count_star(&self) -> bool {
        self.aggregation_type == AggregationType::Count && self.column == COUNT_STAR_COLUMN
    }

    /// The name a result of this aggregation is reported under, e.g.
    /// `count_star` or `sum_met_impressionCount`.
    pub fn function_name(&self) -> String {
        if self.column == COUNT_STAR_COLUMN {
            format!("{}_star", self.aggregation_type)
        } else {
            format!("{}_{}", self.aggregation_type, self.column)
        }
    }

    /// The segment column this aggregation reads, if any.
    #[inline]
    pub fn input_column(&self) -> Option<&str> {
        if self.column == COUNT_STAR_COLUMN {
            None
        } else {
            Some(&self.column)
        }
    }
}
