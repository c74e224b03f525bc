use anyhow::{Context, Result};
use quarry_array::Scalar;
use quarry_request::{AggregationInfo, AggregationType};
use quarry_segment::ColumnBlock;

use crate::operators::ProjectionBlock;

/// Partial state of one aggregation function.
///
/// Every variant can absorb single values and merge a partial of the same
/// variant, and merging is associative and commutative.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count(u64),
    Sum(f64),
    /// `None` until a non-null value has been seen.
    Min(Option<f64>),
    Max(Option<f64>),
    Avg { sum: f64, count: u64 },
}

impl Accumulator {
    pub fn new(aggregation_type: AggregationType) -> Self {
        match aggregation_type {
            AggregationType::Count => Accumulator::Count(0),
            AggregationType::Sum => Accumulator::Sum(0.0),
            AggregationType::Min => Accumulator::Min(None),
            AggregationType::Max => Accumulator::Max(None),
            AggregationType::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
        }
    }

    pub fn aggregation_type(&self) -> AggregationType {
        match self {
            Accumulator::Count(_) => AggregationType::Count,
            Accumulator::Sum(_) => AggregationType::Sum,
            Accumulator::Min(_) => AggregationType::Min,
            Accumulator::Max(_) => AggregationType::Max,
            Accumulator::Avg { .. } => AggregationType::Avg,
        }
    }

    /// Counts one row regardless of its values, as `count(*)` does.
    #[inline]
    pub fn count_row(&mut self) {
        if let Accumulator::Count(count) = self {
            *count += 1;
        }
    }

    /// Absorbs one column value. Nulls are ignored by every function.
    #[inline]
    pub fn absorb(&mut self, value: &Scalar) {
        if let Accumulator::Count(count) = self {
            if !value.is_null() {
                *count += 1;
            }
            return;
        }

        let value = match value.as_f64() {
            Some(value) => value,
            None => return,
        };
        match self {
            Accumulator::Count(_) => {}
            Accumulator::Sum(sum) => *sum += value,
            Accumulator::Min(min) => *min = Some(min.map_or(value, |min| min.min(value))),
            Accumulator::Max(max) => *max = Some(max.map_or(value, |max| max.max(value))),
            Accumulator::Avg { sum, count } => {
                *sum += value;
                *count += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &Accumulator) -> Result<()> {
        match (self, other) {
            (Accumulator::Count(a), Accumulator::Count(b)) => *a += b,
            (Accumulator::Sum(a), Accumulator::Sum(b)) => *a += b,
            (Accumulator::Min(a), Accumulator::Min(b)) => *a = merge_option(*a, *b, f64::min),
            (Accumulator::Max(a), Accumulator::Max(b)) => *a = merge_option(*a, *b, f64::max),
            (
                Accumulator::Avg { sum, count },
                Accumulator::Avg {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += other_sum;
                *count += other_count;
            }
            (a, b) => anyhow::bail!(
                "cannot merge {} accumulator into {} accumulator",
                b.aggregation_type(),
                a.aggregation_type()
            ),
        }
        Ok(())
    }

    /// The value used to rank groups; `None` when the function has no value.
    pub fn sort_value(&self) -> Option<f64> {
        match self {
            Accumulator::Count(count) => Some(*count as f64),
            Accumulator::Sum(sum) => Some(*sum),
            Accumulator::Min(value) | Accumulator::Max(value) => *value,
            Accumulator::Avg { sum, count } => {
                if *count > 0 {
                    Some(*sum / *count as f64)
                } else {
                    None
                }
            }
        }
    }

    /// The final value of the function, `Null` when it has no value.
    pub fn value(&self) -> Scalar {
        match self {
            Accumulator::Count(count) => Scalar::Int64(*count as i64),
            _ => self.sort_value().into(),
        }
    }
}

fn merge_option(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, b) => a.or(b),
    }
}

pub(crate) fn new_accumulators(aggregations: &[AggregationInfo]) -> Vec<Accumulator> {
    aggregations
        .iter()
        .map(|aggregation| Accumulator::new(aggregation.aggregation_type))
        .collect()
}

/// The projected input column of every aggregation of a request, `None` for
/// `count(*)`.
pub(crate) struct AggregationInputs<'a>(Vec<Option<&'a ColumnBlock>>);

impl<'a> AggregationInputs<'a> {
    pub(crate) fn resolve(
        aggregations: &[AggregationInfo],
        block: &'a ProjectionBlock,
    ) -> Result<Self> {
        let mut inputs = Vec::with_capacity(aggregations.len());
        for aggregation in aggregations {
            inputs.push(match aggregation.input_column() {
                Some(column) => Some(block.column(column).with_context(|| {
                    format!("column '{}' is not projected", column)
                })?),
                None => None,
            });
        }
        Ok(Self(inputs))
    }

    #[inline]
    pub(crate) fn update(&self, accumulators: &mut [Accumulator], row: usize) {
        for (accumulator, input) in accumulators.iter_mut().zip(&self.0) {
            match input {
                Some(column) => accumulator.absorb(column.value(row)),
                None => accumulator.count_row(),
            }
        }
    }
}
