use std::cmp::Ordering;
use std::sync::Arc;

use ahash::AHashSet;
use anyhow::{Context, Result};
use itertools::Itertools;
use quarry_array::Scalar;
use quarry_request::FilterQuery;

use crate::memory::builder::coerce;
use crate::memory::{MemoryColumn, MemorySegment};
use crate::{DocId, DocIdSource};

pub(crate) enum Predicate {
    Eq(Arc<MemoryColumn>, Scalar),
    In(Arc<MemoryColumn>, AHashSet<Scalar>),
    Range {
        column: Arc<MemoryColumn>,
        lower: Option<Scalar>,
        upper: Option<Scalar>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

fn resolve_column(segment: &MemorySegment, name: &str) -> Result<Arc<MemoryColumn>> {
    segment
        .column(name)
        .cloned()
        .with_context(|| format!("filter references unknown column '{}'", name))
}

fn compare(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::String(a), Scalar::String(b)) => Some(a.cmp(b)),
        (Scalar::Boolean(a), Scalar::Boolean(b)) => Some(a.cmp(b)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

impl Predicate {
    pub(crate) fn compile(segment: &MemorySegment, filter: &FilterQuery) -> Result<Self> {
        Ok(match filter {
            FilterQuery::Eq { column, value } => {
                let column = resolve_column(segment, column)?;
                let value = coerce(value.clone(), column.field.data_type)?;
                Predicate::Eq(column, value)
            }
            FilterQuery::In { column, values } => {
                let column = resolve_column(segment, column)?;
                let data_type = column.field.data_type;
                let values = values
                    .iter()
                    .map(|value| coerce(value.clone(), data_type))
                    .try_collect()?;
                Predicate::In(column, values)
            }
            FilterQuery::Range {
                column,
                lower,
                upper,
            } => Predicate::Range {
                column: resolve_column(segment, column)?,
                lower: lower.clone(),
                upper: upper.clone(),
            },
            FilterQuery::And(children) => Predicate::And(
                children
                    .iter()
                    .map(|child| Predicate::compile(segment, child))
                    .try_collect()?,
            ),
            FilterQuery::Or(children) => Predicate::Or(
                children
                    .iter()
                    .map(|child| Predicate::compile(segment, child))
                    .try_collect()?,
            ),
        })
    }

    pub(crate) fn matches(&self, doc_id: DocId) -> bool {
        match self {
            Predicate::Eq(column, value) => column.value(doc_id) == value,
            Predicate::In(column, values) => values.contains(column.value(doc_id)),
            Predicate::Range {
                column,
                lower,
                upper,
            } => {
                let value = column.value(doc_id);
                if value.is_null() {
                    return false;
                }
                let above_lower = lower.as_ref().map_or(true, |lower| {
                    matches!(
                        compare(value, lower),
                        Some(Ordering::Greater) | Some(Ordering::Equal)
                    )
                });
                let below_upper = upper.as_ref().map_or(true, |upper| {
                    matches!(
                        compare(value, upper),
                        Some(Ordering::Less) | Some(Ordering::Equal)
                    )
                });
                above_lower && below_upper
            }
            Predicate::And(children) => children.iter().all(|child| child.matches(doc_id)),
            Predicate::Or(children) => children.iter().any(|child| child.matches(doc_id)),
        }
    }
}

pub(crate) struct MemoryDocIdSource {
    predicate: Option<Predicate>,
    next_doc: DocId,
    total_docs: DocId,
}

impl MemoryDocIdSource {
    pub(crate) fn new(predicate: Option<Predicate>, total_docs: DocId) -> Self {
        Self {
            predicate,
            next_doc: 0,
            total_docs,
        }
    }
}

impl DocIdSource for MemoryDocIdSource {
    fn next_batch(&mut self, max_docs: usize) -> Result<Vec<DocId>> {
        let mut batch = Vec::with_capacity(max_docs.min(1024));
        while batch.len() < max_docs && self.next_doc < self.total_docs {
            let doc_id = self.next_doc;
            self.next_doc += 1;
            if self
                .predicate
                .as_ref()
                .map_or(true, |predicate| predicate.matches(doc_id))
            {
                batch.push(doc_id);
            }
        }
        Ok(batch)
    }
}
