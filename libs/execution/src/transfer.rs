//! Conversion between [`ResultBlock`] and the [`DataTable`] sent to the
//! reduce service.
//!
//! The table layout follows the request shape:
//!
//! * aggregation: one row, one column per function;
//! * group-by: one row per group, a `group` column holding the key values
//!   followed by one column per function;
//! * selection: one row per selected row, one column per selected column
//!   with each value wrapped in a single element object array.
//!
//! Counts are Int64 and sums Float64 cells. Min and max are object arrays
//! that are empty when there is no value, and avg is a `[sum, count]` object
//! array. Doc counts, timing, partial state and exceptions travel in the
//! metadata map.

use std::str::FromStr;

use quarry_array::Scalar;
use quarry_datatable::{Cell, ColumnKind, ColumnSchema, DataTable};
use quarry_request::{AggregationInfo, AggregationType, Request};

use crate::aggregation::{new_accumulators, Accumulator};
use crate::block::{ProcessingException, SelectionResult};
use crate::group_by::{GroupByResult, GroupKey};
use crate::{Error, Result, ResultBlock};

pub const GROUP_COLUMN: &str = "group";

pub const NUM_DOCS_SCANNED: &str = "numDocsScanned";
pub const TOTAL_DOCS: &str = "totalDocs";
pub const TIME_USED_MS: &str = "timeUsedMs";
pub const PARTIAL: &str = "partial";
pub const NUM_UNFINISHED: &str = "numUnfinished";
pub const EXCEPTIONS: &str = "exceptions";

fn column_kind(aggregation_type: AggregationType) -> ColumnKind {
    match aggregation_type {
        AggregationType::Count => ColumnKind::Int64,
        AggregationType::Sum => ColumnKind::Float64,
        AggregationType::Min | AggregationType::Max | AggregationType::Avg => {
            ColumnKind::ObjectArray
        }
    }
}

fn accumulator_cell(accumulator: &Accumulator) -> Cell {
    match accumulator {
        Accumulator::Count(count) => Cell::Int64(*count as i64),
        Accumulator::Sum(sum) => Cell::Float64(*sum),
        Accumulator::Min(value) | Accumulator::Max(value) => {
            Cell::ObjectArray(value.iter().map(|value| Scalar::Float64(*value)).collect())
        }
        Accumulator::Avg { sum, count } => {
            Cell::ObjectArray(vec![Scalar::Float64(*sum), Scalar::Int64(*count as i64)])
        }
    }
}

fn accumulator_from_cell(cell: &Cell, aggregation: &AggregationInfo) -> Result<Accumulator> {
    let accumulator = match (aggregation.aggregation_type, cell) {
        (AggregationType::Count, Cell::Int64(count)) if *count >= 0 => {
            Some(Accumulator::Count(*count as u64))
        }
        (AggregationType::Sum, Cell::Float64(sum)) => Some(Accumulator::Sum(*sum)),
        (AggregationType::Min, Cell::ObjectArray(values)) => {
            optional_number(values).map(Accumulator::Min)
        }
        (AggregationType::Max, Cell::ObjectArray(values)) => {
            optional_number(values).map(Accumulator::Max)
        }
        (AggregationType::Avg, Cell::ObjectArray(values)) => match values.as_slice() {
            [sum, count] => match (sum.as_f64(), count.as_i64()) {
                (Some(sum), Some(count)) if count >= 0 => Some(Accumulator::Avg {
                    sum,
                    count: count as u64,
                }),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    };
    accumulator.ok_or_else(|| {
        malformed_table!(
            "invalid value {:?} for {}",
            cell,
            aggregation.function_name()
        )
    })
}

/// `[]` is no value, `[x]` is the number `x`.
fn optional_number(values: &[Scalar]) -> Option<Option<f64>> {
    match values {
        [] => Some(None),
        [value] => value.as_f64().map(Some),
        _ => None,
    }
}

fn aggregation_schema(request: &Request) -> Vec<ColumnSchema> {
    request
        .aggregations
        .iter()
        .map(|aggregation| {
            ColumnSchema::new(
                aggregation.function_name(),
                column_kind(aggregation.aggregation_type),
            )
        })
        .collect()
}

fn push_row(table: &mut DataTable, row: Vec<Cell>) -> Result<()> {
    table.push_row(row).map_err(Error::Execution)
}

/// Encodes the result of `request` for transfer.
pub fn to_data_table(block: &ResultBlock, request: &Request) -> Result<DataTable> {
    let mut table = if request.is_group_by() {
        let mut schema = vec![ColumnSchema::new(GROUP_COLUMN, ColumnKind::ObjectArray)];
        schema.extend(aggregation_schema(request));
        let mut table = DataTable::new(schema);
        if let Some(groups) = &block.group_by_result {
            for (key, accumulators) in groups.groups() {
                let mut row = Vec::with_capacity(accumulators.len() + 1);
                row.push(Cell::ObjectArray(key.values().to_vec()));
                row.extend(accumulators.iter().map(accumulator_cell));
                push_row(&mut table, row)?;
            }
        }
        table
    } else if request.is_aggregation() {
        let mut table = DataTable::new(aggregation_schema(request));
        let row = match &block.aggregation_result {
            Some(accumulators) => accumulators.iter().map(accumulator_cell).collect(),
            None => new_accumulators(&request.aggregations)
                .iter()
                .map(accumulator_cell)
                .collect(),
        };
        push_row(&mut table, row)?;
        table
    } else {
        let columns = request
            .selection
            .as_ref()
            .map(|selection| selection.columns.clone())
            .unwrap_or_default();
        let mut table = DataTable::new(
            columns
                .iter()
                .map(|column| ColumnSchema::new(column.clone(), ColumnKind::ObjectArray))
                .collect(),
        );
        if let Some(selection) = &block.selection_result {
            for row in &selection.rows {
                push_row(
                    &mut table,
                    row.iter()
                        .map(|value| Cell::ObjectArray(vec![value.clone()]))
                        .collect(),
                )?;
            }
        }
        table
    };

    table.set_metadata(NUM_DOCS_SCANNED, block.num_docs_scanned);
    table.set_metadata(TOTAL_DOCS, block.total_docs);
    table.set_metadata(TIME_USED_MS, block.time_used_ms);
    table.set_metadata(PARTIAL, block.partial);
    table.set_metadata(NUM_UNFINISHED, block.num_unfinished);
    if !block.exceptions.is_empty() {
        table.set_metadata(
            EXCEPTIONS,
            serde_json::to_string(&block.exceptions).map_err(anyhow::Error::from)?,
        );
    }
    Ok(table)
}

fn metadata<T: FromStr>(table: &DataTable, key: &str, default: Option<T>) -> Result<T> {
    match table.metadata_value(key) {
        Some(value) => value
            .parse()
            .map_err(|_| malformed_table!("invalid metadata value for '{}': '{}'", key, value)),
        None => default.ok_or_else(|| malformed_table!("missing metadata '{}'", key)),
    }
}

/// Resolves the column of every aggregation and checks its kind.
fn aggregation_columns(table: &DataTable, request: &Request) -> Result<Vec<usize>> {
    request
        .aggregations
        .iter()
        .map(|aggregation| -> Result<usize> {
            let name = aggregation.function_name();
            let index = table
                .column_index(&name)
                .ok_or_else(|| malformed_table!("missing column '{}'", name))?;
            let kind = table.schema()[index].kind;
            if kind != column_kind(aggregation.aggregation_type) {
                return Err(malformed_table!(
                    "column '{}' has kind {}, expected {}",
                    name,
                    kind,
                    column_kind(aggregation.aggregation_type)
                ));
            }
            Ok(index)
        })
        .collect()
}

fn row_accumulators(
    row: &[Cell],
    columns: &[usize],
    aggregations: &[AggregationInfo],
) -> Result<Vec<Accumulator>> {
    columns
        .iter()
        .zip(aggregations)
        .map(|(index, aggregation)| accumulator_from_cell(&row[*index], aggregation))
        .collect()
}

/// Decodes a table produced by [`to_data_table`] for the same request.
pub fn from_data_table(table: &DataTable, request: &Request) -> Result<ResultBlock> {
    let mut block = ResultBlock {
        num_docs_scanned: metadata(table, NUM_DOCS_SCANNED, None)?,
        total_docs: metadata(table, TOTAL_DOCS, None)?,
        time_used_ms: metadata(table, TIME_USED_MS, Some(0))?,
        partial: metadata(table, PARTIAL, Some(false))?,
        num_unfinished: metadata(table, NUM_UNFINISHED, Some(0))?,
        ..Default::default()
    };
    if let Some(exceptions) = table.metadata_value(EXCEPTIONS) {
        block.exceptions = serde_json::from_str::<Vec<ProcessingException>>(exceptions)
            .map_err(|err| malformed_table!("invalid exceptions: {}", err))?;
    }

    if request.is_group_by() {
        let group_column = table
            .column_index(GROUP_COLUMN)
            .filter(|index| table.schema()[*index].kind == ColumnKind::ObjectArray)
            .ok_or_else(|| malformed_table!("missing column '{}'", GROUP_COLUMN))?;
        let columns = aggregation_columns(table, request)?;
        let arity = request
            .group_by
            .as_ref()
            .map_or(0, |group_by| group_by.columns.len());
        let mut groups = GroupByResult::default();
        for row in table.rows() {
            let key = match &row[group_column] {
                Cell::ObjectArray(values) if values.len() == arity => {
                    GroupKey::from(values.clone())
                }
                Cell::ObjectArray(values) => {
                    return Err(malformed_table!(
                        "group key has {} values, expected {}",
                        values.len(),
                        arity
                    ))
                }
                cell => return Err(malformed_table!("invalid group key {:?}", cell)),
            };
            groups
                .insert(key, row_accumulators(row, &columns, &request.aggregations)?)
                .map_err(|err| malformed_table!("{}", err))?;
        }
        block.group_by_result = Some(groups);
    } else if request.is_aggregation() {
        let columns = aggregation_columns(table, request)?;
        let row = match table.rows() {
            [row] => row,
            rows => {
                return Err(malformed_table!(
                    "aggregation table has {} rows, expected 1",
                    rows.len()
                ))
            }
        };
        block.aggregation_result = Some(row_accumulators(row, &columns, &request.aggregations)?);
    } else if let Some(selection) = &request.selection {
        let columns = selection
            .columns
            .iter()
            .map(|column| {
                table
                    .column_index(column)
                    .ok_or_else(|| malformed_table!("missing column '{}'", column))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut result = SelectionResult::new(selection.columns.clone(), selection.size);
        for row in table.rows() {
            let values = columns
                .iter()
                .map(|index| match row[*index].as_object_array() {
                    Some([value]) => Ok(value.clone()),
                    _ => Err(malformed_table!("invalid selection value {:?}", row[*index])),
                })
                .collect::<Result<Vec<_>>>()?;
            result.rows.push(values);
        }
        block.selection_result = Some(result);
    }

    Ok(block)
}
