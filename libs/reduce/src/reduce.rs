use std::collections::BTreeMap;

use bytes::Bytes;
use itertools::Itertools;
use quarry_datatable::DataTable;
use quarry_execution::transfer::from_data_table;
use quarry_execution::{Accumulator, ExceptionKind, ProcessingException, Result, ResultBlock};
use quarry_request::Request;

use crate::ranking::rank_and_truncate;
use crate::response::{AggregationResult, BrokerResponse, GroupValue, SelectionResults};
use crate::ServerInstance;

fn decode_response(data: &[u8], request: &Request) -> Result<ResultBlock> {
    let table = DataTable::decode(data)?;
    from_data_table(&table, request)
}

/// Merges the result table of every server into the final answer.
///
/// Servers are folded in key order. A table that cannot be decoded is
/// recorded as a `decode` exception and marks the response partial; the
/// other servers still contribute. Group-by results are ranked and truncated
/// to the top-n once, independently for each aggregation function.
pub fn reduce(
    request: &Request,
    responses: BTreeMap<ServerInstance, Bytes>,
) -> Result<BrokerResponse> {
    let num_servers_queried = responses.len();
    let mut num_servers_responded = 0;
    let mut merged = ResultBlock::default();

    for (server, data) in responses {
        match decode_response(&data, request) {
            Ok(block) => {
                merged.merge(block)?;
                num_servers_responded += 1;
            }
            Err(err) => {
                tracing::warn!(server = %server, error = %err, "failed to decode server response");
                merged.partial = true;
                merged.exceptions.push(ProcessingException::new(
                    ExceptionKind::Decode,
                    server.as_str(),
                    err,
                ));
            }
        }
    }

    let mut response = BrokerResponse {
        num_docs_scanned: merged.num_docs_scanned,
        total_docs: merged.total_docs,
        time_used_ms: merged.time_used_ms,
        num_servers_queried,
        num_servers_responded,
        partial: merged.partial,
        exceptions: merged.exceptions,
        ..Default::default()
    };

    if let Some(group_by) = &request.group_by {
        let groups = merged.group_by_result.unwrap_or_default();
        response.aggregation_results = request
            .aggregations
            .iter()
            .enumerate()
            .map(|(index, aggregation)| {
                let ranked = rank_and_truncate(
                    groups
                        .groups()
                        .iter()
                        .map(|(key, accumulators)| (key, &accumulators[index]))
                        .collect_vec(),
                    |(_, accumulator)| accumulator.sort_value(),
                    group_by.order,
                    group_by.top_n,
                );
                AggregationResult {
                    function: aggregation.function_name(),
                    value: None,
                    group_by_columns: group_by.columns.clone(),
                    group_by_result: ranked
                        .into_iter()
                        .map(|(key, accumulator)| GroupValue {
                            group: key.values().to_vec(),
                            value: accumulator.value(),
                        })
                        .collect(),
                }
            })
            .collect();
    } else if request.is_aggregation() {
        let accumulators = merged.aggregation_result.unwrap_or_else(|| {
            request
                .aggregations
                .iter()
                .map(|aggregation| Accumulator::new(aggregation.aggregation_type))
                .collect()
        });
        response.aggregation_results = request
            .aggregations
            .iter()
            .zip(&accumulators)
            .map(|(aggregation, accumulator)| AggregationResult {
                function: aggregation.function_name(),
                value: Some(accumulator.value()),
                group_by_columns: Vec::new(),
                group_by_result: Vec::new(),
            })
            .collect();
    } else if let Some(selection) = &request.selection {
        let mut rows = merged
            .selection_result
            .map(|result| result.rows)
            .unwrap_or_default();
        rows.truncate(selection.size);
        response.selection_results = Some(SelectionResults {
            columns: selection.columns.clone(),
            rows,
        });
    }

    tracing::debug!(
        servers = num_servers_queried,
        responded = num_servers_responded,
        docs = response.num_docs_scanned,
        partial = response.partial,
        "reduced server responses"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quarry_array::{DataType, Scalar};
    use quarry_execution::plan::PlanMaker;
    use quarry_execution::{ExecutionConfig, ParallelismPolicy};
    use quarry_request::{AggregationInfo, AggregationType, GroupBy, Selection, SortOrder};
    use quarry_segment::{SegmentBuilder, SegmentRef};

    use super::*;

    const NUM_DOCS: i64 = 10_001;
    const COUNTRIES: &[&str] = &["nl", "de", "fr", "be", "es"];
    const DEVICES: &[&str] = &["ios", "android", "web"];

    /// Doc `i` belongs to combination `i % 15` and has `(i * 7) % 101` clicks.
    fn scenario_segment(name: &str) -> SegmentRef {
        let mut builder = SegmentBuilder::new(name)
            .dictionary_column("country", DataType::String)
            .dictionary_column("device", DataType::String)
            .raw_column("clicks", DataType::Int64);
        for i in 0..NUM_DOCS {
            builder
                .append_row(vec![
                    Scalar::from(COUNTRIES[(i % 5) as usize]),
                    Scalar::from(DEVICES[((i / 5) % 3) as usize]),
                    Scalar::Int64((i * 7) % 101),
                ])
                .unwrap();
        }
        Arc::new(builder.build().unwrap())
    }

    fn scenario_request() -> Arc<Request> {
        Arc::new(
            Request::default()
                .with_aggregation(AggregationInfo::count_star())
                .with_aggregation(AggregationInfo::new(AggregationType::Sum, "clicks"))
                .with_aggregation(AggregationInfo::new(AggregationType::Min, "clicks"))
                .with_aggregation(AggregationInfo::new(AggregationType::Max, "clicks"))
                .with_group_by(GroupBy::new(vec!["country", "device"], 15)),
        )
    }

    fn server_response(segments: Vec<SegmentRef>, request: &Arc<Request>) -> Bytes {
        let maker = PlanMaker::new(Arc::new(ExecutionConfig {
            docs_per_batch: 1000,
            ..Default::default()
        }));
        maker
            .compile_inter_segment_plan(segments, request.clone(), ParallelismPolicy::Sequential)
            .unwrap()
            .instance_response()
            .unwrap()
            .encode()
    }

    #[test]
    fn test_scenario_copies() {
        let request = scenario_request();
        let segment = scenario_segment("events_0");

        let mut single = BTreeMap::new();
        single.insert(
            ServerInstance::from("server-0"),
            server_response(vec![segment.clone()], &request),
        );
        let single = reduce(&request, single).unwrap();

        // 5 servers with 4 copies of the segment each
        let copies = server_response(vec![segment.clone(); 4], &request);
        let responses = (0..5)
            .map(|i| (ServerInstance::from(format!("server-{}", i)), copies.clone()))
            .collect();
        let copied = reduce(&request, responses).unwrap();

        assert_eq!(single.num_docs_scanned, NUM_DOCS as u64);
        assert_eq!(copied.num_docs_scanned, 20 * NUM_DOCS as u64);
        assert_eq!(copied.total_docs, 20 * NUM_DOCS as u64);
        assert_eq!(copied.num_servers_responded, 5);
        assert!(!copied.partial);
        assert!(copied.exceptions.is_empty());
        assert_eq!(copied.aggregation_results.len(), 4);

        for (single, copied) in single.aggregation_results.iter().zip(&copied.aggregation_results) {
            assert_eq!(single.function, copied.function);
            assert_eq!(single.group_by_result.len(), 15);
            assert_eq!(copied.group_by_result.len(), 15);
            for (a, b) in single.group_by_result.iter().zip(&copied.group_by_result) {
                assert_eq!(a.group, b.group);
                match single.function.as_str() {
                    "count_star" => {
                        assert_eq!(b.value, Scalar::Int64(a.value.as_i64().unwrap() * 20))
                    }
                    "sum_clicks" => {
                        assert_eq!(b.value, Scalar::Float64(a.value.as_f64().unwrap() * 20.0))
                    }
                    _ => assert_eq!(a.value, b.value),
                }
            }
        }

        // 10_001 = 15 * 666 + 11: the first 11 combinations have one doc more
        let count = single.aggregation_result("count_star").unwrap();
        assert_eq!(count.group_by_result[0].value, Scalar::Int64(667));
        assert_eq!(
            count.group_by_result[0].group,
            vec![Scalar::from("nl"), Scalar::from("ios")]
        );
        assert_eq!(count.group_by_result[14].value, Scalar::Int64(666));
        let total: i64 = count
            .group_by_result
            .iter()
            .map(|group| group.value.as_i64().unwrap())
            .sum();
        assert_eq!(total, NUM_DOCS);
    }

    #[test]
    fn test_decode_failure_is_partial() {
        let request = scenario_request();
        let mut responses = BTreeMap::new();
        responses.insert(
            ServerInstance::from("server-a"),
            server_response(vec![scenario_segment("events_0")], &request),
        );
        responses.insert(
            ServerInstance::from("server-b"),
            Bytes::from_static(b"not a table"),
        );
        let response = reduce(&request, responses).unwrap();
        assert!(response.partial);
        assert_eq!(response.num_servers_queried, 2);
        assert_eq!(response.num_servers_responded, 1);
        assert_eq!(response.num_docs_scanned, NUM_DOCS as u64);
        assert_eq!(response.exceptions.len(), 1);
        assert_eq!(response.exceptions[0].kind, ExceptionKind::Decode);
        assert_eq!(response.exceptions[0].source, "server-b");
        assert_eq!(response.aggregation_results[0].group_by_result.len(), 15);
    }

    #[test]
    fn test_top_n_and_order() {
        let request = Arc::new(
            Request::default()
                .with_aggregation(AggregationInfo::new(AggregationType::Min, "clicks"))
                .with_group_by(GroupBy::new(vec!["country"], 2).with_order(SortOrder::Ascending)),
        );
        let mut responses = BTreeMap::new();
        responses.insert(
            ServerInstance::from("server-0"),
            server_response(vec![scenario_segment("events_0")], &request),
        );
        let response = reduce(&request, responses).unwrap();
        let result = &response.aggregation_results[0];
        assert_eq!(result.group_by_columns, vec!["country".to_string()]);
        // docs 0, 101, 202, 303 and 404 have zero clicks, one per country
        assert_eq!(result.group_by_result.len(), 2);
        assert!(result
            .group_by_result
            .iter()
            .all(|group| group.value == Scalar::Float64(0.0)));
        assert_eq!(result.group_by_result[0].group, vec![Scalar::from("nl")]);
    }

    #[test]
    fn test_no_responses() {
        let request = Request::default()
            .with_aggregation(AggregationInfo::count_star())
            .with_aggregation(AggregationInfo::new(AggregationType::Max, "clicks"));
        let response = reduce(&request, BTreeMap::new()).unwrap();
        assert_eq!(response.num_servers_queried, 0);
        assert_eq!(response.aggregation_results[0].value, Some(Scalar::Int64(0)));
        assert_eq!(response.aggregation_results[1].value, Some(Scalar::Null));
    }

    #[test]
    fn test_selection_concatenates() {
        let request = Arc::new(
            Request::default().with_selection(Selection::new(vec!["country", "clicks"], 3)),
        );
        let segment = {
            let mut builder = SegmentBuilder::new("small")
                .dictionary_column("country", DataType::String)
                .raw_column("clicks", DataType::Int64);
            builder
                .append_row(vec![Scalar::from("nl"), Scalar::Int64(1)])
                .unwrap();
            builder
                .append_row(vec![Scalar::from("de"), Scalar::Int64(2)])
                .unwrap();
            let segment: SegmentRef = Arc::new(builder.build().unwrap());
            segment
        };
        let responses = (0..3)
            .map(|i| {
                (
                    ServerInstance::from(format!("server-{}", i)),
                    server_response(vec![segment.clone()], &request),
                )
            })
            .collect();
        let response = reduce(&request, responses).unwrap();
        let selection = response.selection_results.unwrap();
        assert_eq!(selection.columns, vec!["country".to_string(), "clicks".to_string()]);
        assert_eq!(
            selection.rows,
            vec![
                vec![Scalar::from("nl"), Scalar::Int64(1)],
                vec![Scalar::from("de"), Scalar::Int64(2)],
                vec![Scalar::from("nl"), Scalar::Int64(1)],
            ]
        );
        assert_eq!(response.num_docs_scanned, 6);
    }
}
