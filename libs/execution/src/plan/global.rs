use once_cell::sync::OnceCell;
use quarry_datatable::DataTable;
use quarry_request::RequestRef;

use crate::operator::drain_blocks;
use crate::plan::{CombinePlanNode, PlanNode};
use crate::{transfer, Error, Result, ResultBlock};

/// The plan of one server instance: a combine over the plans of all of its
/// segments.
pub struct GlobalPlan {
    request: RequestRef,
    root: CombinePlanNode,
    result: OnceCell<std::result::Result<ResultBlock, String>>,
}

impl GlobalPlan {
    pub(crate) fn new(request: RequestRef, root: CombinePlanNode) -> Self {
        Self {
            request,
            root,
            result: OnceCell::new(),
        }
    }

    #[inline]
    pub fn request(&self) -> &RequestRef {
        &self.request
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.root.num_children()
    }

    /// Runs the plan once and returns the merged block of all segments. A
    /// failure is kept too, and later calls report the same error.
    ///
    /// With a parallel policy this blocks on the runtime, so it must not be
    /// called from within an asynchronous task.
    pub fn execute(&self) -> Result<&ResultBlock> {
        let result = self.result.get_or_init(|| {
            let block = self
                .root
                .run()
                .and_then(|operator| Ok(drain_blocks(&operator)?));
            block.map_err(|err| match err {
                Error::Execution(err) => format!("{:#}", err),
                err => err.to_string(),
            })
        });
        match result {
            Ok(block) => Ok(block),
            Err(message) => Err(Error::Execution(anyhow::anyhow!("{}", message))),
        }
    }

    /// Executes the plan and encodes the result for the reduce service.
    pub fn instance_response(&self) -> Result<DataTable> {
        transfer::to_data_table(self.execute()?, &self.request)
    }

    pub fn show_tree(&self) {
        self.root.show_tree("");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quarry_array::{DataType, Scalar};
    use quarry_request::{AggregationInfo, AggregationType, FilterQuery, GroupBy, Request};
    use quarry_segment::{
        BoxDocIdSource, DataSourceRef, DocId, DocIdSource, IndexSegment, SchemaRef,
        SegmentBuilder, SegmentRef,
    };

    use crate::aggregation::Accumulator;
    use crate::config::{ExecutionConfig, ParallelismPolicy};
    use crate::plan::PlanMaker;

    fn segment(name: &str, offset: i64) -> SegmentRef {
        let mut builder = SegmentBuilder::new(name)
            .dictionary_column("country", DataType::String)
            .raw_column("clicks", DataType::Int64);
        for i in 0..10 {
            builder
                .append_row(vec![
                    Scalar::from(if i % 3 == 0 { "nl" } else { "de" }),
                    Scalar::Int64(offset + i),
                ])
                .unwrap();
        }
        Arc::new(builder.build().unwrap())
    }

    fn request() -> Arc<Request> {
        Arc::new(
            Request::default()
                .with_aggregation(AggregationInfo::count_star())
                .with_aggregation(AggregationInfo::new(AggregationType::Sum, "clicks"))
                .with_group_by(GroupBy::new(vec!["country"], 10)),
        )
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let segments = vec![segment("s0", 0), segment("s1", 100), segment("s2", 1000)];
        let maker = PlanMaker::new(Arc::new(ExecutionConfig {
            docs_per_batch: 4,
            ..Default::default()
        }));

        let sequential = maker
            .compile_inter_segment_plan(segments.clone(), request(), ParallelismPolicy::Sequential)
            .unwrap();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let parallel = maker
            .compile_inter_segment_plan(
                segments,
                request(),
                ParallelismPolicy::Parallel(runtime.handle().clone()),
            )
            .unwrap();
        assert_eq!(parallel.num_segments(), 3);

        let sequential = sequential.execute().unwrap();
        let parallel_block = parallel.execute().unwrap();
        assert_eq!(sequential.num_docs_scanned, 30);
        assert_eq!(sequential.total_docs, 30);
        assert!(!sequential.partial);

        let expected = sequential.group_by_result.as_ref().unwrap();
        let actual = parallel_block.group_by_result.as_ref().unwrap();
        assert_eq!(expected.len(), 2);
        for (key, accumulators) in expected.groups() {
            assert_eq!(actual.get(key), Some(accumulators.as_slice()));
        }

        let nl = expected.get(&vec![Scalar::from("nl")].into()).unwrap();
        // i in {0, 3, 6, 9} for each of the three offsets
        assert_eq!(
            nl,
            &[Accumulator::Count(12), Accumulator::Sum(18.0 * 3.0 + 4.0 * 1100.0)][..]
        );

        // the result is memoized
        assert!(std::ptr::eq(parallel_block, parallel.execute().unwrap()));
    }

    struct CorruptSegment(SegmentRef);

    struct CorruptDocIds;

    impl DocIdSource for CorruptDocIds {
        fn next_batch(&mut self, _max_docs: usize) -> anyhow::Result<Vec<DocId>> {
            anyhow::bail!("corrupt index")
        }
    }

    impl IndexSegment for CorruptSegment {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn schema(&self) -> SchemaRef {
            self.0.schema()
        }

        fn total_docs(&self) -> usize {
            self.0.total_docs()
        }

        fn data_source(&self, column: &str) -> Option<DataSourceRef> {
            self.0.data_source(column)
        }

        fn doc_id_source(&self, _filter: Option<&FilterQuery>) -> anyhow::Result<BoxDocIdSource> {
            Ok(Box::new(CorruptDocIds))
        }
    }

    #[test]
    fn test_failure_is_memoized() {
        let segments: Vec<SegmentRef> = vec![Arc::new(CorruptSegment(segment("s0", 0)))];
        let maker = PlanMaker::new(Arc::new(ExecutionConfig::default()));
        let plan = maker
            .compile_inter_segment_plan(segments, request(), ParallelismPolicy::Sequential)
            .unwrap();

        let first = plan.execute().unwrap_err().to_string();
        assert!(first.contains("corrupt index"));
        assert_eq!(plan.execute().unwrap_err().to_string(), first);
        assert_eq!(plan.instance_response().unwrap_err().to_string(), first);
    }

    #[test]
    fn test_no_segments() {
        let maker = PlanMaker::new(Arc::new(ExecutionConfig::default()));
        let plan = maker
            .compile_inter_segment_plan(Vec::new(), request(), ParallelismPolicy::Sequential)
            .unwrap();
        let block = plan.execute().unwrap();
        assert_eq!(block.num_docs_scanned, 0);
        assert!(!block.partial);
        let table = plan.instance_response().unwrap();
        assert_eq!(table.num_rows(), 0);
    }

    mod partitioning {
        use ahash::AHashMap;
        use proptest::prelude::*;

        use super::*;
        use crate::group_by::GroupKey;
        use crate::ResultBlock;

        type Doc = (u8, u8, i64);

        fn build_segment(name: &str, docs: &[Doc], dictionary: bool) -> SegmentRef {
            let builder = SegmentBuilder::new(name);
            let mut builder = if dictionary {
                builder
                    .dictionary_column("country", DataType::String)
                    .dictionary_column("device", DataType::Int32)
            } else {
                builder
                    .raw_column("country", DataType::String)
                    .raw_column("device", DataType::Int32)
            }
            .raw_column("clicks", DataType::Int64);
            for (country, device, clicks) in docs {
                builder
                    .append_row(vec![
                        Scalar::from(format!("c{}", country)),
                        Scalar::Int32(*device as i32),
                        Scalar::Int64(*clicks),
                    ])
                    .unwrap();
            }
            Arc::new(builder.build().unwrap())
        }

        fn metrics_request(group_by: bool) -> Arc<Request> {
            let request = Request::default()
                .with_aggregation(AggregationInfo::count_star())
                .with_aggregation(AggregationInfo::new(AggregationType::Sum, "clicks"))
                .with_aggregation(AggregationInfo::new(AggregationType::Min, "clicks"))
                .with_aggregation(AggregationInfo::new(AggregationType::Max, "clicks"));
            Arc::new(if group_by {
                request.with_group_by(GroupBy::new(vec!["country", "device"], 100))
            } else {
                request
            })
        }

        fn expected(docs: &[Doc]) -> AHashMap<GroupKey, Vec<Accumulator>> {
            let mut groups: AHashMap<GroupKey, Vec<Accumulator>> = AHashMap::new();
            for (country, device, clicks) in docs {
                let key: GroupKey = vec![
                    Scalar::from(format!("c{}", country)),
                    Scalar::Int32(*device as i32),
                ]
                .into();
                let accumulators = groups.entry(key).or_insert_with(|| {
                    vec![
                        Accumulator::Count(0),
                        Accumulator::Sum(0.0),
                        Accumulator::Min(None),
                        Accumulator::Max(None),
                    ]
                });
                accumulators[0].count_row();
                for accumulator in &mut accumulators[1..] {
                    accumulator.absorb(&Scalar::Int64(*clicks));
                }
            }
            groups
        }

        fn run(
            docs: &[Doc],
            num_segments: usize,
            batch: usize,
            dictionary: bool,
            group_by: bool,
        ) -> ResultBlock {
            let segments = if docs.is_empty() {
                vec![build_segment("segment_0", docs, dictionary)]
            } else {
                let chunk = (docs.len() + num_segments - 1) / num_segments;
                docs.chunks(chunk)
                    .enumerate()
                    .map(|(i, docs)| build_segment(&format!("segment_{}", i), docs, dictionary))
                    .collect()
            };
            let maker = PlanMaker::new(Arc::new(ExecutionConfig {
                docs_per_batch: batch,
                ..Default::default()
            }));
            let plan = maker
                .compile_inter_segment_plan(
                    segments,
                    metrics_request(group_by),
                    ParallelismPolicy::Sequential,
                )
                .unwrap();
            plan.execute().unwrap().clone()
        }

        proptest! {
            #[test]
            fn test_result_independent_of_partitioning(
                docs in prop::collection::vec((0u8..4, 0u8..3, -50i64..50), 0..150),
                segments in 1usize..5,
                batch in 1usize..40,
                dictionary in any::<bool>(),
            ) {
                let expected = expected(&docs);

                let block = run(&docs, segments, batch, dictionary, true);
                prop_assert_eq!(block.num_docs_scanned, docs.len() as u64);
                let groups = block.group_by_result.unwrap_or_default();
                prop_assert_eq!(groups.len(), expected.len());
                for (key, accumulators) in &expected {
                    prop_assert_eq!(groups.get(key), Some(accumulators.as_slice()));
                }

                let block = run(&docs, segments, batch, dictionary, false);
                let mut total = vec![
                    Accumulator::Count(0),
                    Accumulator::Sum(0.0),
                    Accumulator::Min(None),
                    Accumulator::Max(None),
                ];
                for accumulators in expected.values() {
                    for (total, accumulator) in total.iter_mut().zip(accumulators) {
                        total.merge(accumulator).unwrap();
                    }
                }
                prop_assert_eq!(block.aggregation_result, Some(total));
            }
        }
    }
}
