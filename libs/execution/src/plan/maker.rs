use std::sync::Arc;

use itertools::Itertools;
use quarry_request::{AggregationType, Request, RequestRef};
use quarry_segment::{Schema, SegmentRef};

use crate::config::{ExecutionConfigRef, ParallelismPolicy};
use crate::plan::{
    AggregationGroupByPlanNode, AggregationPlanNode, BoxBlockPlanNode, ColumnarDataSourcePlanNode,
    CombinePlanNode, DocIdSetPlanNode, GlobalPlan, GroupByStrategy, PlanNode, ProjectionPlanNode,
    SelectionPlanNode,
};
use crate::{BlockOperatorRef, CancelFlag, Result};

/// The plan of one segment; its operator produces one result block.
pub struct InnerSegmentPlan {
    segment_name: String,
    root: BoxBlockPlanNode,
}

impl InnerSegmentPlan {
    #[inline]
    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }
}

impl PlanNode for InnerSegmentPlan {
    type Operator = BlockOperatorRef;

    fn run(&self) -> Result<Self::Operator> {
        self.root.run()
    }

    fn show_tree(&self, prefix: &str) {
        self.root.show_tree(prefix);
    }
}

/// Checks the parts of a request that do not depend on a segment.
fn validate_request(request: &Request) -> Result<()> {
    match (request.is_aggregation(), &request.selection) {
        (false, None) => invalid_plan!("request has neither aggregations nor a selection"),
        (true, Some(_)) => invalid_plan!("request cannot have both aggregations and a selection"),
        _ => {}
    }

    if let Some(selection) = &request.selection {
        if selection.columns.is_empty() {
            invalid_plan!("selection has no columns");
        }
    }

    if let Some(group_by) = &request.group_by {
        if !request.is_aggregation() {
            invalid_plan!("group-by requires at least one aggregation");
        }
        if group_by.top_n == 0 {
            invalid_plan!("group-by top-n must be greater than zero");
        }
    }

    for aggregation in &request.aggregations {
        if aggregation.input_column().is_none()
            && aggregation.aggregation_type != AggregationType::Count
        {
            invalid_plan!(
                "'*' is only supported by count, not by {}",
                aggregation.aggregation_type
            );
        }
    }
    Ok(())
}

/// Checks that every column the request references exists in `schema` with a
/// type its consumers accept.
fn validate_columns(segment_name: &str, schema: &Schema, request: &Request) -> Result<()> {
    let ensure_column = |column: &str| -> Result<()> {
        if schema.field(column).is_none() {
            invalid_plan!("segment '{}' has no column '{}'", segment_name, column);
        }
        Ok(())
    };

    if let Some(filter) = &request.filter {
        for column in filter.columns() {
            ensure_column(column)?;
        }
    }

    if let Some(group_by) = &request.group_by {
        for column in &group_by.columns {
            ensure_column(column)?;
        }
    }

    if let Some(selection) = &request.selection {
        for column in &selection.columns {
            ensure_column(column)?;
        }
    }

    for aggregation in &request.aggregations {
        let column = match aggregation.input_column() {
            Some(column) => column,
            None => continue,
        };
        match schema.field(column) {
            None => invalid_plan!("segment '{}' has no column '{}'", segment_name, column),
            Some((_, field))
                if aggregation.aggregation_type.requires_numeric()
                    && !field.data_type.is_numeric() =>
            {
                invalid_plan!(
                    "{} requires a numeric column, but '{}' is {}",
                    aggregation.aggregation_type,
                    column,
                    field.data_type
                )
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Compiles requests into plans over one or many segments.
pub struct PlanMaker {
    config: ExecutionConfigRef,
}

impl PlanMaker {
    pub fn new(config: ExecutionConfigRef) -> Self {
        Self { config }
    }

    pub fn compile_inner_segment_plan(
        &self,
        segment: SegmentRef,
        request: &RequestRef,
    ) -> Result<InnerSegmentPlan> {
        validate_request(request)?;
        self.make_inner_segment_plan(segment, request, CancelFlag::default())
    }

    pub fn compile_inter_segment_plan(
        &self,
        segments: Vec<SegmentRef>,
        request: RequestRef,
        policy: ParallelismPolicy,
    ) -> Result<GlobalPlan> {
        validate_request(&request)?;

        let cancel = CancelFlag::default();
        let children = segments
            .into_iter()
            .map(|segment| self.make_inner_segment_plan(segment, &request, cancel.clone()))
            .try_collect()?;
        let root = CombinePlanNode::new(children, self.config.clone(), policy, cancel);

        let plan = GlobalPlan::new(request, root);
        plan.show_tree();
        Ok(plan)
    }

    fn make_inner_segment_plan(
        &self,
        segment: SegmentRef,
        request: &Request,
        cancel: CancelFlag,
    ) -> Result<InnerSegmentPlan> {
        validate_columns(segment.name(), &segment.schema(), request)?;

        let data_sources = request
            .projected_columns()
            .into_iter()
            .map(|column| Arc::new(ColumnarDataSourcePlanNode::new(segment.clone(), column)))
            .collect::<Vec<_>>();
        let projection = Arc::new(ProjectionPlanNode::new(
            DocIdSetPlanNode::new(
                segment.clone(),
                request.filter.clone(),
                self.config.docs_per_batch,
            ),
            data_sources.clone(),
        ));
        let total_docs = segment.total_docs() as u64;

        let root: BoxBlockPlanNode = match (&request.group_by, &request.selection) {
            (Some(group_by), _) => {
                let group_sources = group_by
                    .columns
                    .iter()
                    .filter_map(|column| {
                        data_sources
                            .iter()
                            .find(|node| node.column() == column.as_str())
                            .cloned()
                    })
                    .collect::<Vec<_>>();
                Box::new(AggregationGroupByPlanNode::new(
                    projection,
                    group_by.clone(),
                    request.aggregations.clone(),
                    self.group_by_strategy(&group_sources)?,
                    total_docs,
                    cancel,
                ))
            }
            (None, Some(selection)) => Box::new(SelectionPlanNode::new(
                projection,
                selection.clone(),
                total_docs,
                cancel,
            )),
            (None, None) => Box::new(AggregationPlanNode::new(
                projection,
                request.aggregations.clone(),
                total_docs,
                cancel,
            )),
        };

        Ok(InnerSegmentPlan {
            segment_name: segment.name().to_string(),
            root,
        })
    }

    /// Uses the trie when every group column is dictionary encoded and the
    /// number of possible groups stays within the configured limit.
    fn group_by_strategy(
        &self,
        group_sources: &[Arc<ColumnarDataSourcePlanNode>],
    ) -> Result<GroupByStrategy> {
        let mut dictionaries = Vec::with_capacity(group_sources.len());
        for node in group_sources {
            match node.run()?.dictionary() {
                Some(dictionary) => dictionaries.push(dictionary),
                None => return Ok(GroupByStrategy::Hash),
            }
        }

        let group_space = dictionaries
            .iter()
            .try_fold(1usize, |space, dictionary| space.checked_mul(dictionary.len()));
        match group_space {
            Some(space) if space <= self.config.trie_group_space_limit => {
                Ok(GroupByStrategy::Trie(dictionaries))
            }
            _ => Ok(GroupByStrategy::Hash),
        }
    }
}
