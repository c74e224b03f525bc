use once_cell::sync::OnceCell;
use quarry_segment::{DataSourceRef, SegmentRef};

use crate::plan::PlanNode;
use crate::Result;

/// Resolves the data source of one segment column.
pub struct ColumnarDataSourcePlanNode {
    segment: SegmentRef,
    column: String,
    data_source: OnceCell<DataSourceRef>,
}

impl ColumnarDataSourcePlanNode {
    pub fn new(segment: SegmentRef, column: impl Into<String>) -> Self {
        Self {
            segment,
            column: column.into(),
            data_source: OnceCell::new(),
        }
    }

    #[inline]
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl PlanNode for ColumnarDataSourcePlanNode {
    type Operator = DataSourceRef;

    fn run(&self) -> Result<Self::Operator> {
        self.data_source
            .get_or_try_init(|| -> Result<_> {
                let data_source = self.segment.data_source(&self.column).ok_or_else(|| {
                    anyhow::anyhow!(
                        "segment '{}' has no column '{}'",
                        self.segment.name(),
                        self.column
                    )
                })?;
                Ok(data_source)
            })
            .map(Clone::clone)
    }

    fn show_tree(&self, prefix: &str) {
        tracing::debug!("{}ColumnarDataSource(column: {})", prefix, self.column);
    }
}
