use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Descending,
    Ascending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Descending
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    pub columns: Vec<String>,
    pub top_n: usize,
    #[serde(default)]
    pub order: SortOrder,
}

impl GroupBy {
    pub fn new<I, S>(columns: I, top_n: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            top_n,
            order: SortOrder::Descending,
        }
    }

    pub fn with_order(self, order: SortOrder) -> Self {
        Self { order, ..self }
    }
}
