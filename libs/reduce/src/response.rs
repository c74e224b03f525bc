use quarry_array::Scalar;
use quarry_execution::ProcessingException;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Renders a scalar as a plain JSON value. Non-finite floats become `null`.
pub fn scalar_to_json(value: &Scalar) -> Value {
    match value {
        Scalar::Null => Value::Null,
        Scalar::Boolean(value) => Value::Bool(*value),
        Scalar::Int32(value) => Value::from(*value),
        Scalar::Int64(value) => Value::from(*value),
        Scalar::Float64(value) => serde_json::Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Scalar::String(value) => Value::String(value.to_string()),
    }
}

fn serialize_scalar<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
    scalar_to_json(value).serialize(serializer)
}

fn serialize_optional_scalar<S: Serializer>(
    value: &Option<Scalar>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    value.as_ref().map(scalar_to_json).serialize(serializer)
}

fn serialize_scalars<S: Serializer>(values: &[Scalar], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(scalar_to_json))
}

fn serialize_rows<S: Serializer>(rows: &[Vec<Scalar>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        rows.iter()
            .map(|row| row.iter().map(scalar_to_json).collect::<Vec<_>>()),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    #[serde(serialize_with = "serialize_scalars")]
    pub group: Vec<Scalar>,
    #[serde(serialize_with = "serialize_scalar")]
    pub value: Scalar,
}

/// The answer of one aggregation function: a single value, or the ranked
/// groups when the request has a group-by.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub function: String,
    #[serde(
        serialize_with = "serialize_optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Scalar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by_columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by_result: Vec<GroupValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResults {
    pub columns: Vec<String>,
    #[serde(serialize_with = "serialize_rows")]
    pub rows: Vec<Vec<Scalar>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerResponse {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregation_results: Vec<AggregationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_results: Option<SelectionResults>,
    pub num_docs_scanned: u64,
    pub total_docs: u64,
    pub time_used_ms: u64,
    pub num_servers_queried: usize,
    pub num_servers_responded: usize,
    /// Set when a server timed out on some segments or could not be decoded.
    pub partial: bool,
    pub exceptions: Vec<ProcessingException>,
}

impl BrokerResponse {
    pub fn aggregation_result(&self, function: &str) -> Option<&AggregationResult> {
        self.aggregation_results
            .iter()
            .find(|result| result.function == function)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
