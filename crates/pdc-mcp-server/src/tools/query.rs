use rmcp::model::{CallToolResult, Content, ErrorCode, Tool};
use rmcp::schemars;
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::McpError;
use crate::graphql::Forwarder;

/// The name of the tool that queries the PDC GraphQL API
pub const QUERY_TOOL_NAME: &str = "pdc_graphql_query";

const DESCRIPTION: &str = r#"Execute a GraphQL query against the Proteomic Data Commons (PDC) API, the public repository of the NCI Clinical Proteomic Tumor Analysis Consortium (CPTAC) and related cancer proteomics programs. The result is the JSON response of the API.

How to write queries:
- Send a single GraphQL `query` document. Only queries are supported by the PDC API; do not send mutations or subscriptions.
- Most PDC query fields require the argument `acceptDUA: true`, which accepts the PDC Data Use Agreement. Always include it, for example `allPrograms(acceptDUA: true) { ... }`. Omitting it produces an error from the API.
- Select only the fields you need. Responses for studies, files and quantitative data can be very large; use the `offset` and `limit` arguments of paginated fields (such as `paginatedCasesSamplesAliquots`, `getPaginatedUIStudy` or `getPaginatedUIGene`) to keep them small.
- Prefer passing dynamic values as `variables` instead of inlining them, for example `query Study($id: String!) { study(study_id: $id, acceptDUA: true) { study_name disease_type primary_site } }` with variables `{"id": "..."}`.
- Identifiers come in two flavours: internal UUIDs (`study_id`, `case_id`, `file_id`) and human readable submitter IDs such as `study_submitter_id` or the `pdc_study_id` (for example `PDC000120`). Use the argument that matches the identifier you have.

Useful entry points:
- `allPrograms(acceptDUA: true)`: programs, their projects and studies.
- `study(study_id | study_submitter_id | pdc_study_id, acceptDUA: true)`: study metadata.
- `case(case_id | case_submitter_id, acceptDUA: true)`: clinical and biospecimen details of a case.
- `filesPerStudy(study_id | pdc_study_id, data_category, file_type, acceptDUA: true)`: files and download metadata.
- `geneSpectralCount(gene_name, acceptDUA: true)`: spectral counts of a gene across studies.
- `quantDataMatrix(study_submitter_id | pdc_study_id, data_type, acceptDUA: true)`: quantitative data matrices, where `data_type` is `log2_ratio` or `unshared_log2_ratio`. These are large; query them only when needed.

If you are unsure about the available fields, run a GraphQL introspection query such as `{ __type(name: "Query") { fields { name args { name } } } }` through this tool first.

Errors are reported in the `errors` array of the result. Errors produced by the API itself are returned unchanged. Errors produced while contacting the API carry an `extensions` object with the HTTP `statusCode` and the response content, or `clientError: true` when the API could not be reached."#;

/// Queries the PDC GraphQL API
#[derive(Clone)]
pub struct Query {
    pub tool: Tool,
    forwarder: Forwarder,
}

/// Input for the query tool.
#[derive(Debug, JsonSchema, Deserialize)]
#[schemars(crate = "rmcp::schemars")]
pub struct Input {
    /// The GraphQL query document to execute against the PDC API
    pub query: String,

    /// Variables referenced by the query, as a JSON object
    #[serde(default, deserialize_with = "deserialize_variables")]
    #[schemars(with = "Option<Map<String, Value>>")]
    pub variables: Option<Map<String, Value>>,
}

impl Query {
    #[allow(clippy::panic)]
    pub fn new(forwarder: Forwarder) -> Self {
        Self {
            tool: Tool::new(QUERY_TOOL_NAME, DESCRIPTION, schema_from_type!(Input)),
            forwarder,
        }
    }

    pub async fn execute(&self, input: Input) -> Result<CallToolResult, McpError> {
        if input.query.trim().is_empty() {
            return Err(McpError::new(
                ErrorCode::INVALID_PARAMS,
                "The query must not be empty".to_string(),
                None,
            ));
        }

        let response = self
            .forwarder
            .forward(&input.query, input.variables.as_ref())
            .await;

        let text = serde_json::to_string_pretty(&response).map_err(|error| {
            McpError::new(
                ErrorCode::INTERNAL_ERROR,
                format!("Failed to serialize GraphQL response: {error}"),
                None,
            )
        })?;

        let content = vec![Content::text(text)];
        if has_errors_without_data(&response) {
            debug!("GraphQL response contains only errors");
            Ok(CallToolResult::error(content))
        } else {
            Ok(CallToolResult::success(content))
        }
    }
}

fn has_errors_without_data(response: &Value) -> bool {
    response
        .get("errors")
        .filter(|value| !value.is_null())
        .is_some()
        && response
            .get("data")
            .filter(|value| !value.is_null())
            .is_none()
}

/// Accept variables as a JSON object, or as a string containing one
fn deserialize_variables<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(variables)) => Ok(Some(variables)),
        Some(Value::String(variables)) if variables.trim().is_empty() => Ok(None),
        Some(Value::String(variables)) => {
            serde_json::from_str::<Option<Map<String, Value>>>(&variables)
                .map_err(serde::de::Error::custom)
        }
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected variables to be a JSON object, found {other}"
        ))),
    }
}
