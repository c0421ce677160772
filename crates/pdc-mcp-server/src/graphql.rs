//! Forward GraphQL operations to the upstream PDC API
//!
//! Every outcome of a forwarded request, including transport failures, is
//! reported back as a JSON value shaped like a GraphQL response. Callers only
//! need to look at the `errors` field, whether the error came from the
//! upstream or was synthesized here.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::ServerError;

/// The public PDC GraphQL endpoint
pub const DEFAULT_ENDPOINT: &str = "https://pdc.cancer.gov/graphql";

/// The user agent identifying this server to the upstream API
pub const USER_AGENT_VALUE: &str = concat!(
    "pdc-mcp-server/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/pdc-mcp/pdc-mcp-server)"
);

/// Maximum number of characters of a raw response body embedded in an error
pub const RESPONSE_TEXT_LIMIT: usize = 1000;

const QUERY_LOG_LIMIT: usize = 200;
const VARIABLES_LOG_LIMIT: usize = 150;

/// The body of a GraphQL request
#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Map<String, Value>>,
}

/// A reason the upstream response can't be handed back as-is
#[derive(Debug, thiserror::Error)]
pub(crate) enum ForwardError {
    #[error("API Error {status}: Failed to parse JSON response.")]
    InvalidJson { status: u16, response_text: String },

    #[error("API Error {status}: Non-JSON response received.")]
    NonJson {
        status: u16,
        content_type: Option<String>,
        response_text: String,
    },

    #[error("API Error {status}")]
    Http { status: u16, response_body: Value },

    #[error("{0}")]
    Client(#[from] reqwest::Error),
}

impl ForwardError {
    /// Convert the error into a GraphQL-style `{ "errors": [...] }` response
    pub(crate) fn into_envelope(self) -> Value {
        let message = self.to_string();
        let extensions = match self {
            ForwardError::InvalidJson {
                status,
                response_text,
            } => json!({
                "statusCode": status,
                "responseText": response_text,
            }),
            ForwardError::NonJson {
                status,
                content_type,
                response_text,
            } => json!({
                "statusCode": status,
                "contentType": content_type,
                "responseText": response_text,
            }),
            ForwardError::Http {
                status,
                response_body,
            } => json!({
                "statusCode": status,
                "responseBody": response_body,
            }),
            ForwardError::Client(_) => json!({ "clientError": true }),
        };

        json!({
            "errors": [{
                "message": message,
                "extensions": extensions,
            }]
        })
    }
}

/// Sends GraphQL operations to a fixed endpoint
#[derive(Clone, Debug)]
pub struct Forwarder {
    client: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl Forwarder {
    /// Create a forwarder for the endpoint.
    ///
    /// The supplied headers are sent with every request. `Content-Type` and
    /// `User-Agent` are always set and replace any configured values.
    pub fn new(endpoint: Url, headers: HeaderMap) -> Result<Self, ServerError> {
        let headers = {
            let mut headers = headers;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
            headers
        };

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint,
            headers,
        })
    }

    /// The endpoint operations are sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Forward a query and return the upstream response, or a synthesized
    /// `errors` response when the upstream result is unusable.
    pub async fn forward(&self, query: &str, variables: Option<&Map<String, Value>>) -> Value {
        debug!(
            endpoint = %self.endpoint,
            query = %truncate(query, QUERY_LOG_LIMIT),
            "Forwarding GraphQL query"
        );
        if let Some(variables) = variables {
            let serialized = serde_json::to_string(variables).unwrap_or_default();
            debug!(
                variables = %truncate(&serialized, VARIABLES_LOG_LIMIT),
                "With variables"
            );
        }

        match self.send(query, variables).await {
            Ok(response_body) => response_body,
            Err(error) => {
                error!("GraphQL request failed: {error}");
                error.into_envelope()
            }
        }
    }

    async fn send(
        &self,
        query: &str,
        variables: Option<&Map<String, Value>>,
    ) -> Result<Value, ForwardError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(&Request { query, variables })
            .send()
            .await?;

        let status = response.status();
        info!(status = status.as_u16(), "Received response from GraphQL API");

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        let response_text = response.text().await?;

        if !content_type
            .as_deref()
            .is_some_and(|content_type| content_type.contains("application/json"))
        {
            debug!(?content_type, "Response is not JSON");
            return Err(ForwardError::NonJson {
                status: status.as_u16(),
                content_type,
                response_text: truncate(&response_text, RESPONSE_TEXT_LIMIT),
            });
        }

        let response_body = serde_json::from_str::<Value>(&response_text).map_err(|error| {
            debug!("Failed to parse JSON response: {error}");
            ForwardError::InvalidJson {
                status: status.as_u16(),
                response_text: truncate(&response_text, RESPONSE_TEXT_LIMIT),
            }
        })?;

        if !status.is_success() {
            return Err(ForwardError::Http {
                status: status.as_u16(),
                response_body,
            });
        }

        Ok(response_body)
    }
}

/// Keep at most `limit` characters of `text`
fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rstest::rstest;
    use tracing_test::traced_test;

    async fn forwarder_for(server: &mockito::ServerGuard) -> Forwarder {
        let endpoint = Url::parse(&format!("{}/graphql", server.url())).unwrap();
        Forwarder::new(endpoint, HeaderMap::new()).unwrap()
    }

    #[tokio::test]
    async fn passes_through_successful_response() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"data":{"x":1}}"#;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("content-type", "application/json")
            .match_header("user-agent", USER_AGENT_VALUE)
            .match_body(Matcher::Json(json!({ "query": "{ x }" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ x }", None).await;

        mock.assert_async().await;
        assert_eq!(result, json!({ "data": { "x": 1 } }));
        assert_eq!(result.to_string(), body);
    }

    #[tokio::test]
    async fn keeps_upstream_key_order() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"data":{"study":[{"study_name":"CPTAC UCEC","disease_type":"UCEC","aaa":1}]},"extensions":{"z":1,"a":2}}"#;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let result = forwarder_for(&server)
            .await
            .forward("{ study(acceptDUA: true) { study_name disease_type } }", None)
            .await;

        assert_eq!(result.to_string(), body);
    }

    #[tokio::test]
    async fn sends_variables_when_present() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Json(json!({
                "query": "query Study($id: String!) { study(study_id: $id, acceptDUA: true) { study_name } }",
                "variables": { "id": "PDC000120" },
            })))
            .with_status(200)
            .with_header("content-type", "application/json; charset=utf-8")
            .with_body(r#"{"data":{"study":[{"study_name":"CPTAC UCEC"}]}}"#)
            .create_async()
            .await;

        let variables = json!({ "id": "PDC000120" });
        let result = forwarder_for(&server)
            .await
            .forward(
                "query Study($id: String!) { study(study_id: $id, acceptDUA: true) { study_name } }",
                variables.as_object(),
            )
            .await;

        mock.assert_async().await;
        assert_eq!(
            result,
            json!({ "data": { "study": [{ "study_name": "CPTAC UCEC" }] } })
        );
    }

    #[tokio::test]
    async fn passes_through_graphql_errors_in_successful_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":null,"errors":[{"message":"Cannot query field \"foo\""}]}"#)
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ foo }", None).await;

        assert_eq!(
            result,
            json!({
                "data": null,
                "errors": [{ "message": "Cannot query field \"foo\"" }]
            })
        );
    }

    #[tokio::test]
    async fn wraps_http_error_with_parsed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"boom"}"#)
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ x }", None).await;

        assert_eq!(
            result,
            json!({
                "errors": [{
                    "message": "API Error 500",
                    "extensions": {
                        "statusCode": 500,
                        "responseBody": { "message": "boom" }
                    }
                }]
            })
        );
    }

    #[tokio::test]
    async fn wraps_non_json_response() {
        let mut server = mockito::Server::new_async().await;
        let html = format!("<html><body>{}</body></html>", "x".repeat(2000));
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(&html)
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ x }", None).await;

        let error = result["errors"].get(0).unwrap();
        assert_eq!(
            error["message"],
            json!("API Error 200: Non-JSON response received.")
        );
        assert_eq!(error["extensions"]["statusCode"], json!(200));
        assert_eq!(
            error["extensions"]["contentType"],
            json!("text/html; charset=utf-8")
        );
        let response_text = error["extensions"]["responseText"].as_str().unwrap();
        assert_eq!(response_text.chars().count(), RESPONSE_TEXT_LIMIT);
        assert!(html.starts_with(response_text));
    }

    #[tokio::test]
    async fn body_one_past_the_limit_is_cut_to_the_limit() {
        let mut server = mockito::Server::new_async().await;
        let body = "b".repeat(RESPONSE_TEXT_LIMIT + 1);
        server
            .mock("POST", "/graphql")
            .with_status(503)
            .with_header("content-type", "text/plain")
            .with_body(&body)
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ x }", None).await;

        assert_eq!(
            result["errors"][0]["extensions"]["responseText"],
            json!("b".repeat(RESPONSE_TEXT_LIMIT))
        );
        assert_eq!(
            result["errors"][0]["message"],
            json!("API Error 503: Non-JSON response received.")
        );
    }

    #[tokio::test]
    async fn wraps_unparseable_json_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(502)
            .with_header("content-type", "application/json")
            .with_body("{\"data\": ")
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ x }", None).await;

        assert_eq!(
            result,
            json!({
                "errors": [{
                    "message": "API Error 502: Failed to parse JSON response.",
                    "extensions": {
                        "statusCode": 502,
                        "responseText": "{\"data\": "
                    }
                }]
            })
        );
    }

    #[tokio::test]
    async fn wraps_connection_failure_as_client_error() {
        // Grab a free port and release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Url::parse(&format!("http://{address}/graphql")).unwrap();
        let forwarder = Forwarder::new(endpoint, HeaderMap::new()).unwrap();

        let result = forwarder.forward("{ x }", None).await;

        let errors = result["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        let error = errors.first().unwrap();
        assert!(!error["message"].as_str().unwrap().is_empty());
        assert_eq!(error["extensions"], json!({ "clientError": true }));
    }

    #[tokio::test]
    async fn repeated_queries_yield_identical_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errors":[{"message":"not here"}]}"#)
            .expect(2)
            .create_async()
            .await;

        let forwarder = forwarder_for(&server).await;
        let first = forwarder.forward("{ x }", None).await;
        let second = forwarder.forward("{ x }", None).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn configured_headers_are_sent_but_cannot_override_fixed_ones() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("x-pdc-client", "notebook")
            .match_header("user-agent", USER_AGENT_VALUE)
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-pdc-client", HeaderValue::from_static("notebook"));
        headers.insert(USER_AGENT, HeaderValue::from_static("something-else"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let endpoint = Url::parse(&format!("{}/graphql", server.url())).unwrap();
        let forwarder = Forwarder::new(endpoint, headers).unwrap();

        let result = forwarder.forward("{ x }", None).await;

        mock.assert_async().await;
        assert_eq!(result, json!({}));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(999, 999)]
    #[case(1000, 1000)]
    #[case(1001, 1000)]
    #[case(5000, 1000)]
    fn response_text_is_capped(#[case] length: usize, #[case] expected: usize) {
        let text = "a".repeat(length);
        assert_eq!(
            truncate(&text, RESPONSE_TEXT_LIMIT).chars().count(),
            expected
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(1001);
        let truncated = truncate(&text, RESPONSE_TEXT_LIMIT);
        assert_eq!(truncated.chars().count(), 1000);
        assert_eq!(truncated.len(), 2000);
    }

    #[test]
    fn missing_content_type_is_reported_as_null() {
        let envelope = ForwardError::NonJson {
            status: 204,
            content_type: None,
            response_text: String::new(),
        }
        .into_envelope();

        assert_eq!(
            envelope,
            json!({
                "errors": [{
                    "message": "API Error 204: Non-JSON response received.",
                    "extensions": {
                        "statusCode": 204,
                        "contentType": null,
                        "responseText": ""
                    }
                }]
            })
        );
        assert_eq!(
            envelope.to_string(),
            r#"{"errors":[{"message":"API Error 204: Non-JSON response received.","extensions":{"statusCode":204,"contentType":null,"responseText":""}}]}"#
        );
    }

    #[tokio::test]
    async fn response_without_content_type_is_not_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":{"x":1}}"#)
            .create_async()
            .await;

        let result = forwarder_for(&server).await.forward("{ x }", None).await;

        assert_eq!(
            result,
            json!({
                "errors": [{
                    "message": "API Error 200: Non-JSON response received.",
                    "extensions": {
                        "statusCode": 200,
                        "contentType": null,
                        "responseText": "{\"data\":{\"x\":1}}"
                    }
                }]
            })
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn logged_query_and_variables_are_shortened() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"x":1}}"#)
            .create_async()
            .await;

        let query = format!("{{ {} }}", "q".repeat(300));
        let variables = json!({ "v": "w".repeat(300) });
        forwarder_for(&server)
            .await
            .forward(&query, variables.as_object())
            .await;

        // `{ ` plus 198 characters of the query, `{"v":"` plus 144 of the variables
        assert!(logs_contain(&format!("{{ {}", "q".repeat(198))));
        assert!(!logs_contain(&"q".repeat(199)));
        assert!(logs_contain(&format!("{{\"v\":\"{}", "w".repeat(144))));
        assert!(!logs_contain(&"w".repeat(145)));
    }
}
