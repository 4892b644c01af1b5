use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use triage_core::{response_excerpt, CoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: serde_json::Value,
}

impl GraphqlRequest {
    pub fn new(query: impl Into<String>, variables: serde_json::Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// Executes one GraphQL operation and yields its `data` payload.
///
/// Transport failures surface as `DependencyUnavailable`, unreadable bodies as
/// `MalformedResponse`, and a populated `errors` array as `RemoteApplication`.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn execute(&self, request: GraphqlRequest) -> Result<serde_json::Value, CoreError>;
}

#[derive(Clone)]
pub struct ReqwestGraphqlTransport {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestGraphqlTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestGraphqlTransport")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("client", &self.client)
            .finish()
    }
}

impl ReqwestGraphqlTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .user_agent("triage/integration-linear")
            .timeout(timeout)
            .build()
            .map_err(|err| {
                CoreError::DependencyUnavailable(format!(
                    "failed to initialize Linear HTTP client: {err}"
                ))
            })?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl GraphqlTransport for ReqwestGraphqlTransport {
    async fn execute(&self, request: GraphqlRequest) -> Result<serde_json::Value, CoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .json(&json!({
                "query": request.query,
                "variables": request.variables,
            }))
            .send()
            .await
            .map_err(|err| {
                let cause = if err.is_timeout() { "timed out" } else { "failed" };
                CoreError::DependencyUnavailable(format!(
                    "call to Linear GraphQL API {cause}: {err}"
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            CoreError::DependencyUnavailable(format!(
                "failed to read response from Linear GraphQL API: {err}"
            ))
        })?;

        if !status.is_success() {
            return Err(CoreError::DependencyUnavailable(format!(
                "Linear GraphQL API returned HTTP {}: {}",
                status,
                response_excerpt(&body)
            )));
        }

        decode_graphql_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

/// An `errors` entry wins over any partial `data` that came with it.
pub(crate) fn decode_graphql_response(body: &str) -> Result<serde_json::Value, CoreError> {
    let response: GraphqlResponse = serde_json::from_str(body).map_err(|err| {
        CoreError::MalformedResponse(format!(
            "Linear returned a body that is not a GraphQL response ({err}): {}",
            response_excerpt(body)
        ))
    })?;

    let errors = response.errors.unwrap_or_default();
    if !errors.is_empty() {
        let messages: Vec<_> = errors
            .iter()
            .map(|entry| entry.message.as_str())
            .collect();
        return Err(CoreError::RemoteApplication(format!(
            "Linear GraphQL query failed: {}",
            messages.join("; ")
        )));
    }

    match response.data {
        serde_json::Value::Null => Err(CoreError::MalformedResponse(
            "Linear GraphQL response carried neither data nor errors.".to_owned(),
        )),
        data => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_payload_is_returned() {
        let data = decode_graphql_response(r#"{"data":{"viewer":{"id":"u1"}}}"#).expect("data");
        assert_eq!(data, json!({ "viewer": { "id": "u1" } }));
    }

    #[test]
    fn errors_array_is_an_application_error_even_with_data() {
        let error = decode_graphql_response(
            r#"{"data":null,"errors":[{"message":"Entity not found"},{"message":"Forbidden"}]}"#,
        )
        .expect_err("errors present");

        assert_eq!(
            error,
            CoreError::RemoteApplication(
                "Linear GraphQL query failed: Entity not found; Forbidden".to_owned()
            )
        );
    }

    #[test]
    fn unreadable_or_empty_bodies_are_malformed() {
        for body in ["<html>502</html>", r#"{"data":null}"#, "{}"] {
            let error = decode_graphql_response(body).expect_err(body);
            assert!(matches!(error, CoreError::MalformedResponse(_)), "{body}");
        }
    }

    #[test]
    fn non_graphql_body_error_quotes_an_excerpt() {
        let body = format!("<html>{}</html>", "x".repeat(500));
        let error = decode_graphql_response(&body).expect_err("html body");

        let CoreError::MalformedResponse(message) = error else {
            panic!("expected malformed response, got {error:?}");
        };
        assert!(message.contains("<html>xxx"));
        assert!(message.ends_with("..."));
    }

    #[test]
    fn transport_debug_redacts_api_key() {
        let transport = ReqwestGraphqlTransport::new(
            "https://api.linear.app/graphql",
            "lin_api_secret",
            Duration::from_secs(30),
        )
        .expect("transport");

        let rendered = format!("{transport:?}");
        assert!(!rendered.contains("lin_api_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
