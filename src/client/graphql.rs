use graphql_client::{GraphQLQuery, Response as GraphQLResponse};
use log::{debug, trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

use super::core::BuildkiteClient;
use super::rest::decode_body;
use crate::error::{BuildkiteError, Result};

/// Declares a hand-written GraphQL operation.
///
/// Expands to a unit struct implementing [`GraphQLQuery`] whose operation
/// name is the struct name, so the document's `query`/`mutation` name must
/// match it.
macro_rules! graphql_operation {
    ($name:ident, $document:expr, $variables:ty => $data:ty) => {
        pub(crate) struct $name;

        impl ::graphql_client::GraphQLQuery for $name {
            type Variables = $variables;
            type ResponseData = $data;

            fn build_query(
                variables: Self::Variables,
            ) -> ::graphql_client::QueryBody<Self::Variables> {
                ::graphql_client::QueryBody {
                    variables,
                    query: $document,
                    operation_name: stringify!($name),
                }
            }
        }
    };
}

pub(crate) use graphql_operation;

impl BuildkiteClient {
    /// Runs one GraphQL operation and returns its `data` payload.
    ///
    /// GraphQL reports domain failures in the `errors` array of a 200
    /// response, so an HTTP 404 here means the endpoint itself is wrong and is
    /// reported as a status error rather than a missing resource.
    pub(crate) async fn graphql<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData> {
        let body = Q::build_query(variables);
        let operation = body.operation_name;
        debug!("Buildkite GraphQL {operation}");

        let payload = serde_json::to_vec(&body)?;
        let request = self
            .transport
            .request(Method::POST, self.graphql_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload);

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(BuildkiteError::NotFound(path)) => {
                return Err(BuildkiteError::HttpStatus {
                    status: 404,
                    body: format!("GraphQL endpoint not found: {path}"),
                })
            }
            Err(e) => return Err(e),
        };

        let bytes = response.bytes().await?;
        trace!(
            "Buildkite GraphQL {operation} response {}",
            String::from_utf8_lossy(&bytes)
        );

        let response_body: GraphQLResponse<Q::ResponseData> = decode_body(&bytes)?;

        if let Some(errors) = response_body.errors.filter(|errors| !errors.is_empty()) {
            return Err(BuildkiteError::GraphQL {
                operation,
                messages: errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        response_body
            .data
            .ok_or(BuildkiteError::NoResponseData(operation))
    }
}
