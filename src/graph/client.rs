//! Form-encoded GraphQL query transport.

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{AuthError, AuthProvider};
use crate::listing::MediaKind;

use super::entity::EntityKind;

/// Errors from the platform API layer.
#[derive(Debug, Error)]
pub enum GraphError {
    /// HTTP transport failure.
    #[error("graph request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Session token acquisition failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The response body was not parseable JSON.
    #[error("graph response was not JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform returned an error envelope instead of data.
    #[error("platform error: {summary}. {message}")]
    Api {
        /// Short error summary from the envelope.
        summary: String,
        /// Longer message from the envelope.
        message: String,
    },

    /// The response parsed as JSON but lacked the expected shape.
    #[error("unexpected graph response shape: {detail}")]
    Malformed {
        /// What was missing or wrong.
        detail: String,
    },

    /// No entity exists for the requested id.
    #[error("entity {entity_id} not found (wrong id?)")]
    EntityNotFound {
        /// The id that was looked up.
        entity_id: String,
    },

    /// The entity exists but its type is not supported.
    #[error("unsupported entity type: {type_name}")]
    UnsupportedEntity {
        /// The platform typename that was rejected.
        type_name: String,
    },

    /// No listing query exists for this entity/media combination.
    #[error("no {media} listing for {entity:?} entities")]
    UnsupportedCollection {
        /// The owning entity kind.
        entity: EntityKind,
        /// The requested media kind.
        media: MediaKind,
    },
}

impl GraphError {
    /// Creates a malformed-shape error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

/// Executes persisted GraphQL queries as form-encoded POSTs, injecting the
/// session token and checking the error envelope.
pub struct GraphClient {
    http: Client,
    endpoint: Url,
    auth: Arc<AuthProvider>,
}

impl GraphClient {
    /// Creates a client posting to `endpoint` with tokens from `auth`.
    #[must_use]
    pub fn new(http: Client, endpoint: Url, auth: Arc<AuthProvider>) -> Self {
        Self {
            http,
            endpoint,
            auth,
        }
    }

    /// Runs the persisted query `doc_id` with `variables`.
    ///
    /// `friendly_name`, when given, is sent along with the RelayModern
    /// caller class the platform expects for named queries. Responses may
    /// be multi-line JSON streams; the payload is the first line.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on transport failure, auth failure, a
    /// non-JSON body, or a platform error envelope. An envelope error
    /// invalidates the cached session token first.
    #[instrument(level = "debug", skip(self, variables))]
    pub async fn query(
        &self,
        doc_id: &str,
        friendly_name: Option<&str>,
        variables: Value,
    ) -> Result<Value, GraphError> {
        let token = self.auth.token().await?;

        // Baseline params the platform expects on every form-encoded
        // query; non-string values go JSON-stringified.
        let mut form: Vec<(&str, String)> = vec![
            ("dpr", "1".into()),
            ("__a", "1".into()),
            ("__aaid", "0".into()),
            ("__ccg", "GOOD".into()),
            ("server_timestamps", "true".into()),
            ("doc_id", doc_id.into()),
            ("variables", variables.to_string()),
            ("fb_dtsg", token),
        ];
        if let Some(name) = friendly_name {
            form.push(("fb_api_caller_class", "RelayModern".into()));
            form.push(("fb_api_req_friendly_name", name.into()));
        }

        let text = self
            .http
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?
            .text()
            .await?;

        let first_line = text.lines().next().unwrap_or_default();
        let value: Value = serde_json::from_str(first_line)?;

        if let Some(error) = value.get("errors").and_then(|errors| errors.get(0)) {
            let summary = error
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            warn!(summary = %summary, "platform returned an error envelope");
            // A stale token is the usual cause; drop it so the next query
            // refetches.
            self.auth.invalidate().await;
            return Err(GraphError::Api { summary, message });
        }

        debug!(doc_id, "graph query succeeded");
        Ok(value)
    }
}
