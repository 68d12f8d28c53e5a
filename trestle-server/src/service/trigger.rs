//! Trigger Service
//!
//! Execution intake: validates a webhook or manual trigger, captures
//! audit metadata, and persists the pending execution record. Actual
//! execution is handed to the coordinator by the caller.

use sqlx::PgPool;
use trestle_core::domain::execution::{Execution, TriggerMethod};
use trestle_core::domain::pipeline::Pipeline;
use trestle_engine::config::EngineConfig;
use trestle_engine::signature::verify_signature;
use uuid::Uuid;

use crate::repository::{configuration_repository, execution_repository, pipeline_repository};

/// Service error type
#[derive(Debug)]
pub enum TriggerError {
    /// No pipeline owns the presented trigger token.
    UnknownToken,
    PipelineNotFound(Uuid),
    PipelineInactive(Uuid),
    /// The pipeline has no active configuration to run.
    NoActiveConfiguration(Uuid),
    /// The payload signature did not match the pipeline's secret.
    InvalidSignature,
    /// The pipeline has a secret but the request carried no signature.
    SignatureRequired,
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for TriggerError {
    fn from(err: sqlx::Error) -> Self {
        TriggerError::DatabaseError(err)
    }
}

/// The signature-relevant parts of an incoming webhook request
#[derive(Debug, Default)]
pub struct WebhookRequest<'a> {
    /// `X-Hub-Signature-256` value, if present.
    pub signature_sha256: Option<&'a str>,
    /// Legacy `X-Hub-Signature` value, if present.
    pub signature_sha1: Option<&'a str>,
    /// `X-GitHub-Event` value, if present.
    pub event: Option<&'a str>,
    /// `X-GitHub-Delivery` value, if present.
    pub delivery: Option<&'a str>,
    pub body: &'a [u8],
}

/// Accept a webhook trigger identified by its token
///
/// Verifies the payload signature against the pipeline's secret (the
/// SHA-256 header wins when both are present), then records a pending
/// execution bound to the currently active configuration.
pub async fn trigger_by_token(
    pool: &PgPool,
    config: &EngineConfig,
    token: &str,
    request: WebhookRequest<'_>,
) -> Result<(Pipeline, Execution), TriggerError> {
    let pipeline = pipeline_repository::find_by_trigger_token(pool, token)
        .await?
        .ok_or(TriggerError::UnknownToken)?;

    verify_webhook(config, &pipeline, &request)?;

    let execution = create_pending(
        pool,
        &pipeline,
        None,
        TriggerMethod::Webhook,
        webhook_metadata(&request),
    )
    .await?;

    tracing::info!(
        "Webhook trigger accepted for pipeline {} -> execution {}",
        pipeline.name,
        execution.id
    );

    Ok((pipeline, execution))
}

/// Accept a manual trigger for a pipeline by ID
pub async fn trigger_manual(
    pool: &PgPool,
    pipeline_id: Uuid,
    triggered_by: Option<Uuid>,
) -> Result<(Pipeline, Execution), TriggerError> {
    let pipeline = pipeline_repository::find_by_id(pool, pipeline_id)
        .await?
        .ok_or(TriggerError::PipelineNotFound(pipeline_id))?;

    let execution = create_pending(
        pool,
        &pipeline,
        triggered_by,
        TriggerMethod::Manual,
        serde_json::json!({}),
    )
    .await?;

    tracing::info!(
        "Manual trigger accepted for pipeline {} -> execution {}",
        pipeline.name,
        execution.id
    );

    Ok((pipeline, execution))
}

async fn create_pending(
    pool: &PgPool,
    pipeline: &Pipeline,
    triggered_by: Option<Uuid>,
    method: TriggerMethod,
    metadata: serde_json::Value,
) -> Result<Execution, TriggerError> {
    if !pipeline.is_active {
        return Err(TriggerError::PipelineInactive(pipeline.id));
    }

    let configuration = configuration_repository::find_active(pool, pipeline.id)
        .await?
        .ok_or(TriggerError::NoActiveConfiguration(pipeline.id))?;

    let execution = execution_repository::create_pending(
        pool,
        pipeline.id,
        configuration.id,
        triggered_by,
        method,
        metadata,
    )
    .await?;

    Ok(execution)
}

// =============================================================================
// Signature Verification
// =============================================================================

fn verify_webhook(
    config: &EngineConfig,
    pipeline: &Pipeline,
    request: &WebhookRequest<'_>,
) -> Result<(), TriggerError> {
    let Some(secret) = pipeline.webhook_secret.as_deref() else {
        // No secret configured: only acceptable when the server runs in
        // open mode.
        if config.allow_unsigned_webhooks {
            return Ok(());
        }
        tracing::warn!(
            "Rejecting unsigned webhook for pipeline {} (no secret, open mode disabled)",
            pipeline.id
        );
        return Err(TriggerError::SignatureRequired);
    };

    let header = request.signature_sha256.or(request.signature_sha1);
    if header.is_none() {
        return Err(TriggerError::SignatureRequired);
    }

    if verify_signature(secret, header, request.body) {
        Ok(())
    } else {
        tracing::warn!("Webhook signature mismatch for pipeline {}", pipeline.id);
        Err(TriggerError::InvalidSignature)
    }
}

// =============================================================================
// Metadata Capture
// =============================================================================

/// Audit metadata extracted from a GitHub-style push payload
fn webhook_metadata(request: &WebhookRequest<'_>) -> serde_json::Value {
    let mut metadata = serde_json::Map::new();

    if let Some(event) = request.event {
        metadata.insert("event".to_string(), event.into());
    }
    if let Some(delivery) = request.delivery {
        metadata.insert("delivery".to_string(), delivery.into());
    }

    if let Ok(payload) = serde_json::from_slice::<serde_json::Value>(request.body) {
        if let Some(name) = payload.pointer("/repository/full_name") {
            metadata.insert("repository".to_string(), name.clone());
        }
        if let Some(url) = payload.pointer("/repository/clone_url") {
            metadata.insert("clone_url".to_string(), url.clone());
        }
        if let Some(git_ref) = payload.get("ref") {
            metadata.insert("ref".to_string(), git_ref.clone());
        }
        if let Some(pusher) = payload.pointer("/pusher/name") {
            metadata.insert("pusher".to_string(), pusher.clone());
        }
    }

    serde_json::Value::Object(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trestle_engine::signature::sign_sha256;

    fn pipeline(secret: Option<&str>) -> Pipeline {
        let now = chrono::Utc::now();
        Pipeline {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "app".to_string(),
            description: None,
            trigger_token: "t".repeat(32),
            webhook_secret: secret.map(|s| s.to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn open_config(allow_unsigned: bool) -> EngineConfig {
        EngineConfig {
            allow_unsigned_webhooks: allow_unsigned,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_signed_webhook_accepted() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        // sign_sha256 returns the complete header value, prefix included.
        let header = sign_sha256("s3cret", body);
        assert!(header.starts_with("sha256="));

        let request = WebhookRequest {
            signature_sha256: Some(&header),
            body,
            ..Default::default()
        };

        assert!(verify_webhook(&open_config(false), &pipeline(Some("s3cret")), &request).is_ok());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        // Well-formed header signed with the wrong key.
        let header = sign_sha256("other", body);
        let request = WebhookRequest {
            signature_sha256: Some(&header),
            body,
            ..Default::default()
        };

        assert!(matches!(
            verify_webhook(&open_config(false), &pipeline(Some("s3cret")), &request),
            Err(TriggerError::InvalidSignature)
        ));
    }

    #[test]
    fn test_missing_signature_rejected_when_secret_set() {
        let request = WebhookRequest {
            body: b"{}",
            ..Default::default()
        };

        assert!(matches!(
            verify_webhook(&open_config(true), &pipeline(Some("s3cret")), &request),
            Err(TriggerError::SignatureRequired)
        ));
    }

    #[test]
    fn test_unsigned_webhook_requires_open_mode() {
        let request = WebhookRequest {
            body: b"{}",
            ..Default::default()
        };

        assert!(verify_webhook(&open_config(true), &pipeline(None), &request).is_ok());
        assert!(matches!(
            verify_webhook(&open_config(false), &pipeline(None), &request),
            Err(TriggerError::SignatureRequired)
        ));
    }

    #[test]
    fn test_metadata_extracts_push_fields() {
        let body = serde_json::json!({
            "ref": "refs/heads/main",
            "repository": {
                "full_name": "acme/app",
                "clone_url": "https://example.com/acme/app.git"
            },
            "pusher": { "name": "alice" }
        })
        .to_string();

        let request = WebhookRequest {
            event: Some("push"),
            delivery: Some("d-123"),
            body: body.as_bytes(),
            ..Default::default()
        };

        let metadata = webhook_metadata(&request);
        assert_eq!(metadata["event"], "push");
        assert_eq!(metadata["delivery"], "d-123");
        assert_eq!(metadata["repository"], "acme/app");
        assert_eq!(metadata["clone_url"], "https://example.com/acme/app.git");
        assert_eq!(metadata["ref"], "refs/heads/main");
        assert_eq!(metadata["pusher"], "alice");
    }

    #[test]
    fn test_metadata_handles_non_json_body() {
        let request = WebhookRequest {
            body: b"not json",
            ..Default::default()
        };

        let metadata = webhook_metadata(&request);
        assert_eq!(metadata, serde_json::json!({}));
    }
}
