//! Intake routes.
//!
//! - `POST /triggers/{kind}`: dispatch a trigger event, 202 with the summary
//! - `GET /executions/{id}`: one execution record
//! - `PUT /workflows`: validate and save a workflow definition
//! - `GET /health`: liveness

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use nurture_core::ExecutionId;
use nurture_workflow::{
    DispatchSummary, ExecutionRecord, TriggerKind, VariableContext, WorkflowDefinition,
};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

/// Builds the router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/triggers/{kind}", post(receive_trigger))
        .route("/executions/{id}", get(get_execution))
        .route("/workflows", put(save_workflow))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(skip(state, body), fields(trigger = %kind))]
async fn receive_trigger(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchSummary>), ApiError> {
    let kind = TriggerKind::from_str(&kind).map_err(|e| ApiError::UnknownTrigger { kind: e.0 })?;
    let payload: JsonValue =
        serde_json::from_slice(&body).map_err(|_| ApiError::InvalidPayload)?;
    let context = VariableContext::from_payload(payload).ok_or(ApiError::InvalidPayload)?;

    let summary = state
        .dispatcher
        .dispatch_detached(kind, context)
        .await
        .map_err(|report| ApiError::Internal {
            details: report.to_string(),
        })?;
    info!(started = summary.started_count, "trigger accepted");
    Ok((StatusCode::ACCEPTED, Json(summary)))
}

async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let execution_id =
        ExecutionId::from_str(&id).map_err(|_| ApiError::InvalidExecutionId { id: id.clone() })?;
    let record = state
        .ledger
        .get(execution_id)
        .await
        .map_err(|report| ApiError::Internal {
            details: report.to_string(),
        })?;
    record
        .map(Json)
        .ok_or(ApiError::ExecutionNotFound { id })
}

#[instrument(skip_all)]
async fn save_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<WorkflowDefinition>,
) -> Result<StatusCode, ApiError> {
    workflow
        .validate()
        .map_err(|e| ApiError::InvalidWorkflow {
            reason: e.to_string(),
        })?;
    state
        .store
        .save_workflow(&workflow)
        .await
        .map_err(|report| ApiError::Internal {
            details: report.to_string(),
        })?;
    info!(
        workflow_id = %workflow.id,
        active = workflow.active,
        steps = workflow.steps.len(),
        "workflow saved"
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use nurture_core::TenantId;
    use nurture_workflow::mock::MockServices;
    use nurture_workflow::{
        ExecutionLedger, InMemoryLedger, InMemoryWorkflowStore, Interpreter, InterpreterConfig,
        Step, TriggerDispatcher, WorkflowStore,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        state: AppState,
        ledger: Arc<InMemoryLedger>,
        store: Arc<InMemoryWorkflowStore>,
    }

    fn harness() -> Harness {
        let mocks = MockServices::new();
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryWorkflowStore::new());
        let interpreter = Arc::new(Interpreter::new(
            mocks.services(),
            ledger.clone(),
            InterpreterConfig::default(),
        ));
        let dispatcher = Arc::new(TriggerDispatcher::new(store.clone(), interpreter));
        let state = AppState::new(dispatcher, ledger.clone(), store.clone());
        Harness {
            state,
            ledger,
            store,
        }
    }

    fn welcome() -> WorkflowDefinition {
        WorkflowDefinition::new(TenantId::new(), "Welcome", TriggerKind::FormSubmitted)
            .with_step(Step::log("new lead {{name}}"))
            .activated()
    }

    async fn body_json(response: axum::response::Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_trigger(kind: &str, body: &str) -> Request<Body> {
        Request::post(format!("/triggers/{kind}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn trigger_starts_matching_workflows() {
        let h = harness();
        h.store.save_workflow(&welcome()).await.expect("save");

        let response = router(h.state)
            .oneshot(post_trigger("form_submitted", r#"{"name": "Ana"}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = body_json(response).await;
        assert_eq!(body["started_count"], 1);
        assert_eq!(body["results"][0]["outcome"], "started");
        assert_eq!(h.ledger.records().await.len(), 1);
    }

    #[tokio::test]
    async fn trigger_without_matches_is_still_accepted() {
        let h = harness();
        h.store.save_workflow(&welcome()).await.expect("save");

        let response = router(h.state)
            .oneshot(post_trigger("contact_created", "{}"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["started_count"], 0);
    }

    #[tokio::test]
    async fn unknown_trigger_kind_is_not_found() {
        let h = harness();
        let response = router(h.state)
            .oneshot(post_trigger("carrier_pigeon", "{}"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .expect("message")
                .contains("carrier_pigeon")
        );
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let h = harness();
        for body in ["[1, 2]", "\"hi\"", "not json"] {
            let response = router(h.state.clone())
                .oneshot(post_trigger("webhook", body))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[tokio::test]
    async fn execution_lookup() {
        let h = harness();
        let id = h
            .ledger
            .create(welcome().id, &json!({"name": "Ana"}))
            .await
            .expect("create");

        let response = router(h.state.clone())
            .oneshot(
                Request::get(format!("/executions/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["input"]["name"], "Ana");

        let missing = router(h.state.clone())
            .oneshot(
                Request::get(format!("/executions/{}", ExecutionId::new()))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let malformed = router(h.state)
            .oneshot(
                Request::get("/executions/nope")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_workflow_validates() {
        let h = harness();
        let workflow = welcome();
        let response = router(h.state.clone())
            .oneshot(
                Request::put("/workflows")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&workflow).expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(
            h.store
                .get_workflow(workflow.id)
                .await
                .expect("get")
                .is_some()
        );

        let nameless = WorkflowDefinition::new(TenantId::new(), "", TriggerKind::Manual);
        let response = router(h.state)
            .oneshot(
                Request::put("/workflows")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&nameless).expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
