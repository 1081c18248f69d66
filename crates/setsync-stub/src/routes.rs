//! # Audit API Routes
//!
//! Routes:
//! - POST /audit/{contractId}: Audit a campaign setup
//! - POST /rerun-audit/{contractId}/{campaignName}: Patch and re-audit
//! - GET  /contract: Contract of the active campaign
//! - GET  /campaign/fields: Field rows of the active campaign
//! - PUT  /campaign/fields/{fieldType}: Overwrite one field and re-audit
//! - GET  /audit/flags: One flag per pillar
//! - GET  /audit/compliance-score: `{"score": n}`
//! - POST /audit/remediate/{flagId}: Apply the documented fix
//! - POST /campaign/push-to-live: Publish the active campaign
//! - POST /publish-live/{campaignName}: Publish a named campaign

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use setsync_core::{AuditReport, Campaign, Contract, ContractId, FieldRow, Flag};

use crate::error::StubError;
use crate::state::StubState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediateRequest {
    #[serde(default)]
    pub field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FieldUpdateRequest {
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct RemediateResponse {
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: u8,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: &'static str,
    pub message: String,
}

/// Build the audit API router.
pub fn router() -> Router<StubState> {
    Router::new()
        .route("/audit/:contract_id", post(run_audit))
        .route("/rerun-audit/:contract_id/:campaign_name", post(rerun_audit))
        .route("/contract", get(contract))
        .route("/campaign/fields", get(fields))
        .route("/campaign/fields/:field_type", put(update_field))
        .route("/audit/flags", get(flags))
        .route("/audit/compliance-score", get(compliance_score))
        .route("/audit/remediate/:flag_id", post(remediate))
        .route("/campaign/push-to-live", post(push_to_live))
        .route("/publish-live/:campaign_name", post(publish_live))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, StubError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| StubError::Validation(rejection.body_text()))
}

async fn run_audit(
    State(state): State<StubState>,
    Path(contract_id): Path<String>,
    body: Result<Json<Campaign>, JsonRejection>,
) -> Result<Json<AuditReport>, StubError> {
    let campaign = json_body(body)?;
    let contract_id = ContractId::new(contract_id)?;
    Ok(Json(state.audit(&contract_id, campaign)?))
}

async fn rerun_audit(
    State(state): State<StubState>,
    Path((contract_id, campaign_name)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AuditReport>, StubError> {
    let patch = json_body(body)?;
    let contract_id = ContractId::new(contract_id)?;
    Ok(Json(state.rerun(&contract_id, &campaign_name, &patch)?))
}

async fn contract(State(state): State<StubState>) -> Result<Json<Contract>, StubError> {
    Ok(Json(state.contract()?))
}

async fn fields(State(state): State<StubState>) -> Result<Json<Vec<FieldRow>>, StubError> {
    Ok(Json(state.fields()?))
}

async fn update_field(
    State(state): State<StubState>,
    Path(field_type): Path<String>,
    body: Result<Json<FieldUpdateRequest>, JsonRejection>,
) -> Result<Json<FieldRow>, StubError> {
    let req = json_body(body)?;
    Ok(Json(state.update_field(&field_type, &req.value)?))
}

async fn flags(State(state): State<StubState>) -> Result<Json<Vec<Flag>>, StubError> {
    Ok(Json(state.flags()?))
}

async fn compliance_score(State(state): State<StubState>) -> Result<Json<ScoreResponse>, StubError> {
    Ok(Json(ScoreResponse {
        score: state.score()?,
    }))
}

/// The body's `fieldType` names the field; the flag id is used when absent.
async fn remediate(
    State(state): State<StubState>,
    Path(flag_id): Path<String>,
    body: Result<Json<RemediateRequest>, JsonRejection>,
) -> Result<Json<RemediateResponse>, StubError> {
    let req = json_body(body)?;
    let field = req.field_type.unwrap_or(flag_id);
    let value = state.remediate(&field)?;
    tracing::info!(field = %field, "field remediated");
    Ok(Json(RemediateResponse { value }))
}

async fn push_to_live(State(state): State<StubState>) -> Result<Json<PublishResponse>, StubError> {
    Ok(Json(PublishResponse {
        status: "SUCCESS",
        message: state.push_active()?,
    }))
}

async fn publish_live(
    State(state): State<StubState>,
    Path(campaign_name): Path<String>,
) -> Result<Json<PublishResponse>, StubError> {
    Ok(Json(PublishResponse {
        status: "SUCCESS",
        message: state.publish(&campaign_name)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StubConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_app() -> Router {
        router().with_state(StubState::seeded(StubConfig::default()).unwrap())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn audit_seed_campaign() {
        let campaign = serde_json::to_value(Campaign::nike_valentine_seed()).unwrap();
        let response = test_app()
            .oneshot(post_json("/audit/CNT-NIKE-VALENTINE", campaign))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["is_certified"], false);
        assert_eq!(body["score"], 0);
        assert_eq!(body["pillars"]["Budget"]["status"], "FAIL");
        assert_eq!(body["pillars"]["Audience"]["has_severance"], true);
    }

    #[tokio::test]
    async fn audit_unknown_contract_404() {
        let campaign = serde_json::to_value(Campaign::nike_valentine_seed()).unwrap();
        let response = test_app()
            .oneshot(post_json("/audit/CNT-NOPE", campaign))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "Contract not found");
    }

    #[tokio::test]
    async fn audit_malformed_body_422() {
        let response = test_app()
            .oneshot(post_json("/audit/CNT-NIKE-VALENTINE", json!({ "campaign_name": 3 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn rerun_unknown_campaign_404() {
        let response = test_app()
            .oneshot(post_json("/rerun-audit/CNT-NIKE-VALENTINE/ghost", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["detail"],
            "Campaign not found. Run an audit first."
        );
    }

    #[tokio::test]
    async fn score_is_wrapped() {
        let request = Request::builder()
            .uri("/audit/compliance-score")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "score": 0 }));
    }

    #[tokio::test]
    async fn fields_use_camel_case_rows() {
        let request = Request::builder()
            .uri("/campaign/fields")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        let body = body_json(response).await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0]["fieldType"], "Audience");
    }

    #[tokio::test]
    async fn remediate_returns_corrected_value() {
        let response = test_app()
            .oneshot(post_json("/audit/remediate/Budget", json!({ "fieldType": "Budget" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["value"], 1_200_000);
    }

    #[tokio::test]
    async fn remediate_without_fix_422() {
        let response = test_app()
            .oneshot(post_json("/audit/remediate/Creative", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_json(response).await["detail"],
            "No automated remediation for Creative"
        );
    }

    #[tokio::test]
    async fn publish_blocked_lists_violations() {
        let response = test_app()
            .oneshot(post_json("/publish-live/Nike_Valentine_Campaign_v1", json!(null)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["detail"]["error"], "Publishing Blocked");
        assert_eq!(
            body["detail"]["violations"],
            json!(["Audience", "Budget", "Optimization", "Copy"])
        );
    }

    #[tokio::test]
    async fn publish_unaudited_campaign_400() {
        let response = test_app()
            .oneshot(post_json("/publish-live/ghost", json!(null)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
