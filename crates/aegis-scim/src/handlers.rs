//! Axum handlers for the SCIM resource API.
//!
//! Mounted by the server under `/scim/v2`. The only supported list filter
//! is an exact equality match on the resource's unique attribute
//! (`userName` for users, `displayName` for groups); anything else is a
//! 400 per the unsupported-filter rule.

use std::sync::Arc;

use aegis_core::CoreError;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::store::{GroupFilter, GroupStore, UserFilter, UserStore};
use crate::types::{ERROR_SCHEMA, GroupDraft, ListResponse, ScimGroup, ScimUser, UserDraft};

/// State shared by the SCIM handlers.
#[derive(Clone)]
pub struct ScimState {
    /// User store.
    pub users: Arc<dyn UserStore>,
    /// Group store.
    pub groups: Arc<dyn GroupStore>,
}

impl ScimState {
    /// Creates the handler state over the given stores.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, groups: Arc<dyn GroupStore>) -> Self {
        Self { users, groups }
    }
}

/// Builds the SCIM router (relative paths; the server nests it).
pub fn router(state: ScimState) -> Router {
    Router::new()
        .route("/Users", post(create_user).get(list_users))
        .route(
            "/Users/{id}",
            get(get_user).put(replace_user).delete(delete_user),
        )
        .route("/Groups", post(create_group).get(list_groups))
        .route(
            "/Groups/{id}",
            get(get_group).put(replace_group).delete(delete_group),
        )
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

/// SCIM-boundary error response.
#[derive(Debug)]
pub struct ScimError(CoreError);

impl From<CoreError> for ScimError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ScimError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::AlreadyExists { .. } => StatusCode::CONFLICT,
            CoreError::ReferentialIntegrity { .. } | CoreError::InvalidResource { .. } => {
                StatusCode::BAD_REQUEST
            }
            CoreError::Storage { .. } | CoreError::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "SCIM request failed");
        }

        let body = serde_json::json!({
            "schemas": [ERROR_SCHEMA],
            "status": status.as_u16().to_string(),
            "detail": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// List parameters
// =============================================================================

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct ListParams {
    filter: Option<String>,
    #[serde(rename = "startIndex")]
    start_index: Option<usize>,
    count: Option<usize>,
}

fn paginate<T>(resources: Vec<T>, params: &ListParams) -> ListResponse<T> {
    let total = resources.len();
    let start_index = params.start_index.unwrap_or(1).max(1);
    let count = params.count.unwrap_or(DEFAULT_PAGE_SIZE);
    let page: Vec<T> = resources
        .into_iter()
        .skip(start_index - 1)
        .take(count)
        .collect();
    ListResponse::page(total, start_index, page)
}

/// Parses `<attribute> eq "<value>"`, the only supported filter form.
fn parse_eq_filter(filter: &str, attribute: &str) -> Result<String, ScimError> {
    let unsupported = || {
        ScimError(CoreError::invalid_resource(format!(
            "Unsupported filter: only '{attribute} eq \"<value>\"' is supported"
        )))
    };

    let rest = filter
        .trim()
        .strip_prefix(attribute)
        .ok_or_else(unsupported)?
        .trim_start();
    let rest = rest.strip_prefix("eq").ok_or_else(unsupported)?.trim_start();
    let value = rest
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(unsupported)?;
    if value.is_empty() {
        return Err(unsupported());
    }
    Ok(value.to_string())
}

// =============================================================================
// User handlers
// =============================================================================

async fn create_user(
    State(state): State<ScimState>,
    Json(draft): Json<UserDraft>,
) -> Result<(StatusCode, Json<ScimUser>), ScimError> {
    let user = state.users.create_user(draft).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<ScimState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<ScimUser>>, ScimError> {
    let filter = params
        .filter
        .as_deref()
        .map(|f| parse_eq_filter(f, "userName").map(UserFilter::UserNameEq))
        .transpose()?;
    let users = state.users.list_users(filter.as_ref()).await?;
    Ok(Json(paginate(users, &params)))
}

async fn get_user(
    State(state): State<ScimState>,
    Path(id): Path<String>,
) -> Result<Json<ScimUser>, ScimError> {
    Ok(Json(state.users.get_user(&id).await?))
}

async fn replace_user(
    State(state): State<ScimState>,
    Path(id): Path<String>,
    Json(draft): Json<UserDraft>,
) -> Result<Json<ScimUser>, ScimError> {
    Ok(Json(state.users.replace_user(&id, draft).await?))
}

async fn delete_user(
    State(state): State<ScimState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ScimError> {
    state.users.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Group handlers
// =============================================================================

async fn create_group(
    State(state): State<ScimState>,
    Json(draft): Json<GroupDraft>,
) -> Result<(StatusCode, Json<ScimGroup>), ScimError> {
    let group = state.groups.create_group(draft).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn list_groups(
    State(state): State<ScimState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<ScimGroup>>, ScimError> {
    let filter = params
        .filter
        .as_deref()
        .map(|f| parse_eq_filter(f, "displayName").map(GroupFilter::DisplayNameEq))
        .transpose()?;
    let groups = state.groups.list_groups(filter.as_ref()).await?;
    Ok(Json(paginate(groups, &params)))
}

async fn get_group(
    State(state): State<ScimState>,
    Path(id): Path<String>,
) -> Result<Json<ScimGroup>, ScimError> {
    Ok(Json(state.groups.get_group(&id).await?))
}

async fn replace_group(
    State(state): State<ScimState>,
    Path(id): Path<String>,
    Json(draft): Json<GroupDraft>,
) -> Result<Json<ScimGroup>, ScimError> {
    Ok(Json(state.groups.replace_group(&id, draft).await?))
}

async fn delete_group(
    State(state): State<ScimState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ScimError> {
    state.groups.delete_group(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDirectory;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let directory = InMemoryDirectory::shared();
        router(ScimState::new(directory.clone(), directory))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_user(user_name: &str) -> Request<Body> {
        Request::post("/Users")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "userName": user_name,
                    "name": {"givenName": "John", "familyName": "Doe"},
                    "emails": [{"value": "john.doe@company.com", "primary": true}],
                    "dept": "HR",
                    "riskScore": 20
                })
                .to_string(),
            ))
            .unwrap()
    }

    #[test]
    fn test_parse_eq_filter() {
        assert_eq!(
            parse_eq_filter("userName eq \"jdoe\"", "userName").unwrap(),
            "jdoe"
        );
        assert!(parse_eq_filter("userName co \"jd\"", "userName").is_err());
        assert!(parse_eq_filter("emails eq \"x\"", "userName").is_err());
        assert!(parse_eq_filter("userName eq jdoe", "userName").is_err());
    }

    #[tokio::test]
    async fn test_create_get_delete_user_roundtrip() {
        let app = app();

        let response = app.clone().oneshot(post_user("jdoe")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["userName"], "jdoe");
        assert_eq!(created["name"]["formatted"], "John Doe");

        let response = app
            .clone()
            .oneshot(Request::get(format!("/Users/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/Users/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(Request::get(format!("/Users/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let app = app();
        app.clone().oneshot(post_user("jdoe")).await.unwrap();
        let response = app.oneshot(post_user("jdoe")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_users_with_username_filter() {
        let app = app();
        app.clone().oneshot(post_user("jdoe")).await.unwrap();
        app.clone().oneshot(post_user("asmith")).await.unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get("/Users?filter=userName%20eq%20%22jdoe%22")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalResults"], 1);
        assert_eq!(body["Resources"][0]["userName"], "jdoe");

        // Unsupported filter operator.
        let response = app
            .oneshot(
                Request::get("/Users?filter=userName%20co%20%22jd%22")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_group_with_unknown_member_is_bad_request() {
        let app = app();
        let response = app
            .oneshot(
                Request::post("/Groups")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "displayName": "ADMINS",
                            "members": [{"value": "usr_missing"}]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_user_draft_is_bad_request() {
        let app = app();
        let response = app
            .oneshot(
                Request::post("/Users")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"userName": "jdoe", "riskScore": 500}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
