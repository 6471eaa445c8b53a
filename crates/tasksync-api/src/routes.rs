use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tasksync_core::adapters::{list_databases, list_task_lists, AvailableList};
use tasksync_core::db::{
    Database, LibSqlRelationshipRepository, ListSelection, RelationshipRepository,
};
use tasksync_core::oauth_state::OAuthStateStore;
use tasksync_core::sync::{RunId, SyncScheduler};
use tasksync_core::{Service, SyncRelationship};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::oauth::OAuthClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    jwt_verifier: Arc<JwtVerifier>,
    relationships: LibSqlRelationshipRepository,
    pub scheduler: SyncScheduler,
    oauth_states: OAuthStateStore,
    oauth: OAuthClient,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>, db: &Database) -> Result<Self, AppError> {
        let conn = db.connection().clone();
        Ok(Self {
            jwt_verifier: Arc::new(JwtVerifier::new(&config.jwt_secret)),
            relationships: LibSqlRelationshipRepository::new(conn.clone()),
            scheduler: SyncScheduler::new(conn, config.adapter.clone(), config.sync_interval),
            oauth_states: OAuthStateStore::new(config.oauth_state_ttl),
            oauth: OAuthClient::new(config.clone())?,
            config,
        })
    }

    async fn relationship_for(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<Option<SyncRelationship>, AppError> {
        Ok(self.relationships.get_by_user(&user.user_id).await?)
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync/start", post(start_sync))
        .route("/sync/stop", post(stop_sync))
        .route("/user_data", get(get_user_data).post(save_user_data))
        .route("/connect/{service}", get(connect_service))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/oauth/{service}/callback", get(oauth_callback))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    running_loops: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        running_loops: state.scheduler.running_count().await,
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn parse_service(raw: &str) -> Result<Service, AppError> {
    Service::from_str(raw).map_err(|_| AppError::bad_request(format!("Unknown service `{raw}`")))
}

#[derive(Debug, Serialize)]
struct StartResponse {
    run_id: RunId,
}

async fn start_sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<StartResponse>, AppError> {
    let relationship = state
        .relationship_for(&user)
        .await?
        .ok_or(tasksync_core::Error::NotReady)?;
    let run_id = state.scheduler.start(&relationship.id).await?;
    tracing::info!(
        endpoint = "sync_start",
        tenant = %relationship.id,
        run_id = %run_id,
        "Sync start requested"
    );
    Ok(Json(StartResponse { run_id }))
}

#[derive(Debug, Serialize)]
struct StopResponse {
    stopped: bool,
}

async fn stop_sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<StopResponse>, AppError> {
    let Some(relationship) = state.relationship_for(&user).await? else {
        return Ok(Json(StopResponse { stopped: false }));
    };
    let stopped = state.scheduler.stop(&relationship.id).await?;
    tracing::info!(
        endpoint = "sync_stop",
        tenant = %relationship.id,
        stopped,
        "Sync stop requested"
    );
    Ok(Json(StopResponse { stopped }))
}

#[derive(Debug, Default, Serialize)]
struct NotionOptions {
    is_connected: bool,
    workspace_name: Option<String>,
    database_id: Option<String>,
    title_property: Option<String>,
    available_lists: Vec<AvailableList>,
}

#[derive(Debug, Default, Serialize)]
struct GoogleTasksOptions {
    is_connected: bool,
    task_list_id: Option<String>,
    available_lists: Vec<AvailableList>,
}

#[derive(Debug, Default, Serialize)]
struct UserDataResponse {
    user_id: String,
    /// Everything needed to start is in place right now
    is_ready: bool,
    /// Sticky readiness flag used for restart-on-boot
    ready: bool,
    is_active: bool,
    is_running: bool,
    notion: NotionOptions,
    google_tasks: GoogleTasksOptions,
}

async fn get_user_data(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<UserDataResponse>, AppError> {
    let Some(relationship) = state.relationship_for(&user).await? else {
        return Ok(Json(UserDataResponse {
            user_id: user.user_id,
            ..UserDataResponse::default()
        }));
    };

    let settings = &state.config.adapter;
    let notion_lists = async {
        let Some(notion) = relationship.notion.as_ref() else {
            return Vec::new();
        };
        list_databases(&notion.credentials.access_token, settings)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(tenant = %relationship.id, %error, "Could not list Notion databases");
                Vec::new()
            })
    };
    let google_lists = async {
        let Some(google) = relationship.google_tasks.as_ref() else {
            return Vec::new();
        };
        list_task_lists(&google.credentials, settings)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(tenant = %relationship.id, %error, "Could not list Google task lists");
                Vec::new()
            })
    };
    let (notion_lists, google_lists) = tokio::join!(notion_lists, google_lists);

    let notion = relationship
        .notion
        .as_ref()
        .map(|notion| NotionOptions {
            is_connected: true,
            workspace_name: notion.credentials.workspace_name.clone(),
            database_id: notion.database_id.clone(),
            title_property: notion.title_property.clone(),
            available_lists: notion_lists,
        })
        .unwrap_or_default();
    let google_tasks = relationship
        .google_tasks
        .as_ref()
        .map(|google| GoogleTasksOptions {
            is_connected: true,
            task_list_id: google.task_list_id.clone(),
            available_lists: google_lists,
        })
        .unwrap_or_default();

    Ok(Json(UserDataResponse {
        user_id: relationship.user_id.clone(),
        is_ready: relationship.meets_readiness(),
        ready: relationship.ready,
        is_active: relationship.is_active,
        is_running: state.scheduler.is_running(&relationship.id).await,
        notion,
        google_tasks,
    }))
}

#[derive(Debug, Serialize)]
struct SaveUserDataResponse {
    ready: bool,
}

async fn save_user_data(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(selection): Json<ListSelection>,
) -> Result<Json<SaveUserDataResponse>, AppError> {
    let relationship = state
        .relationship_for(&user)
        .await?
        .ok_or_else(|| AppError::bad_request("Connect a service before choosing lists"))?;
    let relationship = state
        .relationships
        .configure(&relationship.id, &selection)
        .await?;
    state.scheduler.restart(&relationship.id).await?;
    tracing::info!(
        endpoint = "user_data",
        tenant = %relationship.id,
        ready = relationship.ready,
        "Saved list selection"
    );
    Ok(Json(SaveUserDataResponse {
        ready: relationship.ready,
    }))
}

#[derive(Debug, Serialize)]
struct ConnectResponse {
    authorization_url: String,
}

async fn connect_service(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(service): Path<String>,
) -> Result<Json<ConnectResponse>, AppError> {
    let service = parse_service(&service)?;
    let token = state.oauth_states.issue(&user.user_id, service).await;
    let authorization_url = state.oauth.authorization_url(service, &token)?;
    tracing::info!(endpoint = "connect", service = %service, "Issued authorization URL");
    Ok(Json(ConnectResponse { authorization_url }))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallbackResponse {
    service: Service,
    ready: bool,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let service = parse_service(&service)?;
    if let Some(error) = query.error {
        return Err(AppError::bad_request(format!(
            "{service} authorization was denied: {error}"
        )));
    }
    let token = query
        .state
        .ok_or_else(|| AppError::bad_request("Missing `state` parameter"))?;
    let code = query
        .code
        .ok_or_else(|| AppError::bad_request("Missing `code` parameter"))?;

    let pending = state
        .oauth_states
        .consume(&token)
        .await
        .ok_or_else(|| AppError::bad_request("OAuth state is invalid or expired"))?;
    if pending.service != service {
        return Err(AppError::bad_request(
            "OAuth state was issued for a different service",
        ));
    }

    let relationship = match service {
        Service::Notion => {
            let credentials = state.oauth.exchange_notion(&code).await?;
            let relationship = state
                .relationships
                .connect_notion(&pending.user_id, credentials)
                .await?;
            let needs_title = relationship
                .notion
                .as_ref()
                .is_some_and(|notion| notion.title_property.is_none());
            if needs_title {
                let selection = ListSelection {
                    title_property: Some(state.config.notion_title_property.clone()),
                    ..ListSelection::default()
                };
                state
                    .relationships
                    .configure(&relationship.id, &selection)
                    .await?
            } else {
                relationship
            }
        }
        Service::GoogleTasks => {
            let credentials = state.oauth.exchange_google(&code).await?;
            state
                .relationships
                .connect_google_tasks(&pending.user_id, credentials)
                .await?
        }
    };
    state.scheduler.restart(&relationship.id).await?;
    tracing::info!(
        tenant = %relationship.id,
        service = %service,
        "Connected service"
    );

    match state.config.frontend_url.as_deref() {
        Some(frontend) => Ok(Redirect::to(frontend).into_response()),
        None => Ok(Json(CallbackResponse {
            service,
            ready: relationship.ready,
        })
        .into_response()),
    }
}
