use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::access::{Actor, Role};
use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationPatch, ClientDraft, ClientId, ClientPatch,
    ClientRole, EventDraft, GrantDraft, GrantId, GrantPatch, GrantStatus, InviteDraft, InviteId,
    MatchDraft, MatchId, MatchPatch, ServiceRequestDraft, ServiceRequestId, ServiceRequestPatch,
    ServiceRequestStatus, SignupDraft, TagCategory, UserDraft, UserId,
};
use super::notify::Notifier;
use super::repository::{ApplicationFilter, GrantRepository, MatchFilter};
use super::service::{ClientQuery, GrantPipelineService, GrantQuery, PipelineError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type Service<R, N> = State<Arc<GrantPipelineService<R, N>>>;

/// Router exposing the catalog, match store, pipeline, onboarding and portal
/// commands. The acting user is taken from headers set by the upstream auth layer.
pub fn grant_router<R, N>(service: Arc<GrantPipelineService<R, N>>) -> Router
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/lookups", get(lookups_handler::<R, N>))
        .route("/api/v1/lookups/:category", post(add_tag_handler::<R, N>))
        .route(
            "/api/v1/grants",
            get(list_grants_handler::<R, N>).post(create_grant_handler::<R, N>),
        )
        .route(
            "/api/v1/grants/:grant_id",
            get(get_grant_handler::<R, N>)
                .patch(update_grant_handler::<R, N>)
                .delete(delete_grant_handler::<R, N>),
        )
        .route(
            "/api/v1/grants/:grant_id/verify",
            post(verify_grant_handler::<R, N>),
        )
        .route(
            "/api/v1/clients",
            get(list_clients_handler::<R, N>).post(create_client_handler::<R, N>),
        )
        .route(
            "/api/v1/clients/:client_id",
            get(get_client_handler::<R, N>)
                .patch(update_client_handler::<R, N>)
                .delete(delete_client_handler::<R, N>),
        )
        .route(
            "/api/v1/clients/:client_id/suggestions",
            get(suggestions_handler::<R, N>),
        )
        .route(
            "/api/v1/clients/:client_id/score/:grant_id",
            get(score_pair_handler::<R, N>),
        )
        .route(
            "/api/v1/clients/:client_id/messages",
            get(client_messages_handler::<R, N>),
        )
        .route(
            "/api/v1/clients/:client_id/members",
            get(client_members_handler::<R, N>).post(add_member_handler::<R, N>),
        )
        .route(
            "/api/v1/clients/:client_id/invites",
            get(list_invites_handler::<R, N>),
        )
        .route(
            "/api/v1/matches",
            get(list_matches_handler::<R, N>).post(create_match_handler::<R, N>),
        )
        .route(
            "/api/v1/matches/:match_id",
            get(get_match_handler::<R, N>)
                .patch(update_match_handler::<R, N>)
                .delete(delete_match_handler::<R, N>),
        )
        .route(
            "/api/v1/applications",
            get(list_applications_handler::<R, N>).post(create_application_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_application_handler::<R, N>)
                .patch(update_application_handler::<R, N>)
                .delete(delete_application_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/events",
            get(list_events_handler::<R, N>).post(add_event_handler::<R, N>),
        )
        .route("/api/v1/pipeline/counts", get(pipeline_counts_handler::<R, N>))
        .route("/api/v1/users", post(register_user_handler::<R, N>))
        .route("/api/v1/invites", post(create_invite_handler::<R, N>))
        .route("/api/v1/invites/verify", get(verify_invite_handler::<R, N>))
        .route("/api/v1/invites/accept", post(accept_invite_handler::<R, N>))
        .route("/api/v1/invites/:invite_id", delete(cancel_invite_handler::<R, N>))
        .route(
            "/api/v1/invites/:invite_id/resend",
            post(resend_invite_handler::<R, N>),
        )
        .route("/api/v1/signup", post(signup_handler::<R, N>))
        .route(
            "/api/v1/service-requests",
            get(list_service_requests_handler::<R, N>),
        )
        .route(
            "/api/v1/service-requests/:request_id",
            get(get_service_request_handler::<R, N>)
                .patch(update_service_request_handler::<R, N>),
        )
        .route("/api/v1/portal/clients", get(portal_clients_handler::<R, N>))
        .route(
            "/api/v1/portal/clients/:client_id/service-requests",
            post(request_managed_service_handler::<R, N>),
        )
        .route(
            "/api/v1/portal/clients/:client_id/subscription",
            get(portal_subscription_handler::<R, N>),
        )
        .route(
            "/api/v1/portal/clients/:client_id/grants",
            get(browse_grants_handler::<R, N>),
        )
        .route(
            "/api/v1/portal/clients/:client_id/grants/:grant_id",
            get(portal_grant_handler::<R, N>),
        )
        .route(
            "/api/v1/portal/applications",
            get(list_applications_handler::<R, N>),
        )
        .route(
            "/api/v1/portal/applications/:application_id",
            get(get_application_handler::<R, N>),
        )
        .route(
            "/api/v1/portal/applications/:application_id/events",
            get(list_events_handler::<R, N>),
        )
        .with_state(service)
}

/// Failure surfaced by a route.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated(message) => {
                let payload = json!({ "error": message });
                (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
            }
            ApiError::Pipeline(err) => err.into_response(),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
            PipelineError::Conflict(_) => StatusCode::CONFLICT,
            PipelineError::Forbidden(_) => StatusCode::FORBIDDEN,
            PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

/// Resolve the acting user from the auth headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header_value(headers, ACTOR_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {ACTOR_ID_HEADER} header")))?;
    let role = header_value(headers, ACTOR_ROLE_HEADER).ok_or_else(|| {
        ApiError::Unauthenticated(format!("missing {ACTOR_ROLE_HEADER} header"))
    })?;
    let role = Role::parse(role)
        .ok_or_else(|| ApiError::Unauthenticated(format!("unknown role '{role}'")))?;

    Ok(Actor::new(user_id, role))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn ok<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub status: Option<GrantStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub client_role: ClientRole,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceRequestQuery {
    pub status: Option<ServiceRequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub(crate) async fn lookups_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    actor_from_headers(&headers)?;
    let lookups = service.lookups()?;
    let mut tables = serde_json::Map::new();
    for category in TagCategory::ordered() {
        tables.insert(
            category.plural_label().replace(' ', "_"),
            json!(lookups.tags(category)),
        );
    }
    Ok(ok(tables))
}

pub(crate) async fn add_tag_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(category): Path<String>,
    Json(request): Json<TagRequest>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let category = TagCategory::parse(&category).ok_or_else(|| {
        PipelineError::validation(format!("unknown lookup category '{category}'"))
    })?;
    Ok(created(service.add_lookup_tag(&actor, category, &request.name)?))
}

pub(crate) async fn list_grants_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Query(query): Query<GrantQuery>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_grants(&actor, &query)?))
}

pub(crate) async fn create_grant_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Json(draft): Json<GrantDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.create_grant(&actor, draft)?))
}

pub(crate) async fn get_grant_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(grant_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.get_grant(&actor, &GrantId(grant_id))?))
}

pub(crate) async fn update_grant_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(grant_id): Path<String>,
    Json(patch): Json<GrantPatch>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.update_grant(&actor, &GrantId(grant_id), patch)?))
}

pub(crate) async fn delete_grant_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(grant_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    service.delete_grant(&actor, &GrantId(grant_id))?;
    Ok(no_content())
}

pub(crate) async fn verify_grant_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(grant_id): Path<String>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let grant_id = GrantId(grant_id);
    let status = match request.status {
        Some(status) => status,
        None => service.get_grant(&actor, &grant_id)?.status,
    };
    Ok(ok(service.verify_grant(&actor, &grant_id, status)?))
}

pub(crate) async fn list_clients_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Query(query): Query<ClientQuery>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_clients(&actor, &query)?))
}

pub(crate) async fn create_client_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Json(draft): Json<ClientDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.create_client(&actor, draft)?))
}

pub(crate) async fn get_client_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.get_client(&actor, &ClientId(client_id))?))
}

pub(crate) async fn update_client_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Json(patch): Json<ClientPatch>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.update_client(&actor, &ClientId(client_id), patch)?))
}

pub(crate) async fn delete_client_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    service.delete_client(&actor, &ClientId(client_id))?;
    Ok(no_content())
}

pub(crate) async fn suggestions_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.suggest_matches(&actor, &ClientId(client_id))?))
}

pub(crate) async fn score_pair_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path((client_id, grant_id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.score_pair(
        &actor,
        &ClientId(client_id),
        &GrantId(grant_id),
    )?))
}

pub(crate) async fn client_messages_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.client_messages(&actor, &ClientId(client_id))?))
}

pub(crate) async fn client_members_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.client_members(&actor, &ClientId(client_id))?))
}

pub(crate) async fn add_member_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Json(request): Json<MemberRequest>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let membership = service.add_client_member(
        &actor,
        &ClientId(client_id),
        &request.user_id,
        request.client_role,
    )?;
    Ok(created(membership))
}

pub(crate) async fn list_invites_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_invites(&actor, &ClientId(client_id))?))
}

pub(crate) async fn list_matches_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Query(filter): Query<MatchFilter>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_matches(&actor, &filter)?))
}

pub(crate) async fn create_match_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Json(draft): Json<MatchDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.create_match(&actor, draft)?))
}

pub(crate) async fn get_match_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(match_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.get_match(&actor, &MatchId(match_id))?))
}

pub(crate) async fn update_match_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(match_id): Path<String>,
    Json(patch): Json<MatchPatch>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.update_match(&actor, &MatchId(match_id), patch)?))
}

pub(crate) async fn delete_match_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(match_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    service.delete_match(&actor, &MatchId(match_id))?;
    Ok(no_content())
}

pub(crate) async fn list_applications_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_applications(&actor, &filter)?))
}

pub(crate) async fn create_application_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Json(draft): Json<ApplicationDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.create_application(&actor, draft)?))
}

pub(crate) async fn get_application_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.get_application(
        &actor,
        &ApplicationId(application_id),
    )?))
}

pub(crate) async fn update_application_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(patch): Json<ApplicationPatch>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.update_application(
        &actor,
        &ApplicationId(application_id),
        patch,
    )?))
}

pub(crate) async fn delete_application_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    service.delete_application(&actor, &ApplicationId(application_id))?;
    Ok(no_content())
}

pub(crate) async fn list_events_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_events(&actor, &ApplicationId(application_id))?))
}

pub(crate) async fn add_event_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(draft): Json<EventDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.add_event(
        &actor,
        &ApplicationId(application_id),
        draft,
    )?))
}

pub(crate) async fn pipeline_counts_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.pipeline_counts(&actor)?))
}

pub(crate) async fn register_user_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Json(draft): Json<UserDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.register_user(&actor, draft)?))
}

pub(crate) async fn create_invite_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Json(draft): Json<InviteDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.create_invite(&actor, draft)?))
}

pub(crate) async fn resend_invite_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(invite_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.resend_invite(&actor, &InviteId(invite_id))?))
}

pub(crate) async fn cancel_invite_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(invite_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    service.cancel_invite(&actor, &InviteId(invite_id))?;
    Ok(no_content())
}

/// Public: the accept page checks a link before the invitee signs up.
pub(crate) async fn verify_invite_handler<R, N>(
    State(service): Service<R, N>,
    Query(query): Query<TokenQuery>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(ok(service.verify_invite(&query.token)?))
}

/// Public: the token is the credential.
pub(crate) async fn accept_invite_handler<R, N>(
    State(service): Service<R, N>,
    Json(request): Json<AcceptRequest>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(created(service.accept_invite(&request.token, request.name)?))
}

/// Public: creates a self-service organization and its owner.
pub(crate) async fn signup_handler<R, N>(
    State(service): Service<R, N>,
    Json(draft): Json<SignupDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    Ok(created(service.signup(draft)?))
}

pub(crate) async fn list_service_requests_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Query(query): Query<ServiceRequestQuery>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.list_service_requests(&actor, query.status)?))
}

pub(crate) async fn get_service_request_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.get_service_request(
        &actor,
        &ServiceRequestId(request_id),
    )?))
}

pub(crate) async fn update_service_request_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(patch): Json<ServiceRequestPatch>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.update_service_request(
        &actor,
        &ServiceRequestId(request_id),
        patch,
    )?))
}

pub(crate) async fn request_managed_service_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Json(draft): Json<ServiceRequestDraft>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(created(service.request_managed_service(
        &actor,
        &ClientId(client_id),
        draft,
    )?))
}

pub(crate) async fn portal_clients_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.portal_clients(&actor)?))
}

pub(crate) async fn portal_subscription_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.portal_subscription(&actor, &ClientId(client_id))?))
}

pub(crate) async fn browse_grants_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Query(query): Query<GrantQuery>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.browse_grants(&actor, &ClientId(client_id), &query)?))
}

pub(crate) async fn portal_grant_handler<R, N>(
    State(service): Service<R, N>,
    headers: HeaderMap,
    Path((client_id, grant_id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: GrantRepository + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    let actor = actor_from_headers(&headers)?;
    Ok(ok(service.portal_grant(
        &actor,
        &ClientId(client_id),
        &GrantId(grant_id),
    )?))
}
