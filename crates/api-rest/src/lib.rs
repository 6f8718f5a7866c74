//! # API REST
//!
//! REST API implementation for CareCard.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - The OpenAPI document
//! - REST-specific concerns (JSON serialisation, CORS, status codes)
//!
//! Uses `api-shared` for request and response types and `carecard-core` for the work itself.
//! The API is stateless: chat history lives in the browser and is sent with every question.

#![warn(rust_2018_idioms)]

use api_shared::{
    AnalyseReq, AskReq, AskRes, ChatRoleDto, EmergencyQuery, EmergencyRes, ErrorRes,
    FirstAidTipRes, FormatReq, FormattedRes, HealthRes, HealthService, HospitalRes,
    HospitalsQuery, HospitalsRes, LatLon, ProfileReq, QrRes, RouteQuery, RouteRes,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use carecard_core::{
    emergency, prompts, strip_tags, transcript, AnalysisKind, CareError, ChatMessage,
    ChatSession, CompletionClient, CoreConfig, FormattedResponse, GeoPoint, HealthProfile,
    HospitalFinder, InlineData, ReqwestTransport, RetryingClient,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

pub const REST_ADDR_ENV: &str = "CARECARD_REST_ADDR";
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Application state for the REST API server
///
/// Built once from the resolved [`CoreConfig`] and shared by all handlers. The completion
/// client is absent when no API key was configured.
#[derive(Clone)]
pub struct AppState {
    completion: Option<Arc<CompletionClient<ReqwestTransport>>>,
    hospitals: Arc<HospitalFinder<ReqwestTransport>>,
}

impl AppState {
    pub fn new(cfg: &CoreConfig) -> Self {
        let transport = ReqwestTransport::new();
        let policy = cfg.retry_policy();
        let completion = cfg.completion().ok().map(|completion_cfg| {
            Arc::new(CompletionClient::new(
                RetryingClient::new(transport.clone(), policy),
                completion_cfg.clone(),
            ))
        });
        let hospitals = Arc::new(HospitalFinder::new(
            RetryingClient::new(transport, policy),
            cfg,
        ));

        Self {
            completion,
            hospitals,
        }
    }

    fn completion(&self) -> Result<&CompletionClient<ReqwestTransport>, ApiError> {
        self.completion.as_deref().ok_or_else(|| {
            ApiError(CareError::InvalidConfig(
                "completion service is not configured".into(),
            ))
        })
    }
}

/// A core error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CareError);

impl From<CareError> for ApiError {
    fn from(e: CareError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CareError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CareError::InvalidConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
            CareError::HttpStatus { .. }
            | CareError::Transport(_)
            | CareError::RequestFailed { .. }
            | CareError::AttemptTimedOut(_)
            | CareError::Deserialization(_) => StatusCode::BAD_GATEWAY,
            CareError::Cancelled
            | CareError::Serialization(_)
            | CareError::FileRead(_)
            | CareError::FileWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        } else {
            tracing::warn!("request rejected: {}", self.0);
        }
        let body = ErrorRes {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, format, ask, analyse, hospitals, route, emergency_links, profile_qr),
    components(schemas(
        HealthRes,
        ErrorRes,
        FormatReq,
        FormattedRes,
        AskReq,
        AskRes,
        api_shared::ChatTurn,
        ChatRoleDto,
        AnalyseReq,
        api_shared::ImagePayload,
        HospitalRes,
        HospitalsRes,
        LatLon,
        RouteRes,
        FirstAidTipRes,
        EmergencyRes,
        ProfileReq,
        QrRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with CORS and the OpenAPI document.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/format", post(format))
        .route("/ask", post(ask))
        .route("/analyse", post(analyse))
        .route("/hospitals", get(hospitals))
        .route("/route", get(route))
        .route("/emergency", get(emergency_links))
        .route("/profile/qr", post(profile_qr))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the REST API until the server stops.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ CareCard REST listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn formatted(reply: &FormattedResponse) -> FormattedRes {
    FormattedRes {
        html: reply.to_html(),
        plain_text: reply.to_plain_text(),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/format",
    request_body = FormatReq,
    responses(
        (status = 200, description = "Formatted reply", body = FormattedRes)
    )
)]
/// Format raw completion text as HTML and structured plain text
///
/// Never fails: empty text formats as the placeholder.
#[axum::debug_handler]
async fn format(Json(req): Json<FormatReq>) -> Json<FormattedRes> {
    Json(formatted(&FormattedResponse::from_optional(req.text.as_deref())))
}

#[utoipa::path(
    post,
    path = "/ask",
    request_body = AskReq,
    responses(
        (status = 200, description = "Formatted answer", body = AskRes),
        (status = 400, description = "Blank question", body = ErrorRes),
        (status = 502, description = "Completion service failed", body = ErrorRes),
        (status = 503, description = "Completion service not configured", body = ErrorRes)
    )
)]
/// Ask a question with the conversation so far
///
/// # Arguments
/// * `req` - The question and the earlier messages, oldest first
///
/// # Returns
/// * `Ok(Json<AskRes>)` - The answer in both display forms and the updated transcript
///
/// # Errors
/// Returns `400`, `502` or `503` as listed above.
#[axum::debug_handler]
async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskReq>,
) -> Result<Json<AskRes>, ApiError> {
    let client = state.completion()?;

    let history = req
        .history
        .into_iter()
        .map(|turn| match turn.role {
            ChatRoleDto::User => ChatMessage::user(turn.content),
            ChatRoleDto::Assistant => ChatMessage::assistant_text(strip_tags(&turn.content)),
        })
        .collect();
    let mut session = ChatSession::from_messages(history);

    let reply = session.ask(client, &req.question, None).await?.clone();

    Ok(Json(AskRes {
        html: reply.html(),
        plain_text: reply.plain_text(),
        transcript: transcript::transcript_text(session.messages()),
    }))
}

#[utoipa::path(
    post,
    path = "/analyse",
    request_body = AnalyseReq,
    responses(
        (status = 200, description = "Formatted analysis", body = FormattedRes),
        (status = 400, description = "Unknown kind or nothing to analyse", body = ErrorRes),
        (status = 502, description = "Completion service failed", body = ErrorRes),
        (status = 503, description = "Completion service not configured", body = ErrorRes)
    )
)]
/// Run one of the fixed analyses on a description and/or image
#[axum::debug_handler]
async fn analyse(
    State(state): State<AppState>,
    Json(req): Json<AnalyseReq>,
) -> Result<Json<FormattedRes>, ApiError> {
    let kind: AnalysisKind = req.kind.parse()?;

    let image = match req.image {
        Some(image) if !image.mime_type.starts_with("image/") => {
            return Err(CareError::InvalidInput(format!(
                "unsupported image type: {}",
                image.mime_type
            ))
            .into());
        }
        Some(image) if image.data.trim().is_empty() => {
            return Err(CareError::InvalidInput("image data is empty".into()).into());
        }
        Some(image) => Some(InlineData {
            mime_type: image.mime_type,
            data: image.data,
        }),
        None => None,
    };

    let client = state.completion()?;
    let reply = prompts::analyse(client, kind, req.description.as_deref(), image, None).await?;
    Ok(Json(formatted(&reply)))
}

#[utoipa::path(
    get,
    path = "/hospitals",
    params(HospitalsQuery),
    responses(
        (status = 200, description = "Hospitals, nearest first", body = HospitalsRes),
        (status = 400, description = "Bad coordinates", body = ErrorRes),
        (status = 502, description = "Map service failed", body = ErrorRes)
    )
)]
/// Hospitals around a point, nearest first
#[axum::debug_handler]
async fn hospitals(
    State(state): State<AppState>,
    Query(q): Query<HospitalsQuery>,
) -> Result<Json<HospitalsRes>, ApiError> {
    let center = GeoPoint::new(q.lat, q.lon)?;
    let found = state.hospitals.nearby(center, q.radius, None).await?;

    Ok(Json(HospitalsRes {
        hospitals: found
            .into_iter()
            .map(|h| HospitalRes {
                name: h.name,
                lat: h.lat,
                lon: h.lon,
                distance_km: h.distance_km,
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/route",
    params(RouteQuery),
    responses(
        (status = 200, description = "Driving route as lat/lon points", body = RouteRes),
        (status = 400, description = "Bad coordinates", body = ErrorRes),
        (status = 502, description = "Routing service failed", body = ErrorRes)
    )
)]
/// Driving route between two points
#[axum::debug_handler]
async fn route(
    State(state): State<AppState>,
    Query(q): Query<RouteQuery>,
) -> Result<Json<RouteRes>, ApiError> {
    let from = GeoPoint::new(q.from_lat, q.from_lon)?;
    let to = GeoPoint::new(q.to_lat, q.to_lon)?;
    let found = state.hospitals.route(from, to, None).await?;

    Ok(Json(RouteRes {
        points: found
            .points
            .into_iter()
            .map(|p| LatLon { lat: p.lat, lon: p.lon })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/emergency",
    params(EmergencyQuery),
    responses(
        (status = 200, description = "Ambulance links and first-aid tips", body = EmergencyRes),
        (status = 400, description = "Bad coordinates", body = ErrorRes)
    )
)]
/// Ambulance links, a map link when a location is given, and first-aid tips
#[axum::debug_handler]
async fn emergency_links(Query(q): Query<EmergencyQuery>) -> Result<Json<EmergencyRes>, ApiError> {
    let location = match (q.lat, q.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        (None, None) => None,
        _ => {
            return Err(
                CareError::InvalidInput("lat and lon must be given together".into()).into(),
            )
        }
    };
    let links = emergency::emergency_links(location)?;

    Ok(Json(EmergencyRes {
        call: links.call,
        sms: links.sms,
        whatsapp: links.whatsapp,
        location: links.location,
        tips: emergency::first_aid_tips()
            .iter()
            .map(|tip| FirstAidTipRes {
                topic: tip.topic.to_string(),
                advice: tip.advice.to_string(),
            })
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/profile/qr",
    request_body = ProfileReq,
    responses(
        (status = 200, description = "QR payload", body = QrRes),
        (status = 400, description = "Invalid profile", body = ErrorRes)
    )
)]
/// Validate a health profile and return the text to encode in its QR code
#[axum::debug_handler]
async fn profile_qr(Json(req): Json<ProfileReq>) -> Result<Json<QrRes>, ApiError> {
    let profile = HealthProfile {
        name: req.name,
        dob: req.dob,
        gender: req.gender,
        blood_group: req.blood_group,
        disease: req.disease,
        allergies: req.allergies,
        address: req.address,
        parent_name: req.parent_name,
        parent_contact: req.parent_contact,
        emergency_contact: req.emergency_contact,
        doctor_name: req.doctor_name,
        doctor_contact: req.doctor_contact,
    }
    .normalised();

    Ok(Json(QrRes {
        payload: profile.qr_payload()?,
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
