pub mod auth;
pub mod config;
pub mod credentials;
pub mod curriculum;
pub mod err;
pub mod extract;
pub mod guard;
pub mod io;
pub mod jobs;
pub mod models;
pub mod notify;
pub mod session;
pub mod state;
pub mod store;

use std::sync::Arc;

use axum::extract::Extension;
use axum::handler::Handler;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::err::{Error, Success};
use crate::extract::Path;
use crate::state::AppState;

pub type Payload<T> = Result<(StatusCode, Success<T>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::OK, Success::of(value)))
}

pub fn created<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Success::of(value)))
}

async fn serve_blob(
    Extension(state): Extension<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let key = key.trim_start_matches('/');
    let bytes = state
        .blobs
        .retrieve(key)
        .await?
        .ok_or_else(|| Error::not_found("File not found."))?;
    Ok((
        [(header::CONTENT_TYPE, models::content_type_for(key))],
        bytes,
    ))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/students/request-access", post(auth::request_access))
        .route("/api/students/authenticate", post(auth::authenticate))
        .route(
            "/api/students/curriculum",
            get(curriculum::get_own).post(curriculum::save),
        )
        .route("/api/students/photo", post(curriculum::upload_photo))
        .route(
            "/api/students/pdf",
            post(curriculum::upload_pdf).delete(curriculum::delete_pdf),
        )
        .route("/api/company/curricula", get(curriculum::list_selected))
        .route("/api/curricula/:id", get(curriculum::get_detail))
        .route("/api/admin/login", post(auth::admin_login))
        .route("/api/admin/curricula", get(curriculum::admin_list))
        .route(
            "/api/admin/curricula/:id/status",
            put(curriculum::admin_set_status),
        )
        .route(
            "/api/admin/curricula/:id/select",
            put(curriculum::admin_toggle_selection),
        )
        .route(
            "/api/admin/jobs",
            get(jobs::admin_list).post(jobs::admin_create),
        )
        .route(
            "/api/admin/jobs/:id",
            get(jobs::admin_get).put(jobs::admin_update),
        )
        .route("/api/admin/jobs/:id/status", put(jobs::admin_set_status))
        .route(
            "/api/admin/jobs/:id/select/:curriculum_id",
            put(jobs::admin_select),
        )
        .route("/api/jobs", get(jobs::list_for_student))
        .route("/api/jobs/:id/apply", post(jobs::apply_handler))
        .route("/uploads/*key", get(serve_blob))
        .fallback(err::handler404.into_service())
        .layer(ServiceBuilder::new().layer(Extension(state)).layer(cors))
}
