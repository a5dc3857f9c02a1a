use std::sync::Arc;

use axum::extract::Extension;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::err::Error;
use crate::extract::Json;
use crate::{proceeds, Payload};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct RequestAccess {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticate {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub temp_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLogin {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessRequested {
    message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    message: &'static str,
    token: String,
}

pub async fn request_access(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<RequestAccess>,
) -> Payload<AccessRequested> {
    if let Err(err) = state.codes.issue(&body.email).await {
        log::warn!("Access code refused for {:?}: {:?}", body.email, err);
        return Err(err);
    }
    proceeds(AccessRequested {
        message: "An access code was sent to your e-mail.",
    })
}

pub async fn authenticate(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Authenticate>,
) -> Payload<LoggedIn> {
    if body.email.trim().is_empty() || body.temp_password.trim().is_empty() {
        return Err(Error::invalid_payload("E-mail and access code are required."));
    }
    let email = state.verifier.verify(&body.email, &body.temp_password)?;
    let token = state
        .sessions
        .student_session(state.store.as_ref(), &email, Utc::now())
        .await?;
    log::info!("Student session started for {}", email);
    proceeds(LoggedIn {
        message: "Authentication successful!",
        token,
    })
}

pub async fn admin_login(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<AdminLogin>,
) -> Payload<LoggedIn> {
    if let Err(err) = state.admin.check(&body.email, &body.senha) {
        log::warn!("Rejected admin login for {:?}", body.email);
        return Err(err);
    }
    let token = state.sessions.admin_session(state.admin.email(), Utc::now())?;
    log::info!("Admin session started for {}", state.admin.email());
    proceeds(LoggedIn {
        message: "Administrator login successful!",
        token,
    })
}
