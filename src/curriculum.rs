//! Student profiles and their review lifecycle.
//!
//! A student save always puts the curriculum back to `pending`. Only the
//! administrator moves it between states or toggles company visibility.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::extract::{Json, Path, UploadBody};
use crate::guard::{AdminUser, AuthUser};
use crate::io::{blob_key, BlobStore};
use crate::models::{
    Attachment, Curriculum, CurriculumStatus, Experience, Language, Profile, Project,
    PDF_MAX_BYTES, PHOTO_MAX_BYTES,
};
use crate::state::AppState;
use crate::store::{CurriculumQuery, Store};
use crate::{created, proceeds, Payload};

pub const SUMMARY_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperienceDraft {
    pub company: Option<String>,
    pub role: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageDraft {
    pub language: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// Profile fields as submitted by a student. Review fields are not accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurriculumDraft {
    pub full_name: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub course: Option<String>,
    pub current_period: Option<String>,
    pub expected_completion: Option<String>,
    pub experiences: Vec<ExperienceDraft>,
    pub technical_skills: Option<String>,
    pub languages: Vec<LanguageDraft>,
    pub soft_skills: Option<String>,
    pub projects: Vec<ProjectDraft>,
    pub summary: Option<String>,
}

/// Collects every violation so they can be reported in one message.
#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn required(&mut self, field: &str, value: &Option<String>) -> String {
        match trimmed(value) {
            Some(v) => v,
            None => {
                self.0.push(format!("{} is required", field));
                String::new()
            }
        }
    }

    fn finish(self) -> Result<(), Error> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                message: self.0.join(", "),
            })
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::from_str(raw)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local().date()))
}

impl CurriculumDraft {
    pub fn validate(&self) -> Result<Profile, Error> {
        let mut v = Violations::default();

        let full_name = v.required("fullName", &self.full_name);
        let birth_date = match trimmed(&self.birth_date) {
            None => {
                v.0.push("birthDate is required".to_string());
                None
            }
            Some(raw) => {
                let parsed = parse_birth_date(&raw);
                if parsed.is_none() {
                    v.0.push("birthDate is not a valid date".to_string());
                }
                parsed
            }
        };
        let course = v.required("course", &self.course);
        let current_period = v.required("currentPeriod", &self.current_period);
        let expected_completion = v.required("expectedCompletion", &self.expected_completion);

        let experiences = self
            .experiences
            .iter()
            .enumerate()
            .map(|(i, e)| Experience {
                company: v.required(&format!("experiences[{}].company", i), &e.company),
                role: v.required(&format!("experiences[{}].role", i), &e.role),
                start: v.required(&format!("experiences[{}].start", i), &e.start),
                end: v.required(&format!("experiences[{}].end", i), &e.end),
                description: v
                    .required(&format!("experiences[{}].description", i), &e.description),
            })
            .collect();
        let languages = self
            .languages
            .iter()
            .enumerate()
            .map(|(i, l)| Language {
                language: v.required(&format!("languages[{}].language", i), &l.language),
                level: v.required(&format!("languages[{}].level", i), &l.level),
            })
            .collect();
        let projects = self
            .projects
            .iter()
            .enumerate()
            .map(|(i, p)| Project {
                name: v.required(&format!("projects[{}].name", i), &p.name),
                description: v.required(&format!("projects[{}].description", i), &p.description),
                link: v.required(&format!("projects[{}].link", i), &p.link),
            })
            .collect();

        let summary = trimmed(&self.summary);
        if let Some(summary) = &summary {
            if summary.chars().count() > SUMMARY_MAX_CHARS {
                v.0.push(format!(
                    "summary must be at most {} characters",
                    SUMMARY_MAX_CHARS
                ));
            }
        }

        v.finish()?;
        let birth_date = birth_date.ok_or_else(|| Error::Validation {
            message: "birthDate is required".to_string(),
        })?;
        Ok(Profile {
            full_name,
            birth_date,
            phone: trimmed(&self.phone),
            linkedin: trimmed(&self.linkedin),
            github: trimmed(&self.github),
            course,
            current_period,
            expected_completion,
            experiences,
            technical_skills: trimmed(&self.technical_skills),
            languages,
            soft_skills: trimmed(&self.soft_skills),
            projects,
            summary,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Saved {
    pub curriculum: Curriculum,
    pub created: bool,
}

/// Creates or updates the curriculum owned by `email`; the result is always `pending`.
pub async fn save_profile(
    store: &dyn Store,
    email: &str,
    draft: &CurriculumDraft,
    now: DateTime<Utc>,
) -> Result<Saved, Error> {
    let profile = draft.validate()?;
    if let Some(curriculum) = store.update_profile(email, &profile, now).await? {
        return Ok(Saved {
            curriculum,
            created: false,
        });
    }
    let curriculum = Curriculum::new(email.to_string(), profile, now);
    store.insert_curriculum(&curriculum).await?;
    Ok(Saved {
        curriculum,
        created: true,
    })
}

/// Admin transition; every state may move to every other state.
pub async fn set_status(
    store: &dyn Store,
    id: Uuid,
    status: CurriculumStatus,
    now: DateTime<Utc>,
) -> Result<Curriculum, Error> {
    store
        .set_curriculum_status(id, status, now)
        .await?
        .ok_or_else(curriculum_not_found)
}

/// Flips company visibility, independently of review status.
pub async fn toggle_selection(
    store: &dyn Store,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool, Error> {
    store
        .toggle_company_selection(id, now)
        .await?
        .ok_or_else(curriculum_not_found)
}

/// Company-facing listing. Empty is reported as not found.
pub async fn selected_for_company(store: &dyn Store) -> Result<Vec<Curriculum>, Error> {
    let selected = store.curricula(CurriculumQuery::SelectedForCompany).await?;
    if selected.is_empty() {
        return Err(Error::not_found(
            "No selected curriculum was found at the moment.",
        ));
    }
    Ok(selected)
}

/// Single-record read; inactive curricula are hidden.
pub async fn detail(store: &dyn Store, id: Uuid) -> Result<Curriculum, Error> {
    let curriculum = store
        .curriculum_by_id(id)
        .await?
        .ok_or_else(curriculum_not_found)?;
    if curriculum.status == CurriculumStatus::Inactive {
        return Err(Error::forbidden(
            "Access denied. Curriculum not available for viewing.",
        ));
    }
    Ok(curriculum)
}

/// Stores an uploaded file and points the student's curriculum at it.
pub async fn attach(
    store: &dyn Store,
    blobs: &dyn BlobStore,
    email: &str,
    attachment: Attachment,
    content_type: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<Curriculum, Error> {
    let extension = attachment.extension_for(content_type).ok_or_else(|| {
        Error::invalid_payload(match attachment {
            Attachment::Photo => "Only image files (JPG, JPEG, PNG, GIF) are allowed!",
            Attachment::Pdf => "Only PDF files are allowed!",
        })
    })?;
    if bytes.is_empty() {
        return Err(Error::invalid_payload("No file was sent."));
    }
    if bytes.len() > attachment.max_bytes() {
        return Err(Error::PayloadTooLarge {
            message: format!("File exceeds the {} byte limit.", attachment.max_bytes()),
        });
    }

    let current = store
        .curriculum_by_email(email)
        .await?
        .ok_or_else(|| Error::CurriculumNotFound {
            message: "Save your curriculum before uploading files.".to_string(),
        })?;

    let key = blob_key(attachment.prefix(), &current.id, bytes, extension);
    blobs.store(&key, bytes).await?;
    let updated = store
        .set_attachment(email, attachment, Some(&key), now)
        .await?
        .ok_or_else(curriculum_not_found)?;

    if let Some(old) = attachment.key_of(&current) {
        if old != key {
            discard_blob(blobs, old).await;
        }
    }
    Ok(updated)
}

/// Unlinks an attachment and removes its blob.
pub async fn detach(
    store: &dyn Store,
    blobs: &dyn BlobStore,
    email: &str,
    attachment: Attachment,
    now: DateTime<Utc>,
) -> Result<Curriculum, Error> {
    let current = store.curriculum_by_email(email).await?;
    let old = current
        .as_ref()
        .and_then(|cv| attachment.key_of(cv))
        .map(str::to_string)
        .ok_or_else(|| Error::not_found("No file on record."))?;
    let updated = store
        .set_attachment(email, attachment, None, now)
        .await?
        .ok_or_else(curriculum_not_found)?;
    discard_blob(blobs, &old).await;
    Ok(updated)
}

async fn discard_blob(blobs: &dyn BlobStore, key: &str) {
    if let Err(err) = blobs.delete(key).await {
        log::warn!("Could not delete blob {}: {:?}", key, err);
    }
}

fn curriculum_not_found() -> Error {
    Error::not_found("Curriculum not found.")
}

// --- handlers ---

#[derive(Debug, Serialize)]
pub struct OwnCurriculum {
    curriculum: Option<Curriculum>,
}

#[derive(Debug, Serialize)]
pub struct CurriculumSaved {
    message: String,
    curriculum: Curriculum,
}

#[derive(Debug, Deserialize)]
pub struct SetStatus {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionToggled {
    selected_for_company: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSaved {
    key: Option<String>,
    curriculum: Curriculum,
}

pub async fn get_own(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Payload<OwnCurriculum> {
    let curriculum = state.store.curriculum_by_email(claims.email()).await?;
    proceeds(OwnCurriculum { curriculum })
}

pub async fn save(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(draft): Json<CurriculumDraft>,
) -> Payload<CurriculumSaved> {
    let saved = save_profile(state.store.as_ref(), claims.email(), &draft, Utc::now()).await?;
    log::info!(
        "Curriculum {} saved by {}, awaiting review",
        saved.curriculum.id,
        claims.email()
    );
    if saved.created {
        created(CurriculumSaved {
            message: "Curriculum saved and sent for review!".to_string(),
            curriculum: saved.curriculum,
        })
    } else {
        proceeds(CurriculumSaved {
            message: "Curriculum updated and sent for review!".to_string(),
            curriculum: saved.curriculum,
        })
    }
}

async fn upload(
    state: &AppState,
    email: &str,
    attachment: Attachment,
    headers: &HeaderMap,
    body: &[u8],
) -> Payload<AttachmentSaved> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let curriculum = attach(
        state.store.as_ref(),
        state.blobs.as_ref(),
        email,
        attachment,
        content_type,
        body,
        Utc::now(),
    )
    .await?;
    proceeds(AttachmentSaved {
        key: attachment.key_of(&curriculum).map(str::to_string),
        curriculum,
    })
}

pub async fn upload_photo(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    headers: HeaderMap,
    UploadBody(body): UploadBody<{ PHOTO_MAX_BYTES }>,
) -> Payload<AttachmentSaved> {
    upload(&state, claims.email(), Attachment::Photo, &headers, &body).await
}

pub async fn upload_pdf(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    headers: HeaderMap,
    UploadBody(body): UploadBody<{ PDF_MAX_BYTES }>,
) -> Payload<AttachmentSaved> {
    upload(&state, claims.email(), Attachment::Pdf, &headers, &body).await
}

pub async fn delete_pdf(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Payload<AttachmentSaved> {
    let curriculum = detach(
        state.store.as_ref(),
        state.blobs.as_ref(),
        claims.email(),
        Attachment::Pdf,
        Utc::now(),
    )
    .await?;
    proceeds(AttachmentSaved {
        key: None,
        curriculum,
    })
}

pub async fn list_selected(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Curriculum>>, Error> {
    Ok(Json(selected_for_company(state.store.as_ref()).await?))
}

pub async fn get_detail(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Curriculum>, Error> {
    let id = Uuid::from_str(&id)?;
    Ok(Json(detail(state.store.as_ref(), id).await?))
}

pub async fn admin_list(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Curriculum>>, Error> {
    Ok(Json(state.store.curricula(CurriculumQuery::All).await?))
}

pub async fn admin_set_status(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<SetStatus>,
) -> Payload<CurriculumSaved> {
    let id = Uuid::from_str(&id)?;
    let status = CurriculumStatus::from_str(&body.status)?;
    let curriculum = set_status(state.store.as_ref(), id, status, Utc::now()).await?;
    log::info!("{} set curriculum {} to {}", admin.email(), id, status);
    proceeds(CurriculumSaved {
        message: format!("Curriculum status updated to '{}'.", status),
        curriculum,
    })
}

pub async fn admin_toggle_selection(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Payload<SelectionToggled> {
    let id = Uuid::from_str(&id)?;
    let selected_for_company = toggle_selection(state.store.as_ref(), id, Utc::now()).await?;
    log::info!(
        "{} set company selection of curriculum {} to {}",
        admin.email(),
        id,
        selected_for_company
    );
    proceeds(SelectionToggled {
        selected_for_company,
    })
}
