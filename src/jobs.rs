use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::extract::{Json, Path};
use crate::guard::{AdminUser, AuthUser};
use crate::models::{Curriculum, JobDetails, JobPosting, JobStatus, ReferenceSet};
use crate::session::Claims;
use crate::state::AppState;
use crate::store::{CurriculumQuery, JobQuery, Store};
use crate::{created, proceeds, Payload};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDraft {
    pub title: Option<String>,
    pub area: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub employment_type: Option<String>,
    pub location: Option<String>,
    pub course: Option<String>,
    pub salary: Option<String>,
    pub company_contact: Option<String>,
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl JobDraft {
    pub fn validate(&self) -> Result<JobDetails, Error> {
        let mut missing = Vec::new();
        let mut required = |field: &str, value: &Option<String>| {
            optional(value).unwrap_or_else(|| {
                missing.push(format!("{} is required", field));
                String::new()
            })
        };
        let details = JobDetails {
            title: required("title", &self.title),
            area: required("area", &self.area),
            description: required("description", &self.description),
            requirements: required("requirements", &self.requirements),
            benefits: optional(&self.benefits),
            employment_type: required("employmentType", &self.employment_type),
            location: required("location", &self.location),
            course: required("course", &self.course),
            salary: optional(&self.salary),
            company_contact: optional(&self.company_contact),
        };
        if !missing.is_empty() {
            return Err(Error::Validation {
                message: missing.join(", "),
            });
        }
        Ok(details)
    }
}

pub async fn create_job(
    store: &dyn Store,
    draft: &JobDraft,
    now: DateTime<Utc>,
) -> Result<JobPosting, Error> {
    let job = JobPosting::new(draft.validate()?, now);
    store.insert_job(&job).await?;
    Ok(job)
}

pub async fn update_job(store: &dyn Store, id: Uuid, draft: &JobDraft) -> Result<JobPosting, Error> {
    let details = draft.validate()?;
    store
        .update_job_details(id, &details)
        .await?
        .ok_or_else(job_not_found)
}

pub async fn set_status(store: &dyn Store, id: Uuid, status: JobStatus) -> Result<JobPosting, Error> {
    store
        .set_job_status(id, status)
        .await?
        .ok_or_else(job_not_found)
}

/// Records the caller's curriculum as a candidate. Repeating is a no-op.
pub async fn apply(store: &dyn Store, email: &str, job_id: Uuid) -> Result<JobPosting, Error> {
    store.job_by_id(job_id).await?.ok_or_else(job_not_found)?;
    let curriculum = store
        .curriculum_by_email(email)
        .await?
        .ok_or_else(|| Error::CurriculumNotFound {
            message: "Curriculum not found.".to_string(),
        })?;
    store
        .add_job_reference(job_id, ReferenceSet::Candidates, curriculum.id)
        .await?
        .ok_or_else(job_not_found)
}

/// Admin shortlist. The curriculum need not have applied.
pub async fn select_candidate(
    store: &dyn Store,
    job_id: Uuid,
    curriculum_id: Uuid,
) -> Result<JobPosting, Error> {
    store.job_by_id(job_id).await?.ok_or_else(job_not_found)?;
    store
        .curriculum_by_id(curriculum_id)
        .await?
        .ok_or_else(|| Error::not_found("Curriculum not found."))?;
    store
        .add_job_reference(job_id, ReferenceSet::Selected, curriculum_id)
        .await?
        .ok_or_else(job_not_found)
}

/// Active postings for the course recorded in the session at login.
pub async fn open_for(store: &dyn Store, claims: &Claims) -> Result<Vec<JobPosting>, Error> {
    match &claims.course {
        Some(course) => store.jobs(JobQuery::OpenForCourse(course.clone())).await,
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOverview {
    #[serde(flatten)]
    pub job: JobPosting,
    pub candidate_profiles: Vec<Curriculum>,
}

/// Every posting with its candidate references resolved to curricula.
pub async fn overview(store: &dyn Store) -> Result<Vec<JobOverview>, Error> {
    let jobs = store.jobs(JobQuery::All).await?;
    let curricula: HashMap<Uuid, Curriculum> = store
        .curricula(CurriculumQuery::All)
        .await?
        .into_iter()
        .map(|cv| (cv.id, cv))
        .collect();
    Ok(jobs
        .into_iter()
        .map(|job| {
            let candidate_profiles = job
                .candidates
                .iter()
                .filter_map(|id| curricula.get(id).cloned())
                .collect();
            JobOverview {
                job,
                candidate_profiles,
            }
        })
        .collect())
}

fn job_not_found() -> Error {
    Error::not_found("Job posting not found.")
}

fn parse_id(raw: &str) -> Result<Uuid, Error> {
    Ok(Uuid::from_str(raw)?)
}

// --- handlers ---

#[derive(Debug, Serialize)]
pub struct JobBody {
    job: JobPosting,
}

#[derive(Debug, Serialize)]
pub struct JobList<T> {
    jobs: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct Acknowledged {
    message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SetStatus {
    #[serde(default)]
    status: String,
}

pub async fn list_for_student(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Payload<JobList<JobPosting>> {
    let jobs = open_for(state.store.as_ref(), &claims).await?;
    proceeds(JobList { jobs })
}

pub async fn apply_handler(
    Extension(state): Extension<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Payload<Acknowledged> {
    let job_id = parse_id(&id)?;
    apply(state.store.as_ref(), claims.email(), job_id).await?;
    log::info!("{} applied to job {}", claims.email(), job_id);
    proceeds(Acknowledged {
        message: "Application registered.",
    })
}

pub async fn admin_list(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Payload<JobList<JobOverview>> {
    let jobs = overview(state.store.as_ref()).await?;
    proceeds(JobList { jobs })
}

pub async fn admin_create(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(draft): Json<JobDraft>,
) -> Payload<JobBody> {
    let job = create_job(state.store.as_ref(), &draft, Utc::now()).await?;
    log::info!("{} published job {}", admin.email(), job.id);
    created(JobBody { job })
}

pub async fn admin_get(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Payload<JobBody> {
    let job = state
        .store
        .job_by_id(parse_id(&id)?)
        .await?
        .ok_or_else(job_not_found)?;
    proceeds(JobBody { job })
}

pub async fn admin_update(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(draft): Json<JobDraft>,
) -> Payload<JobBody> {
    let job = update_job(state.store.as_ref(), parse_id(&id)?, &draft).await?;
    log::info!("{} edited job {}", admin.email(), job.id);
    proceeds(JobBody { job })
}

pub async fn admin_set_status(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<SetStatus>,
) -> Payload<JobBody> {
    let id = parse_id(&id)?;
    let status = JobStatus::from_str(&body.status)?;
    let job = set_status(state.store.as_ref(), id, status).await?;
    log::info!("{} set job {} to {}", admin.email(), id, status);
    proceeds(JobBody { job })
}

pub async fn admin_select(
    Extension(state): Extension<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path((job_id, curriculum_id)): Path<(String, String)>,
) -> Payload<Acknowledged> {
    let job_id = parse_id(&job_id)?;
    let curriculum_id = parse_id(&curriculum_id)?;
    select_candidate(state.store.as_ref(), job_id, curriculum_id).await?;
    log::info!(
        "{} selected curriculum {} for job {}",
        admin.email(),
        curriculum_id,
        job_id
    );
    proceeds(Acknowledged {
        message: "Curriculum selected for the job posting.",
    })
}
