//! Document persistence for curricula and job postings.
//!
//! Every method is atomic with respect to a single document. Nothing spans
//! documents, so callers must not assume a read followed by a write sees the
//! same state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::err::Error;
use crate::models::{
    Attachment, Curriculum, CurriculumStatus, JobDetails, JobPosting, JobStatus, Profile,
    ReferenceSet,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurriculumQuery {
    All,
    SelectedForCompany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobQuery {
    All,
    /// Active postings targeting the given course.
    OpenForCourse(String),
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn curriculum_by_email(&self, email: &str) -> Result<Option<Curriculum>, Error>;

    async fn curriculum_by_id(&self, id: Uuid) -> Result<Option<Curriculum>, Error>;

    async fn curricula(&self, query: CurriculumQuery) -> Result<Vec<Curriculum>, Error>;

    /// Fails with `Conflict` when a curriculum with the same email exists.
    async fn insert_curriculum(&self, curriculum: &Curriculum) -> Result<(), Error>;

    /// Replaces the profile fields of the curriculum owned by `email` and puts it
    /// back into review.
    async fn update_profile(
        &self,
        email: &str,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error>;

    async fn set_attachment(
        &self,
        email: &str,
        attachment: Attachment,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error>;

    async fn set_curriculum_status(
        &self,
        id: Uuid,
        status: CurriculumStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error>;

    /// Flips `selected_for_company`, returning the new value.
    async fn toggle_company_selection(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>, Error>;

    async fn insert_job(&self, job: &JobPosting) -> Result<(), Error>;

    async fn job_by_id(&self, id: Uuid) -> Result<Option<JobPosting>, Error>;

    async fn jobs(&self, query: JobQuery) -> Result<Vec<JobPosting>, Error>;

    /// Replaces the editable fields; status and reference sets are untouched.
    async fn update_job_details(
        &self,
        id: Uuid,
        details: &JobDetails,
    ) -> Result<Option<JobPosting>, Error>;

    async fn set_job_status(&self, id: Uuid, status: JobStatus)
        -> Result<Option<JobPosting>, Error>;

    /// Adds `curriculum` to the posting's `set` if not already a member.
    async fn add_job_reference(
        &self,
        id: Uuid,
        set: ReferenceSet,
        curriculum: Uuid,
    ) -> Result<Option<JobPosting>, Error>;
}
