use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CurriculumQuery, JobQuery, Store};
use crate::err::Error;
use crate::models::{
    Attachment, Curriculum, CurriculumStatus, JobDetails, JobPosting, JobStatus, Profile,
    ReferenceSet,
};

/// Volatile store used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    curricula: RwLock<HashMap<Uuid, Curriculum>>,
    jobs: RwLock<HashMap<Uuid, JobPosting>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn curriculum_by_email(&self, email: &str) -> Result<Option<Curriculum>, Error> {
        let curricula = self.curricula.read().await;
        Ok(curricula.values().find(|cv| cv.email == email).cloned())
    }

    async fn curriculum_by_id(&self, id: Uuid) -> Result<Option<Curriculum>, Error> {
        Ok(self.curricula.read().await.get(&id).cloned())
    }

    async fn curricula(&self, query: CurriculumQuery) -> Result<Vec<Curriculum>, Error> {
        let curricula = self.curricula.read().await;
        let mut found: Vec<Curriculum> = curricula
            .values()
            .filter(|cv| match query {
                CurriculumQuery::All => true,
                CurriculumQuery::SelectedForCompany => cv.selected_for_company,
            })
            .cloned()
            .collect();
        found.sort_by_key(|cv| cv.created_at);
        Ok(found)
    }

    async fn insert_curriculum(&self, curriculum: &Curriculum) -> Result<(), Error> {
        let mut curricula = self.curricula.write().await;
        if curricula.values().any(|cv| cv.email == curriculum.email) {
            return Err(Error::Conflict {
                message: format!("Curriculum for `{}` already exists!", curriculum.email),
            });
        }
        curricula.insert(curriculum.id, curriculum.clone());
        Ok(())
    }

    async fn update_profile(
        &self,
        email: &str,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error> {
        let mut curricula = self.curricula.write().await;
        Ok(curricula.values_mut().find(|cv| cv.email == email).map(|cv| {
            cv.profile = profile.clone();
            cv.status = CurriculumStatus::Pending;
            cv.updated_at = now;
            cv.clone()
        }))
    }

    async fn set_attachment(
        &self,
        email: &str,
        attachment: Attachment,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error> {
        let mut curricula = self.curricula.write().await;
        Ok(curricula.values_mut().find(|cv| cv.email == email).map(|cv| {
            let slot = match attachment {
                Attachment::Photo => &mut cv.photo_key,
                Attachment::Pdf => &mut cv.pdf_key,
            };
            *slot = key.map(str::to_string);
            cv.updated_at = now;
            cv.clone()
        }))
    }

    async fn set_curriculum_status(
        &self,
        id: Uuid,
        status: CurriculumStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error> {
        let mut curricula = self.curricula.write().await;
        Ok(curricula.get_mut(&id).map(|cv| {
            cv.status = status;
            cv.updated_at = now;
            cv.clone()
        }))
    }

    async fn toggle_company_selection(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>, Error> {
        let mut curricula = self.curricula.write().await;
        Ok(curricula.get_mut(&id).map(|cv| {
            cv.selected_for_company = !cv.selected_for_company;
            cv.updated_at = now;
            cv.selected_for_company
        }))
    }

    async fn insert_job(&self, job: &JobPosting) -> Result<(), Error> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn job_by_id(&self, id: Uuid) -> Result<Option<JobPosting>, Error> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn jobs(&self, query: JobQuery) -> Result<Vec<JobPosting>, Error> {
        let jobs = self.jobs.read().await;
        let mut found: Vec<JobPosting> = jobs
            .values()
            .filter(|job| match &query {
                JobQuery::All => true,
                JobQuery::OpenForCourse(course) => {
                    job.status == JobStatus::Active && &job.details.course == course
                }
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(found)
    }

    async fn update_job_details(
        &self,
        id: Uuid,
        details: &JobDetails,
    ) -> Result<Option<JobPosting>, Error> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.get_mut(&id).map(|job| {
            job.details = details.clone();
            job.clone()
        }))
    }

    async fn set_job_status(
        &self,
        id: Uuid,
        status: JobStatus,
    ) -> Result<Option<JobPosting>, Error> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.get_mut(&id).map(|job| {
            job.status = status;
            job.clone()
        }))
    }

    async fn add_job_reference(
        &self,
        id: Uuid,
        set: ReferenceSet,
        curriculum: Uuid,
    ) -> Result<Option<JobPosting>, Error> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.get_mut(&id).map(|job| {
            job.add_reference(set, curriculum);
            job.clone()
        }))
    }
}
