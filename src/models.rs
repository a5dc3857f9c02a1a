use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;

/// Review state of a student profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurriculumStatus {
    #[default]
    Pending,
    Active,
    Inactive,
}

impl CurriculumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurriculumStatus::Pending => "pending",
            CurriculumStatus::Active => "active",
            CurriculumStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for CurriculumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurriculumStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CurriculumStatus::Pending),
            "active" => Ok(CurriculumStatus::Active),
            "inactive" => Ok(CurriculumStatus::Inactive),
            other => Err(Error::invalid_payload(format!(
                "Invalid curriculum status `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Active,
    Inactive,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "inactive" => Ok(JobStatus::Inactive),
            other => Err(Error::invalid_payload(format!(
                "Invalid job status `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub company: String,
    pub role: String,
    pub start: String,
    pub end: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub language: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub description: String,
    pub link: String,
}

/// Student-editable part of a curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub course: String,
    pub current_period: String,
    pub expected_completion: String,
    pub experiences: Vec<Experience>,
    pub technical_skills: Option<String>,
    pub languages: Vec<Language>,
    pub soft_skills: Option<String>,
    pub projects: Vec<Project>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub id: Uuid,
    pub email: String,
    #[serde(flatten)]
    pub profile: Profile,
    pub photo_key: Option<String>,
    pub pdf_key: Option<String>,
    pub status: CurriculumStatus,
    pub selected_for_company: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Curriculum {
    pub fn new(email: String, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            profile,
            photo_key: None,
            pdf_key: None,
            status: CurriculumStatus::Pending,
            selected_for_company: false,
            created_at: now,
            updated_at: now,
        }
    }
}

pub const PHOTO_MAX_BYTES: usize = 2 * 1024 * 1024;
pub const PDF_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Files a student may attach to their curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Photo,
    Pdf,
}

impl Attachment {
    pub fn prefix(&self) -> &'static str {
        match self {
            Attachment::Photo => "photos",
            Attachment::Pdf => "pdfs",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            Attachment::Photo => PHOTO_MAX_BYTES,
            Attachment::Pdf => PDF_MAX_BYTES,
        }
    }

    /// File extension for an accepted content type.
    pub fn extension_for(&self, content_type: &str) -> Option<&'static str> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match (self, mime.as_str()) {
            (Attachment::Photo, "image/jpeg") | (Attachment::Photo, "image/jpg") => Some("jpg"),
            (Attachment::Photo, "image/png") => Some("png"),
            (Attachment::Photo, "image/gif") => Some("gif"),
            (Attachment::Pdf, "application/pdf") => Some("pdf"),
            _ => None,
        }
    }

    pub fn key_of<'a>(&self, curriculum: &'a Curriculum) -> Option<&'a str> {
        match self {
            Attachment::Photo => curriculum.photo_key.as_deref(),
            Attachment::Pdf => curriculum.pdf_key.as_deref(),
        }
    }
}

/// Content type to serve a stored blob with, judged by its key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Admin-editable part of a job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub title: String,
    pub area: String,
    pub description: String,
    pub requirements: String,
    pub benefits: Option<String>,
    pub employment_type: String,
    pub location: String,
    pub course: String,
    pub salary: Option<String>,
    pub company_contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: JobDetails,
    pub status: JobStatus,
    pub published_at: DateTime<Utc>,
    pub candidates: Vec<Uuid>,
    pub selected_candidates: Vec<Uuid>,
}

impl JobPosting {
    pub fn new(details: JobDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            details,
            status: JobStatus::Active,
            published_at: now,
            candidates: Vec::new(),
            selected_candidates: Vec::new(),
        }
    }

    /// Appends `curriculum` to `set` unless already present. Returns whether it was added.
    pub fn add_reference(&mut self, set: ReferenceSet, curriculum: Uuid) -> bool {
        let refs = match set {
            ReferenceSet::Candidates => &mut self.candidates,
            ReferenceSet::Selected => &mut self.selected_candidates,
        };
        if refs.contains(&curriculum) {
            return false;
        }
        refs.push(curriculum);
        true
    }
}

/// The two curriculum reference sets embedded in a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSet {
    Candidates,
    Selected,
}
