use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{CurriculumQuery, JobQuery, Store};
use crate::err::Error;
use crate::models::{
    Attachment, Curriculum, CurriculumStatus, Experience, JobDetails, JobPosting, JobStatus,
    Language, Profile, Project, ReferenceSet,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and applies the embedded migrations.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CurriculumRow {
    id: Uuid,
    email: String,
    full_name: String,
    birth_date: NaiveDate,
    phone: Option<String>,
    linkedin: Option<String>,
    github: Option<String>,
    course: String,
    current_period: String,
    expected_completion: String,
    experiences: Json<Vec<Experience>>,
    technical_skills: Option<String>,
    languages: Json<Vec<Language>>,
    soft_skills: Option<String>,
    projects: Json<Vec<Project>>,
    summary: Option<String>,
    photo_key: Option<String>,
    pdf_key: Option<String>,
    status: String,
    selected_for_company: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CurriculumRow> for Curriculum {
    type Error = Error;

    fn try_from(row: CurriculumRow) -> Result<Self, Self::Error> {
        Ok(Curriculum {
            id: row.id,
            email: row.email,
            profile: Profile {
                full_name: row.full_name,
                birth_date: row.birth_date,
                phone: row.phone,
                linkedin: row.linkedin,
                github: row.github,
                course: row.course,
                current_period: row.current_period,
                expected_completion: row.expected_completion,
                experiences: row.experiences.0,
                technical_skills: row.technical_skills,
                languages: row.languages.0,
                soft_skills: row.soft_skills,
                projects: row.projects.0,
                summary: row.summary,
            },
            photo_key: row.photo_key,
            pdf_key: row.pdf_key,
            status: row.status.parse()?,
            selected_for_company: row.selected_for_company,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    title: String,
    area: String,
    description: String,
    requirements: String,
    benefits: Option<String>,
    employment_type: String,
    location: String,
    course: String,
    salary: Option<String>,
    company_contact: Option<String>,
    status: String,
    published_at: DateTime<Utc>,
    candidates: Vec<Uuid>,
    selected_candidates: Vec<Uuid>,
}

impl TryFrom<JobRow> for JobPosting {
    type Error = Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(JobPosting {
            id: row.id,
            details: JobDetails {
                title: row.title,
                area: row.area,
                description: row.description,
                requirements: row.requirements,
                benefits: row.benefits,
                employment_type: row.employment_type,
                location: row.location,
                course: row.course,
                salary: row.salary,
                company_contact: row.company_contact,
            },
            status: row.status.parse()?,
            published_at: row.published_at,
            candidates: row.candidates,
            selected_candidates: row.selected_candidates,
        })
    }
}

fn curricula_from(rows: Vec<CurriculumRow>) -> Result<Vec<Curriculum>, Error> {
    rows.into_iter().map(Curriculum::try_from).collect()
}

fn jobs_from(rows: Vec<JobRow>) -> Result<Vec<JobPosting>, Error> {
    rows.into_iter().map(JobPosting::try_from).collect()
}

const CURRICULUM_COLUMNS: &str = "email, full_name, birth_date, phone, linkedin, github, \
    course, current_period, expected_completion, experiences, technical_skills, languages, \
    soft_skills, projects, summary, photo_key, pdf_key, status, selected_for_company, \
    created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn curriculum_by_email(&self, email: &str) -> Result<Option<Curriculum>, Error> {
        let row = sqlx::query_as::<_, CurriculumRow>(
            "SELECT * FROM curricula WHERE email = $1 LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Curriculum::try_from).transpose()
    }

    async fn curriculum_by_id(&self, id: Uuid) -> Result<Option<Curriculum>, Error> {
        let row = sqlx::query_as::<_, CurriculumRow>("SELECT * FROM curricula WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Curriculum::try_from).transpose()
    }

    async fn curricula(&self, query: CurriculumQuery) -> Result<Vec<Curriculum>, Error> {
        let sql = match query {
            CurriculumQuery::All => "SELECT * FROM curricula ORDER BY created_at",
            CurriculumQuery::SelectedForCompany => {
                "SELECT * FROM curricula WHERE selected_for_company ORDER BY created_at"
            }
        };
        let rows = sqlx::query_as::<_, CurriculumRow>(sql)
            .fetch_all(&self.pool)
            .await?;
        curricula_from(rows)
    }

    async fn insert_curriculum(&self, cv: &Curriculum) -> Result<(), Error> {
        let sql = format!(
            "INSERT INTO curricula (id, {}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
            CURRICULUM_COLUMNS
        );
        bind_curriculum(sqlx::query(&sql).bind(cv.id), cv)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        email: &str,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error> {
        let row = sqlx::query_as::<_, CurriculumRow>(
            "UPDATE curricula SET full_name = $2, birth_date = $3, phone = $4, linkedin = $5, \
             github = $6, course = $7, current_period = $8, expected_completion = $9, \
             experiences = $10, technical_skills = $11, languages = $12, soft_skills = $13, \
             projects = $14, summary = $15, status = 'pending', updated_at = $16 \
             WHERE email = $1 RETURNING *",
        )
        .bind(email)
        .bind(&profile.full_name)
        .bind(profile.birth_date)
        .bind(&profile.phone)
        .bind(&profile.linkedin)
        .bind(&profile.github)
        .bind(&profile.course)
        .bind(&profile.current_period)
        .bind(&profile.expected_completion)
        .bind(Json(profile.experiences.clone()))
        .bind(&profile.technical_skills)
        .bind(Json(profile.languages.clone()))
        .bind(&profile.soft_skills)
        .bind(Json(profile.projects.clone()))
        .bind(&profile.summary)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Curriculum::try_from).transpose()
    }

    async fn set_attachment(
        &self,
        email: &str,
        attachment: Attachment,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error> {
        let column = match attachment {
            Attachment::Photo => "photo_key",
            Attachment::Pdf => "pdf_key",
        };
        let sql = format!(
            "UPDATE curricula SET {} = $2, updated_at = $3 WHERE email = $1 RETURNING *",
            column
        );
        let row = sqlx::query_as::<_, CurriculumRow>(&sql)
            .bind(email)
            .bind(key)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Curriculum::try_from).transpose()
    }

    async fn set_curriculum_status(
        &self,
        id: Uuid,
        status: CurriculumStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Curriculum>, Error> {
        let row = sqlx::query_as::<_, CurriculumRow>(
            "UPDATE curricula SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Curriculum::try_from).transpose()
    }

    async fn toggle_company_selection(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>, Error> {
        let selected = sqlx::query_scalar::<_, bool>(
            "UPDATE curricula SET selected_for_company = NOT selected_for_company, updated_at = $2 \
             WHERE id = $1 RETURNING selected_for_company",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(selected)
    }

    async fn insert_job(&self, job: &JobPosting) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO job_postings (id, title, area, description, requirements, benefits, \
             employment_type, location, course, salary, company_contact, status, published_at, \
             candidates, selected_candidates) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(job.id)
        .bind(&job.details.title)
        .bind(&job.details.area)
        .bind(&job.details.description)
        .bind(&job.details.requirements)
        .bind(&job.details.benefits)
        .bind(&job.details.employment_type)
        .bind(&job.details.location)
        .bind(&job.details.course)
        .bind(&job.details.salary)
        .bind(&job.details.company_contact)
        .bind(job.status.as_str())
        .bind(job.published_at)
        .bind(&job.candidates)
        .bind(&job.selected_candidates)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn job_by_id(&self, id: Uuid) -> Result<Option<JobPosting>, Error> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM job_postings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobPosting::try_from).transpose()
    }

    async fn jobs(&self, query: JobQuery) -> Result<Vec<JobPosting>, Error> {
        let rows = match query {
            JobQuery::All => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT * FROM job_postings ORDER BY published_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
            JobQuery::OpenForCourse(course) => {
                sqlx::query_as::<_, JobRow>(
                    "SELECT * FROM job_postings WHERE course = $1 AND status = 'active' \
                     ORDER BY published_at DESC",
                )
                .bind(course)
                .fetch_all(&self.pool)
                .await?
            }
        };
        jobs_from(rows)
    }

    async fn update_job_details(
        &self,
        id: Uuid,
        details: &JobDetails,
    ) -> Result<Option<JobPosting>, Error> {
        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE job_postings SET title = $2, area = $3, description = $4, requirements = $5, \
             benefits = $6, employment_type = $7, location = $8, course = $9, salary = $10, \
             company_contact = $11 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&details.title)
        .bind(&details.area)
        .bind(&details.description)
        .bind(&details.requirements)
        .bind(&details.benefits)
        .bind(&details.employment_type)
        .bind(&details.location)
        .bind(&details.course)
        .bind(&details.salary)
        .bind(&details.company_contact)
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobPosting::try_from).transpose()
    }

    async fn set_job_status(
        &self,
        id: Uuid,
        status: JobStatus,
    ) -> Result<Option<JobPosting>, Error> {
        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE job_postings SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobPosting::try_from).transpose()
    }

    async fn add_job_reference(
        &self,
        id: Uuid,
        set: ReferenceSet,
        curriculum: Uuid,
    ) -> Result<Option<JobPosting>, Error> {
        let column = match set {
            ReferenceSet::Candidates => "candidates",
            ReferenceSet::Selected => "selected_candidates",
        };
        let sql = format!(
            "UPDATE job_postings SET {col} = CASE WHEN $2 = ANY({col}) THEN {col} \
             ELSE array_append({col}, $2) END WHERE id = $1 RETURNING *",
            col = column
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(curriculum)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobPosting::try_from).transpose()
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_curriculum<'q>(query: PgQuery<'q>, cv: &'q Curriculum) -> PgQuery<'q> {
    let p = &cv.profile;
    query
        .bind(&cv.email)
        .bind(&p.full_name)
        .bind(p.birth_date)
        .bind(&p.phone)
        .bind(&p.linkedin)
        .bind(&p.github)
        .bind(&p.course)
        .bind(&p.current_period)
        .bind(&p.expected_completion)
        .bind(Json(p.experiences.clone()))
        .bind(&p.technical_skills)
        .bind(Json(p.languages.clone()))
        .bind(&p.soft_skills)
        .bind(Json(p.projects.clone()))
        .bind(&p.summary)
        .bind(&cv.photo_key)
        .bind(&cv.pdf_key)
        .bind(cv.status.as_str())
        .bind(cv.selected_for_company)
        .bind(cv.created_at)
        .bind(cv.updated_at)
}
