//! HTTP integration tests against an in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use vitrine_server::io::LocalBlobStore;
use vitrine_server::models::PDF_MAX_BYTES;
use vitrine_server::notify::Notifier;
use vitrine_server::session::{AdminCredentials, Claims, SessionIssuer};
use vitrine_server::state::AppState;
use vitrine_server::store::MemoryStore;

const JWT_SECRET: &str = "integration-secret";
const ADMIN_EMAIL: &str = "admin@inbec.edu.br";
const ADMIN_PASSWORD: &str = "admin-pass";
const STUDENT_EMAIL: &str = "aluno1@inbec.edu.br";

/// Captures delivered codes so tests can log in.
#[derive(Clone, Default)]
struct Inbox {
    codes: Arc<Mutex<HashMap<String, String>>>,
}

impl Inbox {
    fn code_for(&self, email: &str) -> String {
        self.codes
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .expect("no code delivered")
    }
}

#[async_trait]
impl Notifier for Inbox {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
        self.codes
            .lock()
            .unwrap()
            .insert(email.to_string(), code.to_string());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    inbox: Inbox,
    _uploads: TempDir,
}

async fn test_app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let blobs = LocalBlobStore::prepare(uploads.path()).await.unwrap();
    let inbox = Inbox::default();
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(blobs),
        Arc::new(inbox.clone()),
        SessionIssuer::new(JWT_SECRET),
        AdminCredentials::new(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap(),
        "inbec.edu.br",
    );
    TestApp {
        router: vitrine_server::build_router(Arc::new(state)),
        inbox,
        _uploads: uploads,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn student_token(&self, email: &str) -> String {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/students/request-access",
                None,
                Some(json!({ "email": email })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let code = self.inbox.code_for(email);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/students/authenticate",
                None,
                Some(json!({ "email": email, "tempPassword": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/admin/login",
                None,
                Some(json!({ "email": ADMIN_EMAIL, "senha": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

fn curriculum_body() -> Value {
    json!({
        "fullName": "Aluno Um",
        "birthDate": "2001-04-12",
        "course": "Engenharia Civil",
        "currentPeriod": "6",
        "expectedCompletion": "2026",
        "experiences": [],
        "languages": [{ "language": "English", "level": "B2" }],
        "projects": [],
        "summary": "Estudante de engenharia."
    })
}

fn job_body() -> Value {
    json!({
        "title": "Estagio em obras",
        "area": "Engenharia",
        "description": "Acompanhamento de obras",
        "requirements": "AutoCAD",
        "employmentType": "Estagio",
        "location": "Fortaleza",
        "course": "Engenharia Civil"
    })
}

#[tokio::test]
async fn curriculum_reaches_the_company_after_review_and_selection() {
    let app = test_app().await;
    let student = app.student_token(STUDENT_EMAIL).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/students/curriculum",
            Some(&student),
            Some(curriculum_body()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["curriculum"]["status"], "pending");
    let id = body["curriculum"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(Method::GET, "/api/company/curricula", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let admin = app.admin_token().await;
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/admin/curricula/{}/status", id),
            Some(&admin),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["curriculum"]["status"], "active");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/admin/curricula/{}/select", id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selectedForCompany"], true);

    let (status, body) = app
        .send(Method::GET, "/api/company/curricula", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["email"], STUDENT_EMAIL);

    // editing sends the curriculum back to review without losing the selection
    let (status, body) = app
        .send(
            Method::POST,
            "/api/students/curriculum",
            Some(&student),
            Some(curriculum_body()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["curriculum"]["status"], "pending");
    assert_eq!(body["curriculum"]["selectedForCompany"], true);
}

#[tokio::test]
async fn access_codes_are_single_use() {
    let app = test_app().await;
    app.send(
        Method::POST,
        "/api/students/request-access",
        None,
        Some(json!({ "email": STUDENT_EMAIL })),
    )
    .await;
    let code = app.inbox.code_for(STUDENT_EMAIL);
    let login = json!({ "email": STUDENT_EMAIL, "tempPassword": code });

    let (status, _) = app
        .send(
            Method::POST,
            "/api/students/authenticate",
            None,
            Some(login.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/students/authenticate", None, Some(login))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "CodeNotFound");
}

#[tokio::test]
async fn access_is_limited_to_the_institution_domain() {
    let app = test_app().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/students/request-access",
            None,
            Some(json!({ "email": "someone@gmail.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidDomain");
}

#[tokio::test]
async fn protected_routes_check_the_bearer_token() {
    let app = test_app().await;

    let (status, body) = app
        .send(Method::GET, "/api/students/curriculum", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "MissingToken");

    let request = Request::builder()
        .uri("/api/students/curriculum")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "MalformedToken");

    let (status, body) = app
        .send(
            Method::GET,
            "/api/students/curriculum",
            Some("not-a-jwt"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidOrExpiredToken");

    let student = app.student_token(STUDENT_EMAIL).await;
    let (status, body) = app
        .send(Method::GET, "/api/admin/curricula", Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn admin_login_rejects_a_wrong_password() {
    let app = test_app().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/admin/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "senha": "guess" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidAdminCredentials");
}

#[tokio::test]
async fn applying_twice_records_one_candidate() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let (status, body) = app
        .send(Method::POST, "/api/admin/jobs", Some(&admin), Some(job_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let job_id = body["job"]["id"].as_str().unwrap().to_string();

    // the course claim is read at login, so the curriculum comes first
    let student = app.student_token(STUDENT_EMAIL).await;
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/jobs/{}/apply", job_id),
            Some(&student),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "CurriculumNotFound");

    app.send(
        Method::POST,
        "/api/students/curriculum",
        Some(&student),
        Some(curriculum_body()),
    )
    .await;
    let student = app.student_token(STUDENT_EMAIL).await;

    let (status, body) = app.send(Method::GET, "/api/jobs", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);

    for _ in 0..2 {
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/jobs/{}/apply", job_id),
                Some(&student),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/admin/jobs/{}", job_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["candidates"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_paths_answer_not_found() {
    let app = test_app().await;
    let (status, body) = app.send(Method::GET, "/api/nothing-here", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn tokens_are_refused_right_after_expiry() {
    let app = test_app().await;
    let issued = chrono::Utc::now() - chrono::Duration::hours(1) - chrono::Duration::seconds(30);
    let token = SessionIssuer::new(JWT_SECRET)
        .sign(&Claims::student(STUDENT_EMAIL, None, issued))
        .unwrap();
    let (status, body) = app
        .send(Method::GET, "/api/students/curriculum", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidOrExpiredToken");
}

#[tokio::test]
async fn unreadable_bodies_answer_with_a_json_error() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/students/request-access")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidPayload");
    assert!(body["message"].is_string());

    let student = app.student_token(STUDENT_EMAIL).await;
    let mut draft = curriculum_body();
    draft["fullName"] = json!(42);
    let (status, body) = app
        .send(
            Method::POST,
            "/api/students/curriculum",
            Some(&student),
            Some(draft),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn oversized_uploads_are_refused_before_reading() {
    let app = test_app().await;
    let student = app.student_token(STUDENT_EMAIL).await;
    let oversized = PDF_MAX_BYTES + 1;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/students/pdf")
        .header(header::AUTHORIZATION, format!("Bearer {}", student))
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, oversized.to_string())
        .body(Body::from(vec![0u8; oversized]))
        .unwrap();
    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "PayloadTooLarge");
}
