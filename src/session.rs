use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::credentials::normalize_email;
use crate::err::Error;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

/// Session token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn student(email: &str, course: Option<String>, now: DateTime<Utc>) -> Self {
        Self::new(email, Role::Student, course, now, Duration::hours(1))
    }

    /// Admin sessions never carry a course.
    pub fn admin(email: &str, now: DateTime<Utc>) -> Self {
        Self::new(email, Role::Admin, None, now, Duration::hours(8))
    }

    fn new(
        email: &str,
        role: Role,
        course: Option<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: email.to_string(),
            role,
            course,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn email(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Signs and validates HS256 session tokens with a shared secret.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is exact
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, Error> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    /// Checks signature and expiry and returns the embedded claims.
    pub fn decode(&self, token: &str) -> Result<Claims, Error> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|err| {
                log::debug!("Rejected session token: {}", err);
                invalid_token()
            })?
            .claims;
        if claims.is_admin() && claims.course.is_some() {
            return Err(invalid_token());
        }
        Ok(claims)
    }

    /// Starts a student session for an address that has just redeemed a code.
    ///
    /// The course is read from the student's curriculum once, here; later edits
    /// only show up in the next session.
    pub async fn student_session(
        &self,
        store: &dyn Store,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let course = match store.curriculum_by_email(email).await {
            Ok(cv) => cv.map(|cv| cv.profile.course),
            Err(err) => {
                log::warn!("Could not resolve course for {}: {:?}", email, err);
                None
            }
        };
        self.sign(&Claims::student(email, course, now))
    }

    pub fn admin_session(&self, email: &str, now: DateTime<Utc>) -> Result<String, Error> {
        self.sign(&Claims::admin(email, now))
    }
}

fn invalid_token() -> Error {
    Error::InvalidOrExpiredToken {
        message: "Invalid or expired token.".to_string(),
    }
}

/// The single administrator account, with the password kept only as a PBKDF2 hash.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    email: String,
    password_hash: String,
}

impl AdminCredentials {
    /// Accepts either a plaintext password, hashed here, or an existing `$pbkdf2` PHC string.
    pub fn new(email: &str, password: &str) -> Result<Self, Error> {
        let password_hash = if password.starts_with("$pbkdf2") {
            PasswordHash::new(password)?;
            password.to_string()
        } else {
            Pbkdf2
                .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
                .to_string()
        };
        Ok(Self {
            email: normalize_email(email),
            password_hash,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn check(&self, email: &str, password: &str) -> Result<(), Error> {
        let hash = PasswordHash::new(&self.password_hash)?;
        // the hash is verified even for a wrong address so both paths cost the same
        let password_ok = Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok();
        if normalize_email(email) == self.email && password_ok {
            Ok(())
        } else {
            Err(Error::InvalidAdminCredentials {
                message: "Invalid administrator credentials.".to_string(),
            })
        }
    }
}
