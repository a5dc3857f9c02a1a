//! Passwordless access codes: issuance, in-memory storage and redemption.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;

use crate::err::Error;
use crate::notify::Notifier;

pub const CODE_LENGTH: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How long an issued code stays redeemable.
pub fn code_ttl() -> Duration {
    Duration::minutes(5)
}

/// Lowercases and trims an address so it can be used as a key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCredential {
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Outstanding codes keyed by normalized email. Volatile; lost on restart.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: Arc<DashMap<String, PendingCredential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the pending code for `email`.
    pub fn put(&self, email: String, credential: PendingCredential) {
        self.entries.insert(email, credential);
    }

    pub fn get(&self, email: &str) -> Option<PendingCredential> {
        self.entries.get(email).map(|entry| entry.value().clone())
    }

    /// Removes the entry only if it is still the exact credential the caller observed.
    pub fn remove_if_current(&self, email: &str, seen: &PendingCredential) -> bool {
        self.entries
            .remove_if(email, |_, current| current == seen)
            .is_some()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.entries.contains_key(email)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn generate_code() -> String {
    let mut rng = thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn canonical_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub struct CodeIssuer {
    store: CredentialStore,
    domain_suffix: String,
    notifier: Arc<dyn Notifier>,
}

impl CodeIssuer {
    /// `domain` is the institutional mail domain, with or without the leading `@`.
    pub fn new(store: CredentialStore, domain: &str, notifier: Arc<dyn Notifier>) -> Self {
        let domain = domain.trim().trim_start_matches('@').to_lowercase();
        Self {
            store,
            domain_suffix: format!("@{}", domain),
            notifier,
        }
    }

    pub fn accepts(&self, email: &str) -> bool {
        email.len() > self.domain_suffix.len() && email.ends_with(&self.domain_suffix)
    }

    pub async fn issue(&self, email: &str) -> Result<(), Error> {
        self.issue_at(email, Utc::now()).await
    }

    pub async fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<(), Error> {
        let email = normalize_email(email);
        if !self.accepts(&email) {
            return Err(Error::InvalidDomain {
                message: format!(
                    "Please use your institutional e-mail ending in {}.",
                    self.domain_suffix
                ),
            });
        }

        let code = generate_code();
        let code_hash = Pbkdf2
            .hash_password(code.as_bytes(), &SaltString::generate(&mut OsRng))?
            .to_string();
        let credential = PendingCredential {
            code_hash,
            created_at: now,
        };
        self.store.put(email.clone(), credential.clone());

        if let Err(err) = self.notifier.deliver(&email, &code).await {
            self.store.remove_if_current(&email, &credential);
            return Err(Error::internal(
                "NotifierError",
                format!("Could not deliver access code: {}", err),
            ));
        }
        log::info!("Issued access code for {}", email);
        Ok(())
    }
}

pub struct CodeVerifier {
    store: CredentialStore,
    ttl: Duration,
}

impl CodeVerifier {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            ttl: code_ttl(),
        }
    }

    /// Redeems `code` for `email`, returning the normalized address on success.
    pub fn verify(&self, email: &str, code: &str) -> Result<String, Error> {
        self.verify_at(email, code, Utc::now())
    }

    pub fn verify_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<String, Error> {
        let email = normalize_email(email);
        let pending = self.store.get(&email).ok_or_else(not_found)?;

        if now - pending.created_at > self.ttl {
            self.store.remove_if_current(&email, &pending);
            log::warn!("Expired access code presented for {}", email);
            return Err(Error::CodeExpired {
                message: "Access code expired. Please request a new one.".to_string(),
            });
        }

        let hash = PasswordHash::new(&pending.code_hash)?;
        if Pbkdf2
            .verify_password(canonical_code(code).as_bytes(), &hash)
            .is_err()
        {
            log::warn!("Invalid access code presented for {}", email);
            return Err(Error::InvalidCode {
                message: "Invalid access code.".to_string(),
            });
        }

        // a concurrent redemption or re-issue wins
        if !self.store.remove_if_current(&email, &pending) {
            return Err(not_found());
        }
        Ok(email)
    }
}

fn not_found() -> Error {
    Error::CodeNotFound {
        message: "E-mail not found or code expired/already used.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;

    const EMAIL: &str = "aluno1@inbec.edu.br";

    fn setup() -> (CredentialStore, CodeIssuer, CodeVerifier, Arc<RecordingNotifier>) {
        let store = CredentialStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let issuer = CodeIssuer::new(store.clone(), "inbec.edu.br", notifier.clone());
        let verifier = CodeVerifier::new(store.clone());
        (store, issuer, verifier, notifier)
    }

    #[test]
    fn generated_codes_use_the_alphabet() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn foreign_domain_is_rejected_without_an_entry() {
        let (store, issuer, _, notifier) = setup();
        for email in ["someone@gmail.com", "@inbec.edu.br", "x@inbec.edu.br.evil.com", ""] {
            let err = issuer.issue(email).await.unwrap_err();
            assert!(matches!(err, Error::InvalidDomain { .. }), "{}", email);
        }
        assert!(store.is_empty());
        assert!(notifier.last_code("someone@gmail.com").is_none());
    }

    #[tokio::test]
    async fn reissue_replaces_the_pending_entry() {
        let (store, issuer, verifier, notifier) = setup();
        issuer.issue(EMAIL).await.unwrap();
        let first = store.get(EMAIL).unwrap();
        let first_code = notifier.last_code(EMAIL).unwrap();

        issuer.issue(" Aluno1@INBEC.edu.br ").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_ne!(store.get(EMAIL).unwrap(), first);

        let second_code = notifier.last_code(EMAIL).unwrap();
        if first_code != second_code {
            assert!(matches!(
                verifier.verify(EMAIL, &first_code),
                Err(Error::InvalidCode { .. })
            ));
        }
        assert_eq!(verifier.verify(EMAIL, &second_code).unwrap(), EMAIL);
    }

    #[tokio::test]
    async fn expired_code_is_removed() {
        let (store, issuer, verifier, notifier) = setup();
        let issued = Utc::now() - Duration::minutes(6);
        issuer.issue_at(EMAIL, issued).await.unwrap();
        let code = notifier.last_code(EMAIL).unwrap();

        let err = verifier.verify(EMAIL, &code).unwrap_err();
        assert!(matches!(err, Error::CodeExpired { .. }));
        assert!(!store.contains(EMAIL));

        let err = verifier.verify(EMAIL, &code).unwrap_err();
        assert!(matches!(err, Error::CodeNotFound { .. }));
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_entry_for_retry() {
        let (store, issuer, verifier, notifier) = setup();
        let issued = Utc::now();
        issuer.issue_at(EMAIL, issued).await.unwrap();
        let code = notifier.last_code(EMAIL).unwrap();
        let wrong = if code == "AAAAAA" { "BBBBBB" } else { "AAAAAA" };

        let err = verifier
            .verify_at(EMAIL, wrong, issued + Duration::minutes(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCode { .. }));
        assert!(store.contains(EMAIL));

        let email = verifier
            .verify_at(EMAIL, &code, issued + Duration::minutes(4))
            .unwrap();
        assert_eq!(email, EMAIL);
    }

    #[tokio::test]
    async fn codes_are_single_use() {
        let (store, issuer, verifier, notifier) = setup();
        issuer.issue(EMAIL).await.unwrap();
        let code = notifier.last_code(EMAIL).unwrap();

        verifier.verify(EMAIL, &code).unwrap();
        assert!(store.is_empty());
        let err = verifier.verify(EMAIL, &code).unwrap_err();
        assert!(matches!(err, Error::CodeNotFound { .. }));
    }

    #[tokio::test]
    async fn codes_are_case_insensitive() {
        let (_, issuer, verifier, notifier) = setup();
        issuer.issue(EMAIL).await.unwrap();
        let code = notifier.last_code(EMAIL).unwrap().to_lowercase();
        assert!(verifier.verify(EMAIL, &format!(" {} ", code)).is_ok());
    }

    #[test]
    fn never_requested_is_not_found() {
        let (_, _, verifier, _) = setup();
        let err = verifier.verify(EMAIL, "ABC123").unwrap_err();
        assert!(matches!(err, Error::CodeNotFound { .. }));
    }

    struct FailingNotifier;

    #[async_trait::async_trait]
    impl Notifier for FailingNotifier {
        async fn deliver(&self, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    #[tokio::test]
    async fn failed_delivery_withdraws_the_code() {
        let store = CredentialStore::new();
        let issuer = CodeIssuer::new(store.clone(), "@inbec.edu.br", Arc::new(FailingNotifier));
        let err = issuer.issue(EMAIL).await.unwrap_err();
        assert!(matches!(err, Error::InternalError { .. }));
        assert!(store.is_empty());
    }
}
