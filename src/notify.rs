use async_trait::async_trait;

/// Out-of-band delivery of access codes.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes codes to the server log. Development only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
        log::info!("Access code for {}: {}", email, code);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Remembers the last code delivered to each address.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        codes: Mutex<HashMap<String, String>>,
    }

    impl RecordingNotifier {
        pub fn last_code(&self, email: &str) -> Option<String> {
            self.codes.lock().unwrap().get(email).cloned()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
            self.codes
                .lock()
                .unwrap()
                .insert(email.to_string(), code.to_string());
            Ok(())
        }
    }
}
