use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{AppError, Result};

/// What to do after a provider answered with an error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The credential is exhausted or rejected; another key may work.
    Rotate,
    /// The provider itself failed; other keys will not help.
    Abort,
}

pub fn classify_status(status: StatusCode) -> FailureClass {
    match status.as_u16() {
        401 | 402 | 403 | 429 => FailureClass::Rotate,
        _ => FailureClass::Abort,
    }
}

/// Result of one call made with one credential.
pub enum Attempt<T> {
    Done(T),
    Rotate(String),
    Fail(AppError),
}

/// Credentials for one provider, consumed in order.
#[derive(Debug)]
pub struct CredentialQueue {
    provider: String,
    keys: Vec<String>,
    delay: Duration,
}

impl CredentialQueue {
    pub fn new(provider: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            keys: keys.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            delay: Duration::ZERO,
        }
    }

    /// Pause between one credential and the next.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Call `op` with each credential until one is not rotated away.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        for (index, key) in self.keys.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match op(key.clone()).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(e) => return Err(e),
                Attempt::Rotate(reason) => {
                    tracing::warn!(
                        provider = %self.provider,
                        credential = index + 1,
                        of = self.len(),
                        "Rotating credential: {}",
                        reason
                    );
                }
            }
        }

        Err(AppError::CredentialsExhausted(self.provider.clone()))
    }
}
