//! Bounded wait over provider responses delivered from another task.
//!
//! Flow Overview:
//! 1) The caller asks the bridge for a result and receives nothing until the
//!    provider answers or the timeout elapses.
//! 2) The bridge creates a single-shot [`Completion`] and passes it to the
//!    initiating closure, which starts the provider call on its own task.
//! 3) The provider's event handler resolves the completion exactly once.
//!
//! There is no cancellation. A wait that timed out leaves the provider call
//! running, and resolving its completion later is a no-op.

use crate::auth::AuthError;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

pub const DEFAULT_AUTH_RESPONSE_TIMEOUT: Duration = Duration::from_secs(45);

/// Single-shot handle resolved by a provider event handler.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completion<T> {
    /// Resolve the completion. Returns `false` when the waiter is gone.
    pub fn complete(self, value: T) -> bool {
        if self.tx.send(value).is_err() {
            debug!("provider response arrived after the caller stopped waiting");
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CompletionBridge {
    timeout: Duration,
}

impl Default for CompletionBridge {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_RESPONSE_TIMEOUT)
    }
}

impl CompletionBridge {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Start a provider call through `initiate` and wait for its completion.
    ///
    /// # Errors
    /// Returns `AuthError::AuthResponseWaitTimeout` if nothing arrives within the
    /// timeout, `AuthError::ServiceUnavailable` if the completion is dropped
    /// unresolved, or whatever error the provider handler resolved with.
    pub async fn await_result<T, F>(&self, initiate: F) -> Result<T, AuthError>
    where
        F: FnOnce(Completion<Result<T, AuthError>>),
    {
        let (tx, rx) = oneshot::channel();

        initiate(Completion { tx });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AuthError::ServiceUnavailable(
                "identity provider call ended without a response".to_string(),
            )),
            Err(_) => {
                debug!(timeout = ?self.timeout, "gave up waiting for identity provider");
                Err(AuthError::AuthResponseWaitTimeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthResponse;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn resolves_from_spawned_task() {
        let bridge = CompletionBridge::new(Duration::from_secs(5));
        let result = bridge
            .await_result(|completion| {
                tokio::spawn(async move {
                    completion.complete(Ok(AuthResponse::success("u1", "jane")));
                });
            })
            .await;

        assert!(matches!(result, Ok(ref response) if response.is_success()));
    }

    #[tokio::test]
    async fn propagates_handler_error() {
        let bridge = CompletionBridge::default();
        let result: Result<AuthResponse, AuthError> = bridge
            .await_result(|completion| {
                completion.complete(Err(AuthError::FactorValidation("bad code".to_string())));
            })
            .await;

        assert!(matches!(result, Err(AuthError::FactorValidation(_))));
    }

    #[tokio::test]
    async fn times_out_without_callback() {
        let bridge = CompletionBridge::new(Duration::from_millis(50));
        let parked = Arc::new(Mutex::new(None));
        let slot = parked.clone();

        let result: Result<AuthResponse, AuthError> = bridge
            .await_result(move |completion| {
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some(completion);
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(AuthError::AuthResponseWaitTimeout(timeout)) if timeout == Duration::from_millis(50)
        ));

        // Late resolution after the caller gave up must be harmless.
        let late = parked.lock().ok().and_then(|mut slot| slot.take());
        if let Some(completion) = late {
            assert!(completion.is_abandoned());
            assert!(!completion.complete(Ok(AuthResponse::success("u1", "jane"))));
        } else {
            panic!("completion was not parked");
        }
    }

    #[tokio::test]
    async fn dropped_completion_is_service_unavailable() {
        let bridge = CompletionBridge::default();
        let result: Result<AuthResponse, AuthError> =
            bridge.await_result(|completion| drop(completion)).await;

        assert!(matches!(result, Err(AuthError::ServiceUnavailable(_))));
    }
}
