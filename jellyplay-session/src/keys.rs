//! Scoped stream-key lifecycle against the backend.
//!
//! The server registers API keys per application name. We look for our
//! well-known name first and only create one when missing. Creation is
//! retried on a fixed budget, and a successful creation is followed by a
//! re-listing because the creation endpoint does not return the key inline.

use std::time::Duration;

use futures::future::BoxFuture;
use jellyplay_api::{ApiError, MediaBackend};
use tracing::{debug, warn};

use crate::error::SessionError;

/// Application name our stream keys are registered under.
pub const KEY_APP_NAME: &str = "jellyplay";

/// Maximum number of key-creation attempts before giving up.
pub const MAX_CREATE_ATTEMPTS: u32 = 10;

/// Fixed delay between failed creation attempts.
const CREATE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Obtain a scoped stream key, creating one if none is registered.
///
/// Listing errors propagate as [`SessionError::Api`]. An exhausted creation
/// budget yields [`SessionError::KeyAcquisitionFailed`].
pub async fn acquire_key(backend: &dyn MediaBackend) -> Result<String, SessionError> {
    acquire_key_inner(backend).await
}

// Boxed for recursion: after a successful creation we re-enter the lookup,
// since the key value only becomes visible through a fresh listing.
fn acquire_key_inner(backend: &dyn MediaBackend) -> BoxFuture<'_, Result<String, SessionError>> {
    Box::pin(async move {
        let keys = backend.list_api_keys().await?;
        if let Some(key) = keys.get(KEY_APP_NAME) {
            return Ok(key.clone());
        }

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            match backend.create_api_key(KEY_APP_NAME).await {
                Ok(()) => return acquire_key_inner(backend).await,
                Err(err) => {
                    debug!(attempt, error = %err, "API key creation failed, retrying");
                    tokio::time::sleep(CREATE_RETRY_DELAY).await;
                }
            }
        }

        Err(SessionError::KeyAcquisitionFailed {
            attempts: MAX_CREATE_ATTEMPTS,
        })
    })
}

/// Best-effort key revocation.
///
/// When `key` is absent the well-known key is acquired first, then deleted.
/// The returned error is informational; session teardown logs and discards
/// it, since scoped keys are short-lived either way.
pub async fn revoke_key(backend: &dyn MediaBackend, key: Option<&str>) -> Result<(), ApiError> {
    let key = match key {
        Some(key) => key.to_string(),
        None => match acquire_key(backend).await {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "could not resolve stream key for revocation");
                return Ok(());
            }
        },
    };
    backend.delete_api_key(&key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jellyplay_api::error::ApiResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Stub backend with scripted listing/creation behavior and call counts.
    struct StubBackend {
        listings: Mutex<u32>,
        creations: Mutex<u32>,
        deletions: Mutex<Vec<String>>,
        /// Key returned by listings, and from which creation attempt on it
        /// becomes visible (0 = always present).
        key: Option<String>,
        visible_after_creation: u32,
        /// Creation attempts that succeed (1-based). Empty = all fail.
        creation_succeeds_on: Option<u32>,
    }

    impl StubBackend {
        fn with_existing_key(key: &str) -> Self {
            Self {
                listings: Mutex::new(0),
                creations: Mutex::new(0),
                deletions: Mutex::new(Vec::new()),
                key: Some(key.to_string()),
                visible_after_creation: 0,
                creation_succeeds_on: None,
            }
        }

        fn with_creation_succeeding_on(attempt: u32, key: &str) -> Self {
            Self {
                listings: Mutex::new(0),
                creations: Mutex::new(0),
                deletions: Mutex::new(Vec::new()),
                key: Some(key.to_string()),
                visible_after_creation: attempt,
                creation_succeeds_on: Some(attempt),
            }
        }

        fn with_creation_always_failing() -> Self {
            Self {
                listings: Mutex::new(0),
                creations: Mutex::new(0),
                deletions: Mutex::new(Vec::new()),
                key: None,
                visible_after_creation: u32::MAX,
                creation_succeeds_on: None,
            }
        }

        fn listings(&self) -> u32 {
            *self.listings.lock().unwrap()
        }

        fn creations(&self) -> u32 {
            *self.creations.lock().unwrap()
        }
    }

    #[async_trait]
    impl MediaBackend for StubBackend {
        async fn list_api_keys(&self) -> ApiResult<HashMap<String, String>> {
            *self.listings.lock().unwrap() += 1;
            let mut keys = HashMap::new();
            let creations = self.creations();
            if let Some(key) = &self.key {
                if creations >= self.visible_after_creation {
                    keys.insert(KEY_APP_NAME.to_string(), key.clone());
                }
            }
            Ok(keys)
        }

        async fn create_api_key(&self, _app_name: &str) -> ApiResult<()> {
            let mut creations = self.creations.lock().unwrap();
            *creations += 1;
            match self.creation_succeeds_on {
                Some(attempt) if *creations == attempt => Ok(()),
                _ => Err(ApiError::Status(500)),
            }
        }

        async fn delete_api_key(&self, key: &str) -> ApiResult<()> {
            self.deletions.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn mark_played(&self, _item_id: &str) -> ApiResult<()> {
            Ok(())
        }

        fn stream_url(&self, item_id: &str, key: &str) -> String {
            format!("http://stub/Items/{}/Download?api_key={}", item_id, key)
        }

        fn login_token(&self) -> String {
            "login-token".to_string()
        }

        fn username(&self) -> String {
            "alice".to_string()
        }
    }

    #[tokio::test]
    async fn existing_key_is_returned_without_creation() {
        let backend = StubBackend::with_existing_key("k-existing");
        let key = acquire_key(&backend).await.unwrap();
        assert_eq!(key, "k-existing");
        assert_eq!(backend.creations(), 0);
        assert_eq!(backend.listings(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn creation_on_third_attempt_relists_once() {
        let backend = StubBackend::with_creation_succeeding_on(3, "k-created");
        let key = acquire_key(&backend).await.unwrap();
        assert_eq!(key, "k-created");
        assert_eq!(backend.creations(), 3);
        // Initial lookup plus the single re-listing after creation.
        assert_eq!(backend.listings(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_attempt_count() {
        let backend = StubBackend::with_creation_always_failing();
        let err = acquire_key(&backend).await.unwrap_err();
        match err {
            SessionError::KeyAcquisitionFailed { attempts } => assert_eq!(attempts, 10),
            other => panic!("expected KeyAcquisitionFailed, got {other:?}"),
        }
        assert_eq!(backend.creations(), 10);
    }

    #[tokio::test]
    async fn listing_errors_propagate() {
        struct UnauthorizedBackend;

        #[async_trait]
        impl MediaBackend for UnauthorizedBackend {
            async fn list_api_keys(&self) -> ApiResult<HashMap<String, String>> {
                Err(ApiError::Unauthorized)
            }
            async fn create_api_key(&self, _app_name: &str) -> ApiResult<()> {
                unreachable!("creation must not be attempted when listing fails")
            }
            async fn delete_api_key(&self, _key: &str) -> ApiResult<()> {
                Ok(())
            }
            async fn mark_played(&self, _item_id: &str) -> ApiResult<()> {
                Ok(())
            }
            fn stream_url(&self, _item_id: &str, _key: &str) -> String {
                String::new()
            }
            fn login_token(&self) -> String {
                String::new()
            }
            fn username(&self) -> String {
                String::new()
            }
        }

        let err = acquire_key(&UnauthorizedBackend).await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn revoke_with_explicit_key_deletes_it() {
        let backend = StubBackend::with_existing_key("k-existing");
        revoke_key(&backend, Some("k-doomed")).await.unwrap();
        assert_eq!(
            backend.deletions.lock().unwrap().as_slice(),
            ["k-doomed".to_string()]
        );
    }

    #[tokio::test]
    async fn revoke_without_key_acquires_first() {
        let backend = StubBackend::with_existing_key("k-existing");
        revoke_key(&backend, None).await.unwrap();
        assert_eq!(backend.listings(), 1);
        assert_eq!(
            backend.deletions.lock().unwrap().as_slice(),
            ["k-existing".to_string()]
        );
    }
}
