//! Upload/download/remove logic, independent of the HTTP layer

use crate::{auth::Authentication, backend::Backend, Error, Result, TOKEN_FIELD};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Parsed request form
#[derive(Debug, Clone, Default)]
pub struct ExchangeForm {
    /// Plain text fields (token, authentication)
    pub fields: HashMap<String, String>,

    /// Binary payload part, if any
    pub payload: Option<Bytes>,
}

impl ExchangeForm {
    /// Form carrying only a token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::default().field(TOKEN_FIELD, token)
    }

    /// Form carrying only a payload
    pub fn with_payload(payload: impl Into<Bytes>) -> Self {
        Self {
            fields: HashMap::new(),
            payload: Some(payload.into()),
        }
    }

    /// Add a text field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    fn token(&self) -> Result<&str> {
        self.fields
            .get(TOKEN_FIELD)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken)
    }
}

/// Authentication-gated token store
#[derive(Debug, Clone)]
pub struct DataExchange {
    backend: Arc<dyn Backend>,
    auth: Authentication,
}

impl DataExchange {
    /// Create new exchange
    pub fn new(backend: Arc<dyn Backend>, auth: Authentication) -> Self {
        Self { backend, auth }
    }

    /// The backing store
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    fn check_auth(&self, form: &ExchangeForm) -> Result<()> {
        if self.auth.is_noop() {
            return Ok(());
        }
        self.auth.authenticate(&form.fields)
    }

    /// Store the payload, returning its token
    pub fn upload(&self, form: &ExchangeForm) -> Result<String> {
        self.check_auth(form)?;

        let payload = form.payload.clone().ok_or(Error::MissingPayload)?;
        let size = payload.len();
        let token = self.backend.store(payload).ok_or(Error::TokenAllocation)?;

        info!("Uploaded {} bytes as token {}", size, token);
        Ok(token)
    }

    /// Return the payload stored under the form's token
    pub fn download(&self, form: &ExchangeForm) -> Result<Bytes> {
        self.check_auth(form)?;

        let token = form.token()?;
        self.backend.purge();

        let data = self
            .backend
            .retrieve(token)
            .ok_or_else(|| Error::UnknownToken(token.to_string()))?;

        debug!("Downloaded {} bytes for token {}", data.len(), token);
        Ok(data)
    }

    /// Remove the form's token; succeeds whether or not it existed
    pub fn remove(&self, form: &ExchangeForm) -> Result<()> {
        self.check_auth(form)?;

        let token = form.token()?;
        self.backend.purge();

        if self.backend.remove(token) {
            info!("Removed token {}", token);
        } else {
            debug!("Token {} not present, nothing to remove", token);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::API_KEY_FIELD;
    use crate::backend::InMemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every backend call
    #[derive(Debug, Default)]
    struct CountingBackend {
        inner: InMemoryBackend,
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn touch(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Backend for CountingBackend {
        fn store(&self, data: Bytes) -> Option<String> {
            self.touch();
            self.inner.store(data)
        }
        fn retrieve(&self, token: &str) -> Option<Bytes> {
            self.touch();
            self.inner.retrieve(token)
        }
        fn remove(&self, token: &str) -> bool {
            self.touch();
            self.inner.remove(token)
        }
        fn purge(&self) {
            self.touch();
            self.inner.purge()
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    fn open_exchange() -> DataExchange {
        DataExchange::new(Arc::new(InMemoryBackend::new()), Authentication::None)
    }

    #[test]
    fn test_upload_download_remove() {
        let exchange = open_exchange();

        let token = exchange.upload(&ExchangeForm::with_payload(vec![1u8, 2, 3])).unwrap();
        assert!(!token.is_empty());

        let data = exchange.download(&ExchangeForm::with_token(&token)).unwrap();
        assert_eq!(&data[..], &[1, 2, 3]);

        exchange.remove(&ExchangeForm::with_token(&token)).unwrap();

        let err = exchange.download(&ExchangeForm::with_token(&token)).unwrap_err();
        assert!(err.to_string().contains("No data for token available"));
    }

    #[test]
    fn test_missing_inputs() {
        let exchange = open_exchange();

        let err = exchange.upload(&ExchangeForm::default()).unwrap_err();
        assert_eq!(err.to_string(), "No payload provided!");

        let err = exchange.download(&ExchangeForm::default()).unwrap_err();
        assert_eq!(err.to_string(), "No token provided!");

        let err = exchange.remove(&ExchangeForm::default()).unwrap_err();
        assert_eq!(err.to_string(), "No token provided!");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let exchange = open_exchange();
        assert!(exchange.remove(&ExchangeForm::with_token("unknown")).is_ok());
        assert!(exchange.remove(&ExchangeForm::with_token("unknown")).is_ok());
    }

    #[test]
    fn test_full_backend_fails_upload() {
        let exchange = DataExchange::new(
            Arc::new(InMemoryBackend::new().with_max_entries(0)),
            Authentication::None,
        );
        let err = exchange.upload(&ExchangeForm::with_payload(vec![1u8])).unwrap_err();
        assert!(matches!(err, Error::TokenAllocation));
    }

    #[test]
    fn test_auth_failure_never_touches_backend() {
        let backend = Arc::new(CountingBackend::default());
        let exchange = DataExchange::new(
            backend.clone(),
            Authentication::ApiKey {
                keys: vec!["secret".to_string()],
            },
        );

        let upload = ExchangeForm::with_payload(vec![1u8]).field(API_KEY_FIELD, "wrong");
        let download = ExchangeForm::with_token("t").field(API_KEY_FIELD, "wrong");
        let remove = ExchangeForm::with_token("t");

        assert!(matches!(exchange.upload(&upload), Err(Error::Authentication(_))));
        assert!(matches!(exchange.download(&download), Err(Error::Authentication(_))));
        assert!(matches!(exchange.remove(&remove), Err(Error::Authentication(_))));

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_auth_success() {
        let exchange = DataExchange::new(
            Arc::new(InMemoryBackend::new()),
            Authentication::ApiKey {
                keys: vec!["secret".to_string()],
            },
        );

        let form = ExchangeForm::with_payload(vec![9u8]).field(API_KEY_FIELD, "secret");
        assert!(exchange.upload(&form).is_ok());
    }
}
