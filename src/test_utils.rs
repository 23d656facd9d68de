// Shared fixtures for handler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::web::Data;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::auth::{GoogleOAuth, Session, SessionVerifier};
use crate::config::Config;
use crate::model::{ChatModel, CompletionRequest, FragmentStream, ModelError};
use crate::{build_templates, AppState};

/// A canned model: replays fixed fragments and records every call.
#[derive(Clone, Default)]
pub struct StubModel {
    fragments: Vec<String>,
    fail_to_start: bool,
    hang: bool,
    fail_after: Option<usize>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl StubModel {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_to_start: true,
            ..Self::default()
        }
    }

    /// Never answers the completion request.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Emits the first `n` fragments, then a stream error.
    pub fn breaking_after(fragments: &[&str], n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::replying(fragments)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn stream_chat(&self, request: CompletionRequest) -> Result<FragmentStream, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if self.hang {
            futures::future::pending::<()>().await;
        }
        if self.fail_to_start {
            return Err(ModelError::Upstream("stub is unreachable".to_string()));
        }

        let mut items: Vec<Result<String, ModelError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(ModelError::Upstream("stub broke mid-stream".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// A config with every credential present and the guard enforced.
pub fn configured() -> Config {
    Config {
        session_secret: Some("test-session-secret".to_string()),
        google_client_id: Some("client-1".to_string()),
        google_client_secret: Some("client-secret".to_string()),
        openai_api_key: Some("sk-test".to_string()),
        ..Config::default()
    }
}

pub fn athlete() -> Session {
    Session::new(
        "google-42",
        Some("Sam Lifter".to_string()),
        Some("sam@example.com".to_string()),
        None,
    )
}

pub fn signed_in_token(config: &Config) -> String {
    SessionVerifier::new(config.session_secret.as_deref())
        .issue(&athlete())
        .unwrap()
}

pub fn state(config: Config, model: StubModel) -> Data<AppState> {
    state_with_oauth(config.clone(), model, GoogleOAuth::from_config(&config))
}

pub fn state_with_oauth(config: Config, model: StubModel, oauth: GoogleOAuth) -> Data<AppState> {
    Data::new(AppState {
        tera: build_templates(&config.templates_dir).unwrap(),
        sessions: SessionVerifier::new(config.session_secret.as_deref()),
        oauth,
        model: Arc::new(model),
        config,
    })
}
