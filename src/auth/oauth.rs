// Google authorization-code flow with `state` and PKCE (S256). Both flow
// secrets ride in short-lived cookies until the callback.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use log::debug;
use rand::RngCore;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

use super::session::Session;
use crate::config::Config;

pub const STATE_COOKIE: &str = "fitbot.oauth-state";
pub const VERIFIER_COOKIE: &str = "fitbot.pkce-verifier";
pub const FLOW_COOKIE_MAX_AGE_SECS: i64 = 10 * 60;

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("OAuth client credentials are not configured")]
    NotConfigured,

    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Provider endpoints. Overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize: String,
    pub token: String,
    pub userinfo: String,
}

impl OAuthEndpoints {
    pub fn google() -> Self {
        Self {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            userinfo: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// 32 random bytes, base64url without padding (43 characters).
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub struct GoogleOAuth {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    endpoints: OAuthEndpoints,
    client: Client,
}

impl GoogleOAuth {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri(),
            endpoints: OAuthEndpoints::google(),
            client: Client::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str), OAuthError> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(OAuthError::NotConfigured),
        }
    }

    pub fn authorization_url(&self, state: &str, code_verifier: &str) -> Result<Url, OAuthError> {
        let (client_id, _) = self.credentials()?;
        let mut url = Url::parse(&self.endpoints.authorize)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", "openid email profile")
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce_challenge(code_verifier))
            .append_pair("code_challenge_method", "S256");
        Ok(url)
    }

    /// Exchanges an authorization code and resolves the signed-in user.
    pub async fn authenticate(&self, code: &str, code_verifier: &str) -> Result<Session, OAuthError> {
        let access_token = self.exchange_code(code, code_verifier).await?;
        let user = self.fetch_user(&access_token).await?;
        debug!("OAuth sign-in resolved user {}", user.sub);
        Ok(Session::new(user.sub, user.name, user.email, user.picture))
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<String, OAuthError> {
        let (client_id, client_secret) = self.credentials()?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .client
            .post(&self.endpoints.token)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        let response = self
            .client
            .get(&self.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn endpoints_for(base: &str) -> OAuthEndpoints {
        OAuthEndpoints {
            authorize: format!("{}/authorize", base),
            token: format!("{}/token", base),
            userinfo: format!("{}/userinfo", base),
        }
    }

    /// Mounts token and userinfo mocks that accept `code` = "good-code".
    pub(crate) async fn mount_google(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=good-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": "openid email profile"
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "1098",
                "name": "Sam Lifter",
                "email": "sam@example.com",
                "picture": "https://example.com/sam.png"
            })))
            .mount(server)
            .await;
    }

    fn configured(base: &str) -> GoogleOAuth {
        let config = Config {
            google_client_id: Some("client-1".to_string()),
            google_client_secret: Some("shh".to_string()),
            ..Config::default()
        };
        GoogleOAuth::from_config(&config).with_endpoints(endpoints_for(base))
    }

    #[test]
    fn random_tokens_are_distinct_and_url_safe() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn pkce_challenge_matches_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn authorization_url_carries_flow_parameters() {
        let oauth = configured("https://accounts.example.com");
        let url = oauth.authorization_url("state-1", "verifier-1").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/authorize");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(
            pairs["redirect_uri"],
            "http://localhost:8080/api/auth/callback/google"
        );
        assert_eq!(pairs["state"], "state-1");
        assert_eq!(pairs["code_challenge"], pkce_challenge("verifier-1"));
        assert_eq!(pairs["code_challenge_method"], "S256");
    }

    #[test]
    fn unconfigured_client_cannot_start_flow() {
        let oauth = GoogleOAuth::from_config(&Config::default());
        assert!(!oauth.is_configured());
        assert!(matches!(
            oauth.authorization_url("s", "v"),
            Err(OAuthError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn authenticate_resolves_user() {
        let server = MockServer::start().await;
        mount_google(&server).await;

        let session = configured(&server.uri())
            .authenticate("good-code", "verifier-1")
            .await
            .unwrap();

        assert_eq!(session.sub, "1098");
        assert_eq!(session.display_name(), "Sam Lifter");
        assert_eq!(session.picture.as_deref(), Some("https://example.com/sam.png"));

        let received = server.received_requests().await.unwrap();
        let token_body = String::from_utf8(received[0].body.clone()).unwrap();
        assert!(token_body.contains("code_verifier=verifier-1"));
        assert!(token_body.contains("grant_type=authorization_code"));
    }

    #[tokio::test]
    async fn rejected_code_is_an_error() {
        let server = MockServer::start().await;
        mount_google(&server).await;

        let err = configured(&server.uri())
            .authenticate("stale-code", "verifier-1")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::Status { status: 400, .. }));
    }
}
