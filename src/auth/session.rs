// Session tokens are HS256 JWTs carried in the `fitbot.session-token` cookie
// or an `Authorization: Bearer` header. Any verification failure is simply
// "no session".

use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "fitbot.session-token";

/// Sessions last 30 days from sign-in.
pub const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// A verified identity. Produced by the OAuth callback, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Provider-scoped user id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Session {
    pub fn new(
        sub: impl Into<String>,
        name: Option<String>,
        email: Option<String>,
        picture: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            name,
            email,
            picture,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(SESSION_MAX_AGE_SECS)).timestamp(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

/// Issues and checks session tokens against the configured secret.
#[derive(Clone)]
pub struct SessionVerifier {
    secret: Option<Vec<u8>>,
}

impl SessionVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.map(|s| s.as_bytes().to_vec()),
        }
    }

    /// Returns the session carried by the request, if any valid one is.
    pub fn verify(&self, req: &HttpRequest) -> Option<Session> {
        let token = token_from_request(req)?;
        self.verify_token(&token)
    }

    pub fn verify_token(&self, token: &str) -> Option<Session> {
        let secret = self.secret.as_ref()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Session>(token, &DecodingKey::from_secret(secret), &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Signs a session into a token. `None` when no secret is configured.
    pub fn issue(&self, session: &Session) -> Option<String> {
        let secret = self.secret.as_ref()?;
        encode(
            &Header::new(Algorithm::HS256),
            session,
            &EncodingKey::from_secret(secret),
        )
        .ok()
    }
}

fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}
