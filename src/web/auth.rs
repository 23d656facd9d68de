use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::auth::oauth::{random_token, FLOW_COOKIE_MAX_AGE_SECS, STATE_COOKIE, VERIFIER_COOKIE};
use crate::auth::session::{SESSION_COOKIE, SESSION_MAX_AGE_SECS};
use crate::web::pages::redirect;
use crate::AppState;

fn cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

fn removal(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

fn attach_cookie(resp: &mut HttpResponse, cookie: &Cookie<'_>) {
    if let Err(e) = resp.add_cookie(cookie) {
        error!("Failed to set cookie {}: {}", cookie.name(), e);
    }
}

/// Sends the browser back to the sign-in page with a flow error code,
/// discarding any half-finished flow state.
fn login_with_error(code: &str) -> HttpResponse {
    let mut resp = redirect(&format!("/login?error={}", code));
    for name in [STATE_COOKIE, VERIFIER_COOKIE] {
        attach_cookie(&mut resp, &removal(name));
    }
    resp
}

pub async fn signin(data: web::Data<AppState>) -> HttpResponse {
    if data.config.session_secret.is_none() || !data.oauth.is_configured() {
        warn!("Sign-in attempted but OAuth or session secret is not configured");
        return login_with_error("Configuration");
    }

    let state = random_token();
    let verifier = random_token();
    let url = match data.oauth.authorization_url(&state, &verifier) {
        Ok(url) => url,
        Err(e) => {
            error!("Could not build authorization URL: {}", e);
            return login_with_error("Configuration");
        }
    };

    let secure = data.config.secure_cookies();
    let mut resp = redirect(url.as_str());
    for (name, value) in [(STATE_COOKIE, state), (VERIFIER_COOKIE, verifier)] {
        attach_cookie(&mut resp, &cookie(name, value, FLOW_COOKIE_MAX_AGE_SECS, secure));
    }
    resp
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn callback(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<CallbackQuery>,
) -> HttpResponse {
    let query = query.into_inner();

    if let Some(provider_error) = query.error {
        warn!("Provider rejected sign-in: {}", provider_error);
        return match provider_error.as_str() {
            "access_denied" => login_with_error("AccessDenied"),
            _ => login_with_error("OAuthCallback"),
        };
    }

    let expected_state = req.cookie(STATE_COOKIE).map(|c| c.value().to_string());
    let verifier = req.cookie(VERIFIER_COOKIE).map(|c| c.value().to_string());
    let (code, verifier) = match (query.code, query.state, expected_state, verifier) {
        (Some(code), Some(state), Some(expected), Some(verifier)) if state == expected => {
            (code, verifier)
        }
        _ => {
            warn!("OAuth callback failed state verification");
            return login_with_error("Verification");
        }
    };

    let session = match data.oauth.authenticate(&code, &verifier).await {
        Ok(session) => session,
        Err(e) => {
            error!("OAuth code exchange failed: {}", e);
            return login_with_error("OAuthCallback");
        }
    };

    let Some(token) = data.sessions.issue(&session) else {
        error!("Cannot issue a session token without SESSION_SECRET");
        return login_with_error("Configuration");
    };

    info!("User {} signed in", session.sub);
    let mut resp = redirect("/chat");
    attach_cookie(
        &mut resp,
        &cookie(SESSION_COOKIE, token, SESSION_MAX_AGE_SECS, data.config.secure_cookies()),
    );
    for name in [STATE_COOKIE, VERIFIER_COOKIE] {
        attach_cookie(&mut resp, &removal(name));
    }
    resp
}

pub async fn signout() -> HttpResponse {
    let mut resp = redirect("/login");
    attach_cookie(&mut resp, &removal(SESSION_COOKIE));
    resp
}

pub async fn session(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    match data.sessions.verify(&req) {
        Some(session) => HttpResponse::Ok().json(session),
        None => HttpResponse::Ok().json(json!({})),
    }
}
