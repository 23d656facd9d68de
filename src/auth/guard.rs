use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::ErrorInternalServerError;
use actix_web::http::header::LOCATION;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use log::info;

use super::is_authorized;
use crate::config::GuardMode;
use crate::AppState;

/// Redirects visitors without a session away from the chat pages.
///
/// Only active with `CHAT_GUARD=enforce`; with `off` every request passes,
/// which keeps the chat page reachable for demos.
pub async fn chat_guard(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("application state missing"))?;

    if state.config.chat_guard == GuardMode::Enforce {
        let session = state.sessions.verify(req.request());
        if !is_authorized(session.as_ref(), state.config.permissive_mode) {
            info!("No session for {}, redirecting to sign-in", req.path());
            let redirect = HttpResponse::Found()
                .insert_header((LOCATION, "/login"))
                .finish();
            return Ok(req.into_response(redirect));
        }
    }

    next.call(req).await.map(ServiceResponse::map_into_boxed_body)
}
