use actix_web::http::header::LOCATION;
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

use crate::config::REQUIRED_VARS;
use crate::AppState;

/// User-facing text for an error code the sign-in flow put in `?error=`.
pub fn login_error_message(code: &str) -> &'static str {
    match code {
        "Configuration" => {
            "Authentication service is not properly configured. Please check environment variables."
        }
        "AccessDenied" => "Access was denied. Please try again.",
        "Verification" => "Verification failed. Please try again.",
        _ => "Authentication failed. Please try again.",
    }
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location))
        .finish()
}

fn render(tera: &Tera, template: &str, context: &Context) -> HttpResponse {
    match tera.render(template, context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error in {}: {}", template, e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

pub async fn index() -> HttpResponse {
    redirect("/chat")
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

pub async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<LoginQuery>,
) -> HttpResponse {
    if data.sessions.verify(&req).is_some() {
        return redirect("/chat");
    }

    let mut context = Context::new();
    context.insert(
        "error_message",
        &query.error.as_deref().map(login_error_message),
    );
    context.insert("permissive_mode", &data.config.permissive_mode);
    render(&data.tera, "login.html", &context)
}

pub async fn chat(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let session = data.sessions.verify(&req);

    let (name, image) = match &session {
        Some(s) => (s.display_name().to_string(), s.picture.clone()),
        None if data.config.permissive_mode => ("Demo User".to_string(), None),
        None => ("Guest".to_string(), None),
    };
    let initial = name.chars().next().unwrap_or('U').to_uppercase().to_string();

    let mut context = Context::new();
    context.insert("user_name", &name);
    context.insert("user_image", &image);
    context.insert("user_initial", &initial);
    context.insert("signed_in", &session.is_some());
    context.insert("demo_mode", &(session.is_none() && data.config.permissive_mode));
    render(&data.tera, "chat.html", &context)
}

#[derive(Debug, Serialize)]
struct SetupVar {
    name: &'static str,
    example: &'static str,
    set: bool,
}

pub async fn setup(data: web::Data<AppState>) -> HttpResponse {
    let examples = [
        ("SESSION_SECRET", "your-secret-key-here"),
        ("GOOGLE_CLIENT_ID", "your-google-client-id"),
        ("GOOGLE_CLIENT_SECRET", "your-google-client-secret"),
        ("OPENAI_API_KEY", "your-openai-api-key"),
    ];
    let mut vars: Vec<SetupVar> = vec![SetupVar {
        name: "BASE_URL",
        example: "http://localhost:8080",
        set: true,
    }];
    for name in REQUIRED_VARS {
        let example = examples
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, e)| *e)
            .unwrap_or("");
        vars.push(SetupVar {
            name,
            example,
            set: data.config.is_set(name),
        });
    }

    let mut context = Context::new();
    context.insert("vars", &vars);
    context.insert("missing", &data.config.missing());
    context.insert("base_url", &data.config.base_url);
    context.insert("redirect_uri", &data.config.oauth_redirect_uri());
    render(&data.tera, "setup.html", &context)
}
