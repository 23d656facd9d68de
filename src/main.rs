mod auth;
mod config;
mod error;
mod model;
mod web;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use actix_files as fs;
use actix_web::middleware::Logger;
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use tera::Tera;

use auth::{GoogleOAuth, SessionVerifier};
use config::Config;
use model::{ChatModel, OpenAiModel};
use web::routes;

// App state structure
pub struct AppState {
    pub tera: Tera,
    pub config: Config,
    pub sessions: SessionVerifier,
    pub oauth: GoogleOAuth,
    pub model: Arc<dyn ChatModel>,
}

pub fn build_templates(dir: &str) -> tera::Result<Tera> {
    let mut tera = Tera::new(&format!("{}/**/*", dir))?;
    tera.autoescape_on(vec![".html"]);
    Ok(tera)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting FitBot");

    let config = Config::from_env();
    let missing = config.missing();
    if !missing.is_empty() {
        warn!("Missing environment variables: {}", missing.join(", "));
    }

    let tera = build_templates(&config.templates_dir).context("Template parsing error")?;

    // The key may be absent; the chat endpoint reports that per request.
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiModel::new(
        &config.openai_base_url,
        config.openai_api_key.as_deref().unwrap_or_default(),
        &config.model_name,
    ));

    let address = (config.host.clone(), config.port);

    let app_state = Data::new(AppState {
        tera,
        sessions: SessionVerifier::new(config.session_secret.as_deref()),
        oauth: GoogleOAuth::from_config(&config),
        model,
        config,
    });

    info!("Binding to {}:{}", address.0, address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Dms"))
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind(address)?
    .run()
    .await?;

    info!("Server shut down");
    Ok(())
}
