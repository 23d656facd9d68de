use actix_web::middleware::from_fn;
use actix_web::web;

use crate::auth::chat_guard;
use crate::web::{auth, handlers, pages};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/chat", web::post().to(handlers::chat))
            .service(
                web::scope("/auth")
                    .route("/signin/google", web::get().to(auth::signin))
                    .route("/callback/google", web::get().to(auth::callback))
                    .route("/session", web::get().to(auth::session))
                    .service(
                        web::resource("/signout")
                            .route(web::post().to(auth::signout))
                            .route(web::get().to(auth::signout)),
                    ),
            ),
    )
    .service(
        web::scope("/chat")
            .wrap(from_fn(chat_guard))
            .route("", web::get().to(pages::chat)),
    )
    .route("/", web::get().to(pages::index))
    .route("/login", web::get().to(pages::login))
    .route("/setup", web::get().to(pages::setup))
    .route("/health", web::get().to(handlers::health_check));
}
