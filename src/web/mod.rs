pub mod auth;
pub mod handlers;
pub mod models;
pub mod pages;
pub mod relay;
pub mod routes;
