//! Users and attendance backend.
//!
//! Layers, innermost first: `model` and `repository` (domain), `service`
//! (application), `store`, `db` and `utils` (infrastructure), then `api`,
//! `auth`, `routes` and `docs` (HTTP interface).

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod model;
pub mod repository;
pub mod routes;
pub mod service;
pub mod store;
pub mod utils;
