//! Folio - publishing backend for a personal portfolio site
//!
//! This library provides MDX post storage, moderated comments, the admin
//! API, the audit log, cache revalidation and the wallet demo sandbox.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
