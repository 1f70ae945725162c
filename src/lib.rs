//! Webhook service that turns CMS document changes into the set of cached
//! page routes to revalidate, and mirrors indexable documents into search.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
