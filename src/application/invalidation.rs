//! Seam towards the caching layer that serves rendered pages.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::route::Route;

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("invalidation request for `{route}` failed: {message}")]
    Transport { route: String, message: String },
    #[error("caching layer rejected `{route}` with status {status}")]
    Rejected { route: String, status: u16 },
}

impl InvalidationError {
    pub fn transport(route: &Route, message: impl Into<String>) -> Self {
        Self::Transport {
            route: route.to_string(),
            message: message.into(),
        }
    }
}

/// Ask the caching layer to recompute one route. Calls are idempotent.
#[async_trait]
pub trait RouteInvalidator: Send + Sync {
    async fn invalidate(&self, route: &Route) -> Result<(), InvalidationError>;
}

/// Invalidator that only records the routes it was given.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    routes: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the given route, accepting every other one.
    pub fn failing_on(route: impl Into<String>) -> Self {
        Self {
            routes: Mutex::default(),
            fail_on: Some(route.into()),
        }
    }

    /// Routes invalidated so far, in call order.
    pub fn routes(&self) -> Vec<String> {
        match self.routes.lock() {
            Ok(routes) => routes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RouteInvalidator for RecordingInvalidator {
    async fn invalidate(&self, route: &Route) -> Result<(), InvalidationError> {
        if self.fail_on.as_deref() == Some(route.as_str()) {
            return Err(InvalidationError::Rejected {
                route: route.to_string(),
                status: 503,
            });
        }
        match self.routes.lock() {
            Ok(mut routes) => routes.push(route.to_string()),
            Err(poisoned) => poisoned.into_inner().push(route.to_string()),
        }
        Ok(())
    }
}
