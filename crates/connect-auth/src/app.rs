//! Application identity and provider endpoints

use common::Secret;

use crate::constants::{GRAPH_URL, SIGNED_REQUEST_COOKIE_PREFIX, STORAGE_PREFIX, WWW_URL};

/// The registered application: public id plus shared secret.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub secret: Secret<String>,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: Secret::new(secret.into()),
        }
    }

    /// Token for calls made on behalf of the app rather than a user.
    ///
    /// Also the marker for "no user token": a resolved token equal to this
    /// value carries no user identity.
    pub fn application_token(&self) -> String {
        format!("{}|{}", self.app_id, self.secret.expose())
    }

    /// Name of the cookie the provider's in-page SDK writes the signed request to.
    pub fn signed_request_cookie(&self) -> String {
        format!("{SIGNED_REQUEST_COOKIE_PREFIX}_{}", self.app_id)
    }

    /// Store namespace holding this app's persisted fields.
    ///
    /// `session` scopes the namespace further when one store backs many
    /// browser sessions.
    pub fn storage_namespace(&self, session: Option<&str>) -> String {
        match session {
            Some(session) => format!("{session}:{STORAGE_PREFIX}_{}", self.app_id),
            None => format!("{STORAGE_PREFIX}_{}", self.app_id),
        }
    }
}

/// Base URLs of the provider's domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub graph: String,
    pub www: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            graph: GRAPH_URL.to_string(),
            www: WWW_URL.to_string(),
        }
    }
}
