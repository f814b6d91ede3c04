//! Test fixtures: an in-memory app wired to a scripted transport

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use connect_auth::{AppCredentials, Endpoints, MemoryStore, PersistedFields, SignedRequest};
use graph_api::{FormFields, Transport, TransportResult};
use serde_json::Value;

use crate::resolver::ConnectApp;

pub const APP_ID: &str = "1";
pub const SECRET: &str = "s";
pub const TOKEN_PATH: &str = "oauth/access_token";
pub const ME_PATH: &str = "/me";

/// Answers by URL suffix and records every call.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<(String, TransportResult<String>)>>,
    calls: Mutex<Vec<(String, FormFields)>>,
}

impl FakeTransport {
    /// Answer requests whose URL ends with `suffix`. Later routes win.
    pub fn respond(&self, suffix: &str, response: TransportResult<String>) {
        self.routes
            .lock()
            .unwrap()
            .push((suffix.to_string(), response));
    }

    pub fn calls(&self) -> Vec<(String, FormFields)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, suffix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(url, _)| url.ends_with(suffix))
            .count()
    }

    pub fn last_fields(&self, suffix: &str) -> Option<FormFields> {
        self.calls()
            .into_iter()
            .rev()
            .find(|(url, _)| url.ends_with(suffix))
            .map(|(_, fields)| fields)
    }
}

impl Transport for FakeTransport {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = TransportResult<String>> + Send + 'a>> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), fields.to_vec()));
        let response = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(suffix, _)| url.ends_with(suffix.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| {
                Ok(r#"{"error":{"message":"no route","type":"GraphMethodException"}}"#.into())
            });
        Box::pin(async move { response })
    }
}

/// App "1" with secret "s", backed by a fresh store and transport.
pub fn fixture() -> (ConnectApp, Arc<MemoryStore>, Arc<FakeTransport>) {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::default());
    let app = ConnectApp::new(
        AppCredentials::new(APP_ID, SECRET),
        Endpoints::default(),
        store.clone(),
        transport.clone(),
    );
    (app, store, transport)
}

/// A signed request for `claims` under the fixture secret.
pub fn signed(claims: Value) -> String {
    SignedRequest::sign(&claims, SECRET)
}

/// Session of user 7 after a completed login.
pub fn logged_in() -> PersistedFields {
    PersistedFields {
        state: None,
        code: Some("code-1".into()),
        access_token: Some("user-token".into()),
        user_id: Some(7),
    }
}
