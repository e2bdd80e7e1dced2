//! Inbound data collaborators.
//!
//! A [`DataSource`] returns the raw JSON records of one resource. Futures are
//! boxed and `'static` so a fetch can be handed to whatever executor drives
//! the UI loop while [`crate::MapSync`] stays borrowable.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use foundation::ids::Generation;
use futures_util::future::try_join;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Browser fetch futures are not `Send`.
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Events,
    Members,
}

impl Resource {
    /// Path segment under the API root.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Events => "events",
            Resource::Members => "users",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("{resource}: request failed: {message}")]
    Transport { resource: Resource, message: String },
    #[error("{resource}: HTTP {status}")]
    Status { resource: Resource, status: u16 },
    #[error("{resource}: undecodable body: {message}")]
    Decode { resource: Resource, message: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Session credentials attached to every API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub txn: Option<String>,
    pub hw: Option<String>,
}

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            txn: None,
            hw: None,
        }
    }

    /// Header name/value pairs, `x-auth-token` first.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![("x-auth-token", self.token.as_str())];
        if let Some(txn) = &self.txn {
            out.push(("x-auth-txn", txn.as_str()));
        }
        if let Some(hw) = &self.hw {
            out.push(("x-auth-hw", hw.as_str()));
        }
        out
    }
}

pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<AuthToken>;
}

/// Fixed credentials, e.g. from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Option<AuthToken>);

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<AuthToken> {
        self.0.clone()
    }
}

pub trait DataSource: Send + Sync {
    fn fetch(&self, resource: Resource) -> BoxFuture<'static, Result<Vec<Value>, FetchError>>;
}

/// Raw records of both resources from one fetch pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub events: Vec<Value>,
    pub members: Vec<Value>,
}

/// Fetches events and members concurrently; the first failure wins.
pub async fn fetch_all(source: &dyn DataSource) -> Result<RawBatch, FetchError> {
    let (events, members) = try_join(
        source.fetch(Resource::Events),
        source.fetch(Resource::Members),
    )
    .await?;
    debug!(
        events = events.len(),
        members = members.len(),
        "fetched raw batch"
    );
    Ok(RawBatch { events, members })
}

/// A fetch pair issued on entry into `Loading`.
pub struct PendingFetch {
    pub generation: Generation,
    future: BoxFuture<'static, Result<RawBatch, FetchError>>,
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PendingFetch {
    pub fn new(generation: Generation, source: Arc<dyn DataSource>) -> Self {
        Self {
            generation,
            future: Box::pin(async move { fetch_all(source.as_ref()).await }),
        }
    }

    pub async fn run(self) -> FetchOutcome {
        FetchOutcome {
            generation: self.generation,
            result: self.future.await,
        }
    }
}

/// A completed fetch pair, tagged with the generation that issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub generation: Generation,
    pub result: Result<RawBatch, FetchError>,
}

/// Fetches from the REST API with `reqwest`.
#[derive(Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, credentials)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn url(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url, resource.path())
    }
}

impl DataSource for HttpDataSource {
    fn fetch(&self, resource: Resource) -> BoxFuture<'static, Result<Vec<Value>, FetchError>> {
        let client = self.client.clone();
        let url = self.url(resource);
        let token = self.credentials.token();
        Box::pin(async move {
            let token = token.ok_or(FetchError::Unauthenticated)?;
            let mut request = client.get(&url);
            for (name, value) in token.headers() {
                request = request.header(name, value);
            }

            let response = request.send().await.map_err(|e| FetchError::Transport {
                resource,
                message: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    resource,
                    status: status.as_u16(),
                });
            }
            response
                .json::<Vec<Value>>()
                .await
                .map_err(|e| FetchError::Decode {
                    resource,
                    message: e.to_string(),
                })
        })
    }
}

/// Serves fixed records; used by the CLI for local files and by tests.
///
/// Responses can be swapped between fetches.
#[derive(Debug)]
pub struct StaticDataSource {
    events: Mutex<Result<Vec<Value>, FetchError>>,
    members: Mutex<Result<Vec<Value>, FetchError>>,
}

impl StaticDataSource {
    pub fn new(events: Vec<Value>, members: Vec<Value>) -> Self {
        Self {
            events: Mutex::new(Ok(events)),
            members: Mutex::new(Ok(members)),
        }
    }

    pub fn set(&self, resource: Resource, response: Result<Vec<Value>, FetchError>) {
        *self.slot(resource).lock().unwrap_or_else(PoisonError::into_inner) = response;
    }

    fn slot(&self, resource: Resource) -> &Mutex<Result<Vec<Value>, FetchError>> {
        match resource {
            Resource::Events => &self.events,
            Resource::Members => &self.members,
        }
    }
}

impl DataSource for StaticDataSource {
    fn fetch(&self, resource: Resource) -> BoxFuture<'static, Result<Vec<Value>, FetchError>> {
        let response = self
            .slot(resource)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Box::pin(async move { response })
    }
}
