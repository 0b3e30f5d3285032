//! Object storage client seam
//!
//! The harness talks to storage through the [`ObjectClient`] trait; the
//! coordinator and workers obtain independent connections from a
//! [`Connector`]. The production implementation ([`http`]) speaks the Swift
//! REST dialect over blocking HTTP; tests use the in-memory [`mock`]
//! implementation.

pub mod http;
pub mod mock;

use std::io::Read;
use thiserror::Error;

/// Errors from the storage client
///
/// `Api` failures carry the HTTP status the service returned; workers count
/// them and keep going. Anything else is a `Fault`: unexpected, unclassified
/// and immediately fatal to the worker that hit it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("api error {status}")]
    Api { status: u16 },
    #[error("{0}")]
    Fault(String),
}

impl ClientError {
    /// HTTP status for classified errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status } => Some(*status),
            Self::Fault(_) => None,
        }
    }
}

/// A storage URL plus the token that authenticates against it
///
/// One auth round-trip by the parent connection produces a pair every
/// worker reuses, so N workers do not hammer the auth service N times.
#[derive(Debug, Clone)]
pub struct Preauth {
    pub url: String,
    pub token: String,
}

/// Response to a mutating object operation
#[derive(Debug, Clone)]
pub struct OpReceipt {
    /// Service-assigned transaction id, for latency logs and warnings
    pub transaction_id: String,
}

/// Response to a GET: headers first, then a chunk stream the caller drains
pub struct GetResponse {
    pub transaction_id: String,
    pub body: Box<dyn Read + Send>,
}

/// Container metadata from a HEAD request
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerInfo {
    pub object_count: u64,
}

/// Account metadata from a HEAD request
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountInfo {
    pub container_count: u64,
}

/// One authenticated connection to the storage service
///
/// Connections are not shareable across workers; every worker owns its own.
pub trait ObjectClient: Send {
    fn put_object(&mut self, container: &str, name: &str, data: &[u8])
        -> Result<OpReceipt, ClientError>;
    fn get_object(&mut self, container: &str, name: &str) -> Result<GetResponse, ClientError>;
    fn delete_object(&mut self, container: &str, name: &str) -> Result<OpReceipt, ClientError>;
    fn head_container(&mut self, name: &str) -> Result<ContainerInfo, ClientError>;
    fn put_container(&mut self, name: &str) -> Result<(), ClientError>;
    fn delete_container(&mut self, name: &str) -> Result<(), ClientError>;
    /// Lightweight account metadata fetch, used as a keep-alive during
    /// synchronized-start waits
    fn head_account(&mut self) -> Result<AccountInfo, ClientError>;
    /// The token pair this connection authenticated with
    fn auth(&self) -> Preauth;
    /// Release the connection (drop also suffices)
    fn close(&mut self) {}
}

/// Factory for independent connections
pub trait Connector: Send + Sync {
    /// Open a connection, either with full credentials or, when `preauth`
    /// is given, with an already-issued token/URL pair
    fn connect(&self, preauth: Option<&Preauth>) -> Result<Box<dyn ObjectClient>, ClientError>;
}
