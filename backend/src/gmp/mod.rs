//! Greenbone Management Protocol client
//!
//! A thin typed layer over a [`Transport`]. Commands are XML documents, and
//! every response is a single root element carrying a `status` attribute.
//! Filtering, sorting and paging are evaluated by gvmd; this client only
//! forwards filter strings.

pub mod command;
pub mod entity;
pub mod transport;
pub mod xml;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub use command::Command;
pub use entity::EntityType;
pub use transport::{Transport, UnixSocketTransport};
pub use xml::{XmlElement, XmlError};

#[derive(Debug, Error)]
pub enum GmpError {
    #[error("I/O error talking to gvmd: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("{text} (status {status})")]
    Status { status: u16, text: String },
    #[error("Timed out waiting for gvmd")]
    Timeout,
    #[error("Connection closed by gvmd")]
    ConnectionClosed,
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl GmpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GmpError::Status { status: 404, .. })
    }
}

/// A successful response, kept both raw and parsed
#[derive(Debug, Clone)]
pub struct GmpResponse {
    pub raw: String,
    pub root: XmlElement,
}

impl GmpResponse {
    /// Parse a raw response and check its status attribute
    pub fn parse(raw: String) -> Result<Self, GmpError> {
        let root = XmlElement::parse(&raw)?;
        let status = root
            .attr("status")
            .ok_or_else(|| GmpError::UnexpectedResponse(format!("<{}> without status", root.name())))?;
        let status: u16 = status
            .parse()
            .map_err(|_| GmpError::UnexpectedResponse(format!("invalid status '{status}'")))?;

        if !(200..300).contains(&status) {
            return Err(GmpError::Status {
                status,
                text: root.attr("status_text").unwrap_or_default().to_string(),
            });
        }
        Ok(Self { raw, root })
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

pub(crate) fn authenticate_command(credentials: &Credentials) -> Command {
    Command::new("authenticate").child(
        Command::new("credentials")
            .text_child("username", credentials.username.as_str())
            .text_child("password", credentials.password.as_str()),
    )
}

/// Typed GMP calls over a shared transport
#[derive(Clone)]
pub struct GmpClient {
    transport: Arc<dyn Transport>,
}

impl GmpClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn send(&self, command: Command) -> Result<GmpResponse, GmpError> {
        let raw = self.transport.send(&command).await?;
        GmpResponse::parse(raw)
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<GmpResponse, GmpError> {
        self.send(authenticate_command(credentials)).await
    }

    pub async fn get_version(&self) -> Result<String, GmpError> {
        let response = self.send(Command::new("get_version")).await?;
        response
            .root
            .child_text("version")
            .map(str::to_string)
            .ok_or_else(|| GmpError::UnexpectedResponse("missing <version>".into()))
    }

    /// `get_<plural>` with a filter string passed verbatim
    pub async fn get_entities(
        &self,
        kind: &EntityType,
        filter: &str,
    ) -> Result<GmpResponse, GmpError> {
        let mut command = Command::new(format!("get_{}", kind.plural)).attr("filter", filter);
        if let Some(asset_type) = kind.asset_type {
            command = command.attr("type", asset_type);
        }
        self.send(command).await
    }

    /// Single entity lookup; `Ok(None)` when gvmd reports it as missing
    pub async fn get_entity(
        &self,
        kind: &EntityType,
        id: Uuid,
    ) -> Result<Option<XmlElement>, GmpError> {
        let mut command = Command::new(format!("get_{}", kind.plural))
            .attr(kind.id_attribute(), id.to_string());
        if let Some(asset_type) = kind.asset_type {
            command = command.attr("type", asset_type);
        }

        match self.send(command).await {
            Ok(response) => Ok(response.root.child(kind.name).cloned()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_entity(&self, kind: &EntityType, id: &str) -> Result<(), GmpError> {
        let mut command =
            Command::new(format!("delete_{}", kind.name)).attr(kind.id_attribute(), id);
        if kind.trashcan {
            command = command.attr("ultimate", "0");
        }
        self.send(command).await.map(|_| ())
    }

    /// Copy an entity and return the id of the new one
    pub async fn clone_entity(&self, kind: &EntityType, id: Uuid) -> Result<Uuid, GmpError> {
        let command =
            Command::new(format!("create_{}", kind.name)).text_child("copy", id.to_string());
        let response = self.send(command).await?;
        let new_id = response
            .root
            .attr("id")
            .ok_or_else(|| GmpError::UnexpectedResponse("create response without id".into()))?;
        Uuid::parse_str(new_id)
            .map_err(|_| GmpError::UnexpectedResponse(format!("invalid id '{new_id}'")))
    }
}

/// Builds clients for a set of credentials
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: Option<Credentials>) -> GmpClient;
}

/// Connects to gvmd over its Unix domain socket
#[derive(Debug, Clone)]
pub struct SocketConnector {
    path: PathBuf,
    timeout: Duration,
}

impl SocketConnector {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }
}

impl Connector for SocketConnector {
    fn connect(&self, credentials: Option<Credentials>) -> GmpClient {
        GmpClient::new(Arc::new(UnixSocketTransport::new(
            self.path.clone(),
            credentials,
            self.timeout,
        )))
    }
}
