//! Test doubles for gvmd
//!
//! [`FakeTransport`] records every command and answers from canned responses
//! or from an in-memory entity store that honours `uuid=`, `first` and `rows`
//! the way gvmd does.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::Request;
use async_trait::async_trait;
use chrono::TimeDelta;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::gmp::{Command, Connector, Credentials, EntityType, GmpClient, GmpError, Transport};
use crate::graphql::auth::{AuthUser, JwtSecret};
use crate::graphql::filters::FilterString;
use crate::graphql::{SeleneSchema, build_schema};
use crate::services::SessionStore;

const DEFAULT_ROWS: usize = 10;

struct Store {
    kind: &'static EntityType,
    entities: Vec<(Uuid, String)>,
}

#[derive(Default)]
pub struct FakeTransport {
    commands: Mutex<Vec<Command>>,
    canned: Mutex<HashMap<String, String>>,
    stores: Mutex<Vec<Store>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every command with this name with `raw`
    pub fn respond(self: Arc<Self>, command: &str, raw: impl Into<String>) -> Arc<Self> {
        self.canned.lock().insert(command.to_string(), raw.into());
        self
    }

    /// Serve `entities` (id and XML) for `kind`
    pub fn with_entities(self: Arc<Self>, kind: &'static EntityType, entities: Vec<(Uuid, String)>) -> Arc<Self> {
        self.stores.lock().push(Store { kind, entities });
        self
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn remaining(&self, kind: &EntityType) -> usize {
        self.stores
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.entities.len())
            .sum()
    }

    fn handle(&self, command: &Command) -> String {
        let name = command.name();
        if let Some(raw) = self.canned.lock().get(name) {
            return raw.clone();
        }

        if name == "authenticate" {
            return r#"<authenticate_response status="200" status_text="OK"><role>Admin</role></authenticate_response>"#.into();
        }
        if name == "get_version" {
            return r#"<get_version_response status="200" status_text="OK"><version>22.4</version></get_version_response>"#.into();
        }

        let mut stores = self.stores.lock();
        if let Some(plural) = name.strip_prefix("get_") {
            let store = stores
                .iter()
                .find(|s| s.kind.plural == plural && s.kind.asset_type == command.attribute("type"));
            return match store {
                Some(store) => render_get(store, command),
                None => format!(r#"<{name}_response status="200" status_text="OK"/>"#),
            };
        }
        if let Some(entity) = name.strip_prefix("delete_") {
            let id = command.attribute(&format!("{entity}_id")).unwrap_or_default();
            let removed = stores.iter_mut().filter(|s| s.kind.name == entity).any(|s| {
                let before = s.entities.len();
                s.entities.retain(|(e, _)| e.to_string() != id);
                s.entities.len() < before
            });
            return if removed {
                format!(r#"<{name}_response status="200" status_text="OK"/>"#)
            } else {
                format!(r#"<{name}_response status="404" status_text="Failed to find {entity} '{id}'"/>"#)
            };
        }
        if let Some(entity) = name.strip_prefix("create_")
            && let Some(source) = command.child_text("copy")
        {
            let store = stores.iter_mut().find(|s| s.kind.name == entity);
            let copy = store.and_then(|s| {
                let (_, xml) = s.entities.iter().find(|(id, _)| id.to_string() == source)?.clone();
                let new_id = Uuid::new_v4();
                s.entities.push((new_id, xml.replace(&source, &new_id.to_string())));
                Some(new_id)
            });
            return match copy {
                Some(id) => format!(r#"<{name}_response status="201" status_text="OK, resource created" id="{id}"/>"#),
                None => format!(r#"<{name}_response status="404" status_text="Failed to find {entity} '{source}'"/>"#),
            };
        }

        format!(r#"<{name}_response status="200" status_text="OK"/>"#)
    }
}

fn render_get(store: &Store, command: &Command) -> String {
    let kind = store.kind;
    let response = format!("get_{}_response", kind.plural);

    if let Some(id) = command.attribute(&kind.id_attribute()) {
        return match store.entities.iter().find(|(e, _)| e.to_string() == id) {
            Some((_, xml)) => format!(r#"<{response} status="200" status_text="OK">{xml}</{response}>"#),
            None => format!(
                r#"<{response} status="404" status_text="Failed to find {} '{id}'"/>"#,
                kind.name
            ),
        };
    }

    let filter = FilterString::parse(command.attribute("filter").unwrap_or_default())
        .unwrap_or_default();
    let uuids: Vec<&str> = filter
        .terms()
        .iter()
        .filter(|t| t.column.as_deref() == Some("uuid"))
        .map(|t| t.value.as_str())
        .collect();

    let matching: Vec<&String> = store
        .entities
        .iter()
        .filter(|(id, _)| uuids.is_empty() || uuids.contains(&id.to_string().as_str()))
        .map(|(_, xml)| xml)
        .collect();

    let start = filter.first().unwrap_or(1).max(1) as usize;
    let rows = filter.rows().unwrap_or(DEFAULT_ROWS as i64);
    let page: Vec<&String> = matching
        .iter()
        .skip(start - 1)
        .take(if rows < 0 { usize::MAX } else { rows as usize })
        .copied()
        .collect();

    let body: String = page.iter().map(|xml| xml.as_str()).collect();
    format!(
        r#"<{response} status="200" status_text="OK">{body}<{plural} start="{start}" max="{rows}"/><{count}>{total}<filtered>{filtered}</filtered><page>{len}</page></{count}></{response}>"#,
        plural = kind.plural,
        count = kind.count_element(),
        total = store.entities.len(),
        filtered = matching.len(),
        len = page.len(),
    )
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, command: &Command) -> Result<String, GmpError> {
        self.commands.lock().push(command.clone());
        Ok(self.handle(command))
    }
}

/// XML of a minimal entity
pub fn entity_xml(element: &str, id: Uuid, name: &str) -> (Uuid, String) {
    (
        id,
        format!(
            "<{element} id=\"{id}\"><owner><name>admin</name></owner><name>{name}</name>\
             <comment/><creation_time>2024-01-02T03:04:05Z</creation_time>\
             <writable>1</writable><in_use>0</in_use></{element}>"
        ),
    )
}

/// Hands out clients on one shared fake transport
pub struct FakeConnector {
    pub transport: Arc<FakeTransport>,
    pub connections: Mutex<Vec<Option<String>>>,
}

impl FakeConnector {
    pub fn new(transport: Arc<FakeTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            connections: Mutex::new(Vec::new()),
        })
    }
}

impl Connector for FakeConnector {
    fn connect(&self, credentials: Option<Credentials>) -> GmpClient {
        self.connections.lock().push(credentials.map(|c| c.username));
        GmpClient::new(self.transport.clone())
    }
}

pub struct TestSchema {
    pub schema: SeleneSchema,
    pub transport: Arc<FakeTransport>,
    pub connector: Arc<FakeConnector>,
    pub sessions: Arc<SessionStore>,
    pub secret: JwtSecret,
}

impl TestSchema {
    pub fn new(transport: Arc<FakeTransport>) -> Self {
        let connector = FakeConnector::new(transport.clone());
        let sessions = Arc::new(SessionStore::new(TimeDelta::minutes(30)));
        let secret = JwtSecret::new("test-secret");
        let schema = build_schema(connector.clone(), sessions.clone(), secret.clone());
        Self {
            schema,
            transport,
            connector,
            sessions,
            secret,
        }
    }

    /// A request carrying an authenticated session, as the HTTP handler builds it
    pub fn authenticated(&self, query: &str) -> Request {
        let session = self.sessions.create(Credentials::new("admin", "admin"));
        let client = self.connector.connect(Some(session.credentials.clone()));
        Request::new(query)
            .data(AuthUser {
                session_id: session.id,
                username: session.username().to_string(),
                expires_at: session.expires_at,
            })
            .data(client)
    }
}
