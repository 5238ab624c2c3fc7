//! GraphQL type definitions
//!
//! All managed objects share one `Entity` type. Fields common to every GMP
//! entity are resolved directly from the XML element; kind specific fields
//! come from the entity type's field table.

use async_graphql::{Object, SimpleObject};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::define_connection;
use crate::gmp::{EntityType, XmlElement};

/// A GMP entity backed by its response element
#[derive(Debug, Clone)]
pub struct Entity {
    kind: &'static EntityType,
    element: XmlElement,
}

impl Entity {
    pub fn new(kind: &'static EntityType, element: XmlElement) -> Self {
        Self { kind, element }
    }

    pub fn raw_id(&self) -> Option<&str> {
        self.element.attr("id")
    }
}

/// A kind specific scalar field
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq)]
pub struct EntityField {
    pub name: String,
    pub value: Option<String>,
}

#[Object]
impl Entity {
    async fn id(&self) -> Option<Uuid> {
        self.raw_id().and_then(|id| Uuid::parse_str(id).ok())
    }

    async fn name(&self) -> Option<String> {
        self.element.child_text("name").map(str::to_string)
    }

    async fn comment(&self) -> Option<String> {
        self.element.child_text("comment").map(str::to_string)
    }

    async fn owner(&self) -> Option<String> {
        self.element.child_text("owner/name").map(str::to_string)
    }

    async fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.element.child_datetime("creation_time")
    }

    async fn modification_time(&self) -> Option<DateTime<Utc>> {
        self.element.child_datetime("modification_time")
    }

    async fn writable(&self) -> Option<bool> {
        self.element.child_bool("writable")
    }

    async fn in_use(&self) -> Option<bool> {
        self.element.child_bool("in_use")
    }

    /// GMP element name, plus the asset type for assets (`asset:os`)
    async fn entity_type(&self) -> String {
        match self.kind.asset_type {
            Some(asset_type) => format!("{}:{}", self.kind.name, asset_type),
            None => self.kind.name.to_string(),
        }
    }

    /// Every field of this entity kind, in table order
    async fn fields(&self) -> Vec<EntityField> {
        self.kind
            .fields
            .iter()
            .map(|field| EntityField {
                name: field.name.to_string(),
                value: field.extract.apply(&self.element),
            })
            .collect()
    }

    /// A single field by name; null for unknown names and absent values
    async fn field(&self, name: String) -> Option<String> {
        self.kind
            .field(&name)
            .and_then(|field| field.extract.apply(&self.element))
    }
}

define_connection!(EntityConnection, EntityEdge, Entity);

/// Result of a delete mutation
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// False when at least one entity could not be found
    pub ok: bool,
}

/// Result of an export mutation
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// The raw gvmd response
    pub exported_entities: String,
}

#[derive(SimpleObject, Debug, Clone, PartialEq, Eq)]
pub struct CloneResult {
    /// Id of the new entity
    pub id: Uuid,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct LoginResult {
    pub ok: bool,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct LogoutResult {
    pub ok: bool,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub session_expires: DateTime<Utc>,
}
