//! Declarative entity definitions.
//!
//! An [`EntityModel`] is built once, up front, from plain values:
//!
//! ```
//! use modelsync::model::{Entity, EntityModel, Field, SemanticType};
//!
//! let model = EntityModel::new()
//!     .entity(
//!         Entity::new("Address")
//!             .field(Field::new("Id", SemanticType::Int32).primary_key().identity())
//!             .field(Field::new("Street", SemanticType::String).nullable()),
//!     )
//!     .entity(
//!         Entity::new("Person")
//!             .field(Field::new("Id", SemanticType::Int32).primary_key().identity())
//!             .field(Field::new("Name", SemanticType::String).nullable())
//!             .field(Field::new("AddressId", SemanticType::Int32)),
//!     );
//!
//! assert_eq!(model.entities.len(), 2);
//! ```

use super::SemanticType;
use crate::util::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    /// Explicit primary-key annotation. Unannotated fields may still become
    /// the key through the naming convention.
    pub primary_key: bool,
    pub identity: bool,
    /// Explicit foreign-key target table, used verbatim.
    pub references: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            nullable: false,
            primary_key: false,
            identity: false,
            references: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    /// Table name override. Ignored when the model exposes entity sets.
    pub table: Option<String>,
    pub fields: Vec<Field>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// The table this entity maps to when no entity sets are declared.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }
}

/// A named member exposing an entity as a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    pub member: String,
    pub entity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityModel {
    pub entities: Vec<Entity>,
    pub sets: Vec<EntitySet>,
}

impl EntityModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Exposes `entity` under the table name `member`.
    pub fn set(mut self, member: impl Into<String>, entity: impl Into<String>) -> Self {
        self.sets.push(EntitySet {
            member: member.into(),
            entity: entity.into(),
        });
        self
    }

    pub fn find_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Appends another model's declarations. Entity names must stay unique.
    pub fn merge(&mut self, other: EntityModel) -> Result<()> {
        for entity in other.entities {
            if self.find_entity(&entity.name).is_some() {
                return Err(SyncError::configuration(format!(
                    "entity '{}' is declared more than once",
                    entity.name
                )));
            }
            self.entities.push(entity);
        }
        self.sets.extend(other.sets);
        Ok(())
    }
}
