//! JSON model files.
//!
//! ```json
//! {
//!   "entities": [
//!     { "name": "Person", "table": "People",
//!       "fields": [
//!         { "name": "Id", "type": "Int32", "identity": true },
//!         { "name": "Name", "type": "String", "nullable": true },
//!         { "name": "Owner", "type": "Guid", "references": "Users" }
//!       ] }
//!   ],
//!   "sets": [{ "member": "People", "entity": "Person" }]
//! }
//! ```

use crate::model::{Entity, EntityModel, EntitySet, Field, SemanticType};
use crate::util::{Result, SyncError};
use glob::glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFile {
    entities: Vec<EntityDecl>,
    #[serde(default)]
    sets: Vec<SetDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityDecl {
    name: String,
    table: Option<String>,
    fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type")]
    semantic_type: String,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    identity: bool,
    references: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetDecl {
    member: String,
    entity: String,
}

impl ModelFile {
    fn into_model(self) -> Result<EntityModel> {
        let mut model = EntityModel::new();
        for decl in self.entities {
            let mut entity = Entity::new(decl.name);
            entity.table = decl.table;
            for field in decl.fields {
                let semantic_type: SemanticType = field.semantic_type.parse()?;
                entity.fields.push(Field {
                    name: field.name,
                    semantic_type,
                    nullable: field.nullable,
                    primary_key: field.primary_key,
                    identity: field.identity,
                    references: field.references,
                });
            }
            model.entities.push(entity);
        }
        model.sets = self
            .sets
            .into_iter()
            .map(|s| EntitySet {
                member: s.member,
                entity: s.entity,
            })
            .collect();
        Ok(model)
    }
}

/// Parses one model document.
pub fn parse_model(json: &str) -> Result<EntityModel> {
    let file: ModelFile = serde_json::from_str(json)
        .map_err(|e| SyncError::ParseError(format!("Invalid model file: {e}")))?;
    file.into_model()
}

pub fn load_model_file(path: &Path) -> Result<EntityModel> {
    let content = std::fs::read_to_string(path)?;
    parse_model(&content)
        .map_err(|e| match e {
            SyncError::ParseError(message) => {
                SyncError::ParseError(format!("{}: {message}", path.display()))
            }
            other => other,
        })
}

/// Loads and merges model files from files, directories or glob patterns.
/// Entity names must be unique across all files.
pub fn load_model_sources(sources: &[String]) -> Result<EntityModel> {
    if sources.is_empty() {
        return Err(SyncError::configuration("no model sources given"));
    }

    let mut model = EntityModel::new();
    for source in sources {
        for path in resolve_source(source)? {
            debug!(path = %path.display(), "loading model file");
            model.merge(load_model_file(&path)?)?;
        }
    }
    Ok(model)
}

/// Resolve a source pattern to a list of JSON file paths.
/// Handles: single files, directories (recursive *.json), and glob patterns.
fn resolve_source(source: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(source);

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let pattern = path.join("**/*.json");
        return resolve_glob(pattern.to_str().unwrap_or(source));
    }

    resolve_glob(source)
}

fn resolve_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob(pattern)
        .map_err(|e| SyncError::ParseError(format!("Invalid glob pattern: {e}")))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SyncError::ParseError(format!("Glob error: {e}")))?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(SyncError::ParseError(format!(
            "No model files found matching pattern: {pattern}"
        )));
    }

    files.sort();
    Ok(files)
}
