//! Foreign-key and primary-key resolution.
//!
//! Columns become foreign keys either through an explicit annotation or
//! through the naming policy in effect. The set of known tables is passed in
//! explicitly as a [`TableRegistry`].

use crate::util::{singularize, Result, SyncError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Outcome of looking a name up in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLookup {
    Found(String),
    /// An entity exposed under more than one table.
    Ambiguous(Vec<String>),
    Missing,
}

/// Table and entity names known to the current model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRegistry {
    tables: BTreeSet<String>,
    exposed: BTreeMap<String, Vec<String>>,
    declared: BTreeMap<String, bool>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every table is its own entity.
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for table in tables {
            let table = table.into();
            registry.declare_entity(&table, None);
            registry.expose(&table, &table);
        }
        registry
    }

    /// Records a declared entity (and its table override) whether or not it is exposed.
    pub fn declare_entity(&mut self, entity: &str, table_override: Option<&str>) {
        for name in std::iter::once(entity).chain(table_override) {
            self.declared
                .entry(singularize(name))
                .or_insert(false);
        }
    }

    /// Marks `entity` as exposed under `table`.
    pub fn expose(&mut self, table: &str, entity: &str) {
        self.tables.insert(table.to_string());
        let tables = self.exposed.entry(entity.to_string()).or_default();
        if !tables.iter().any(|t| t == table) {
            tables.push(table.to_string());
        }
        for name in [table, entity] {
            self.declared.insert(singularize(name), true);
        }
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    /// Case-insensitive lookup against table names first, then entity names.
    pub fn find_table(&self, candidate: &str) -> TableLookup {
        if let Some(table) = self
            .tables
            .iter()
            .find(|t| t.eq_ignore_ascii_case(candidate))
        {
            return TableLookup::Found(table.clone());
        }

        match self
            .exposed
            .iter()
            .find(|(entity, _)| entity.eq_ignore_ascii_case(candidate))
        {
            Some((_, tables)) if tables.len() == 1 => TableLookup::Found(tables[0].clone()),
            Some((_, tables)) => TableLookup::Ambiguous(tables.clone()),
            None => TableLookup::Missing,
        }
    }

    /// Whether a live table absent from the model belongs to a declared entity
    /// that the current model no longer exposes.
    pub fn recognizes_dropped(&self, live_table: &str) -> bool {
        if self.contains_table(live_table) {
            return false;
        }
        matches!(self.declared.get(&singularize(live_table)), Some(false))
    }
}

/// Naming rules for keys and inferred references.
pub trait ReferencePolicy: Send + Sync {
    /// Whether an unannotated field is the table's primary key.
    fn is_primary_key(&self, field_name: &str) -> bool;

    /// The table name a column's name points at, before registry lookup.
    fn reference_candidate<'a>(&self, column: &'a str) -> Option<&'a str>;
}

/// `<Table>Id` columns reference `<Table>`; the key is named `Id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConventionPolicy {
    case_insensitive: bool,
}

impl ConventionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `ID`, `id` and `<Table>ID` spellings as well.
    pub fn loose() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

impl ReferencePolicy for ConventionPolicy {
    fn is_primary_key(&self, field_name: &str) -> bool {
        if self.case_insensitive {
            field_name.eq_ignore_ascii_case("id")
        } else {
            field_name == "Id"
        }
    }

    fn reference_candidate<'a>(&self, column: &'a str) -> Option<&'a str> {
        if self.is_primary_key(column) {
            return None;
        }
        let stem = if self.case_insensitive {
            let split = column.len().checked_sub(2)?;
            let (stem, suffix) = (column.get(..split)?, column.get(split..)?);
            suffix.eq_ignore_ascii_case("id").then_some(stem)
        } else {
            column.strip_suffix("Id")
        };
        stem.filter(|s| !s.is_empty())
    }
}

/// Only annotated columns are keys or references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplicitOnlyPolicy;

impl ReferencePolicy for ExplicitOnlyPolicy {
    fn is_primary_key(&self, _field_name: &str) -> bool {
        false
    }

    fn reference_candidate<'a>(&self, _column: &'a str) -> Option<&'a str> {
        None
    }
}

/// Selects a [`ReferencePolicy`] by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FkPolicy {
    #[default]
    Convention,
    ConventionLoose,
    Explicit,
}

impl FkPolicy {
    pub fn policy(self) -> Box<dyn ReferencePolicy> {
        match self {
            FkPolicy::Convention => Box::new(ConventionPolicy::new()),
            FkPolicy::ConventionLoose => Box::new(ConventionPolicy::loose()),
            FkPolicy::Explicit => Box::new(ExplicitOnlyPolicy),
        }
    }
}

impl fmt::Display for FkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FkPolicy::Convention => f.write_str("convention"),
            FkPolicy::ConventionLoose => f.write_str("convention-loose"),
            FkPolicy::Explicit => f.write_str("explicit"),
        }
    }
}

impl FromStr for FkPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "convention" => Ok(FkPolicy::Convention),
            "convention-loose" => Ok(FkPolicy::ConventionLoose),
            "explicit" => Ok(FkPolicy::Explicit),
            other => Err(SyncError::configuration(format!(
                "unknown foreign key policy '{other}'"
            ))),
        }
    }
}

pub struct ForeignKeyResolver<'a> {
    policy: &'a dyn ReferencePolicy,
}

impl<'a> ForeignKeyResolver<'a> {
    pub fn new(policy: &'a dyn ReferencePolicy) -> Self {
        Self { policy }
    }

    /// The table `column` references, if any. Explicit annotations are used verbatim.
    pub fn resolve(
        &self,
        column: &str,
        explicit: Option<&str>,
        registry: &TableRegistry,
    ) -> Option<String> {
        if let Some(table) = explicit {
            return Some(table.to_string());
        }

        let candidate = self.policy.reference_candidate(column)?;
        match registry.find_table(candidate) {
            TableLookup::Found(table) => Some(table),
            TableLookup::Ambiguous(tables) => {
                tracing::warn!(
                    column,
                    candidate,
                    tables = ?tables,
                    "ambiguous foreign key: entity is exposed under several tables, treating column as plain"
                );
                None
            }
            TableLookup::Missing => {
                tracing::warn!(
                    column,
                    candidate,
                    "ambiguous foreign key: no table matches, treating column as plain"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TableRegistry {
        TableRegistry::from_tables(["Address", "Person"])
    }

    #[test]
    fn convention_strips_id_suffix() {
        let policy = ConventionPolicy::new();
        let resolver = ForeignKeyResolver::new(&policy);
        assert_eq!(
            resolver.resolve("AddressId", None, &registry()),
            Some("Address".to_string())
        );
    }

    #[test]
    fn candidate_matching_is_case_insensitive() {
        let policy = ConventionPolicy::new();
        let resolver = ForeignKeyResolver::new(&policy);
        let registry = TableRegistry::from_tables(["address"]);
        assert_eq!(
            resolver.resolve("AddressId", None, &registry),
            Some("address".to_string())
        );
    }

    #[test]
    fn id_column_is_never_a_reference() {
        let policy = ConventionPolicy::new();
        let resolver = ForeignKeyResolver::new(&policy);
        assert_eq!(resolver.resolve("Id", None, &registry()), None);
    }

    #[test]
    fn unknown_candidate_is_not_a_reference() {
        let policy = ConventionPolicy::new();
        let resolver = ForeignKeyResolver::new(&policy);
        assert_eq!(resolver.resolve("CustomerId", None, &registry()), None);
        assert_eq!(resolver.resolve("Name", None, &registry()), None);
    }

    #[test]
    fn explicit_reference_is_used_verbatim() {
        let policy = ExplicitOnlyPolicy;
        let resolver = ForeignKeyResolver::new(&policy);
        assert_eq!(
            resolver.resolve("Owner", Some("Users"), &registry()),
            Some("Users".to_string())
        );
        assert_eq!(resolver.resolve("AddressId", None, &registry()), None);
    }

    #[test]
    fn entity_exposed_once_resolves_to_its_table() {
        let mut registry = TableRegistry::new();
        registry.declare_entity("User", None);
        registry.expose("Users", "User");
        let policy = ConventionPolicy::new();
        let resolver = ForeignKeyResolver::new(&policy);
        assert_eq!(
            resolver.resolve("UserId", None, &registry),
            Some("Users".to_string())
        );
    }

    #[test]
    fn entity_exposed_twice_is_ambiguous() {
        let mut registry = TableRegistry::new();
        registry.expose("Users", "User");
        registry.expose("Admins", "User");
        assert_eq!(
            registry.find_table("User"),
            TableLookup::Ambiguous(vec!["Users".to_string(), "Admins".to_string()])
        );
        let policy = ConventionPolicy::new();
        let resolver = ForeignKeyResolver::new(&policy);
        assert_eq!(resolver.resolve("UserId", None, &registry), None);
    }

    #[test]
    fn strict_key_rule_is_case_sensitive() {
        let strict = ConventionPolicy::new();
        assert!(strict.is_primary_key("Id"));
        assert!(!strict.is_primary_key("ID"));
        assert!(!strict.is_primary_key("PersonId"));

        let loose = ConventionPolicy::loose();
        assert!(loose.is_primary_key("ID"));
        assert!(loose.is_primary_key("id"));
        assert_eq!(loose.reference_candidate("AddressID"), Some("Address"));
        assert_eq!(loose.reference_candidate("id"), None);
    }

    #[test]
    fn policy_names_round_trip() {
        for policy in [FkPolicy::Convention, FkPolicy::ConventionLoose, FkPolicy::Explicit] {
            assert_eq!(policy.to_string().parse::<FkPolicy>().unwrap(), policy);
        }
        assert!("magic".parse::<FkPolicy>().is_err());
        assert!(FkPolicy::ConventionLoose.policy().is_primary_key("ID"));
        assert!(!FkPolicy::Explicit.policy().is_primary_key("Id"));
    }

    #[test]
    fn recognizes_tables_of_unexposed_entities() {
        let mut registry = TableRegistry::new();
        registry.declare_entity("Order", None);
        registry.declare_entity("Person", None);
        registry.expose("Persons", "Person");

        assert!(registry.recognizes_dropped("Orders"));
        assert!(!registry.recognizes_dropped("Persons"));
        assert!(!registry.recognizes_dropped("Person"));
        assert!(!registry.recognizes_dropped("AuditLog"));
    }
}
