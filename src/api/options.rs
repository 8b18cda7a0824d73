use crate::pg::DEFAULT_SCHEMA;
use crate::resolve::FkPolicy;
use crate::types::Dialect;
use std::time::Duration;

/// Options for rendering the creation script of a model, offline.
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    /// Model files, directories or glob patterns
    pub model_sources: Vec<String>,
    pub dialect: Dialect,
    pub fk_policy: FkPolicy,
}

impl ScriptOptions {
    pub fn new(model_sources: Vec<String>, dialect: Dialect) -> Self {
        Self {
            model_sources,
            dialect,
            ..Default::default()
        }
    }

    pub fn with_fk_policy(mut self, fk_policy: FkPolicy) -> Self {
        self.fk_policy = fk_policy;
        self
    }
}

/// Options for generating a sync plan against a live database.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Model files, directories or glob patterns
    pub model_sources: Vec<String>,
    /// PostgreSQL connection URL
    pub database_url: String,
    pub fk_policy: FkPolicy,
    /// PostgreSQL schema to inspect (default: "public")
    pub target_schema: String,
    /// Downgrade destructive-change lint errors
    pub allow_destructive: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            model_sources: Vec::new(),
            database_url: String::new(),
            fk_policy: FkPolicy::default(),
            target_schema: DEFAULT_SCHEMA.into(),
            allow_destructive: false,
        }
    }
}

impl PlanOptions {
    pub fn new(model_sources: Vec<String>, database_url: impl Into<String>) -> Self {
        Self {
            model_sources,
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn with_fk_policy(mut self, fk_policy: FkPolicy) -> Self {
        self.fk_policy = fk_policy;
        self
    }

    pub fn with_target_schema(mut self, schema: impl Into<String>) -> Self {
        self.target_schema = schema.into();
        self
    }

    pub fn allow_destructive(mut self) -> Self {
        self.allow_destructive = true;
        self
    }
}

/// Options for applying a sync plan.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub model_sources: Vec<String>,
    pub database_url: String,
    pub fk_policy: FkPolicy,
    pub target_schema: String,
    /// Allow DROP TABLE / DROP COLUMN / DROP CONSTRAINT
    pub allow_destructive: bool,
    /// Preview only, don't execute
    pub dry_run: bool,
    /// Refuse to run unless the fresh plan has this fingerprint
    pub expected_fingerprint: Option<String>,
    pub statement_timeout: Option<Duration>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            model_sources: Vec::new(),
            database_url: String::new(),
            fk_policy: FkPolicy::default(),
            target_schema: DEFAULT_SCHEMA.into(),
            allow_destructive: false,
            dry_run: false,
            expected_fingerprint: None,
            statement_timeout: None,
        }
    }
}

impl ApplyOptions {
    pub fn new(model_sources: Vec<String>, database_url: impl Into<String>) -> Self {
        Self {
            model_sources,
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn with_fk_policy(mut self, fk_policy: FkPolicy) -> Self {
        self.fk_policy = fk_policy;
        self
    }

    pub fn with_target_schema(mut self, schema: impl Into<String>) -> Self {
        self.target_schema = schema.into();
        self
    }

    /// Allow destructive operations (DROP, etc.).
    pub fn allow_destructive(mut self) -> Self {
        self.allow_destructive = true;
        self
    }

    /// Enable dry run mode (preview only).
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn expect_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.expected_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub(crate) fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            model_sources: self.model_sources.clone(),
            database_url: self.database_url.clone(),
            fk_policy: self.fk_policy,
            target_schema: self.target_schema.clone(),
            allow_destructive: self.allow_destructive,
        }
    }
}

/// Options for drift detection.
#[derive(Debug, Clone)]
pub struct DriftOptions {
    pub model_sources: Vec<String>,
    pub database_url: String,
    pub fk_policy: FkPolicy,
    pub target_schema: String,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            model_sources: Vec::new(),
            database_url: String::new(),
            fk_policy: FkPolicy::default(),
            target_schema: DEFAULT_SCHEMA.into(),
        }
    }
}

impl DriftOptions {
    pub fn new(model_sources: Vec<String>, database_url: impl Into<String>) -> Self {
        Self {
            model_sources,
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn with_fk_policy(mut self, fk_policy: FkPolicy) -> Self {
        self.fk_policy = fk_policy;
        self
    }

    pub fn with_target_schema(mut self, schema: impl Into<String>) -> Self {
        self.target_schema = schema.into();
        self
    }
}
