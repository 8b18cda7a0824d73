use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use modelsync::api::{
    self, ApplyOptions, ApplyResult, DriftOptions, PlanOptions, PlanResult, ScriptOptions,
};
use modelsync::apply::Outcome;
use modelsync::lint::{LintResult, LintSeverity};
use modelsync::pg::DEFAULT_SCHEMA;
use modelsync::resolve::FkPolicy;
use modelsync::types::Dialect;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "modelsync")]
#[command(about = "Keep a database schema in sync with entity definitions", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Model file, directory or glob pattern (repeatable)
    #[arg(long = "model", short = 'm', required = true)]
    models: Vec<String>,

    /// How foreign keys are inferred: convention, convention-loose, explicit
    #[arg(long, default_value = "convention")]
    fk_policy: FkPolicy,
}

#[derive(Args)]
struct DatabaseArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database: String,

    /// Schema to inspect and change
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    schema: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and reflect the model without touching a database
    Validate {
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value = "postgres")]
        dialect: Dialect,
        #[arg(long)]
        json: bool,
    },

    /// Render the creation script for an empty database
    Script {
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value = "postgres")]
        dialect: Dialect,
        /// Write the script to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Show the changes needed to bring the database in line with the model
    Plan {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        db: DatabaseArgs,
        #[arg(long)]
        allow_destructive: bool,
        #[arg(long)]
        json: bool,
    },

    /// Apply the planned changes
    Apply {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        db: DatabaseArgs,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        allow_destructive: bool,
        /// Refuse to apply unless the plan matches this fingerprint
        #[arg(long)]
        expect_fingerprint: Option<String>,
        /// Per-statement timeout in seconds
        #[arg(long)]
        statement_timeout: Option<u64>,
        #[arg(long)]
        json: bool,
    },

    /// Check whether the database has drifted from the model
    Drift {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        db: DatabaseArgs,
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate {
            model,
            dialect,
            json,
        } => {
            let result = api::validate(&model.models, model.fk_policy, dialect)?;
            if json {
                print_json(&result)?;
            } else {
                println!(
                    "Model OK: {} entities, {} tables, {} foreign keys",
                    result.entities,
                    result.tables.len(),
                    result.foreign_keys
                );
                for table in &result.tables {
                    println!("  {table}");
                }
                println!("Fingerprint: {}", result.fingerprint);
            }
            Ok(())
        }

        Commands::Script {
            model,
            dialect,
            output,
            json,
        } => {
            let result = api::script(
                ScriptOptions::new(model.models, dialect).with_fk_policy(model.fk_policy),
            )?;
            let rendered = if json {
                serde_json::to_string_pretty(&result)?
            } else {
                format!("{}\n", result.sql())
            };
            match output {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{rendered}"),
            }
            Ok(())
        }

        Commands::Plan {
            model,
            db,
            allow_destructive,
            json,
        } => {
            let mut options = PlanOptions::new(model.models, db.database)
                .with_fk_policy(model.fk_policy)
                .with_target_schema(db.schema);
            if allow_destructive {
                options = options.allow_destructive();
            }
            let result = api::plan(options).await?;
            if json {
                print_json(&result)?;
            } else {
                print_plan(&result);
            }
            Ok(())
        }

        Commands::Apply {
            model,
            db,
            dry_run,
            allow_destructive,
            expect_fingerprint,
            statement_timeout,
            json,
        } => {
            let mut options = ApplyOptions::new(model.models, db.database)
                .with_fk_policy(model.fk_policy)
                .with_target_schema(db.schema);
            if allow_destructive {
                options = options.allow_destructive();
            }
            if dry_run {
                options = options.dry_run();
            }
            if let Some(fingerprint) = expect_fingerprint {
                options = options.expect_fingerprint(fingerprint);
            }
            if let Some(seconds) = statement_timeout {
                options = options.with_statement_timeout(Duration::from_secs(seconds));
            }

            let result = match api::apply(options).await {
                Ok(result) => result,
                Err(api::Error::LintFailed { issues, .. }) => {
                    print_lint(&issues);
                    anyhow::bail!("Refusing to apply: plan has lint errors");
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                print_json(&result)?;
            } else {
                print_apply(&result);
            }
            if !result.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Drift { model, db, json } => {
            let result = api::drift(
                DriftOptions::new(model.models, db.database)
                    .with_fk_policy(model.fk_policy)
                    .with_target_schema(db.schema),
            )
            .await?;
            if json {
                print_json(&result)?;
            } else if result.has_drift {
                println!("Drift detected: {} difference(s)", result.differences.len());
                for change in &result.differences {
                    println!("  {change}");
                }
            } else {
                println!("No drift detected");
            }
            if result.has_drift {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_plan(result: &PlanResult) {
    if result.is_empty {
        println!("No changes needed");
        return;
    }

    println!("Plan ({} statements):", result.statements.len());
    for statement in &result.statements {
        let marker = if statement.destructive { "  [destructive]" } else { "" };
        println!("\n{statement}{marker}");
    }
    print_lint(&result.lint);
    println!("\nFingerprint: {}", result.fingerprint);
}

fn print_lint(issues: &[LintResult]) {
    if issues.is_empty() {
        return;
    }
    println!("\nLint:");
    for issue in issues {
        let level = match issue.severity {
            LintSeverity::Error => "error",
            LintSeverity::Warning => "warning",
        };
        println!("  {level} [{}]: {}", issue.rule, issue.message);
    }
}

fn print_apply(result: &ApplyResult) {
    let Some(report) = &result.report else {
        if result.statements.is_empty() {
            println!("No changes needed");
        } else {
            println!("Dry run: {} statement(s) would be executed", result.statements.len());
            for statement in &result.statements {
                println!("\n{statement}");
            }
        }
        return;
    };

    for entry in &report.outcomes {
        match &entry.outcome {
            Outcome::Applied => println!("applied  {}", entry.statement),
            Outcome::Failed(reason) => println!("FAILED   {}\n         {reason}", entry.statement),
            Outcome::Skipped(reason) => println!("skipped  {}\n         {reason}", entry.statement),
        }
    }
    println!(
        "\n{} applied, {} failed, {} skipped",
        report.applied(),
        report.failed(),
        report.skipped()
    );
}
