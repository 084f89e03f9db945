//! Policy Factory CLI
//!
//! Commands: compile, plan, policy-types, inspect
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a factory fails to compile

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use policy_factory_core::{
    build_plan, discover,
    discovery::DEFAULT_TARGET_POLICY,
    ArtifactBundle, FactoryCompiler, FactoryDefinition, PolicyTypeCatalog, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "policy-factory")]
#[command(version, about = "Policy Factory CLI - compiles factory definitions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Directory of additional policy-type templates (*.yml)
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one factory directory (<category>/<name>/<version>)
    Compile {
        dir: PathBuf,

        /// Override the name inferred from the directory
        #[arg(long)]
        name: Option<String>,

        /// Override the category inferred from the directory
        #[arg(long)]
        category: Option<String>,

        /// Override the version inferred from the directory
        #[arg(long = "factory-version")]
        factory_version: Option<String>,
    },

    /// Compile every factory under a root into a load plan
    Plan {
        root: PathBuf,

        #[arg(long, default_value = DEFAULT_TARGET_POLICY)]
        target_policy: String,
    },

    /// List available policy types
    PolicyTypes,

    /// Decode an encoded factory
    Inspect {
        blob: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mut catalog = PolicyTypeCatalog::builtin();
    if let Some(dir) = &cli.catalog_dir {
        match PolicyTypeCatalog::load_from_dir(dir) {
            Ok(extra) => catalog.extend(extra),
            Err(e) => {
                print_json(&serde_json::json!({
                    "success": false,
                    "error": format!("Failed to load policy types from {}: {}", dir.display(), e),
                }));
                return ExitCode::FAILURE;
            }
        }
    }
    let compiler = FactoryCompiler::new(catalog);

    match cli.command {
        Commands::Compile { dir, name, category, factory_version } => {
            let definition = match FactoryDefinition::from_dir(&dir) {
                Ok(d) => d,
                Err(e) => {
                    print_json(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    return ExitCode::FAILURE;
                }
            };
            let mut request = definition.to_request();
            request.name = name.unwrap_or(request.name);
            request.category = category.unwrap_or(request.category);
            request.version = factory_version.unwrap_or(request.version);

            let result = compiler.compile(&request).and_then(|compiled| {
                let factory = compiled.bundle.encode()?;
                let fingerprint = compiled.bundle.fingerprint()?;
                Ok(serde_json::json!({
                    "success": true,
                    "factory": factory,
                    "fingerprint": fingerprint,
                    "policy": compiled.bundle.policy,
                    "policy_branch": compiled.bundle.policy_branch,
                    "schema": compiled.bundle.schema,
                    "warnings": compiled.warnings,
                }))
            });

            match result {
                Ok(output) => {
                    print_json(&output);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    ExitCode::from(2)
                }
            }
        }

        Commands::Plan { root, target_policy } => {
            let discovery = match discover(&root) {
                Ok(d) => d,
                Err(e) => {
                    print_json(&serde_json::json!({ "success": false, "error": e.to_string() }));
                    return ExitCode::FAILURE;
                }
            };
            let plan = build_plan(&compiler, &discovery, &target_policy);
            print_json(&serde_json::json!({
                "success": plan.is_complete(),
                "engine_version": ENGINE_VERSION,
                "plan": plan,
            }));
            if plan.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::PolicyTypes => {
            print_json(&serde_json::json!(compiler.catalog().names()));
            ExitCode::SUCCESS
        }

        Commands::Inspect { blob } => match ArtifactBundle::decode(&blob) {
            Ok(bundle) => {
                print_json(&serde_json::json!({
                    "version": bundle.version,
                    "policy": bundle.policy,
                    "policy_branch": bundle.policy_branch,
                    "schema": bundle.schema,
                }));
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_json(&serde_json::json!({ "success": false, "error": e.to_string() }));
                ExitCode::FAILURE
            }
        },
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!(r#"{{"success": false, "error": "{}"}}"#, e),
    }
}
