//! Policy Factory Core - Factory Compiler
//!
//! # Guarantees
//! 1. Schema and template come from one normalized configuration
//! 2. Contradictory configuration fails, overridable configuration warns
//! 3. Deterministic output
//! 4. Lookup tables are injected, never global

pub mod variable;
pub mod diagnostics;
pub mod catalog;
pub mod configuration;
pub mod schema;
pub mod template;
pub mod hashing;
pub mod pipeline;
pub mod discovery;

pub use variable::{FactoryVariable, ReservedVariables};
pub use diagnostics::ConfigurationWarning;
pub use catalog::PolicyTypeCatalog;
pub use configuration::{FactoryConfiguration, BRANCH_PLACEHOLDER};
pub use hashing::{canonical_json, compute_bundle_fingerprint};
pub use pipeline::{ArtifactBundle, CompileError, CompileRequest, CompiledFactory, FactoryCompiler};
pub use discovery::{build_plan, discover, Discovery, DiscoveryError, FactoryDefinition, LoadFailure, LoadPlan};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
