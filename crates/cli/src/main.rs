use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use deptauthz_auth::{PermissionExaminer, RequestContext};
use deptauthz_core::{BranchId, PrincipalId};
use deptauthz_roles::{
    AuthorizationConfig, DepartmentRoles, DirectoryFixture, InMemoryDirectory, RoleRegistry,
};

#[derive(Parser)]
#[command(
    name = "deptauthz",
    about = "Inspect department-role authorization against a directory fixture"
)]
struct Cli {
    /// Authorization configuration (JSON).
    #[arg(long, env = "DEPTAUTHZ_CONFIG")]
    config: PathBuf,

    /// Directory fixture with principals, branches and memberships (JSON).
    #[arg(long, env = "DEPTAUTHZ_DIRECTORY")]
    directory: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the active role catalogue.
    Roles,

    /// Resolve a principal's permission map.
    Resolve {
        #[arg(long)]
        principal: u64,

        /// Department name (default: the configured default department).
        #[arg(long)]
        department: Option<String>,

        /// Branch ids to evaluate besides the principal's home branch.
        #[arg(long, value_delimiter = ',')]
        branches: Vec<u64>,
    },

    /// Explain a permission check for a principal.
    Examine {
        #[arg(long)]
        principal: u64,

        /// Required permissions.
        #[arg(long = "permission", required = true)]
        permissions: Vec<String>,
    },
}

fn load_config(path: &Path) -> anyhow::Result<AuthorizationConfig> {
    AuthorizationConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn load_directory(path: &Path) -> anyhow::Result<Arc<InMemoryDirectory>> {
    let fixture = DirectoryFixture::from_file(path)
        .with_context(|| format!("failed to load directory fixture from {}", path.display()))?;
    Ok(Arc::new(InMemoryDirectory::from_fixture(fixture)))
}

fn main() -> anyhow::Result<()> {
    deptauthz_observability::init();
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let directory = load_directory(&cli.directory)?;
    let registry = Arc::new(RoleRegistry::new(Arc::new(config.department_roles.clone())));
    let models = Arc::new(directory.models(config.main_branch_id));
    models.validate_configuration()?;

    let output = match cli.command {
        Command::Roles => serde_json::to_value(registry.catalogue().as_slice())?,
        Command::Resolve {
            principal,
            department,
            branches,
        } => {
            let roles = DepartmentRoles::new(registry, models);
            let request = RequestContext::authenticated(PrincipalId::new(principal));
            let mut resolver = roles
                .resolver(&request)?
                .for_branches(branches.into_iter().map(BranchId::new));
            if let Some(department) = department {
                resolver = resolver.for_department(department);
            }
            let permissions = resolver.resolve(None)?;
            tracing::info!(principal, entries = permissions.len(), "permission map resolved");
            serde_json::to_value(&permissions)?
        }
        Command::Examine {
            principal,
            permissions,
        } => {
            // No host errors are registered here; a configured custom name falls back.
            let deny = Arc::new(config.deny_policy(&HashMap::new()));
            let mut examiner =
                PermissionExaminer::new(Some(PrincipalId::new(principal)), directory, deny);
            examiner.add_permissions_to_check(permissions);
            serde_json::to_value(examiner.explain()?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
