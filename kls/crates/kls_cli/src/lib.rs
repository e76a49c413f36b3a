// kls CLI - inspect the classes a module can see
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kls_project::{ModuleRef, ModuleSettings, Workspace};
use kls_service::{AnalysisServiceRegistry, ServiceConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "kls")]
#[command(about = "Inspect the classes visible to a module")]
pub struct Cli {
    /// Service configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the classes visible to a module
    Types {
        #[command(flatten)]
        module: ModuleArgs,
        /// Only list classes whose simple name starts with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Check whether a class resolves from the dependency or boot classpath
    Check {
        #[command(flatten)]
        module: ModuleArgs,
        /// Fully-qualified class name
        class: String,
    },
    /// Print the effective service configuration
    Config,
}

/// Module described on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct ModuleArgs {
    /// Module name
    #[arg(long, default_value = "main")]
    pub name: String,
    /// Dependency classpath entry (repeatable)
    #[arg(short = 'c', long = "classpath")]
    pub classpath: Vec<PathBuf>,
    /// Platform boot classpath entry (repeatable); makes the module a platform module
    #[arg(long = "boot")]
    pub boot: Vec<PathBuf>,
    /// Compiled-source output directory (repeatable)
    #[arg(long = "output")]
    pub outputs: Vec<PathBuf>,
}

impl ModuleArgs {
    pub fn settings(&self) -> ModuleSettings {
        let settings = if self.boot.is_empty() {
            ModuleSettings::plain()
        } else {
            ModuleSettings::platform(self.boot.iter().cloned())
        };
        settings
            .with_compile_classpaths(self.classpath.iter().cloned())
            .with_source_output_dirs(self.outputs.iter().cloned())
    }
}

/// Result of a command: lines for stdout and whether the command succeeded.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub lines: Vec<String>,
    pub success: bool,
}

impl Report {
    fn ok(lines: Vec<String>) -> Self {
        Self {
            lines,
            success: true,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(ServiceConfig::default()),
    }
}

pub fn execute(cli: &Cli) -> Result<Report> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Types { module, prefix } => {
            with_module_service(&config, module, |registry, handle| {
                let service = registry.get(Some(handle))?;
                let lines = match prefix {
                    Some(prefix) => service
                        .find_classes_by_prefix(prefix)
                        .into_iter()
                        .map(|info| info.fully_qualified_name)
                        .collect(),
                    None => service.available_types().to_vec(),
                };
                Ok(Report::ok(lines))
            })
        }
        Commands::Check { module, class } => {
            with_module_service(&config, module, |registry, handle| {
                let service = registry.get(Some(handle))?;
                let available = service.is_class_available(class);
                let status = if available { "available" } else { "not found" };
                Ok(Report {
                    lines: vec![format!("{class}: {status}")],
                    success: available,
                })
            })
        }
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            Ok(Report::ok(rendered.lines().map(str::to_string).collect()))
        }
    }
}

fn with_module_service<F>(config: &ServiceConfig, args: &ModuleArgs, body: F) -> Result<Report>
where
    F: FnOnce(&AnalysisServiceRegistry, &ModuleRef) -> Result<Report>,
{
    let root = std::env::current_dir().context("Failed to determine working directory")?;
    let workspace = Workspace::new(root);
    let module: ModuleRef = workspace.add_module(&args.name, args.settings());
    let registry = AnalysisServiceRegistry::new(config);
    debug!(module = %args.name, "resolving module classes");

    let report = body(&registry, &module);
    registry.destroy_all();
    workspace.close();
    report
}
