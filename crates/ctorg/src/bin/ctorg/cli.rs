//! ctorg cli interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use ctorg::profile::Overrides;
use ctorg::resource::IntegrationService;
use std::fmt::Formatter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or delete project trees
    #[command(alias = "project")]
    Projects(ProjectsCommand),

    /// Create or delete environment trees
    #[command(alias = "environment", alias = "envs")]
    Environments(EnvironmentsCommand),

    /// Create parameters
    #[command(alias = "params")]
    Parameters(ParametersCommand),

    /// Delete integrations with their pulls and pushes
    Integrations(IntegrationsCommand),
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// CloudTruth CLI profile to read the api key and server from
    #[arg(long, default_value = "default", global(true))]
    pub profile: String,

    /// Use this api key instead of the profile's
    #[arg(long, env = "CLOUDTRUTH_API_KEY", hide_env_values = true, global(true))]
    pub api_key: Option<String>,

    /// Use this server instead of the profile's
    #[arg(long, env = "CLOUDTRUTH_SERVER_URL", global(true))]
    pub server_url: Option<String>,

    /// Release stage to talk to, i.e. `staging`
    ///
    /// Takes precedence over every other server setting
    #[arg(short = 'r', long, global(true))]
    pub release_stage: Option<String>,
}

impl ConnectionArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            server_url: self.server_url.clone(),
            release_stage: self.release_stage.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct SafetyArgs {
    /// Also delete what the resources own (parameters, pulls, pushes)
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Only list what would be deleted
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Resources to create per parent
    #[arg(long, default_value_t = 2)]
    pub count: usize,

    /// Number of extra levels to nest, each level gets `count` children per resource
    #[arg(long, default_value_t = 0)]
    pub levels: usize,

    /// Create below this existing resource instead of at the top level
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ProjectsCommand {
    #[command(subcommand)]
    pub command: ProjectsSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProjectsSubCommand {
    /// Create projects with generated names
    Create {
        #[clap(flatten)]
        layout: LayoutArgs,

        /// Parameters to create in each new project
        #[arg(long, default_value_t = 0)]
        parameters: usize,
    },

    /// Delete one project tree, or all of them
    Delete {
        /// Root of the tree to delete, all top-level projects when absent
        #[arg(long)]
        name: Option<String>,

        #[clap(flatten)]
        safety: SafetyArgs,
    },
}

#[derive(Parser, Debug)]
pub struct EnvironmentsCommand {
    #[command(subcommand)]
    pub command: EnvironmentsSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum EnvironmentsSubCommand {
    /// Create environments with generated names
    Create {
        #[clap(flatten)]
        layout: LayoutArgs,
    },

    /// Delete one environment tree, or all of them except `default`
    Delete {
        /// Root of the tree to delete
        #[arg(long)]
        name: Option<String>,

        /// Only list what would be deleted
        #[arg(short = 'd', long)]
        dry_run: bool,
    },
}

#[derive(Parser, Debug)]
pub struct ParametersCommand {
    #[command(subcommand)]
    pub command: ParametersSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum ParametersSubCommand {
    /// Create parameters with generated names
    Create {
        /// Project to create the parameters in
        #[arg(long)]
        project: String,

        #[arg(long, default_value_t = 2)]
        count: usize,
    },
}

#[derive(Parser, Debug)]
pub struct IntegrationsCommand {
    #[command(subcommand)]
    pub command: IntegrationsSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum IntegrationsSubCommand {
    /// Delete integrations of one service, or of all services
    Delete {
        #[arg(short = 's', long)]
        service: Option<ServiceArg>,

        #[clap(flatten)]
        safety: SafetyArgs,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceArg {
    Aws,
    Azure,
    Github,
}

impl From<ServiceArg> for IntegrationService {
    fn from(value: ServiceArg) -> Self {
        match value {
            ServiceArg::Aws => IntegrationService::Aws,
            ServiceArg::Azure => IntegrationService::AzureKeyVault,
            ServiceArg::Github => IntegrationService::Github,
        }
    }
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t, global(true))]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
