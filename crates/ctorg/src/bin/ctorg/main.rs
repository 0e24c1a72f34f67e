mod cli;

use ctorg::batch::{self, BatchReport};
use ctorg::execute::ExecutionReport;
use ctorg::http::HttpClient;
use ctorg::integration;
use ctorg::plan::ForcePolicy;
use ctorg::populate::{self, Layout, Population};
use ctorg::resource::Hierarchy;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CTORG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            std::process::exit(1);
        }
    }
}

/// Ok(false) when the command ran but did not fully succeed
fn run(cli: cli::Cli) -> anyhow::Result<bool> {
    let cli::Cli {
        connection,
        output,
        command,
    } = cli;

    let settings = ctorg::profile::resolve(&connection.profile, &connection.overrides())?;
    let client = HttpClient::new(&settings.api_base_url, &settings.api_key)?;
    tracing::debug!(api = %settings.api_base_url, profile = %connection.profile, "client ready");

    match command {
        cli::Command::Projects(projects) => match projects.command {
            cli::ProjectsSubCommand::Create { layout, parameters } => {
                create(&client, Hierarchy::Project, layout, parameters, &output)
            }
            cli::ProjectsSubCommand::Delete { name, safety } => delete(
                &client,
                Hierarchy::Project,
                name,
                safety.force.into(),
                safety.dry_run,
                &output,
            ),
        },
        cli::Command::Environments(environments) => match environments.command {
            cli::EnvironmentsSubCommand::Create { layout } => {
                create(&client, Hierarchy::Environment, layout, 0, &output)
            }
            cli::EnvironmentsSubCommand::Delete { name, dry_run } => delete(
                &client,
                Hierarchy::Environment,
                name,
                ForcePolicy::Refuse,
                dry_run,
                &output,
            ),
        },
        cli::Command::Parameters(parameters) => match parameters.command {
            cli::ParametersSubCommand::Create { project, count } => {
                let created = populate::create_parameters(&client, &project, count)?;
                write(&output, &Population { created })?;
                Ok(true)
            }
        },
        cli::Command::Integrations(integrations) => match integrations.command {
            cli::IntegrationsSubCommand::Delete { service, safety } => {
                delete_integrations(&client, service, safety, &output)
            }
        },
    }
}

fn create(
    client: &HttpClient,
    hierarchy: Hierarchy,
    layout: cli::LayoutArgs,
    parameters: usize,
    output: &cli::OutputArgs,
) -> anyhow::Result<bool> {
    let layout = Layout::new(layout.count, layout.levels, layout.parent);
    let resources = populate::populate(client, hierarchy, &layout)?;

    let mut population = Population::default();
    for resource in &resources {
        population.created.push(resource.to_ref());
        population
            .created
            .extend(populate::add_parameters(client, resource, parameters)?);
    }
    tracing::info!(created = population.created.len(), "done");

    write(output, &population)?;
    Ok(true)
}

fn delete(
    client: &HttpClient,
    hierarchy: Hierarchy,
    name: Option<String>,
    policy: ForcePolicy,
    dry_run: bool,
    output: &cli::OutputArgs,
) -> anyhow::Result<bool> {
    if !dry_run {
        batch::ensure_can_delete(client)?;
    }

    match name {
        Some(name) => {
            let report = batch::delete_named(client, hierarchy, &name, policy, dry_run)?;
            write(output, &report)?;
            Ok(report_errors(&report))
        }
        None => {
            let report = batch::delete_all(client, hierarchy, policy, dry_run)?;
            write(output, &report)?;
            Ok(batch_errors(&report))
        }
    }
}

fn delete_integrations(
    client: &HttpClient,
    service: Option<cli::ServiceArg>,
    safety: cli::SafetyArgs,
    output: &cli::OutputArgs,
) -> anyhow::Result<bool> {
    if !safety.dry_run {
        batch::ensure_can_delete(client)?;
    }

    let integrations = integration::list_all_integrations(client, service.map(Into::into))?;
    anyhow::ensure!(!integrations.is_empty(), "No integrations were found");

    let report = integration::delete_integrations(
        client,
        &integrations,
        safety.force.into(),
        safety.dry_run,
    );
    write(output, &report)?;
    Ok(batch_errors(&report))
}

/// Prints why `report` did not succeed, true if it did
fn report_errors(report: &ExecutionReport) -> bool {
    for entry in report.failures() {
        eprintln!(
            "{}: {}",
            entry.target,
            entry.error.as_deref().unwrap_or("failed")
        );
    }
    if let Some(error) = report.error() {
        eprintln!("{error}");
    }
    report.is_success()
}

fn batch_errors(report: &BatchReport) -> bool {
    for item in report.failures() {
        eprintln!(
            "{}: {}",
            item.root,
            item.reason().unwrap_or_else(|| "failed".to_string())
        );
    }
    report.is_success()
}

fn write(output: &cli::OutputArgs, value: &impl serde::Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
