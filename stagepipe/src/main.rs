use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use stagepipe::config::PublishConfig;
use stagepipe::resolve::CredentialResolver;
use stagepipe::workflow::{
    compile_and_publish, compile_to_file, exit_status, PublishOutcome, RunReport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Stagepipe Command
#[derive(Parser)]
#[command(version, about = "Compile ML pipeline stages and publish them to a pipeline registry")]
struct Cli {
    /// Config file (TOML)
    #[clap(short = 'c', long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Args, Default)]
struct CompileArgs {
    /// Stage definition file (YAML or JSON)
    #[clap(short = 'd', long)]
    definition: Option<PathBuf>,
    /// Pipeline display name
    #[clap(short = 'n', long)]
    name: Option<String>,
    /// Output path for the compiled document
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the pipeline and write the graph document
    Compile {
        #[command(flatten)]
        args: CompileArgs,
    },

    /// Compile the pipeline, then publish it to the registry
    CompileAndPublish {
        /// Registry endpoint; discovered when omitted
        endpoint: Option<String>,
        /// Bearer token; discovered when omitted
        token: Option<String>,
        #[command(flatten)]
        args: CompileArgs,
        /// Route to look up when discovering the endpoint
        #[clap(long)]
        route_name: Option<String>,
        /// Kubeconfig to use outside a cluster
        #[clap(long)]
        kubeconfig: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry();
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_filter(filter))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .with_filter(filter),
            )
            .init();
    }
}

fn apply(config: &mut PublishConfig, args: CompileArgs) {
    if let Some(definition) = args.definition {
        config.definition = Some(definition);
    }
    if let Some(name) = args.name {
        config.display_name = Some(name);
    }
    if let Some(output) = args.output {
        config.output = output;
    }
}

fn log_outcome(report: &RunReport) {
    match &report.publish {
        PublishOutcome::Published(result) => info!(
            pipeline = %report.display_name,
            action = %result.action,
            entry_id = %result.entry_id,
            "Done"
        ),
        PublishOutcome::Skipped(_) => {
            info!(output = %report.output.display(), "Compiled without publishing");
        }
        PublishOutcome::Failed(e) => warn!(
            output = %report.output.display(),
            error = %e,
            "Compiled, but the upload failed"
        ),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = PublishConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let cmd = cli.cmd.unwrap_or(Commands::CompileAndPublish {
        endpoint: None,
        token: None,
        args: CompileArgs::default(),
        route_name: None,
        kubeconfig: None,
    });

    match cmd {
        Commands::Compile { args } => {
            apply(&mut config, args);
            compile_to_file(&config).context("Failed to compile pipeline")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CompileAndPublish {
            endpoint,
            token,
            args,
            route_name,
            kubeconfig,
        } => {
            apply(&mut config, args);
            if let Some(route_name) = route_name {
                config.route_name = route_name;
            }
            if kubeconfig.is_some() {
                config.kubeconfig = kubeconfig;
            }

            let resolver = CredentialResolver::standard(&config);
            let result =
                compile_and_publish(&config, &resolver, endpoint.as_deref(), token.as_deref()).await;
            if let Ok(report) = &result {
                log_outcome(report);
            }
            let status = exit_status(&result);
            result.context("Failed to compile pipeline")?;
            Ok(ExitCode::from(status))
        }
    }
}
