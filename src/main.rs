use anyhow::{Context, Result};
use docbranch::{BuiltinRenderer, CommandRenderer, Config, GitPublisher, Publish, PublishOutcome, Renderer};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes stderr logging, honouring `RUST_LOG` when set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "docbranch=debug" } else { "docbranch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn renderer_from(config: &Config) -> Box<dyn Renderer> {
    match &config.renderer {
        Some(program) => {
            info!("Using external renderer {}", program.display());
            Box::new(CommandRenderer::new(program).args(config.renderer_args.iter()))
        }
        None => Box::new(BuiltinRenderer::new()),
    }
}

fn execute(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let renderer = renderer_from(config);
    let publisher = if config.no_publish {
        None
    } else {
        Some(GitPublisher::from_config(config)?)
    };

    let report = docbranch::run(
        config,
        renderer.as_ref(),
        publisher.as_ref().map(|p| p as &dyn Publish),
    )?;

    for failure in &report.summary.failures {
        error!("Failed: {}: {}", failure.path.display(), failure.error);
    }

    match report.publish {
        Some(PublishOutcome::Pushed { branch, .. }) => {
            info!("Workflow completed successfully, published to {}", branch);
        }
        Some(PublishOutcome::NoChanges) => {
            info!("Workflow completed successfully, docs branch already up to date");
        }
        None => info!("Rendered site written to {}", config.output_dir().display()),
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(config.verbose);

    match execute(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
