use clap::Parser;
use portainer_deploy::{Config, config::Args, container_spec::render_container_spec, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, print the payload that would be sent and exit
    if args.validate {
        println!("{}", render_container_spec(&config.container)?);
        return Ok(());
    }

    telemetry::init_telemetry(args.verbose)?;

    tracing::debug!("{:?}", args);

    match portainer_deploy::deploy(&config).await {
        Ok(result) => {
            tracing::info!(
                container = %config.container.name,
                container_id = %result.container_id,
                endpoint = %result.endpoint.name,
                warnings = result.warnings.len(),
                "Container deployed"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                step = %e.step(),
                error = %e,
                side_effects = e.side_effects().unwrap_or("none"),
                "Deployment failed"
            );
            Err(e.into())
        }
    }
}
