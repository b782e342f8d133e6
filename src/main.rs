use clap::Parser;
use registry_creds::config::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
    /// Refresh registry credentials on an interval until interrupted
    Run(Settings),
    /// Refresh registry credentials once and exit
    Once(Settings),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    match args {
        Args::Run(settings) => {
            registry_creds::run(settings).await?;
        }
        Args::Once(settings) => {
            let report = registry_creds::run_once(settings).await?;
            info!(
                namespaces = report.namespaces.len(),
                providers = ?report.providers,
                "Registry credentials refreshed"
            );
        }
    };

    Ok(())
}
