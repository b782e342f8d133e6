use std::pin::pin;
use std::time::Duration;

use kube::{Client, config::KubeConfigOptions};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

pub mod cluster;
pub mod config;
pub mod credentials;
pub mod dockercfg;
pub mod error;
pub mod identity;
pub mod providers;
pub mod reconciler;
pub mod secrets;

#[cfg(test)]
mod testing;

use cluster::{Cluster, KubeCluster};
use config::Settings;
use credentials::Provider;
use dockercfg::SecretKind;
use providers::{EcrSource, GcrSource};
use reconciler::{CycleReport, Reconciler};

/// Reconcile on a fixed interval until interrupted.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&settings).await?;

    info!(
        every_mins = settings.refresh_mins,
        "Starting registry credential refresh loop"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    refresh_loop(&reconciler, settings.refresh_interval(), shutdown).await;
    info!("Shutdown requested, stopping refresh loop");

    Ok(())
}

/// Tick every `every`, starting immediately, until `shutdown` completes. A
/// cycle still in flight when `shutdown` fires is abandoned.
async fn refresh_loop<C: Cluster>(
    reconciler: &Reconciler<C>,
    every: Duration,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut shutdown = pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return,

            result = async {
                ticker.tick().await;
                reconciler.reconcile().await
            } => {
                // Failures are already logged per unit; the next tick retries.
                if let Err(e) = result {
                    error!("{}", e);
                }
            }
        }
    }
}

/// Run a single reconciliation cycle.
pub async fn run_once(settings: Settings) -> anyhow::Result<CycleReport> {
    let reconciler = build_reconciler(&settings).await?;
    Ok(reconciler.reconcile().await?)
}

async fn build_reconciler(settings: &Settings) -> anyhow::Result<Reconciler<KubeCluster>> {
    let options = KubeConfigOptions::default();

    // Load kubeconfig if it's present otherwise fall back to cluster config
    let config = kube::Config::from_kubeconfig(&options)
        .await
        .or_else(|_| kube::Config::incluster())?;
    let client = Client::try_from(config)?;

    let providers = registered_providers(settings).await;
    for provider in &providers {
        if !provider.is_configured() {
            info!(provider = provider.name, "Provider not configured, skipping");
        }
    }

    Ok(Reconciler::new(
        KubeCluster::new(client),
        providers,
        settings.skip_namespaces.iter().cloned(),
        settings.service_account.clone(),
    ))
}

/// Providers in the order their references are added to service accounts.
pub async fn registered_providers(settings: &Settings) -> Vec<Provider> {
    let mut gcr = Provider::new(
        providers::gcr::PROVIDER,
        settings.gcr_secret_name.clone(),
        SecretKind::DockerCfg,
    );
    if let Some(url) = &settings.gcr_url {
        gcr = gcr.with_source(GcrSource::new(
            url.clone(),
            settings.gcr_token_url.clone(),
            settings.gcr_credentials_file.clone(),
        ));
    }

    let mut ecr = Provider::new(
        providers::ecr::PROVIDER,
        settings.aws_secret_name.clone(),
        SecretKind::DockerConfigJson,
    );
    if let Some(account) = &settings.aws_account {
        ecr = ecr.with_source(EcrSource::new(account.clone(), settings.aws_region.clone()).await);
    }

    vec![gcr, ecr]
}
