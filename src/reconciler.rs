//! One reconciliation cycle: fetch credentials once, then push them into
//! every eligible namespace.

use std::collections::BTreeSet;

use tracing::{error, info};

use crate::cluster::Cluster;
use crate::credentials::{Provider, RegistryCredential};
use crate::error::{CycleError, Error};
use crate::{identity, secrets};

/// Summary of a cycle where every unit succeeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Namespaces that were reconciled, in enumeration order.
    pub namespaces: Vec<String>,
    /// Providers whose credentials were applied, in registration order.
    pub providers: Vec<&'static str>,
}

pub struct Reconciler<C> {
    cluster: C,
    providers: Vec<Provider>,
    skip_namespaces: BTreeSet<String>,
    identity: String,
}

impl<C: Cluster> Reconciler<C> {
    /// `providers` are reconciled in the given order, which fixes the order
    /// of the references appended to each service account.
    pub fn new(
        cluster: C,
        providers: Vec<Provider>,
        skip_namespaces: impl IntoIterator<Item = String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            providers,
            skip_namespaces: skip_namespaces.into_iter().collect(),
            identity: identity.into(),
        }
    }

    /// Run one full cycle. Every (namespace, provider) pair is attempted
    /// before any failure is reported.
    pub async fn reconcile(&self) -> Result<CycleReport, CycleError> {
        let mut errors = Vec::new();

        let active = self.fetch_credentials(&mut errors).await;

        let mut report = CycleReport {
            providers: active.iter().map(|(p, _)| p.name).collect(),
            ..CycleReport::default()
        };

        if !active.is_empty() {
            match self.cluster.namespaces().await {
                Ok(namespaces) => {
                    for namespace in namespaces {
                        if self.skip_namespaces.contains(&namespace) {
                            continue;
                        }
                        self.sync_namespace(&namespace, &active, &mut errors).await;
                        report.namespaces.push(namespace);
                    }
                }
                Err(e) => errors.push(Error::NamespaceList(e)),
            }
        }

        if errors.is_empty() {
            info!(
                namespaces = report.namespaces.len(),
                providers = ?report.providers,
                "Reconciliation cycle complete"
            );
            Ok(report)
        } else {
            error!(failures = errors.len(), "Reconciliation cycle failed");
            Err(CycleError { errors })
        }
    }

    async fn fetch_credentials(
        &self,
        errors: &mut Vec<Error>,
    ) -> Vec<(&Provider, RegistryCredential)> {
        let mut active = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let Some(source) = &provider.source else {
                continue;
            };

            match source.fetch().await {
                Ok(credential) => active.push((provider, credential)),
                Err(e) => {
                    error!(provider = provider.name, "{}", e);
                    errors.push(e);
                }
            }
        }

        active
    }

    async fn sync_namespace(
        &self,
        namespace: &str,
        active: &[(&Provider, RegistryCredential)],
        errors: &mut Vec<Error>,
    ) {
        let secret_store = self.cluster.secrets(namespace);
        let identity_store = self.cluster.identities(namespace);

        for (provider, credential) in active {
            let payload = provider.kind.payload(credential);

            // The secret has to exist before the service account can point at it.
            let result = async {
                secrets::sync(
                    &secret_store,
                    namespace,
                    &provider.secret_name,
                    provider.kind,
                    payload,
                )
                .await?;
                identity::ensure_reference(
                    &identity_store,
                    namespace,
                    &self.identity,
                    &provider.secret_name,
                )
                .await
            }
            .await;

            if let Err(e) = result {
                if matches!(e, Error::IdentityNotFound { .. }) {
                    error!(
                        %namespace,
                        provider = provider.name,
                        "{}; namespace is likely not ready yet",
                        e
                    );
                } else {
                    error!(%namespace, provider = provider.name, "{}", e);
                }
                errors.push(e);
            }
        }
    }
}
