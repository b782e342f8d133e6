//! Namespace-scoped access to the cluster objects the reconciler touches.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use kube::{
    Api, Client, ResourceExt,
    api::{DeleteParams, ListParams, PostParams},
};

#[cfg(test)]
use mockall::automock;

use crate::error::StoreError;

/// Secrets of a single namespace.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Unconditionally overwrite an existing secret. A change of `type`
    /// fails with [`StoreError::Invalid`] since the field is immutable.
    async fn replace(&self, secret: &Secret) -> Result<(), StoreError>;

    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}

/// Service accounts of a single namespace.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<ServiceAccount>, StoreError>;

    /// Write back a previously read account. Fails with
    /// [`StoreError::Conflict`] if it changed in the meantime.
    async fn replace(&self, account: &ServiceAccount) -> Result<(), StoreError>;
}

/// Top-level cluster handle that scopes stores to a namespace.
#[async_trait]
pub trait Cluster: Send + Sync {
    type Secrets: SecretStore;
    type Identities: IdentityStore;

    async fn namespaces(&self) -> Result<Vec<String>, StoreError>;

    fn secrets(&self, namespace: &str) -> Self::Secrets;

    fn identities(&self, namespace: &str) -> Self::Identities;
}

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    type Secrets = KubeSecrets;
    type Identities = KubeIdentities;

    async fn namespaces(&self) -> Result<Vec<String>, StoreError> {
        let api = Api::<Namespace>::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    fn secrets(&self, namespace: &str) -> KubeSecrets {
        KubeSecrets {
            api: Api::namespaced(self.client.clone(), namespace),
        }
    }

    fn identities(&self, namespace: &str) -> KubeIdentities {
        KubeIdentities {
            api: Api::namespaced(self.client.clone(), namespace),
        }
    }
}

pub struct KubeSecrets {
    api: Api<Secret>,
}

#[async_trait]
impl SecretStore for KubeSecrets {
    async fn create(&self, secret: &Secret) -> Result<(), StoreError> {
        self.api.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    async fn replace(&self, secret: &Secret) -> Result<(), StoreError> {
        self.api
            .replace(&secret.name_any(), &PostParams::default(), secret)
            .await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

pub struct KubeIdentities {
    api: Api<ServiceAccount>,
}

#[async_trait]
impl IdentityStore for KubeIdentities {
    async fn get(&self, name: &str) -> Result<Option<ServiceAccount>, StoreError> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn replace(&self, account: &ServiceAccount) -> Result<(), StoreError> {
        self.api
            .replace(&account.name_any(), &PostParams::default(), account)
            .await?;
        Ok(())
    }
}
