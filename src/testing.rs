//! In-memory [`Cluster`] used by the reconciler tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{LocalObjectReference, Secret, ServiceAccount};
use kube::ResourceExt;
use kube::api::ObjectMeta;

use crate::cluster::{Cluster, IdentityStore, SecretStore};
use crate::error::StoreError;

type Key = (String, String);

#[derive(Default)]
struct State {
    namespaces: Vec<String>,
    secrets: BTreeMap<Key, Secret>,
    accounts: BTreeMap<Key, ServiceAccount>,
    denied_secret_namespaces: BTreeSet<String>,
    fail_namespace_list: bool,
}

/// Namespaces are created with a `default` service account and no secrets.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new(namespaces: &[&str]) -> Self {
        let cluster = Self::default();
        {
            let mut state = cluster.lock();
            for ns in namespaces {
                state.namespaces.push((*ns).to_owned());
                state.accounts.insert(
                    key(ns, "default"),
                    ServiceAccount {
                        metadata: ObjectMeta {
                            name: Some("default".to_owned()),
                            namespace: Some((*ns).to_owned()),
                            ..ObjectMeta::default()
                        },
                        ..ServiceAccount::default()
                    },
                );
            }
        }
        cluster
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock().secrets.get(&key(namespace, name)).cloned()
    }

    pub fn insert_secret(&self, namespace: &str, name: &str, type_: &str, data_key: &str, data: &[u8]) {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                data_key.to_owned(),
                ByteString(data.to_vec()),
            )])),
            type_: Some(type_.to_owned()),
            ..Secret::default()
        };
        self.lock().secrets.insert(key(namespace, name), secret);
    }

    pub fn pull_secrets(&self, namespace: &str) -> Vec<String> {
        self.lock()
            .accounts
            .get(&key(namespace, "default"))
            .and_then(|a| a.image_pull_secrets.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    pub fn add_pull_secret(&self, namespace: &str, name: &str) {
        let mut state = self.lock();
        if let Some(account) = state.accounts.get_mut(&key(namespace, "default")) {
            account
                .image_pull_secrets
                .get_or_insert_with(Vec::new)
                .push(LocalObjectReference {
                    name: name.to_owned(),
                });
        }
    }

    pub fn remove_account(&self, namespace: &str) {
        self.lock().accounts.remove(&key(namespace, "default"));
    }

    pub fn deny_secret_writes(&self, namespace: &str) {
        self.lock()
            .denied_secret_namespaces
            .insert(namespace.to_owned());
    }

    pub fn fail_namespace_list(&self) {
        self.lock().fail_namespace_list = true;
    }

    pub fn secrets_snapshot(&self) -> BTreeMap<Key, Secret> {
        self.lock().secrets.clone()
    }

    pub fn accounts_snapshot(&self) -> BTreeMap<Key, ServiceAccount> {
        self.lock().accounts.clone()
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_owned(), name.to_owned())
}

#[async_trait]
impl Cluster for FakeCluster {
    type Secrets = FakeStore;
    type Identities = FakeStore;

    async fn namespaces(&self) -> Result<Vec<String>, StoreError> {
        let state = self.lock();
        if state.fail_namespace_list {
            return Err(StoreError::NotFound);
        }
        Ok(state.namespaces.clone())
    }

    fn secrets(&self, namespace: &str) -> FakeStore {
        FakeStore {
            namespace: namespace.to_owned(),
            cluster: self.clone(),
        }
    }

    fn identities(&self, namespace: &str) -> FakeStore {
        self.secrets(namespace)
    }
}

pub struct FakeStore {
    namespace: String,
    cluster: FakeCluster,
}

#[async_trait]
impl SecretStore for FakeStore {
    async fn create(&self, secret: &Secret) -> Result<(), StoreError> {
        let mut state = self.cluster.lock();
        if state.denied_secret_namespaces.contains(&self.namespace) {
            return Err(StoreError::NotFound);
        }
        let k = key(&self.namespace, &secret.name_any());
        if state.secrets.contains_key(&k) {
            return Err(StoreError::AlreadyExists);
        }
        state.secrets.insert(k, secret.clone());
        Ok(())
    }

    async fn replace(&self, secret: &Secret) -> Result<(), StoreError> {
        let mut state = self.cluster.lock();
        let k = key(&self.namespace, &secret.name_any());
        match state.secrets.get_mut(&k) {
            // Secret type is immutable on a real API server.
            Some(existing) if existing.type_ != secret.type_ => Err(StoreError::Invalid(
                "type: Invalid value: field is immutable".to_owned(),
            )),
            Some(existing) => {
                *existing = secret.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.cluster
            .lock()
            .secrets
            .remove(&key(&self.namespace, name))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl IdentityStore for FakeStore {
    async fn get(&self, name: &str) -> Result<Option<ServiceAccount>, StoreError> {
        Ok(self
            .cluster
            .lock()
            .accounts
            .get(&key(&self.namespace, name))
            .cloned())
    }

    async fn replace(&self, account: &ServiceAccount) -> Result<(), StoreError> {
        let mut state = self.cluster.lock();
        let k = key(&self.namespace, &account.name_any());
        match state.accounts.get_mut(&k) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}
