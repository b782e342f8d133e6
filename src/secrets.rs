use std::collections::BTreeMap;

use k8s_openapi::{ByteString, api::core::v1::Secret};
use kube::api::ObjectMeta;
use tracing::{debug, info};

use crate::cluster::SecretStore;
use crate::dockercfg::SecretKind;
use crate::error::{Error, StoreError};

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "registry-creds";

/// Outcome of a successful [`sync`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    /// A secret of another type held the name and was deleted first.
    Recreated,
}

/// Ensure `namespace` holds a secret called `name` with exactly `payload`.
///
/// Tries a create first and falls back to a full replace when the name is
/// already taken, so no read is needed and whatever was there before is
/// overwritten. Secret `type` is immutable, so a replace rejected as invalid
/// is followed by a delete and a fresh create.
pub async fn sync<S: SecretStore + ?Sized>(
    store: &S,
    namespace: &str,
    name: &str,
    kind: SecretKind,
    payload: Vec<u8>,
) -> Result<SyncOutcome, Error> {
    let secret = managed_secret(namespace, name, kind, payload);
    let sync_error = |source| Error::SecretSync {
        namespace: namespace.to_owned(),
        secret: name.to_owned(),
        source,
    };

    match store.create(&secret).await {
        Ok(()) => {
            info!(%namespace, secret = %name, "Created registry secret");
            Ok(SyncOutcome::Created)
        }
        Err(StoreError::AlreadyExists) => match store.replace(&secret).await {
            Ok(()) => {
                debug!(%namespace, secret = %name, "Updated registry secret");
                Ok(SyncOutcome::Updated)
            }
            Err(StoreError::Invalid(reason)) => {
                info!(%namespace, secret = %name, %reason, "Recreating registry secret");
                store.delete(name).await.map_err(sync_error)?;
                store.create(&secret).await.map_err(sync_error)?;
                Ok(SyncOutcome::Recreated)
            }
            Err(e) => Err(sync_error(e)),
        },
        Err(e) => Err(sync_error(e)),
    }
}

fn managed_secret(namespace: &str, name: &str, kind: SecretKind, payload: Vec<u8>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_owned()),
            name: Some(name.to_owned()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_owned(),
                MANAGER.to_owned(),
            )])),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(
            kind.data_key().to_owned(),
            ByteString(payload),
        )])),
        type_: Some(kind.type_tag().to_owned()),
        ..Secret::default()
    }
}
