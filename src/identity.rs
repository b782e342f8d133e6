use k8s_openapi::api::core::v1::LocalObjectReference;
use tracing::info;

use crate::cluster::IdentityStore;
use crate::error::Error;

/// Make sure service account `identity` in `namespace` lists `secret_name`
/// among its image pull secrets.
///
/// Existing references are kept in place; a missing one is appended.
/// Returns whether the account was modified.
pub async fn ensure_reference<I: IdentityStore + ?Sized>(
    store: &I,
    namespace: &str,
    identity: &str,
    secret_name: &str,
) -> Result<bool, Error> {
    let not_found = |source| Error::IdentityNotFound {
        namespace: namespace.to_owned(),
        identity: identity.to_owned(),
        source,
    };

    let mut account = store
        .get(identity)
        .await
        .map_err(|e| not_found(Some(e)))?
        .ok_or_else(|| not_found(None))?;

    let pull_secrets = account.image_pull_secrets.get_or_insert_with(Vec::new);
    if pull_secrets.iter().any(|r| r.name == secret_name) {
        return Ok(false);
    }

    pull_secrets.push(LocalObjectReference {
        name: secret_name.to_owned(),
    });

    store
        .replace(&account)
        .await
        .map_err(|source| Error::IdentityUpdate {
            namespace: namespace.to_owned(),
            identity: identity.to_owned(),
            source,
        })?;

    info!(%namespace, %identity, secret = %secret_name, "Added image pull secret");
    Ok(true)
}
