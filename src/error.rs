use std::fmt;

use thiserror::Error;

/// Boxed provider error, carried by [`Error::CredentialFetch`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the namespaced cluster stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object already exists")]
    AlreadyExists,
    #[error("object not found")]
    NotFound,
    #[error("object was modified concurrently")]
    Conflict,
    /// The write was rejected by validation, e.g. a change to an immutable field.
    #[error("object update rejected as invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Kube(kube::Error),
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                StoreError::AlreadyExists
            }
            kube::Error::Api(ref ae) if ae.code == 409 => StoreError::Conflict,
            kube::Error::Api(ref ae) if ae.code == 404 => StoreError::NotFound,
            kube::Error::Api(ae) if ae.code == 422 => StoreError::Invalid(ae.message),
            other => StoreError::Kube(other),
        }
    }
}

/// A single failure recorded while reconciling one provider or one
/// (namespace, provider) pair.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to fetch {provider} registry credentials: {source}")]
    CredentialFetch {
        provider: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("failed to list namespaces: {0}")]
    NamespaceList(#[source] StoreError),

    #[error("failed to sync secret '{secret}' in namespace '{namespace}': {source}")]
    SecretSync {
        namespace: String,
        secret: String,
        #[source]
        source: StoreError,
    },

    #[error("service account '{identity}' not found in namespace '{namespace}'")]
    IdentityNotFound {
        namespace: String,
        identity: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("failed to update service account '{identity}' in namespace '{namespace}': {source}")]
    IdentityUpdate {
        namespace: String,
        identity: String,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub(crate) fn credential_fetch(provider: &'static str, source: impl Into<BoxError>) -> Self {
        Error::CredentialFetch {
            provider,
            source: source.into(),
        }
    }
}

/// Every failure recorded during one reconciliation cycle.
#[derive(Debug)]
pub struct CycleError {
    pub errors: Vec<Error>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reconciliation cycle had {} failure(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CycleError {}
