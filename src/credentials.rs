use std::fmt;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::dockercfg::SecretKind;
use crate::error::Error;

/// A short-lived registry login, fetched fresh every cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryCredential {
    pub token: String,
    pub endpoint: String,
}

/// A cloud registry that can hand out a login token.
///
/// Implementations make exactly one provider call per `fetch` and report
/// any failure as [`Error::CredentialFetch`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<RegistryCredential, Error>;
}

/// One registry provider as the reconciler sees it: the secret it manages
/// and, if configured, where its credentials come from.
pub struct Provider {
    pub name: &'static str,
    pub secret_name: String,
    pub kind: SecretKind,
    pub source: Option<Box<dyn CredentialSource>>,
}

impl Provider {
    pub fn new(name: &'static str, secret_name: impl Into<String>, kind: SecretKind) -> Self {
        Self {
            name,
            secret_name: secret_name.into(),
            kind,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_configured(&self) -> bool {
        self.source.is_some()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("secret_name", &self.secret_name)
            .field("kind", &self.kind)
            .field("configured", &self.is_configured())
            .finish()
    }
}
