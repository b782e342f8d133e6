//! AWS Elastic Container Registry credentials.

use async_trait::async_trait;
use aws_sdk_ecr::Client as EcrClient;
use aws_sdk_ecr::operation::get_authorization_token::GetAuthorizationTokenOutput;
use tracing::{debug, info};

use crate::credentials::{CredentialSource, RegistryCredential};
use crate::error::Error;

pub const PROVIDER: &str = "ecr";

/// Fetches ECR authorization tokens for a single AWS account.
pub struct EcrSource {
    client: EcrClient,
    account_id: String,
}

impl std::fmt::Debug for EcrSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcrSource")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl EcrSource {
    /// Build a source using the AWS default credential chain in `region`.
    pub async fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        let account_id = account_id.into();
        info!(%account_id, %region, "Configuring ECR credential source");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;

        Self {
            client: EcrClient::new(&sdk_config),
            account_id,
        }
    }
}

#[async_trait]
impl CredentialSource for EcrSource {
    async fn fetch(&self) -> Result<RegistryCredential, Error> {
        let output = self
            .client
            .get_authorization_token()
            .registry_ids(&self.account_id)
            .send()
            .await
            .map_err(|e| Error::credential_fetch(PROVIDER, e))?;

        let credential = credential_from_output(&output)?;
        debug!(endpoint = %credential.endpoint, "Fetched ECR authorization token");
        Ok(credential)
    }
}

/// ECR tokens are already base64 `user:password` blobs and are used as-is.
fn credential_from_output(
    output: &GetAuthorizationTokenOutput,
) -> Result<RegistryCredential, Error> {
    let data = output
        .authorization_data()
        .first()
        .ok_or_else(|| Error::credential_fetch(PROVIDER, "no authorization data returned"))?;

    let token = data
        .authorization_token()
        .ok_or_else(|| Error::credential_fetch(PROVIDER, "authorization token missing"))?;
    let endpoint = data
        .proxy_endpoint()
        .ok_or_else(|| Error::credential_fetch(PROVIDER, "proxy endpoint missing"))?;

    Ok(RegistryCredential {
        token: token.to_owned(),
        endpoint: endpoint.to_owned(),
    })
}
