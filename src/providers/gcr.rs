//! Google Container Registry credentials from the Google default credential
//! chain: an explicit credentials file, then the gcloud application default
//! credentials, then the GCE metadata server.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credentials::{CredentialSource, RegistryCredential};
use crate::error::Error;

pub const PROVIDER: &str = "gcr";

/// Token endpoint of the default service account (Workload Identity).
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Docker username GCR expects alongside an OAuth2 access token.
const OAUTH_USERNAME: &str = "oauth2accesstoken";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn default_token_uri() -> String {
    OAUTH_TOKEN_URL.to_owned()
}

/// The two credential file kinds gcloud and IAM hand out.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Fetches OAuth2 access tokens for a fixed registry URL.
#[derive(Debug)]
pub struct GcrSource {
    http: Client,
    registry_url: String,
    credentials_file: Option<PathBuf>,
    well_known_file: Option<PathBuf>,
    metadata_url: String,
}

impl GcrSource {
    /// `credentials_file` must be readable when set; the gcloud file is only
    /// used when present, and the metadata server is the last resort.
    pub fn new(
        registry_url: impl Into<String>,
        metadata_url: impl Into<String>,
        credentials_file: Option<PathBuf>,
    ) -> Self {
        let registry_url = registry_url.into();
        let metadata_url = metadata_url.into();
        info!(
            %registry_url,
            %metadata_url,
            credentials_file = ?credentials_file,
            "Configuring GCR credential source"
        );

        Self {
            http: Client::new(),
            registry_url,
            credentials_file,
            well_known_file: well_known_file(),
            metadata_url,
        }
    }

    async fn access_token(&self) -> Result<String, Error> {
        if let Some(path) = &self.credentials_file {
            return self.exchange(&read_credentials(path).await?).await;
        }

        if let Some(path) = self.well_known_file.as_deref().filter(|p| p.is_file()) {
            debug!(path = %path.display(), "Using gcloud application default credentials");
            return self.exchange(&read_credentials(path).await?).await;
        }

        self.metadata_token().await
    }

    async fn metadata_token(&self) -> Result<String, Error> {
        let response = self
            .http
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::credential_fetch(PROVIDER, e))?;

        parse_token(response).await
    }

    async fn exchange(&self, credentials: &CredentialsFile) -> Result<String, Error> {
        let (token_uri, form) = match credentials {
            CredentialsFile::ServiceAccount {
                client_email,
                private_key,
                token_uri,
            } => {
                let assertion = sign_assertion(client_email, private_key, token_uri)?;
                (
                    token_uri,
                    vec![("grant_type", JWT_BEARER_GRANT.to_owned()), ("assertion", assertion)],
                )
            }
            CredentialsFile::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => (
                token_uri,
                vec![
                    ("grant_type", "refresh_token".to_owned()),
                    ("client_id", client_id.clone()),
                    ("client_secret", client_secret.clone()),
                    ("refresh_token", refresh_token.clone()),
                ],
            ),
        };

        let response = self
            .http
            .post(token_uri)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::credential_fetch(PROVIDER, e))?;

        parse_token(response).await
    }
}

#[async_trait]
impl CredentialSource for GcrSource {
    async fn fetch(&self) -> Result<RegistryCredential, Error> {
        let access_token = self.access_token().await?;

        debug!(endpoint = %self.registry_url, "Fetched GCR access token");

        Ok(RegistryCredential {
            token: docker_auth(&access_token),
            endpoint: self.registry_url.clone(),
        })
    }
}

fn well_known_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}

async fn read_credentials(path: &Path) -> Result<CredentialsFile, Error> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| Error::credential_fetch(PROVIDER, e))?;
    serde_json::from_slice(&raw).map_err(|e| Error::credential_fetch(PROVIDER, e))
}

fn sign_assertion(client_email: &str, private_key: &str, token_uri: &str) -> Result<String, Error> {
    let iat = jsonwebtoken::get_current_timestamp();
    let claims = Claims {
        iss: client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| Error::credential_fetch(PROVIDER, e))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| Error::credential_fetch(PROVIDER, e))
}

async fn parse_token(response: reqwest::Response) -> Result<String, Error> {
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::credential_fetch(PROVIDER, e))?;
    Ok(token.access_token)
}

fn docker_auth(access_token: &str) -> String {
    STANDARD.encode(format!("{OAUTH_USERNAME}:{access_token}"))
}
