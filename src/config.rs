use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::providers::gcr::METADATA_TOKEN_URL;

/// Settings shared by every subcommand. Flags take precedence over the
/// environment, which takes precedence over the defaults.
#[derive(Args, Clone, Debug)]
pub struct Settings {
    /// Minutes between reconciliation cycles
    #[arg(long, env = "REFRESH_MINS", default_value_t = 60)]
    pub refresh_mins: u64,

    /// Registry URL to log in to with GCR credentials; GCR is disabled when unset
    #[arg(long, env = "GCR_URL")]
    pub gcr_url: Option<String>,

    /// Name of the secret holding GCR credentials
    #[arg(long, default_value = "gcr-secret")]
    pub gcr_secret_name: String,

    /// Service account key or gcloud credentials file used for GCR tokens
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub gcr_credentials_file: Option<PathBuf>,

    /// Metadata server endpoint used for GCR tokens when no credentials file is found
    #[arg(long, env = "GCR_TOKEN_URL", default_value = METADATA_TOKEN_URL)]
    pub gcr_token_url: String,

    /// AWS account id whose ECR registry is used; ECR is disabled when unset
    #[arg(long, env = "AWS_ACCOUNT")]
    pub aws_account: Option<String>,

    /// AWS region of the ECR registry
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub aws_region: String,

    /// Name of the secret holding ECR credentials
    #[arg(long, default_value = "awsecr-cred")]
    pub aws_secret_name: String,

    /// Namespaces that never receive registry secrets
    #[arg(
        long,
        env = "SKIP_NAMESPACES",
        value_delimiter = ',',
        default_value = "kube-system"
    )]
    pub skip_namespaces: Vec<String>,

    /// Service account that gets the image pull secrets in each namespace
    #[arg(long, default_value = "default")]
    pub service_account: String,
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_mins.max(1) * 60)
    }
}
