use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::models::WorkspaceAuth;
use crate::errors::BotError;
use crate::utils::ids::string_or_number;

/// Per-user OAuth credential for the work-management API, written by the
/// OAuth handshake and only read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,
}

impl StoredCredential {
    #[must_use]
    pub fn to_auth(&self) -> WorkspaceAuth {
        WorkspaceAuth {
            access_token: self.access_token.clone(),
            account_id: self.account_id.clone(),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn get_credential(&self, chat_user_id: &str)
    -> Result<Option<StoredCredential>, BotError>;
}

/// Looks up the credential and turns "not stored" into an error.
///
/// # Errors
///
/// Returns `MissingCredential` when nothing is stored for the user.
pub async fn require_auth(
    store: &dyn CredentialStore,
    chat_user_id: &str,
) -> Result<WorkspaceAuth, BotError> {
    store
        .get_credential(chat_user_id)
        .await?
        .map(|c| c.to_auth())
        .ok_or_else(|| BotError::MissingCredential(chat_user_id.to_string()))
}

fn key_for_user(prefix: &str, chat_user_id: &str) -> String {
    let mut p = prefix.to_string();
    if !p.ends_with('/') {
        p.push('/');
    }
    format!("{p}{chat_user_id}")
}

/// Credentials kept as `SecureString` parameters in SSM Parameter Store.
pub struct SsmCredentialStore {
    prefix: String,
    client: OnceCell<SsmClient>,
}

impl SsmCredentialStore {
    #[must_use]
    pub fn new(prefix: String) -> Self {
        Self {
            prefix,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &SsmClient {
        self.client
            .get_or_init(|| async {
                let shared = aws_config::from_env().load().await;
                SsmClient::new(&shared)
            })
            .await
    }
}

#[async_trait]
impl CredentialStore for SsmCredentialStore {
    async fn get_credential(
        &self,
        chat_user_id: &str,
    ) -> Result<Option<StoredCredential>, BotError> {
        let name = key_for_user(&self.prefix, chat_user_id);

        match self
            .client()
            .await
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(resp) => {
                let Some(param) = resp.parameter else {
                    return Ok(None);
                };
                let Some(value) = param.value() else {
                    return Ok(None);
                };
                let credential: StoredCredential = serde_json::from_str(value)
                    .map_err(|e| BotError::GeneralError(format!("credential parse: {e}")))?;
                Ok(Some(credential))
            }
            Err(e) => {
                // If not found, return Ok(None); otherwise bubble error
                let msg = format!("{e:?}");
                if msg.contains("ParameterNotFound") {
                    Ok(None)
                } else {
                    Err(BotError::AwsError(format!("ssm get_parameter: {e}")))
                }
            }
        }
    }
}
