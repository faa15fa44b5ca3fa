//! Validated credentials for both services.

use secrecy::SecretString;

use crate::error::{SyncError, SyncResult};

/// How the binary gets a Strava access token.
#[derive(Clone, Debug)]
pub enum DestinationAuth {
    /// A token issued earlier, used as is.
    Token(SecretString),
    /// Run the interactive authorization flow for this API application.
    OAuth {
        client_id: u64,
        client_secret: SecretString,
    },
}

#[derive(Clone, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
    pub destination: DestinationAuth,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Credentials {
    /// Check the raw flag or environment values. Empty strings count as
    /// missing. A static token takes precedence over client id and secret.
    pub fn resolve(
        email: Option<String>,
        password: Option<String>,
        token: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> SyncResult<Self> {
        let (Some(email), Some(password)) = (present(email), present(password)) else {
            return Err(SyncError::Credential(
                "runtastic email and password are required".into(),
            ));
        };

        let destination = match (present(token), present(client_id), present(client_secret)) {
            (Some(token), _, _) => DestinationAuth::Token(SecretString::new(token.into())),
            (None, Some(id), Some(secret)) => {
                let client_id = id.trim().parse::<u64>().map_err(|_| {
                    SyncError::Credential(format!("strava client id must be an integer: {id}"))
                })?;
                DestinationAuth::OAuth {
                    client_id,
                    client_secret: SecretString::new(secret.into()),
                }
            }
            _ => {
                return Err(SyncError::Credential(
                    "either a strava access token or a client id and secret is required".into(),
                ));
            }
        };

        Ok(Self {
            email,
            password: SecretString::new(password.into()),
            destination,
        })
    }
}
