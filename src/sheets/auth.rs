//! Google Sheets authentication — service-account JWT grant with a cached
//! access token, or a static token for development.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::SheetError;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Refresh when the cached token is within this window of expiry.
const EXPIRY_SLACK_SECS: i64 = 60;

/// How the Sheets client authenticates.
pub enum SheetsAuth {
    /// Fixed bearer token, refreshed outside the process. Development only.
    Static(SecretString),
    /// Service-account JWT-bearer grant.
    ServiceAccount {
        client_email: String,
        private_key_pem: SecretString,
    },
}

/// JWT-bearer grant claims.
#[derive(Debug, Serialize)]
struct GrantClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Hands out a valid bearer token, refreshing the service-account grant
/// when the cached one is near expiry.
pub struct TokenProvider {
    auth: SheetsAuth,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(auth: SheetsAuth) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, fetching a fresh one if needed.
    pub async fn bearer_token(&self) -> Result<SecretString, SheetError> {
        let (client_email, private_key_pem) = match &self.auth {
            SheetsAuth::Static(token) => return Ok(token.clone()),
            SheetsAuth::ServiceAccount {
                client_email,
                private_key_pem,
            } => (client_email, private_key_pem),
        };

        {
            let cached = self.cached.lock().expect("token lock poisoned");
            if let Some(entry) = cached.as_ref()
                && entry.expires_at - Utc::now() > Duration::seconds(EXPIRY_SLACK_SECS)
            {
                return Ok(entry.token.clone());
            }
        }

        let assertion = sign_grant(client_email, private_key_pem)?;
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SheetError::AuthFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::AuthFailed(format!(
                "token exchange failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetError::AuthFailed(e.to_string()))?;

        let secret = SecretString::from(token.access_token);
        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        *self.cached.lock().expect("token lock poisoned") = Some(CachedToken {
            token: secret.clone(),
            expires_at,
        });

        tracing::debug!(expires_in = token.expires_in, "Refreshed Sheets access token");
        Ok(secret)
    }
}

/// Build the signed JWT-bearer assertion for the token exchange.
fn sign_grant(client_email: &str, private_key_pem: &SecretString) -> Result<String, SheetError> {
    let now = Utc::now();
    let claims = GrantClaims {
        iss: client_email.to_string(),
        scope: SHEETS_SCOPE.to_string(),
        aud: TOKEN_URL.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };

    let key = EncodingKey::from_rsa_pem(private_key_pem.expose_secret().as_bytes())
        .map_err(|e| SheetError::AuthFailed(format!("invalid service-account key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| SheetError::AuthFailed(format!("failed to sign grant: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let provider = TokenProvider::new(SheetsAuth::Static(SecretString::from("t0ken")));
        let token = provider.bearer_token().await.unwrap();
        assert_eq!(token.expose_secret(), "t0ken");
    }

    #[test]
    fn garbage_key_fails_signing() {
        let err = sign_grant("svc@example.iam", &SecretString::from("not a pem")).unwrap_err();
        assert!(matches!(err, SheetError::AuthFailed(_)));
    }
}
