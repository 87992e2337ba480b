use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, StatusCode};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use url::Url;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid token url: {0}")]
    Url(#[from] url::ParseError),
    #[error("token endpoint returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to sign assertion: {0}")]
    Signing(String),
}

/// Service-account identity used to mint signed assertions.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    private_key: RsaPrivateKey,
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Deserialize)]
struct ServiceAccountFile {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Builds a key from an e-mail and a PEM string as typically stored in
    /// environment variables, where newlines are often escaped as `\n`.
    pub fn from_env_parts(
        client_email: impl Into<String>,
        raw_private_key: &str,
    ) -> Result<Self, OAuthError> {
        let pem = raw_private_key.replace("\\n", "\n");
        Ok(Self {
            client_email: client_email.into(),
            private_key: parse_private_key(&pem)?,
            token_uri: None,
        })
    }

    /// Parses a downloaded service-account JSON key file.
    pub fn from_json(bytes: &[u8]) -> Result<Self, OAuthError> {
        let file: ServiceAccountFile = serde_json::from_slice(bytes)?;
        Ok(Self {
            client_email: file.client_email,
            private_key: parse_private_key(&file.private_key)?,
            token_uri: file.token_uri,
        })
    }
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, OAuthError> {
    if !pem.contains("BEGIN") {
        return Err(OAuthError::InvalidKey(
            "missing BEGIN PRIVATE KEY marker".into(),
        ));
    }
    let pem = pem.trim();
    match RsaPrivateKey::from_pkcs8_pem(pem) {
        Ok(key) => Ok(key),
        Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|_| OAuthError::InvalidKey(pkcs8_err.to_string())),
    }
}

#[derive(Serialize)]
struct AssertionHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct ServiceAccountClient {
    http: Client,
    token_url: Url,
    key: ServiceAccountKey,
    scope: String,
}

impl ServiceAccountClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, OAuthError> {
        let token_url = key
            .token_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
        Self::with_token_url(&token_url, key)
    }

    pub fn with_token_url(token_url: &str, key: ServiceAccountKey) -> Result<Self, OAuthError> {
        Ok(Self {
            http: Client::new(),
            token_url: Url::parse(token_url)?,
            key,
            scope: DRIVE_READONLY_SCOPE.to_string(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn claims(&self, now_unix: i64) -> AssertionClaims {
        AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.token_url.to_string(),
            exp: now_unix + ASSERTION_LIFETIME_SECS,
            iat: now_unix,
        }
    }

    /// Signed RS256 assertion: `base64url(header).base64url(claims).base64url(sig)`.
    pub fn assertion(&self, now_unix: i64) -> Result<String, OAuthError> {
        let header = AssertionHeader {
            alg: "RS256",
            typ: "JWT",
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&self.claims(now_unix))?);
        let signing_input = format!("{header}.{claims}");

        let signing_key = SigningKey::<Sha256>::new(self.key.private_key.clone());
        let signature = signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|err| OAuthError::Signing(err.to_string()))?;
        let signature = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    pub async fn exchange(&self, now_unix: i64) -> Result<OAuthToken, OAuthError> {
        let assertion = self.assertion(now_unix)?;
        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json::<OAuthToken>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(OAuthError::Api { status, body })
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
