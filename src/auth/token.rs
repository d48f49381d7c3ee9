//! HMAC-SHA256 signed tokens with rotating secrets.
//!
//! # Responsibilities
//! - Issue `header.payload.signature` tokens (base64url, no padding)
//! - Verify signature, key id and expiry
//! - Rotate secrets at runtime without blocking verification
//!
//! # Design Decisions
//! - The newest secret signs; every retained secret verifies by its key id
//! - Key ids are stable: removing a secret never renumbers the others
//! - Secrets live in an `ArcSwap`, so rotation is copy-on-write and reads
//!   never take a lock
//! - Expiry is enforced on verification

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

use crate::auth::lifetime::Lifetime;
use crate::config::schema::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a token could not be issued or accepted.
///
/// Callers facing the network should collapse all of these into one
/// generic unauthorized answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no signing secret configured")]
    NoSecrets,

    #[error("malformed token")]
    Malformed,

    #[error("unknown key id {0}")]
    UnknownKey(u32),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encode(String),
}

impl AuthError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NoSecrets => "no_secrets",
            AuthError::Malformed => "malformed",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired => "expired",
            AuthError::Encode(_) => "encode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    HS256,
}

/// Token header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub typ: String,
    pub alg: Algorithm,
    pub kid: u32,
}

/// Registered claims plus the caller's payload, merged into one JSON object.
///
/// A key the payload already carries wins over the registered field of the
/// same name, so a payload with its own `exp` keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims<P> {
    pub iss: Option<String>,
    pub aud: Option<String>,
    /// Issued at, seconds since the epoch.
    pub iat: Option<u64>,
    /// Expiry, seconds since the epoch.
    pub exp: Option<u64>,
    pub payload: P,
}

impl<P> Claims<P> {
    pub fn new(payload: P) -> Self {
        Self {
            iss: None,
            aud: None,
            iat: None,
            exp: None,
            payload,
        }
    }
}

impl<P: Serialize> Claims<P> {
    fn to_object(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut object = match serde_json::to_value(&self.payload)? {
            Value::Object(object) => object,
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "token payload must be a JSON object, got {other}"
                )))
            }
        };
        let registered = [
            ("iss", self.iss.clone().map(Value::from)),
            ("aud", self.aud.clone().map(Value::from)),
            ("iat", self.iat.map(Value::from)),
            ("exp", self.exp.map(Value::from)),
        ];
        for (key, value) in registered {
            if let Some(value) = value {
                object.entry(key).or_insert(value);
            }
        }
        Ok(object)
    }
}

impl<P: DeserializeOwned> Claims<P> {
    /// Split a decoded payload object. The payload sees every key, the
    /// registered claims included.
    fn from_object(object: Map<String, Value>) -> Result<Self, AuthError> {
        let string = |key: &str| match object.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(AuthError::Malformed),
        };
        let seconds = |key: &str| match object.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or(AuthError::Malformed),
        };

        let iss = string("iss")?;
        let aud = string("aud")?;
        let iat = seconds("iat")?;
        let exp = seconds("exp")?;
        let payload =
            serde_json::from_value(Value::Object(object)).map_err(|_| AuthError::Malformed)?;

        Ok(Self {
            iss,
            aud,
            iat,
            exp,
            payload,
        })
    }
}

impl<P: Serialize> Serialize for Claims<P> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// A verified token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenData<P> {
    pub header: Header,
    pub claims: Claims<P>,
}

#[derive(Clone)]
struct Secret {
    kid: u32,
    key: Vec<u8>,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("kid", &self.kid)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Ordered set of signing secrets.
#[derive(Debug)]
pub struct KeyRing {
    secrets: ArcSwap<Vec<Secret>>,
    next_kid: AtomicU32,
    lifetime: Lifetime,
    issuer: Option<String>,
    audience: Option<String>,
}

impl KeyRing {
    /// Build a ring from `secrets`, oldest first; key ids start at 0 and the
    /// last secret signs.
    pub fn new<S: AsRef<str>>(secrets: impl IntoIterator<Item = S>) -> Result<Self, AuthError> {
        let secrets: Vec<Secret> = secrets
            .into_iter()
            .zip(0u32..)
            .map(|(secret, kid)| Secret {
                kid,
                key: secret.as_ref().as_bytes().to_vec(),
            })
            .collect();
        if secrets.is_empty() {
            return Err(AuthError::NoSecrets);
        }

        let next_kid = secrets.len() as u32;
        Ok(Self {
            secrets: ArcSwap::from_pointee(secrets),
            next_kid: AtomicU32::new(next_kid),
            lifetime: Lifetime::default(),
            issuer: None,
            audience: None,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Ok(Self::new(&config.secrets)?.with_config(config))
    }

    /// Apply lifetime, issuer and audience from `config`; its secrets are
    /// ignored.
    pub fn with_config(mut self, config: &AuthConfig) -> Self {
        self.lifetime = config.lifetime;
        self.issuer = config.issuer.clone();
        self.audience = config.audience.clone();
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Key id used for the next signature.
    pub fn current_kid(&self) -> Option<u32> {
        self.secrets.load().last().map(|secret| secret.kid)
    }

    /// Key ids still accepted for verification, oldest first.
    pub fn kids(&self) -> Vec<u32> {
        self.secrets.load().iter().map(|secret| secret.kid).collect()
    }

    /// Add a secret; it signs from now on. Returns its key id.
    pub fn add_secret(&self, secret: &str) -> u32 {
        let kid = self.next_kid.fetch_add(1, Ordering::Relaxed);
        let key = secret.as_bytes().to_vec();
        self.secrets.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Secret {
                kid,
                key: key.clone(),
            });
            next
        });
        tracing::info!(kid, "Signing secret added");
        kid
    }

    /// Retire a secret. Tokens signed with it stop verifying.
    ///
    /// Returns whether it was present; the last remaining secret cannot be
    /// removed.
    pub fn remove_secret(&self, kid: u32) -> Result<bool, AuthError> {
        let current = self.secrets.load_full();
        if !current.iter().any(|secret| secret.kid == kid) {
            return Ok(false);
        }
        if current.len() == 1 {
            return Err(AuthError::NoSecrets);
        }

        self.secrets.rcu(|current| {
            current
                .iter()
                .filter(|secret| secret.kid != kid)
                .cloned()
                .collect::<Vec<_>>()
        });
        tracing::info!(kid, "Signing secret removed");
        Ok(true)
    }

    /// Reconcile with a freshly loaded secret list. The ring takes the
    /// list's order, so its last entry signs. Retained secrets keep their key
    /// ids, new ones get fresh ids, and secrets no longer listed are retired.
    pub fn sync_secrets(&self, secrets: &[String]) -> Result<(), AuthError> {
        if secrets.is_empty() {
            return Err(AuthError::NoSecrets);
        }

        let previous = self.secrets.rcu(|current| {
            let mut next: Vec<Secret> = Vec::with_capacity(secrets.len());
            for secret in secrets {
                let key = secret.as_bytes();
                if next.iter().any(|s| s.key.as_slice() == key) {
                    continue;
                }
                // a retried update may skip ids; they are never reused
                let kid = current
                    .iter()
                    .find(|s| s.key.as_slice() == key)
                    .map_or_else(|| self.next_kid.fetch_add(1, Ordering::Relaxed), |s| s.kid);
                next.push(Secret {
                    kid,
                    key: key.to_vec(),
                });
            }
            next
        });

        tracing::info!(
            kids = ?self.kids(),
            previous = previous.len(),
            "Signing secrets reconciled"
        );
        Ok(())
    }

    /// Sign `payload` with the newest secret, adding `iat` and `exp`.
    pub fn sign<P: Serialize>(&self, payload: &P) -> Result<String, AuthError> {
        self.sign_claims(Claims::new(payload))
    }

    /// Sign pre-built claims. Only registered claims absent from both the
    /// claims and the payload are filled in.
    pub fn sign_claims<P: Serialize>(&self, claims: Claims<P>) -> Result<String, AuthError> {
        let secrets = self.secrets.load();
        let secret = secrets.last().ok_or(AuthError::NoSecrets)?;

        let mut object = claims
            .to_object()
            .map_err(|e| AuthError::Encode(e.to_string()))?;
        let now = now_secs();
        object.entry("iat").or_insert_with(|| now.into());
        object
            .entry("exp")
            .or_insert_with(|| now.saturating_add(self.lifetime.as_duration().as_secs()).into());
        if let Some(issuer) = &self.issuer {
            object.entry("iss").or_insert_with(|| issuer.as_str().into());
        }
        if let Some(audience) = &self.audience {
            object.entry("aud").or_insert_with(|| audience.as_str().into());
        }

        let header = Header {
            typ: "JWT".to_string(),
            alg: Algorithm::HS256,
            kid: secret.kid,
        };
        let header = encode_segment(&header)?;
        let payload = encode_segment(&object)?;
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(mac(&secret.key, &signing_input)?.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check a token and decode its claims.
    pub fn verify<P: DeserializeOwned>(&self, token: &str) -> Result<TokenData<P>, AuthError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::Malformed);
        };

        let header: Header = decode_segment(header_b64)?;
        let secrets = self.secrets.load();
        let secret = secrets
            .iter()
            .find(|secret| secret.kid == header.kid)
            .ok_or(AuthError::UnknownKey(header.kid))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed)?;
        mac(&secret.key, &format!("{header_b64}.{payload_b64}"))?
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims = Claims::<P>::from_object(decode_segment(payload_b64)?)?;
        if claims.exp.is_some_and(|exp| exp < now_secs()) {
            return Err(AuthError::Expired);
        }

        Ok(TokenData { header, claims })
    }
}

fn mac(key: &[u8], input: &str) -> Result<HmacSha256, AuthError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| AuthError::Encode(e.to_string()))?;
    mac.update(input.as_bytes());
    Ok(mac)
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::Encode(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
