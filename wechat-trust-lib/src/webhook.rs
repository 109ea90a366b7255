//! Verification of pay notifications (webhooks).
//!
//! A notification is accepted only after the RSA-SHA256 signature in
//! `Wechatpay-Signature` verifies against the platform certificate named by
//! `Wechatpay-Serial`, over
//!
//! ```text
//! TIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! Only then is the embedded resource decrypted with the APIv3 key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::aead::{self, EncryptedResource};
use crate::certificates::{CertificateSet, CertificateStore};
use crate::nonce::unix_timestamp;
use crate::signing;
use crate::{Result, TrustError};

/// Signature header.
pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";
/// Certificate serial header.
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";
/// Timestamp header.
pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";
/// Nonce header.
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";

/// Request headers with case-insensitive lookup.
#[derive(Clone, Debug, Default)]
pub struct WebhookHeaders {
    by_name: HashMap<String, String>,
}

impl WebhookHeaders {
    /// Collect headers from name/value pairs; later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let by_name = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.as_ref().to_string()))
            .collect();
        Self { by_name }
    }

    /// Header value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.by_name.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&str> {
        self.get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TrustError::invalid_data(name, "header missing"))
    }

    /// The four signature headers, failing on the first missing one.
    pub fn signature_headers(&self) -> Result<SignatureHeaders<'_>> {
        Ok(SignatureHeaders {
            signature: self.required(HEADER_SIGNATURE)?,
            serial: self.required(HEADER_SERIAL)?,
            timestamp: self.required(HEADER_TIMESTAMP)?,
            nonce: self.required(HEADER_NONCE)?,
        })
    }
}

/// Borrowed signature headers of one notification.
#[derive(Clone, Copy, Debug)]
pub struct SignatureHeaders<'a> {
    /// Base64 RSA-SHA256 signature.
    pub signature: &'a str,
    /// Serial of the signing platform certificate.
    pub serial: &'a str,
    /// Unix timestamp covered by the signature.
    pub timestamp: &'a str,
    /// Nonce covered by the signature.
    pub nonce: &'a str,
}

/// Notification body as posted by the platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id.
    pub id: String,
    /// Creation time, RFC 3339.
    #[serde(default)]
    pub create_time: Option<String>,
    /// e.g. `TRANSACTION.SUCCESS`.
    #[serde(default)]
    pub event_type: String,
    /// Always `encrypt-resource`.
    #[serde(default)]
    pub resource_type: String,
    /// Short human readable summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// The encrypted payload.
    pub resource: EncryptedResource,
}

/// Decrypted notification payload.
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptedResource {
    /// Payload parsed as JSON.
    Json(serde_json::Value),
    /// Payload that is not JSON.
    Text(String),
}

impl DecryptedResource {
    fn from_plaintext(plaintext: String) -> Self {
        match serde_json::from_str(&plaintext) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(plaintext),
        }
    }

    /// The JSON value, if the payload was JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Deserialize a JSON payload into `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match self {
            Self::Json(value) => Ok(T::deserialize(value)?),
            Self::Text(_) => Err(TrustError::invalid_data("resource", "payload is not JSON")),
        }
    }
}

/// A notification whose signature verified, with its decrypted payload.
#[derive(Clone, Debug)]
pub struct VerifiedNotification {
    /// Serial of the certificate that verified the signature.
    pub serial_no: String,
    /// Notification metadata.
    pub notification: Notification,
    /// Decrypted payload.
    pub resource: DecryptedResource,
}

/// Verify and decrypt a notification against a known certificate set.
///
/// `max_clock_skew`, when set, rejects timestamps further than that from
/// the local clock.
pub fn verify_notification(
    headers: &WebhookHeaders,
    body: &str,
    certificates: &CertificateSet,
    api_v3_key: &[u8],
    max_clock_skew: Option<Duration>,
) -> Result<VerifiedNotification> {
    let sig = headers.signature_headers()?;

    let certificate = certificates.get(sig.serial).ok_or_else(|| {
        tracing::warn!(serial = %sig.serial, "notification signed by unknown certificate");
        TrustError::unknown_certificate(sig.serial)
    })?;

    if let Some(skew) = max_clock_skew {
        check_clock_skew(sig.timestamp, skew)?;
    }

    let message = signing::message(&[sig.timestamp, sig.nonce, body]);
    if !signing::verify(&message, sig.signature, &certificate.public_key) {
        tracing::warn!(serial = %certificate.serial_no, "notification signature rejected");
        return Err(TrustError::SignatureInvalid {
            serial: certificate.serial_no.clone(),
        });
    }

    let notification: Notification = serde_json::from_str(body)
        .map_err(|e| TrustError::invalid_data("body", e.to_string()))?;
    let plaintext = aead::decrypt_resource(api_v3_key, &notification.resource).map_err(|e| {
        tracing::warn!(id = %notification.id, error = %e, "notification resource decryption failed");
        TrustError::from(e)
    })?;

    tracing::debug!(id = %notification.id, event_type = %notification.event_type, "notification verified");

    Ok(VerifiedNotification {
        serial_no: certificate.serial_no.clone(),
        notification,
        resource: DecryptedResource::from_plaintext(plaintext),
    })
}

fn check_clock_skew(timestamp: &str, max: Duration) -> Result<()> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| TrustError::invalid_data(HEADER_TIMESTAMP, "not a unix timestamp"))?;
    let skew = unix_timestamp().abs_diff(ts);
    if skew > max.as_secs() {
        return Err(TrustError::invalid_data(
            HEADER_TIMESTAMP,
            format!("off by {}s, allowed {}s", skew, max.as_secs()),
        ));
    }
    Ok(())
}

/// Minimum spacing between forced certificate re-downloads.
pub const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// Verifies notifications for one merchant using its certificate store.
#[derive(Debug)]
pub struct WebhookVerifier {
    store: Arc<CertificateStore>,
    max_clock_skew: Option<Duration>,
    refresh_cooldown: Duration,
    last_forced_refresh: Mutex<Option<Instant>>,
}

impl WebhookVerifier {
    /// Create a verifier over `store`.
    pub fn new(store: Arc<CertificateStore>) -> Self {
        Self {
            store,
            max_clock_skew: None,
            refresh_cooldown: REFRESH_COOLDOWN,
            last_forced_refresh: Mutex::new(None),
        }
    }

    /// Reject notifications whose timestamp is further than `skew` from now.
    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = Some(skew);
        self
    }

    /// Override [`REFRESH_COOLDOWN`].
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// The certificate store.
    pub fn store(&self) -> &Arc<CertificateStore> {
        &self.store
    }

    /// Verify a notification and return its decrypted payload.
    pub async fn verify(&self, headers: &WebhookHeaders, body: &str) -> Result<DecryptedResource> {
        Ok(self.verify_notification(headers, body).await?.resource)
    }

    /// Verify a notification and return it with its metadata.
    pub async fn verify_notification(&self, headers: &WebhookHeaders, body: &str) -> Result<VerifiedNotification> {
        let certificates = self.store.certificates().await?;
        verify_notification(headers, body, &certificates, self.store.api_v3_key(), self.max_clock_skew)
    }

    /// Like [`Self::verify_notification`], re-downloading the certificates once
    /// when the signing certificate is unknown (platform key rotation).
    ///
    /// At most one forced re-download happens per refresh cooldown; within
    /// it an unknown serial fails without contacting the platform.
    pub async fn verify_with_refresh(&self, headers: &WebhookHeaders, body: &str) -> Result<VerifiedNotification> {
        match self.verify_notification(headers, body).await {
            Err(TrustError::UnknownCertificate { serial }) => {
                if !self.claim_forced_refresh()? {
                    tracing::debug!(serial = %serial, "unknown notification certificate, refresh cooling down");
                    return Err(TrustError::UnknownCertificate { serial });
                }
                tracing::info!(serial = %serial, "unknown notification certificate, refreshing");
                let certificates = self.store.refresh().await?;
                verify_notification(headers, body, &certificates, self.store.api_v3_key(), self.max_clock_skew)
            }
            other => other,
        }
    }

    fn claim_forced_refresh(&self) -> Result<bool> {
        let mut last = self
            .last_forced_refresh
            .lock()
            .map_err(|_| TrustError::Internal("refresh cooldown lock poisoned".into()))?;
        let now = Instant::now();
        if matches!(*last, Some(at) if now.duration_since(at) < self.refresh_cooldown) {
            return Ok(false);
        }
        *last = Some(now);
        Ok(true)
    }
}
