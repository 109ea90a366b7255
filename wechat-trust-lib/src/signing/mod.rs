//! RSA-SHA256 request signing for the pay APIv3.
//!
//! Every outbound call carries an `Authorization` header built from a
//! signature over the canonical request string:
//!
//! ```text
//! METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! The same newline-terminated line format is used for webhook and payment
//! parameter signatures, see [`message`].

pub mod keys;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::MerchantConfig;
use crate::nonce::{create_nonce_str, unix_timestamp, NONCE_MAX_LEN};
use crate::{Result, TrustError};

/// Authorization scheme of the pay APIv3.
pub const AUTH_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Join `lines`, terminating each with `\n`.
pub fn message(lines: &[&str]) -> String {
    let capacity = lines.iter().map(|l| l.len() + 1).sum();
    let mut out = String::with_capacity(capacity);
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Canonical request string; `body` is empty for bodiless requests.
pub fn canonical_string(method: &str, path: &str, timestamp: i64, nonce: &str, body: &str) -> String {
    message(&[
        &method.to_ascii_uppercase(),
        path,
        &timestamp.to_string(),
        nonce,
        body,
    ])
}

/// Sign `message` with RSA-SHA256 (PKCS#1 v1.5) and base64 the result.
pub fn sign(message: &str, key: &RsaPrivateKey) -> Result<String> {
    let digest = Sha256::digest(message.as_bytes());
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| TrustError::Internal(format!("RSA signing failed: {}", e)))?;
    Ok(STANDARD.encode(signature))
}

/// Check a base64 RSA-SHA256 signature over `message`.
///
/// Undecodable signatures count as invalid.
pub fn verify(message: &str, signature_b64: &str, key: &RsaPublicKey) -> bool {
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let digest = Sha256::digest(message.as_bytes());
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .is_ok()
}

/// Build the `Authorization` header value.
///
/// Fields are quoted without escaping, so none of them may contain `"`.
pub fn authorization_header(
    mch_id: &str,
    nonce: &str,
    signature: &str,
    timestamp: i64,
    serial_no: &str,
) -> Result<String> {
    for (field, value) in [
        ("mchid", mch_id),
        ("nonce_str", nonce),
        ("signature", signature),
        ("serial_no", serial_no),
    ] {
        if value.contains('"') {
            return Err(TrustError::invalid_data(field, "must not contain '\"'"));
        }
    }
    Ok(format!(
        "{} mchid=\"{}\",nonce_str=\"{}\",signature=\"{}\",timestamp=\"{}\",serial_no=\"{}\"",
        AUTH_SCHEME, mch_id, nonce, signature, timestamp, serial_no
    ))
}

/// A signed outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Path plus query string.
    pub path: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Nonce string.
    pub nonce: String,
    /// Body that was signed, empty for bodiless requests.
    pub body: String,
    /// Base64 RSA-SHA256 signature.
    pub signature: String,
    /// Ready-to-send `Authorization` header value.
    pub authorization: String,
}

/// Parameters handed to `wx.requestPayment` in a mini program or JSAPI page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniProgramPayment {
    /// App id the payment was ordered for.
    pub app_id: String,
    /// Unix timestamp in seconds.
    pub time_stamp: String,
    /// Nonce string.
    pub nonce_str: String,
    /// `prepay_id=...`
    pub package: String,
    /// Always `RSA`.
    pub sign_type: String,
    /// Base64 signature over `appId\ntimeStamp\nnonceStr\npackage\n`.
    pub pay_sign: String,
}

/// Signs requests and payment parameters for one merchant.
#[derive(Clone)]
pub struct RequestSigner {
    mch_id: String,
    serial_no: String,
    key: RsaPrivateKey,
}

impl RequestSigner {
    /// Create a signer from a merchant id, merchant certificate serial and key.
    pub fn new(mch_id: impl Into<String>, serial_no: impl Into<String>, key: RsaPrivateKey) -> Self {
        Self {
            mch_id: mch_id.into(),
            serial_no: serial_no.into(),
            key,
        }
    }

    /// Create a signer from merchant configuration.
    pub fn from_config(config: &MerchantConfig) -> Result<Self> {
        Ok(Self::new(
            config.mch_id.clone(),
            config.serial_no.clone(),
            config.private_key()?,
        ))
    }

    /// Merchant id.
    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    /// Serial number of the merchant certificate.
    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }

    /// Sign an arbitrary message with the merchant key.
    pub fn sign(&self, message: &str) -> Result<String> {
        sign(message, &self.key)
    }

    /// Sign a request with a fresh timestamp and nonce.
    pub fn sign_request(&self, method: &str, path: &str, body: Option<&str>) -> Result<SignedRequest> {
        self.sign_request_at(
            method,
            path,
            body,
            unix_timestamp(),
            &create_nonce_str(NONCE_MAX_LEN),
        )
    }

    /// Sign a request with an explicit timestamp and nonce.
    pub fn sign_request_at(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
        timestamp: i64,
        nonce: &str,
    ) -> Result<SignedRequest> {
        let method = method.to_ascii_uppercase();
        let body = body.unwrap_or_default();
        let signature = self.sign(&canonical_string(&method, path, timestamp, nonce, body))?;
        let authorization =
            authorization_header(&self.mch_id, nonce, &signature, timestamp, &self.serial_no)?;

        tracing::debug!(mch_id = %self.mch_id, method = %method, path = %path, "signed request");

        Ok(SignedRequest {
            method,
            path: path.to_string(),
            timestamp,
            nonce: nonce.to_string(),
            body: body.to_string(),
            signature,
            authorization,
        })
    }

    /// Build signed payment parameters for a prepay id.
    pub fn mini_program_payment(&self, app_id: &str, prepay_id: &str) -> Result<MiniProgramPayment> {
        self.mini_program_payment_at(app_id, prepay_id, unix_timestamp(), &create_nonce_str(NONCE_MAX_LEN))
    }

    /// Like [`Self::mini_program_payment`] with an explicit timestamp and nonce.
    pub fn mini_program_payment_at(
        &self,
        app_id: &str,
        prepay_id: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Result<MiniProgramPayment> {
        let time_stamp = timestamp.to_string();
        let package = format!("prepay_id={}", prepay_id);
        let pay_sign = self.sign(&message(&[app_id, &time_stamp, nonce, &package]))?;
        Ok(MiniProgramPayment {
            app_id: app_id.to_string(),
            time_stamp,
            nonce_str: nonce.to_string(),
            package,
            sign_type: "RSA".to_string(),
            pay_sign,
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("mch_id", &self.mch_id)
            .field("serial_no", &self.serial_no)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, merchant_signer};

    #[test]
    fn test_canonical_string_layout() {
        assert_eq!(
            canonical_string("GET", "/v3/certificates", 1554208460, "593BEC0C930BF1AFEB40B4A08C8FB242", ""),
            "GET\n/v3/certificates\n1554208460\n593BEC0C930BF1AFEB40B4A08C8FB242\n\n"
        );
        assert_eq!(
            canonical_string("post", "/v3/pay/transactions/jsapi", 1, "n", "{\"a\":1}"),
            "POST\n/v3/pay/transactions/jsapi\n1\nn\n{\"a\":1}\n"
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let key = load_merchant_key();
        let msg = canonical_string("GET", "/v3/certificates", 1700000000, "abc", "");
        let signature = sign(&msg, &key).unwrap();

        assert!(verify(&msg, &signature, &key.to_public_key()));
        assert!(!verify(&format!("{}x", msg), &signature, &key.to_public_key()));
        assert!(!verify(&msg, "not base64!", &key.to_public_key()));
    }

    #[test]
    fn test_signature_is_deterministic() {
        // PKCS#1 v1.5 has no randomness
        let key = load_merchant_key();
        assert_eq!(sign("m\n", &key).unwrap(), sign("m\n", &key).unwrap());
    }

    #[test]
    fn test_authorization_header_format() {
        let header = authorization_header("1900009191", "n0nce", "c2ln", 1554208460, "1DDE55AD98ED71D6EDD4A4A16996DE7B47773A8C").unwrap();
        assert_eq!(
            header,
            "WECHATPAY2-SHA256-RSA2048 mchid=\"1900009191\",nonce_str=\"n0nce\",signature=\"c2ln\",timestamp=\"1554208460\",serial_no=\"1DDE55AD98ED71D6EDD4A4A16996DE7B47773A8C\""
        );
        assert!(!header.contains(", "));
    }

    #[test]
    fn test_authorization_header_rejects_quotes() {
        let err = authorization_header("19\"00", "n", "s", 1, "serial").unwrap_err();
        assert!(matches!(err, TrustError::InvalidData { ref field, .. } if field == "mchid"));
    }

    #[test]
    fn test_sign_request() {
        let signer = merchant_signer();
        let signed = signer
            .sign_request_at("get", "/v3/certificates", None, 1700000000, "NONCE")
            .unwrap();

        assert_eq!(signed.method, "GET");
        assert_eq!(signed.body, "");
        assert!(signed.authorization.starts_with(AUTH_SCHEME));
        assert!(signed.authorization.contains(&format!("signature=\"{}\"", signed.signature)));

        let msg = canonical_string("GET", "/v3/certificates", 1700000000, "NONCE", "");
        assert!(verify(&msg, &signed.signature, &load_merchant_key().to_public_key()));
    }

    #[test]
    fn test_sign_request_fresh_nonce() {
        let signer = merchant_signer();
        let a = signer.sign_request("POST", "/v3/x", Some("{}")).unwrap();
        let b = signer.sign_request("POST", "/v3/x", Some("{}")).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), NONCE_MAX_LEN);
    }

    #[test]
    fn test_mini_program_payment() {
        let signer = merchant_signer();
        let params = signer
            .mini_program_payment_at("wxd678efh567hg6787", "wx201410272009395522657a690389285100", 1414561699, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS")
            .unwrap();

        assert_eq!(params.package, "prepay_id=wx201410272009395522657a690389285100");
        assert_eq!(params.sign_type, "RSA");
        let msg = "wxd678efh567hg6787\n1414561699\n5K8264ILTKCH16CQ2502SI8ZNMTM67VS\nprepay_id=wx201410272009395522657a690389285100\n";
        assert!(verify(msg, &params.pay_sign, &load_merchant_key().to_public_key()));

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["timeStamp"], "1414561699");
        assert_eq!(json["paySign"], params.pay_sign.as_str());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", merchant_signer());
        assert!(debug.contains("mch_id"));
        assert!(!debug.contains("PRIVATE"));
    }

    fn load_merchant_key() -> RsaPrivateKey {
        keys::load_private_key(fixtures::MERCHANT_KEY_PEM).unwrap()
    }
}
