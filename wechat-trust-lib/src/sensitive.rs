//! RSA-OAEP encryption of sensitive request and response fields.
//!
//! Names, phone numbers and ID numbers travel encrypted: outbound fields
//! with the platform certificate's key, inbound fields with the merchant's
//! key. The platform uses OAEP with SHA-1 and MGF1-SHA-1.
//!
//! Requests carrying outbound encrypted fields must name the certificate in
//! a `Wechatpay-Serial` header.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::{Result, TrustError};

/// Encrypt `plaintext` for the holder of `key`, returning base64.
pub fn encrypt(plaintext: &str, key: &RsaPublicKey) -> Result<String> {
    let ciphertext = key
        .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), plaintext.as_bytes())
        .map_err(|e| TrustError::EncryptionFailed(format!("RSA-OAEP: {}", e)))?;
    Ok(STANDARD.encode(ciphertext))
}

/// Decrypt a base64 field encrypted for `key`.
pub fn decrypt(ciphertext_b64: &str, key: &RsaPrivateKey) -> Result<String> {
    let ciphertext = STANDARD.decode(ciphertext_b64.trim())?;
    let plaintext = key
        .decrypt(Oaep::new::<Sha1>(), &ciphertext)
        .map_err(|_| TrustError::DecryptionFailed("RSA-OAEP decryption failed".into()))?;
    String::from_utf8(plaintext).map_err(|_| TrustError::DecryptionFailed("field is not valid UTF-8".into()))
}

/// Decrypt a field received for `from` and encrypt it again for `to`.
pub fn reencrypt(ciphertext_b64: &str, from: &RsaPrivateKey, to: &RsaPublicKey) -> Result<String> {
    let plaintext = zeroize::Zeroizing::new(decrypt(ciphertext_b64, from)?);
    encrypt(&plaintext, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::keys::load_private_key;
    use crate::test_utils::fixtures;

    #[test]
    fn test_roundtrip() {
        let key = load_private_key(fixtures::MERCHANT_KEY_PEM).unwrap();
        let ciphertext = encrypt("张三", &key.to_public_key()).unwrap();
        assert_eq!(decrypt(&ciphertext, &key).unwrap(), "张三");
    }

    #[test]
    fn test_randomized() {
        let key = load_private_key(fixtures::MERCHANT_KEY_PEM).unwrap();
        let a = encrypt("13800138000", &key.to_public_key()).unwrap();
        let b = encrypt("13800138000", &key.to_public_key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let merchant = load_private_key(fixtures::MERCHANT_KEY_PEM).unwrap();
        let platform = load_private_key(fixtures::PLATFORM_A_KEY_PEM).unwrap();
        let ciphertext = encrypt("secret", &merchant.to_public_key()).unwrap();
        assert!(matches!(decrypt(&ciphertext, &platform), Err(TrustError::DecryptionFailed(_))));
        assert!(matches!(decrypt("@@@", &platform), Err(TrustError::InvalidData { .. })));
    }

    #[test]
    fn test_reencrypt_across_key_pairs() {
        let merchant = load_private_key(fixtures::MERCHANT_KEY_PEM).unwrap();
        let platform = load_private_key(fixtures::PLATFORM_A_KEY_PEM).unwrap();

        let inbound = encrypt("110101199003074477", &merchant.to_public_key()).unwrap();
        let outbound = reencrypt(&inbound, &merchant, &platform.to_public_key()).unwrap();

        assert_eq!(decrypt(&outbound, &platform).unwrap(), "110101199003074477");
        assert!(decrypt(&outbound, &merchant).is_err());
    }
}
