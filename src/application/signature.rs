use crate::error::{EngineError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA-512 over the exact raw webhook body, hex encoded.
#[derive(Clone)]
pub struct WebhookSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigner").finish_non_exhaustive()
    }
}

impl WebhookSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha512> {
        HmacSha512::new_from_slice(&self.secret)
            .map_err(|e| EngineError::InternalError(std::io::Error::other(e.to_string()).into()))
    }

    pub fn sign(&self, body: &[u8]) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `signature` against the body bytes as received. The body must
    /// not be re-serialized first: JSON round-trips are not byte-stable.
    ///
    /// Only the exact lowercase hex encoding is accepted; no trimming or
    /// case folding.
    pub fn verify(&self, signature: &str, body: &[u8]) -> Result<()> {
        if !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(EngineError::InvalidSignature);
        }
        let provided = hex::decode(signature).map_err(|_| EngineError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| EngineError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let signer = WebhookSigner::new("key");
        let sig = signer
            .sign(b"The quick brown fox jumps over the lazy dog")
            .unwrap();
        assert_eq!(
            sig,
            "b42af09057bac1e2d41708e48a902e09b5ff7f12ab428a4fe86653c73dd248fb\
             82f948a549f7b791a5b41915ee4d1ec3935357e4e2317250d0372afa2ebeeb3a"
        );
    }

    #[test]
    fn test_verify_round_trip_and_tamper() {
        let signer = WebhookSigner::new("sk_test_secret");
        let body = br#"{"event":"charge.success","data":{"reference":"R1"}}"#;
        let sig = signer.sign(body).unwrap();
        assert!(signer.verify(&sig, body).is_ok());

        let tampered = br#"{"event":"charge.success","data":{"reference":"R2"}}"#;
        assert!(matches!(
            signer.verify(&sig, tampered),
            Err(EngineError::InvalidSignature)
        ));
        assert!(matches!(
            signer.verify("not-hex", body),
            Err(EngineError::InvalidSignature)
        ));
    }

    #[test]
    fn test_only_exact_lowercase_hex_verifies() {
        let signer = WebhookSigner::new("sk_test_secret");
        let body = br#"{"event":"charge.success","data":{"reference":"R1"}}"#;
        let sig = signer.sign(body).unwrap();
        for variant in [sig.to_uppercase(), format!(" {sig}"), format!("{sig}\n")] {
            assert!(matches!(
                signer.verify(&variant, body),
                Err(EngineError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn test_reserialized_body_does_not_verify() {
        let signer = WebhookSigner::new("secret");
        let raw = b"{\"event\": \"charge.success\",  \"data\": {}}";
        let sig = signer.sign(raw).unwrap();
        let value: serde_json::Value = serde_json::from_slice(raw).unwrap();
        let reserialized = serde_json::to_vec(&value).unwrap();
        assert!(signer.verify(&sig, &reserialized).is_err());
    }
}
