//! HMAC-SHA256 bearer tokens.
//!
//! Format: `v1.<base64url(subject:expires_at)>.<base64url(mac)>` where the MAC
//! is HMAC-SHA256(key, domain || payload). Expiry is in whole seconds since
//! the Unix epoch.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use kennel_core::{Credential, PrincipalId};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CredentialError;
use crate::verifier::CredentialVerifier;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const MAC_DOMAIN: &[u8] = b"kennel.bearer.v1";

// ---------------------------------------------------------------------------
// TokenKey — symmetric signing key, zeroized on drop
// ---------------------------------------------------------------------------

pub struct TokenKey(Zeroizing<[u8; 32]>);

impl TokenKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Fresh random key from the OS RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(value: &str) -> Result<Self, &'static str> {
        let bytes = Zeroizing::new(hex::decode(value.trim()).map_err(|_| "token key must be hex")?);
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| "token key must be 32 bytes")?;
        Ok(Self::new(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(*self.0)
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// HmacCredentialVerifier
// ---------------------------------------------------------------------------

/// Issues and verifies HMAC-signed bearer tokens.
#[derive(Debug)]
pub struct HmacCredentialVerifier {
    key: TokenKey,
    default_ttl_secs: u64,
}

struct Claims {
    subject: String,
    expires_at: i64,
}

impl HmacCredentialVerifier {
    pub fn new(key: TokenKey, default_ttl_secs: u64) -> Self {
        Self {
            key,
            default_ttl_secs,
        }
    }

    /// Issue a token for `principal` valid for the configured lifetime.
    pub fn issue(&self, principal: &PrincipalId) -> Result<Credential, CredentialError> {
        let ttl = i64::try_from(self.default_ttl_secs).map_err(|_| CredentialError::Internal)?;
        self.issue_until(principal, now_secs().saturating_add(ttl))
    }

    /// Issue a token for `principal` that expires at `expires_at` (Unix seconds).
    pub fn issue_until(
        &self,
        principal: &PrincipalId,
        expires_at: i64,
    ) -> Result<Credential, CredentialError> {
        let payload = format!("{}:{}", principal.as_str(), expires_at);
        let mac = self.sign(payload.as_bytes())?;
        Ok(Credential::new(format!(
            "{}.{}.{}",
            TOKEN_VERSION,
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(mac)
        )))
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|_| CredentialError::Internal)?;
        mac.update(MAC_DOMAIN);
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Check the MAC and parse the payload. Does not check expiry.
    fn open(&self, credential: &Credential) -> Result<Claims, CredentialError> {
        let mut parts = credential.as_str().split('.');
        let (Some(version), Some(payload_b64), Some(mac_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError::Malformed);
        };
        if version != TOKEN_VERSION {
            return Err(CredentialError::Malformed);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| CredentialError::Malformed)?;
        let sig = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| CredentialError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|_| CredentialError::Internal)?;
        mac.update(MAC_DOMAIN);
        mac.update(&payload);
        mac.verify_slice(&sig)
            .map_err(|_| CredentialError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| CredentialError::Malformed)?;
        let (subject, expiry) = payload
            .rsplit_once(':')
            .ok_or(CredentialError::Malformed)?;
        let expires_at: i64 = expiry.parse().map_err(|_| CredentialError::Malformed)?;

        Ok(Claims {
            subject: subject.to_string(),
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialVerifier for HmacCredentialVerifier {
    async fn verify(&self, credential: &Credential) -> Result<(), CredentialError> {
        let claims = self.open(credential)?;
        if now_secs() > claims.expires_at {
            return Err(CredentialError::Expired);
        }
        Ok(())
    }

    async fn decode(&self, credential: &Credential) -> Result<PrincipalId, CredentialError> {
        let claims = self.open(credential)?;
        if claims.subject.is_empty() {
            return Err(CredentialError::EmptySubject);
        }
        Ok(PrincipalId::new(claims.subject))
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> HmacCredentialVerifier {
        HmacCredentialVerifier::new(TokenKey::new([0x42; 32]), 3600)
    }

    #[tokio::test]
    async fn test_issue_verify_decode() {
        let v = verifier();
        let token = v.issue(&PrincipalId::new("u1")).unwrap();
        assert!(token.as_str().starts_with("v1."));
        v.verify(&token).await.unwrap();
        assert_eq!(v.decode(&token).await.unwrap().as_str(), "u1");
    }

    #[tokio::test]
    async fn test_subject_may_contain_separator() {
        let v = verifier();
        let token = v.issue(&PrincipalId::new("tenant:u1")).unwrap();
        v.verify(&token).await.unwrap();
        assert_eq!(v.decode(&token).await.unwrap().as_str(), "tenant:u1");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let v = verifier();
        let token = v
            .issue_until(&PrincipalId::new("u1"), now_secs() - 10)
            .unwrap();
        assert_eq!(v.verify(&token).await, Err(CredentialError::Expired));
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let token = verifier().issue(&PrincipalId::new("u1")).unwrap();
        let other = HmacCredentialVerifier::new(TokenKey::new([0x43; 32]), 3600);
        assert_eq!(other.verify(&token).await, Err(CredentialError::BadSignature));
        assert_eq!(other.decode(&token).await, Err(CredentialError::BadSignature));
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let v = verifier();
        let token = v.issue(&PrincipalId::new("u1")).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(b"admin:99999999999");
        let forged = Credential::new(format!("{}.{}.{}", parts[0], forged_payload, parts[2]));
        assert_eq!(v.verify(&forged).await, Err(CredentialError::BadSignature));
    }

    #[tokio::test]
    async fn test_malformed_tokens_rejected() {
        let v = verifier();
        for raw in ["", "garbage", "v1.abc", "v2.a.b", "v1.a.b.c", "v1.!!!.###"] {
            let result = v.verify(&Credential::new(raw)).await;
            assert!(
                matches!(result, Err(CredentialError::Malformed)),
                "{raw:?} should be malformed, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_empty_subject_fails_decode_only() {
        let v = verifier();
        let token = v.issue(&PrincipalId::new("")).unwrap();
        v.verify(&token).await.unwrap();
        assert_eq!(v.decode(&token).await, Err(CredentialError::EmptySubject));
    }

    #[test]
    fn test_token_key_hex_roundtrip() {
        let key = TokenKey::generate();
        let restored = TokenKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.to_hex(), restored.to_hex());
    }

    #[test]
    fn test_token_key_rejects_bad_hex() {
        assert!(TokenKey::from_hex("zz").is_err());
        assert!(TokenKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_token_key_debug_is_redacted() {
        let key = TokenKey::new([0x11; 32]);
        assert!(!format!("{:?}", key).contains("1111"));
    }
}
