use crate::application_port::*;
use crate::domain_model::*;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

/// Stateless HS256 signer/verifier. Holds the shared secret as key
/// material built once at construction; consumers receive a handle, never
/// the secret itself.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        TokenSigner {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(format!("error while generating token: {e}")))
    }

    /// Signature plus expiry. Any routine failure (tamper, expiry, garbage
    /// input) collapses to `None`; callers on the request hot path treat
    /// that as "reject", not as an error to propagate.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Signature strictly enforced, expiry accepted up to `leeway_secs`
    /// past due. A signature failure here is escalated, not swallowed: an
    /// access token presented for refresh with a bad signature means
    /// tampering, not benign expiry.
    pub fn verify_ignoring_expiry(&self, token: &str, leeway_secs: u64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = leeway_secs;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Signing(format!("error while decoding token: {e}")))
    }
}
