use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::constants::ID_SIGNATURE_CONSTANT;
use crate::crypto;
use crate::error::CryptoError;
use crate::types::UserId;

/// Derive the self-certifying id for a keypair: the base64 signature of a
/// fixed constant. Anyone holding the public key can check it.
pub fn generate_id(private_key: &RsaPrivateKey) -> Result<UserId, CryptoError> {
    let signature = crypto::sign(private_key, &ID_SIGNATURE_CONSTANT)?;
    Ok(UserId(STANDARD.encode(signature)))
}

/// True if `id` is a valid signature of the id constant under `public_key`.
pub fn validate_id(id: &UserId, public_key: &RsaPublicKey) -> bool {
    match STANDARD.decode(id.as_str()) {
        Ok(signature) => crypto::verify(public_key, &ID_SIGNATURE_CONSTANT, &signature),
        Err(_) => false,
    }
}
