use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::constants::{
    CHALLENGE_SIZE, MAX_KDF_ROUNDS, MIN_CIPHERTEXT_SIZE, NONCE_SIZE, SALT_SIZE,
    SYMMETRIC_KEY_SIZE,
};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

/// Size of the `[rounds][salt]` header in front of a password-sealed blob.
pub const SEALED_HEADER_SIZE: usize = 4 + SALT_SIZE;

pub fn generate_symmetric_key() -> SymmetricKey {
    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

/// 16 random bytes, used for handshake challenges and KDF salts.
pub fn generate_nonce() -> [u8; CHALLENGE_SIZE] {
    let mut nonce = [0u8; CHALLENGE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if key.len() != SYMMETRIC_KEY_SIZE {
        return Err(CryptoError::InvalidKeySize {
            expected: SYMMETRIC_KEY_SIZE,
            got: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::CipherInit(e.to_string()))
}

// Returns nonce || ciphertext || tag (12 bytes nonce prepended)
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::CipherInit(e.to_string()))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    if data.len() < MIN_CIPHERTEXT_SIZE {
        return Err(CryptoError::Truncated {
            min: MIN_CIPHERTEXT_SIZE,
            got: data.len(),
        });
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// PKCS#1 v1.5 encryption. Only meant for short secrets (session keys, challenges).
pub fn rsa_encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(|e| CryptoError::Asymmetric(e.to_string()))
}

pub fn rsa_decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    private_key
        .decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|e| CryptoError::Asymmetric(e.to_string()))
}

/// SHA-256 + PKCS#1 v1.5 signature.
pub fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let digest = Sha256::digest(message);
    private_key
        .sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::Asymmetric(e.to_string()))
}

pub fn verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let digest = Sha256::digest(message);
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .is_ok()
}

/// Iterated SHA-256 password stretching: k0 = password, ki = H(k(i-1) || salt).
pub fn derive_key(password: &[u8], salt: &[u8], rounds: u32) -> Result<SymmetricKey, CryptoError> {
    if rounds == 0 || rounds > MAX_KDF_ROUNDS {
        return Err(CryptoError::InvalidRounds {
            max: MAX_KDF_ROUNDS,
        });
    }

    let mut key: SymmetricKey = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .finalize()
        .into();
    for _ in 1..rounds {
        let next: SymmetricKey = Sha256::new()
            .chain_update(key)
            .chain_update(salt)
            .finalize()
            .into();
        key.zeroize();
        key = next;
    }
    Ok(key)
}

/// Seal `plaintext` under a password. Output: `[rounds u32 LE][salt][nonce || ciphertext]`.
pub fn seal_with_password(
    password: &[u8],
    plaintext: &[u8],
    rounds: u32,
) -> Result<Vec<u8>, CryptoError> {
    let salt = generate_nonce();
    let mut key = derive_key(password, &salt, rounds)?;
    let ciphertext = encrypt(&key, plaintext);
    key.zeroize();
    let ciphertext = ciphertext?;

    let mut output = Vec::with_capacity(SEALED_HEADER_SIZE + ciphertext.len());
    output.extend_from_slice(&rounds.to_le_bytes());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Inverse of [`seal_with_password`]; the round count is read from the blob.
pub fn open_with_password(password: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let min = SEALED_HEADER_SIZE + MIN_CIPHERTEXT_SIZE;
    if sealed.len() < min {
        return Err(CryptoError::Truncated {
            min,
            got: sealed.len(),
        });
    }

    let (rounds_bytes, rest) = sealed.split_at(4);
    let (salt, ciphertext) = rest.split_at(SALT_SIZE);
    let mut rounds_buf = [0u8; 4];
    rounds_buf.copy_from_slice(rounds_bytes);
    let rounds = u32::from_le_bytes(rounds_buf);

    let mut key = derive_key(password, salt, rounds)?;
    let plaintext = decrypt(&key, ciphertext);
    key.zeroize();
    plaintext
}
