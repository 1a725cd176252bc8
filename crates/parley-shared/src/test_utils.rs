//! Shared fixtures for tests across the workspace.
//!
//! RSA key generation is slow, so a small set of keys is generated once per
//! test binary and cloned out.

use std::sync::OnceLock;

use crate::keys::KeyPair;
use crate::types::{Color, User};

const TEST_KEY_BITS: usize = 2048;

static KEYS: OnceLock<[KeyPair; 3]> = OnceLock::new();

fn keys() -> &'static [KeyPair; 3] {
    KEYS.get_or_init(|| {
        std::array::from_fn(|_| KeyPair::generate(TEST_KEY_BITS).expect("test key generation"))
    })
}

/// Two distinct keypairs, conventionally alice and bob.
pub fn test_keys() -> (KeyPair, KeyPair) {
    let [alice, bob, _] = keys();
    (alice.clone(), bob.clone())
}

/// A third keypair belonging to nobody in the conversation.
pub fn mallory_key() -> KeyPair {
    keys()[2].clone()
}

pub fn test_user(name: &str, color: Color, keys: &KeyPair) -> User {
    User::new(name, color, keys).expect("test user")
}
