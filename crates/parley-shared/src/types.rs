use serde::{Deserialize, Serialize};

use crate::constants::MAX_NAME_LEN;
use crate::error::{ParleyError, ValidationError};
use crate::identity::{generate_id, validate_id};
use crate::keys::KeyPair;

// User identity = base64 RSA signature of a fixed constant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed palette a user may pick their display color from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Color {
    #[default]
    Gray = 0x00,
    White = 0x01,
    Red = 0x02,
    Blue = 0x03,
    Green = 0x04,
    Magenta = 0x05,
    Cyan = 0x06,
    Yellow = 0x07,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Gray,
        Color::White,
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Magenta,
        Color::Cyan,
        Color::Yellow,
    ];

    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.get(b as usize).copied()
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Gray => "gray",
            Color::White => "white",
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Magenta => "magenta",
            Color::Cyan => "cyan",
            Color::Yellow => "yellow",
        }
    }

    /// Parse a color name, case-insensitively. An empty name means gray.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Ok(Color::Gray);
        }
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or(ValidationError::InvalidColor(name))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A chat participant as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub name: String,
    pub color: Color,
    pub id: UserId,
}

// Wire form; color stays a raw byte so an out-of-range value is a validation
// failure rather than a decode failure.
#[derive(Serialize, Deserialize)]
struct UserRecord {
    name: String,
    color: u8,
    id: String,
}

impl User {
    /// Build the local user, deriving its id from `keys`.
    pub fn new(name: impl Into<String>, color: Color, keys: &KeyPair) -> Result<Self, ParleyError> {
        let name = name.into();
        check_name(&name)?;
        let id = generate_id(keys.private_key())?;
        Ok(Self { name, color, id })
    }

    /// Author of locally generated notices. Never sent to a peer.
    pub fn system() -> Self {
        Self {
            name: "system".to_string(),
            color: Color::Gray,
            id: UserId::default(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.id.0.is_empty() && self.name == "system"
    }

    /// Check a remote user record against the public key its peer presented.
    pub fn validate(&self, peer_public_key: &rsa::RsaPublicKey) -> Result<(), ValidationError> {
        check_name(&self.name)?;
        if !validate_id(&self.id, peer_public_key) {
            return Err(ValidationError::InvalidId);
        }
        Ok(())
    }

    /// Serialize to binary (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, ValidationError> {
        let record = UserRecord {
            name: self.name.clone(),
            color: self.color.as_byte(),
            id: self.id.0.clone(),
        };
        bincode::serialize(&record).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Deserialize from binary
    pub fn from_bytes(data: &[u8]) -> Result<Self, ValidationError> {
        let record: UserRecord =
            bincode::deserialize(data).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let color = Color::from_byte(record.color)
            .ok_or_else(|| ValidationError::InvalidColor(format!("{:#04x}", record.color)))?;
        Ok(Self {
            name: record.name,
            color,
            id: UserId(record.id),
        })
    }
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong(name.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_keys;

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse("").unwrap(), Color::Gray);
        assert_eq!(Color::parse("RED").unwrap(), Color::Red);
        assert_eq!(Color::parse(" Cyan ").unwrap(), Color::Cyan);
        assert!(matches!(
            Color::parse("orange"),
            Err(ValidationError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_color_bytes() {
        for color in Color::ALL {
            assert_eq!(Color::from_byte(color.as_byte()), Some(color));
            assert_eq!(Color::parse(color.name()).unwrap(), color);
        }
        assert_eq!(Color::from_byte(8), None);
    }

    #[test]
    fn test_user_roundtrip_and_validate() {
        let (alice, _) = test_keys();
        let user = User::new("alice", Color::Green, &alice).unwrap();

        let bytes = user.to_bytes().unwrap();
        let restored = User::from_bytes(&bytes).unwrap();

        assert_eq!(restored, user);
        assert!(restored.validate(alice.public_key()).is_ok());
    }

    #[test]
    fn test_user_with_foreign_id_rejected() {
        let (alice, bob) = test_keys();
        let user = User::new("alice", Color::Green, &alice).unwrap();
        assert_eq!(
            user.validate(bob.public_key()),
            Err(ValidationError::InvalidId)
        );
    }

    #[test]
    fn test_name_too_long() {
        let (alice, _) = test_keys();
        assert!(User::new("a".repeat(64), Color::Gray, &alice).is_ok());
        assert!(matches!(
            User::new("a".repeat(65), Color::Gray, &alice),
            Err(ParleyError::Validation(ValidationError::NameTooLong(65)))
        ));

        let mut user = User::new("alice", Color::Gray, &alice).unwrap();
        user.name = "b".repeat(100);
        let restored = User::from_bytes(&user.to_bytes().unwrap()).unwrap();
        assert_eq!(
            restored.validate(alice.public_key()),
            Err(ValidationError::NameTooLong(100))
        );
    }

    #[test]
    fn test_out_of_range_color_rejected() {
        let record = UserRecord {
            name: "mallory".to_string(),
            color: 0x09,
            id: String::new(),
        };
        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(
            User::from_bytes(&bytes),
            Err(ValidationError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_garbage_record_rejected() {
        assert!(matches!(
            User::from_bytes(&[0xff; 3]),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_system_user() {
        assert!(User::system().is_system());
        let (alice, _) = test_keys();
        assert!(!User::new("system", Color::Gray, &alice).unwrap().is_system());
    }
}
