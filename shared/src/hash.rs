use crate::error::CryptoError;
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Hash de 256 bits usado para identificar blocos, transações e outros dados.
/// Serializa como hex minúsculo de 64 caracteres em JSON e no banco.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Creates a zeroed hash
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a 32-byte array
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the hash
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes double SHA-256 of the provided data
    #[must_use]
    pub fn double_sha256(data: &[u8]) -> Self {
        Self(sha256(&sha256(data)))
    }

    /// Decodifica um hash a partir de hex de 64 caracteres
    ///
    /// # Errors
    ///
    /// Retorna erro se a string não for hex válido de 32 bytes
    pub fn from_hex(hex_string: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_string)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidHex(format!("esperado 32 bytes: {hex_string}")))?;
        Ok(Self(array))
    }

    /// Renderiza o hash como hex minúsculo
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verifica se o hash atende à dificuldade
    /// (número de caracteres hex zero iniciais)
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_hex_zeros() >= difficulty
    }

    /// Conta o número de caracteres hex zero iniciais (nibbles)
    #[must_use]
    pub fn leading_hex_zeros(&self) -> u32 {
        let mut zeros = 0;
        for &byte in &self.0 {
            if byte == 0 {
                zeros += 2;
            } else if byte >> 4 == 0 {
                zeros += 1;
                break;
            } else {
                break;
            }
        }
        zeros
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash256 {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 simples
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Double SHA-256, como bytes crus
#[must_use]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(x)), usado na derivação de endereços
#[must_use]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_creation_and_display() {
        let hash = Hash256::zero();
        assert_eq!(
            hash.to_string(),
            "0000000000000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_double_sha256_known_vector() {
        // dSHA256("hello") — vetor conhecido do Bitcoin
        let hash = Hash256::double_sha256(b"hello");
        assert_eq!(
            hash.to_hex(),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash256::double_sha256(b"bespin");
        let parsed = Hash256::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);

        assert!(Hash256::from_hex("zz").is_err());
        assert!(Hash256::from_hex("abcd").is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = Hash256::double_sha256(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_leading_hex_zeros() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x0f;
        bytes[2] = 0xff;
        let hash = Hash256::from_bytes(bytes);
        // byte zero inteiro (2 nibbles) + nibble alto zero do segundo byte
        assert_eq!(hash.leading_hex_zeros(), 3);
        assert!(hash.meets_difficulty(3));
        assert!(!hash.meets_difficulty(4));
    }

    #[test]
    fn test_hash160_length() {
        let digest = hash160(b"public key bytes");
        assert_eq!(digest.len(), 20);
    }
}
