//! Carteiras ECDSA sobre secp256k1 e derivação de endereços base58check

use crate::error::CryptoError;
use crate::hash::{double_sha256, hash160, sha256};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

/// Tamanho da assinatura compacta r||s (sem DER)
pub const SIGNATURE_SIZE: usize = 64;

/// Byte de versão dos endereços (0x00, mainnet)
const ADDRESS_VERSION: u8 = 0x00;

/// Par de chaves secp256k1 com endereço derivado
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: String,
}

impl KeyPair {
    /// Gera um novo par de chaves aleatório
    #[must_use]
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        let address = address_from_public_key(&public_key);
        Self {
            secret_key,
            public_key,
            address,
        }
    }

    /// Reconstrói o par de chaves a partir da chave privada em hex
    ///
    /// # Errors
    ///
    /// Retorna erro se o hex não representar uma chave secp256k1 válida
    pub fn from_private_hex(private_hex: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex::decode(private_hex.trim())?);
        let secret_key = SecretKey::from_slice(&bytes)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let address = address_from_public_key(&public_key);
        Ok(Self {
            secret_key,
            public_key,
            address,
        })
    }

    /// Endereço base58check derivado da chave pública
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Chave pública SEC1 não-comprimida (65 bytes) em hex
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    /// Chave privada em hex; o buffer é zerado ao sair de escopo
    #[must_use]
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret_key.secret_bytes()))
    }

    /// Assina a mensagem: ECDSA sobre o digest SHA-256, serialização
    /// compacta r||s de 64 bytes
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let secp = Secp256k1::new();
        let digest = Message::from_digest(sha256(message));
        secp.sign_ecdsa(&digest, &self.secret_key).serialize_compact()
    }
}

/// Verifica uma assinatura compacta contra a chave pública em hex.
/// A mensagem passa pelo mesmo digest SHA-256 usado na assinatura.
///
/// # Errors
///
/// Retorna erro se a chave ou a assinatura forem malformadas; uma
/// assinatura bem-formada que não confere resulta em `Ok(false)`
pub fn verify_signature(
    public_key_hex: &str,
    signature: &[u8],
    message: &[u8],
) -> Result<bool, CryptoError> {
    let key_bytes = hex::decode(public_key_hex)?;
    let public_key = PublicKey::from_slice(&key_bytes)?;

    if signature.len() != SIGNATURE_SIZE {
        return Err(CryptoError::InvalidSignatureSize {
            expected: SIGNATURE_SIZE,
            actual: signature.len(),
        });
    }
    let signature =
        Signature::from_compact(signature).map_err(|_| CryptoError::InvalidSignature)?;

    let secp = Secp256k1::verification_only();
    let digest = Message::from_digest(sha256(message));
    Ok(secp.verify_ecdsa(&digest, &signature, &public_key).is_ok())
}

/// Deriva o endereço base58check de uma chave pública:
/// `base58(0x00 || hash160(pubkey) || checksum)` com checksum de
/// 4 bytes de double SHA-256
#[must_use]
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&hash160(&public_key.serialize_uncompressed()));

    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum[..4]);

    bs58::encode(payload).into_string()
}

/// Deriva o endereço a partir da chave pública em hex
///
/// # Errors
///
/// Retorna erro se o hex não representar uma chave secp256k1 válida
pub fn address_from_public_key_hex(public_key_hex: &str) -> Result<String, CryptoError> {
    let key_bytes = hex::decode(public_key_hex)?;
    let public_key = PublicKey::from_slice(&key_bytes)?;
    Ok(address_from_public_key(&public_key))
}
