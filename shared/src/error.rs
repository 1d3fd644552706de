use thiserror::Error;

/// Erros das primitivas criptográficas compartilhadas
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Chave inválida: {0}")]
    InvalidKey(String),

    #[error("Assinatura inválida")]
    InvalidSignature,

    #[error("Tamanho de assinatura inválido: esperado {expected}, recebido {actual}")]
    InvalidSignatureSize { expected: usize, actual: usize },

    #[error("Endereço inválido: {0}")]
    InvalidAddress(String),

    #[error("Hex inválido: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}

impl From<secp256k1::Error> for CryptoError {
    fn from(err: secp256k1::Error) -> Self {
        Self::InvalidKey(err.to_string())
    }
}
