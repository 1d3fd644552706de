use crate::transaction::OutPoint;
use shared::{Amount, CryptoError};
use thiserror::Error;

/// Erros do núcleo de consenso, na taxonomia vista pelos chamadores:
/// entrada malformada, criptografia, UTXO, gasto duplo, consenso,
/// submissão obsoleta, armazenamento e invariante interna violada.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("UTXO not found: {0}")]
    UtxoNotFound(OutPoint),

    #[error("Insufficient funds: {available} < {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    #[error("Double spend detected in mempool")]
    MempoolDoubleSpend,

    #[error("Invalid proof of work")]
    InvalidProofOfWork,

    #[error("Invalid difficulty: expected {expected}, got {got}")]
    WrongDifficulty { expected: u32, got: u32 },

    #[error("Invalid merkle root")]
    InvalidMerkleRoot,

    #[error("Invalid previous hash")]
    InvalidLinkage,

    #[error("Invalid block index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("Block {0} already exists")]
    BlockExists(u64),

    #[error("Coinbase pays {paid}, scheduled reward is {cap}")]
    ExcessiveCoinbase { paid: Amount, cap: Amount },

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Alias para Result com `ChainError`
pub type ChainResult<T> = std::result::Result<T, ChainError>;
