pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{
    address_from_public_key, address_from_public_key_hex, verify_signature, KeyPair,
    SIGNATURE_SIZE,
};
pub use error::CryptoError;
pub use hash::{double_sha256, hash160, sha256, Hash256};
pub use types::{Amount, AmountError, BlockHeight, BlockId, Timestamp, TxId, COIN, DUST};
