pub mod block;
pub mod blockchain;
pub mod canonical;
pub mod error;
pub mod merkle;
pub mod mining;
pub mod network;
pub mod store;
pub mod transaction;
pub mod utxo;

// Re-exports principais
pub use block::{Block, BlockHeader};
pub use blockchain::{Blockchain, NetworkParams, NodeInfo};
pub use error::{ChainError, ChainResult};
pub use merkle::{MerkleTree, ProofStep};
pub use mining::{Miner, WorkTemplate};
pub use network::{handle_message, Message};
pub use store::{ChainStore, MinerStat};
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput, Utxo};
pub use utxo::UtxoIndex;

// Re-exports de tipos compartilhados
pub use shared::{Amount, Hash256, KeyPair, TxId};
