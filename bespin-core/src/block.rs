use crate::canonical::to_canonical_json;
use crate::error::ChainResult;
use crate::merkle::MerkleTree;
use crate::transaction::Transaction;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{Hash256, Timestamp, TxId};

/// Cabeçalho do bloco; o hash do bloco é o double SHA-256 da sua
/// codificação canônica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Versão do bloco
    pub version: u32,
    /// Altura do bloco na cadeia
    pub index: u64,
    /// Timestamp em milissegundos Unix
    pub timestamp: Timestamp,
    /// Hash do bloco anterior
    pub previous_hash: Hash256,
    /// Merkle root dos txids das transações
    pub merkle_root: Hash256,
    /// Dificuldade alvo (caracteres hex zero iniciais requeridos)
    pub difficulty: u32,
    /// Nonce de mineração
    pub nonce: u64,
}

impl BlockHeader {
    /// Calcula o hash do cabeçalho
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn hash(&self) -> ChainResult<Hash256> {
        Ok(Hash256::double_sha256(&to_canonical_json(self)?))
    }
}

/// Bloco completo: cabeçalho, hash materializado e transações, com a
/// coinbase em primeiro. Serializa achatado (campos do cabeçalho no
/// nível do bloco), o formato dos pares e da RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    pub hash: Hash256,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Monta um bloco não minerado (nonce zero) sobre as transações
    /// dadas, derivando o merkle root e o hash inicial
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: Hash256,
        difficulty: u32,
    ) -> ChainResult<Self> {
        let tx_ids: Vec<TxId> = transactions.iter().map(|tx| tx.txid).collect();
        let header = BlockHeader {
            version: 1,
            index,
            timestamp: Utc::now().timestamp_millis(),
            previous_hash,
            merkle_root: MerkleTree::new(tx_ids).root(),
            difficulty,
            nonce: 0,
        };
        let hash = header.hash()?;
        Ok(Self {
            header,
            hash,
            transactions,
        })
    }

    /// Rederiva o hash do cabeçalho (não confia no campo `hash`)
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn calculate_hash(&self) -> ChainResult<Hash256> {
        self.header.hash()
    }

    /// Recalcula o merkle root a partir das transações e compara com o
    /// cabeçalho
    #[must_use]
    pub fn verify_merkle_root(&self) -> bool {
        let tx_ids: Vec<TxId> = self.transactions.iter().map(|tx| tx.txid).collect();
        MerkleTree::new(tx_ids).root() == self.header.merkle_root
    }

    /// Busca o nonce que satisfaz a dificuldade do cabeçalho
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn mine(&mut self) -> ChainResult<()> {
        while !self.hash.meets_difficulty(self.header.difficulty) {
            self.header.nonce += 1;
            self.hash = self.header.hash()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Amount;

    fn sample_block(difficulty: u32) -> Block {
        let coinbase = Transaction::coinbase("miner", Amount::from_coins(50), 0).unwrap();
        Block::new(0, vec![coinbase], Hash256::zero(), difficulty).unwrap()
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block(1);
        assert_eq!(block.calculate_hash().unwrap(), block.hash);
        assert_eq!(block.calculate_hash().unwrap(), block.calculate_hash().unwrap());
    }

    #[test]
    fn test_nonce_changes_hash() {
        let mut block = sample_block(1);
        let original = block.hash;
        block.header.nonce += 1;
        assert_ne!(block.calculate_hash().unwrap(), original);
    }

    #[test]
    fn test_mine_satisfies_difficulty() {
        let mut block = sample_block(1);
        block.mine().unwrap();

        assert!(block.hash.meets_difficulty(1));
        assert_eq!(block.calculate_hash().unwrap(), block.hash);
    }

    #[test]
    fn test_merkle_root_matches_transactions() {
        let coinbase = Transaction::coinbase("miner", Amount::from_coins(50), 1).unwrap();
        let other = Transaction::coinbase("other", Amount::from_coins(50), 2).unwrap();
        let mut block = Block::new(1, vec![coinbase, other], Hash256::zero(), 1).unwrap();

        assert!(block.verify_merkle_root());

        block.transactions.pop();
        assert!(!block.verify_merkle_root());
    }

    #[test]
    fn test_wire_format_is_flat() {
        let block = sample_block(1);
        let value = serde_json::to_value(&block).unwrap();

        // campos do cabeçalho aparecem no nível do bloco
        assert!(value.get("index").is_some());
        assert!(value.get("previous_hash").is_some());
        assert!(value.get("merkle_root").is_some());
        assert!(value.get("hash").is_some());
        assert!(value.get("header").is_none());

        let round: Block = serde_json::from_value(value).unwrap();
        assert_eq!(round, block);
    }
}
