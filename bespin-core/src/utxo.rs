use crate::error::{ChainError, ChainResult};
use crate::transaction::{OutPoint, Transaction, Utxo};
use shared::Amount;
use std::collections::{BTreeSet, HashMap};

/// Índice em memória das saídas não gastas, com índice reverso por
/// endereço. O conjunto `BTreeSet` do índice reverso dá aos chamadores
/// uma ordem determinística de seleção de moedas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoIndex {
    utxos: HashMap<OutPoint, Utxo>,
    by_address: HashMap<String, BTreeSet<OutPoint>>,
}

impl UtxoIndex {
    /// Cria um índice vazio
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Número de UTXOs no índice
    #[must_use]
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    /// Verifica se o índice está vazio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Insere um UTXO; idempotente para a mesma chave
    pub fn add(&mut self, utxo: Utxo) {
        self.by_address
            .entry(utxo.script_pubkey.clone())
            .or_default()
            .insert(utxo.outpoint);
        self.utxos.insert(utxo.outpoint, utxo);
    }

    /// Remove e devolve um UTXO, se presente
    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<Utxo> {
        let utxo = self.utxos.remove(outpoint)?;
        let now_empty = match self.by_address.get_mut(&utxo.script_pubkey) {
            Some(set) => {
                set.remove(outpoint);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_address.remove(&utxo.script_pubkey);
        }
        Some(utxo)
    }

    /// Consulta um UTXO sem removê-lo
    #[must_use]
    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.utxos.get(outpoint)
    }

    /// Verifica se um UTXO existe
    #[must_use]
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    /// Todos os UTXOs de um endereço, em ordem determinística de outpoint
    #[must_use]
    pub fn for_address(&self, address: &str) -> Vec<Utxo> {
        self.by_address
            .get(address)
            .map(|outpoints| {
                outpoints
                    .iter()
                    .filter_map(|outpoint| self.utxos.get(outpoint).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Saldo de um endereço
    #[must_use]
    pub fn balance(&self, address: &str) -> Amount {
        self.for_address(address)
            .iter()
            .fold(Amount::ZERO, |acc, utxo| acc.saturating_add(utxo.amount))
    }

    /// Valida uma transação sem aplicá-la: toda entrada referencia um
    /// UTXO existente e a soma das entradas cobre a das saídas. Coinbase
    /// é trivialmente válida aqui; o teto de recompensa é do ledger.
    ///
    /// # Errors
    ///
    /// Retorna erro de UTXO desconhecido, fundos insuficientes ou overflow
    pub fn validate(&self, tx: &Transaction) -> ChainResult<()> {
        if tx.is_coinbase() {
            return Ok(());
        }

        let mut total_input = Amount::ZERO;
        for input in &tx.inputs {
            let utxo = self
                .get(&input.outpoint())
                .ok_or(ChainError::UtxoNotFound(input.outpoint()))?;
            total_input = total_input
                .checked_add(utxo.amount)
                .ok_or_else(|| ChainError::Malformed("input value overflow".to_string()))?;
        }

        let total_output = tx.total_output_value()?;
        if total_input < total_output {
            return Err(ChainError::InsufficientFunds {
                available: total_input,
                required: total_output,
            });
        }

        Ok(())
    }

    /// Aplica uma transação: remove os UTXOs gastos e insere as saídas
    /// como novos UTXOs chaveados por `(txid, vout)`.
    ///
    /// Falha deixa estado parcial; os chamadores validam antes, sob o
    /// mesmo lock.
    ///
    /// # Errors
    ///
    /// Retorna erro se alguma entrada não referenciar um UTXO existente
    pub fn apply(&mut self, tx: &Transaction) -> ChainResult<()> {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                self.remove(&input.outpoint())
                    .ok_or(ChainError::UtxoNotFound(input.outpoint()))?;
            }
        }

        for (vout, output) in tx.outputs.iter().enumerate() {
            self.add(Utxo::new(
                tx.txid,
                vout as u32,
                output.amount,
                output.script_pubkey.clone(),
            ));
        }

        Ok(())
    }

    /// Cópia independente do índice, usada como sombra na admissão de
    /// blocos e na auditoria da cadeia
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxInput, TxOutput};
    use shared::{Hash256, COIN};

    fn utxo(tag: &str, vout: u32, sats: u64, address: &str) -> Utxo {
        Utxo::new(
            Hash256::double_sha256(tag.as_bytes()),
            vout,
            Amount::from_sats(sats),
            address.to_string(),
        )
    }

    #[test]
    fn test_add_get_remove() {
        let mut index = UtxoIndex::new();
        let utxo = utxo("a", 0, 5000, "addr-1");
        let outpoint = utxo.outpoint;

        index.add(utxo.clone());
        assert!(index.contains(&outpoint));
        assert_eq!(index.get(&outpoint).unwrap().amount, Amount::from_sats(5000));

        // idempotente
        index.add(utxo.clone());
        assert_eq!(index.len(), 1);

        let removed = index.remove(&outpoint).unwrap();
        assert_eq!(removed, utxo);
        assert!(!index.contains(&outpoint));
        assert!(index.remove(&outpoint).is_none());
    }

    #[test]
    fn test_address_index_and_balance() {
        let mut index = UtxoIndex::new();
        index.add(utxo("a", 0, 1000, "addr-1"));
        index.add(utxo("a", 1, 2000, "addr-1"));
        index.add(utxo("b", 0, 4000, "addr-2"));

        assert_eq!(index.balance("addr-1"), Amount::from_sats(3000));
        assert_eq!(index.balance("addr-2"), Amount::from_sats(4000));
        assert_eq!(index.balance("addr-3"), Amount::ZERO);
        assert_eq!(index.for_address("addr-1").len(), 2);

        // ordem determinística entre chamadas
        let first = index.for_address("addr-1");
        let second = index.for_address("addr-1");
        assert_eq!(first, second);
    }

    #[test]
    fn test_remove_cleans_address_index() {
        let mut index = UtxoIndex::new();
        let utxo = utxo("a", 0, 1000, "addr-1");
        let outpoint = utxo.outpoint;
        index.add(utxo);

        index.remove(&outpoint);
        assert!(index.for_address("addr-1").is_empty());
        assert_eq!(index.balance("addr-1"), Amount::ZERO);
    }

    #[test]
    fn test_validate_missing_utxo() {
        let index = UtxoIndex::new();
        let input = TxInput::new(Hash256::double_sha256(b"nope"), 0);
        let tx = Transaction::new(
            vec![input],
            vec![TxOutput::new(Amount::from_sats(1), "x".to_string())],
        )
        .unwrap();

        assert!(matches!(
            index.validate(&tx),
            Err(ChainError::UtxoNotFound(_))
        ));
    }

    #[test]
    fn test_validate_insufficient_funds() {
        let mut index = UtxoIndex::new();
        let funding = utxo("fund", 0, 100, "addr-1");
        let outpoint = funding.outpoint;
        index.add(funding);

        let tx = Transaction::new(
            vec![TxInput::new(outpoint.txid, outpoint.vout)],
            vec![TxOutput::new(Amount::from_sats(150), "addr-2".to_string())],
        )
        .unwrap();

        assert!(matches!(
            index.validate(&tx),
            Err(ChainError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_apply_spends_and_creates() {
        let mut index = UtxoIndex::new();
        let coinbase = Transaction::coinbase("miner", Amount::from_coins(50), 0).unwrap();
        index.apply(&coinbase).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.balance("miner"), Amount::from_coins(50));

        let spend = Transaction::new(
            vec![TxInput::new(coinbase.txid, 0)],
            vec![
                TxOutput::new(Amount::from_sats(10 * COIN), "addr-b".to_string()),
                TxOutput::new(Amount::from_sats(40 * COIN), "miner".to_string()),
            ],
        )
        .unwrap();

        index.validate(&spend).unwrap();
        index.apply(&spend).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.balance("miner"), Amount::from_coins(40));
        assert_eq!(index.balance("addr-b"), Amount::from_coins(10));
        assert!(!index.contains(&OutPoint::new(coinbase.txid, 0)));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut index = UtxoIndex::new();
        index.add(utxo("a", 0, 1000, "addr-1"));

        let snapshot = index.snapshot();
        index.remove(&utxo("a", 0, 1000, "addr-1").outpoint);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(index.len(), 0);
        assert_ne!(snapshot, index);
    }
}
