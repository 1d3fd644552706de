use crate::canonical::to_canonical_json;
use crate::error::{ChainError, ChainResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{Amount, Hash256, Timestamp, TxId};
use std::fmt;

/// Valor de `vout` que marca a entrada de coinbase
pub const COINBASE_VOUT: u32 = 0xFFFF_FFFF;

/// Número de sequência padrão das entradas
const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Referência a uma saída de transação, chave única de um UTXO
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OutPoint {
    /// Transação que criou a saída
    pub txid: TxId,
    /// Índice da saída naquela transação
    pub vout: u32,
}

impl OutPoint {
    /// Cria uma nova referência de saída
    #[must_use]
    pub const fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Entrada de transação: referencia o UTXO gasto e carrega o script de
/// desbloqueio (`assinatura_hex ":" chave_pública_hex` em gastos comuns,
/// uma etiqueta arbitrária na coinbase)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Transação anterior, dona da saída gasta
    pub prev_txid: TxId,
    /// Índice da saída gasta
    pub vout: u32,
    /// Script de desbloqueio
    pub script_sig: String,
    /// Número de sequência
    pub sequence: u32,
}

impl TxInput {
    /// Cria uma entrada ainda sem assinatura
    #[must_use]
    pub fn new(prev_txid: TxId, vout: u32) -> Self {
        Self {
            prev_txid,
            vout,
            script_sig: String::new(),
            sequence: DEFAULT_SEQUENCE,
        }
    }

    /// Cria a entrada de coinbase de um bloco; a etiqueta com a altura
    /// diferencia os txids de coinbase entre blocos
    #[must_use]
    pub fn coinbase(block_height: u64) -> Self {
        Self {
            prev_txid: Hash256::zero(),
            vout: COINBASE_VOUT,
            script_sig: format!("coinbase_block_{block_height}"),
            sequence: DEFAULT_SEQUENCE,
        }
    }

    /// Verifica se esta entrada é de coinbase
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.prev_txid == Hash256::zero() && self.vout == COINBASE_VOUT
    }

    /// Referência da saída sendo gasta
    #[must_use]
    pub const fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.prev_txid, self.vout)
    }
}

/// Saída de transação: valor e endereço de bloqueio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Valor em satoshis
    pub amount: Amount,
    /// Endereço do destinatário (script de bloqueio P2PKH)
    pub script_pubkey: String,
}

impl TxOutput {
    /// Cria uma nova saída
    #[must_use]
    pub const fn new(amount: Amount, script_pubkey: String) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }
}

/// Saída não gasta, indexada por `(txid, vout)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    #[serde(flatten)]
    pub outpoint: OutPoint,
    pub amount: Amount,
    pub script_pubkey: String,
}

impl Utxo {
    /// Cria um novo UTXO
    #[must_use]
    pub const fn new(txid: TxId, vout: u32, amount: Amount, script_pubkey: String) -> Self {
        Self {
            outpoint: OutPoint::new(txid, vout),
            amount,
            script_pubkey,
        }
    }
}

/// Transação no estilo Bitcoin, com entradas e saídas.
///
/// O `txid` é derivado da codificação canônica com os `script_sig`
/// não-coinbase vazios e é estável: assinaturas são produzidas e
/// armazenadas DEPOIS da derivação e não o realimentam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
    /// Momento de criação, em milissegundos Unix
    pub timestamp: Timestamp,
    pub txid: TxId,
}

/// Corpo canônico da transação: tudo menos o `txid`
#[derive(Serialize)]
struct TxPayload<'a> {
    version: u32,
    inputs: &'a [TxInput],
    outputs: &'a [TxOutput],
    locktime: u32,
    timestamp: Timestamp,
}

impl Transaction {
    /// Cria uma transação e deriva seu `txid`
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> ChainResult<Self> {
        let mut tx = Self {
            version: 1,
            inputs,
            outputs,
            locktime: 0,
            timestamp: Utc::now().timestamp_millis(),
            txid: Hash256::zero(),
        };
        tx.txid = tx.compute_txid()?;
        Ok(tx)
    }

    /// Cria a transação de coinbase de um bloco (recompensa de mineração)
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn coinbase(recipient: &str, amount: Amount, block_height: u64) -> ChainResult<Self> {
        Self::new(
            vec![TxInput::coinbase(block_height)],
            vec![TxOutput::new(amount, recipient.to_string())],
        )
    }

    /// Verifica se é uma transação de coinbase
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Corpo canônico sem o txid; em transações comuns os `script_sig`
    /// entram vazios, na coinbase a etiqueta é preservada
    fn unsigned_payload(&self) -> ChainResult<Vec<u8>> {
        let cleared: Vec<TxInput>;
        let inputs: &[TxInput] = if self.is_coinbase() {
            &self.inputs
        } else {
            cleared = self
                .inputs
                .iter()
                .map(|input| TxInput {
                    script_sig: String::new(),
                    ..input.clone()
                })
                .collect();
            &cleared
        };

        to_canonical_json(&TxPayload {
            version: self.version,
            inputs,
            outputs: &self.outputs,
            locktime: self.locktime,
            timestamp: self.timestamp,
        })
    }

    /// Deriva o identificador da transação (double SHA-256 do corpo
    /// canônico). Rederivável após a assinatura, já que os `script_sig`
    /// não participam
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn compute_txid(&self) -> ChainResult<TxId> {
        Ok(Hash256::double_sha256(&self.unsigned_payload()?))
    }

    /// Rejeita transações cujo `txid` declarado não rederiva do conteúdo
    ///
    /// # Errors
    ///
    /// Retorna erro de entrada malformada em caso de divergência
    pub fn check_txid(&self) -> ChainResult<()> {
        let derived = self.compute_txid()?;
        if derived != self.txid {
            return Err(ChainError::Malformed(format!(
                "txid {} does not rederive from contents (expected {derived})",
                self.txid
            )));
        }
        Ok(())
    }

    /// Bytes assinados para a entrada `input_index`.
    ///
    /// Convenção única nos caminhos de assinatura e verificação: todos os
    /// `script_sig` vazios, então a imagem é idêntica para qualquer índice.
    /// O índice é validado apenas para manter o contrato por entrada.
    ///
    /// # Errors
    ///
    /// Retorna erro se o índice estiver fora do intervalo ou a
    /// serialização falhar
    pub fn signing_image(&self, input_index: usize) -> ChainResult<Vec<u8>> {
        if input_index >= self.inputs.len() {
            return Err(ChainError::Malformed(format!(
                "input index {input_index} out of range ({} inputs)",
                self.inputs.len()
            )));
        }
        self.unsigned_payload()
    }

    /// Soma dos valores das saídas
    ///
    /// # Errors
    ///
    /// Retorna erro se houver overflow
    pub fn total_output_value(&self) -> ChainResult<Amount> {
        let mut total = Amount::ZERO;
        for output in &self.outputs {
            total = total
                .checked_add(output.amount)
                .ok_or_else(|| ChainError::Malformed("output value overflow".to_string()))?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::COIN;

    fn spend_tx() -> Transaction {
        let prev = Hash256::double_sha256(b"previous");
        let inputs = vec![TxInput::new(prev, 0), TxInput::new(prev, 1)];
        let outputs = vec![TxOutput::new(
            Amount::from_sats(10 * COIN),
            "recipient-address".to_string(),
        )];
        Transaction::new(inputs, outputs).unwrap()
    }

    #[test]
    fn test_coinbase_recognition() {
        let coinbase = Transaction::coinbase("miner", Amount::from_coins(50), 7).unwrap();

        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.inputs.len(), 1);
        assert_eq!(coinbase.inputs[0].script_sig, "coinbase_block_7");
        assert_eq!(coinbase.inputs[0].vout, COINBASE_VOUT);
        assert!(!spend_tx().is_coinbase());
    }

    #[test]
    fn test_txid_is_stable_under_signing() {
        let mut tx = spend_tx();
        let original = tx.txid;

        tx.inputs[0].script_sig = "deadbeef:cafebabe".to_string();
        tx.inputs[1].script_sig = "0123:4567".to_string();

        assert_eq!(tx.compute_txid().unwrap(), original);
        assert!(tx.check_txid().is_ok());
    }

    #[test]
    fn test_txid_rederivation_detects_tampering() {
        let mut tx = spend_tx();
        tx.outputs[0].amount = Amount::from_sats(1);

        assert!(matches!(tx.check_txid(), Err(ChainError::Malformed(_))));
    }

    #[test]
    fn test_coinbase_tag_seeds_txid() {
        let a = Transaction::coinbase("miner", Amount::from_coins(50), 1).unwrap();
        let b = Transaction::coinbase("miner", Amount::from_coins(50), 2).unwrap();
        assert_ne!(a.txid, b.txid);
    }

    #[test]
    fn test_signing_image_is_index_independent() {
        let mut tx = spend_tx();
        tx.inputs[0].script_sig = "aa:bb".to_string();

        let image0 = tx.signing_image(0).unwrap();
        let image1 = tx.signing_image(1).unwrap();
        assert_eq!(image0, image1);

        // a imagem não contém a assinatura já preenchida
        let rendered = String::from_utf8(image0).unwrap();
        assert!(!rendered.contains("aa:bb"));
    }

    #[test]
    fn test_signing_image_bounds_check() {
        let tx = spend_tx();
        assert!(matches!(tx.signing_image(2), Err(ChainError::Malformed(_))));
    }

    #[test]
    fn test_output_overflow_is_rejected() {
        let prev = Hash256::double_sha256(b"prev");
        let outputs = vec![
            TxOutput::new(Amount::from_sats(u64::MAX), "a".to_string()),
            TxOutput::new(Amount::from_sats(1), "b".to_string()),
        ];
        let tx = Transaction::new(vec![TxInput::new(prev, 0)], outputs).unwrap();
        assert!(tx.total_output_value().is_err());
    }

    #[test]
    fn test_canonical_payload_has_sorted_keys() {
        let tx = spend_tx();
        let image = String::from_utf8(tx.signing_image(0).unwrap()).unwrap();
        let inputs_at = image.find("\"inputs\"").unwrap();
        let locktime_at = image.find("\"locktime\"").unwrap();
        let outputs_at = image.find("\"outputs\"").unwrap();
        let timestamp_at = image.find("\"timestamp\"").unwrap();
        let version_at = image.find("\"version\"").unwrap();

        assert!(inputs_at < locktime_at);
        assert!(locktime_at < outputs_at);
        assert!(outputs_at < timestamp_at);
        assert!(timestamp_at < version_at);
        assert!(!image.contains("\"txid\"")); // txid fora do corpo canônico
    }
}
