use crate::block::Block;
use crate::error::{ChainError, ChainResult};
use crate::mining::WorkTemplate;
use crate::store::{ChainStore, MinerStat};
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::UtxoIndex;
use serde::{Deserialize, Serialize};
use shared::{address_from_public_key_hex, verify_signature, Amount, Hash256, KeyPair, TxId, DUST};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Chave de metadados onde o endereço do fundador fica persistido
const FOUNDER_ADDRESS_KEY: &str = "founder_address";

/// Destinatário sentinela do gênese sem fundador
const GENESIS_RECIPIENT: &str = "GENESIS";

/// Parâmetros econômicos e de consenso da rede Bespin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Dificuldade do proof-of-work (caracteres hex zero iniciais)
    pub difficulty: u32,
    /// Recompensa base por bloco
    pub base_reward: Amount,
    /// Blocos até a recompensa cair pela metade
    pub halving_interval: u64,
    /// Oferta máxima de moedas
    pub max_supply: Amount,
    /// Alocação do fundador no gênese
    pub founder_allocation: Amount,
    /// Janela de blocos recentes mantidos em memória
    pub memory_window: usize,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            difficulty: 4,
            base_reward: Amount::from_coins(50),
            halving_interval: 210_000,
            max_supply: Amount::from_coins(100_000_000),
            founder_allocation: Amount::from_coins(20_000_000),
            memory_window: 100,
        }
    }
}

impl NetworkParams {
    /// Parâmetros padrão com a dificuldade dada
    #[must_use]
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }
}

/// Informações agregadas do nó, consumidas pela RPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub height: u64,
    pub tip_hash: Hash256,
    pub difficulty: u32,
    pub pending_transactions: usize,
    pub utxo_count: usize,
    pub mining_reward: Amount,
    pub max_supply: Amount,
    pub circulating_supply: Amount,
    pub remaining_supply: Amount,
    pub founder_allocation: Amount,
    pub founder_address: Option<String>,
}

/// Estado mutável do ledger, guardado pelo lock único de escrita:
/// janela de blocos recentes, índice de UTXOs e mempool
struct ChainState {
    recent_blocks: Vec<Block>,
    utxo_index: UtxoIndex,
    mempool: Vec<Transaction>,
    mempool_spent: HashSet<crate::transaction::OutPoint>,
}

/// Máquina de estados do ledger Bespin.
///
/// Um único lock de escrita serializa admissões concorrentes de
/// mineradores e de gossip; leitores (saldo, altura, templates) tomam a
/// guarda compartilhada. O banco é a fonte de verdade para altura e a
/// janela em memória funciona como cache da ponta.
pub struct Blockchain {
    state: RwLock<ChainState>,
    store: Arc<ChainStore>,
    params: NetworkParams,
    founder_address: Option<String>,
}

impl Blockchain {
    /// Abre o ledger: recupera do banco se houver blocos, senão minera e
    /// persiste o gênese (alocação do fundador, ou coinbase de valor
    /// zero para o sentinela)
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de serialização
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        difficulty: u32,
        founder_address: Option<&str>,
    ) -> ChainResult<Self> {
        Self::open_with_params(db_path, NetworkParams::with_difficulty(difficulty), founder_address)
    }

    /// Abre o ledger com parâmetros de rede explícitos
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de serialização
    pub fn open_with_params<P: AsRef<Path>>(
        db_path: P,
        params: NetworkParams,
        founder_address: Option<&str>,
    ) -> ChainResult<Self> {
        let store = Arc::new(ChainStore::open(db_path)?);
        let height = store.height()?;

        if height > 0 {
            let recent_blocks = store.load_recent_blocks(params.memory_window)?;
            if recent_blocks.is_empty() {
                return Err(ChainError::Invariant(
                    "store reports blocks but none could be loaded".to_string(),
                ));
            }

            let mut utxo_index = UtxoIndex::new();
            for utxo in store.load_utxo_set()? {
                utxo_index.add(utxo);
            }

            let founder_address = store.get_metadata(FOUNDER_ADDRESS_KEY)?;
            info!(
                height,
                utxos = utxo_index.len(),
                "blockchain recuperada do banco"
            );

            return Ok(Self {
                state: RwLock::new(ChainState {
                    recent_blocks,
                    utxo_index,
                    mempool: Vec::new(),
                    mempool_spent: HashSet::new(),
                }),
                store,
                params,
                founder_address,
            });
        }

        // sem blocos: construir o gênese
        let founder_address = founder_address.map(str::to_string);
        let coinbase = match &founder_address {
            Some(address) => Transaction::coinbase(address, params.founder_allocation, 0)?,
            None => Transaction::coinbase(GENESIS_RECIPIENT, Amount::ZERO, 0)?,
        };

        let mut genesis = Block::new(0, vec![coinbase], Hash256::zero(), params.difficulty)?;
        genesis.mine()?;
        store.commit_block(&genesis)?;
        if let Some(address) = &founder_address {
            store.save_metadata(FOUNDER_ADDRESS_KEY, address)?;
        }

        let mut utxo_index = UtxoIndex::new();
        for tx in &genesis.transactions {
            utxo_index.apply(tx)?;
        }

        info!(hash = %genesis.hash, "bloco gênese minerado e persistido");

        Ok(Self {
            state: RwLock::new(ChainState {
                recent_blocks: vec![genesis],
                utxo_index,
                mempool: Vec::new(),
                mempool_spent: HashSet::new(),
            }),
            store,
            params,
            founder_address,
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().expect("ledger lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().expect("ledger lock poisoned")
    }

    /// Parâmetros de rede em vigor
    #[must_use]
    pub const fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Endereço do fundador, se o gênese alocou
    #[must_use]
    pub fn founder_address(&self) -> Option<&str> {
        self.founder_address.as_deref()
    }

    /// Altura da cadeia (fonte de verdade: banco)
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn height(&self) -> ChainResult<u64> {
        self.store.height()
    }

    /// Último bloco da cadeia
    ///
    /// # Errors
    ///
    /// Retorna erro de invariante se a janela estiver vazia
    pub fn tip(&self) -> ChainResult<Block> {
        self.read_state()
            .recent_blocks
            .last()
            .cloned()
            .ok_or_else(|| ChainError::Invariant("empty recent-block window".to_string()))
    }

    /// Saldo de um endereço a partir do índice de UTXOs
    #[must_use]
    pub fn balance(&self, address: &str) -> Amount {
        self.read_state().utxo_index.balance(address)
    }

    /// UTXOs de um endereço, em ordem determinística
    #[must_use]
    pub fn utxos_for_address(&self, address: &str) -> Vec<crate::transaction::Utxo> {
        self.read_state().utxo_index.for_address(address)
    }

    /// Snapshot do mempool
    #[must_use]
    pub fn pending(&self) -> Vec<Transaction> {
        self.read_state().mempool.clone()
    }

    /// Número de transações pendentes
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.read_state().mempool.len()
    }

    /// Bloco pela altura, direto do banco
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn block_by_index(&self, index: u64) -> ChainResult<Option<Block>> {
        self.store.load_block(index)
    }

    /// Transação confirmada pelo txid, com a altura do bloco que a inclui
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn transaction_by_id(&self, txid: &TxId) -> ChainResult<Option<(Transaction, u64)>> {
        self.store.load_transaction(txid)
    }

    /// Procura um pagamento confirmado (colaborador de pagamentos)
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn find_payment(
        &self,
        address: &str,
        min_amount: Amount,
        after_timestamp: i64,
    ) -> ChainResult<Option<(TxId, Amount)>> {
        self.store.find_payment(address, min_amount, after_timestamp)
    }

    /// Distribuição de blocos e recompensas por minerador
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn miner_stats(&self, limit: usize) -> ChainResult<Vec<MinerStat>> {
        self.store.miner_stats(limit)
    }

    /// Recompensa de coinbase na altura dada, com os halvings aplicados
    #[must_use]
    pub fn reward_at(&self, height: u64) -> Amount {
        let halvings = height / self.params.halving_interval;
        if halvings >= 64 {
            return Amount::ZERO;
        }
        Amount::from_sats(self.params.base_reward.sats() >> halvings)
    }

    /// Recompensa do próximo bloco
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn current_reward(&self) -> ChainResult<Amount> {
        Ok(self.reward_at(self.store.height()?))
    }

    /// Total já emitido pela mineração (exclui a alocação do fundador)
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn total_mined(&self) -> ChainResult<Amount> {
        Ok(scheduled_emission(&self.params, self.store.height()?))
    }

    /// Oferta circulante: alocação do fundador mais o total minerado
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn circulating_supply(&self) -> ChainResult<Amount> {
        let founder = if self.founder_address.is_some() {
            self.params.founder_allocation
        } else {
            Amount::ZERO
        };
        Ok(founder.saturating_add(self.total_mined()?))
    }

    /// Oferta ainda não emitida
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn remaining_supply(&self) -> ChainResult<Amount> {
        Ok(self.params.max_supply.saturating_sub(self.circulating_supply()?))
    }

    /// Informações agregadas do nó
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn info(&self) -> ChainResult<NodeInfo> {
        let height = self.store.height()?;
        let state = self.read_state();
        let tip_hash = state
            .recent_blocks
            .last()
            .map(|block| block.hash)
            .unwrap_or_else(Hash256::zero);
        let pending_transactions = state.mempool.len();
        let utxo_count = state.utxo_index.len();
        drop(state);

        Ok(NodeInfo {
            height,
            tip_hash,
            difficulty: self.params.difficulty,
            pending_transactions,
            utxo_count,
            mining_reward: self.reward_at(height),
            max_supply: self.params.max_supply,
            circulating_supply: self.circulating_supply()?,
            remaining_supply: self.remaining_supply()?,
            founder_allocation: self.params.founder_allocation,
            founder_address: self.founder_address.clone(),
        })
    }

    /// Monta uma transação assinada do remetente para o destinatário.
    /// Seleciona UTXOs do remetente em ordem determinística até cobrir o
    /// valor; devolve `None` se o saldo não alcançar. Troco acima do
    /// limiar de poeira volta para o remetente. As assinaturas são
    /// preenchidas depois da derivação do txid e não o alteram.
    ///
    /// # Errors
    ///
    /// Retorna erro de serialização
    pub fn create_transaction(
        &self,
        sender: &KeyPair,
        recipient: &str,
        amount: Amount,
    ) -> ChainResult<Option<Transaction>> {
        let candidates = {
            let state = self.read_state();
            state.utxo_index.for_address(sender.address())
        };

        let mut selected = Vec::new();
        let mut total_input = Amount::ZERO;
        for utxo in candidates {
            total_input = total_input
                .checked_add(utxo.amount)
                .ok_or_else(|| ChainError::Malformed("input value overflow".to_string()))?;
            selected.push(utxo);
            if total_input >= amount {
                break;
            }
        }

        if total_input < amount {
            return Ok(None);
        }

        let inputs: Vec<TxInput> = selected
            .iter()
            .map(|utxo| TxInput::new(utxo.outpoint.txid, utxo.outpoint.vout))
            .collect();

        let mut outputs = vec![TxOutput::new(amount, recipient.to_string())];
        let change = total_input.saturating_sub(amount);
        if change > DUST {
            outputs.push(TxOutput::new(change, sender.address().to_string()));
        }

        let mut tx = Transaction::new(inputs, outputs)?;
        for i in 0..tx.inputs.len() {
            let image = tx.signing_image(i)?;
            let signature = sender.sign(&image);
            tx.inputs[i].script_sig =
                format!("{}:{}", hex::encode(signature), sender.public_key_hex());
        }

        Ok(Some(tx))
    }

    /// Verifica as assinaturas de todas as entradas de uma transação
    /// contra a visão de UTXOs dada: o `script_sig` carrega
    /// `assinatura ":" chave_pública`, o endereço derivado da chave deve
    /// ser o dono do UTXO gasto e a assinatura deve validar sobre a
    /// imagem de assinatura
    fn verify_transaction_signatures(tx: &Transaction, utxos: &UtxoIndex) -> ChainResult<()> {
        if tx.is_coinbase() {
            return Ok(());
        }

        for (i, input) in tx.inputs.iter().enumerate() {
            let (signature_hex, public_key_hex) =
                input.script_sig.split_once(':').ok_or_else(|| {
                    ChainError::Malformed(format!(
                        "input {i}: script_sig must be <signature>:<public key>"
                    ))
                })?;
            let signature = hex::decode(signature_hex).map_err(|_| {
                ChainError::Malformed(format!("input {i}: signature is not valid hex"))
            })?;

            let utxo = utxos
                .get(&input.outpoint())
                .ok_or(ChainError::UtxoNotFound(input.outpoint()))?;

            let derived_address = address_from_public_key_hex(public_key_hex)?;
            if derived_address != utxo.script_pubkey {
                return Err(ChainError::SignatureInvalid(format!(
                    "input {i}: public key does not own the spent output"
                )));
            }

            let image = tx.signing_image(i)?;
            if !verify_signature(public_key_hex, &signature, &image)? {
                return Err(ChainError::SignatureInvalid(format!(
                    "input {i}: signature does not verify"
                )));
            }
        }

        Ok(())
    }

    /// Admite uma transação no mempool: rederiva o txid, verifica as
    /// assinaturas, valida contra o índice de UTXOs e rejeita conflitos
    /// de outpoint com transações já pendentes
    ///
    /// # Errors
    ///
    /// Retorna o erro de validação que impediu a admissão
    pub fn submit_transaction(&self, tx: Transaction) -> ChainResult<()> {
        if tx.is_coinbase() {
            return Err(ChainError::Malformed(
                "coinbase transactions cannot enter the mempool".to_string(),
            ));
        }
        tx.check_txid()?;

        let mut seen = HashSet::new();
        for input in &tx.inputs {
            if !seen.insert(input.outpoint()) {
                return Err(ChainError::Malformed(
                    "duplicate outpoint within transaction".to_string(),
                ));
            }
        }

        let mut state = self.write_state();
        Self::verify_transaction_signatures(&tx, &state.utxo_index)?;
        state.utxo_index.validate(&tx)?;

        for input in &tx.inputs {
            if state.mempool_spent.contains(&input.outpoint()) {
                return Err(ChainError::MempoolDoubleSpend);
            }
        }

        for input in &tx.inputs {
            state.mempool_spent.insert(input.outpoint());
        }
        debug!(txid = %tx.txid, "transação admitida no mempool");
        state.mempool.push(tx);
        Ok(())
    }

    /// Template de mineração para a próxima altura: coinbase para o
    /// minerador seguida do snapshot do mempool. O template é um valor e
    /// não retém locks.
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de serialização
    pub fn get_work(&self, miner_address: &str) -> ChainResult<WorkTemplate> {
        let state = self.read_state();
        let height = self.store.height()?;
        let tip = state
            .recent_blocks
            .last()
            .ok_or_else(|| ChainError::Invariant("empty recent-block window".to_string()))?;

        let reward = self.reward_at(height);
        let coinbase = Transaction::coinbase(miner_address, reward, height)?;
        let mut transactions = vec![coinbase];
        transactions.extend(state.mempool.iter().cloned());

        Ok(WorkTemplate {
            index: height,
            previous_hash: tip.hash,
            difficulty: self.params.difficulty,
            reward,
            transactions,
        })
    }

    /// Admite um bloco resolvido, sob o lock exclusivo de escrita:
    ///
    /// 1. altura (obsoleto / índice errado);
    /// 2. proof-of-work (zeros hex e hash rederivado, nada é confiado);
    /// 3. encadeamento com a ponta;
    /// 4. txids rederivados e merkle root recalculada;
    /// 5. forma e teto da coinbase (taxas são queimadas);
    /// 6. assinaturas e validação+aplicação numa sombra do índice, com
    ///    dependências intra-bloco suportadas;
    /// 7. persistência atômica e só então o merge em memória e a poda
    ///    do mempool.
    ///
    /// # Errors
    ///
    /// Retorna o erro de validação ou de armazenamento; nada é mutado em
    /// caso de falha
    pub fn submit_block(&self, block: Block) -> ChainResult<()> {
        let mut state = self.write_state();
        let height = self.store.height()?;

        if block.header.index < height {
            warn!(index = block.header.index, height, "bloco obsoleto rejeitado");
            return Err(ChainError::BlockExists(block.header.index));
        }
        if block.header.index != height {
            return Err(ChainError::InvalidIndex {
                expected: height,
                got: block.header.index,
            });
        }

        if block.header.difficulty != self.params.difficulty {
            return Err(ChainError::WrongDifficulty {
                expected: self.params.difficulty,
                got: block.header.difficulty,
            });
        }
        if !block.hash.meets_difficulty(self.params.difficulty)
            || block.calculate_hash()? != block.hash
        {
            return Err(ChainError::InvalidProofOfWork);
        }

        let tip = state
            .recent_blocks
            .last()
            .ok_or_else(|| ChainError::Invariant("empty recent-block window".to_string()))?;
        if block.header.previous_hash != tip.hash {
            return Err(ChainError::InvalidLinkage);
        }

        for tx in &block.transactions {
            tx.check_txid()?;
        }
        if !block.verify_merkle_root() {
            return Err(ChainError::InvalidMerkleRoot);
        }

        let first = block
            .transactions
            .first()
            .ok_or_else(|| ChainError::Malformed("block has no transactions".to_string()))?;
        if !first.is_coinbase() {
            return Err(ChainError::Malformed(
                "first transaction must be the coinbase".to_string(),
            ));
        }
        if block.transactions.iter().skip(1).any(Transaction::is_coinbase) {
            return Err(ChainError::Malformed(
                "multiple coinbase transactions".to_string(),
            ));
        }
        let cap = self.reward_at(block.header.index);
        let paid = first.total_output_value()?;
        if paid > cap {
            return Err(ChainError::ExcessiveCoinbase { paid, cap });
        }

        // sombra do índice: valida e aplica em ordem, cobrindo
        // dependências intra-bloco; qualquer falha descarta a sombra
        let mut shadow = state.utxo_index.snapshot();
        for tx in &block.transactions {
            if tx.is_coinbase() {
                shadow.apply(tx)?;
                continue;
            }
            Self::verify_transaction_signatures(tx, &shadow)?;
            shadow.validate(tx)?;
            shadow.apply(tx)?;
        }

        // durável primeiro; falha aqui aborta sem tocar o estado em
        // memória
        self.store.commit_block(&block)?;

        let included: HashSet<TxId> =
            block.transactions.iter().map(|tx| tx.txid).collect();
        let index = block.header.index;
        let hash = block.hash;
        let tx_count = block.transactions.len();

        let ChainState {
            recent_blocks,
            utxo_index,
            mempool,
            mempool_spent,
        } = &mut *state;

        *utxo_index = shadow;
        // poda por txid incluído e por entradas que o bloco consumiu;
        // sem a segunda passada, gastos duplos obsoletos envenenariam
        // todos os templates futuros
        mempool.retain(|tx| {
            !included.contains(&tx.txid)
                && tx
                    .inputs
                    .iter()
                    .all(|input| utxo_index.contains(&input.outpoint()))
        });
        *mempool_spent = mempool
            .iter()
            .flat_map(|tx| tx.inputs.iter().map(TxInput::outpoint))
            .collect();

        recent_blocks.push(block);
        while recent_blocks.len() > self.params.memory_window {
            recent_blocks.remove(0);
        }

        info!(index, %hash, tx_count, "bloco aceito na cadeia");
        Ok(())
    }

    /// Auditoria da cadeia: replay completo a partir de um conjunto de
    /// UTXOs vazio, reverificando proof-of-work, consistência de hash,
    /// encadeamento, merkle, assinaturas e disponibilidade de UTXOs.
    /// Diagnóstico puro; não muta o estado vivo.
    ///
    /// # Errors
    ///
    /// Retorna o primeiro defeito encontrado
    pub fn validate_chain(&self) -> ChainResult<()> {
        let state = self.read_state();
        let blocks = self.store.load_blocks()?;

        let mut replay = UtxoIndex::new();
        let mut previous_hash = Hash256::zero();

        for (i, block) in blocks.iter().enumerate() {
            if i == 0 {
                for tx in &block.transactions {
                    replay.apply(tx)?;
                }
                previous_hash = block.hash;
                continue;
            }

            if !block.hash.meets_difficulty(self.params.difficulty) {
                return Err(ChainError::InvalidProofOfWork);
            }
            if block.calculate_hash()? != block.hash {
                return Err(ChainError::InvalidProofOfWork);
            }
            if block.header.previous_hash != previous_hash {
                return Err(ChainError::InvalidLinkage);
            }
            if !block.verify_merkle_root() {
                return Err(ChainError::InvalidMerkleRoot);
            }

            let first = block
                .transactions
                .first()
                .ok_or_else(|| ChainError::Malformed("block has no transactions".to_string()))?;
            if !first.is_coinbase() {
                return Err(ChainError::Malformed(
                    "first transaction must be the coinbase".to_string(),
                ));
            }
            let cap = self.reward_at(block.header.index);
            let paid = first.total_output_value()?;
            if paid > cap {
                return Err(ChainError::ExcessiveCoinbase { paid, cap });
            }

            for tx in &block.transactions {
                tx.check_txid()?;
                Self::verify_transaction_signatures(tx, &replay)?;
                if !tx.is_coinbase() {
                    replay.validate(tx)?;
                }
                replay.apply(tx)?;
            }

            previous_hash = block.hash;
        }

        if replay != state.utxo_index {
            return Err(ChainError::Invariant(
                "replayed UTXO set diverges from the live index".to_string(),
            ));
        }

        Ok(())
    }

    /// Variante booleana da auditoria
    #[must_use]
    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }
}

/// Emissão agendada até a altura dada: soma de `reward(h)` para
/// `h` em `[1, height)`, período de halving a período de halving
fn scheduled_emission(params: &NetworkParams, height: u64) -> Amount {
    let mut total = Amount::ZERO;
    let mut h = 1u64;

    while h < height {
        let halvings = h / params.halving_interval;
        if halvings >= 64 {
            break;
        }
        let reward = params.base_reward.sats() >> halvings;
        if reward == 0 {
            break;
        }

        let period_end = (halvings + 1) * params.halving_interval;
        let blocks_in_period = period_end.min(height) - h;
        total = total.saturating_add(Amount::from_sats(reward.saturating_mul(blocks_in_period)));
        h += blocks_in_period;
    }

    total
}
