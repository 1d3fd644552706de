use crate::block::{Block, BlockHeader};
use crate::error::{ChainError, ChainResult};
use crate::transaction::{OutPoint, Transaction, TxInput, TxOutput, Utxo};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use shared::{Amount, Hash256, Timestamp, TxId};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Estatísticas de mineração por endereço de coinbase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerStat {
    pub address: String,
    pub blocks_mined: u64,
    pub total_rewards: Amount,
}

/// Armazenamento durável da cadeia sobre SQLite (WAL,
/// `synchronous=NORMAL`). A conexão única atrás do `Mutex` serializa o
/// acesso concorrente; cada commit de bloco é uma transação SQL única,
/// então um bloco é durável por inteiro ou não é.
pub struct ChainStore {
    conn: Mutex<Connection>,
}

impl ChainStore {
    /// Abre (ou cria) o banco no caminho dado
    ///
    /// # Errors
    ///
    /// Retorna erro se o banco não puder ser aberto ou migrado
    pub fn open<P: AsRef<Path>>(path: P) -> ChainResult<Self> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blocks (
                block_index   INTEGER PRIMARY KEY,
                version       INTEGER NOT NULL,
                timestamp     INTEGER NOT NULL,
                previous_hash TEXT NOT NULL,
                merkle_root   TEXT NOT NULL,
                nonce         INTEGER NOT NULL,
                difficulty    INTEGER NOT NULL,
                hash          TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS transactions (
                txid        TEXT PRIMARY KEY,
                block_index INTEGER NOT NULL,
                tx_index    INTEGER NOT NULL,
                version     INTEGER NOT NULL,
                locktime    INTEGER NOT NULL,
                timestamp   INTEGER NOT NULL,
                FOREIGN KEY (block_index) REFERENCES blocks(block_index)
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_block
                ON transactions(block_index);
            CREATE TABLE IF NOT EXISTS tx_inputs (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                txid       TEXT NOT NULL,
                prev_txid  TEXT NOT NULL,
                vout       INTEGER NOT NULL,
                script_sig TEXT NOT NULL,
                sequence   INTEGER NOT NULL,
                FOREIGN KEY (txid) REFERENCES transactions(txid)
            );
            CREATE INDEX IF NOT EXISTS idx_tx_inputs_txid ON tx_inputs(txid);
            CREATE TABLE IF NOT EXISTS tx_outputs (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                txid          TEXT NOT NULL,
                vout          INTEGER NOT NULL,
                amount        INTEGER NOT NULL,
                script_pubkey TEXT NOT NULL,
                FOREIGN KEY (txid) REFERENCES transactions(txid)
            );
            CREATE INDEX IF NOT EXISTS idx_tx_outputs_txid_vout
                ON tx_outputs(txid, vout);
            CREATE TABLE IF NOT EXISTS utxos (
                txid    TEXT NOT NULL,
                vout    INTEGER NOT NULL,
                amount  INTEGER NOT NULL,
                address TEXT NOT NULL,
                PRIMARY KEY (txid, vout)
            );
            CREATE TABLE IF NOT EXISTS metadata (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Altura da cadeia: `MAX(block_index) + 1`, ou 0 em banco vazio.
    /// Tolera lacunas transitórias e é a fonte de verdade para emissão
    /// e admissão.
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn height(&self) -> ChainResult<u64> {
        let max: Option<i64> =
            self.conn()
                .query_row("SELECT MAX(block_index) FROM blocks", [], |row| row.get(0))?;
        Ok(max.map_or(0, |index| index as u64 + 1))
    }

    /// Persiste um bloco, suas transações e os deltas de UTXO numa
    /// transação SQL única. Rejeita a altura se já houver transações
    /// persistidas para ela.
    ///
    /// # Errors
    ///
    /// Retorna `BlockExists` para altura já ocupada ou erro de
    /// armazenamento
    pub fn commit_block(&self, block: &Block) -> ChainResult<()> {
        let mut conn = self.conn();
        let sql_tx = conn.transaction()?;

        let index = block.header.index as i64;
        let existing: i64 = sql_tx.query_row(
            "SELECT COUNT(*) FROM transactions WHERE block_index = ?1",
            params![index],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(ChainError::BlockExists(block.header.index));
        }

        sql_tx.execute(
            "INSERT OR REPLACE INTO blocks
             (block_index, version, timestamp, previous_hash, merkle_root, nonce, difficulty, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                index,
                block.header.version,
                block.header.timestamp,
                block.header.previous_hash.to_hex(),
                block.header.merkle_root.to_hex(),
                block.header.nonce as i64,
                block.header.difficulty,
                block.hash.to_hex(),
            ],
        )?;

        for (tx_index, tx) in block.transactions.iter().enumerate() {
            sql_tx.execute(
                "INSERT INTO transactions (txid, block_index, tx_index, version, locktime, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tx.txid.to_hex(),
                    index,
                    tx_index as i64,
                    tx.version,
                    tx.locktime,
                    tx.timestamp,
                ],
            )?;

            for input in &tx.inputs {
                sql_tx.execute(
                    "INSERT INTO tx_inputs (txid, prev_txid, vout, script_sig, sequence)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        tx.txid.to_hex(),
                        input.prev_txid.to_hex(),
                        input.vout,
                        input.script_sig,
                        input.sequence,
                    ],
                )?;
            }

            for (vout, output) in tx.outputs.iter().enumerate() {
                sql_tx.execute(
                    "INSERT INTO tx_outputs (txid, vout, amount, script_pubkey)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        tx.txid.to_hex(),
                        vout as i64,
                        output.amount.sats() as i64,
                        output.script_pubkey,
                    ],
                )?;
            }

            // deltas de UTXO: gastos saem, saídas entram
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    sql_tx.execute(
                        "DELETE FROM utxos WHERE txid = ?1 AND vout = ?2",
                        params![input.prev_txid.to_hex(), input.vout],
                    )?;
                }
            }
            for (vout, output) in tx.outputs.iter().enumerate() {
                sql_tx.execute(
                    "INSERT OR REPLACE INTO utxos (txid, vout, amount, address)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        tx.txid.to_hex(),
                        vout as i64,
                        output.amount.sats() as i64,
                        output.script_pubkey,
                    ],
                )?;
            }
        }

        sql_tx.commit()?;
        debug!(index = block.header.index, "bloco persistido");
        Ok(())
    }

    /// Insere um UTXO avulso (write-through do índice)
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn add_utxo(&self, utxo: &Utxo) -> ChainResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO utxos (txid, vout, amount, address)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                utxo.outpoint.txid.to_hex(),
                utxo.outpoint.vout,
                utxo.amount.sats() as i64,
                utxo.script_pubkey,
            ],
        )?;
        Ok(())
    }

    /// Remove um UTXO gasto
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn remove_utxo(&self, outpoint: &OutPoint) -> ChainResult<()> {
        self.conn().execute(
            "DELETE FROM utxos WHERE txid = ?1 AND vout = ?2",
            params![outpoint.txid.to_hex(), outpoint.vout],
        )?;
        Ok(())
    }

    /// Materializa o conjunto completo de UTXOs
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de decodificação
    pub fn load_utxo_set(&self) -> ChainResult<Vec<Utxo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT txid, vout, amount, address FROM utxos")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        drop(conn);

        let mut utxos = Vec::with_capacity(rows.len());
        for (txid, vout, amount, address) in rows {
            utxos.push(Utxo::new(
                Hash256::from_hex(&txid)?,
                vout,
                Amount::from_sats(amount as u64),
                address,
            ));
        }
        Ok(utxos)
    }

    /// Carrega um bloco pela altura
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de decodificação
    pub fn load_block(&self, index: u64) -> ChainResult<Option<Block>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT block_index, version, timestamp, previous_hash, merkle_root,
                        nonce, difficulty, hash
                 FROM blocks WHERE block_index = ?1",
                params![index as i64],
                block_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(build_block(&conn, raw)?)),
            None => Ok(None),
        }
    }

    /// Carrega os `count` blocos mais recentes, em ordem cronológica
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de decodificação
    pub fn load_recent_blocks(&self, count: usize) -> ChainResult<Vec<Block>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT block_index, version, timestamp, previous_hash, merkle_root,
                    nonce, difficulty, hash
             FROM blocks ORDER BY block_index DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![count as i64], block_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut blocks = Vec::with_capacity(rows.len());
        for raw in rows {
            blocks.push(build_block(&conn, raw)?);
        }
        blocks.reverse();
        Ok(blocks)
    }

    /// Carrega a cadeia inteira, em ordem cronológica (caminho de
    /// auditoria)
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de decodificação
    pub fn load_blocks(&self) -> ChainResult<Vec<Block>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT block_index, version, timestamp, previous_hash, merkle_root,
                    nonce, difficulty, hash
             FROM blocks ORDER BY block_index",
        )?;
        let rows = stmt
            .query_map([], block_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut blocks = Vec::with_capacity(rows.len());
        for raw in rows {
            blocks.push(build_block(&conn, raw)?);
        }
        Ok(blocks)
    }

    /// Busca uma transação confirmada pelo txid; devolve também a altura
    /// do bloco que a inclui
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de decodificação
    pub fn load_transaction(&self, txid: &TxId) -> ChainResult<Option<(Transaction, u64)>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT txid, version, locktime, timestamp, block_index
                 FROM transactions WHERE txid = ?1",
                params![txid.to_hex()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((txid, version, locktime, timestamp, block_index)) => {
                let tx = build_transaction(&conn, &txid, version, locktime, timestamp)?;
                Ok(Some((tx, block_index as u64)))
            }
            None => Ok(None),
        }
    }

    /// Grava um par chave/valor de metadados
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn save_metadata(&self, key: &str, value: &str) -> ChainResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Lê um valor de metadados
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn get_metadata(&self, key: &str) -> ChainResult<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Procura um pagamento confirmado: saída para `address` com valor
    /// mínimo, confirmada a partir de `after_timestamp`. Usado pelo
    /// colaborador de pagamentos.
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento ou de decodificação
    pub fn find_payment(
        &self,
        address: &str,
        min_amount: Amount,
        after_timestamp: Timestamp,
    ) -> ChainResult<Option<(TxId, Amount)>> {
        let row = self
            .conn()
            .query_row(
                "SELECT o.txid, o.amount
                 FROM tx_outputs o
                 JOIN transactions t ON o.txid = t.txid
                 WHERE o.script_pubkey = ?1
                   AND o.amount >= ?2
                   AND t.timestamp >= ?3
                 ORDER BY t.timestamp DESC
                 LIMIT 1",
                params![address, min_amount.sats() as i64, after_timestamp],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((txid, amount)) => Ok(Some((
                Hash256::from_hex(&txid)?,
                Amount::from_sats(amount as u64),
            ))),
            None => Ok(None),
        }
    }

    /// Distribuição de blocos minerados e recompensas por endereço de
    /// coinbase, em ordem decrescente de blocos
    ///
    /// # Errors
    ///
    /// Retorna erro de armazenamento
    pub fn miner_stats(&self, limit: usize) -> ChainResult<Vec<MinerStat>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT o.script_pubkey, COUNT(*) AS blocks_mined, SUM(o.amount)
             FROM tx_outputs o
             JOIN transactions t ON o.txid = t.txid
             WHERE t.tx_index = 0 AND o.vout = 0
             GROUP BY o.script_pubkey
             ORDER BY blocks_mined DESC
             LIMIT ?1",
        )?;
        let stats = stmt
            .query_map(params![limit as i64], |row| {
                Ok(MinerStat {
                    address: row.get(0)?,
                    blocks_mined: row.get::<_, i64>(1)? as u64,
                    total_rewards: Amount::from_sats(row.get::<_, i64>(2)? as u64),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }
}

type BlockRow = (i64, u32, Timestamp, String, String, i64, u32, String);

fn block_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn build_block(conn: &Connection, raw: BlockRow) -> ChainResult<Block> {
    let (index, version, timestamp, previous_hash, merkle_root, nonce, difficulty, hash) = raw;
    let transactions = load_transactions_for_block(conn, index)?;

    Ok(Block {
        header: BlockHeader {
            version,
            index: index as u64,
            timestamp,
            previous_hash: Hash256::from_hex(&previous_hash)?,
            merkle_root: Hash256::from_hex(&merkle_root)?,
            difficulty,
            nonce: nonce as u64,
        },
        hash: Hash256::from_hex(&hash)?,
        transactions,
    })
}

fn load_transactions_for_block(conn: &Connection, block_index: i64) -> ChainResult<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT txid, version, locktime, timestamp
         FROM transactions WHERE block_index = ?1 ORDER BY tx_index",
    )?;
    let rows = stmt
        .query_map(params![block_index], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    let mut transactions = Vec::with_capacity(rows.len());
    for (txid, version, locktime, timestamp) in rows {
        transactions.push(build_transaction(conn, &txid, version, locktime, timestamp)?);
    }
    Ok(transactions)
}

fn build_transaction(
    conn: &Connection,
    txid: &str,
    version: u32,
    locktime: u32,
    timestamp: Timestamp,
) -> ChainResult<Transaction> {
    let mut stmt = conn.prepare(
        "SELECT prev_txid, vout, script_sig, sequence
         FROM tx_inputs WHERE txid = ?1 ORDER BY id",
    )?;
    let input_rows = stmt
        .query_map(params![txid], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    let mut inputs = Vec::with_capacity(input_rows.len());
    for (prev_txid, vout, script_sig, sequence) in input_rows {
        inputs.push(TxInput {
            prev_txid: Hash256::from_hex(&prev_txid)?,
            vout,
            script_sig,
            sequence,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT amount, script_pubkey
         FROM tx_outputs WHERE txid = ?1 ORDER BY vout",
    )?;
    let outputs = stmt
        .query_map(params![txid], |row| {
            Ok(TxOutput::new(
                Amount::from_sats(row.get::<_, i64>(0)? as u64),
                row.get::<_, String>(1)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    Ok(Transaction {
        version,
        inputs,
        outputs,
        locktime,
        timestamp,
        txid: Hash256::from_hex(txid)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> ChainStore {
        ChainStore::open(dir.path().join("chain.db")).unwrap()
    }

    fn mined_block(index: u64, previous_hash: Hash256, recipient: &str) -> Block {
        let coinbase =
            Transaction::coinbase(recipient, Amount::from_coins(50), index).unwrap();
        let mut block = Block::new(index, vec![coinbase], previous_hash, 1).unwrap();
        block.mine().unwrap();
        block
    }

    #[test]
    fn test_empty_store_height() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert_eq!(store.height().unwrap(), 0);
        assert!(store.load_block(0).unwrap().is_none());
    }

    #[test]
    fn test_block_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let block = mined_block(0, Hash256::zero(), "miner-a");
        store.commit_block(&block).unwrap();

        assert_eq!(store.height().unwrap(), 1);
        let loaded = store.load_block(0).unwrap().unwrap();
        assert_eq!(loaded, block);
    }

    #[test]
    fn test_duplicate_block_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let block = mined_block(0, Hash256::zero(), "miner-a");
        store.commit_block(&block).unwrap();

        let again = mined_block(0, Hash256::zero(), "miner-b");
        assert!(matches!(
            store.commit_block(&again),
            Err(ChainError::BlockExists(0))
        ));
        // o bloco original permanece
        assert_eq!(store.load_block(0).unwrap().unwrap(), block);
    }

    #[test]
    fn test_recent_blocks_are_chronological() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let genesis = mined_block(0, Hash256::zero(), "miner-a");
        store.commit_block(&genesis).unwrap();
        let second = mined_block(1, genesis.hash, "miner-a");
        store.commit_block(&second).unwrap();
        let third = mined_block(2, second.hash, "miner-b");
        store.commit_block(&third).unwrap();

        let recent = store.load_recent_blocks(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].header.index, 1);
        assert_eq!(recent[1].header.index, 2);

        let all = store.load_blocks().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].header.index, 0);
    }

    #[test]
    fn test_utxo_deltas_follow_blocks() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let genesis = mined_block(0, Hash256::zero(), "miner-a");
        store.commit_block(&genesis).unwrap();

        let utxos = store.load_utxo_set().unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].script_pubkey, "miner-a");

        // bloco que gasta a coinbase do gênese
        let genesis_txid = genesis.transactions[0].txid;
        let spend = Transaction::new(
            vec![TxInput::new(genesis_txid, 0)],
            vec![TxOutput::new(Amount::from_coins(50), "addr-b".to_string())],
        )
        .unwrap();
        let coinbase = Transaction::coinbase("miner-a", Amount::from_coins(50), 1).unwrap();
        let mut block = Block::new(1, vec![coinbase, spend], genesis.hash, 1).unwrap();
        block.mine().unwrap();
        store.commit_block(&block).unwrap();

        let utxos = store.load_utxo_set().unwrap();
        assert_eq!(utxos.len(), 2);
        assert!(utxos
            .iter()
            .all(|utxo| utxo.outpoint.txid != genesis_txid));
    }

    #[test]
    fn test_standalone_utxo_write_through() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let utxo = Utxo::new(
            Hash256::double_sha256(b"tx"),
            0,
            Amount::from_sats(1234),
            "addr".to_string(),
        );
        store.add_utxo(&utxo).unwrap();
        // reinserção é idempotente
        store.add_utxo(&utxo).unwrap();
        assert_eq!(store.load_utxo_set().unwrap(), vec![utxo.clone()]);

        store.remove_utxo(&utxo.outpoint).unwrap();
        assert!(store.load_utxo_set().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.get_metadata("founder_address").unwrap(), None);
        store.save_metadata("founder_address", "addr-founder").unwrap();
        assert_eq!(
            store.get_metadata("founder_address").unwrap().as_deref(),
            Some("addr-founder")
        );
    }

    #[test]
    fn test_load_transaction_by_id() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let block = mined_block(0, Hash256::zero(), "miner-a");
        store.commit_block(&block).unwrap();

        let coinbase = &block.transactions[0];
        let (loaded, height) = store.load_transaction(&coinbase.txid).unwrap().unwrap();
        assert_eq!(&loaded, coinbase);
        assert_eq!(height, 0);

        let missing = Hash256::double_sha256(b"missing");
        assert!(store.load_transaction(&missing).unwrap().is_none());
    }

    #[test]
    fn test_find_payment() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let block = mined_block(0, Hash256::zero(), "merchant");
        store.commit_block(&block).unwrap();
        let paid = block.transactions[0].timestamp;

        let found = store
            .find_payment("merchant", Amount::from_coins(50), paid - 1)
            .unwrap();
        assert_eq!(
            found,
            Some((block.transactions[0].txid, Amount::from_coins(50)))
        );

        // valor mínimo acima do pago
        assert!(store
            .find_payment("merchant", Amount::from_coins(51), paid - 1)
            .unwrap()
            .is_none());
        // janela de tempo posterior ao pagamento
        assert!(store
            .find_payment("merchant", Amount::from_coins(50), paid + 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_miner_stats() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let genesis = mined_block(0, Hash256::zero(), "miner-a");
        store.commit_block(&genesis).unwrap();
        let second = mined_block(1, genesis.hash, "miner-a");
        store.commit_block(&second).unwrap();
        let third = mined_block(2, second.hash, "miner-b");
        store.commit_block(&third).unwrap();

        let stats = store.miner_stats(10).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].address, "miner-a");
        assert_eq!(stats[0].blocks_mined, 2);
        assert_eq!(stats[0].total_rewards, Amount::from_coins(100));
        assert_eq!(stats[1].address, "miner-b");
        assert_eq!(stats[1].blocks_mined, 1);
    }
}
