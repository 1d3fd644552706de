use crate::block::Block;
use crate::error::{ChainError, ChainResult};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use shared::{Amount, Hash256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Template de mineração devolvido por `Blockchain::get_work`: um valor
/// autocontido (coinbase + snapshot do mempool) que não retém locks do
/// ledger. O minerador resolve o proof-of-work fora e devolve o bloco
/// por `submit_block`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkTemplate {
    /// Altura do bloco candidato
    pub index: u64,
    /// Hash da ponta atual da cadeia
    pub previous_hash: Hash256,
    /// Dificuldade exigida (caracteres hex zero iniciais)
    pub difficulty: u32,
    /// Recompensa de coinbase na altura do candidato
    pub reward: Amount,
    /// Coinbase seguida do snapshot do mempool
    pub transactions: Vec<Transaction>,
}

/// Minerador local: busca de nonce com o espaço particionado entre
/// threads
pub struct Miner {
    threads: usize,
}

impl Default for Miner {
    fn default() -> Self {
        let threads = thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self { threads }
    }
}

impl Miner {
    /// Cria um minerador com o número de threads dado
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Resolve o proof-of-work de um template e devolve o bloco pronto
    /// para submissão
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar ou se o espaço de
    /// nonce se esgotar
    pub fn solve(&self, template: &WorkTemplate) -> ChainResult<Block> {
        let mut block = Block::new(
            template.index,
            template.transactions.clone(),
            template.previous_hash,
            template.difficulty,
        )?;

        if self.threads <= 1 {
            block.mine()?;
            return Ok(block);
        }

        let (nonce, hash) = self.solve_parallel(&block)?;
        block.header.nonce = nonce;
        block.hash = hash;
        Ok(block)
    }

    fn solve_parallel(&self, block: &Block) -> ChainResult<(u64, Hash256)> {
        let searching = Arc::new(AtomicBool::new(true));
        let solution = Arc::new(Mutex::new(None));
        let nonce_per_thread = u64::MAX / self.threads as u64;
        let mut handles = Vec::with_capacity(self.threads);

        for thread_id in 0..self.threads {
            let mut header = block.header.clone();
            let searching = Arc::clone(&searching);
            let solution = Arc::clone(&solution);

            let start_nonce = thread_id as u64 * nonce_per_thread;
            let end_nonce = if thread_id == self.threads - 1 {
                u64::MAX
            } else {
                (thread_id as u64 + 1) * nonce_per_thread
            };

            handles.push(thread::spawn(move || {
                for nonce in start_nonce..end_nonce {
                    if !searching.load(Ordering::SeqCst) {
                        return;
                    }

                    header.nonce = nonce;
                    if let Ok(hash) = header.hash() {
                        if hash.meets_difficulty(header.difficulty) {
                            searching.store(false, Ordering::SeqCst);
                            *solution.lock().expect("miner result lock poisoned") =
                                Some((nonce, hash));
                            return;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().expect("mining thread panicked");
        }

        let found = solution.lock().expect("miner result lock poisoned").take();
        found.ok_or_else(|| ChainError::Invariant("nonce space exhausted".to_string()))
    }
}
