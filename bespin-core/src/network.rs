//! Esquema e roteamento das mensagens de gossip.
//!
//! O transporte é um colaborador externo; aqui fica só o vocabulário
//! JSON trocado entre pares e o roteamento das mensagens para os
//! caminhos de admissão do ledger. Nada vindo de um par é confiado:
//! blocos e transações recebidos passam pela validação completa de
//! `submit_block` / `submit_transaction`, que rederiva txids, merkle
//! root e hash.

use crate::block::Block;
use crate::blockchain::Blockchain;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Mensagens trocadas na rede de pares, discriminadas pelo campo `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "NEW_BLOCK")]
    NewBlock { block: Block },
    #[serde(rename = "NEW_TRANSACTION")]
    NewTransaction { transaction: Transaction },
    #[serde(rename = "GET_BLOCKS")]
    GetBlocks { start_index: u64 },
    #[serde(rename = "BLOCKS_RESPONSE")]
    BlocksResponse { blocks: Vec<Block> },
    #[serde(rename = "GET_PEERS")]
    GetPeers,
    #[serde(rename = "PEERS_RESPONSE")]
    PeersResponse { peers: Vec<String> },
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "PONG")]
    Pong,
}

/// Quantos blocos uma resposta de sincronização devolve no máximo
const MAX_BLOCKS_PER_RESPONSE: u64 = 500;

/// Processa uma mensagem recebida de um par e devolve a resposta, se
/// houver. Blocos e transações entram pelos mesmos caminhos de admissão
/// das submissões locais; rejeições são registradas e não derrubam a
/// conexão.
pub fn handle_message(
    chain: &Blockchain,
    message: Message,
    known_peers: &[String],
) -> Option<Message> {
    match message {
        Message::Ping => Some(Message::Pong),
        Message::Pong => None,

        Message::GetPeers => Some(Message::PeersResponse {
            peers: known_peers.to_vec(),
        }),
        Message::PeersResponse { .. } => None,

        Message::GetBlocks { start_index } => {
            let mut blocks = Vec::new();
            let end = start_index.saturating_add(MAX_BLOCKS_PER_RESPONSE);
            for index in start_index..end {
                match chain.block_by_index(index) {
                    Ok(Some(block)) => blocks.push(block),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, index, "falha ao carregar bloco para sincronização");
                        break;
                    }
                }
            }
            Some(Message::BlocksResponse { blocks })
        }
        Message::BlocksResponse { blocks } => {
            for block in blocks {
                let index = block.header.index;
                if let Err(err) = chain.submit_block(block) {
                    debug!(%err, index, "bloco sincronizado rejeitado");
                }
            }
            None
        }

        Message::NewBlock { block } => {
            let index = block.header.index;
            match chain.submit_block(block) {
                Ok(()) => debug!(index, "bloco do gossip aceito"),
                Err(err) => warn!(%err, index, "bloco do gossip rejeitado"),
            }
            None
        }
        Message::NewTransaction { transaction } => {
            let txid = transaction.txid;
            match chain.submit_transaction(transaction) {
                Ok(()) => debug!(%txid, "transação do gossip aceita"),
                Err(err) => warn!(%err, %txid, "transação do gossip rejeitada"),
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::Miner;
    use shared::{Amount, KeyPair};
    use tempfile::TempDir;

    fn open_chain(dir: &TempDir, founder: &KeyPair) -> Blockchain {
        Blockchain::open(dir.path().join("chain.db"), 1, Some(founder.address())).unwrap()
    }

    #[test]
    fn test_ping_pong() {
        let dir = TempDir::new().unwrap();
        let founder = KeyPair::generate();
        let chain = open_chain(&dir, &founder);

        assert_eq!(handle_message(&chain, Message::Ping, &[]), Some(Message::Pong));
        assert_eq!(handle_message(&chain, Message::Pong, &[]), None);
    }

    #[test]
    fn test_get_peers() {
        let dir = TempDir::new().unwrap();
        let founder = KeyPair::generate();
        let chain = open_chain(&dir, &founder);
        let peers = vec!["10.0.0.1:5000".to_string()];

        assert_eq!(
            handle_message(&chain, Message::GetPeers, &peers),
            Some(Message::PeersResponse { peers })
        );
    }

    #[test]
    fn test_get_blocks_returns_chain_segment() {
        let dir = TempDir::new().unwrap();
        let founder = KeyPair::generate();
        let chain = open_chain(&dir, &founder);

        let template = chain.get_work("miner").unwrap();
        chain.submit_block(Miner::new(1).solve(&template).unwrap()).unwrap();

        let response = handle_message(&chain, Message::GetBlocks { start_index: 0 }, &[]);
        let Some(Message::BlocksResponse { blocks }) = response else {
            panic!("expected BLOCKS_RESPONSE");
        };
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].header.index, 0);
        assert_eq!(blocks[1].header.index, 1);
    }

    #[test]
    fn test_gossiped_transaction_goes_through_admission() {
        let dir = TempDir::new().unwrap();
        let founder = KeyPair::generate();
        let chain = open_chain(&dir, &founder);

        let tx = chain
            .create_transaction(&founder, KeyPair::generate().address(), Amount::from_coins(3))
            .unwrap()
            .unwrap();
        assert_eq!(
            handle_message(&chain, Message::NewTransaction { transaction: tx }, &[]),
            None
        );
        assert_eq!(chain.pending_count(), 1);

        // transação adulterada não entra
        let mut forged = chain
            .create_transaction(&founder, KeyPair::generate().address(), Amount::from_coins(3))
            .unwrap()
            .unwrap();
        forged.outputs[0].amount = Amount::from_coins(1_000_000);
        handle_message(&chain, Message::NewTransaction { transaction: forged }, &[]);
        assert_eq!(chain.pending_count(), 1);
    }

    #[test]
    fn test_gossiped_block_goes_through_admission() {
        let dir = TempDir::new().unwrap();
        let founder = KeyPair::generate();
        let chain = open_chain(&dir, &founder);

        let good = Miner::new(1).solve(&chain.get_work("miner").unwrap()).unwrap();
        handle_message(&chain, Message::NewBlock { block: good }, &[]);
        assert_eq!(chain.height().unwrap(), 2);

        // repetição é obsoleta e não muda a cadeia
        let stale = Miner::new(1)
            .solve(&chain.get_work("other").unwrap())
            .map(|mut block| {
                block.header.index = 1;
                block
            })
            .unwrap();
        handle_message(&chain, Message::NewBlock { block: stale }, &[]);
        assert_eq!(chain.height().unwrap(), 2);
    }

    #[test]
    fn test_wire_format_uses_type_tags() {
        let encoded = serde_json::to_value(&Message::Ping).unwrap();
        assert_eq!(encoded["type"], "PING");

        let decoded: Message =
            serde_json::from_str(r#"{"type":"GET_BLOCKS","start_index":3}"#).unwrap();
        assert_eq!(decoded, Message::GetBlocks { start_index: 3 });
    }
}
