use serde::{Deserialize, Serialize};
use shared::{Hash256, TxId};

/// Um passo de uma prova de Merkle: o irmão no nível e de que lado ele
/// entra na concatenação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: TxId,
    pub is_left: bool,
}

/// Árvore de Merkle binária e determinística sobre os txids de um bloco.
///
/// Árvore vazia tem raiz zero; folha única é a própria raiz; níveis de
/// cardinalidade ímpar duplicam o último elemento antes do pareamento.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    leaves: Vec<TxId>,
    root: TxId,
}

impl MerkleTree {
    /// Constrói a árvore a partir dos txids, na ordem do bloco
    #[must_use]
    pub fn new(leaves: Vec<TxId>) -> Self {
        let root = Self::compute_root(leaves.clone());
        Self { leaves, root }
    }

    /// Raiz da árvore
    #[must_use]
    pub const fn root(&self) -> TxId {
        self.root
    }

    fn compute_root(mut level: Vec<TxId>) -> TxId {
        if level.is_empty() {
            return Hash256::zero();
        }

        while level.len() > 1 {
            if level.len() % 2 != 0 {
                level.push(level[level.len() - 1]);
            }
            level = level
                .chunks(2)
                .map(|pair| combine(&pair[0], &pair[1]))
                .collect();
        }

        level[0]
    }

    /// Prova de inclusão da folha em `index`; vazia se o índice não
    /// existir ou se a árvore tiver uma única folha
    #[must_use]
    pub fn proof(&self, index: usize) -> Vec<ProofStep> {
        if index >= self.leaves.len() {
            return Vec::new();
        }

        let mut proof = Vec::new();
        let mut level = self.leaves.clone();
        let mut index = index;

        while level.len() > 1 {
            if level.len() % 2 != 0 {
                level.push(level[level.len() - 1]);
            }

            let (sibling_index, is_left) = if index % 2 == 0 {
                (index + 1, false)
            } else {
                (index - 1, true)
            };
            proof.push(ProofStep {
                sibling: level[sibling_index],
                is_left,
            });

            level = level
                .chunks(2)
                .map(|pair| combine(&pair[0], &pair[1]))
                .collect();
            index /= 2;
        }

        proof
    }

    /// Recompõe a raiz a partir da folha e da prova
    #[must_use]
    pub fn verify_proof(leaf: TxId, proof: &[ProofStep], root: TxId) -> bool {
        let mut current = leaf;
        for step in proof {
            current = if step.is_left {
                combine(&step.sibling, &current)
            } else {
                combine(&current, &step.sibling)
            };
        }
        current == root
    }
}

fn combine(left: &TxId, right: &TxId) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_bytes());
    data[32..].copy_from_slice(right.as_bytes());
    Hash256::double_sha256(&data)
}
