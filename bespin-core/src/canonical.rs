//! Codificação canônica dos campos endereçados por conteúdo.
//!
//! Txids, imagens de assinatura e hashes de cabeçalho são calculados sobre
//! JSON compacto com chaves ordenadas: o valor é serializado para
//! `serde_json::Value` (cujo `Map` é um `BTreeMap`, portanto ordenado) e
//! então para bytes, sem espaços em branco. Hashes aparecem como hex
//! minúsculo, valores monetários como satoshis inteiros e timestamps como
//! milissegundos Unix inteiros. Esta codificação está travada: mudá-la
//! mudaria todos os txids e hashes de bloco já persistidos.

use crate::error::ChainResult;
use serde::Serialize;

/// Serializa o valor na codificação canônica travada
///
/// # Errors
///
/// Retorna erro se o valor não puder ser representado em JSON
pub fn to_canonical_json<T: Serialize>(value: &T) -> ChainResult<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Unordered {
        zebra: u32,
        alpha: u32,
        inner: Inner,
    }

    #[derive(Serialize)]
    struct Inner {
        beta: u32,
        aleph: u32,
    }

    #[test]
    fn test_keys_are_sorted_recursively() {
        let value = Unordered {
            zebra: 1,
            alpha: 2,
            inner: Inner { beta: 3, aleph: 4 },
        };
        let encoded = to_canonical_json(&value).unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            r#"{"alpha":2,"inner":{"aleph":4,"beta":3},"zebra":1}"#
        );
    }

    #[test]
    fn test_no_whitespace() {
        let encoded = to_canonical_json(&vec![1, 2, 3]).unwrap();
        assert_eq!(encoded, b"[1,2,3]");
    }
}
