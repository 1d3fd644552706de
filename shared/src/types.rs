//! Tipos compartilhados entre os módulos do Bespin

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Alias para identificador único de transação
pub type TxId = crate::Hash256;

/// Alias para identificador único de bloco
pub type BlockId = crate::Hash256;

/// Alias para chave pública em formato string hexadecimal
pub type PublicKeyHex = String;

/// Alias para timestamp Unix em milissegundos
pub type Timestamp = i64;

/// Alias para altura do bloco na blockchain
pub type BlockHeight = u64;

/// Satoshis por moeda (1 BSP = 10^8 satoshis)
pub const COIN: u64 = 100_000_000;

/// Menor valor transacionável (1 satoshi)
pub const DUST: Amount = Amount::from_sats(1);

/// Erro de conversão decimal de valores monetários
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("Valor monetário inválido: {0}")]
    Invalid(String),

    #[error("Precisão acima de 8 casas decimais: {0}")]
    TooPrecise(String),

    #[error("Overflow no valor monetário: {0}")]
    Overflow(String),
}

/// Valor monetário em satoshis (ponto fixo 10^-8).
///
/// Toda a contabilidade interna usa inteiros; strings decimais só
/// existem na borda (RPC, CLI) e a conversão é exata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Cria um valor a partir de satoshis
    #[must_use]
    pub const fn from_sats(sats: u64) -> Self {
        Self(sats)
    }

    /// Cria um valor a partir de moedas inteiras
    #[must_use]
    pub const fn from_coins(coins: u64) -> Self {
        Self(coins * COIN)
    }

    /// Valor em satoshis
    #[must_use]
    pub const fn sats(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(diff) => Some(Self(diff)),
            None => None,
        }
    }

    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Converte uma string decimal ("12.5", "0.00000001") em satoshis,
    /// sem passar por ponto flutuante
    ///
    /// # Errors
    ///
    /// Retorna erro para formato inválido, mais de 8 casas decimais ou overflow
    pub fn from_decimal_str(s: &str) -> Result<Self, AmountError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Invalid(s.to_string()));
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac.len() > 8 {
            return Err(AmountError::TooPrecise(s.to_string()));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(AmountError::Invalid(s.to_string()));
        }

        let whole_sats = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .map_err(|_| AmountError::Overflow(s.to_string()))?
                .checked_mul(COIN)
                .ok_or_else(|| AmountError::Overflow(s.to_string()))?
        };

        let mut frac_digits = frac.to_string();
        while frac_digits.len() < 8 {
            frac_digits.push('0');
        }
        let frac_sats = if frac_digits.is_empty() {
            0
        } else {
            frac_digits
                .parse::<u64>()
                .map_err(|_| AmountError::Invalid(s.to_string()))?
        };

        whole_sats
            .checked_add(frac_sats)
            .map(Self)
            .ok_or_else(|| AmountError::Overflow(s.to_string()))
    }

    /// Renderiza como string decimal exata, sem zeros finais supérfluos
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / COIN;
        let frac = self.0 % COIN;
        if frac == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{frac:08}");
        let trimmed = frac_str.trim_end_matches('0');
        format!("{whole}.{trimmed}")
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parsing() {
        assert_eq!(Amount::from_decimal_str("10").unwrap(), Amount::from_coins(10));
        assert_eq!(
            Amount::from_decimal_str("0.00000001").unwrap(),
            Amount::from_sats(1)
        );
        assert_eq!(
            Amount::from_decimal_str("12.5").unwrap(),
            Amount::from_sats(12 * COIN + 50_000_000)
        );
        assert_eq!(Amount::from_decimal_str(".5").unwrap(), Amount::from_sats(50_000_000));
    }

    #[test]
    fn test_decimal_parsing_rejects_garbage() {
        assert!(Amount::from_decimal_str("").is_err());
        assert!(Amount::from_decimal_str(".").is_err());
        assert!(Amount::from_decimal_str("-1").is_err());
        assert!(Amount::from_decimal_str("1.2.3").is_err());
        assert!(Amount::from_decimal_str("abc").is_err());
        // 9 casas decimais
        assert_eq!(
            Amount::from_decimal_str("0.000000001"),
            Err(AmountError::TooPrecise("0.000000001".to_string()))
        );
    }

    #[test]
    fn test_decimal_rendering() {
        assert_eq!(Amount::from_coins(50).to_decimal_string(), "50");
        assert_eq!(Amount::from_sats(1).to_decimal_string(), "0.00000001");
        assert_eq!(
            Amount::from_sats(12 * COIN + 50_000_000).to_decimal_string(),
            "12.5"
        );
    }

    #[test]
    fn test_round_trip_is_exact() {
        for sats in [0u64, 1, 99, COIN, COIN + 1, 21 * COIN + 12_345_678] {
            let amount = Amount::from_sats(sats);
            let parsed = Amount::from_decimal_str(&amount.to_decimal_string()).unwrap();
            assert_eq!(parsed, amount);
        }
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_sats(u64::MAX);
        assert!(a.checked_add(Amount::from_sats(1)).is_none());
        assert_eq!(
            Amount::from_sats(5).checked_sub(Amount::from_sats(7)),
            None
        );
        assert_eq!(
            Amount::from_sats(7).checked_sub(Amount::from_sats(5)),
            Some(Amount::from_sats(2))
        );
    }

    #[test]
    fn test_serde_as_plain_integer() {
        let amount = Amount::from_coins(50);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "5000000000");
    }
}
