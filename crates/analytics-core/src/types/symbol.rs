//! 심볼 및 시장 유형 정의.
//!
//! 이 모듈은 분석 대상 심볼 관련 타입을 정의합니다:
//! - `MarketType` - 시장 유형 (주식, 암호화폐, ETF)
//! - `Symbol` - 분석 가능한 상품을 나타내는 심볼

use serde::{Deserialize, Serialize};
use std::fmt;

/// 시장 유형 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// 주식 시장
    Stock,
    /// 암호화폐 현물 시장
    Crypto,
    /// 상장지수펀드
    Etf,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Stock => write!(f, "stock"),
            MarketType::Crypto => write!(f, "crypto"),
            MarketType::Etf => write!(f, "etf"),
        }
    }
}

/// 분석 가능한 상품을 나타내는 심볼.
///
/// 심볼은 티커와 시장 유형으로 구성됩니다. 예: 주식의 AAPL,
/// 암호화폐의 BTC/USDT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 티커 (예: AAPL, BTC/USDT)
    pub ticker: String,
    /// 시장 유형
    pub market_type: MarketType,
}

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(ticker: impl Into<String>, market_type: MarketType) -> Self {
        Self {
            ticker: ticker.into().to_uppercase(),
            market_type,
        }
    }

    /// 주식 심볼을 생성합니다.
    pub fn stock(ticker: impl Into<String>) -> Self {
        Self::new(ticker, MarketType::Stock)
    }

    /// 암호화폐 심볼을 생성합니다.
    pub fn crypto(ticker: impl Into<String>) -> Self {
        Self::new(ticker, MarketType::Crypto)
    }

    /// ETF 심볼을 생성합니다.
    pub fn etf(ticker: impl Into<String>) -> Self {
        Self::new(ticker, MarketType::Etf)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_creation() {
        let symbol = Symbol::stock("aapl");
        assert_eq!(symbol.ticker, "AAPL");
        assert_eq!(symbol.market_type, MarketType::Stock);
    }

    #[test]
    fn test_symbol_display() {
        let symbol = Symbol::crypto("BTC/USDT");
        assert_eq!(symbol.to_string(), "BTC/USDT");
    }

    #[test]
    fn test_market_type_display() {
        assert_eq!(MarketType::Stock.to_string(), "stock");
        assert_eq!(MarketType::Etf.to_string(), "etf");
    }
}
