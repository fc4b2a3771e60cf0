//! 시장 데이터 타입.
//!
//! 이 모듈은 파이프라인의 유일한 원시 입력인 OHLCV 캔들을 정의합니다.
//! 캔들은 시세 제공자가 생성하며, 모든 분석 컴포넌트는 읽기 전용으로
//! 소비합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 캔들 몸통 크기(절대값)를 반환합니다.
    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 양봉(종가 > 시가)인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// 음봉(종가 < 시가)인지 확인합니다.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// 대표가(고가+저가+종가 평균)를 반환합니다.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle::new(Utc::now(), open, high, low, close, dec!(1000))
    }

    #[test]
    fn test_body_and_range() {
        let c = candle(dec!(100), dec!(110), dec!(95), dec!(105));
        assert_eq!(c.body_size(), dec!(5));
        assert_eq!(c.range(), dec!(15));
    }

    #[test]
    fn test_direction() {
        assert!(candle(dec!(100), dec!(110), dec!(95), dec!(105)).is_bullish());
        assert!(candle(dec!(105), dec!(110), dec!(95), dec!(100)).is_bearish());
    }

    #[test]
    fn test_typical_price() {
        let c = candle(dec!(100), dec!(110), dec!(95), dec!(104));
        assert_eq!(c.typical_price(), dec!(103));
    }
}
