//! 고정 스키마 feature vector.
//!
//! 모든 모델(국면 탐지, 전략 추천)은 동일한 9차원 입력을 공유합니다.
//! 스키마가 바뀌면 `FEATURE_SCHEMA_VERSION`을 올려야 하며, 다른 버전으로
//! 학습된 모델은 재학습 전까지 사용할 수 없습니다.

use serde::{Deserialize, Serialize};

/// feature 스키마 버전. 스키마 변경 시 증가.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// feature 개수 (고정).
pub const FEATURE_COUNT: usize = 9;

/// feature 이름 (벡터 내 순서와 동일).
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "trend_direction",
    "trend_strength",
    "rsi",
    "macd_histogram",
    "atr_ratio",
    "bb_width",
    "volume_ratio",
    "return_5",
    "return_10",
];

/// 단일 시점의 시장 상태를 요약한 feature vector.
///
/// 값의 순서는 `FEATURE_NAMES`와 일치합니다. 모든 값은 유한해야 하며
/// (NaN/무한대 금지), 추출기가 생성 시점에 이를 보장합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// 스키마 버전
    pub schema_version: u32,
    /// feature 값 (`FEATURE_NAMES` 순서)
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// 값 배열로부터 새 feature vector 생성.
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            schema_version: FEATURE_SCHEMA_VERSION,
            values,
        }
    }

    /// 값 슬라이스 반환.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// feature 개수 반환.
    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    /// 항상 false (스키마가 비어있지 않음).
    pub fn is_empty(&self) -> bool {
        false
    }

    /// 이름으로 feature 값 조회.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// 추세 방향 (20봉 회귀 기울기, %/봉)
    pub fn trend_direction(&self) -> f64 {
        self.values[0]
    }

    /// 추세 강도 (|상관계수|, 0..1)
    pub fn trend_strength(&self) -> f64 {
        self.values[1]
    }

    /// RSI (0..1 정규화)
    pub fn rsi(&self) -> f64 {
        self.values[2]
    }

    /// MACD histogram (가격 대비 %)
    pub fn macd_histogram(&self) -> f64 {
        self.values[3]
    }

    /// ATR / 종가 비율
    pub fn atr_ratio(&self) -> f64 {
        self.values[4]
    }

    /// Bollinger Bands bandwidth / SMA
    pub fn bb_width(&self) -> f64 {
        self.values[5]
    }

    /// 20봉 평균 대비 거래량 비율
    pub fn volume_ratio(&self) -> f64 {
        self.values[6]
    }

    /// 5봉 수익률
    pub fn return_5(&self) -> f64 {
        self.values[7]
    }

    /// 10봉 수익률
    pub fn return_10(&self) -> f64 {
        self.values[8]
    }

    /// 모든 값이 유한한지 확인.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_access() {
        let fv = FeatureVector::new([0.1, 0.8, 0.55, 0.02, 0.015, 0.04, 1.2, 0.03, 0.05]);

        assert_eq!(fv.len(), FEATURE_COUNT);
        assert_eq!(fv.schema_version, FEATURE_SCHEMA_VERSION);
        assert_eq!(fv.trend_direction(), 0.1);
        assert_eq!(fv.atr_ratio(), 0.015);
        assert_eq!(fv.get("rsi"), Some(0.55));
        assert_eq!(fv.get("unknown"), None);
    }

    #[test]
    fn test_names_match_accessors() {
        let fv = FeatureVector::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(fv.get("trend_direction"), Some(fv.trend_direction()));
        assert_eq!(fv.get("volume_ratio"), Some(fv.volume_ratio()));
        assert_eq!(fv.get("return_10"), Some(fv.return_10()));
    }

    #[test]
    fn test_is_finite() {
        let good = FeatureVector::new([0.0; FEATURE_COUNT]);
        assert!(good.is_finite());

        let mut bad_values = [0.0; FEATURE_COUNT];
        bad_values[3] = f64::NAN;
        let bad = FeatureVector::new(bad_values);
        assert!(!bad.is_finite());
    }
}
