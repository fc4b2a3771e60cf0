//! 캔들 데이터 feature engineering.
//!
//! 모델 입력으로 사용하기 위해 캔들 데이터에서 기술 지표와
//! 파생 feature를 추출합니다.
//!
//! 지표 계산이 불가능한 경우(데이터 부족, 가격 0 등)에는 0으로
//! 대체하지 않고 명시적으로 실패합니다. 조용히 왜곡된 벡터는
//! 잘못된 국면 분류보다 찾기 어렵습니다.

use crate::features::vector::{FeatureVector, FEATURE_COUNT};
use analytics_core::{AnalyticsError, AnalyticsResult, Candle};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// feature 추출을 위한 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// 추세 회귀 기간
    pub regression_period: usize,
    /// RSI 기간
    pub rsi_period: usize,
    /// MACD 파라미터 (fast, slow, signal)
    pub macd_params: (usize, usize, usize),
    /// ATR 기간
    pub atr_period: usize,
    /// Bollinger Bands 기간
    pub bb_period: usize,
    /// Bollinger Bands 표준편차 승수
    pub bb_std_dev: f64,
    /// 거래량 평균 기간
    pub volume_period: usize,
    /// volume_ratio 상한 (클램프)
    pub volume_ratio_cap: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            regression_period: 20,
            rsi_period: 14,
            macd_params: (12, 26, 9),
            atr_period: 14,
            bb_period: 20,
            bb_std_dev: 2.0,
            volume_period: 20,
            volume_ratio_cap: 5.0,
        }
    }
}

impl FeatureConfig {
    /// feature 추출에 필요한 최소 캔들 수 반환.
    pub fn min_candles_required(&self) -> usize {
        *[
            self.regression_period,
            self.rsi_period + 1,
            self.macd_params.1 + self.macd_params.2,
            self.atr_period + 1,
            self.bb_period,
            self.volume_period,
            11, // return_10에 11개 종가 필요
        ]
        .iter()
        .max()
        .unwrap_or(&35)
    }
}

/// 캔들 데이터를 고정 스키마 feature vector로 변환하는 추출기.
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    /// 주어진 설정으로 새 feature 추출기 생성.
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 feature 추출기 생성.
    pub fn with_defaults() -> Self {
        Self::new(FeatureConfig::default())
    }

    /// 설정 반환.
    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// 캔들 슬라이스에서 feature 추출.
    ///
    /// 캔들은 오래된 것부터 최신 순으로 정렬되어야 합니다.
    /// 데이터가 부족하면 `InsufficientHistory`, 가격/거래량이 지표 계산에
    /// 부적합하면 `InvalidInput`을 반환합니다.
    pub fn extract(&self, candles: &[Candle]) -> AnalyticsResult<FeatureVector> {
        let min_required = self.config.min_candles_required();
        if candles.len() < min_required {
            return Err(AnalyticsError::InsufficientHistory {
                required: min_required,
                actual: candles.len(),
            });
        }

        let closes: Vec<f64> = candles
            .iter()
            .map(|c| decimal_to_f64(c.close, "close"))
            .collect::<AnalyticsResult<_>>()?;
        let highs: Vec<f64> = candles
            .iter()
            .map(|c| decimal_to_f64(c.high, "high"))
            .collect::<AnalyticsResult<_>>()?;
        let lows: Vec<f64> = candles
            .iter()
            .map(|c| decimal_to_f64(c.low, "low"))
            .collect::<AnalyticsResult<_>>()?;
        let volumes: Vec<f64> = candles
            .iter()
            .map(|c| decimal_to_f64(c.volume, "volume"))
            .collect::<AnalyticsResult<_>>()?;

        let current_close = *closes.last().ok_or_else(|| {
            AnalyticsError::InvalidInput("empty close series".to_string())
        })?;
        if current_close <= 0.0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "non-positive close price: {current_close}"
            )));
        }

        let (trend_direction, trend_strength) =
            self.calculate_trend(&closes, self.config.regression_period)?;

        let rsi = self.calculate_rsi(&closes, self.config.rsi_period)? / 100.0;

        let macd_histogram = self.calculate_macd_histogram(
            &closes,
            self.config.macd_params.0,
            self.config.macd_params.1,
            self.config.macd_params.2,
        )?;

        let atr = self.calculate_atr(&highs, &lows, &closes, self.config.atr_period)?;
        let atr_ratio = atr / current_close;

        let bb_width =
            self.calculate_bb_width(&closes, self.config.bb_period, self.config.bb_std_dev)?;

        let volume_ratio = self.calculate_volume_ratio(&volumes, self.config.volume_period)?;

        let return_5 = self.calculate_return(&closes, 5)?;
        let return_10 = self.calculate_return(&closes, 10)?;

        let values: [f64; FEATURE_COUNT] = [
            trend_direction,
            trend_strength,
            rsi,
            macd_histogram,
            atr_ratio,
            bb_width,
            volume_ratio,
            return_5,
            return_10,
        ];

        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::InvalidInput(
                "non-finite feature value computed".to_string(),
            ));
        }

        Ok(FeatureVector::new(values))
    }

    // === 비공개 계산 메서드 ===

    /// 최소자승 회귀로 (기울기 %/봉, |상관계수|) 계산.
    fn calculate_trend(&self, closes: &[f64], period: usize) -> AnalyticsResult<(f64, f64)> {
        if closes.len() < period || period < 2 {
            return Err(AnalyticsError::InsufficientHistory {
                required: period,
                actual: closes.len(),
            });
        }

        let window = &closes[closes.len() - period..];
        let n = period as f64;

        let mean_x = (n - 1.0) / 2.0;
        let mean_y = window.iter().sum::<f64>() / n;

        let mut cov_xy = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (i, y) in window.iter().enumerate() {
            let dx = i as f64 - mean_x;
            let dy = y - mean_y;
            cov_xy += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }

        if mean_y <= 0.0 {
            return Err(AnalyticsError::InvalidInput(
                "non-positive mean price in trend window".to_string(),
            ));
        }

        let slope = cov_xy / var_x;
        // 봉당 % 기울기로 정규화
        let slope_pct = slope / mean_y * 100.0;

        // 가격이 완전히 평평하면 추세 없음
        let strength = if var_y > 0.0 {
            (cov_xy / (var_x.sqrt() * var_y.sqrt())).abs()
        } else {
            0.0
        };

        Ok((slope_pct, strength.clamp(0.0, 1.0)))
    }

    fn calculate_rsi(&self, closes: &[f64], period: usize) -> AnalyticsResult<f64> {
        if closes.len() < period + 1 {
            return Err(AnalyticsError::InsufficientHistory {
                required: period + 1,
                actual: closes.len(),
            });
        }

        let start = closes.len() - period - 1;
        let mut gain_sum = 0.0;
        let mut loss_sum = 0.0;

        for i in (start + 1)..closes.len() {
            let change = closes[i] - closes[i - 1];
            if change > 0.0 {
                gain_sum += change;
            } else {
                loss_sum += change.abs();
            }
        }

        let avg_gain = gain_sum / period as f64;
        let avg_loss = loss_sum / period as f64;

        if avg_loss == 0.0 {
            return Ok(100.0);
        }

        let rs = avg_gain / avg_loss;
        Ok(100.0 - (100.0 / (1.0 + rs)))
    }

    fn calculate_ema(&self, data: &[f64], period: usize) -> f64 {
        let multiplier = 2.0 / (period as f64 + 1.0);
        let mut ema = data[0];
        for value in data.iter().skip(1) {
            ema = (value - ema) * multiplier + ema;
        }
        ema
    }

    /// MACD histogram을 현재가 대비 %로 정규화해 반환.
    fn calculate_macd_histogram(
        &self,
        closes: &[f64],
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> AnalyticsResult<f64> {
        let required = slow_period + signal_period;
        if closes.len() < required {
            return Err(AnalyticsError::InsufficientHistory {
                required,
                actual: closes.len(),
            });
        }

        let fast_ema = self.calculate_ema(closes, fast_period);
        let slow_ema = self.calculate_ema(closes, slow_period);
        let macd_line = fast_ema - slow_ema;

        // signal을 위해 MACD 라인 히스토리 계산
        let mut macd_history = Vec::with_capacity(closes.len() - slow_period + 1);
        for i in slow_period..=closes.len() {
            let fast = self.calculate_ema(&closes[..i], fast_period);
            let slow = self.calculate_ema(&closes[..i], slow_period);
            macd_history.push(fast - slow);
        }

        let signal_line = self.calculate_ema(&macd_history, signal_period);
        let histogram = macd_line - signal_line;

        let current_price = closes[closes.len() - 1];
        Ok(histogram / current_price * 100.0)
    }

    fn calculate_atr(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        period: usize,
    ) -> AnalyticsResult<f64> {
        if highs.len() < period + 1 {
            return Err(AnalyticsError::InsufficientHistory {
                required: period + 1,
                actual: highs.len(),
            });
        }

        let mut tr_sum = 0.0;
        let start = highs.len() - period;
        for i in start..highs.len() {
            let high_low = highs[i] - lows[i];
            let high_close = (highs[i] - closes[i - 1]).abs();
            let low_close = (lows[i] - closes[i - 1]).abs();
            tr_sum += high_low.max(high_close).max(low_close);
        }

        Ok(tr_sum / period as f64)
    }

    /// 밴드 폭 / 중간 밴드(SMA) 반환.
    fn calculate_bb_width(
        &self,
        closes: &[f64],
        period: usize,
        std_dev_mult: f64,
    ) -> AnalyticsResult<f64> {
        if closes.len() < period {
            return Err(AnalyticsError::InsufficientHistory {
                required: period,
                actual: closes.len(),
            });
        }

        let window = &closes[closes.len() - period..];
        let sma = window.iter().sum::<f64>() / period as f64;
        if sma <= 0.0 {
            return Err(AnalyticsError::InvalidInput(
                "non-positive SMA in Bollinger window".to_string(),
            ));
        }

        let variance = window.iter().map(|x| (x - sma).powi(2)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();

        Ok(2.0 * std_dev_mult * std_dev / sma)
    }

    fn calculate_volume_ratio(&self, volumes: &[f64], period: usize) -> AnalyticsResult<f64> {
        if volumes.len() < period {
            return Err(AnalyticsError::InsufficientHistory {
                required: period,
                actual: volumes.len(),
            });
        }

        let window = &volumes[volumes.len() - period..];
        let avg = window.iter().sum::<f64>() / period as f64;
        let current = volumes[volumes.len() - 1];

        if avg <= 0.0 {
            return Err(AnalyticsError::InvalidInput(
                "zero average volume".to_string(),
            ));
        }

        Ok((current / avg).clamp(0.0, self.config.volume_ratio_cap))
    }

    fn calculate_return(&self, closes: &[f64], period: usize) -> AnalyticsResult<f64> {
        if closes.len() <= period {
            return Err(AnalyticsError::InsufficientHistory {
                required: period + 1,
                actual: closes.len(),
            });
        }

        let current = closes[closes.len() - 1];
        let past = closes[closes.len() - 1 - period];
        if past <= 0.0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "non-positive past close: {past}"
            )));
        }

        Ok((current / past) - 1.0)
    }
}

fn decimal_to_f64(value: rust_decimal::Decimal, field: &str) -> AnalyticsResult<f64> {
    value.to_f64().ok_or_else(|| {
        AnalyticsError::InvalidInput(format!("{field} not representable as f64: {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn create_test_candles(count: usize) -> Vec<Candle> {
        let base_price = 50000.0;
        let start = Utc::now() - Duration::days(count as i64);

        (0..count)
            .map(|i| {
                let variation = (i as f64 * 0.1).sin() * 1000.0;
                let open = base_price + variation;
                let close = open + (i as f64 % 3.0 - 1.0) * 100.0;
                let high = open.max(close) + 50.0;
                let low = open.min(close) - 50.0;

                Candle::new(
                    start + Duration::days(i as i64),
                    Decimal::from_f64_retain(open).unwrap_or(dec!(50000)),
                    Decimal::from_f64_retain(high).unwrap_or(dec!(50050)),
                    Decimal::from_f64_retain(low).unwrap_or(dec!(49950)),
                    Decimal::from_f64_retain(close).unwrap_or(dec!(50000)),
                    dec!(100) + Decimal::from(i as u32),
                )
            })
            .collect()
    }

    #[test]
    fn test_min_candles_required() {
        let config = FeatureConfig::default();
        // MACD slow(26) + signal(9) = 35가 지배적
        assert_eq!(config.min_candles_required(), 35);
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::with_defaults();
        let candles = create_test_candles(100);

        let features = extractor.extract(&candles).unwrap();

        assert_eq!(features.len(), FEATURE_COUNT);
        assert!(features.is_finite());
        assert!(features.rsi() >= 0.0 && features.rsi() <= 1.0);
        assert!(features.atr_ratio() > 0.0);
        assert!(features.volume_ratio() > 0.0);
    }

    #[test]
    fn test_insufficient_history() {
        let extractor = FeatureExtractor::with_defaults();
        let candles = create_test_candles(10);

        let result = extractor.extract(&candles);
        match result {
            Err(AnalyticsError::InsufficientHistory { required, actual }) => {
                assert_eq!(required, 35);
                assert_eq!(actual, 10);
            }
            other => panic!("Expected InsufficientHistory, got {:?}", other),
        }
    }

    #[test]
    fn test_rising_market_trend() {
        let extractor = FeatureExtractor::with_defaults();
        let start = Utc::now() - Duration::days(100);

        // 꾸준히 상승하는 시장
        let candles: Vec<Candle> = (0..100)
            .map(|i| {
                let price = 100.0 + i as f64;
                Candle::new(
                    start + Duration::days(i as i64),
                    Decimal::from_f64_retain(price).unwrap(),
                    Decimal::from_f64_retain(price + 1.0).unwrap(),
                    Decimal::from_f64_retain(price - 1.0).unwrap(),
                    Decimal::from_f64_retain(price + 0.5).unwrap(),
                    dec!(1000),
                )
            })
            .collect();

        let features = extractor.extract(&candles).unwrap();
        assert!(features.trend_direction() > 0.0);
        assert!(features.trend_strength() > 0.9);
        assert!(features.return_10() > 0.0);
    }

    #[test]
    fn test_rsi_extremes() {
        let extractor = FeatureExtractor::with_defaults();

        let up_data: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi_up = extractor.calculate_rsi(&up_data, 14).unwrap();
        assert!(rsi_up > 90.0);

        let down_data: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rsi_down = extractor.calculate_rsi(&down_data, 14).unwrap();
        assert!(rsi_down < 10.0);
    }

    #[test]
    fn test_flat_market_has_no_trend() {
        let extractor = FeatureExtractor::with_defaults();
        let data = vec![100.0; 20];
        let (slope, strength) = extractor.calculate_trend(&data, 20).unwrap();
        assert!(slope.abs() < 1e-9);
        assert_eq!(strength, 0.0);
    }

    #[test]
    fn test_volume_ratio_capped() {
        let extractor = FeatureExtractor::with_defaults();
        let mut volumes = vec![10.0; 20];
        volumes[19] = 10_000.0; // 거래량 급증
        let ratio = extractor.calculate_volume_ratio(&volumes, 20).unwrap();
        assert_eq!(ratio, extractor.config().volume_ratio_cap);
    }
}
