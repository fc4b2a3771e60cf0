//! 시장 국면 탐지기.
//!
//! 가격 이력에서 슬라이딩 윈도우로 feature를 추출하고, 표준화한 뒤
//! 결정적 k-means로 클러스터링하여 국면 모델을 학습합니다. 분류는
//! 표준화 공간에서 최근접 centroid 탐색으로 수행됩니다.

use crate::features::{FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_SCHEMA_VERSION};
use crate::regime::kmeans::{euclidean_distance, run_kmeans};
use analytics_core::{AnalyticsError, AnalyticsResult, Candle, MarketRegime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// atr_ratio의 feature 인덱스 (HighVolatility 라벨링 기준).
const ATR_RATIO_INDEX: usize = 4;
/// trend_direction의 feature 인덱스 (Bullish/Bearish 라벨링 기준).
const TREND_DIRECTION_INDEX: usize = 0;

/// 국면 탐지 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// 클러스터 수 (k)
    pub clusters: usize,
    /// k-means 최대 반복 횟수
    pub max_iterations: usize,
    /// 학습 시 슬라이딩 윈도우 이동 간격
    pub window_step: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            clusters: 4,
            max_iterations: 100,
            window_step: 1,
        }
    }
}

/// 국면 분류 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    /// 분류된 국면
    pub regime: MarketRegime,
    /// 분류 신뢰도 (0..1)
    pub confidence: f64,
    /// 최근접 centroid 인덱스
    pub centroid_index: usize,
}

/// 학습된 국면 모델. 학습 후 불변.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeModel {
    /// 표준화 공간의 centroid (k × FEATURE_COUNT)
    centroids: Vec<Vec<f64>>,
    /// centroid별 국면 라벨
    labels: Vec<MarketRegime>,
    /// 컬럼별 평균 (표준화)
    feature_means: Vec<f64>,
    /// 컬럼별 표준편차 (표준화)
    feature_stds: Vec<f64>,
    /// 학습에 사용된 feature 스키마 버전
    schema_version: u32,
    /// 학습 샘플 수
    sample_count: usize,
}

impl RegimeModel {
    /// 클러스터 수 반환.
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// 학습 샘플 수 반환.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// centroid 라벨 목록 반환.
    pub fn labels(&self) -> &[MarketRegime] {
        &self.labels
    }

    /// feature vector를 국면으로 분류.
    ///
    /// 표준화 공간에서 최근접 centroid를 찾습니다. 신뢰도는
    /// `1 - d1/d2` (d1 = 최근접, d2 = 차근접 거리)이며, centroid 위에
    /// 정확히 올라간 경우에만 1.0, 두 centroid와 등거리면 0이 됩니다.
    pub fn classify(&self, features: &FeatureVector) -> AnalyticsResult<RegimeClassification> {
        if features.schema_version != self.schema_version {
            return Err(AnalyticsError::InvalidInput(format!(
                "feature schema version mismatch: model {}, input {}",
                self.schema_version, features.schema_version
            )));
        }
        if !features.is_finite() {
            return Err(AnalyticsError::InvalidInput(
                "non-finite feature value".to_string(),
            ));
        }

        let standardized = self.standardize(features.as_slice());

        // 최근접/차근접 centroid 탐색. 동률은 낮은 인덱스 유지.
        let mut best = 0usize;
        let mut d1 = euclidean_distance(&standardized, &self.centroids[0]);
        let mut d2 = f64::INFINITY;
        for (i, centroid) in self.centroids.iter().enumerate().skip(1) {
            let dist = euclidean_distance(&standardized, centroid);
            if dist < d1 {
                d2 = d1;
                d1 = dist;
                best = i;
            } else if dist < d2 {
                d2 = dist;
            }
        }

        let confidence = if d1 == 0.0 && d2 > 0.0 {
            1.0
        } else if d2 == 0.0 || !d2.is_finite() {
            0.0
        } else {
            (1.0 - d1 / d2).clamp(0.0, 1.0)
        };

        Ok(RegimeClassification {
            regime: self.labels[best],
            confidence,
            centroid_index: best,
        })
    }

    fn standardize(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (v - self.feature_means[i]) / self.feature_stds[i])
            .collect()
    }
}

/// 국면 모델 학습기.
pub struct RegimeDetector {
    extractor: FeatureExtractor,
    config: RegimeConfig,
}

impl RegimeDetector {
    /// 주어진 설정으로 새 탐지기 생성.
    pub fn new(extractor: FeatureExtractor, config: RegimeConfig) -> Self {
        Self { extractor, config }
    }

    /// 기본 설정으로 탐지기 생성.
    pub fn with_defaults() -> Self {
        Self::new(FeatureExtractor::with_defaults(), RegimeConfig::default())
    }

    /// feature 추출기 반환.
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// 가격 이력으로부터 국면 모델 학습.
    ///
    /// 동일한 입력에 대해 항상 동일한 모델을 생성합니다 (RNG 없음).
    pub fn train(&self, candles: &[Candle], k: usize) -> AnalyticsResult<RegimeModel> {
        let window_size = self.extractor.config().min_candles_required();
        let step = self.config.window_step.max(1);

        // 슬라이딩 윈도우로 feature 추출
        let mut samples: Vec<FeatureVector> = Vec::new();
        let mut start = 0usize;
        while start + window_size <= candles.len() {
            let window = &candles[start..start + window_size];
            samples.push(self.extractor.extract(window)?);
            start += step;
        }

        if samples.len() < k {
            return Err(AnalyticsError::InsufficientHistory {
                required: window_size + (k - 1) * step,
                actual: candles.len(),
            });
        }

        // 컬럼 표준화 (평균 0, 표준편차 1; 상수 컬럼은 std 1 유지)
        let n = samples.len() as f64;
        let mut means = vec![0.0; FEATURE_COUNT];
        for sample in &samples {
            for (m, v) in means.iter_mut().zip(sample.as_slice().iter()) {
                *m += v;
            }
        }
        for m in means.iter_mut() {
            *m /= n;
        }

        let mut stds = vec![0.0; FEATURE_COUNT];
        for sample in &samples {
            for (i, v) in sample.as_slice().iter().enumerate() {
                stds[i] += (v - means[i]).powi(2);
            }
        }
        for s in stds.iter_mut() {
            *s = (*s / n).sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        let points: Vec<Vec<f64>> = samples
            .iter()
            .map(|sample| {
                sample
                    .as_slice()
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v - means[i]) / stds[i])
                    .collect()
            })
            .collect();

        let result = run_kmeans(&points, k, self.config.max_iterations)?;
        let labels = assign_labels(&result.centroids);

        debug!(
            samples = samples.len(),
            iterations = result.iterations,
            "regime clustering converged"
        );
        info!(k, samples = samples.len(), "regime model trained");

        Ok(RegimeModel {
            centroids: result.centroids,
            labels,
            feature_means: means,
            feature_stds: stds,
            schema_version: FEATURE_SCHEMA_VERSION,
            sample_count: samples.len(),
        })
    }
}

/// centroid에 국면 라벨 부여.
///
/// atr_ratio가 가장 높은 centroid → HighVolatility. 나머지 중
/// trend_direction이 가장 높은 것 → TrendingBullish, 가장 낮은 것 →
/// TrendingBearish, 그 외 → Ranging. 동률은 모두 낮은 인덱스가 이깁니다.
/// 표준화는 컬럼 단위 선형 변환이므로 순위가 보존됩니다.
fn assign_labels(centroids: &[Vec<f64>]) -> Vec<MarketRegime> {
    let k = centroids.len();
    let mut labels = vec![MarketRegime::Ranging; k];

    let Some(high_vol) = argmax_by(centroids, |c| c[ATR_RATIO_INDEX], &[]) else {
        return labels;
    };
    labels[high_vol] = MarketRegime::HighVolatility;

    if let Some(bullish) = argmax_by(centroids, |c| c[TREND_DIRECTION_INDEX], &[high_vol]) {
        labels[bullish] = MarketRegime::TrendingBullish;

        let bearish = argmin_by(
            centroids,
            |c| c[TREND_DIRECTION_INDEX],
            &[high_vol, bullish],
        );
        if let Some(bearish) = bearish {
            labels[bearish] = MarketRegime::TrendingBearish;
        }
    }

    labels
}

fn argmax_by(
    centroids: &[Vec<f64>],
    key: impl Fn(&Vec<f64>) -> f64,
    excluded: &[usize],
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in centroids.iter().enumerate() {
        if excluded.contains(&i) {
            continue;
        }
        let value = key(c);
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

fn argmin_by(
    centroids: &[Vec<f64>],
    key: impl Fn(&Vec<f64>) -> f64,
    excluded: &[usize],
) -> Option<usize> {
    argmax_by(centroids, |c| -key(c), excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn make_candles(prices: &[f64], volatility: f64) -> Vec<Candle> {
        let start = Utc::now() - Duration::days(prices.len() as i64);
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| {
                Candle::new(
                    start + Duration::days(i as i64),
                    Decimal::from_f64_retain(price).unwrap(),
                    Decimal::from_f64_retain(price * (1.0 + volatility)).unwrap(),
                    Decimal::from_f64_retain(price * (1.0 - volatility)).unwrap(),
                    Decimal::from_f64_retain(price).unwrap(),
                    dec!(1000),
                )
            })
            .collect()
    }

    fn mixed_history() -> Vec<Candle> {
        // 상승 → 하락 → 횡보 → 고변동 구간을 이어붙인 이력
        let mut prices: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        prices.extend((0..80).map(|i| 180.0 - i as f64 * 0.8));
        prices.extend((0..80).map(|i| 116.0 + (i as f64 * 0.7).sin()));
        prices.extend((0..80).map(|i| 116.0 + (i as f64 * 1.3).sin() * 15.0));
        make_candles(&prices, 0.01)
    }

    #[test]
    fn test_train_and_classify() {
        let detector = RegimeDetector::with_defaults();
        let candles = mixed_history();

        let model = detector.train(&candles, 4).unwrap();
        assert_eq!(model.cluster_count(), 4);

        // 4개 라벨이 모두 한 번씩 부여되어야 함 (k=4)
        let mut seen = model.labels().to_vec();
        seen.sort_by_key(|r| r.index());
        assert_eq!(
            seen,
            vec![
                MarketRegime::TrendingBullish,
                MarketRegime::TrendingBearish,
                MarketRegime::Ranging,
                MarketRegime::HighVolatility,
            ]
        );

        let features = detector
            .extractor()
            .extract(&candles[candles.len() - 40..])
            .unwrap();
        let classification = model.classify(&features).unwrap();
        assert!(classification.confidence >= 0.0 && classification.confidence <= 1.0);
    }

    #[test]
    fn test_training_is_deterministic() {
        let detector = RegimeDetector::with_defaults();
        let candles = mixed_history();

        let a = detector.train(&candles, 4).unwrap();
        let b = detector.train(&candles, 4).unwrap();

        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.feature_means, b.feature_means);
    }

    #[test]
    fn test_insufficient_history_for_training() {
        let detector = RegimeDetector::with_defaults();
        let candles = make_candles(&[100.0; 20], 0.01);

        let result = detector.train(&candles, 4);
        assert!(matches!(
            result,
            Err(AnalyticsError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_schema_version_mismatch() {
        let detector = RegimeDetector::with_defaults();
        let candles = mixed_history();
        let model = detector.train(&candles, 4).unwrap();

        let mut features = detector
            .extractor()
            .extract(&candles[..50])
            .unwrap();
        features.schema_version += 1;

        let result = model.classify(&features);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_label_assignment_ranking() {
        // 수작업 centroid: [trend_direction, _, _, _, atr_ratio, ...]
        let mut c_high_vol = vec![0.0; 9];
        c_high_vol[ATR_RATIO_INDEX] = 5.0;
        let mut c_bull = vec![0.0; 9];
        c_bull[TREND_DIRECTION_INDEX] = 2.0;
        let mut c_bear = vec![0.0; 9];
        c_bear[TREND_DIRECTION_INDEX] = -2.0;
        let c_range = vec![0.0; 9];

        let labels = assign_labels(&[c_bull, c_high_vol, c_range, c_bear]);
        assert_eq!(labels[0], MarketRegime::TrendingBullish);
        assert_eq!(labels[1], MarketRegime::HighVolatility);
        assert_eq!(labels[2], MarketRegime::Ranging);
        assert_eq!(labels[3], MarketRegime::TrendingBearish);
    }

    #[test]
    fn test_label_ties_break_by_index() {
        // 모든 centroid가 동일하면 인덱스 순으로 HighVol, Bullish, Bearish, Ranging
        let c = vec![0.0; 9];
        let labels = assign_labels(&[c.clone(), c.clone(), c.clone(), c]);
        assert_eq!(labels[0], MarketRegime::HighVolatility);
        assert_eq!(labels[1], MarketRegime::TrendingBullish);
        assert_eq!(labels[2], MarketRegime::TrendingBearish);
        assert_eq!(labels[3], MarketRegime::Ranging);
    }
}
