//! 전략 추천 모델.
//!
//! 학습 샘플로 random forest를 학습하고, `feature ⊕ one-hot(국면)` 입력에
//! 대해 카탈로그 전체 전략에 대한 확률 분포를 추천으로 변환합니다.

use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_SCHEMA_VERSION};
use crate::recommend::catalog::StrategyCatalog;
use crate::recommend::forest::{ForestConfig, RandomForest};
use crate::recommend::sampler::TrainingSample;
use analytics_core::{
    AnalyticsError, AnalyticsResult, MarketRegime, StrategyId, StrategyRecommendation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// 추천 모델 학습 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// 클래스당 최소 샘플 수 (미달 클래스는 학습에서 제외)
    pub min_samples_per_strategy: usize,
    /// forest 설정
    pub forest: ForestConfig,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            min_samples_per_strategy: 10,
            forest: ForestConfig::default(),
        }
    }
}

/// 학습된 전략 추천 모델. 학습 후 불변.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyModel {
    forest: RandomForest,
    /// 학습된 클래스 (카탈로그 등록 순서)
    trained_classes: Vec<StrategyId>,
    /// 학습 당시 카탈로그 버전
    catalog_version: u64,
    /// 학습에 사용된 feature 스키마 버전
    schema_version: u32,
    /// 학습 샘플 수 (제외 클래스 드롭 후)
    sample_count: usize,
}

impl StrategyModel {
    /// 학습 샘플로 모델 학습.
    ///
    /// `min_samples_per_strategy` 미만인 클래스는 학습 클래스 목록에서
    /// 제외되고 해당 샘플은 버려집니다. 모든 클래스가 제외되면
    /// `EmptyTrainingSet`입니다. 동일 입력과 시드에 대해 결정적입니다.
    pub fn train(
        samples: &[TrainingSample],
        catalog: &StrategyCatalog,
        config: &RecommenderConfig,
    ) -> AnalyticsResult<Self> {
        if samples.is_empty() {
            return Err(AnalyticsError::EmptyTrainingSet);
        }

        let mut counts: HashMap<&StrategyId, usize> = HashMap::new();
        for sample in samples {
            *counts.entry(&sample.best_strategy).or_insert(0) += 1;
        }

        // 카탈로그 등록 순서대로 학습 클래스 결정
        let trained_classes: Vec<StrategyId> = catalog
            .strategies()
            .iter()
            .filter(|id| counts.get(id).copied().unwrap_or(0) >= config.min_samples_per_strategy)
            .cloned()
            .collect();

        for (id, count) in &counts {
            if *count < config.min_samples_per_strategy {
                warn!(
                    strategy = %id,
                    samples = count,
                    required = config.min_samples_per_strategy,
                    "strategy excluded from training: too few samples"
                );
            }
        }

        if trained_classes.is_empty() {
            return Err(AnalyticsError::EmptyTrainingSet);
        }

        let class_index: HashMap<&StrategyId, usize> = trained_classes
            .iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        let mut inputs = Vec::new();
        let mut labels = Vec::new();
        for sample in samples {
            let Some(&label) = class_index.get(&sample.best_strategy) else {
                continue; // 제외된 클래스의 샘플
            };
            inputs.push(model_input(&sample.features, sample.regime));
            labels.push(label);
        }

        let forest = RandomForest::fit(&inputs, &labels, trained_classes.len(), &config.forest)?;

        info!(
            classes = trained_classes.len(),
            samples = inputs.len(),
            catalog_version = catalog.version(),
            "strategy model trained"
        );

        Ok(Self {
            forest,
            trained_classes,
            catalog_version: catalog.version(),
            schema_version: FEATURE_SCHEMA_VERSION,
            sample_count: inputs.len(),
        })
    }

    /// 학습 당시 카탈로그 버전 반환.
    pub fn catalog_version(&self) -> u64 {
        self.catalog_version
    }

    /// 학습 샘플 수 반환.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// 학습된 클래스 목록 반환.
    pub fn trained_classes(&self) -> &[StrategyId] {
        &self.trained_classes
    }

    /// 현재 시장 상태에 맞는 전략 추천.
    ///
    /// 확률 분포는 카탈로그 전체 전략 위에 정의됩니다. 학습되지 않은
    /// 전략은 확률 0으로 포함되어 재학습 후 다시 선택될 수 있습니다.
    /// 결과는 확률 내림차순 안정 정렬(동률은 등록 순서 유지)되어
    /// `top_n`개로 잘립니다.
    ///
    /// `confidence`는 해당 확률에 균등 사전분포 대비 마진을 곱한 값입니다.
    pub fn recommend(
        &self,
        features: &FeatureVector,
        regime: MarketRegime,
        top_n: usize,
        catalog: &StrategyCatalog,
    ) -> AnalyticsResult<Vec<StrategyRecommendation>> {
        if catalog.version() != self.catalog_version {
            return Err(AnalyticsError::InvalidInput(format!(
                "strategy catalog changed since training (model version {}, current {}); retrain required",
                self.catalog_version,
                catalog.version()
            )));
        }
        if features.schema_version != self.schema_version {
            return Err(AnalyticsError::InvalidInput(format!(
                "feature schema version mismatch: model {}, input {}",
                self.schema_version, features.schema_version
            )));
        }

        let probs = self.forest.predict_proba(&model_input(features, regime))?;

        let trained_prob: HashMap<&StrategyId, f64> = self
            .trained_classes
            .iter()
            .zip(probs.iter())
            .map(|(id, &p)| (id, p))
            .collect();

        let n_trained = self.trained_classes.len();
        let uniform = 1.0 / n_trained as f64;

        let mut recommendations: Vec<StrategyRecommendation> = catalog
            .strategies()
            .iter()
            .map(|id| {
                let probability = trained_prob.get(id).copied().unwrap_or(0.0);
                let margin = if n_trained == 1 {
                    if probability > 0.0 { 1.0 } else { 0.0 }
                } else {
                    ((probability - uniform) / (1.0 - uniform)).clamp(0.0, 1.0)
                };
                StrategyRecommendation {
                    strategy_id: id.clone(),
                    probability,
                    confidence: (probability * margin).clamp(0.0, 1.0),
                }
            })
            .collect();

        // 안정 정렬이라 동률은 카탈로그 등록 순서 유지
        recommendations.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(top_n);

        Ok(recommendations)
    }
}

/// 모델 입력 구성: feature 9개 ⊕ 국면 one-hot 4개.
fn model_input(features: &FeatureVector, regime: MarketRegime) -> Vec<f64> {
    let mut input = Vec::with_capacity(FEATURE_COUNT + MarketRegime::ALL.len());
    input.extend_from_slice(features.as_slice());
    for candidate in MarketRegime::ALL {
        input.push(if candidate == regime { 1.0 } else { 0.0 });
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sample(strategy: &str, regime: MarketRegime, bias: f64) -> TrainingSample {
        TrainingSample {
            features: FeatureVector::new([
                bias,
                0.5,
                0.5 + bias / 10.0,
                0.0,
                0.02,
                0.05,
                1.0,
                bias / 100.0,
                bias / 50.0,
            ]),
            regime,
            best_strategy: StrategyId::new(strategy),
        }
    }

    fn catalog_with(ids: &[&str]) -> StrategyCatalog {
        let mut catalog = StrategyCatalog::new();
        for id in ids {
            catalog.register(StrategyId::new(*id)).unwrap();
        }
        catalog
    }

    fn training_samples() -> Vec<TrainingSample> {
        let mut samples = Vec::new();
        for i in 0..15 {
            samples.push(make_sample(
                "momentum",
                MarketRegime::TrendingBullish,
                1.0 + i as f64 * 0.1,
            ));
            samples.push(make_sample(
                "mean_reversion",
                MarketRegime::Ranging,
                -1.0 - i as f64 * 0.1,
            ));
        }
        samples
    }

    #[test]
    fn test_train_and_recommend() {
        let catalog = catalog_with(&["momentum", "mean_reversion"]);
        let samples = training_samples();
        let model = StrategyModel::train(&samples, &catalog, &RecommenderConfig::default()).unwrap();

        assert_eq!(model.trained_classes().len(), 2);

        let bullish_features = FeatureVector::new([2.0, 0.9, 0.7, 0.1, 0.02, 0.05, 1.2, 0.02, 0.04]);
        let recs = model
            .recommend(&bullish_features, MarketRegime::TrendingBullish, 2, &catalog)
            .unwrap();

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].strategy_id.as_str(), "momentum");
        assert!(recs[0].probability > recs[1].probability);
    }

    #[test]
    fn test_probabilities_sum_at_most_one() {
        let catalog = catalog_with(&["momentum", "mean_reversion", "breakout"]);
        let samples = training_samples(); // breakout은 샘플 없음
        let model = StrategyModel::train(&samples, &catalog, &RecommenderConfig::default()).unwrap();

        let features = FeatureVector::new([0.0, 0.1, 0.5, 0.0, 0.02, 0.05, 1.0, 0.0, 0.0]);
        let recs = model
            .recommend(&features, MarketRegime::Ranging, 10, &catalog)
            .unwrap();

        assert_eq!(recs.len(), 3);
        let sum: f64 = recs.iter().map(|r| r.probability).sum();
        assert!(sum <= 1.0 + 1e-9, "probability sum {} exceeds 1", sum);

        // 학습되지 않은 breakout은 확률 0으로 포함됨
        let breakout = recs
            .iter()
            .find(|r| r.strategy_id.as_str() == "breakout")
            .unwrap();
        assert_eq!(breakout.probability, 0.0);
    }

    #[test]
    fn test_sparse_class_excluded() {
        let catalog = catalog_with(&["momentum", "mean_reversion", "rare"]);
        let mut samples = training_samples();
        // min_samples_per_strategy 미만인 클래스
        samples.push(make_sample("rare", MarketRegime::HighVolatility, 5.0));
        samples.push(make_sample("rare", MarketRegime::HighVolatility, 5.1));

        let model = StrategyModel::train(&samples, &catalog, &RecommenderConfig::default()).unwrap();
        assert_eq!(model.trained_classes().len(), 2);
        assert!(!model
            .trained_classes()
            .iter()
            .any(|id| id.as_str() == "rare"));
    }

    #[test]
    fn test_all_classes_excluded_is_empty_training_set() {
        let catalog = catalog_with(&["momentum"]);
        let samples = vec![make_sample("momentum", MarketRegime::Ranging, 1.0)];

        let result = StrategyModel::train(&samples, &catalog, &RecommenderConfig::default());
        assert!(matches!(result, Err(AnalyticsError::EmptyTrainingSet)));
    }

    #[test]
    fn test_catalog_version_mismatch_rejected() {
        let mut catalog = catalog_with(&["momentum", "mean_reversion"]);
        let samples = training_samples();
        let model = StrategyModel::train(&samples, &catalog, &RecommenderConfig::default()).unwrap();

        // 학습 후 카탈로그에 전략 추가
        catalog.register(StrategyId::new("new_strategy")).unwrap();

        let features = FeatureVector::new([0.0; 9]);
        let result = model.recommend(&features, MarketRegime::Ranging, 3, &catalog);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn test_training_deterministic() {
        let catalog = catalog_with(&["momentum", "mean_reversion"]);
        let samples = training_samples();
        let config = RecommenderConfig::default();

        let a = StrategyModel::train(&samples, &catalog, &config).unwrap();
        let b = StrategyModel::train(&samples, &catalog, &config).unwrap();

        let features = FeatureVector::new([0.5, 0.4, 0.6, 0.01, 0.02, 0.05, 1.1, 0.01, 0.02]);
        let ra = a
            .recommend(&features, MarketRegime::TrendingBullish, 2, &catalog)
            .unwrap();
        let rb = b
            .recommend(&features, MarketRegime::TrendingBullish, 2, &catalog)
            .unwrap();
        assert_eq!(ra, rb);
    }
}
