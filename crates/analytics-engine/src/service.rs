//! 분석 서비스 facade.
//!
//! 네 컴포넌트(feature 추출, 국면 탐지, 전략 추천, 패턴 인식)와
//! 모델 레지스트리를 묶어 호출자에게 단일 진입점을 제공합니다.
//!
//! 시세 제공자 호출은 설정된 타임아웃으로 감싸고 만료 시
//! `UpstreamUnavailable`로 보고합니다. 학습은 슬롯당 하나씩만
//! 진행되며, 실패한 학습은 배포된 모델을 건드리지 않습니다.

use crate::features::{FeatureExtractor, FeatureVector};
use crate::pattern::{PatternConfig, PatternEvent, PatternScanner};
use crate::recommend::{
    ForestConfig, RecommenderConfig, SamplerConfig, StrategyCatalog, StrategyModel,
    TrainingSetBuilder,
};
use crate::regime::{RegimeConfig, RegimeDetector, RegimeModel};
use crate::registry::ModelRegistry;
use analytics_core::{
    AnalyticsConfig, AnalyticsError, AnalyticsResult, BacktestRunner, Candle, MarketRegime,
    PriceHistoryProvider, StrategyId, StrategyRecommendation, Symbol,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};
use uuid::Uuid;

/// 국면 분석 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeReport {
    /// 분석 대상 심볼
    pub symbol: Symbol,
    /// 분류된 국면
    pub regime: MarketRegime,
    /// 분류 신뢰도 (0..1)
    pub confidence: f64,
    /// 분류에 사용된 feature
    pub features: FeatureVector,
    /// 보고서 생성 시각
    pub generated_at: DateTime<Utc>,
}

/// 전략 추천 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReport {
    /// 분석 대상 심볼
    pub symbol: Symbol,
    /// 현재 국면
    pub regime: MarketRegime,
    /// 확률 내림차순 추천 목록
    pub recommendations: Vec<StrategyRecommendation>,
    /// 보고서 생성 시각
    pub generated_at: DateTime<Utc>,
}

/// 패턴 스캔 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReport {
    /// 분석 대상 심볼
    pub symbol: Symbol,
    /// 감지된 패턴 이벤트
    pub patterns: Vec<PatternEvent>,
    /// 보고서 생성 시각
    pub generated_at: DateTime<Utc>,
}

/// 학습 작업 결과 요약.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// 모델 유형 ("regime" | "strategy")
    pub model_kind: String,
    /// 배포된 모델 식별자
    pub model_id: Uuid,
    /// 배포 세대 번호
    pub generation: u64,
    /// 학습 완료 시각
    pub trained_at: DateTime<Utc>,
    /// 학습 샘플 수
    pub sample_count: usize,
}

/// 시장 분석 서비스.
pub struct AnalyticsService<P, B> {
    provider: P,
    backtester: B,
    config: AnalyticsConfig,
    detector: RegimeDetector,
    scanner: PatternScanner,
    catalog: RwLock<StrategyCatalog>,
    registry: ModelRegistry<RegimeModel, StrategyModel>,
}

impl<P, B> AnalyticsService<P, B>
where
    P: PriceHistoryProvider,
    B: BacktestRunner,
{
    /// 새 서비스 생성.
    pub fn new(provider: P, backtester: B, config: AnalyticsConfig) -> Self {
        let detector = RegimeDetector::new(
            FeatureExtractor::with_defaults(),
            RegimeConfig {
                clusters: config.training.regime_clusters,
                max_iterations: config.training.regime_max_iterations,
                window_step: 1,
            },
        );

        Self {
            provider,
            backtester,
            config,
            detector,
            scanner: PatternScanner::new(PatternConfig::default()),
            catalog: RwLock::new(StrategyCatalog::new()),
            registry: ModelRegistry::new(),
        }
    }

    /// 추천 후보 전략 등록.
    ///
    /// 등록은 카탈로그 버전을 올리므로, 등록 이후의 추천은 전략 모델
    /// 재학습을 요구합니다.
    pub async fn register_strategy(&self, id: StrategyId) -> AnalyticsResult<()> {
        self.catalog.write().await.register(id)
    }

    /// 현재 카탈로그 버전 반환.
    pub async fn catalog_version(&self) -> u64 {
        self.catalog.read().await.version()
    }

    /// 심볼의 현재 시장 국면 분석.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn detect_regime(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
    ) -> AnalyticsResult<RegimeReport> {
        let candles = self.fetch_history(symbol, lookback_days).await?;
        let features = self.detector.extractor().extract(&candles)?;

        let artifact = self.registry.regime.current().await?;
        let classification = artifact.model.classify(&features)?;

        Ok(RegimeReport {
            symbol: symbol.clone(),
            regime: classification.regime,
            confidence: classification.confidence,
            features,
            generated_at: Utc::now(),
        })
    }

    /// 심볼의 현재 시장 상태에 맞는 전략 추천.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn recommend_strategies(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
        top_n: usize,
    ) -> AnalyticsResult<RecommendationReport> {
        let candles = self.fetch_history(symbol, lookback_days).await?;
        let features = self.detector.extractor().extract(&candles)?;

        let regime_artifact = self.registry.regime.current().await?;
        let classification = regime_artifact.model.classify(&features)?;

        let strategy_artifact = self.registry.strategy.current().await?;
        let catalog = self.catalog.read().await;
        let recommendations = strategy_artifact.model.recommend(
            &features,
            classification.regime,
            top_n,
            &catalog,
        )?;

        Ok(RecommendationReport {
            symbol: symbol.clone(),
            regime: classification.regime,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    /// 심볼의 차트 패턴 스캔. 학습 없이 항상 사용 가능.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn detect_patterns(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
        min_confidence: f64,
    ) -> AnalyticsResult<PatternReport> {
        let candles = self.fetch_history(symbol, lookback_days).await?;
        let patterns = self.scanner.scan(&candles, min_confidence)?;

        Ok(PatternReport {
            symbol: symbol.clone(),
            patterns,
            generated_at: Utc::now(),
        })
    }

    /// 국면 모델 학습 및 배포.
    ///
    /// 동일한 이력에 대해 항상 동일한 모델을 생성합니다. 학습 실패는
    /// 기존 배포 모델을 건드리지 않습니다.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn train_regime_model(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
        k: usize,
    ) -> AnalyticsResult<TrainingSummary> {
        let candles = self.fetch_history(symbol, lookback_days).await?;

        let artifact = self
            .registry
            .regime
            .train_with(|| async { self.detector.train(&candles, k) })
            .await?;

        Ok(TrainingSummary {
            model_kind: "regime".to_string(),
            model_id: artifact.model_id,
            generation: artifact.generation,
            trained_at: artifact.trained_at,
            sample_count: artifact.model.sample_count(),
        })
    }

    /// 전략 추천 모델 학습 및 배포.
    ///
    /// 국면 모델이 먼저 학습되어 있어야 합니다. `cancel`이 트리거되거나
    /// `training.timeout_secs`를 초과하면 중단되며, 기존 배포 모델은
    /// 유지됩니다.
    #[instrument(skip(self, cancel), fields(symbols = symbols.len()))]
    pub async fn train_strategy_model(
        &self,
        symbols: &[Symbol],
        lookback_days: u32,
        cancel: CancellationToken,
    ) -> AnalyticsResult<TrainingSummary> {
        if symbols.is_empty() {
            return Err(AnalyticsError::InvalidInput(
                "at least one symbol required for training".to_string(),
            ));
        }

        let regime_artifact = self.registry.regime.current().await?;

        let mut histories = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            histories.push(self.fetch_history(symbol, lookback_days).await?);
        }

        let sampler_config = SamplerConfig {
            window_size: self.config.training.window_size,
            step_size: self.config.training.step_size,
            backtest_timeout_secs: self.config.training.backtest_timeout_secs,
        };
        let recommender_config = RecommenderConfig {
            min_samples_per_strategy: self.config.training.min_samples_per_strategy,
            forest: ForestConfig {
                n_trees: self.config.training.forest_size,
                max_depth: self.config.training.max_tree_depth,
                min_split_size: 4,
                seed: self.config.training.seed,
            },
        };

        let catalog = self.catalog.read().await.clone();
        let training_deadline = Duration::from_secs(self.config.training.timeout_secs);

        let artifact = self
            .registry
            .strategy
            .train_with(|| async {
                let train = async {
                    let builder = TrainingSetBuilder::new(
                        self.detector.extractor(),
                        &regime_artifact.model,
                        &catalog,
                        sampler_config,
                    )?;
                    let samples = builder
                        .build(&histories, &self.backtester, &cancel)
                        .await?;
                    StrategyModel::train(&samples, &catalog, &recommender_config)
                };

                match tokio::time::timeout(training_deadline, train).await {
                    Ok(result) => result,
                    Err(_) => Err(AnalyticsError::Cancelled(format!(
                        "strategy training exceeded {}s deadline",
                        training_deadline.as_secs()
                    ))),
                }
            })
            .await?;

        Ok(TrainingSummary {
            model_kind: "strategy".to_string(),
            model_id: artifact.model_id,
            generation: artifact.generation,
            trained_at: artifact.trained_at,
            sample_count: artifact.model.sample_count(),
        })
    }

    /// 시세 이력 조회. 타임아웃과 재시도를 적용합니다.
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        lookback_days: u32,
    ) -> AnalyticsResult<Vec<Candle>> {
        let timeout = Duration::from_secs(self.config.data.provider_timeout_secs);
        let attempts = 1 + self.config.data.max_retries;

        let mut last_error = None;
        for attempt in 1..=attempts {
            let result = tokio::time::timeout(
                timeout,
                self.provider
                    .history(symbol, self.config.data.timeframe, lookback_days),
            )
            .await;

            match result {
                Ok(Ok(candles)) => return Ok(candles),
                Ok(Err(e)) if e.is_retryable() && attempt < attempts => {
                    warn!(symbol = %symbol, attempt, error = %e, "history fetch failed, retrying");
                    last_error = Some(e);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    let e = AnalyticsError::UpstreamUnavailable(format!(
                        "price history provider timed out after {}s",
                        timeout.as_secs()
                    ));
                    if attempt < attempts {
                        warn!(symbol = %symbol, attempt, "history fetch timed out, retrying");
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AnalyticsError::UpstreamUnavailable("price history provider unavailable".to_string())
        }))
    }
}
