//! 학습 데이터 생성.
//!
//! 가격 이력을 슬라이딩 윈도우로 훑으며 윈도우마다 feature를 추출하고
//! 국면을 분류한 뒤, 카탈로그의 모든 후보 전략을 백테스트하여 가장
//! 성과가 좋은 전략을 라벨로 기록합니다.
//!
//! 개별 백테스트 실패는 로그 후 건너뜁니다. 성공한 후보가 하나도 없는
//! 윈도우는 샘플을 만들지 않습니다. 전체에서 샘플이 하나도 나오지
//! 않으면 `EmptyTrainingSet`입니다.

use crate::features::{FeatureExtractor, FeatureVector};
use crate::recommend::catalog::StrategyCatalog;
use crate::regime::RegimeModel;
use analytics_core::{
    AnalyticsError, AnalyticsResult, BacktestRunner, Candle, MarketRegime, StrategyId,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 학습 샘플 하나. 메모리에만 존재합니다.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    /// 윈도우에서 추출된 feature
    pub features: FeatureVector,
    /// 현재 국면 모델의 분류 결과
    pub regime: MarketRegime,
    /// 윈도우에서 가장 성과가 좋았던 전략
    pub best_strategy: StrategyId,
}

/// 학습 데이터 생성 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// 윈도우 크기 (캔들 수)
    pub window_size: usize,
    /// 윈도우 이동 간격
    pub step_size: usize,
    /// 백테스트 호출별 타임아웃 (초)
    pub backtest_timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            step_size: 5,
            backtest_timeout_secs: 30,
        }
    }
}

/// 슬라이딩 윈도우 백테스트 라벨링으로 학습 데이터를 만드는 빌더.
pub struct TrainingSetBuilder<'a> {
    extractor: &'a FeatureExtractor,
    regime_model: &'a RegimeModel,
    catalog: &'a StrategyCatalog,
    config: SamplerConfig,
}

impl<'a> TrainingSetBuilder<'a> {
    /// 새 빌더 생성.
    pub fn new(
        extractor: &'a FeatureExtractor,
        regime_model: &'a RegimeModel,
        catalog: &'a StrategyCatalog,
        config: SamplerConfig,
    ) -> AnalyticsResult<Self> {
        if config.window_size < extractor.config().min_candles_required() {
            return Err(AnalyticsError::InvalidInput(format!(
                "window_size {} below extractor minimum {}",
                config.window_size,
                extractor.config().min_candles_required()
            )));
        }
        if config.step_size == 0 {
            return Err(AnalyticsError::InvalidInput(
                "step_size must be positive".to_string(),
            ));
        }
        Ok(Self {
            extractor,
            regime_model,
            catalog,
            config,
        })
    }

    /// 심볼별 이력들에서 학습 샘플 생성.
    ///
    /// `cancel`이 트리거되면 배포된 모델을 건드리지 않고 즉시 중단합니다.
    /// 취소 확인은 윈도우 경계에서 이루어집니다.
    pub async fn build(
        &self,
        histories: &[Vec<Candle>],
        runner: &dyn BacktestRunner,
        cancel: &CancellationToken,
    ) -> AnalyticsResult<Vec<TrainingSample>> {
        if self.catalog.is_empty() {
            return Err(AnalyticsError::InvalidInput(
                "strategy catalog is empty".to_string(),
            ));
        }

        let timeout = Duration::from_secs(self.config.backtest_timeout_secs);
        let mut samples = Vec::new();
        let mut skipped_windows = 0usize;

        for history in histories {
            let mut start = 0usize;
            while start + self.config.window_size <= history.len() {
                if cancel.is_cancelled() {
                    return Err(AnalyticsError::Cancelled(
                        "training cancelled by caller".to_string(),
                    ));
                }

                let window = &history[start..start + self.config.window_size];
                start += self.config.step_size;

                let features = match self.extractor.extract(window) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "skipping window: feature extraction failed");
                        skipped_windows += 1;
                        continue;
                    }
                };
                // schema 불일치는 부분 실패가 아니라 구성 오류이므로 전파
                let classification = self.regime_model.classify(&features)?;

                match self.label_window(window, runner, timeout).await {
                    Some(best_strategy) => samples.push(TrainingSample {
                        features,
                        regime: classification.regime,
                        best_strategy,
                    }),
                    None => {
                        skipped_windows += 1;
                    }
                }
            }
        }

        debug!(
            samples = samples.len(),
            skipped = skipped_windows,
            "training set built"
        );

        if samples.is_empty() {
            return Err(AnalyticsError::EmptyTrainingSet);
        }
        Ok(samples)
    }

    /// 윈도우에서 가장 성과가 좋은 전략 결정.
    ///
    /// 동률은 카탈로그 등록 순서가 빠른 전략이 이깁니다 (strict `>` 비교).
    async fn label_window(
        &self,
        window: &[Candle],
        runner: &dyn BacktestRunner,
        timeout: Duration,
    ) -> Option<StrategyId> {
        let mut best: Option<(StrategyId, f64)> = None;

        for strategy_id in self.catalog.strategies() {
            let score = match tokio::time::timeout(timeout, runner.run(strategy_id, window)).await
            {
                Ok(Ok(score)) => score,
                Ok(Err(e)) => {
                    warn!(strategy = %strategy_id, error = %e, "backtest run failed, skipping");
                    continue;
                }
                Err(_) => {
                    warn!(strategy = %strategy_id, "backtest run timed out, skipping");
                    continue;
                }
            };

            if !score.risk_adjusted.is_finite() {
                warn!(strategy = %strategy_id, "non-finite backtest score, skipping");
                continue;
            }

            match &best {
                Some((_, best_score)) if score.risk_adjusted <= *best_score => {}
                _ => best = Some((strategy_id.clone(), score.risk_adjusted)),
            }
        }

        best.map(|(id, _)| id)
    }
}
