//! 외부 협력자 trait.
//!
//! 분석 파이프라인이 소비하는 두 외부 의존성을 추상화합니다:
//! - `PriceHistoryProvider` - 시세 이력 조회
//! - `BacktestRunner` - 학습 라벨 생성용 백테스트 실행
//!
//! 두 협력자 모두 네트워크 너머에 있을 수 있으므로 호출부에서
//! 명시적 타임아웃과 함께 사용해야 합니다.

use crate::domain::market_data::Candle;
use crate::domain::strategy::StrategyId;
use crate::error::AnalyticsResult;
use crate::types::{Symbol, Timeframe};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 시세 이력 제공자.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// 심볼의 최근 `lookback_days`일 캔들을 주어진 타임프레임으로,
    /// 오래된 순으로 반환합니다.
    ///
    /// 알 수 없는 심볼이나 제공자 장애는 빈 Vec이 아니라 명시적
    /// 에러(`UpstreamUnavailable` 또는 `InvalidInput`)로 실패해야 합니다.
    async fn history(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> AnalyticsResult<Vec<Candle>>;
}

/// 단일 백테스트 실행 성과.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestScore {
    /// 수익률 (%)
    pub return_pct: f64,
    /// 리스크 조정 점수 (윈도우 간 비교 기준)
    pub risk_adjusted: f64,
}

/// 학습 라벨 생성용 백테스트 러너.
///
/// 학습 중 (전략, 윈도우) 쌍마다 한 번 호출됩니다. 단일 호출 실패는
/// 해당 윈도우에서 그 전략이 승자가 되지 못할 뿐이며, 학습 전체를
/// 중단시키지 않습니다 (호출부 정책).
#[async_trait]
pub trait BacktestRunner: Send + Sync {
    /// 주어진 가격 윈도우에 대해 전략을 실행하고 성과를 반환합니다.
    async fn run(&self, strategy_id: &StrategyId, window: &[Candle]) -> AnalyticsResult<BacktestScore>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct EmptyProvider;

    #[async_trait]
    impl PriceHistoryProvider for EmptyProvider {
        async fn history(
            &self,
            symbol: &Symbol,
            _timeframe: Timeframe,
            _lookback_days: u32,
        ) -> AnalyticsResult<Vec<Candle>> {
            Err(AnalyticsError::UpstreamUnavailable(format!(
                "unknown symbol: {symbol}"
            )))
        }
    }

    struct FixedRunner(f64);

    #[async_trait]
    impl BacktestRunner for FixedRunner {
        async fn run(
            &self,
            _strategy_id: &StrategyId,
            _window: &[Candle],
        ) -> AnalyticsResult<BacktestScore> {
            Ok(BacktestScore {
                return_pct: self.0,
                risk_adjusted: self.0,
            })
        }
    }

    #[tokio::test]
    async fn test_provider_fails_explicitly() {
        let provider = EmptyProvider;
        let result = provider
            .history(&Symbol::stock("ZZZZ"), Timeframe::D1, 30)
            .await;
        assert!(matches!(
            result,
            Err(AnalyticsError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_runner_object_safety() {
        // trait object로 사용 가능한지 확인
        let runner: Box<dyn BacktestRunner> = Box::new(FixedRunner(1.5));
        let window = vec![Candle::new(
            Utc::now(),
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100),
            dec!(1000),
        )];
        let score = runner
            .run(&StrategyId::new("momentum_breakout"), &window)
            .await
            .unwrap();
        assert_eq!(score.return_pct, 1.5);
    }
}
