//! 분석 파이프라인의 에러 타입.
//!
//! 네 가지 핵심 에러(`InsufficientHistory`, `ModelNotTrained`,
//! `EmptyTrainingSet`, `UpstreamUnavailable`)는 모두 호출자가 복구 가능하며,
//! 복구 방법이 서로 다르기 때문에 별도 variant로 구분합니다.

use thiserror::Error;

/// 분석 파이프라인 에러.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// 요청한 lookback/window에 비해 캔들 수가 부족
    #[error("Insufficient history: need {required} candles, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// 학습이 완료되지 않은 모델에 대한 추론 요청
    #[error("Model not trained: {0}")]
    ModelNotTrained(&'static str),

    /// 학습 샘플을 하나도 생성하지 못함
    #[error("Empty training set: no valid training samples could be built")]
    EmptyTrainingSet,

    /// 시세 제공자 또는 백테스트 러너에 접근 불가/타임아웃
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 동일 모델에 대한 학습이 이미 진행 중
    #[error("Training already in progress for {0}")]
    TrainingInProgress(&'static str),

    /// 호출자 취소 또는 학습 데드라인 초과로 작업 중단
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// 유효하지 않은 입력 (feature 길이/스키마 불일치 등)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 분석 작업을 위한 Result 타입.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

impl AnalyticsError {
    /// 호출자가 복구 가능한 에러인지 확인합니다.
    ///
    /// lookback을 줄이거나, 학습을 트리거하거나, 나중에 재시도하면
    /// 해소되는 에러들입니다.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalyticsError::InsufficientHistory { .. }
                | AnalyticsError::ModelNotTrained(_)
                | AnalyticsError::EmptyTrainingSet
                | AnalyticsError::UpstreamUnavailable(_)
                | AnalyticsError::TrainingInProgress(_)
                | AnalyticsError::Cancelled(_)
        )
    }

    /// 동일 입력으로 단순 재시도가 의미 있는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyticsError::UpstreamUnavailable(_) | AnalyticsError::TrainingInProgress(_)
        )
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Internal(format!("serialization: {err}"))
    }
}
