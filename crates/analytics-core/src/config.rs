//! 설정 관리.
//!
//! 분석 파이프라인의 애플리케이션 수준 설정을 정의합니다.
//! 컴포넌트별 알고리즘 파라미터(feature 기간, 패턴 허용 오차 등)는
//! 각 컴포넌트 옆의 Config 타입이 담당하고, 여기서는 런타임/운영
//! 관심사(타임아웃, 재시도, 학습 한도)를 다룹니다.

use crate::types::Timeframe;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 시세 데이터 조회 설정
    #[serde(default)]
    pub data: DataConfig,
    /// 모델 학습 설정
    #[serde(default)]
    pub training: TrainingConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨 (예: "info", "debug")
    pub level: String,
    /// 출력 형식 ("pretty" | "json" | "compact")
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 시세 데이터 조회 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Price History Provider 호출 타임아웃 (초)
    pub provider_timeout_secs: u64,
    /// 조회 실패 시 최대 재시도 횟수
    pub max_retries: u32,
    /// 기본 lookback (일)
    pub default_lookback_days: u32,
    /// 제공자에 요청하는 캔들 타임프레임
    pub timeframe: Timeframe,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 10,
            max_retries: 2,
            default_lookback_days: 180,
            timeframe: Timeframe::D1,
        }
    }
}

/// 모델 학습 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    /// 학습 작업 전체 타임아웃 (초)
    ///
    /// 타임아웃/취소된 학습은 기존 배포 모델을 건드리지 않습니다.
    pub timeout_secs: u64,
    /// 백테스트 단일 호출 타임아웃 (초)
    pub backtest_timeout_secs: u64,
    /// 레짐 클러스터 수 (기본 4)
    pub regime_clusters: usize,
    /// k-means 최대 반복 횟수
    pub regime_max_iterations: usize,
    /// 학습 윈도우 크기 (캔들 수)
    pub window_size: usize,
    /// 윈도우 슬라이딩 간격 (캔들 수)
    pub step_size: usize,
    /// 클래스당 최소 학습 샘플 수
    pub min_samples_per_strategy: usize,
    /// 앙상블 트리 수
    pub forest_size: usize,
    /// 트리 최대 깊이
    pub max_tree_depth: usize,
    /// 부트스트랩 샘플링 시드 (동일 입력 → 동일 모델 보장)
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            backtest_timeout_secs: 30,
            regime_clusters: 4,
            regime_max_iterations: 100,
            window_size: 60,
            step_size: 5,
            min_samples_per_strategy: 10,
            forest_size: 25,
            max_tree_depth: 6,
            seed: 42,
        }
    }
}

impl AnalyticsConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드 (예: ANALYTICS__DATA__PROVIDER_TIMEOUT_SECS)
            .add_source(
                config::Environment::with_prefix("ANALYTICS")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}
