//! 시장 분석 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 캔들 데이터 feature 추출
//! - k-means 기반 시장 국면 탐지
//! - 백테스트 라벨링 + random forest 전략 추천
//! - 규칙 기반 차트 패턴 인식
//! - 동시성 안전한 모델 레지스트리와 서비스 facade
//!
//! # Re-exports
//!
//! - [`features`]: feature 추출 (FeatureExtractor, FeatureVector)
//! - [`regime`]: 국면 탐지 (RegimeDetector, RegimeModel)
//! - [`recommend`]: 전략 추천 (StrategyCatalog, StrategyModel)
//! - [`pattern`]: 패턴 인식 (PatternScanner, PatternEvent)
//! - [`registry`]: 모델 저장소 (ModelRegistry, ModelSlot)
//! - [`service`]: 통합 진입점 (AnalyticsService)

pub mod features;
pub mod pattern;
pub mod recommend;
pub mod regime;
pub mod registry;
pub mod service;

// Features 모듈 re-exports
pub use features::{
    FeatureConfig, FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_NAMES,
    FEATURE_SCHEMA_VERSION,
};

// Regime 모듈 re-exports
pub use regime::{RegimeClassification, RegimeConfig, RegimeDetector, RegimeModel};

// Recommend 모듈 re-exports
pub use recommend::{
    ForestConfig, RandomForest, RecommenderConfig, SamplerConfig, StrategyCatalog, StrategyModel,
    TrainingSample, TrainingSetBuilder,
};

// Pattern 모듈 re-exports
pub use pattern::{PatternConfig, PatternEvent, PatternScanner, PatternType, Signal};

// Registry re-exports
pub use registry::{ModelRegistry, ModelSlot, TrainedArtifact};

// Service re-exports
pub use service::{
    AnalyticsService, PatternReport, RecommendationReport, RegimeReport, TrainingSummary,
};
