//! 전략 추천 모듈

mod catalog;
mod forest;
mod recommender;
mod sampler;

pub use catalog::StrategyCatalog;
pub use forest::{ForestConfig, RandomForest};
pub use recommender::{RecommenderConfig, StrategyModel};
pub use sampler::{SamplerConfig, TrainingSample, TrainingSetBuilder};
