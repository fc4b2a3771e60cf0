//! feature 추출 모듈

mod extract;
mod vector;

pub use extract::{FeatureConfig, FeatureExtractor};
pub use vector::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES, FEATURE_SCHEMA_VERSION};
