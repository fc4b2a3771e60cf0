//! 시장 국면 탐지 모듈

mod detector;
mod kmeans;

pub use detector::{RegimeClassification, RegimeConfig, RegimeDetector, RegimeModel};
pub use kmeans::{euclidean_distance, run_kmeans, KMeansResult};
