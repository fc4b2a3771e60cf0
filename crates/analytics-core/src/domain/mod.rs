//! 도메인 모델 정의

mod market_data;
mod provider;
mod regime;
mod strategy;

pub use market_data::Candle;
pub use provider::{BacktestRunner, BacktestScore, PriceHistoryProvider};
pub use regime::MarketRegime;
pub use strategy::{StrategyId, StrategyRecommendation};
