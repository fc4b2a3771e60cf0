//! MarketRegime - 시장 레짐 분류.
//!
//! 현재 시장 행동을 4가지 레짐으로 분류합니다. 레짐 라벨은
//! Regime Detector가 생성하고 Strategy Recommender와 호출자가
//! 소비합니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 시장 레짐 4분류.
///
/// # 라벨 의미
///
/// - **TrendingBullish**: 상승 추세 (추세 방향 강한 양수, 변동성 보통 이하)
/// - **TrendingBearish**: 하락 추세 (추세 방향 음수)
/// - **Ranging**: 박스권 (추세 약함, 변동성 낮음)
/// - **HighVolatility**: 고변동성 (방향 무관, 변동성 최상위)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    /// 상승 추세
    TrendingBullish,
    /// 하락 추세
    TrendingBearish,
    /// 박스권 / 횡보
    Ranging,
    /// 고변동성
    HighVolatility,
}

impl MarketRegime {
    /// 전체 레짐 라벨 목록 (one-hot 인코딩 순서 고정).
    pub const ALL: [MarketRegime; 4] = [
        MarketRegime::TrendingBullish,
        MarketRegime::TrendingBearish,
        MarketRegime::Ranging,
        MarketRegime::HighVolatility,
    ];

    /// one-hot 인코딩에서 이 레짐이 차지하는 인덱스.
    pub fn index(self) -> usize {
        match self {
            Self::TrendingBullish => 0,
            Self::TrendingBearish => 1,
            Self::Ranging => 2,
            Self::HighVolatility => 3,
        }
    }

    /// 방향성 추세 레짐인지 확인합니다.
    pub fn is_trending(self) -> bool {
        matches!(self, Self::TrendingBullish | Self::TrendingBearish)
    }

    /// 진입 적합 여부 (추세 추종 전략 기준).
    pub fn is_entry_friendly(self) -> bool {
        matches!(self, Self::TrendingBullish)
    }

    /// 설명 문자열.
    pub fn description(self) -> &'static str {
        match self {
            Self::TrendingBullish => "상승 추세",
            Self::TrendingBearish => "하락 추세",
            Self::Ranging => "박스권/횡보",
            Self::HighVolatility => "고변동성",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TrendingBullish => "trending_bullish",
            Self::TrendingBearish => "trending_bearish",
            Self::Ranging => "ranging",
            Self::HighVolatility => "high_volatility",
        };
        write!(f, "{}", s)
    }
}
