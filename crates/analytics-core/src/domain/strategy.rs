//! 전략 식별자 및 추천 결과 타입.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 전략 카탈로그의 안정적인 식별자.
///
/// 카탈로그는 append-only이므로 한 번 등록된 id의 의미는
/// 바뀌지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(String);

impl StrategyId {
    /// 새 전략 id를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// id 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StrategyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 추천 목록의 한 항목.
///
/// 하나의 추천 목록 안에서 strategy_id는 유일하며, 목록은
/// probability 내림차순으로 정렬됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    /// 전략 id
    pub strategy_id: StrategyId,
    /// 전체 카탈로그에 대한 확률 (목록 전체 합 <= 1.0)
    pub probability: f64,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_id_display() {
        let id = StrategyId::new("momentum_breakout");
        assert_eq!(id.to_string(), "momentum_breakout");
        assert_eq!(id.as_str(), "momentum_breakout");
    }

    #[test]
    fn test_strategy_id_serde_transparent() {
        let id = StrategyId::new("mean_reversion");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"mean_reversion\"");
    }
}
