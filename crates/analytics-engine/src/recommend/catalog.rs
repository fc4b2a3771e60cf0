//! 전략 카탈로그.
//!
//! 추천 대상이 되는 전략 후보 목록입니다. 등록 순서는 추천 결과의
//! 결정적 동률 해소 순서로 사용되므로 append 전용이며, 변경될 때마다
//! 버전이 올라갑니다. 모델은 학습 당시의 카탈로그 버전을 기록하고,
//! 버전이 다르면 재학습 전까지 추천을 거부합니다.

use analytics_core::{AnalyticsError, AnalyticsResult, StrategyId};
use serde::{Deserialize, Serialize};

/// 버전 관리되는 append 전용 전략 카탈로그.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCatalog {
    entries: Vec<StrategyId>,
    version: u64,
}

impl StrategyCatalog {
    /// 빈 카탈로그 생성 (버전 0).
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            version: 0,
        }
    }

    /// 전략 등록. 버전이 1 증가합니다.
    ///
    /// 이미 등록된 id는 `InvalidInput`으로 거부됩니다.
    pub fn register(&mut self, id: StrategyId) -> AnalyticsResult<()> {
        if self.entries.contains(&id) {
            return Err(AnalyticsError::InvalidInput(format!(
                "strategy already registered: {id}"
            )));
        }
        self.entries.push(id);
        self.version += 1;
        Ok(())
    }

    /// 등록 순서대로 전략 목록 반환.
    pub fn strategies(&self) -> &[StrategyId] {
        &self.entries
    }

    /// 현재 카탈로그 버전 반환.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 등록된 전략 수.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 카탈로그가 비어있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 전략의 등록 순서 인덱스 반환.
    pub fn position(&self, id: &StrategyId) -> Option<usize> {
        self.entries.iter().position(|e| e == id)
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_bumps_version() {
        let mut catalog = StrategyCatalog::new();
        assert_eq!(catalog.version(), 0);

        catalog.register(StrategyId::new("momentum")).unwrap();
        assert_eq!(catalog.version(), 1);
        catalog.register(StrategyId::new("mean_reversion")).unwrap();
        assert_eq!(catalog.version(), 2);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut catalog = StrategyCatalog::new();
        catalog.register(StrategyId::new("momentum")).unwrap();

        let result = catalog.register(StrategyId::new("momentum"));
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
        // 실패한 등록은 버전을 올리지 않음
        assert_eq!(catalog.version(), 1);
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut catalog = StrategyCatalog::new();
        catalog.register(StrategyId::new("c")).unwrap();
        catalog.register(StrategyId::new("a")).unwrap();
        catalog.register(StrategyId::new("b")).unwrap();

        let ids: Vec<&str> = catalog.strategies().iter().map(|s| s.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(catalog.position(&StrategyId::new("a")), Some(1));
    }
}
