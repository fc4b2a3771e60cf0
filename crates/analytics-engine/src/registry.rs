//! 모델 레지스트리.
//!
//! 학습된 모델의 동시성 안전한 저장소입니다. 모델 유형별로 하나의
//! `ModelSlot`을 가지며, 읽기 경로는 `Arc` 스냅샷을 받아 락 없이
//! 추론하고, 학습은 슬롯당 하나만 허용됩니다.
//!
//! 슬롯 교체는 학습이 완전히 성공한 뒤에만 일어납니다. 실패, 타임아웃,
//! 취소는 이전 모델을 그대로 남깁니다.

use analytics_core::{AnalyticsError, AnalyticsResult};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// 학습 완료된 모델과 그 메타데이터.
#[derive(Debug, Clone)]
pub struct TrainedArtifact<T> {
    /// 모델 본체
    pub model: T,
    /// 모델 식별자
    pub model_id: Uuid,
    /// 단조 증가 세대 번호
    pub generation: u64,
    /// 학습 완료 시각
    pub trained_at: DateTime<Utc>,
}

/// 단일 모델 유형의 슬롯.
///
/// 읽기는 `RwLock`에서 `Arc`를 복제해 즉시 반환하고, 학습은 별도
/// `Mutex`를 `try_lock`으로 잡아 중복 학습을 거부합니다.
pub struct ModelSlot<T> {
    /// 에러 메시지에 쓰이는 모델 유형 이름
    kind: &'static str,
    current: RwLock<Option<Arc<TrainedArtifact<T>>>>,
    train_lock: Mutex<()>,
    generation: AtomicU64,
}

impl<T> ModelSlot<T> {
    /// 빈 슬롯 생성.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            current: RwLock::new(None),
            train_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// 모델 유형 이름 반환.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// 현재 모델 스냅샷 반환. 모델이 없으면 `ModelNotTrained`.
    pub async fn current(&self) -> AnalyticsResult<Arc<TrainedArtifact<T>>> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(AnalyticsError::ModelNotTrained(self.kind))
    }

    /// 모델 존재 여부.
    pub async fn is_trained(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// 학습 실행 후 성공 시에만 슬롯 교체.
    ///
    /// 동일 슬롯에 대한 학습이 이미 진행 중이면 기다리지 않고
    /// `TrainingInProgress`로 즉시 거부합니다. `train_fn`이 실패하면
    /// 이전 모델이 그대로 유지됩니다.
    pub async fn train_with<F, Fut>(
        &self,
        train_fn: F,
    ) -> AnalyticsResult<Arc<TrainedArtifact<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AnalyticsResult<T>>,
    {
        let _guard = self
            .train_lock
            .try_lock()
            .map_err(|_| AnalyticsError::TrainingInProgress(self.kind))?;

        let model = train_fn().await?;

        let artifact = Arc::new(TrainedArtifact {
            model,
            model_id: Uuid::new_v4(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            trained_at: Utc::now(),
        });

        *self.current.write().await = Some(artifact.clone());

        info!(
            kind = self.kind,
            model_id = %artifact.model_id,
            generation = artifact.generation,
            "model deployed"
        );

        Ok(artifact)
    }
}

/// 파이프라인 전체의 모델 슬롯 모음.
pub struct ModelRegistry<R, S> {
    /// 국면 모델 슬롯
    pub regime: ModelSlot<R>,
    /// 전략 추천 모델 슬롯
    pub strategy: ModelSlot<S>,
}

impl<R, S> ModelRegistry<R, S> {
    /// 빈 레지스트리 생성.
    pub fn new() -> Self {
        Self {
            regime: ModelSlot::new("regime"),
            strategy: ModelSlot::new("strategy"),
        }
    }
}

impl<R, S> Default for ModelRegistry<R, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_slot_is_not_trained() {
        let slot: ModelSlot<u32> = ModelSlot::new("test");
        assert!(!slot.is_trained().await);

        let result = slot.current().await;
        assert!(matches!(
            result,
            Err(AnalyticsError::ModelNotTrained("test"))
        ));
    }

    #[tokio::test]
    async fn test_train_deploys_and_bumps_generation() {
        let slot: ModelSlot<u32> = ModelSlot::new("test");

        let first = slot.train_with(|| async { Ok(1u32) }).await.unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.model, 1);

        let second = slot.train_with(|| async { Ok(2u32) }).await.unwrap();
        assert_eq!(second.generation, 2);
        assert_ne!(first.model_id, second.model_id);

        let current = slot.current().await.unwrap();
        assert_eq!(current.model, 2);
    }

    #[tokio::test]
    async fn test_failed_training_keeps_previous_model() {
        let slot: ModelSlot<u32> = ModelSlot::new("test");
        slot.train_with(|| async { Ok(7u32) }).await.unwrap();

        let result = slot
            .train_with(|| async { Err(AnalyticsError::EmptyTrainingSet) })
            .await;
        assert!(matches!(result, Err(AnalyticsError::EmptyTrainingSet)));

        // 이전 모델 유지, 세대 변화 없음
        let current = slot.current().await.unwrap();
        assert_eq!(current.model, 7);
        assert_eq!(current.generation, 1);
    }

    #[tokio::test]
    async fn test_concurrent_training_rejected() {
        let slot: Arc<ModelSlot<u32>> = Arc::new(ModelSlot::new("test"));

        let slot_a = slot.clone();
        let long_train = tokio::spawn(async move {
            slot_a
                .train_with(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(1u32)
                })
                .await
        });

        // 첫 학습이 락을 잡을 때까지 대기
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = slot.train_with(|| async { Ok(2u32) }).await;
        assert!(matches!(
            result,
            Err(AnalyticsError::TrainingInProgress("test"))
        ));

        let first = long_train.await.unwrap().unwrap();
        assert_eq!(first.model, 1);
    }

    #[tokio::test]
    async fn test_readers_not_blocked_during_training() {
        let slot: Arc<ModelSlot<u32>> = Arc::new(ModelSlot::new("test"));
        slot.train_with(|| async { Ok(1u32) }).await.unwrap();

        let slot_a = slot.clone();
        let long_train = tokio::spawn(async move {
            slot_a
                .train_with(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(2u32)
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        // 학습 중에도 기존 모델 조회 가능
        let current = slot.current().await.unwrap();
        assert_eq!(current.model, 1);

        long_train.await.unwrap().unwrap();
        let current = slot.current().await.unwrap();
        assert_eq!(current.model, 2);
    }
}
