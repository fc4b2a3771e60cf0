//! # Analytics Core
//!
//! 시장 분석 파이프라인의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 분석 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시장 데이터 구조체 (캔들)
//! - 시장 국면 및 전략 추천 타입
//! - 외부 협력자 trait (시세 제공자, 백테스트 러너)
//! - 심볼 및 시장 유형 정의
//! - 설정 관리
//! - 로깅 인프라
//! - 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
