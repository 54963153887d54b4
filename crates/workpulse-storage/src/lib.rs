//! # workpulse-storage
//!
//! 로컬 저장소 어댑터.
//! SQLite에 세션, 비활성 구간, 일일 활동 요약을 저장하고
//! 요약 병합과 성과 분류를 DB 측에서 수행한다.
//!
//! ## 모듈
//! - `sqlite`: `PersistenceGateway` 구현 및 조회 API
//! - `migration`: 스키마 마이그레이션

pub mod migration;
pub mod sqlite;
