//! # workpulse-monitor
//!
//! 사용자 활동 추적 엔진.
//! 상호작용 이벤트를 받아 비활성 경고 단계를 진행시키고, 세션/비활성 구간/일일 요약을
//! 영속화 게이트웨이로 전달한다. 모든 상태 전이는 단일 액터 태스크에서 순차 처리된다.

pub mod cascade;
pub mod clock;
pub mod controller;
pub mod error;
pub mod listener;
pub mod tracker;

pub use error::TrackerError;

#[cfg(test)]
mod testing;
