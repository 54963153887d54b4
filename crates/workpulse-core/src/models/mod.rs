//! WorkPulse 도메인 모델.
//!
//! 추적기와 영속화 게이트웨이가 공유하는 핵심 데이터 구조체를 정의한다.
//! 모든 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod inactivity;
pub mod interaction;
pub mod session;
pub mod summary;
pub mod tracker;
