//! 추적기 에러 타입.

use thiserror::Error;
use workpulse_core::error::CoreError;

/// 추적기 호출 에러
#[derive(Debug, Error)]
pub enum TrackerError {
    /// 이미 세션을 보유 중이거나 시작 중
    #[error("이미 세션이 진행 중입니다")]
    SessionAlreadyHeld,

    /// 추적기 태스크가 종료됨
    #[error("추적기가 종료되었습니다")]
    TrackerStopped,

    #[error(transparent)]
    Core(#[from] CoreError),
}
