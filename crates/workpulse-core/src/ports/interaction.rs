//! 상호작용 이벤트 소스 포트.
//!
//! 구현: `workpulse-monitor` crate (`BroadcastInteractionSource`)

use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::models::interaction::InteractionKind;

/// 사용자 상호작용 이벤트 공급자
pub trait InteractionSource: Send + Sync {
    /// 이벤트 구독 시작
    ///
    /// 구독 불가 시 `CoreError::ListenerUnavailable`.
    fn subscribe(&self) -> Result<broadcast::Receiver<InteractionKind>, CoreError>;
}
