//! 표시 어댑터 포트.
//!
//! 구현: `workpulse-app` crate (stdout JSON 라인)

use crate::models::tracker::{Notice, TrackerSnapshot};

/// 추적기 상태를 사용자에게 보여주는 인터페이스
///
/// 추적기 이벤트 루프에서 동기 호출되므로 구현은 블로킹하면 안 된다.
pub trait PresentationAdapter: Send + Sync {
    /// 상태 변경 시마다 호출
    fn render(&self, snapshot: &TrackerSnapshot);

    /// 비차단 알림 (저장 실패, 리스너 실패 등)
    fn notify(&self, notice: &Notice);
}
