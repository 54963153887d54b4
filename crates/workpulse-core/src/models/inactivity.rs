//! 비활성 구간 모델.
//!
//! 세션이 열려 있는 동안 상호작용이 없었던 연속 구간.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 두 시각 사이의 경과 분 (내림, 음수는 0)
pub fn idle_minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let millis = (end - start).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    u32::try_from(millis / 60_000).unwrap_or(u32::MAX)
}

/// 비활성 구간 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactivityInterval {
    /// 구간 ID
    pub id: String,
    /// 소속 세션 ID
    pub session_id: String,
    /// 비활성 시작 시각 (마지막 활동 시각)
    pub start_idle: DateTime<Utc>,
    /// 비활성 종료 시각 (None이면 진행 중)
    pub end_idle: Option<DateTime<Utc>>,
    /// 지속 시간 (분, 종료 시 계산)
    pub duration_minutes: Option<u32>,
}

impl InactivityInterval {
    /// 진행 중인지 확인
    pub fn is_ongoing(&self) -> bool {
        self.end_idle.is_none()
    }
}
