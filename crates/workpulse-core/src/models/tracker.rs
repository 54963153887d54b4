//! 추적기 표시 상태 모델.
//!
//! 표시 어댑터가 소비하는 비활성 경고 단계와 세션 상태 스냅샷.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 비활성 경고 단계
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CascadeLevel {
    /// 경고 없음
    #[default]
    None,
    /// 1단계 경고
    Warning,
    /// 1차 리마인더
    Reminder1,
    /// 2차 리마인더 (비활성 전환)
    Reminder2,
}

impl CascadeLevel {
    /// 타이머가 도달할 수 있는 단계 (순서대로)
    pub const STAGES: [CascadeLevel; 3] = [Self::Warning, Self::Reminder1, Self::Reminder2];

    /// 비활성 구간을 여는 단계인지
    pub fn opens_inactivity(&self) -> bool {
        matches!(self, Self::Reminder2)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Warning => "warning",
            Self::Reminder1 => "reminder1",
            Self::Reminder2 => "reminder2",
        }
    }
}

/// 추적기 상태 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// 현재 세션 ID
    pub session_id: Option<String>,
    /// 세션 소유 사용자
    pub user_id: Option<String>,
    /// 활성 여부 (false면 비활성 구간 진행 중)
    pub is_active: bool,
    /// 경고 표시 여부
    pub warning_visible: bool,
    /// 현재 경고 단계
    pub level: CascadeLevel,
    /// 마지막 활동 시각
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// 사용자 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// 세션 시작 실패
    SessionStartFailed,
    /// 저장 실패 (추적은 계속)
    PersistenceFailed,
    /// 상호작용 감지 불가
    ListenerFailed,
}

/// 비차단 사용자 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
