//! 세션 모델.
//!
//! 로그인부터 로그아웃까지의 연속된 사용자 체류 기간을 표현.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// 진행 중
    Active,
    /// 로그아웃으로 종료
    LoggedOut,
    /// 비정상 종료 후 만료 처리
    Expired,
}

impl SessionStatus {
    /// 저장소/와이어 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::LoggedOut => "logged_out",
            Self::Expired => "expired",
        }
    }

    /// 저장소 문자열에서 복원
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "logged_out" => Some(Self::LoggedOut),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// 세션을 연 클라이언트 정보 (정보성, 해석하지 않음)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// 에이전트 문자열
    pub user_agent: String,
    /// 플랫폼 식별자
    pub platform: String,
}

impl DeviceInfo {
    /// 현재 프로세스 기준 기기 정보
    pub fn current() -> Self {
        Self {
            user_agent: format!("workpulse/{}", env!("CARGO_PKG_VERSION")),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

/// 사용자 세션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 세션 ID (저장소가 할당)
    pub id: String,
    /// 소유 사용자 ID
    pub user_id: String,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각 (None이면 진행 중)
    pub ended_at: Option<DateTime<Utc>>,
    /// 세션 상태
    pub status: SessionStatus,
    /// 기기 정보
    pub device: DeviceInfo,
}

impl Session {
    /// 진행 중인지 확인
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}
