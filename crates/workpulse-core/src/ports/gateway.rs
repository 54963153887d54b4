//! 영속화 게이트웨이 포트.
//!
//! 구현: `workpulse-storage` crate (SQLite), `workpulse-network` crate (REST)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::session::{DeviceInfo, SessionStatus};
use crate::models::summary::SummaryUpdate;

/// 세션/비활성 구간/일일 요약 영속화 인터페이스
///
/// 요약 병합(최초 로그인 보존, 마지막 활동 단조 증가, 활동 시간 누적)과
/// 성과 분류는 구현 측 책임이다.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// 세션 생성, 할당된 세션 ID 반환
    async fn create_session(&self, user_id: &str, device: &DeviceInfo)
        -> Result<String, CoreError>;

    /// 사용자의 열린 세션 조회 (중복 세션 방지용)
    async fn find_open_session(&self, user_id: &str) -> Result<Option<String>, CoreError>;

    /// 세션 종료
    async fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Result<(), CoreError>;

    /// 비활성 구간 시작, 구간 ID 반환
    async fn open_inactivity_interval(
        &self,
        session_id: &str,
        user_id: &str,
        start_idle: DateTime<Utc>,
    ) -> Result<String, CoreError>;

    /// 비활성 구간 종료
    async fn close_inactivity_interval(
        &self,
        interval_id: &str,
        end_idle: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<(), CoreError>;

    /// 일일 요약 upsert
    async fn upsert_daily_summary(&self, update: &SummaryUpdate) -> Result<(), CoreError>;

    /// 세션 활동 시간 집계 (분)
    async fn compute_active_minutes(&self, session_id: &str) -> Result<u32, CoreError>;

    /// 페이지 이탈 시 세션 종료 알림 (best-effort)
    ///
    /// 짧은 타임아웃으로 제한되며 실패해도 무방하다.
    async fn notify_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;
}
