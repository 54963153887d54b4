//! `PersistenceGateway` 구현.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use workpulse_core::error::CoreError;
use workpulse_core::models::session::{DeviceInfo, SessionStatus};
use workpulse_core::models::summary::SummaryUpdate;
use workpulse_core::ports::gateway::PersistenceGateway;

use super::SqliteStorage;

#[async_trait]
impl PersistenceGateway for SqliteStorage {
    async fn create_session(&self, user_id: &str, device: &DeviceInfo) -> Result<String, CoreError> {
        self.insert_session(user_id, device)
    }

    async fn find_open_session(&self, user_id: &str) -> Result<Option<String>, CoreError> {
        self.latest_open_session(user_id)
    }

    async fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Result<(), CoreError> {
        self.close_session_row(session_id, ended_at, status)
            .map(|_| ())
    }

    async fn open_inactivity_interval(
        &self,
        session_id: &str,
        user_id: &str,
        start_idle: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        self.insert_interval(session_id, user_id, start_idle)
    }

    async fn close_inactivity_interval(
        &self,
        interval_id: &str,
        end_idle: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<(), CoreError> {
        self.close_interval_row(interval_id, end_idle, duration_minutes)
    }

    async fn upsert_daily_summary(&self, update: &SummaryUpdate) -> Result<(), CoreError> {
        self.apply_summary_update(update)
    }

    async fn compute_active_minutes(&self, session_id: &str) -> Result<u32, CoreError> {
        self.active_minutes(session_id)
    }

    /// 로컬 저장소는 즉시 기록되므로 종료 알림 = 세션 종료
    async fn notify_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let closed = self.close_session_row(session_id, ended_at, SessionStatus::LoggedOut)?;
        if closed {
            debug!("종료 알림으로 세션 종료: {}", session_id);
        }
        Ok(())
    }
}
