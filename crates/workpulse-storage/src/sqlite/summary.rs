//! 일일 활동 요약 병합.
//!
//! 추적기는 델타만 보내고 병합은 여기서 한다.
//! - 최초 로그인: 한 번 기록되면 유지
//! - 마지막 활동: 더 늦은 시각만 반영
//! - 활동 시간, 세션 수: 누적
//! - 성과 분류: 누적 활동 시간 기준으로 매번 재계산

use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use tracing::debug;
use workpulse_core::error::CoreError;
use workpulse_core::models::summary::{DailyActivitySummary, PerformanceStatus, SummaryUpdate};

use super::{format_ts, parse_opt_ts, SqliteStorage};

const DATE_FORMAT: &str = "%Y-%m-%d";

impl SqliteStorage {
    pub(super) fn apply_summary_update(&self, update: &SummaryUpdate) -> Result<(), CoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 시작 실패: {e}")))?;

        let date = update.date.format(DATE_FORMAT).to_string();
        let now = format_ts(self.clock.now());

        tx.execute(
            "INSERT INTO daily_activity_summary (
                user_id, date, first_login_at, last_activity_at,
                total_active_minutes, total_sessions, expected_work_minutes, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id, date) DO UPDATE SET
                first_login_at = COALESCE(first_login_at, excluded.first_login_at),
                last_activity_at = CASE
                    WHEN last_activity_at IS NULL THEN excluded.last_activity_at
                    WHEN excluded.last_activity_at IS NULL THEN last_activity_at
                    ELSE MAX(last_activity_at, excluded.last_activity_at)
                END,
                total_active_minutes = total_active_minutes + excluded.total_active_minutes,
                total_sessions = total_sessions + excluded.total_sessions,
                updated_at = excluded.updated_at",
            rusqlite::params![
                update.user_id,
                date,
                update.login_at.map(format_ts),
                update.activity_at.map(format_ts),
                update.active_minutes_delta,
                update.session_count_delta,
                self.policy.expected_work_minutes,
                now,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("일일 요약 저장 실패: {e}")))?;

        let (total, expected): (u32, u32) = tx
            .query_row(
                "SELECT total_active_minutes, expected_work_minutes
                 FROM daily_activity_summary WHERE user_id = ?1 AND date = ?2",
                rusqlite::params![update.user_id, date],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| CoreError::Internal(format!("일일 요약 조회 실패: {e}")))?;

        let status = PerformanceStatus::classify(total, expected, &self.policy.thresholds);
        tx.execute(
            "UPDATE daily_activity_summary SET performance_status = ?1
             WHERE user_id = ?2 AND date = ?3",
            rusqlite::params![status.as_str(), update.user_id, date],
        )
        .map_err(|e| CoreError::Internal(format!("성과 분류 갱신 실패: {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 커밋 실패: {e}")))?;

        debug!(
            "일일 요약 갱신: {} {} (누적 {}분, {})",
            update.user_id,
            date,
            total,
            status.as_str()
        );
        Ok(())
    }

    /// (사용자, 날짜) 요약 조회
    pub fn get_daily_summary(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyActivitySummary>, CoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT first_login_at, last_activity_at, total_active_minutes,
                        total_sessions, expected_work_minutes, performance_status
                 FROM daily_activity_summary WHERE user_id = ?1 AND date = ?2",
                rusqlite::params![user_id, date.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("일일 요약 조회 실패: {e}")))?;

        let Some((first_login, last_activity, total_active, total_sessions, expected, status)) =
            row
        else {
            return Ok(None);
        };
        let performance_status = PerformanceStatus::parse(&status)
            .ok_or_else(|| CoreError::Internal(format!("알 수 없는 성과 분류: {status}")))?;

        Ok(Some(DailyActivitySummary {
            user_id: user_id.to_string(),
            date,
            first_login_at: parse_opt_ts(first_login)?,
            last_activity_at: parse_opt_ts(last_activity)?,
            total_active_minutes: total_active,
            total_sessions,
            expected_work_minutes: expected,
            performance_status,
        }))
    }
}
