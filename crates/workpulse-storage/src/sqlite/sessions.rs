//! 세션 저장.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tracing::{debug, info};
use uuid::Uuid;
use workpulse_core::error::CoreError;
use workpulse_core::models::inactivity::idle_minutes_between;
use workpulse_core::models::session::{DeviceInfo, Session, SessionStatus};

use super::{format_ts, parse_opt_ts, parse_ts, SqliteStorage};

impl SqliteStorage {
    pub(super) fn insert_session(
        &self,
        user_id: &str,
        device: &DeviceInfo,
    ) -> Result<String, CoreError> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();
        let started_at = self.clock.now();

        conn.execute(
            "INSERT INTO user_sessions (id, user_id, started_at, status, user_agent, platform)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                user_id,
                format_ts(started_at),
                SessionStatus::Active.as_str(),
                device.user_agent,
                device.platform,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("세션 저장 실패: {e}")))?;

        debug!("세션 생성: {} (사용자 {})", id, user_id);
        Ok(id)
    }

    pub(super) fn latest_open_session(&self, user_id: &str) -> Result<Option<String>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id FROM user_sessions
             WHERE user_id = ?1 AND ended_at IS NULL
             ORDER BY started_at DESC LIMIT 1",
            [user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CoreError::Internal(format!("열린 세션 조회 실패: {e}")))
    }

    /// 열린 세션 종료. 이미 닫힌 세션이면 `false`
    pub(super) fn close_session_row(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Result<bool, CoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE user_sessions
                 SET ended_at = MAX(started_at, ?1), status = ?2
                 WHERE id = ?3 AND ended_at IS NULL",
                rusqlite::params![format_ts(ended_at), status.as_str(), session_id],
            )
            .map_err(|e| CoreError::Internal(format!("세션 종료 실패: {e}")))?;

        if updated == 1 {
            debug!("세션 종료: {} ({})", session_id, status.as_str());
            return Ok(true);
        }

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM user_sessions WHERE id = ?1)",
                [session_id],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Internal(format!("세션 조회 실패: {e}")))?;
        if !exists {
            return Err(CoreError::NotFound {
                resource_type: "Session".to_string(),
                id: session_id.to_string(),
            });
        }
        debug!("이미 종료된 세션: {}", session_id);
        Ok(false)
    }

    /// 세션 조회
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>, CoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, user_id, started_at, ended_at, status, user_agent, platform
                 FROM user_sessions WHERE id = ?1",
                [session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("세션 조회 실패: {e}")))?;

        let Some((id, user_id, started, ended, status, user_agent, platform)) = row else {
            return Ok(None);
        };
        let status = SessionStatus::parse(&status)
            .ok_or_else(|| CoreError::Internal(format!("알 수 없는 세션 상태: {status}")))?;

        Ok(Some(Session {
            id,
            user_id,
            started_at: parse_ts(&started)?,
            ended_at: parse_opt_ts(ended)?,
            status,
            device: DeviceInfo {
                user_agent,
                platform,
            },
        }))
    }

    /// 비정상 종료로 남은 세션 만료 처리
    ///
    /// `cutoff` 이전에 시작되어 아직 열린 세션을 `expired`로 닫는다.
    /// 종료 시각은 마지막 비활성 구간 시작(없으면 세션 시작)이며,
    /// 열린 비활성 구간도 같은 시각으로 닫는다.
    pub fn expire_stale_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize, CoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 시작 실패: {e}")))?;

        let sessions = tx
            .execute(
                "UPDATE user_sessions
                 SET ended_at = COALESCE(
                         (SELECT MAX(i.start_idle) FROM user_inactivity i
                          WHERE i.session_id = user_sessions.id),
                         started_at),
                     status = 'expired'
                 WHERE ended_at IS NULL AND started_at < ?1",
                [format_ts(cutoff)],
            )
            .map_err(|e| CoreError::Internal(format!("세션 만료 처리 실패: {e}")))?;

        let expired = tx
            .execute(
                "UPDATE user_inactivity
                 SET end_idle = start_idle, duration_minutes = 0
                 WHERE end_idle IS NULL
                   AND session_id IN (SELECT id FROM user_sessions WHERE status = 'expired')",
                [],
            )
            .map_err(|e| CoreError::Internal(format!("비활성 구간 만료 처리 실패: {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 커밋 실패: {e}")))?;

        if sessions > 0 {
            info!("만료 세션 {}개 정리 (열린 구간 {}개)", sessions, expired);
        }
        Ok(sessions)
    }

    /// 세션 활동 시간 (분)
    ///
    /// 세션 길이(분, 내림) − 닫힌 구간 합 − 열린 구간 경과분. 0 미만은 0.
    pub(super) fn active_minutes(&self, session_id: &str) -> Result<u32, CoreError> {
        let conn = self.lock()?;
        let (started, ended): (String, Option<String>) = conn
            .query_row(
                "SELECT started_at, ended_at FROM user_sessions WHERE id = ?1",
                [session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("세션 조회 실패: {e}")))?
            .ok_or_else(|| CoreError::NotFound {
                resource_type: "Session".to_string(),
                id: session_id.to_string(),
            })?;

        let started_at = parse_ts(&started)?;
        let session_end = parse_opt_ts(ended)?.unwrap_or_else(|| self.clock.now());
        let span = idle_minutes_between(started_at, session_end);

        let mut stmt = conn
            .prepare("SELECT start_idle, duration_minutes FROM user_inactivity WHERE session_id = ?1")
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;
        let rows = stmt
            .query_map([session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<u32>>(1)?))
            })
            .map_err(|e| CoreError::Internal(format!("비활성 구간 조회 실패: {e}")))?;

        let mut idle: u32 = 0;
        for row in rows {
            let (start_idle, duration) =
                row.map_err(|e| CoreError::Internal(format!("행 읽기 실패: {e}")))?;
            let minutes = match duration {
                Some(minutes) => minutes,
                None => idle_minutes_between(parse_ts(&start_idle)?, session_end),
            };
            idle = idle.saturating_add(minutes);
        }

        Ok(span.saturating_sub(idle))
    }
}
