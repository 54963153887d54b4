//! 비활성 구간 저장.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;
use workpulse_core::error::CoreError;
use workpulse_core::models::inactivity::InactivityInterval;

use super::{format_ts, parse_opt_ts, parse_ts, SqliteStorage};

impl SqliteStorage {
    /// 열린 세션에만 구간을 연다. 세션당 열린 구간은 하나 (고유 인덱스)
    pub(super) fn insert_interval(
        &self,
        session_id: &str,
        user_id: &str,
        start_idle: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();

        let inserted = conn
            .execute(
                "INSERT INTO user_inactivity (id, session_id, user_id, start_idle)
                 SELECT ?1, ?2, ?3, ?4
                 WHERE EXISTS (SELECT 1 FROM user_sessions WHERE id = ?2 AND ended_at IS NULL)",
                rusqlite::params![id, session_id, user_id, format_ts(start_idle)],
            )
            .map_err(|e| CoreError::Internal(format!("비활성 구간 저장 실패: {e}")))?;

        if inserted == 0 {
            return Err(CoreError::InvalidState(format!(
                "열린 세션이 아님: {session_id}"
            )));
        }

        debug!("비활성 구간 시작: {} (세션 {})", id, session_id);
        Ok(id)
    }

    /// 구간 종료. 종료 시각은 시작 시각 이후로 고정, 이미 닫힌 구간은 그대로 둔다
    pub(super) fn close_interval_row(
        &self,
        interval_id: &str,
        end_idle: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE user_inactivity
                 SET end_idle = MAX(start_idle, ?1), duration_minutes = ?2
                 WHERE id = ?3 AND end_idle IS NULL",
                rusqlite::params![format_ts(end_idle), duration_minutes, interval_id],
            )
            .map_err(|e| CoreError::Internal(format!("비활성 구간 종료 실패: {e}")))?;

        if updated == 1 {
            debug!("비활성 구간 종료: {} ({}분)", interval_id, duration_minutes);
            return Ok(());
        }

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM user_inactivity WHERE id = ?1)",
                [interval_id],
                |row| row.get(0),
            )
            .map_err(|e| CoreError::Internal(format!("비활성 구간 조회 실패: {e}")))?;
        if exists {
            debug!("이미 종료된 비활성 구간: {}", interval_id);
            Ok(())
        } else {
            Err(CoreError::NotFound {
                resource_type: "InactivityInterval".to_string(),
                id: interval_id.to_string(),
            })
        }
    }

    /// 세션의 비활성 구간 목록 (시작 순)
    pub fn get_intervals_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<InactivityInterval>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, start_idle, end_idle, duration_minutes
                 FROM user_inactivity WHERE session_id = ?1
                 ORDER BY start_idle ASC",
            )
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map([session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<u32>>(4)?,
                ))
            })
            .map_err(|e| CoreError::Internal(format!("비활성 구간 조회 실패: {e}")))?;

        let mut intervals = Vec::new();
        for row in rows {
            let (id, session_id, start, end, duration_minutes) =
                row.map_err(|e| CoreError::Internal(format!("행 읽기 실패: {e}")))?;
            intervals.push(InactivityInterval {
                id,
                session_id,
                start_idle: parse_ts(&start)?,
                end_idle: parse_opt_ts(end)?,
                duration_minutes,
            });
        }
        Ok(intervals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::tests_support::{storage_at, t0};
    use chrono::Duration;
    use workpulse_core::models::session::{DeviceInfo, SessionStatus};

    #[test]
    fn open_and_close_interval() {
        let (storage, _clock) = storage_at(t0());
        let session = storage.insert_session("u1", &DeviceInfo::current()).unwrap();
        let start = t0() + Duration::minutes(5);
        let id = storage.insert_interval(&session, "u1", start).unwrap();

        let open = storage.get_intervals_for_session(&session).unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].is_ongoing());

        storage
            .close_interval_row(&id, start + Duration::minutes(62), 62)
            .unwrap();
        let closed = &storage.get_intervals_for_session(&session).unwrap()[0];
        assert_eq!(closed.end_idle, Some(start + Duration::minutes(62)));
        assert_eq!(closed.duration_minutes, Some(62));
    }

    #[test]
    fn second_open_interval_is_rejected() {
        let (storage, _clock) = storage_at(t0());
        let session = storage.insert_session("u1", &DeviceInfo::current()).unwrap();
        storage.insert_interval(&session, "u1", t0()).unwrap();
        assert!(storage
            .insert_interval(&session, "u1", t0() + Duration::minutes(1))
            .is_err());
    }

    #[test]
    fn interval_on_closed_session_is_invalid() {
        let (storage, _clock) = storage_at(t0());
        let session = storage.insert_session("u1", &DeviceInfo::current()).unwrap();
        storage
            .close_session_row(&session, t0(), SessionStatus::LoggedOut)
            .unwrap();

        let result = storage.insert_interval(&session, "u1", t0());
        assert!(matches!(result, Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn end_before_start_is_clamped() {
        let (storage, _clock) = storage_at(t0());
        let session = storage.insert_session("u1", &DeviceInfo::current()).unwrap();
        let start = t0() + Duration::minutes(10);
        let id = storage.insert_interval(&session, "u1", start).unwrap();

        storage
            .close_interval_row(&id, start - Duration::seconds(30), 0)
            .unwrap();
        let interval = &storage.get_intervals_for_session(&session).unwrap()[0];
        assert_eq!(interval.end_idle, Some(start));
    }

    #[test]
    fn closing_twice_is_ignored() {
        let (storage, _clock) = storage_at(t0());
        let session = storage.insert_session("u1", &DeviceInfo::current()).unwrap();
        let id = storage.insert_interval(&session, "u1", t0()).unwrap();

        storage
            .close_interval_row(&id, t0() + Duration::minutes(3), 3)
            .unwrap();
        storage
            .close_interval_row(&id, t0() + Duration::minutes(9), 9)
            .unwrap();
        let interval = &storage.get_intervals_for_session(&session).unwrap()[0];
        assert_eq!(interval.duration_minutes, Some(3));
    }

    #[test]
    fn close_unknown_interval_is_not_found() {
        let (storage, _clock) = storage_at(t0());
        let result = storage.close_interval_row("missing", t0(), 0);
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }
}
