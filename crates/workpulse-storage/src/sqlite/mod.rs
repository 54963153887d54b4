//! SQLite 저장소 어댑터.
//!
//! `PersistenceGateway` 포트 구현.
//!
//! # 모듈 구조
//! - `sessions`: 세션 생성/종료/조회, 만료 처리, 활동 시간 집계
//! - `inactivity`: 비활성 구간 시작/종료/조회
//! - `summary`: 일일 요약 병합 및 조회
//! - `gateway`: 포트 구현 (위 모듈 위임)

mod gateway;
mod inactivity;
mod sessions;
mod summary;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use workpulse_core::config::SummaryConfig;
use workpulse_core::error::CoreError;
use workpulse_core::ports::clock::{Clock, SystemClock};

use crate::migration;

/// SQLite 저장소
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    /// 기대 근무 시간, 성과 분류 경계값
    policy: SummaryConfig,
    /// 세션 시작 시각 등 저장소가 직접 기록하는 시각의 출처
    clock: Arc<dyn Clock>,
}

impl SqliteStorage {
    /// 파일 기반 SQLite 저장소 생성
    pub fn open(path: &Path, policy: SummaryConfig) -> Result<Self, CoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Internal(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Internal(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        info!("SQLite 저장소 초기화: {}", path.display());
        Ok(Self::from_connection(conn, policy))
    }

    /// 인메모리 SQLite 저장소 생성 (테스트용)
    pub fn open_in_memory(policy: SummaryConfig) -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Internal(format!("인메모리 SQLite 생성 실패: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| CoreError::Internal(format!("PRAGMA 설정 실패: {e}")))?;
        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        Ok(Self::from_connection(conn, policy))
    }

    /// 시각 출처 교체
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(conn: Connection, policy: SummaryConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }
}

/// 저장 형식: 밀리초 RFC3339, `Z` 접미사 (문자열 비교 = 시각 비교)
fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Internal(format!("시각 파싱 실패: {value}: {e}")))
}

fn parse_opt_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>, CoreError> {
    value.as_deref().map(parse_ts).transpose()
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_format_sorts_lexicographically() {
        let a = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        assert!(format_ts(a) < format_ts(b));
        assert!(format_ts(a).ends_with('Z'));
        assert_eq!(parse_ts(&format_ts(b)).unwrap(), b);
    }

    #[test]
    fn open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("workpulse.db");
        let storage = SqliteStorage::open(&path, SummaryConfig::default()).unwrap();
        drop(storage);
        assert!(path.exists());

        // 재오픈 시 마이그레이션 재실행 없이 열림
        SqliteStorage::open(&path, SummaryConfig::default()).unwrap();
    }
}
