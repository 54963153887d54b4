//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
const CURRENT_VERSION: u32 = 2;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: 세션, 비활성 구간, 일일 요약 테이블
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: user_sessions + user_inactivity + daily_activity_summary");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            user_agent TEXT NOT NULL DEFAULT '',
            platform TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS user_inactivity (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES user_sessions(id),
            user_id TEXT NOT NULL,
            start_idle TEXT NOT NULL,
            end_idle TEXT,
            duration_minutes INTEGER
        );

        CREATE TABLE IF NOT EXISTS daily_activity_summary (
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            first_login_at TEXT,
            last_activity_at TEXT,
            total_active_minutes INTEGER NOT NULL DEFAULT 0,
            total_sessions INTEGER NOT NULL DEFAULT 0,
            expected_work_minutes INTEGER NOT NULL,
            performance_status TEXT NOT NULL DEFAULT 'poor',
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, date)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    info!("마이그레이션 V1 완료");
    Ok(())
}

/// V2: 열린 세션/구간 조회 인덱스, 세션당 열린 구간 1개 제약
fn migrate_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V2 실행: 인덱스");

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_sessions_user_open ON user_sessions(user_id, started_at)
            WHERE ended_at IS NULL;

        CREATE INDEX IF NOT EXISTS idx_inactivity_session ON user_inactivity(session_id, start_idle);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_inactivity_one_open ON user_inactivity(session_id)
            WHERE end_idle IS NULL;

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    info!("마이그레이션 V2 완료");
    Ok(())
}
