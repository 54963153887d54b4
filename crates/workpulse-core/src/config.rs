//! 애플리케이션 설정 구조체.
//!
//! 비활성 단계 시간, 일일 요약 정책, 백엔드 연결, 로컬 저장소 설정을 정의한다.
//! 파일 로드/저장은 [`crate::config_manager::ConfigManager`]가 담당.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::summary::PerformanceThresholds;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 활동 추적 설정
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// 일일 요약 정책
    #[serde(default)]
    pub summary: SummaryConfig,
    /// 백엔드 연결 설정
    #[serde(default)]
    pub backend: BackendConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
}

// ============================================================
// 활동 추적 설정
// ============================================================

/// 활동 추적 설정: 비활성 경고 단계 (마지막 활동 기준 누적 초)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 1단계 경고 (기본 5분)
    #[serde(default = "default_warning_after_secs")]
    pub warning_after_secs: u64,
    /// 1차 리마인더 (기본 30분)
    #[serde(default = "default_reminder1_after_secs")]
    pub reminder1_after_secs: u64,
    /// 2차 리마인더, 비활성 전환 (기본 60분)
    #[serde(default = "default_reminder2_after_secs")]
    pub reminder2_after_secs: u64,
    /// 하트비트 요약 업데이트 최소 간격
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// 인증 후 세션 시작 지연
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            warning_after_secs: default_warning_after_secs(),
            reminder1_after_secs: default_reminder1_after_secs(),
            reminder2_after_secs: default_reminder2_after_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            start_delay_ms: default_start_delay_ms(),
        }
    }
}

impl TrackerConfig {
    /// 단계 시간은 0보다 크고 엄격히 증가해야 한다
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.warning_after_secs == 0 {
            return Err(CoreError::Config(
                "warning_after_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.reminder1_after_secs <= self.warning_after_secs
            || self.reminder2_after_secs <= self.reminder1_after_secs
        {
            return Err(CoreError::Config(format!(
                "경고 단계 시간이 증가하지 않음: {} / {} / {}",
                self.warning_after_secs, self.reminder1_after_secs, self.reminder2_after_secs
            )));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(CoreError::Config(
                "heartbeat_interval_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }

    /// 세 단계의 누적 지연 (warning, reminder1, reminder2 순)
    pub fn stage_offsets(&self) -> [Duration; 3] {
        [
            Duration::from_secs(self.warning_after_secs),
            Duration::from_secs(self.reminder1_after_secs),
            Duration::from_secs(self.reminder2_after_secs),
        ]
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

fn default_warning_after_secs() -> u64 {
    300
}

fn default_reminder1_after_secs() -> u64 {
    1_800
}

fn default_reminder2_after_secs() -> u64 {
    3_600
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_start_delay_ms() -> u64 {
    500
}

// ============================================================
// 일일 요약 정책
// ============================================================

/// 일일 요약 정책
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// 기대 근무 시간 (분)
    #[serde(default = "default_expected_work_minutes")]
    pub expected_work_minutes: u32,
    /// 요약 날짜 계산용 UTC 오프셋 (분)
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// 성과 분류 경계값
    #[serde(flatten)]
    pub thresholds: PerformanceThresholds,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            expected_work_minutes: default_expected_work_minutes(),
            utc_offset_minutes: 0,
            thresholds: PerformanceThresholds::default(),
        }
    }
}

fn default_expected_work_minutes() -> u32 {
    480
}

// ============================================================
// 백엔드 연결 설정
// ============================================================

/// 호스팅 백엔드 연결 설정
///
/// `base_url`이 비어 있으면 로컬 SQLite 게이트웨이를 사용한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: String,
    /// 공개 API 키 (`apikey` 헤더 및 Bearer 토큰)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 종료 알림(beacon) 타임아웃
    #[serde(default = "default_beacon_timeout_ms")]
    pub beacon_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            beacon_timeout_ms: default_beacon_timeout_ms(),
        }
    }
}

impl BackendConfig {
    /// 원격 백엔드 사용 여부
    pub fn is_remote(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn beacon_timeout(&self) -> Duration {
        Duration::from_millis(self.beacon_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_beacon_timeout_ms() -> u64 {
    1_500
}

// ============================================================
// 로컬 저장소 설정
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// DB 파일 경로 (None이면 데이터 디렉토리 + `db_file_name`)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_db_file_name")]
    pub db_file_name: String,
    /// 시작 시 이 시간보다 오래 열린 세션을 만료 처리
    #[serde(default = "default_stale_session_hours")]
    pub stale_session_hours: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            db_file_name: default_db_file_name(),
            stale_session_hours: default_stale_session_hours(),
        }
    }
}

fn default_db_file_name() -> String {
    "workpulse.db".to_string()
}

fn default_stale_session_hours() -> u32 {
    24
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 전체 설정 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        self.tracker.validate()?;
        let t = &self.summary.thresholds;
        if !(t.excellent_ratio >= t.good_ratio && t.good_ratio >= t.warning_ratio) {
            return Err(CoreError::Config(
                "성과 분류 경계값은 excellent >= good >= warning 이어야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}
