//! 일일 활동 요약 모델.
//!
//! (사용자, 날짜)별 집계 행과 추적기가 보내는 증분 업데이트를 표현.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 성과 분류 (활동/기대 근무 시간 비율 기반)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    Excellent,
    Good,
    Warning,
    Poor,
}

impl PerformanceStatus {
    /// 활동 시간과 기대 시간으로 분류
    pub fn classify(
        active_minutes: u32,
        expected_minutes: u32,
        thresholds: &PerformanceThresholds,
    ) -> Self {
        if expected_minutes == 0 {
            return Self::Excellent;
        }
        let ratio = f64::from(active_minutes) / f64::from(expected_minutes);
        if ratio >= thresholds.excellent_ratio {
            Self::Excellent
        } else if ratio >= thresholds.good_ratio {
            Self::Good
        } else if ratio >= thresholds.warning_ratio {
            Self::Warning
        } else {
            Self::Poor
        }
    }

    /// 저장소 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Poor => "poor",
        }
    }

    /// 저장소 문자열에서 복원
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "warning" => Some(Self::Warning),
            "poor" => Some(Self::Poor),
            _ => None,
        }
    }
}

/// 성과 분류 경계값 (비율, 하한 포함)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    #[serde(default = "default_excellent_ratio")]
    pub excellent_ratio: f64,
    #[serde(default = "default_good_ratio")]
    pub good_ratio: f64,
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            excellent_ratio: default_excellent_ratio(),
            good_ratio: default_good_ratio(),
            warning_ratio: default_warning_ratio(),
        }
    }
}

fn default_excellent_ratio() -> f64 {
    0.9
}

fn default_good_ratio() -> f64 {
    0.75
}

fn default_warning_ratio() -> f64 {
    0.5
}

/// 요약 행의 달력 날짜 (UTC 오프셋 적용)
pub fn summary_date(at: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    (at + Duration::minutes(i64::from(utc_offset_minutes))).date_naive()
}

/// 일일 요약 증분 업데이트
///
/// 추적기는 델타와 시각만 제공하고, 병합은 게이트웨이 측에서 수행한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryUpdate {
    /// 사용자 ID
    pub user_id: String,
    /// 요약 날짜
    pub date: NaiveDate,
    /// 로그인 시각 (최초 로그인으로 한 번만 기록됨)
    pub login_at: Option<DateTime<Utc>>,
    /// 마지막 활동 시각
    pub activity_at: Option<DateTime<Utc>>,
    /// 활동 시간 증분 (분)
    pub active_minutes_delta: u32,
    /// 세션 수 증분
    pub session_count_delta: u32,
}

impl SummaryUpdate {
    /// 로그인 업데이트 (세션 +1)
    pub fn login(user_id: &str, at: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        Self {
            user_id: user_id.to_string(),
            date: summary_date(at, utc_offset_minutes),
            login_at: Some(at),
            activity_at: Some(at),
            active_minutes_delta: 0,
            session_count_delta: 1,
        }
    }

    /// 하트비트 업데이트 (델타 없음)
    pub fn heartbeat(user_id: &str, at: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        Self {
            user_id: user_id.to_string(),
            date: summary_date(at, utc_offset_minutes),
            login_at: None,
            activity_at: Some(at),
            active_minutes_delta: 0,
            session_count_delta: 0,
        }
    }

    /// 세션 종료 업데이트 (활동 시간 반영)
    pub fn session_closed(
        user_id: &str,
        at: DateTime<Utc>,
        active_minutes: u32,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            date: summary_date(at, utc_offset_minutes),
            login_at: None,
            activity_at: Some(at),
            active_minutes_delta: active_minutes,
            session_count_delta: 0,
        }
    }
}

/// 일일 활동 요약 행
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyActivitySummary {
    pub user_id: String,
    pub date: NaiveDate,
    /// 당일 최초 로그인 (한 번 기록되면 변경 불가)
    pub first_login_at: Option<DateTime<Utc>>,
    /// 마지막 활동 (단조 증가)
    pub last_activity_at: Option<DateTime<Utc>>,
    /// 누적 활동 시간 (분, 단조 증가)
    pub total_active_minutes: u32,
    pub total_sessions: u32,
    /// 기대 근무 시간 (정책 상수)
    pub expected_work_minutes: u32,
    pub performance_status: PerformanceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classify_by_ratio() {
        let t = PerformanceThresholds::default();
        assert_eq!(PerformanceStatus::classify(480, 480, &t), PerformanceStatus::Excellent);
        assert_eq!(PerformanceStatus::classify(432, 480, &t), PerformanceStatus::Excellent);
        assert_eq!(PerformanceStatus::classify(360, 480, &t), PerformanceStatus::Good);
        assert_eq!(PerformanceStatus::classify(240, 480, &t), PerformanceStatus::Warning);
        assert_eq!(PerformanceStatus::classify(239, 480, &t), PerformanceStatus::Poor);
        assert_eq!(PerformanceStatus::classify(0, 0, &t), PerformanceStatus::Excellent);
    }

    #[test]
    fn summary_date_applies_offset() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 23, 30, 0).unwrap();
        assert_eq!(summary_date(at, 0), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        // UTC+9 → 다음 날
        assert_eq!(summary_date(at, 540), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    }

    #[test]
    fn update_constructors() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let login = SummaryUpdate::login("u1", at, 0);
        assert_eq!(login.login_at, Some(at));
        assert_eq!(login.session_count_delta, 1);

        let beat = SummaryUpdate::heartbeat("u1", at, 0);
        assert!(beat.login_at.is_none());
        assert_eq!(beat.active_minutes_delta, 0);
        assert_eq!(beat.session_count_delta, 0);

        let closed = SummaryUpdate::session_closed("u1", at, 42, 0);
        assert_eq!(closed.active_minutes_delta, 42);
        assert_eq!(closed.session_count_delta, 0);
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            PerformanceStatus::Excellent,
            PerformanceStatus::Good,
            PerformanceStatus::Warning,
            PerformanceStatus::Poor,
        ] {
            assert_eq!(PerformanceStatus::parse(status.as_str()), Some(status));
        }
    }
}
