//! tokio 단조 시계 기반 벽시계.
//!
//! 고정된 기준 시각에 `tokio::time::Instant` 경과분을 더한다.
//! 일시정지된 테스트 런타임에서는 `tokio::time::advance`와 함께 움직인다.

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use workpulse_core::ports::clock::Clock;

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    base_wall: DateTime<Utc>,
    base_instant: Instant,
}

impl MonotonicClock {
    /// 현재 시스템 시각 기준
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// 지정 시각 기준
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            base_wall: wall,
            base_instant: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.base_instant);
        match chrono::Duration::from_std(elapsed) {
            Ok(delta) => self.base_wall + delta,
            Err(_) => self.base_wall,
        }
    }
}
