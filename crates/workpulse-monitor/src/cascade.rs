//! 비활성 경고 단계 타이머.
//!
//! `none → warning → reminder1 → reminder2` 순으로 진행되는 단계 타이머.
//! 단계 시간은 마지막 (재)무장 시점 기준 누적값이며, `reminder2` 이후에는
//! 다음 재무장 전까지 더 이상 발화하지 않는다.
//!
//! 타이머 태스크는 단계 도달 시 `(level, generation)`으로 콜백을 호출한다.
//! 재무장/취소 시 세대가 증가하므로, 이미 채널에 들어간 이전 세대 알림은
//! [`InactivityCascade::accept`]에서 걸러진다.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use workpulse_core::models::tracker::CascadeLevel;

/// 단계 도달 콜백
pub type StageCallback = Arc<dyn Fn(CascadeLevel, u64) + Send + Sync>;

/// 비활성 경고 단계 타이머
pub struct InactivityCascade {
    /// 누적 단계 지연 (warning, reminder1, reminder2)
    offsets: [Duration; 3],
    on_stage: StageCallback,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    level: CascadeLevel,
    warning_visible: bool,
}

impl InactivityCascade {
    pub fn new<F>(offsets: [Duration; 3], on_stage: F) -> Self
    where
        F: Fn(CascadeLevel, u64) + Send + Sync + 'static,
    {
        Self {
            offsets,
            on_stage: Arc::new(on_stage),
            generation: 0,
            pending: None,
            level: CascadeLevel::None,
            warning_visible: false,
        }
    }

    /// 대기 중인 타이머를 취소하고 세 단계를 새로 예약
    ///
    /// 단계는 `none`으로 돌아가지만 경고 표시 여부는 유지된다.
    pub fn arm(&mut self) {
        self.abort_pending();
        self.generation += 1;
        self.level = CascadeLevel::None;

        let generation = self.generation;
        let offsets = self.offsets;
        let on_stage = Arc::clone(&self.on_stage);
        let armed_at = Instant::now();

        self.pending = Some(tokio::spawn(async move {
            for (level, offset) in CascadeLevel::STAGES.into_iter().zip(offsets) {
                tokio::time::sleep_until(armed_at + offset).await;
                on_stage(level, generation);
            }
        }));
        debug!("비활성 타이머 무장 (세대 {})", generation);
    }

    /// `arm()` + 경고 표시 해제
    pub fn reset(&mut self) {
        self.arm();
        self.warning_visible = false;
    }

    /// 재무장 없이 모든 타이머 취소
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.generation += 1;
        self.level = CascadeLevel::None;
        self.warning_visible = false;
    }

    /// 타이머 알림 반영
    ///
    /// 현재 세대의 알림이면 단계를 올리고 경고를 표시한 뒤 `true`.
    /// 취소/재무장 이전에 발화한 알림이면 무시하고 `false`.
    pub fn accept(&mut self, level: CascadeLevel, generation: u64) -> bool {
        if generation != self.generation || level <= self.level {
            debug!(
                "이전 세대 단계 알림 무시: {:?} (세대 {} / 현재 {})",
                level, generation, self.generation
            );
            return false;
        }
        self.level = level;
        self.warning_visible = true;
        true
    }

    pub fn level(&self) -> CascadeLevel {
        self.level
    }

    pub fn warning_visible(&self) -> bool {
        self.warning_visible
    }

    /// 예약된 단계가 남아 있는지
    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for InactivityCascade {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn offsets() -> [Duration; 3] {
        [
            Duration::from_secs(300),
            Duration::from_secs(1_800),
            Duration::from_secs(3_600),
        ]
    }

    fn cascade() -> (InactivityCascade, mpsc::UnboundedReceiver<(CascadeLevel, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cascade = InactivityCascade::new(offsets(), move |level, generation| {
            let _ = tx.send((level, generation));
        });
        (cascade, rx)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stages_fire_in_order() {
        let (mut cascade, mut rx) = cascade();
        cascade.arm();

        tokio::time::advance(Duration::from_secs(299)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        let (level, generation) = rx.try_recv().unwrap();
        assert_eq!(level, CascadeLevel::Warning);
        assert!(cascade.accept(level, generation));
        assert!(cascade.warning_visible());

        tokio::time::advance(Duration::from_secs(1_500)).await;
        settle().await;
        let (level, generation) = rx.try_recv().unwrap();
        assert_eq!(level, CascadeLevel::Reminder1);
        assert!(cascade.accept(level, generation));

        tokio::time::advance(Duration::from_secs(1_800)).await;
        settle().await;
        let (level, generation) = rx.try_recv().unwrap();
        assert_eq!(level, CascadeLevel::Reminder2);
        assert!(cascade.accept(level, generation));
        assert_eq!(cascade.level(), CascadeLevel::Reminder2);

        // reminder2는 재발화하지 않음
        tokio::time::advance(Duration::from_secs(7_200)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert!(!cascade.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_from_none() {
        let (mut cascade, mut rx) = cascade();
        cascade.arm();

        tokio::time::advance(Duration::from_secs(240)).await;
        settle().await;
        cascade.reset();

        // 원래 warning 시점 (300초) 경과해도 발화 없음
        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(180)).await;
        settle().await;
        let (level, _) = rx.try_recv().unwrap();
        assert_eq!(level, CascadeLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_ignored() {
        let (mut cascade, mut rx) = cascade();
        cascade.arm();

        tokio::time::advance(Duration::from_secs(300)).await;
        settle().await;
        let (level, generation) = rx.try_recv().unwrap();

        // 알림 처리 전에 재무장
        cascade.arm();
        assert!(!cascade.accept(level, generation));
        assert_eq!(cascade.level(), CascadeLevel::None);
        assert!(!cascade.warning_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn arm_keeps_warning_reset_clears_it() {
        let (mut cascade, mut rx) = cascade();
        cascade.arm();
        tokio::time::advance(Duration::from_secs(300)).await;
        settle().await;
        let (level, generation) = rx.try_recv().unwrap();
        assert!(cascade.accept(level, generation));

        cascade.arm();
        assert_eq!(cascade.level(), CascadeLevel::None);
        assert!(cascade.warning_visible());

        cascade.reset();
        assert!(!cascade.warning_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_all_stages() {
        let (mut cascade, mut rx) = cascade();
        cascade.arm();
        assert!(cascade.is_armed());

        cascade.cancel();
        tokio::time::advance(Duration::from_secs(4_000)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert!(!cascade.is_armed());
    }
}
