//! 테스트용 모의 포트와 추적기 하네스.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use workpulse_core::error::CoreError;
use workpulse_core::models::interaction::InteractionKind;
use workpulse_core::models::session::{DeviceInfo, SessionStatus};
use workpulse_core::models::summary::SummaryUpdate;
use workpulse_core::models::tracker::{CascadeLevel, Notice, NoticeKind, TrackerSnapshot};
use workpulse_core::ports::gateway::PersistenceGateway;
use workpulse_core::ports::interaction::InteractionSource;
use workpulse_core::ports::presenter::PresentationAdapter;

use crate::clock::MonotonicClock;
use crate::listener::BroadcastInteractionSource;
use crate::tracker::{ActivityTracker, TrackerDeps, TrackerHandle, TrackerSettings};

/// 게이트웨이 호출 기록
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSession(String),
    FindOpenSession(String),
    CloseSession(String, DateTime<Utc>, SessionStatus),
    OpenInterval(String, DateTime<Utc>),
    CloseInterval(String, DateTime<Utc>, u32),
    Upsert(SummaryUpdate),
    ComputeActiveMinutes(String),
    Beacon(String, DateTime<Utc>),
}

/// 호출을 기록하는 모의 게이트웨이
#[derive(Default)]
pub struct MockGateway {
    calls: Mutex<Vec<Call>>,
    next_session: AtomicU64,
    next_interval: AtomicU64,
    active_minutes: AtomicU32,
    open_session: Mutex<Option<String>>,
    fail_create: AtomicBool,
    fail_find: AtomicBool,
    fail_writes: AtomicBool,
    hold_creates: AtomicBool,
    hold_opens: AtomicBool,
    create_release: Notify,
    open_release: Notify,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn upserts(&self) -> Vec<SummaryUpdate> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Upsert(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_active_minutes(&self, minutes: u32) {
        self.active_minutes.store(minutes, Ordering::SeqCst);
    }

    pub fn set_open_session(&self, session_id: Option<&str>) {
        *self.open_session.lock() = session_id.map(str::to_string);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_find(&self, fail: bool) {
        self.fail_find.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// `create_session` 응답을 `release_create` 전까지 보류
    pub fn hold_creates(&self, hold: bool) {
        self.hold_creates.store(hold, Ordering::SeqCst);
    }

    pub fn release_create(&self) {
        self.create_release.notify_one();
    }

    /// `open_inactivity_interval` 응답을 `release_open` 전까지 보류
    pub fn hold_opens(&self, hold: bool) {
        self.hold_opens.store(hold, Ordering::SeqCst);
    }

    pub fn release_open(&self) {
        self.open_release.notify_one();
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn write_result(&self) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(CoreError::ServiceUnavailable("mock".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    async fn create_session(
        &self,
        user_id: &str,
        _device: &DeviceInfo,
    ) -> Result<String, CoreError> {
        self.record(Call::CreateSession(user_id.to_string()));
        if self.hold_creates.load(Ordering::SeqCst) {
            self.create_release.notified().await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CoreError::Network("connection refused".to_string()));
        }
        let n = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("sess_{}", n))
    }

    async fn find_open_session(&self, user_id: &str) -> Result<Option<String>, CoreError> {
        self.record(Call::FindOpenSession(user_id.to_string()));
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(CoreError::Network("timeout".to_string()));
        }
        Ok(self.open_session.lock().clone())
    }

    async fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Result<(), CoreError> {
        self.record(Call::CloseSession(session_id.to_string(), ended_at, status));
        self.write_result()
    }

    async fn open_inactivity_interval(
        &self,
        session_id: &str,
        _user_id: &str,
        start_idle: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        self.record(Call::OpenInterval(session_id.to_string(), start_idle));
        if self.hold_opens.load(Ordering::SeqCst) {
            self.open_release.notified().await;
        }
        self.write_result()?;
        let n = self.next_interval.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("int_{}", n))
    }

    async fn close_inactivity_interval(
        &self,
        interval_id: &str,
        end_idle: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<(), CoreError> {
        self.record(Call::CloseInterval(
            interval_id.to_string(),
            end_idle,
            duration_minutes,
        ));
        self.write_result()
    }

    async fn upsert_daily_summary(&self, update: &SummaryUpdate) -> Result<(), CoreError> {
        self.record(Call::Upsert(update.clone()));
        self.write_result()
    }

    async fn compute_active_minutes(&self, session_id: &str) -> Result<u32, CoreError> {
        self.record(Call::ComputeActiveMinutes(session_id.to_string()));
        Ok(self.active_minutes.load(Ordering::SeqCst))
    }

    async fn notify_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.record(Call::Beacon(session_id.to_string(), ended_at));
        Ok(())
    }
}

/// 렌더링/알림을 기록하는 표시 어댑터
#[derive(Default)]
pub struct RecordingPresenter {
    snapshots: Mutex<Vec<TrackerSnapshot>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingPresenter {
    pub fn any_level(&self, level: CascadeLevel) -> bool {
        self.snapshots.lock().iter().any(|s| s.level == level)
    }

    /// 해당 단계로 전이한 횟수
    pub fn count_level(&self, level: CascadeLevel) -> usize {
        let snapshots = self.snapshots.lock();
        let mut previous = CascadeLevel::None;
        let mut count = 0;
        for snapshot in snapshots.iter() {
            if snapshot.level == level && previous != level {
                count += 1;
            }
            previous = snapshot.level;
        }
        count
    }

    pub fn notices_of(&self, kind: NoticeKind) -> usize {
        self.notices.lock().iter().filter(|n| n.kind == kind).count()
    }
}

impl PresentationAdapter for RecordingPresenter {
    fn render(&self, snapshot: &TrackerSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }

    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

/// 구독이 항상 실패하는 상호작용 소스
pub struct UnavailableSource;

impl InteractionSource for UnavailableSource {
    fn subscribe(&self) -> Result<broadcast::Receiver<InteractionKind>, CoreError> {
        Err(CoreError::ListenerUnavailable("headless".to_string()))
    }
}

/// 남은 태스크들이 진행할 기회를 준다
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// 일시정지된 시간 위에서 추적기를 구동하는 하네스
pub struct Harness {
    pub handle: TrackerHandle,
    pub gateway: Arc<MockGateway>,
    pub presenter: Arc<RecordingPresenter>,
    pub source: BroadcastInteractionSource,
    pub t0: DateTime<Utc>,
    session_id: Mutex<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_gateway(MockGateway::new()).await
    }

    pub async fn with_gateway(gateway: Arc<MockGateway>) -> Self {
        let source = BroadcastInteractionSource::new(64);
        Self::assemble(gateway, source.clone().into_shared(), source)
    }

    pub async fn build(gateway: Arc<MockGateway>, source: Arc<dyn InteractionSource>) -> Self {
        Self::assemble(gateway, source, BroadcastInteractionSource::new(8))
    }

    fn assemble(
        gateway: Arc<MockGateway>,
        source: Arc<dyn InteractionSource>,
        publisher: BroadcastInteractionSource,
    ) -> Self {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let deps = TrackerDeps {
            gateway: gateway.clone(),
            presenter: presenter.clone(),
            source,
            clock: Arc::new(MonotonicClock::starting_at(t0)),
        };
        let (handle, task) = ActivityTracker::spawn(TrackerSettings::default(), deps);
        Self {
            handle,
            gateway,
            presenter,
            source: publisher,
            t0,
            session_id: Mutex::new(None),
            task: Mutex::new(Some(task)),
        }
    }

    /// `user_1` 세션 시작
    pub async fn start(&self) -> String {
        let id = self.handle.start_session("user_1").await.unwrap();
        self.step().await;
        *self.session_id.lock() = Some(id.clone());
        id
    }

    pub fn session_id(&self) -> String {
        self.session_id.lock().clone().unwrap_or_default()
    }

    /// 대기 중인 명령과 영속화 태스크 결과까지 처리
    pub async fn step(&self) {
        for _ in 0..3 {
            settle().await;
            self.handle.flush().await.unwrap();
        }
    }

    pub async fn advance_secs(&self, secs: u64) {
        tokio::time::advance(Duration::from_secs(secs)).await;
        self.step().await;
    }

    pub async fn advance_mins(&self, mins: u64) {
        self.advance_secs(mins * 60).await;
    }

    pub async fn interact(&self, kind: InteractionKind) {
        self.source.publish(kind);
        self.step().await;
    }

    pub async fn task_finished(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await.unwrap();
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}
