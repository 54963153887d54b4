//! 활동 세션 상태 머신.
//!
//! 세션 ID, 활성/비활성 상태, 마지막 활동 시각, 열린 비활성 구간, 경고 단계를 보유하는
//! 단일 액터 태스크. 타이머 알림, 상호작용 이벤트, 영속화 결과, 외부 호출이 모두 하나의
//! 명령 채널로 들어와 순서대로 처리되므로 콜백이 동시에 실행되는 일은 없다.
//!
//! 영속화 호출은 일회성 태스크로 내보내고 결과를 기다리지 않는다. 실패는 호출 지점에서
//! `warn!`으로 기록하고 표시 어댑터에 한 번 알린 뒤, 로컬 상태는 성공한 것처럼 진행한다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use workpulse_core::config::AppConfig;
use workpulse_core::error::CoreError;
use workpulse_core::models::inactivity::idle_minutes_between;
use workpulse_core::models::interaction::InteractionKind;
use workpulse_core::models::session::{DeviceInfo, SessionStatus};
use workpulse_core::models::summary::SummaryUpdate;
use workpulse_core::models::tracker::{CascadeLevel, Notice, NoticeKind, TrackerSnapshot};
use workpulse_core::ports::clock::Clock;
use workpulse_core::ports::gateway::PersistenceGateway;
use workpulse_core::ports::interaction::InteractionSource;
use workpulse_core::ports::presenter::PresentationAdapter;

use crate::cascade::InactivityCascade;
use crate::error::TrackerError;
use crate::listener::ActivityListener;

/// 추적기 동작 파라미터
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// 누적 단계 지연 (warning, reminder1, reminder2)
    pub stage_offsets: [Duration; 3],
    /// 하트비트 요약 업데이트 최소 간격
    pub heartbeat_interval: Duration,
    /// 요약 날짜 계산용 UTC 오프셋 (분)
    pub utc_offset_minutes: i32,
}

impl TrackerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            stage_offsets: config.tracker.stage_offsets(),
            heartbeat_interval: config.tracker.heartbeat_interval(),
            utc_offset_minutes: config.summary.utc_offset_minutes,
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default_config())
    }
}

/// 추적기가 사용하는 포트 묶음
#[derive(Clone)]
pub struct TrackerDeps {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub presenter: Arc<dyn PresentationAdapter>,
    pub source: Arc<dyn InteractionSource>,
    pub clock: Arc<dyn Clock>,
}

type SessionReply = oneshot::Sender<Result<String, TrackerError>>;

enum Command {
    StartSession {
        user_id: String,
        reply: SessionReply,
    },
    AdoptSession {
        user_id: String,
        session_id: String,
        reply: SessionReply,
    },
    SessionCreated {
        result: Result<String, CoreError>,
    },
    EndSession {
        reply: oneshot::Sender<Option<JoinHandle<()>>>,
    },
    Activity(InteractionKind),
    StageReached {
        level: CascadeLevel,
        generation: u64,
    },
    IntervalOpened {
        token: u64,
        result: Result<String, CoreError>,
    },
    DismissWarning,
    Unload {
        reply: oneshot::Sender<Option<JoinHandle<()>>>,
    },
    PersistenceFailed {
        operation: &'static str,
        message: String,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// 세션의 비활성 구간 상태
enum IntervalSlot {
    Idle,
    /// 생성 요청됨, ID 미수신
    Opening {
        token: u64,
        start_idle: DateTime<Utc>,
    },
    Open {
        id: String,
        start_idle: DateTime<Utc>,
    },
}

struct HeldSession {
    id: String,
    user_id: String,
    is_active: bool,
    last_activity_at: DateTime<Utc>,
    last_heartbeat_at: DateTime<Utc>,
    interval: IntervalSlot,
}

struct PendingStart {
    user_id: String,
    reply: SessionReply,
    cancelled: bool,
}

/// 추적기 액터 조작 핸들
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<TrackerSnapshot>,
}

impl TrackerHandle {
    /// 새 세션 생성 후 추적 시작
    ///
    /// 이미 세션을 보유(또는 생성 중)하면 아무것도 하지 않고
    /// `TrackerError::SessionAlreadyHeld`.
    pub async fn start_session(&self, user_id: &str) -> Result<String, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StartSession {
            user_id: user_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| TrackerError::TrackerStopped)?
    }

    /// 이미 열려 있는 세션을 이어받아 추적 시작 (로그인 요약 없음)
    pub async fn adopt_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<String, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AdoptSession {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| TrackerError::TrackerStopped)?
    }

    /// 세션 종료
    ///
    /// 보유 세션이 없으면 `None`. 있으면 종료 영속화 태스크 핸들을 돌려준다.
    pub async fn end_session(&self) -> Result<Option<JoinHandle<()>>, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::EndSession { reply })?;
        rx.await.map_err(|_| TrackerError::TrackerStopped)
    }

    /// 경고 닫기 (비활성 구간은 닫지 않음)
    pub fn dismiss_warning(&self) -> Result<(), TrackerError> {
        self.send(Command::DismissWarning)
    }

    /// 페이지 이탈 알림 (best-effort beacon)
    pub async fn unload(&self) -> Result<Option<JoinHandle<()>>, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unload { reply })?;
        rx.await.map_err(|_| TrackerError::TrackerStopped)
    }

    /// 앞서 보낸 명령이 모두 처리될 때까지 대기
    pub async fn flush(&self) -> Result<(), TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Flush { reply })?;
        rx.await.map_err(|_| TrackerError::TrackerStopped)
    }

    /// 액터 종료 (타이머와 리스너 정리)
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    /// 현재 상태
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshot_rx.clone()
    }

    fn send(&self, command: Command) -> Result<(), TrackerError> {
        self.tx
            .send(command)
            .map_err(|_| TrackerError::TrackerStopped)
    }
}

/// 활동 세션 상태 머신 (액터)
pub struct ActivityTracker {
    settings: TrackerSettings,
    heartbeat_every: chrono::Duration,
    deps: TrackerDeps,
    tx: mpsc::UnboundedSender<Command>,
    snapshot_tx: watch::Sender<TrackerSnapshot>,
    cascade: InactivityCascade,
    listener: ActivityListener,
    session: Option<HeldSession>,
    pending_start: Option<PendingStart>,
    /// 세션 종료 또는 활동 복귀 후 ID가 도착할 구간: token → (start, end)
    orphaned_intervals: HashMap<u64, (DateTime<Utc>, DateTime<Utc>)>,
    next_interval_token: u64,
    listener_failure_reported: bool,
}

impl ActivityTracker {
    /// 액터 태스크 시작
    pub fn spawn(settings: TrackerSettings, deps: TrackerDeps) -> (TrackerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(TrackerSnapshot::default());

        let stage_tx = tx.clone();
        let cascade = InactivityCascade::new(settings.stage_offsets, move |level, generation| {
            let _ = stage_tx.send(Command::StageReached { level, generation });
        });
        let heartbeat_every = chrono::Duration::from_std(settings.heartbeat_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));

        let actor = Self {
            settings,
            heartbeat_every,
            deps,
            tx: tx.clone(),
            snapshot_tx,
            cascade,
            listener: ActivityListener::new(),
            session: None,
            pending_start: None,
            orphaned_intervals: HashMap::new(),
            next_interval_token: 0,
            listener_failure_reported: false,
        };
        let task = tokio::spawn(actor.run(rx));

        (TrackerHandle { tx, snapshot_rx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("활동 추적기 시작");
        while let Some(command) = rx.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        self.cascade.cancel();
        self.listener.stop();
        info!("활동 추적기 종료");
    }

    /// 명령 처리. `false`면 루프 종료
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::StartSession { user_id, reply } => self.on_start_session(user_id, reply),
            Command::AdoptSession {
                user_id,
                session_id,
                reply,
            } => self.on_adopt_session(user_id, session_id, reply),
            Command::SessionCreated { result } => self.on_session_created(result),
            Command::EndSession { reply } => {
                let _ = reply.send(self.end_session());
            }
            Command::Activity(kind) => self.on_activity(kind),
            Command::StageReached { level, generation } => self.on_stage_reached(level, generation),
            Command::IntervalOpened { token, result } => self.on_interval_opened(token, result),
            Command::DismissWarning => self.on_dismiss_warning(),
            Command::Unload { reply } => {
                let _ = reply.send(self.send_unload_beacon());
            }
            Command::PersistenceFailed { operation, message } => {
                self.deps.presenter.notify(&Notice::new(
                    NoticeKind::PersistenceFailed,
                    format!("{} 실패: {}", operation, message),
                ));
            }
            Command::Flush { reply } => {
                let _ = reply.send(());
            }
            Command::Shutdown => return false,
        }
        true
    }

    // ── 세션 시작 ──

    fn on_start_session(&mut self, user_id: String, reply: SessionReply) {
        if self.session.is_some() || self.pending_start.is_some() {
            debug!("세션 보유 중, 시작 요청 무시");
            let _ = reply.send(Err(TrackerError::SessionAlreadyHeld));
            return;
        }
        if user_id.trim().is_empty() {
            let _ = reply.send(Err(CoreError::Validation {
                field: "user_id".to_string(),
                message: "인증된 사용자가 필요합니다".to_string(),
            }
            .into()));
            return;
        }

        let gateway = Arc::clone(&self.deps.gateway);
        let tx = self.tx.clone();
        let uid = user_id.clone();
        tokio::spawn(async move {
            let result = gateway.create_session(&uid, &DeviceInfo::current()).await;
            let _ = tx.send(Command::SessionCreated { result });
        });

        self.pending_start = Some(PendingStart {
            user_id,
            reply,
            cancelled: false,
        });
    }

    fn on_adopt_session(&mut self, user_id: String, session_id: String, reply: SessionReply) {
        if self.session.is_some() || self.pending_start.is_some() {
            let _ = reply.send(Err(TrackerError::SessionAlreadyHeld));
            return;
        }
        info!("기존 세션 이어받기: {} (사용자 {})", session_id, user_id);
        self.install_session(session_id.clone(), user_id);
        let _ = reply.send(Ok(session_id));
    }

    fn on_session_created(&mut self, result: Result<String, CoreError>) {
        let Some(pending) = self.pending_start.take() else {
            return;
        };

        match result {
            Ok(session_id) if pending.cancelled => {
                info!("시작 중 종료 요청된 세션 닫기: {}", session_id);
                let gateway = Arc::clone(&self.deps.gateway);
                let ended_at = self.deps.clock.now();
                let sid = session_id.clone();
                self.spawn_write("세션 종료", async move {
                    gateway
                        .close_session(&sid, ended_at, SessionStatus::LoggedOut)
                        .await
                });
                let _ = pending.reply.send(Err(CoreError::InvalidState(format!(
                    "세션 시작 중 종료 요청됨: {}",
                    session_id
                ))
                .into()));
            }
            Ok(session_id) => {
                info!("세션 시작: {} (사용자 {})", session_id, pending.user_id);
                self.install_session(session_id.clone(), pending.user_id.clone());

                let gateway = Arc::clone(&self.deps.gateway);
                let update = SummaryUpdate::login(
                    &pending.user_id,
                    self.deps.clock.now(),
                    self.settings.utc_offset_minutes,
                );
                self.spawn_write("로그인 요약 업데이트", async move {
                    gateway.upsert_daily_summary(&update).await
                });
                let _ = pending.reply.send(Ok(session_id));
            }
            Err(e) => {
                warn!("세션 생성 실패: {}", e);
                self.deps.presenter.notify(&Notice::new(
                    NoticeKind::SessionStartFailed,
                    format!("세션을 시작하지 못했습니다: {}", e),
                ));
                let _ = pending.reply.send(Err(e.into()));
            }
        }
    }

    fn install_session(&mut self, session_id: String, user_id: String) {
        let now = self.deps.clock.now();
        self.session = Some(HeldSession {
            id: session_id,
            user_id,
            is_active: true,
            last_activity_at: now,
            last_heartbeat_at: now,
            interval: IntervalSlot::Idle,
        });
        self.cascade.reset();

        let tx = self.tx.clone();
        let started = self.listener.start(self.deps.source.as_ref(), move |kind| {
            let _ = tx.send(Command::Activity(kind));
        });
        if let Err(e) = started {
            // 활동 감지 불가: 이 세션 동안 경고 단계 비활성
            self.cascade.cancel();
            warn!("상호작용 리스너 시작 실패: {}", e);
            if !self.listener_failure_reported {
                self.listener_failure_reported = true;
                self.deps.presenter.notify(&Notice::new(
                    NoticeKind::ListenerFailed,
                    format!("활동을 감지할 수 없습니다: {}", e),
                ));
            }
        }
        self.render();
    }

    // ── 세션 종료 ──

    fn end_session(&mut self) -> Option<JoinHandle<()>> {
        if let Some(pending) = self.pending_start.as_mut() {
            pending.cancelled = true;
        }
        let session = self.session.take()?;

        self.cascade.cancel();
        self.listener.stop();

        let ended_at = self.deps.clock.now();
        let HeldSession {
            id,
            user_id,
            interval,
            ..
        } = session;
        let open_interval = match interval {
            IntervalSlot::Open { id, start_idle } => Some((id, start_idle)),
            IntervalSlot::Opening { token, start_idle } => {
                self.orphaned_intervals.insert(token, (start_idle, ended_at));
                None
            }
            IntervalSlot::Idle => None,
        };

        info!("세션 종료: {} (사용자 {})", id, user_id);
        let gateway = Arc::clone(&self.deps.gateway);
        let tx = self.tx.clone();
        let utc_offset = self.settings.utc_offset_minutes;

        let task = tokio::spawn(async move {
            if let Some((interval_id, start_idle)) = open_interval {
                let minutes = idle_minutes_between(start_idle, ended_at);
                if let Err(e) = gateway
                    .close_inactivity_interval(&interval_id, ended_at, minutes)
                    .await
                {
                    report_failure(&tx, "비활성 구간 종료", e);
                }
            }

            if let Err(e) = gateway
                .close_session(&id, ended_at, SessionStatus::LoggedOut)
                .await
            {
                report_failure(&tx, "세션 종료", e);
            }

            let active_minutes = match gateway.compute_active_minutes(&id).await {
                Ok(minutes) => minutes,
                Err(e) => {
                    report_failure(&tx, "활동 시간 집계", e);
                    0
                }
            };

            let update = SummaryUpdate::session_closed(&user_id, ended_at, active_minutes, utc_offset);
            if let Err(e) = gateway.upsert_daily_summary(&update).await {
                report_failure(&tx, "종료 요약 업데이트", e);
            }
            debug!("세션 {} 종료 처리 완료 (활동 {}분)", id, active_minutes);
        });

        self.render();
        Some(task)
    }

    fn send_unload_beacon(&self) -> Option<JoinHandle<()>> {
        let session = self.session.as_ref()?;
        let gateway = Arc::clone(&self.deps.gateway);
        let session_id = session.id.clone();
        let ended_at = self.deps.clock.now();

        Some(tokio::spawn(async move {
            match gateway.notify_session_end(&session_id, ended_at).await {
                Ok(()) => debug!("종료 알림 전송: {}", session_id),
                Err(e) => debug!("종료 알림 실패 (무시): {}", e),
            }
        }))
    }

    // ── 활동/타이머 ──

    fn on_activity(&mut self, kind: InteractionKind) {
        let now = self.deps.clock.now();
        let Some(session) = self.session.as_mut() else {
            debug!("세션 없음, 상호작용 무시: {:?}", kind);
            return;
        };

        let mut interval_to_close = None;
        if session.is_active {
            self.cascade.reset();
        } else {
            session.is_active = true;
            match std::mem::replace(&mut session.interval, IntervalSlot::Idle) {
                IntervalSlot::Open { id, start_idle } => interval_to_close = Some((id, start_idle)),
                IntervalSlot::Opening { token, start_idle } => {
                    // ID 수신 시 닫기
                    self.orphaned_intervals.insert(token, (start_idle, now));
                }
                IntervalSlot::Idle => {}
            }
            self.cascade.reset();
            info!("활동 재개: 세션 {}", session.id);
        }
        session.last_activity_at = now;

        let heartbeat = if now - session.last_heartbeat_at >= self.heartbeat_every {
            session.last_heartbeat_at = now;
            Some(SummaryUpdate::heartbeat(
                &session.user_id,
                now,
                self.settings.utc_offset_minutes,
            ))
        } else {
            None
        };

        if let Some((interval_id, start_idle)) = interval_to_close {
            self.close_interval(interval_id, start_idle, now);
        }
        if let Some(update) = heartbeat {
            let gateway = Arc::clone(&self.deps.gateway);
            self.spawn_write("하트비트 요약 업데이트", async move {
                gateway.upsert_daily_summary(&update).await
            });
        }
        self.render();
    }

    fn on_stage_reached(&mut self, level: CascadeLevel, generation: u64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !self.cascade.accept(level, generation) {
            return;
        }
        info!("비활성 단계 도달: {} (세션 {})", level.as_str(), session.id);

        let mut open_request = None;
        if level.opens_inactivity() && session.is_active {
            session.is_active = false;
            self.next_interval_token += 1;
            let token = self.next_interval_token;
            let start_idle = session.last_activity_at;
            session.interval = IntervalSlot::Opening { token, start_idle };
            open_request = Some((token, session.id.clone(), session.user_id.clone(), start_idle));
        }

        if let Some((token, session_id, user_id, start_idle)) = open_request {
            let gateway = Arc::clone(&self.deps.gateway);
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = gateway
                    .open_inactivity_interval(&session_id, &user_id, start_idle)
                    .await;
                let _ = tx.send(Command::IntervalOpened { token, result });
            });
        }
        self.render();
    }

    fn on_interval_opened(&mut self, token: u64, result: Result<String, CoreError>) {
        if let Some((start_idle, end_idle)) = self.orphaned_intervals.remove(&token) {
            match result {
                Ok(interval_id) => {
                    debug!("지연된 비활성 구간 종료: {}", interval_id);
                    self.close_interval(interval_id, start_idle, end_idle);
                }
                Err(e) => self.interval_open_failed(e),
            }
            return;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let start_idle = match session.interval {
            IntervalSlot::Opening {
                token: pending,
                start_idle,
            } if pending == token => start_idle,
            _ => {
                debug!("알 수 없는 비활성 구간 응답 무시 (token {})", token);
                return;
            }
        };

        match result {
            Ok(id) => {
                debug!("비활성 구간 시작: {}", id);
                session.interval = IntervalSlot::Open { id, start_idle };
            }
            Err(e) => {
                session.interval = IntervalSlot::Idle;
                self.interval_open_failed(e);
            }
        }
    }

    fn interval_open_failed(&self, e: CoreError) {
        warn!("비활성 구간 시작 실패: {}", e);
        self.deps.presenter.notify(&Notice::new(
            NoticeKind::PersistenceFailed,
            format!("비활성 구간 시작 실패: {}", e),
        ));
    }

    fn on_dismiss_warning(&mut self) {
        if self.session.is_none() {
            return;
        }
        // 열린 비활성 구간은 그대로 둔다
        self.cascade.reset();
        self.render();
    }

    // ── 공통 ──

    fn close_interval(&self, interval_id: String, start_idle: DateTime<Utc>, end_idle: DateTime<Utc>) {
        let minutes = idle_minutes_between(start_idle, end_idle);
        debug!("비활성 구간 종료: {} ({}분)", interval_id, minutes);
        let gateway = Arc::clone(&self.deps.gateway);
        self.spawn_write("비활성 구간 종료", async move {
            gateway
                .close_inactivity_interval(&interval_id, end_idle, minutes)
                .await
        });
    }

    /// 결과를 기다리지 않는 영속화 호출
    fn spawn_write<F>(&self, operation: &'static str, write: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = write.await {
                report_failure(&tx, operation, e);
            }
        })
    }

    fn render(&self) {
        let snapshot = match &self.session {
            Some(session) => TrackerSnapshot {
                session_id: Some(session.id.clone()),
                user_id: Some(session.user_id.clone()),
                is_active: session.is_active,
                warning_visible: self.cascade.warning_visible(),
                level: self.cascade.level(),
                last_activity_at: Some(session.last_activity_at),
            },
            None => TrackerSnapshot::default(),
        };
        self.deps.presenter.render(&snapshot);
        self.snapshot_tx.send_replace(snapshot);
    }
}

fn report_failure(tx: &mpsc::UnboundedSender<Command>, operation: &'static str, e: CoreError) {
    warn!("{} 실패: {}", operation, e);
    let _ = tx.send(Command::PersistenceFailed {
        operation,
        message: e.to_string(),
    });
}
