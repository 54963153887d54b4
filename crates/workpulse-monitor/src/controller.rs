//! 세션 라이프사이클 컨트롤러.
//!
//! 인증 상태(`watch` 채널)를 따라 세션을 시작/종료한다.
//! - 인증됨 + 보유 세션 없음 → 짧은 지연 후 시작 (열린 세션이 있으면 이어받기)
//! - 로그아웃 + 보유 세션 있음 → 종료
//! - 페이지 이탈 → 종료 알림(beacon) 후 제한 시간 내 종료

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use workpulse_core::ports::gateway::PersistenceGateway;

use crate::error::TrackerError;
use crate::tracker::TrackerHandle;

/// 세션 라이프사이클 컨트롤러
pub struct SessionLifecycleController {
    tracker: TrackerHandle,
    gateway: Arc<dyn PersistenceGateway>,
    start_delay: Duration,
}

impl SessionLifecycleController {
    pub fn new(
        tracker: TrackerHandle,
        gateway: Arc<dyn PersistenceGateway>,
        start_delay: Duration,
    ) -> Self {
        Self {
            tracker,
            gateway,
            start_delay,
        }
    }

    /// 인증 상태 변경을 따라가는 루프
    ///
    /// `auth_rx` 값은 인증된 사용자 ID (`None`이면 미인증).
    /// 종료 신호 또는 인증 채널 종료 시 반환한다.
    pub async fn run(
        &self,
        mut auth_rx: watch::Receiver<Option<String>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("세션 라이프사이클 컨트롤러 시작");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let desired = auth_rx.borrow_and_update().clone();
            let held = self.tracker.snapshot().user_id;

            match (desired, held) {
                (Some(user), Some(current)) if user == current => {}
                (Some(user), current) => {
                    if current.is_some() {
                        // 다른 사용자로 전환
                        self.end().await;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.start_delay) => self.start(&user).await,
                        changed = auth_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            continue;
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
                (None, Some(_)) => self.end().await,
                (None, None) => {}
            }

            tokio::select! {
                changed = auth_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
        info!("세션 라이프사이클 컨트롤러 종료");
    }

    /// 페이지 이탈 처리
    ///
    /// 종료 알림은 기다리지 않고 내보낸 뒤, 정상 종료 처리를 `grace` 안에서 기다린다.
    pub async fn unload(&self, grace: Duration) {
        match self.tracker.unload().await {
            Ok(Some(_beacon)) => debug!("종료 알림 전송 시작"),
            Ok(None) => debug!("보유 세션 없음, 종료 알림 생략"),
            Err(e) => {
                warn!("종료 알림 요청 실패: {}", e);
                return;
            }
        }

        // 생성 중인 세션도 종료 요청 (ID 수신 즉시 닫힘)
        match self.tracker.end_session().await {
            Ok(Some(task)) => {
                if tokio::time::timeout(grace, task).await.is_err() {
                    warn!("세션 종료 처리 시간 초과 ({:?})", grace);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("세션 종료 실패: {}", e),
        }
    }

    async fn start(&self, user_id: &str) {
        // 중복 세션 검사 실패 시 열린 세션이 없다고 간주
        let existing = match self.gateway.find_open_session(user_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("열린 세션 조회 실패, 새 세션 생성: {}", e);
                None
            }
        };

        let result = match existing {
            Some(session_id) => self.tracker.adopt_session(user_id, &session_id).await,
            None => self.tracker.start_session(user_id).await,
        };
        match result {
            Ok(session_id) => debug!("세션 추적 시작: {}", session_id),
            Err(TrackerError::SessionAlreadyHeld) => debug!("이미 세션 보유 중"),
            Err(e) => warn!("세션 시작 실패: {}", e),
        }
    }

    async fn end(&self) {
        match self.tracker.end_session().await {
            Ok(Some(_task)) => debug!("세션 종료 요청 완료"),
            Ok(None) => {}
            Err(e) => warn!("세션 종료 실패: {}", e),
        }
    }
}
