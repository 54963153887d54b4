//! 라이프사이클 관리.
//!
//! 종료 신호 전파와 OS 시그널 처리. SIGINT/SIGTERM은 페이지 이탈로 취급한다.

use tokio::sync::watch;
use tracing::info;

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// OS 시그널 수신
    Signal,
    /// 다른 경로에서 종료 요청
    Requested,
}

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }

    /// 종료 수신기
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// 종료 신호 발송
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        self.shutdown_tx.send_replace(true);
    }

    /// OS 시그널(SIGINT, SIGTERM) 또는 종료 요청 대기
    ///
    /// 종료 신호는 보내지 않는다. 호출 측이 이탈 처리 후 `shutdown()` 호출.
    pub async fn wait_for_exit(&self) -> ExitReason {
        let mut shutdown_rx = self.subscribe();
        if *shutdown_rx.borrow_and_update() {
            return ExitReason::Requested;
        }

        tokio::select! {
            _ = wait_for_signal() => ExitReason::Signal,
            _ = shutdown_rx.changed() => ExitReason::Requested,
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT 핸들러 등록 실패");
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM 핸들러 등록 실패");

        tokio::select! {
            _ = sigint.recv() => info!("SIGINT 수신"),
            _ = sigterm.recv() => info!("SIGTERM 수신"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl+C 핸들러 등록 실패");
        info!("Ctrl+C 수신");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let lm = LifecycleManager::new();
        assert!(!*lm.subscribe().borrow());
    }

    #[test]
    fn shutdown_reaches_subscribers() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        lm.shutdown();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn requested_shutdown_ends_wait() {
        let lm = std::sync::Arc::new(LifecycleManager::new());
        let waiter = {
            let lm = lm.clone();
            tokio::spawn(async move { lm.wait_for_exit().await })
        };
        tokio::task::yield_now().await;
        lm.shutdown();
        assert_eq!(waiter.await.unwrap(), ExitReason::Requested);
    }

    #[tokio::test]
    async fn already_shut_down_returns_immediately() {
        let lm = LifecycleManager::new();
        lm.shutdown();
        assert_eq!(lm.wait_for_exit().await, ExitReason::Requested);
    }
}
