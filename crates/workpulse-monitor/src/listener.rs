//! 상호작용 이벤트 리스너.
//!
//! [`InteractionSource`]를 구독해 이벤트마다 콜백을 그대로 호출한다.
//! 필터링이나 디바운싱은 하지 않는다.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use workpulse_core::error::CoreError;
use workpulse_core::models::interaction::InteractionKind;
use workpulse_core::ports::interaction::InteractionSource;

/// 상호작용 리스너
#[derive(Default)]
pub struct ActivityListener {
    task: Option<JoinHandle<()>>,
}

impl ActivityListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// 구독 시작
    ///
    /// 이미 실행 중이면 기존 구독을 정리한 뒤 다시 시작한다.
    pub fn start<F>(&mut self, source: &dyn InteractionSource, on_activity: F) -> Result<(), CoreError>
    where
        F: Fn(InteractionKind) + Send + Sync + 'static,
    {
        self.stop();
        let mut rx = source.subscribe()?;

        self.task = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(kind) => on_activity(kind),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("상호작용 이벤트 {}건 누락", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("상호작용 소스 종료됨");
                        break;
                    }
                }
            }
        }));
        info!("상호작용 리스너 시작");
        Ok(())
    }

    /// 모든 구독 해제
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("상호작용 리스너 중지");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ActivityListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `tokio::broadcast` 기반 상호작용 소스
///
/// UI 브리지가 [`publish`](Self::publish)로 이벤트를 넣고, 리스너가 구독한다.
#[derive(Clone)]
pub struct BroadcastInteractionSource {
    tx: broadcast::Sender<InteractionKind>,
}

impl BroadcastInteractionSource {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행 (구독자가 없으면 버려짐)
    pub fn publish(&self, kind: InteractionKind) {
        let _ = self.tx.send(kind);
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn into_shared(self) -> Arc<dyn InteractionSource> {
        Arc::new(self)
    }
}

impl Default for BroadcastInteractionSource {
    fn default() -> Self {
        Self::new(256)
    }
}

impl InteractionSource for BroadcastInteractionSource {
    fn subscribe(&self) -> Result<broadcast::Receiver<InteractionKind>, CoreError> {
        Ok(self.tx.subscribe())
    }
}
