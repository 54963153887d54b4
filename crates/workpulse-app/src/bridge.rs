//! UI 브리지.
//!
//! 한 줄에 하나씩 들어오는 JSON 신호를 인증 채널, 상호작용 소스, 추적기로 전달한다.
//!
//! ```text
//! {"type":"sign_in","user_id":"u1"}
//! {"type":"interaction","kind":"key_down"}
//! {"type":"dismiss_warning"}
//! {"type":"sign_out"}
//! {"type":"unload"}
//! ```

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use workpulse_core::models::interaction::InteractionKind;
use workpulse_monitor::listener::BroadcastInteractionSource;
use workpulse_monitor::tracker::TrackerHandle;

/// UI 신호
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiSignal {
    SignIn { user_id: String },
    SignOut,
    Interaction { kind: InteractionKind },
    DismissWarning,
    Unload,
}

/// 브리지 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// `unload` 신호 수신
    Unload,
    /// 입력 스트림 종료 (페이지 이탈과 동일하게 처리)
    InputClosed,
    /// 종료 신호 수신
    Shutdown,
}

pub struct UiBridge {
    auth_tx: watch::Sender<Option<String>>,
    source: BroadcastInteractionSource,
    tracker: TrackerHandle,
}

impl UiBridge {
    pub fn new(
        auth_tx: watch::Sender<Option<String>>,
        source: BroadcastInteractionSource,
        tracker: TrackerHandle,
    ) -> Self {
        Self {
            auth_tx,
            source,
            tracker,
        }
    }

    /// 입력 스트림 처리 루프
    pub async fn run<R>(&self, reader: R, mut shutdown_rx: watch::Receiver<bool>) -> BridgeExit
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(exit) = self.handle_line(&line) {
                            return exit;
                        }
                    }
                    Ok(None) => {
                        info!("UI 입력 스트림 종료");
                        return BridgeExit::InputClosed;
                    }
                    Err(e) => {
                        warn!("UI 입력 읽기 실패: {e}");
                        return BridgeExit::InputClosed;
                    }
                },
                _ = shutdown_rx.changed() => return BridgeExit::Shutdown,
            }
        }
    }

    fn handle_line(&self, line: &str) -> Option<BridgeExit> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let signal: UiSignal = match serde_json::from_str(line) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("잘못된 UI 신호 무시: {e}");
                return None;
            }
        };
        debug!("UI 신호: {:?}", signal);

        match signal {
            UiSignal::SignIn { user_id } => {
                self.auth_tx.send_replace(Some(user_id));
            }
            UiSignal::SignOut => {
                self.auth_tx.send_replace(None);
            }
            UiSignal::Interaction { kind } => self.source.publish(kind),
            UiSignal::DismissWarning => {
                if let Err(e) = self.tracker.dismiss_warning() {
                    warn!("경고 닫기 실패: {e}");
                }
            }
            UiSignal::Unload => return Some(BridgeExit::Unload),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::BufReader;
    use workpulse_core::config::SummaryConfig;
    use workpulse_core::ports::clock::SystemClock;
    use workpulse_core::ports::interaction::InteractionSource;
    use workpulse_monitor::tracker::{ActivityTracker, TrackerDeps, TrackerSettings};
    use workpulse_storage::sqlite::SqliteStorage;

    use crate::presenter::JsonLinesPresenter;

    fn tracker(source: &BroadcastInteractionSource) -> TrackerHandle {
        let deps = TrackerDeps {
            gateway: Arc::new(SqliteStorage::open_in_memory(SummaryConfig::default()).unwrap()),
            presenter: Arc::new(JsonLinesPresenter::new(Box::new(std::io::sink()))),
            source: source.clone().into_shared(),
            clock: Arc::new(SystemClock),
        };
        ActivityTracker::spawn(TrackerSettings::default(), deps).0
    }

    #[test]
    fn signals_parse() {
        let parse = |s: &str| serde_json::from_str::<UiSignal>(s).unwrap();
        assert_eq!(
            parse(r#"{"type":"sign_in","user_id":"u1"}"#),
            UiSignal::SignIn {
                user_id: "u1".to_string()
            }
        );
        assert_eq!(
            parse(r#"{"type":"interaction","kind":"scroll"}"#),
            UiSignal::Interaction {
                kind: InteractionKind::Scroll
            }
        );
        assert_eq!(parse(r#"{"type":"unload"}"#), UiSignal::Unload);
        assert!(serde_json::from_str::<UiSignal>(r#"{"type":"reboot"}"#).is_err());
    }

    #[tokio::test]
    async fn routes_signals_until_unload() {
        let source = BroadcastInteractionSource::new(16);
        let mut interactions = source.subscribe().unwrap();
        let (auth_tx, auth_rx) = watch::channel(None);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = UiBridge::new(auth_tx, source.clone(), tracker(&source));

        let input = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"sign_in\",\"user_id\":\"u1\"}\n")
            .read(b"not json\n\n")
            .read(b"{\"type\":\"interaction\",\"kind\":\"key_down\"}\n")
            .read(b"{\"type\":\"dismiss_warning\"}\n")
            .read(b"{\"type\":\"unload\"}\n")
            .build();

        let exit = bridge.run(BufReader::new(input), shutdown_rx).await;
        assert_eq!(exit, BridgeExit::Unload);
        assert_eq!(auth_rx.borrow().as_deref(), Some("u1"));
        assert_eq!(interactions.try_recv().unwrap(), InteractionKind::KeyDown);
    }

    #[tokio::test]
    async fn sign_out_clears_auth() {
        let source = BroadcastInteractionSource::new(16);
        let (auth_tx, auth_rx) = watch::channel(Some("u1".to_string()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = UiBridge::new(auth_tx, source.clone(), tracker(&source));

        let input = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"sign_out\"}\n")
            .build();

        let exit = bridge.run(BufReader::new(input), shutdown_rx).await;
        assert_eq!(exit, BridgeExit::InputClosed);
        assert!(auth_rx.borrow().is_none());
    }

    #[tokio::test]
    async fn shutdown_stops_bridge() {
        let source = BroadcastInteractionSource::new(16);
        let (auth_tx, _auth_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let bridge = UiBridge::new(auth_tx, source.clone(), tracker(&source));

        // 입력이 오지 않는 스트림
        let (_client, server) = tokio::io::duplex(64);
        let run = bridge.run(BufReader::new(server), shutdown_rx);
        shutdown_tx.send_replace(true);
        assert_eq!(run.await, BridgeExit::Shutdown);
    }
}
