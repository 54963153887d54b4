//! JSON Lines 표시 어댑터.
//!
//! 상태 스냅샷과 알림을 한 줄에 하나씩 출력한다 (기본: stdout).
//! 로그는 stderr로 가므로 출력 스트림에는 UI 메시지만 남는다.

use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use tracing::warn;
use workpulse_core::models::tracker::{Notice, TrackerSnapshot};
use workpulse_core::ports::presenter::PresentationAdapter;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum UiMessage<'a> {
    State(&'a TrackerSnapshot),
    Notice(&'a Notice),
}

/// JSON Lines 표시 어댑터
pub struct JsonLinesPresenter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesPresenter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&self, message: &UiMessage<'_>) {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                warn!("UI 메시지 직렬화 실패: {e}");
                return;
            }
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!("UI 메시지 출력 실패: {e}");
        }
    }
}

impl PresentationAdapter for JsonLinesPresenter {
    fn render(&self, snapshot: &TrackerSnapshot) {
        self.emit(&UiMessage::State(snapshot));
    }

    fn notify(&self, notice: &Notice) {
        self.emit(&UiMessage::Notice(notice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use workpulse_core::models::tracker::{CascadeLevel, NoticeKind};

    /// 출력 내용을 공유 버퍼에 쌓는 writer
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<serde_json::Value> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    #[test]
    fn renders_state_line() {
        let buf = SharedBuf::default();
        let presenter = JsonLinesPresenter::new(Box::new(buf.clone()));
        presenter.render(&TrackerSnapshot {
            session_id: Some("sess_1".to_string()),
            user_id: Some("user_1".to_string()),
            is_active: true,
            warning_visible: true,
            level: CascadeLevel::Reminder1,
            last_activity_at: None,
        });

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "state");
        assert_eq!(lines[0]["level"], "reminder1");
        assert_eq!(lines[0]["warning_visible"], true);
        assert_eq!(lines[0]["session_id"], "sess_1");
    }

    #[test]
    fn notice_line() {
        let buf = SharedBuf::default();
        let presenter = JsonLinesPresenter::new(Box::new(buf.clone()));
        presenter.notify(&Notice::new(NoticeKind::PersistenceFailed, "close_session"));

        let lines = buf.lines();
        assert_eq!(lines[0]["type"], "notice");
        assert_eq!(lines[0]["kind"], "persistence_failed");
        assert_eq!(lines[0]["message"], "close_session");
    }
}
