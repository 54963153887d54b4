//! 사용자 상호작용 모델.

use serde::{Deserialize, Serialize};

/// 활동으로 인정되는 상호작용 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// 포인터 누름
    PointerDown,
    /// 포인터 이동
    PointerMove,
    /// 키 입력
    KeyDown,
    /// 스크롤
    Scroll,
    /// 터치 시작
    TouchStart,
    /// 클릭
    Click,
}

impl InteractionKind {
    /// 전체 목록
    pub const ALL: [InteractionKind; 6] = [
        Self::PointerDown,
        Self::PointerMove,
        Self::KeyDown,
        Self::Scroll,
        Self::TouchStart,
        Self::Click,
    ];
}
