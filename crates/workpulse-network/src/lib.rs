//! # workpulse-network
//!
//! 원격 백엔드 어댑터.
//! PostgREST 스타일 REST 엔드포인트로 세션, 비활성 구간, 일일 요약을 기록하고
//! 페이지 이탈 시 짧은 제한 시간의 종료 알림을 보낸다.
//!
//! ```rust,ignore
//! use workpulse_network::rest_gateway::RestGateway;
//!
//! let gateway = RestGateway::new(&config.backend)?;
//! ```

pub mod response;
pub mod rest_gateway;
