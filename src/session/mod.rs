//! # 세션 상태 기계 모듈
//!
//! 이 크레이트의 핵심 로직입니다. 전역 가변 상태 없이, 각 역할이
//! 명시적인 상태 객체를 소유합니다:
//! - `manager`: owner 쪽 상태 기계 (Idle → Previewing → Active → Ended)
//!   + 실시간 답안 집계 워처
//! - `client`: client 쪽 상태 기계 (AwaitingSession → Answering → Submitted)
//!
//! 두 기계 모두 `SessionStore` 트레이트에 대해 제네릭이므로
//! 스토어 백엔드와 독립적으로 테스트할 수 있습니다.

pub mod client;
pub mod manager;

pub use client::ClientSession;
pub use manager::{compute_aggregates, SessionManager};
