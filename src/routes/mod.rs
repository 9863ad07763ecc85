//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! Axum에서 핸들러는 HTTP 요청을 받아 응답을 반환하는 async 함수입니다.
//!
//! 각 하위 모듈:
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `quizzes`: 문제 은행 업로드/조회/삭제 핸들러 + 공유 상태(AppState)
//! - `sessions`: 세션 수명주기와 client 답안/최종 제출 핸들러

pub mod health;
pub mod quizzes;
pub mod sessions;

// 각 모듈의 핸들러 함수들을 재공개하여
// `routes::upload_quiz`처럼 바로 접근 가능하게 합니다.
pub use health::*;
pub use quizzes::*;
pub use sessions::*;
