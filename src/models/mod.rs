//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `quiz`: 문제 은행(QuestionBank)과 문항/선택지 구조체
//! - `session`: 라이브 세션, 답안 기록, 집계 통계, 점수 요약 구조체
//!
//! `pub use X::*;`는 하위 모듈의 모든 공개 항목을
//! 이 모듈에서 바로 접근할 수 있게 재공개(re-export)합니다.
//! 예: `crate::models::quiz::Question` 대신 `crate::models::Question`으로 접근 가능

pub mod quiz;
pub mod session;

pub use quiz::*;
pub use session::*;
