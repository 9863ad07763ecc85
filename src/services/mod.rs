//! # 서비스(비즈니스 로직) 모듈
//!
//! HTTP/DB와 무관한 순수 로직을 모아둔 모듈입니다.
//! - `bank`: CSV 원문 → QuestionBank 파싱
//! - `randomizer`: 문항/선택지 셔플 (Fisher-Yates)
//! - `scoring`: 채점 엔진 — 문항 채점과 최종 점수 요약

pub mod bank;
pub mod randomizer;
pub mod scoring;
