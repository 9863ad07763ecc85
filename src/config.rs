//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로
//! - `OWNER_NAMES`: owner 권한을 가진 사용자 이름 목록 (쉼표 구분 허용 리스트)
//! - `PASS_PERCENTAGE`: 합격 기준 퍼센트 (기본값 90)
//! - `ANSWER_POLL_INTERVAL_MS`: 집계 워처의 폴링 간격 (알림 채널 장애 시 대비책)
//! - `PURGE_ON_END`: 세션 종료 시 답안 기록 삭제 여부의 기본값
//! - `HOST`: 서버 바인딩 주소
//! - `PORT`: 서버 포트 번호

use std::env;

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 파일 경로 (예: "sqlite:data/quizindo.db")
    pub database_url: String,
    /// owner로 인정되는 사용자 이름들 (대소문자 무시 비교)
    pub owner_names: Vec<String>,
    /// 합격 기준 퍼센트 — percentage >= pass_percentage 이면 합격
    pub pass_percentage: u8,
    /// 집계 워처의 폴링 간격(ms).
    /// 변경 알림 채널이 끊기거나 밀려도 이 주기로는 반드시 다시 읽습니다.
    pub answer_poll_interval_ms: u64,
    /// 세션 종료 요청이 purge 여부를 명시하지 않았을 때의 기본값
    pub purge_on_end: bool,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?, // 필수: 없으면 에러

            // "alice,bob" 형태의 쉼표 구분 목록을 파싱합니다.
            // 빈 항목은 버리고, 비교를 위해 앞뒤 공백을 제거합니다.
            owner_names: env::var("OWNER_NAMES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            pass_percentage: env::var("PASS_PERCENTAGE")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .unwrap_or(90), // 파싱 실패 시 기본값

            answer_poll_interval_ms: env::var("ANSWER_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),

            purge_on_end: env::var("PURGE_ON_END")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false), // 기본: 답안 기록 유지

            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        })
    }

    /// 주어진 이름이 owner 허용 리스트에 있는지 확인합니다.
    /// 대소문자는 무시하고 비교합니다.
    pub fn is_owner(&self, name: &str) -> bool {
        self.owner_names
            .iter()
            .any(|o| o.eq_ignore_ascii_case(name))
    }
}
