//! 통합 테스트 공용 헬퍼

use quizindo::models::QuestionBank;
use quizindo::services::bank;
use quizindo::store::SqliteStore;
use sqlx::sqlite::SqlitePoolOptions;

/// 마이그레이션까지 적용된 인메모리 SQLite 스토어를 만듭니다.
///
/// `:memory:` DB는 연결마다 별개이므로 연결을 1개로 고정합니다.
pub async fn memory_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    SqliteStore::new(pool)
}

/// 문항 2개짜리 샘플 CSV.
/// - 문항 1: 단일 선택, 정답 Seoul (1점)
/// - 문항 2: 다중 선택, 정답 {Mars, Venus} (2점)
pub const GEO_CSV: &str = "\
Capital of Korea?,Which are planets?
,
Busan,`Mars
`Seoul,`Venus
Incheon,Moon";

pub fn geo_bank() -> QuestionBank {
    bank::parse_bank("geography", GEO_CSV).expect("sample csv parses")
}
