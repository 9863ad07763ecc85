//! # SessionManager — owner 쪽 세션 상태 기계
//!
//! 배포 인스턴스당 최대 하나의 활성 세션을 관장합니다.
//!
//! ## 상태 전이
//! ```text
//! Idle ──preview()──> Previewing ──start()──> Active ──end()──> Ended
//!                        │  ▲                                     │
//!                        └──┘ (다른 은행으로 재미리보기 가능)        └─ preview()로 새 인스턴스 시작
//! ```
//!
//! `start()`는 활성 세션이 이미 있으면 덮어쓰지 않고 `SessionConflict`로
//! 실패합니다 — 이 계약이 전체 시스템에서 가장 안전-결정적(safety-critical)
//! 입니다. 동시에 두 퀴즈가 "활성"이 되면 client들이 혼란에 빠집니다.
//!
//! Active 동안 매니저는 정확히 하나의 집계 워처(구독)를 소유합니다.
//! 워처는 답안 변경 알림(또는 폴링 주기)마다 `AggregateStats`를 순수하게
//! 재계산해 watch 채널로 흘립니다. `end()`는 세션을 끝내기 **전에**
//! 워처를 중단시키므로, 기계가 Ended로 넘어간 뒤 낡은 콜백이 상태를
//! 건드리는 일이 없습니다 (불리언 플래그가 아닌 소유된 핸들 + 세대 번호).

use crate::error::AppError;
use crate::models::{AggregateStats, AnswerRecord, Question, QuestionBank, QuestionStats, Session};
use crate::services::randomizer;
use crate::store::{AnswerFeed, SessionStore};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// 현재 답안 기록 집합에서 실시간 집계를 재계산합니다.
///
/// 순수 함수입니다: 같은 입력이면 몇 번을 불러도 같은 결과 (멱등).
/// 스토어가 (세션, 문항, client) 키로 기록을 유일하게 유지하지만,
/// 혹시 중복이 섞여 들어와도 최신 제출만 반영하도록 여기서 한 번 더
/// last-write-wins를 적용합니다.
pub fn compute_aggregates(answers: &[AnswerRecord]) -> AggregateStats {
    // (문항, client) → 최신 기록
    let mut latest: BTreeMap<(&str, &str), &AnswerRecord> = BTreeMap::new();
    for record in answers {
        let key = (record.question_id.as_str(), record.client_name.as_str());
        match latest.get(&key) {
            Some(existing) if existing.submitted_at >= record.submitted_at => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut stats = AggregateStats::default();
    for record in latest.values() {
        stats.participants.insert(record.client_name.clone());
        let entry = stats
            .per_question
            .entry(record.question_id.clone())
            .or_insert_with(QuestionStats::default);
        entry.total_responses += 1;
        for option_text in &record.selected {
            *entry.option_counts.entry(option_text.clone()).or_insert(0) += 1;
        }
    }
    stats
}

/// Active 상태의 매니저가 소유하는 집계 워처 핸들
///
/// drop/abort되면 그 즉시 더 이상의 집계 갱신은 일어나지 않습니다.
struct AggregateWatcher {
    handle: JoinHandle<()>,
    rx: watch::Receiver<AggregateStats>,
}

impl Drop for AggregateWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 매니저의 상태 — 독립 불리언들이 아니라 태그된 variant 하나입니다.
enum ManagerState {
    /// 은행이 로드되지 않음
    Idle,
    /// 은행이 파싱/셔플되어 미리보기 중. 아직 client에게는 보이지 않음
    Previewing {
        bank: QuestionBank,
        display: Vec<Question>,
    },
    /// 라이브 세션 진행 중. 워처가 집계를 갱신하고 있음
    Active {
        session: Session,
        watcher: AggregateWatcher,
    },
    /// 이 세션 인스턴스는 끝남. 새 preview()가 새 인스턴스를 시작
    Ended,
}

/// owner 쪽 세션 상태 기계
pub struct SessionManager<S: SessionStore> {
    store: S,
    poll_interval: Duration,
    state: ManagerState,
    /// 워처 세대 번호. start()마다 증가하며, 로그에서 어떤 세대의
    /// 워처가 돌고 있는지 식별하는 용도입니다.
    generation: u64,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
            state: ManagerState::Idle,
            generation: 0,
        }
    }

    /// 은행을 셔플해 미리보기 상태로 들어갑니다.
    ///
    /// 여기서 만든 표시 순서가 그대로 세션에 내장되어 고정됩니다.
    /// Active 중에는 거부합니다 — 진행 중인 세션을 먼저 끝내야 합니다.
    pub fn preview(&mut self, bank: QuestionBank) -> Result<&[Question], AppError> {
        if matches!(self.state, ManagerState::Active { .. }) {
            return Err(AppError::SessionConflict);
        }
        let display = randomizer::display_order(&bank);
        self.state = ManagerState::Previewing { bank, display };
        match &self.state {
            ManagerState::Previewing { display, .. } => Ok(display),
            _ => unreachable!(),
        }
    }

    /// 미리보기 중인 은행으로 라이브 세션을 시작합니다.
    ///
    /// 충돌 검사는 스토어의 원자적 조건부 쓰기에 위임합니다 —
    /// 여기서 active_session()을 먼저 읽어 보는 식의 check-then-act는
    /// 동시 owner 간 경합을 만들 뿐이므로 하지 않습니다.
    /// 충돌 시 상태는 Previewing 그대로 남습니다 (상태 변화 없음).
    pub async fn start(&mut self) -> Result<Session, AppError> {
        let (bank, display) = match &self.state {
            ManagerState::Previewing { bank, display } => (bank.clone(), display.clone()),
            ManagerState::Active { .. } => return Err(AppError::SessionConflict),
            _ => {
                return Err(AppError::BadRequest(
                    "no question bank previewed".to_string(),
                ))
            }
        };

        let session = self.store.create_session(&bank, display).await?;
        tracing::info!(
            "Session {} started for quiz \"{}\" ({} questions)",
            session.id,
            session.quiz_name,
            session.questions.len()
        );

        self.generation += 1;
        let watcher = self.spawn_watcher(&session.id);
        self.state = ManagerState::Active { session, watcher };

        match &self.state {
            ManagerState::Active { session, .. } => Ok(session.clone()),
            _ => unreachable!(),
        }
    }

    /// 스토어에 남아 있는 활성 세션을 이 기계가 다시 소유합니다.
    ///
    /// 활성 세션의 수명은 스토어에 있고 기계는 메모리에만 있으므로,
    /// 프로세스가 재시작되면 세션은 살아 있는데 그것을 끝낼 수 있는
    /// 기계가 없는 상태가 됩니다. 그대로 두면 `one_active_session`
    /// 인덱스 때문에 새 세션도 영원히 시작할 수 없습니다. 시작 시점과
    /// 종료 핸들러가 이 메서드로 세션을 입양해 워처까지 복원합니다.
    ///
    /// 이미 Active면 아무것도 하지 않고, 스토어에도 활성 세션이 없으면
    /// 상태를 그대로 둡니다. 반환값은 입양(또는 보유) 중인 활성 세션.
    pub async fn resume(&mut self) -> Result<Option<Session>, AppError> {
        if matches!(self.state, ManagerState::Active { .. }) {
            return Ok(self.active_session().cloned());
        }

        match self.store.active_session().await? {
            Some(session) => {
                tracing::info!(
                    "Adopting active session {} left over in the store",
                    session.id
                );
                self.generation += 1;
                let watcher = self.spawn_watcher(&session.id);
                self.state = ManagerState::Active { session, watcher };
                Ok(self.active_session().cloned())
            }
            None => Ok(None),
        }
    }

    /// 진행 중인 세션을 끝냅니다.
    ///
    /// 순서가 중요합니다: 워처를 먼저 중단시키고 나서 스토어에 종료를
    /// 기록합니다. 스토어 쪽이 실패하면 워처를 다시 띄워 Active를
    /// 유지합니다 (종료가 실제로 일어나지 않았으므로).
    pub async fn end(&mut self, purge_answers: bool) -> Result<Session, AppError> {
        let session_id = match &self.state {
            ManagerState::Active { session, .. } => session.id.clone(),
            _ => return Err(AppError::NotFound),
        };

        // 구독 해제 먼저 — 이후 어떤 답안 변경도 이 기계에 도달하지 않습니다
        if let ManagerState::Active { watcher, .. } =
            std::mem::replace(&mut self.state, ManagerState::Ended)
        {
            drop(watcher);
        }

        match self.store.end_session(&session_id, purge_answers).await {
            Ok(ended) => {
                tracing::info!(
                    "Session {} ended (purge_answers = {})",
                    session_id,
                    purge_answers
                );
                Ok(ended)
            }
            Err(e) => {
                // 종료가 기록되지 않았으므로 세션은 여전히 살아 있습니다.
                // 새 워처로 Active를 복원하고 에러를 그대로 올립니다.
                let session = self
                    .store
                    .get_session(&session_id)
                    .await
                    .ok()
                    .flatten();
                if let Some(session) = session {
                    self.generation += 1;
                    let watcher = self.spawn_watcher(&session_id);
                    self.state = ManagerState::Active { session, watcher };
                }
                Err(e)
            }
        }
    }

    /// 최신 실시간 집계 스냅숏. Active가 아니면 `NotFound`.
    pub fn aggregates(&self) -> Result<AggregateStats, AppError> {
        match &self.state {
            ManagerState::Active { watcher, .. } => Ok(watcher.rx.borrow().clone()),
            _ => Err(AppError::NotFound),
        }
    }

    /// 현재 Active인 세션 (없으면 None).
    pub fn active_session(&self) -> Option<&Session> {
        match &self.state {
            ManagerState::Active { session, .. } => Some(session),
            _ => None,
        }
    }

    /// 미리보기 중인 표시 순서 (없으면 None).
    pub fn previewed_display(&self) -> Option<&[Question]> {
        match &self.state {
            ManagerState::Previewing { display, .. } => Some(display),
            _ => None,
        }
    }

    /// 상태 이름 — 로그/응답용.
    pub fn state_name(&self) -> &'static str {
        match &self.state {
            ManagerState::Idle => "idle",
            ManagerState::Previewing { .. } => "previewing",
            ManagerState::Active { .. } => "active",
            ManagerState::Ended => "ended",
        }
    }

    /// 집계 워처 태스크를 띄웁니다.
    ///
    /// 워처는 변경 알림이 오거나 폴링 주기가 돌아올 때마다 답안 스냅숏을
    /// 다시 읽어 집계를 재계산합니다. 알림 채널이 닫혀도 폴링만으로 계속
    /// 동작합니다 — 구독이 죽었다고 화면이 조용히 낡아가면 안 됩니다.
    /// 읽기 실패도 다음 주기에 재시도하는 것으로 강등합니다.
    fn spawn_watcher(&self, session_id: &str) -> AggregateWatcher {
        let (tx, rx) = watch::channel(AggregateStats::default());
        let store = self.store.clone();
        let feed = self.store.subscribe(session_id);
        let session_id = session_id.to_string();
        let poll_interval = self.poll_interval;
        let generation = self.generation;

        let handle = tokio::spawn(run_watcher(
            store,
            session_id,
            feed,
            tx,
            poll_interval,
            generation,
        ));
        AggregateWatcher { handle, rx }
    }
}

async fn run_watcher<S: SessionStore>(
    store: S,
    session_id: String,
    mut feed: AnswerFeed,
    tx: watch::Sender<AggregateStats>,
    poll_interval: Duration,
    generation: u64,
) {
    let mut feed_open = true;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        match store.answers_for_session(&session_id).await {
            Ok(answers) => {
                let _ = tx.send(compute_aggregates(&answers));
            }
            Err(e) => {
                // 읽기 장애는 치명적이지 않습니다 — 다음 폴링 주기에 재시도
                tracing::warn!(
                    "aggregate watcher (gen {}) failed to read answers for {}: {}",
                    generation,
                    session_id,
                    e
                );
            }
        }

        if feed_open {
            tokio::select! {
                changed = feed.changed() => {
                    if !changed {
                        tracing::warn!(
                            "answer feed for {} closed, falling back to polling only",
                            session_id
                        );
                        feed_open = false;
                    }
                }
                _ = ticker.tick() => {}
            }
        } else {
            ticker.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question: &str, client: &str, selected: &[&str], at: &str) -> AnswerRecord {
        AnswerRecord {
            session_id: "s".to_string(),
            question_id: question.to_string(),
            client_name: client.to_string(),
            selected: selected.iter().map(|s| s.to_string()).collect(),
            submitted_at: at.to_string(),
        }
    }

    #[test]
    fn aggregates_count_options_and_participants() {
        let answers = vec![
            record("q1", "alice", &["A"], "2026-01-01T00:00:01Z"),
            record("q1", "bob", &["B"], "2026-01-01T00:00:02Z"),
            record("q2", "alice", &["C", "D"], "2026-01-01T00:00:03Z"),
        ];
        let stats = compute_aggregates(&answers);

        assert_eq!(stats.participants.len(), 2);
        let q1 = &stats.per_question["q1"];
        assert_eq!(q1.total_responses, 2);
        assert_eq!(q1.option_counts["A"], 1);
        assert_eq!(q1.option_counts["B"], 1);
        let q2 = &stats.per_question["q2"];
        assert_eq!(q2.total_responses, 1);
        assert_eq!(q2.option_counts["C"], 1);
    }

    #[test]
    fn aggregates_are_idempotent_for_same_input() {
        let answers = vec![record("q1", "alice", &["A"], "2026-01-01T00:00:01Z")];
        assert_eq!(compute_aggregates(&answers), compute_aggregates(&answers));
    }

    #[test]
    fn duplicate_records_keep_only_latest_selection() {
        // 같은 (문항, client) 키의 이전 선택은 집계에서 사라져야 합니다
        let answers = vec![
            record("q1", "alice", &["A"], "2026-01-01T00:00:01Z"),
            record("q1", "alice", &["B"], "2026-01-01T00:00:05Z"),
        ];
        let stats = compute_aggregates(&answers);
        let q1 = &stats.per_question["q1"];
        assert_eq!(q1.total_responses, 1);
        assert_eq!(q1.option_counts.get("A"), None);
        assert_eq!(q1.option_counts["B"], 1);
    }
}
