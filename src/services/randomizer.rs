//! # 셔플 서비스 (Randomizer)
//!
//! 은행의 정규 순서로부터 세션용 표시 순서를 만듭니다.
//! 알고리즘은 rand의 `SliceRandom::shuffle` — 편향 없는 Fisher-Yates입니다.
//!
//! 시드 고정/재현은 하지 않습니다. 테스트는 "특정 순열이 나온다"가 아니라
//! "입력의 순열이다"(같은 원소, 같은 길이)만 검증해야 합니다.
//!
//! 선택지는 `QuestionOpt` 값 통째로 섞이므로 correct 플래그(정규 정체성)가
//! 텍스트와 함께 이동합니다. 표시 위치에서 원래 정체성으로 되돌아가는
//! 매핑을 따로 관리할 필요가 없습니다.

use crate::models::{Question, QuestionBank};
use rand::seq::SliceRandom;
use rand::thread_rng;

/// 문항 순서를 셔플한 사본을 반환합니다. 각 문항의 선택지 순서는 그대로입니다.
pub fn shuffle_questions(bank: &QuestionBank) -> Vec<Question> {
    let mut questions = bank.questions.clone();
    questions.shuffle(&mut thread_rng());
    questions
}

/// 한 문항의 선택지 순서를 셔플한 사본을 반환합니다.
pub fn shuffle_options(question: &Question) -> Question {
    let mut shuffled = question.clone();
    shuffled.options.shuffle(&mut thread_rng());
    shuffled
}

/// 세션에 내장할 표시 순서를 만듭니다: 문항 순서와
/// 각 문항의 선택지 순서를 모두 셔플합니다.
pub fn display_order(bank: &QuestionBank) -> Vec<Question> {
    shuffle_questions(bank)
        .iter()
        .map(shuffle_options)
        .collect()
}
