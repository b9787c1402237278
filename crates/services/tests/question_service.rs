mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use prep_core::model::{Difficulty, Question, QuestionId};
use prep_core::time::fixed_clock;
use services::{QuestionService, QuestionServiceError, SyncConfig};
use storage::repository::QuestionRepository;

use support::CountingQuestions;

async fn seeded(n: u64) -> Arc<CountingQuestions> {
    let repo = Arc::new(CountingQuestions::default());
    for id in 1..=n {
        let difficulty = if id % 3 == 0 {
            Difficulty::Hard
        } else {
            Difficulty::Easy
        };
        let q = Question::new(
            QuestionId::new(id),
            "upsc",
            "geography",
            difficulty,
            // Reverse order field so ordering cannot come from ids.
            i64::try_from(100 - id).unwrap(),
            format!("Q{id}"),
            vec!["A".into(), "B".into()],
            0,
            None,
        )
        .unwrap();
        repo.upsert_question(&q).await.unwrap();
    }
    repo
}

#[tokio::test]
async fn pages_are_ordered_and_sized() {
    let repo = seeded(25).await;
    let service = QuestionService::new(repo, &SyncConfig::default(), fixed_clock());

    let first = service.page("upsc", "geography", None, 1).await.unwrap();
    assert_eq!(first.total, 25);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.questions.len(), 10);
    assert_eq!(first.questions[0].id(), QuestionId::new(25));

    let last = service.page("upsc", "geography", None, 3).await.unwrap();
    assert_eq!(last.questions.len(), 5);
    assert_eq!(last.questions[4].id(), QuestionId::new(1));
}

#[tokio::test]
async fn difficulty_filter_uses_its_own_total() {
    let repo = seeded(25).await;
    let service = QuestionService::new(repo, &SyncConfig::default(), fixed_clock());

    let hard = service
        .page("upsc", "geography", Some(Difficulty::Hard), 1)
        .await
        .unwrap();
    assert_eq!(hard.total, 8);
    assert_eq!(hard.total_pages, 1);
    assert!(hard.questions.iter().all(|q| q.difficulty() == Difficulty::Hard));
}

#[tokio::test]
async fn repeated_page_requests_hit_the_cache() {
    let repo = seeded(12).await;
    let service = QuestionService::new(repo.clone(), &SyncConfig::default(), fixed_clock());

    let a = service.page("upsc", "geography", None, 2).await.unwrap();
    let b = service.page("upsc", "geography", None, 2).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(repo.page_calls.load(Ordering::SeqCst), 1);
    assert_eq!(repo.count_calls.load(Ordering::SeqCst), 1);

    service.clear_cache();
    service.page("upsc", "geography", None, 2).await.unwrap();
    assert_eq!(repo.page_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let repo = seeded(5).await;
    let service = QuestionService::new(repo.clone(), &SyncConfig::default(), fixed_clock());

    let page = service.page("upsc", "geography", None, 4).await.unwrap();
    assert!(page.questions.is_empty());
    assert_eq!(page.total_pages, 1);
    assert_eq!(repo.page_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn page_zero_is_rejected() {
    let repo = seeded(1).await;
    let service = QuestionService::new(repo, &SyncConfig::default(), fixed_clock());
    let err = service.page("upsc", "geography", None, 0).await.unwrap_err();
    assert!(matches!(err, QuestionServiceError::InvalidPage));
}
