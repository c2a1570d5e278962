//! End-to-end action tests against the in-memory store

use bson::oid::ObjectId;
use std::sync::Arc;

use doubtdesk::actions::{Desk, NewQuestion};
use doubtdesk::db::schemas::{AnswerDoc, NotificationKind, UserDoc};
use doubtdesk::db::{MemoryStore, QuestionFilter, Store};
use doubtdesk::reputation::ReputationPolicy;
use doubtdesk::stats::Rating;
use doubtdesk::DeskError;

struct Fixture {
    store: Arc<MemoryStore>,
    desk: Desk,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let desk = Desk::new(store.clone(), ReputationPolicy::default());
        Self { store, desk }
    }

    async fn user(&self, name: &str, joined: bool) -> ObjectId {
        let id = self
            .store
            .insert_user(UserDoc::new(
                name.to_string(),
                format!("{}@college.edu", name),
                "not-a-real-hash".to_string(),
            ))
            .await
            .unwrap();
        if joined {
            self.desk.join_community(&id).await.unwrap();
        }
        id
    }

    async fn question(&self, author: &ObjectId) -> ObjectId {
        self.desk
            .ask_question(
                author,
                NewQuestion {
                    title: "How does virtual memory paging work?".into(),
                    description: "I am confused about page tables and TLB misses in OS.".into(),
                    category: "Subjects".into(),
                    tags: vec!["OS".into(), "memory".into()],
                },
            )
            .await
            .unwrap()
    }

    async fn answer(&self, author: &ObjectId, question: &ObjectId) -> ObjectId {
        self.desk
            .submit_answer(
                author,
                question,
                "Each process has its own page table mapping pages to frames.",
            )
            .await
            .unwrap()
    }

    async fn user_doc(&self, id: &ObjectId) -> UserDoc {
        self.store.find_user(id).await.unwrap().unwrap()
    }

    async fn answer_doc(&self, id: &ObjectId) -> AnswerDoc {
        self.store.find_answer(id).await.unwrap().unwrap()
    }
}

fn r(v: i32) -> Rating {
    Rating::new(v).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[tokio::test]
async fn test_documented_rating_scenario() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let alice = fx.user("alice", false).await;
    let bob = fx.user("bob", false).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&writer, &q).await;

    let first = fx.desk.rate_answer(&alice, &q, &a, r(4)).await.unwrap();
    assert!(first.is_new);
    assert_eq!(first.answer.count, 1);
    assert!(close(first.answer.average, 4.0));

    let second = fx.desk.rate_answer(&bob, &q, &a, r(2)).await.unwrap();
    assert_eq!(second.answer.count, 2);
    assert!(close(second.answer.average, 3.0));

    let rerate = fx.desk.rate_answer(&alice, &q, &a, r(5)).await.unwrap();
    assert!(!rerate.is_new);
    assert_eq!(rerate.previous, Some(r(4)));
    assert_eq!(rerate.answer.count, 2);
    assert!(close(rerate.answer.average, 3.5));

    let answer = fx.answer_doc(&a).await;
    assert_eq!(answer.total_ratings, 2);
    assert!(close(answer.average_rating, 3.5));

    let author = fx.user_doc(&writer).await;
    assert_eq!(author.total_ratings_received, 2);
    assert!(close(author.average_rating, 3.5));
}

#[tokio::test]
async fn test_mean_tracks_exact_sum() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&writer, &q).await;

    let mut raters = Vec::new();
    let mut values = Vec::new();
    for i in 0..12 {
        let rater = fx.user(&format!("rater{}", i), false).await;
        let value = (i * 3 % 5) + 1;
        fx.desk.rate_answer(&rater, &q, &a, r(value)).await.unwrap();
        raters.push(rater);
        values.push(value);
    }

    // Every third rater changes their mind
    for i in (0..12).step_by(3) {
        let value = 6 - values[i];
        fx.desk.rate_answer(&raters[i], &q, &a, r(value)).await.unwrap();
        values[i] = value;
    }

    let expected: i32 = values.iter().sum();
    let answer = fx.answer_doc(&a).await;
    assert_eq!(answer.total_ratings, 12);
    assert!((answer.average_rating * answer.total_ratings as f64 - expected as f64).abs() < 1e-6);

    let author = fx.user_doc(&writer).await;
    assert_eq!(author.total_ratings_received, 12);
    assert!(close(author.average_rating, answer.average_rating));
}

#[tokio::test]
async fn test_author_mean_spans_answers() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let rater = fx.user("rater", false).await;
    let q1 = fx.question(&asker).await;
    let q2 = fx.question(&asker).await;
    let a1 = fx.answer(&writer, &q1).await;
    let a2 = fx.answer(&writer, &q2).await;

    fx.desk.rate_answer(&rater, &q1, &a1, r(5)).await.unwrap();
    fx.desk.rate_answer(&rater, &q2, &a2, r(2)).await.unwrap();

    let author = fx.user_doc(&writer).await;
    assert_eq!(author.total_ratings_received, 2);
    assert!(close(author.average_rating, 3.5));
    assert_eq!(fx.answer_doc(&a1).await.total_ratings, 1);
}

#[tokio::test]
async fn test_concurrent_ratings_are_not_lost() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&writer, &q).await;

    let mut raters = Vec::new();
    for i in 0..20 {
        raters.push(fx.user(&format!("rater{}", i), false).await);
    }

    let results = futures::future::join_all(raters.iter().enumerate().map(|(i, rater)| {
        let value = (i as i32 % 5) + 1;
        let (desk, q, a) = (&fx.desk, &q, &a);
        async move { desk.rate_answer(rater, q, a, r(value)).await }
    }))
    .await;
    assert!(results.iter().all(|r| r.is_ok()));

    let expected: i32 = (0..20).map(|i| (i % 5) + 1).sum();
    let answer = fx.answer_doc(&a).await;
    assert_eq!(answer.total_ratings, 20);
    assert!((answer.average_rating * 20.0 - expected as f64).abs() < 1e-6);
}

#[tokio::test]
async fn test_unlike_restores_counts() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let liker = fx.user("liker", true).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&writer, &q).await;

    let before = fx.user_doc(&writer).await.reputation_score;

    assert!(fx.desk.toggle_like(&liker, &q, &a).await.unwrap());
    assert_eq!(fx.answer_doc(&a).await.likes_count, 1);
    assert_eq!(fx.user_doc(&writer).await.reputation_score, before + 2);

    assert!(!fx.desk.toggle_like(&liker, &q, &a).await.unwrap());
    assert_eq!(fx.answer_doc(&a).await.likes_count, 0);
    assert_eq!(fx.user_doc(&writer).await.reputation_score, before);
    assert_eq!(fx.store.rating_entry_count().await, 0);
}

#[tokio::test]
async fn test_unlike_keeps_rating_entry() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let fan = fx.user("fan", true).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&writer, &q).await;

    fx.desk.toggle_like(&fan, &q, &a).await.unwrap();
    fx.desk.rate_answer(&fan, &q, &a, r(4)).await.unwrap();
    fx.desk.toggle_like(&fan, &q, &a).await.unwrap();

    assert_eq!(fx.store.rating_entry_count().await, 1);
    let answer = fx.answer_doc(&a).await;
    assert_eq!(answer.likes_count, 0);
    assert_eq!(answer.total_ratings, 1);
}

#[tokio::test]
async fn test_accept_moves_reputation() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let first = fx.user("first", true).await;
    let second = fx.user("second", true).await;
    let q = fx.question(&asker).await;
    let a1 = fx.answer(&first, &q).await;
    let a2 = fx.answer(&second, &q).await;

    // Both start at +5 from answering
    let outcome = fx.desk.accept_answer(&asker, &q, &a1).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(fx.user_doc(&first).await.reputation_score, 20);
    assert_eq!(fx.user_doc(&first).await.accepted_answers_count, 1);

    let outcome = fx.desk.accept_answer(&asker, &q, &a2).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.previous, Some(a1));

    let first_doc = fx.user_doc(&first).await;
    let second_doc = fx.user_doc(&second).await;
    assert_eq!(first_doc.reputation_score, 5);
    assert_eq!(first_doc.accepted_answers_count, 0);
    assert_eq!(second_doc.reputation_score, 20);
    assert_eq!(second_doc.accepted_answers_count, 1);

    assert!(!fx.answer_doc(&a1).await.is_accepted);
    assert!(fx.answer_doc(&a2).await.is_accepted);
    let question = fx.store.find_question(&q).await.unwrap().unwrap();
    assert_eq!(question.accepted_answer_id, Some(a2));

    // Accepting the same answer again changes nothing
    let outcome = fx.desk.accept_answer(&asker, &q, &a2).await.unwrap();
    assert!(!outcome.changed);
    assert_eq!(fx.user_doc(&second).await.reputation_score, 20);
}

#[tokio::test]
async fn test_self_rating_mutates_nothing() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&writer, &q).await;

    let err = fx.desk.rate_answer(&writer, &q, &a, r(5)).await.unwrap_err();
    assert!(matches!(err, DeskError::Forbidden(_)));

    let answer = fx.answer_doc(&a).await;
    assert_eq!(answer.total_ratings, 0);
    assert_eq!(answer.average_rating, 0.0);
    assert_eq!(fx.user_doc(&writer).await.total_ratings_received, 0);
    assert_eq!(fx.store.rating_entry_count().await, 0);
}

#[tokio::test]
async fn test_rejected_actions_leave_state_untouched() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let outsider = fx.user("outsider", false).await;
    let q = fx.question(&asker).await;
    let other_q = fx.question(&writer).await;
    let a = fx.answer(&writer, &q).await;

    // Not a member
    let err = fx
        .desk
        .submit_answer(&outsider, &q, "I think the TLB caches translations.")
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Forbidden(_)));
    let err = fx.desk.toggle_like(&outsider, &q, &a).await.unwrap_err();
    assert!(matches!(err, DeskError::Forbidden(_)));
    // A missing answer is reported before membership
    let err = fx
        .desk
        .toggle_like(&outsider, &q, &ObjectId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));

    // Not the question owner
    let err = fx.desk.accept_answer(&writer, &q, &a).await.unwrap_err();
    assert!(matches!(err, DeskError::Forbidden(_)));

    // Answer belongs to another question
    let err = fx.desk.accept_answer(&writer, &other_q, &a).await.unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));

    // Body too short
    let err = fx.desk.submit_answer(&writer, &q, "short").await.unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));

    // Missing question
    let err = fx
        .desk
        .submit_answer(&writer, &ObjectId::new(), "A perfectly fine answer body.")
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));

    let question = fx.store.find_question(&q).await.unwrap().unwrap();
    assert_eq!(question.answers_count, 1);
    assert_eq!(question.accepted_answer_id, None);
    assert_eq!(fx.user_doc(&outsider).await.reputation_score, 0);
    let answer = fx.answer_doc(&a).await;
    assert_eq!(answer.likes_count, 0);
    assert!(!answer.is_accepted);
    // +2 for the question, +5 for the answer
    assert_eq!(fx.user_doc(&writer).await.reputation_score, 7);
}

#[tokio::test]
async fn test_submit_answer_effects() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let q = fx.question(&asker).await;

    fx.answer(&writer, &q).await;
    // Answering your own question notifies nobody
    fx.answer(&asker, &q).await;

    let writer_doc = fx.user_doc(&writer).await;
    assert_eq!(writer_doc.reputation_score, 5);
    assert_eq!(writer_doc.contribution_count, 1);

    let question = fx.store.find_question(&q).await.unwrap().unwrap();
    assert_eq!(question.answers_count, 2);

    let notes = fx.desk.notifications(&asker).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::QuestionAnswered);
}

#[tokio::test]
async fn test_ask_question_effects() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let outsider = fx.user("outsider", false).await;

    fx.question(&asker).await;
    fx.question(&asker).await;

    let asker_doc = fx.user_doc(&asker).await;
    assert_eq!(asker_doc.reputation_score, 4);
    assert_eq!(asker_doc.contribution_count, 2);
    assert_eq!(fx.store.tag_usage("os").await, Some(2));
    assert_eq!(fx.store.tag_usage("memory").await, Some(2));

    let err = fx
        .desk
        .ask_question(
            &outsider,
            NewQuestion {
                title: "Is the lab exam open book?".into(),
                description: "Wondering whether we can bring notes to the DBMS lab.".into(),
                category: "Labs".into(),
                tags: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Forbidden(_)));

    let err = fx
        .desk
        .ask_question(
            &asker,
            NewQuestion {
                title: "Is the lab exam open book?".into(),
                description: "Wondering whether we can bring notes to the DBMS lab.".into(),
                category: "Sports".into(),
                tags: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::Validation(_)));
}

#[tokio::test]
async fn test_question_detail_orders_answers() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let early = fx.user("early", true).await;
    let late = fx.user("late", true).await;
    let q = fx.question(&asker).await;
    let a_early = fx.answer(&early, &q).await;
    let a_late = fx.answer(&late, &q).await;

    fx.desk.accept_answer(&asker, &q, &a_late).await.unwrap();
    fx.desk.toggle_like(&asker, &q, &a_early).await.unwrap();

    let detail = fx.desk.question_detail(&q, Some(&asker)).await.unwrap();
    let ids: Vec<&str> = detail.answers.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![a_late.to_hex(), a_early.to_hex()]);
    assert_eq!(detail.answers[1].liked_by_me, Some(true));
    assert_eq!(detail.question.accepted_answer_id, Some(a_late.to_hex()));
    assert!(detail.question.has_accepted_answer);

    let guest = fx.desk.question_detail(&q, None).await.unwrap();
    assert_eq!(guest.answers[1].liked_by_me, None);
}

#[tokio::test]
async fn test_list_questions_filters() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let answered = fx.question(&asker).await;
    fx.answer(&writer, &answered).await;
    fx.desk
        .ask_question(
            &asker,
            NewQuestion {
                title: "Placement aptitude round tips".into(),
                description: "Which topics show up most in the aptitude round for placements?".into(),
                category: "Placements".into(),
                tags: vec!["aptitude".into()],
            },
        )
        .await
        .unwrap();

    let all = fx.desk.list_questions(QuestionFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].title, "Placement aptitude round tips");

    let unanswered = fx
        .desk
        .list_questions(QuestionFilter {
            unanswered: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(unanswered.len(), 1);

    let by_text = fx
        .desk
        .list_questions(QuestionFilter {
            text: Some("PAGING".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_text.len(), 1);
    assert_eq!(by_text[0].id, answered.to_hex());
    assert!(by_text[0].author.is_some());
}

#[tokio::test]
async fn test_leaderboard_order() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let strong = fx.user("strong", true).await;
    let weak = fx.user("weak", true).await;
    let lurker = fx.user("lurker", false).await;
    let q = fx.question(&asker).await;
    let a = fx.answer(&strong, &q).await;
    fx.answer(&weak, &q).await;
    fx.desk.accept_answer(&asker, &q, &a).await.unwrap();

    let board = fx.desk.leaderboard().await.unwrap();
    let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["strong", "weak", "asker"]);
    assert_eq!(board[0].rank, 1);
    assert!(board.iter().all(|e| e.id != lurker.to_hex()));
}

#[tokio::test]
async fn test_follow_is_idempotent() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let fan = fx.user("fan", false).await;
    let q = fx.question(&asker).await;

    let first = fx.desk.follow_question(&fan, &q).await.unwrap();
    let again = fx.desk.follow_question(&fan, &q).await.unwrap();
    assert!(first.changed);
    assert!(!again.changed);
    assert_eq!(again.follower_count, 1);
    assert!(fx.desk.is_following(&fan, &q).await.unwrap());
    assert_eq!(fx.desk.followed_questions(&fan).await.unwrap().len(), 1);

    let notes = fx.desk.notifications(&asker).await.unwrap();
    assert_eq!(
        notes
            .iter()
            .filter(|n| n.kind == NotificationKind::NewFollower)
            .count(),
        1
    );

    let gone = fx.desk.unfollow_question(&fan, &q).await.unwrap();
    let gone_again = fx.desk.unfollow_question(&fan, &q).await.unwrap();
    assert!(gone.changed);
    assert!(!gone_again.changed);
    assert_eq!(fx.desk.follower_count(&q).await.unwrap(), 0);

    let err = fx
        .desk
        .follow_question(&fan, &ObjectId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));
}

#[tokio::test]
async fn test_notification_ownership() {
    let fx = Fixture::new();
    let asker = fx.user("asker", true).await;
    let writer = fx.user("writer", true).await;
    let q = fx.question(&asker).await;
    fx.answer(&writer, &q).await;

    let notes = fx.desk.notifications(&asker).await.unwrap();
    let id = ObjectId::parse_str(&notes[0].id).unwrap();
    assert_eq!(fx.desk.unread_notifications(&asker).await.unwrap(), 1);

    let err = fx.desk.mark_notification_read(&writer, &id).await.unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));
    let err = fx.desk.delete_notification(&writer, &id).await.unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));

    let read = fx.desk.mark_notification_read(&asker, &id).await.unwrap();
    assert!(read.read);
    assert_eq!(fx.desk.unread_notifications(&asker).await.unwrap(), 0);
    assert_eq!(fx.desk.mark_all_notifications_read(&asker).await.unwrap(), 0);

    fx.desk.delete_notification(&asker, &id).await.unwrap();
    assert!(fx.desk.notifications(&asker).await.unwrap().is_empty());
}
