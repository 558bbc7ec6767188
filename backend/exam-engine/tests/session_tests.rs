use uuid::Uuid;

use linguaground_engine::models::{
    CefrLevel, QuestionType, SessionStatus, Skill, SubmitAnswerRequest,
};
use linguaground_engine::ExamError;

mod common;

use common::{
    create_test_app, fill_in_question, force_deadline_past, multiple_choice_question,
    open_question, seed_question,
};

#[tokio::test]
async fn start_draws_up_to_the_configured_question_count() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    for i in 0..12 {
        seed_question(
            &app,
            multiple_choice_question(
                Skill::Reading,
                CefrLevel::A1,
                &format!("Question {i}"),
                "right",
                &["wrong"],
            ),
        )
        .await;
    }

    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();

    assert!(!started.resumed);
    assert_eq!(started.session.status, SessionStatus::InProgress);
    assert_eq!(started.questions.len(), 10);
    assert_eq!(started.session.question_ids.len(), 10);

    // The question set only contains matching catalog questions
    for view in &started.questions {
        assert_eq!(view.skill, Skill::Reading);
        assert_eq!(view.difficulty, CefrLevel::A1);
    }
}

#[tokio::test]
async fn starting_again_resumes_the_same_session_and_question_set() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    for i in 0..10 {
        seed_question(
            &app,
            multiple_choice_question(
                Skill::Listening,
                CefrLevel::B1,
                &format!("Question {i}"),
                "right",
                &["wrong"],
            ),
        )
        .await;
    }

    let first = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Listening, CefrLevel::B1)
        .await
        .unwrap();
    let second = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Listening, CefrLevel::B1)
        .await
        .unwrap();

    assert!(second.resumed);
    assert_eq!(first.session.id, second.session.id);
    assert_eq!(first.session.question_ids, second.session.question_ids);
    let first_ids: Vec<Uuid> = first.questions.iter().map(|q| q.id).collect();
    let second_ids: Vec<Uuid> = second.questions.iter().map(|q| q.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn resume_returns_the_live_session_even_for_another_skill() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    seed_question(
        &app,
        multiple_choice_question(Skill::Reading, CefrLevel::A2, "Pick one", "right", &["wrong"]),
    )
    .await;

    let reading = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A2)
        .await
        .unwrap();

    // One active session per student: the live reading session comes back
    let resumed = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Writing, CefrLevel::A2)
        .await
        .unwrap();

    assert!(resumed.resumed);
    assert_eq!(resumed.session.id, reading.session.id);
    assert_eq!(resumed.session.skill, Skill::Reading);
}

#[tokio::test]
async fn expired_active_session_is_replaced_by_a_new_one() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    seed_question(
        &app,
        multiple_choice_question(Skill::Reading, CefrLevel::A1, "Pick one", "right", &["wrong"]),
    )
    .await;

    let first = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();
    force_deadline_past(&app, first.session.id).await;

    let second = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();

    assert!(!second.resumed);
    assert_ne!(first.session.id, second.session.id);

    let old = app
        .engine
        .sessions
        .session_detail(first.session.id)
        .await
        .unwrap();
    assert_eq!(old.status, SessionStatus::Expired);
}

#[tokio::test]
async fn completed_skill_is_rejected_until_the_cycle_resets() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    seed_question(
        &app,
        open_question(QuestionType::Writing, Skill::Writing, CefrLevel::B1, "Essay", None),
    )
    .await;

    app.engine
        .levels
        .record_skill_result(student, Skill::Writing, CefrLevel::B1)
        .await
        .unwrap();

    let err = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Writing, CefrLevel::B1)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::SkillAlreadyCompleted(Skill::Writing)));
}

#[tokio::test]
async fn full_cycle_resets_skills_but_keeps_overall_level() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    seed_question(
        &app,
        open_question(QuestionType::Writing, Skill::Writing, CefrLevel::B2, "Essay", None),
    )
    .await;

    for skill in Skill::ALL {
        app.engine
            .levels
            .record_skill_result(student, skill, CefrLevel::B2)
            .await
            .unwrap();
    }

    // All four complete: the next attempt succeeds and restarts the cycle
    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Writing, CefrLevel::B2)
        .await
        .unwrap();
    assert!(!started.resumed);

    let record = app.engine.sessions.level_record(student).await.unwrap();
    assert_eq!(record.reading, None);
    assert_eq!(record.writing, None);
    assert_eq!(record.listening, None);
    assert_eq!(record.speaking, None);
    assert_eq!(record.overall, CefrLevel::B2);
}

#[tokio::test]
async fn resubmitting_an_answer_overwrites_instead_of_duplicating() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    let question = seed_question(
        &app,
        fill_in_question(Skill::Writing, CefrLevel::A1, "Capital of France?", "Paris"),
    )
    .await;

    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Writing, CefrLevel::A1)
        .await
        .unwrap();

    app.engine
        .sessions
        .submit_answer(
            started.session.id,
            question.id,
            SubmitAnswerRequest {
                text_response: Some("London".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    app.engine
        .sessions
        .submit_answer(
            started.session.id,
            question.id,
            SubmitAnswerRequest {
                text_response: Some("Paris".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    use linguaground_engine::stores::AnswerStore;
    let rows = app.answers.by_session(started.session.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content.as_deref(), Some("Paris"));

    // The overwriting submission is the one that gets graded
    let finalized = app
        .engine
        .scoring
        .finalize(started.session.id, None)
        .await
        .unwrap();
    assert_eq!(finalized.overall_score, 100.0);
}

#[tokio::test]
async fn submitting_after_the_deadline_expires_the_session() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    let question = seed_question(
        &app,
        multiple_choice_question(Skill::Reading, CefrLevel::A1, "Pick one", "right", &["wrong"]),
    )
    .await;

    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();
    force_deadline_past(&app, started.session.id).await;

    let err = app
        .engine
        .sessions
        .submit_answer(
            started.session.id,
            question.id,
            SubmitAnswerRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::SessionExpired(_)));

    // The transition stuck: a further write now fails as not-active
    let err = app
        .engine
        .sessions
        .submit_answer(
            started.session.id,
            question.id,
            SubmitAnswerRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::SessionNotActive(_)));
}

#[tokio::test]
async fn unknown_session_and_question_are_distinct_errors() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    let err = app
        .engine
        .sessions
        .submit_answer(Uuid::new_v4(), Uuid::new_v4(), SubmitAnswerRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::SessionNotFound(_)));

    seed_question(
        &app,
        multiple_choice_question(Skill::Reading, CefrLevel::A1, "Pick one", "right", &["wrong"]),
    )
    .await;
    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();

    let err = app
        .engine
        .sessions
        .submit_answer(started.session.id, Uuid::new_v4(), SubmitAnswerRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::QuestionNotFound(_)));
}

#[tokio::test]
async fn register_listen_counts_replays() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    let question = seed_question(
        &app,
        multiple_choice_question(Skill::Listening, CefrLevel::A2, "What did you hear?", "rain", &["snow"]),
    )
    .await;

    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Listening, CefrLevel::A2)
        .await
        .unwrap();

    let first = app
        .engine
        .sessions
        .register_listen(started.session.id, question.id)
        .await
        .unwrap();
    let second = app
        .engine
        .sessions
        .register_listen(started.session.id, question.id)
        .await
        .unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 2);

    // The replay counter survives the actual answer submission
    app.engine
        .sessions
        .submit_answer(
            started.session.id,
            question.id,
            SubmitAnswerRequest {
                selected_option_id: Some(question.correct_option().unwrap().id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let third = app
        .engine
        .sessions
        .register_listen(started.session.id, question.id)
        .await
        .unwrap();
    assert_eq!(third, 3);
}

#[tokio::test]
async fn abandoned_sessions_reject_further_writes() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    let question = seed_question(
        &app,
        multiple_choice_question(Skill::Reading, CefrLevel::A1, "Pick one", "right", &["wrong"]),
    )
    .await;

    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();

    let abandoned = app.engine.sessions.abandon(started.session.id).await.unwrap();
    assert_eq!(abandoned.status, SessionStatus::Abandoned);

    let err = app
        .engine
        .sessions
        .submit_answer(
            started.session.id,
            question.id,
            SubmitAnswerRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::SessionNotActive(_)));

    // Terminal state also blocks finalize
    let err = app
        .engine
        .scoring
        .finalize(started.session.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamError::SessionNotActive(_)));
}

#[tokio::test]
async fn history_reports_expiry_on_next_access() {
    let app = create_test_app();
    let student = Uuid::new_v4();

    seed_question(
        &app,
        multiple_choice_question(Skill::Reading, CefrLevel::A1, "Pick one", "right", &["wrong"]),
    )
    .await;

    let started = app
        .engine
        .sessions
        .start_or_resume(student, Skill::Reading, CefrLevel::A1)
        .await
        .unwrap();
    force_deadline_past(&app, started.session.id).await;

    let history = app.engine.sessions.session_history(student).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SessionStatus::Expired);
}
