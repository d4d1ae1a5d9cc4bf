//! Corpus ingestion integration tests
//!
//! Runs the pipeline end to end against a file-backed SQLite database.

mod helpers;

use helpers::{conllu_sentence, count_rows, create_test_db, create_test_pipeline, malformed_sentence, write_conllu};
use lexa_ingest::db::{ingestion_records, mappings, patterns, sentences};
use lexa_ingest::{CorpusOptions, IngestError, RunControl, RunStatus};
use std::sync::{Arc, Mutex};

fn options(path: std::path::PathBuf) -> CorpusOptions {
    CorpusOptions {
        path,
        language: "ru".to_string(),
        source_name: "ud_test".to_string(),
    }
}

#[tokio::test]
async fn test_reingest_is_all_skips() {
    let (dir, pool) = create_test_db().await.unwrap();
    let blocks: Vec<String> = (1..=7).map(|i| conllu_sentence(&format!("s{i}"))).collect();
    let path = write_conllu(dir.path(), "ru_test.conllu", &blocks);
    let pipeline = create_test_pipeline(pool.clone(), 3);

    let first = pipeline
        .ingest_corpus(&options(path.clone()), &RunControl::default())
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.records_created, 7);
    assert_eq!(first.records_processed, 7);

    let sentence_rows = count_rows(&pool, "sentences").await;
    let pattern_rows = count_rows(&pool, "patterns").await;

    let second = pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap();
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.records_created, 0);
    assert_eq!(second.records_skipped, first.records_created);

    assert_eq!(count_rows(&pool, "sentences").await, sentence_rows);
    assert_eq!(count_rows(&pool, "patterns").await, pattern_rows);
    assert_eq!(count_rows(&pool, "ingestion_records").await, 2);
}

#[tokio::test]
async fn test_shared_pattern_has_one_row_and_two_links() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_conllu(
        dir.path(),
        "two.conllu",
        &[conllu_sentence("a"), conllu_sentence("b")],
    );
    let pipeline = create_test_pipeline(pool.clone(), 500);

    pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap();

    let pattern = patterns::find_pattern(&pool, "ru", "noun_nom_sing_fem")
        .await
        .unwrap()
        .expect("pattern row");
    assert!((1..=10).contains(&pattern.difficulty));
    assert_eq!(pattern.features["Case"], "Nom");

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sentence_patterns WHERE pattern_id = ?")
        .bind(pattern.guid.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 2);

    let keys: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patterns WHERE pattern_type = 'noun_nom_sing_fem'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(keys, 1);
}

#[tokio::test]
async fn test_one_malformed_sentence_in_a_full_batch() {
    let (dir, pool) = create_test_db().await.unwrap();
    let blocks: Vec<String> = (1..=500)
        .map(|i| {
            let id = format!("s{i}");
            if i == 250 {
                malformed_sentence(&id)
            } else {
                conllu_sentence(&id)
            }
        })
        .collect();
    let path = write_conllu(dir.path(), "batch.conllu", &blocks);
    let pipeline = create_test_pipeline(pool.clone(), 500);

    let record = pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.records_failed, 1);
    assert_eq!(record.records_created, 499);
    assert_eq!(record.errors.len(), 1);
    assert!(record.errors[0].contains("s250"));
    assert_eq!(sentences::count_sentences(&pool).await.unwrap(), 499);
}

#[tokio::test]
async fn test_scores_stay_in_range() {
    let (dir, pool) = create_test_db().await.unwrap();
    let mut blocks: Vec<String> = (1..=5).map(|i| conllu_sentence(&format!("s{i}"))).collect();
    blocks.push(
        "# sent_id = long\n\
         1\tЕсли\tесли\tSCONJ\t_\t_\t3\tmark\t_\t_\n\
         2\tбы\tбы\tPART\t_\t_\t3\taux\t_\t_\n\
         3\tбыла\tбыть\tVERB\t_\tAspect=Imp|Gender=Fem|Mood=Cnd|Number=Sing|Tense=Past\t0\troot\t_\t_\n\
         4\tкнига\tкнига\tNOUN\t_\tCase=Nom|Gender=Fem|Number=Sing\t3\tnsubj\t_\t_\n\
         5\tбрата\tбрат\tNOUN\t_\tCase=Gen|Gender=Masc|Number=Sing\t4\tnmod\t_\t_\n\
         6\tсестре\tсестра\tNOUN\t_\tCase=Dat|Gender=Fem|Number=Sing\t3\tobl\t_\t_\n\
         7\tдомом\tдом\tNOUN\t_\tCase=Ins|Gender=Masc|Number=Sing\t3\tobl\t_\t_\n\
         8\tв\tв\tADP\t_\t_\t9\tcase\t_\t_\n\
         9\tгороде\tгород\tNOUN\t_\tCase=Loc|Gender=Masc|Number=Sing\t3\tobl\t_\t_\n\n"
            .to_string(),
    );
    let path = write_conllu(dir.path(), "mixed.conllu", &blocks);
    let pipeline = create_test_pipeline(pool.clone(), 2);

    pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap();

    let (min, max): (i64, i64) = sqlx::query_as("SELECT MIN(complexity_score), MAX(complexity_score) FROM sentences")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(min >= 1);
    assert!(max <= 10);
    assert!(max > min, "the long conditional sentence should score higher");
}

#[tokio::test]
async fn test_progress_reported_per_batch() {
    let (dir, pool) = create_test_db().await.unwrap();
    let blocks: Vec<String> = (1..=5).map(|i| conllu_sentence(&format!("s{i}"))).collect();
    let path = write_conllu(dir.path(), "progress.conllu", &blocks);
    let pipeline = create_test_pipeline(pool, 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let control = RunControl::default().with_progress(Arc::new(move |processed, total| {
        sink.lock().unwrap().push((processed, total));
    }));

    pipeline.ingest_corpus(&options(path), &control).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(2, Some(5)), (4, Some(5)), (5, Some(5))]
    );
}

#[tokio::test]
async fn test_cancelled_run_fails_with_distinct_reason() {
    let (dir, pool) = create_test_db().await.unwrap();
    let blocks: Vec<String> = (1..=4).map(|i| conllu_sentence(&format!("s{i}"))).collect();
    let path = write_conllu(dir.path(), "cancel.conllu", &blocks);
    let pipeline = create_test_pipeline(pool.clone(), 2);

    // Cancel from the progress hook: the first batch commits, the second never starts
    let control = RunControl::default();
    let token = control.cancel.clone();
    let control = control.with_progress(Arc::new(move |_, _| token.cancel()));

    let err = pipeline.ingest_corpus(&options(path), &control).await.unwrap_err();
    assert!(err.is_cancelled());

    let record = err.record().expect("failed runs carry their record");
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.records_created, 2);
    assert!(record.error_message.as_deref().unwrap().contains("Cancelled"));

    let stored = ingestion_records::load_record(&pool, record.guid).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.records_created, 2);
    assert_eq!(sentences::count_sentences(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_missing_file_fails_before_any_batch() {
    let (dir, pool) = create_test_db().await.unwrap();
    let pipeline = create_test_pipeline(pool.clone(), 500);

    let err = pipeline
        .ingest_corpus(&options(dir.path().join("absent.conllu")), &RunControl::default())
        .await
        .unwrap_err();

    assert!(matches!(err.cause(), IngestError::Resource(_)));
    let record = err.record().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.records_processed, 0);
    assert!(record.completed_at.is_some());

    let stored = ingestion_records::load_record(&pool, record.guid).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_undecodable_sentence_is_a_per_item_failure() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = dir.path().join("bad.conllu");

    let mut bytes = conllu_sentence("s1").into_bytes();
    bytes.extend_from_slice(b"# sent_id = s2\n1\t");
    bytes.extend_from_slice(b"\xff\xfe");
    bytes.extend_from_slice(b"\tx\tNOUN\t_\t_\t0\troot\t_\t_\n\n");
    bytes.extend_from_slice(conllu_sentence("s3").as_bytes());
    std::fs::write(&path, bytes).unwrap();

    let pipeline = create_test_pipeline(pool.clone(), 500);
    let record = pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.records_created, 2);
    assert_eq!(record.records_failed, 1);
    assert!(record.errors[0].contains("s2"));
    assert!(record.errors[0].contains("UTF-8"));
    assert_eq!(sentences::count_sentences(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_storage_error_rolls_back_only_the_failing_batch() {
    let (dir, pool) = create_test_db().await.unwrap();
    let blocks: Vec<String> = (1..=4).map(|i| conllu_sentence(&format!("s{i}"))).collect();
    let path = write_conllu(dir.path(), "rollback.conllu", &blocks);

    // s3 is in the second batch; its mapping insert aborts the transaction
    sqlx::query(
        "CREATE TRIGGER reject_s3 BEFORE INSERT ON external_id_mappings \
         WHEN NEW.external_id = 's3' BEGIN SELECT RAISE(ABORT, 'mapping rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let pipeline = create_test_pipeline(pool.clone(), 2);
    let err = pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap_err();

    assert!(matches!(err.cause(), IngestError::Persistence(_)));
    let record = err.record().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.records_created, 2);
    assert!(record.error_message.as_deref().unwrap().contains("mapping rejected"));

    // First batch stays, nothing of the second is left behind
    assert_eq!(sentences::count_sentences(&pool).await.unwrap(), 2);
    assert_eq!(mappings::count_mappings(&pool, "ud_test").await.unwrap(), 2);

    let stored = ingestion_records::load_record(&pool, record.guid).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.records_created, 2);
}

#[tokio::test]
async fn test_unsaved_completion_fails_the_run() {
    let (dir, pool) = create_test_db().await.unwrap();
    let path = write_conllu(dir.path(), "one.conllu", &[conllu_sentence("s1")]);

    sqlx::query(
        "CREATE TRIGGER reject_completion BEFORE UPDATE ON ingestion_records \
         WHEN NEW.status = 'completed' BEGIN SELECT RAISE(ABORT, 'record store rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let pipeline = create_test_pipeline(pool.clone(), 500);
    let err = pipeline
        .ingest_corpus(&options(path), &RunControl::default())
        .await
        .unwrap_err();

    assert!(matches!(err.cause(), IngestError::Persistence(_)));
    let record = err.record().expect("failed runs carry their record");
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.records_created, 1);

    let stored = ingestion_records::load_record(&pool, record.guid).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
}
