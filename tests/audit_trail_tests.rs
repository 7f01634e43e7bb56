use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

use draw_lab::audit::{AuditSink, FsAuditSink, IterationLogger, MemoryAuditSink};
use draw_lab::model::record::{PeriodRecord, PredictionRecord, VerificationRecord};

fn period_record(period_index: usize, predicted: &[u8]) -> PeriodRecord {
    let predicted: Vec<u8> = predicted.to_vec();
    let actual = vec![1, 2, 3, 4, 5];
    PeriodRecord {
        period_index,
        train_size: period_index - 1,
        target_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            + chrono::Duration::days(period_index as i64),
        groups: vec![],
        prediction: PredictionRecord {
            candidates: predicted.clone(),
            final_selection: predicted.clone(),
            selection_scores: BTreeMap::new(),
        },
        verification: VerificationRecord::evaluate(predicted, actual, vec![]),
        weight_decisions: vec![],
        fallbacks: vec![],
    }
}

#[test]
fn fs_sink_writes_one_file_per_period_plus_summary() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FsAuditSink::create(dir.path(), "session_a").unwrap();
    let session_dir = sink.session_dir().to_path_buf();
    let mut logger = IterationLogger::new(
        sink,
        "session_a".to_string(),
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    );

    logger.append(&period_record(31, &[1, 2, 9])).unwrap();
    logger.append(&period_record(32, &[6, 7, 8])).unwrap();
    logger
        .finalize(Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap())
        .unwrap();

    assert!(session_dir.join("period_031.json").exists());
    assert!(session_dir.join("period_032.json").exists());

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(session_dir.join("training_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["session_id"], "session_a");
    assert_eq!(summary["statistics"]["total_periods"], 2);
    assert!(!summary["finished_at"].is_null());
}

#[test]
fn fs_sink_refuses_to_overwrite_a_period() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FsAuditSink::create(dir.path(), "session_b").unwrap();

    sink.append_period(31, "{}").unwrap();
    let err = sink.append_period(31, "{}").unwrap_err();
    assert!(err.to_string().contains("already recorded"));
}

#[test]
fn summary_statistics_roll_forward_after_every_append() {
    let mut logger = IterationLogger::new(
        MemoryAuditSink::default(),
        "session_c".to_string(),
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    );

    // 2 hits of 5, then 5 of 5, then 0 of 5.
    logger.append(&period_record(31, &[1, 2, 9])).unwrap();
    logger.append(&period_record(32, &[1, 2, 3, 4, 5])).unwrap();
    logger.append(&period_record(33, &[30, 31, 32])).unwrap();

    let stats = logger.summary().statistics;
    assert_eq!(stats.total_periods, 3);
    assert_eq!(stats.total_hits, 7);
    assert!((stats.average_accuracy - (0.4 + 1.0 + 0.0) / 3.0).abs() < 1e-12);
    assert_eq!(stats.best_accuracy, 1.0);
    assert_eq!(stats.worst_accuracy, 0.0);

    // The sink's copy of the summary is rewritten on every append.
    let persisted: serde_json::Value =
        serde_json::from_str(logger.sink().summary.as_ref().unwrap()).unwrap();
    assert_eq!(persisted["statistics"]["total_hits"], 7);
    assert!(persisted["finished_at"].is_null());
}

#[test]
fn memory_sink_rejects_duplicate_periods() {
    let mut sink = MemoryAuditSink::default();
    sink.append_period(5, "{}").unwrap();
    assert!(sink.append_period(5, "{}").is_err());
    assert!(sink.append_period(6, "{}").is_ok());
}
