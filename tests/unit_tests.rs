use std::time::Duration;

use mongo_transfer::{
    BatchWriteReport, ConnectOpts, DestOpts, EngineOpts, ResumePoint, SourceOpts, StoreError,
    TransferError, TransferOpts,
};

#[test]
fn test_transfer_opts_defaults() {
    let opts = TransferOpts::default();

    assert_eq!(opts.batch_size, 500);
    assert_eq!(opts.max_retries, 3);
    assert_eq!(opts.retry_backoff, Duration::from_secs(2));
    assert_eq!(opts.checkpoint_every, 2_000);
    assert_eq!(opts.fetch_max_time, Duration::from_secs(300));
}

#[test]
fn test_engine_opts_conversion() {
    let engine = EngineOpts {
        batch_size: 250,
        max_retries: 5,
        retry_backoff_secs: 7,
    };
    let opts = engine.to_transfer_opts();

    assert_eq!(opts.batch_size, 250);
    assert_eq!(opts.max_retries, 5);
    assert_eq!(opts.retry_backoff, Duration::from_secs(7));
    // Untouched knobs keep their defaults.
    assert_eq!(opts.checkpoint_every, 2_000);
}

#[test]
fn test_connect_opts_defaults() {
    let opts = ConnectOpts::new(
        "mongodb://src:27017",
        "StockMarket",
        "mongodb://dst:27017",
        "StockMarket",
    );

    assert_eq!(opts.server_selection_timeout, Duration::from_secs(30));
    assert_eq!(opts.connect_timeout, Duration::from_secs(30));
    assert_eq!(opts.max_pool_size, 10);
    assert!(opts.retry_writes);
}

#[test]
fn test_connect_opts_dest_database_fallback() {
    let source = SourceOpts {
        source_uri: "mongodb://src:27017".to_string(),
        source_database: "StockMarket".to_string(),
    };
    let dest = DestOpts {
        dest_uri: "mongodb://dst:27017".to_string(),
        dest_database: None,
    };
    let opts = ConnectOpts::from_cli(&source, &dest);

    assert_eq!(opts.dest_database, "StockMarket");

    let dest = DestOpts {
        dest_uri: "mongodb://dst:27017".to_string(),
        dest_database: Some("Mirror".to_string()),
    };
    let opts = ConnectOpts::from_cli(&source, &dest);

    assert_eq!(opts.dest_database, "Mirror");
}

#[test]
fn test_resume_point_default() {
    let resume = ResumePoint::default();

    assert_eq!(resume.collection, None);
    assert_eq!(resume.offset, 0);
}

#[test]
fn test_store_error_classification() {
    assert!(StoreError::Transient(anyhow::anyhow!("connection reset")).is_transient());
    assert!(!StoreError::Duplicate("_id 42".to_string()).is_transient());
    assert!(!StoreError::Write(anyhow::anyhow!("partial failure")).is_transient());
}

#[test]
fn test_transfer_error_carries_resume_point() {
    let err = TransferError::RetriesExhausted {
        collection: "Trades".to_string(),
        offset: 2500,
        attempts: 3,
        source: StoreError::Transient(anyhow::anyhow!("timed out")),
    };

    assert_eq!(err.collection(), "Trades");
    assert_eq!(err.offset(), 2500);
    let rendered = err.to_string();
    assert!(rendered.contains("Trades"));
    assert!(rendered.contains("2500"));
    assert!(rendered.contains("3 attempts"));
}

#[test]
fn test_batch_write_report_default() {
    let report = BatchWriteReport::default();

    assert_eq!(report.attempted, 0);
    assert_eq!(report.confirmed, 0);
    assert_eq!(report.conflicts, 0);
}
