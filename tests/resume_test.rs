//! Whole-database orchestration and resume tests.
//!
//! These drive `run_full` / `run_resume` over the in-memory store doubles,
//! covering catalog ordering, resume slicing, idempotent re-runs, and
//! abort-on-failure propagation.

use std::time::Duration;

use mongo_transfer::testing::{sequential_docs, MemoryConnector, RecordingSink};
use mongo_transfer::{run_full, run_resume, ResumePoint, TransferError, TransferEvent, TransferOpts};

fn fast_opts() -> TransferOpts {
    TransferOpts {
        retry_backoff: Duration::ZERO,
        batch_pause: Duration::ZERO,
        ..TransferOpts::default()
    }
}

#[tokio::test]
async fn full_run_processes_collections_in_catalog_order(
) -> Result<(), Box<dyn std::error::Error>> {
    let complete = sequential_docs(0, 300);
    let connector = MemoryConnector::new()
        .with_source_collection("A", complete.clone())
        .with_source_collection("B", sequential_docs(0, 700))
        .with_source_collection("C", sequential_docs(0, 50))
        .with_dest_collection("A", complete);
    let sink = RecordingSink::new();

    let summary = run_full(&connector, &fast_opts(), &sink).await?;

    let names: Vec<&str> = summary
        .collections
        .iter()
        .map(|c| c.collection.as_str())
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert!(summary.collections[0].skipped);
    assert_eq!(summary.documents, 750);
    assert_eq!(connector.dest_count("B"), 700);
    assert_eq!(connector.dest_count("C"), 50);
    assert!(sink.events().contains(&TransferEvent::RunCompleted {
        collections: 3,
        documents: 750,
    }));
    Ok(())
}

#[tokio::test]
async fn resume_starts_at_supplied_offset() -> Result<(), Box<dyn std::error::Error>> {
    let connector =
        MemoryConnector::new().with_source_collection("Trades", sequential_docs(0, 1200));
    let sink = RecordingSink::new();

    let resume = ResumePoint {
        collection: Some("Trades".to_string()),
        offset: 700,
    };
    let summary = run_resume(&connector, resume, &fast_opts(), &sink).await?;

    // Destination is empty, so the cursor starts at the explicit offset and
    // the remaining 500 documents arrive in one batch.
    assert_eq!(summary.collections[0].starting_offset, 700);
    assert_eq!(sink.batch_deltas("Trades"), vec![500]);
    assert_eq!(connector.dest_count("Trades"), 500);
    Ok(())
}

#[tokio::test]
async fn resume_prefers_destination_count_over_offset() -> Result<(), Box<dyn std::error::Error>> {
    let connector = MemoryConnector::new()
        .with_source_collection("Trades", sequential_docs(0, 1200))
        .with_dest_collection("Trades", sequential_docs(0, 900));
    let sink = RecordingSink::new();

    let resume = ResumePoint {
        collection: Some("Trades".to_string()),
        offset: 700,
    };
    let summary = run_resume(&connector, resume, &fast_opts(), &sink).await?;

    assert_eq!(summary.collections[0].starting_offset, 900);
    assert_eq!(connector.dest_count("Trades"), 1200);
    Ok(())
}

#[tokio::test]
async fn resume_completion_matches_full_transfer() -> Result<(), Box<dyn std::error::Error>> {
    // A fresh full run and a resumed run over a half-copied destination
    // converge on the same final count.
    let docs = sequential_docs(0, 1200);

    let full = MemoryConnector::new().with_source_collection("Trades", docs.clone());
    run_full(&full, &fast_opts(), &RecordingSink::new()).await?;

    let resumed = MemoryConnector::new()
        .with_source_collection("Trades", docs.clone())
        .with_dest_collection("Trades", docs[..700].to_vec());
    run_resume(
        &resumed,
        ResumePoint::default(),
        &fast_opts(),
        &RecordingSink::new(),
    )
    .await?;

    assert_eq!(full.dest_count("Trades"), 1200);
    assert_eq!(resumed.dest_count("Trades"), 1200);
    assert_eq!(
        full.dest_documents("Trades"),
        resumed.dest_documents("Trades")
    );
    Ok(())
}

#[tokio::test]
async fn resume_skips_collections_before_the_named_one() -> Result<(), Box<dyn std::error::Error>> {
    let connector = MemoryConnector::new()
        .with_source_collection("A", sequential_docs(0, 100))
        .with_source_collection("B", sequential_docs(0, 100))
        .with_source_collection("C", sequential_docs(0, 100));
    let sink = RecordingSink::new();

    let resume = ResumePoint {
        collection: Some("B".to_string()),
        offset: 0,
    };
    let summary = run_resume(&connector, resume, &fast_opts(), &sink).await?;

    let names: Vec<&str> = summary
        .collections
        .iter()
        .map(|c| c.collection.as_str())
        .collect();
    assert_eq!(names, vec!["B", "C"]);
    assert_eq!(connector.dest_count("A"), 0);
    assert_eq!(connector.dest_count("B"), 100);
    assert_eq!(connector.dest_count("C"), 100);
    Ok(())
}

#[tokio::test]
async fn unknown_resume_collection_falls_back_to_full_list(
) -> Result<(), Box<dyn std::error::Error>> {
    let connector = MemoryConnector::new()
        .with_source_collection("A", sequential_docs(0, 100))
        .with_source_collection("B", sequential_docs(0, 100));
    let sink = RecordingSink::new();

    let resume = ResumePoint {
        collection: Some("Nope".to_string()),
        offset: 50,
    };
    let summary = run_resume(&connector, resume, &fast_opts(), &sink).await?;

    assert!(sink
        .events()
        .contains(&TransferEvent::UnknownResumeCollection {
            collection: "Nope".to_string(),
        }));
    // The offset is discarded along with the unknown name.
    assert_eq!(summary.collections[0].starting_offset, 0);
    assert_eq!(connector.dest_count("A"), 100);
    assert_eq!(connector.dest_count("B"), 100);
    Ok(())
}

#[tokio::test]
async fn failed_collection_aborts_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let complete = sequential_docs(0, 50);
    let connector = MemoryConnector::new()
        .with_source_collection("A", complete.clone())
        .with_source_collection("B", sequential_docs(0, 200))
        .with_source_collection("C", sequential_docs(0, 200))
        .with_dest_collection("A", complete);
    // A is skipped without touching the source, so every scripted failure
    // lands on B.
    connector.fail_next_scans(10);
    let sink = RecordingSink::new();

    let err = run_full(&connector, &fast_opts(), &sink)
        .await
        .expect_err("B was scripted to fail");

    let transfer_err = err
        .downcast_ref::<TransferError>()
        .expect("orchestrator surfaces the typed transfer error");
    assert_eq!(transfer_err.collection(), "B");
    assert_eq!(transfer_err.offset(), 0);

    // C is never attempted.
    assert_eq!(connector.dest_count("C"), 0);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        TransferEvent::CollectionFailed { collection, .. } if collection == "B"
    )));
    assert!(!sink
        .events()
        .iter()
        .any(|event| matches!(event, TransferEvent::RunCompleted { .. })));
    Ok(())
}
