//! Benchmark smoke test for the consolidate-and-interpret loop.

use std::time::Instant;

use timedrop_archive::consolidate;
use timedrop_contract::interpret_upload_response;
use timedrop_core::{StagedFile, UploadOutcome};

#[tokio::test]
async fn benchmark_consolidation_smoke_prints_latency() {
    let files: Vec<StagedFile> = (0..32_u8)
        .map(|index| {
            StagedFile::new(format!("file-{index:02}.bin"), vec![index; 64 * 1024])
                .expect("file should be valid")
        })
        .collect();

    let start = Instant::now();
    let mut archive_bytes = 0_u64;

    for _ in 0..20 {
        let archive = consolidate(files.clone(), Some("bench"))
            .await
            .expect("archive should build");
        archive_bytes += archive.size_bytes();

        let outcome = interpret_upload_response(200, r#"{"redirect_url":"/d/bench"}"#);
        assert!(matches!(outcome, UploadOutcome::Success { .. }));
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_consolidation_elapsed_ms={elapsed_ms}");
    println!("benchmark_archive_total_bytes={archive_bytes}");

    // This is a lightweight guardrail; strict NFR checks are environment-specific.
    assert!(
        elapsed_ms < 10_000,
        "consolidation smoke benchmark should stay bounded"
    );
}
