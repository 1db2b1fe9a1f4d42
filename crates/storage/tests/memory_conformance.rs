use apiprobe_storage::conformance::run_conformance_suite;

#[tokio::test]
async fn memory_platform_passes_conformance() {
    let report = run_conformance_suite(|fixtures| async move { fixtures.seed_memory() }).await;
    assert!(report.total > 0);
    assert_eq!(report.failed, 0, "{report}");
}
