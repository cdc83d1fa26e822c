use super::*;
use crate::manifest::check_integrity;

const FILES: &[(&str, &[u8])] = &[
    ("a.bin", b"alpha contents"),
    ("b.bin", b"beta contents"),
    ("maps/c.map", b"gamma contents"),
];

async fn installed_engine() -> (
    ManifestPatchEngine,
    std::sync::Arc<FakeProvider>,
    tempfile::TempDir,
) {
    let (engine, provider, temp_dir) = create_test_engine();
    publish(&engine, &provider, Module::Game, FILES);
    assert!(
        engine
            .install_game(&CancellationToken::new())
            .await
            .unwrap()
            .is_success()
    );
    provider.clear_downloads();
    (engine, provider, temp_dir)
}

fn progress_fractions(events: &[Event], wanted: Operation) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress {
                operation, report, ..
            } if *operation == wanted => Some(report.fraction),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_verify_intact_module_downloads_nothing() {
    let (engine, provider, _temp_dir) = installed_engine().await;

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, PatchOutcome::Completed { processed: 3 });
    assert!(provider.downloads().is_empty());
}

#[tokio::test]
async fn test_verify_repairs_and_second_pass_is_idempotent() {
    let (engine, provider, _temp_dir) = installed_engine().await;
    let cancel = CancellationToken::new();
    write_local(&engine, Module::Game, "b.bin", b"beta CONTENTS");
    std::fs::remove_file(local_file(&engine, Module::Game, "maps/c.map")).unwrap();

    let outcome = engine.verify_module(Module::Game, &cancel).await.unwrap();

    assert_eq!(outcome, PatchOutcome::Completed { processed: 3 });
    assert_eq!(provider.file_downloads().len(), 2);
    assert_eq!(
        std::fs::read(local_file(&engine, Module::Game, "b.bin")).unwrap(),
        b"beta contents"
    );

    provider.clear_downloads();
    let again = engine.verify_module(Module::Game, &cancel).await.unwrap();
    assert!(again.is_success());
    assert!(provider.downloads().is_empty());
}

#[tokio::test]
async fn test_verify_reports_entries_that_stay_broken() {
    let (engine, provider, _temp_dir) = installed_engine().await;
    let mut rx = engine.subscribe();

    // The remote now serves bytes that no longer match the manifest
    provider.insert("game/Linux/bin/a.bin", b"tampered on the server");
    std::fs::remove_file(local_file(&engine, Module::Game, "a.bin")).unwrap();

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        PatchOutcome::Partial { processed, failed } => {
            assert_eq!(processed, 3);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].relative_path, "a.bin");
        }
        other => panic!("expected partial outcome, got {other:?}"),
    }

    // One attempt per configured retry
    assert_eq!(provider.file_downloads().len(), 2);

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        Event::EntryQueued { relative_path, .. } if relative_path == "a.bin"
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::EntryFailed { relative_path, .. } if relative_path == "a.bin"
    )));
}

#[tokio::test]
async fn test_verify_unreachable_file_does_not_stop_the_pass() {
    let (engine, provider, _temp_dir) = installed_engine().await;
    std::fs::remove_file(local_file(&engine, Module::Game, "a.bin")).unwrap();
    std::fs::remove_file(local_file(&engine, Module::Game, "b.bin")).unwrap();
    provider.fail_path("game/Linux/bin/a.bin");

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        PatchOutcome::Partial { failed, .. } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].relative_path, "a.bin");
        }
        other => panic!("expected partial outcome, got {other:?}"),
    }
    assert_eq!(
        std::fs::read(local_file(&engine, Module::Game, "b.bin")).unwrap(),
        b"beta contents"
    );
}

#[tokio::test]
async fn test_verify_progress_never_decreases() {
    let (engine, _provider, _temp_dir) = installed_engine().await;
    write_local(&engine, Module::Game, "a.bin", b"broken");
    write_local(&engine, Module::Game, "maps/c.map", b"also broken");
    let mut rx = engine.subscribe();

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.is_success());

    let fractions = progress_fractions(&drain_events(&mut rx), Operation::Verify);
    assert_eq!(fractions.len(), 3 + 2 + 1);
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.first().copied(), Some(0.0));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_verify_without_manifest_fails() {
    let (engine, _provider, _temp_dir) = create_test_engine();

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, PatchOutcome::Failed { processed: 0, .. }));
}

#[tokio::test]
async fn test_verify_uses_local_manifest_only() {
    let (engine, provider, _temp_dir) = installed_engine().await;
    provider.set_unreachable(true);

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_verify_with_nothing_installed_downloads_everything_in_order() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let manifest = publish(&engine, &provider, Module::Game, FILES);
    install_local_manifest(&engine, Module::Game, &manifest, false).await;
    let mut rx = engine.subscribe();

    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, PatchOutcome::Completed { processed: 3 });
    let paths: Vec<String> = provider.file_downloads().into_iter().map(|d| d.path).collect();
    assert_eq!(
        paths,
        vec![
            "game/Linux/bin/a.bin",
            "game/Linux/bin/b.bin",
            "game/Linux/bin/maps/c.map",
        ]
    );

    for entry in manifest.entries() {
        let path = local_file(&engine, Module::Game, entry.relative_path());
        assert!(check_integrity(&path, entry).await.unwrap().is_intact());
    }

    let fractions = progress_fractions(&drain_events(&mut rx), Operation::Verify);
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
}
