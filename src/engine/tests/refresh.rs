use super::*;
use crate::manifest::hash_bytes;

#[tokio::test]
async fn test_missing_manifest_is_downloaded() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let published = publish(&engine, &provider, Module::Game, &[("a.bin", b"aaaa")]);

    let refreshed = engine
        .refresh_module_manifest(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert!(refreshed);
    let manifest = engine.manifests().get_manifest(Module::Game, false).await;
    assert_eq!(manifest, Some(published));
    assert!(engine.manifests().get_manifest(Module::Game, true).await.is_none());
}

#[tokio::test]
async fn test_matching_checksum_skips_download() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let published = publish(&engine, &provider, Module::Game, &[("a.bin", b"aaaa")]);
    install_local_manifest(&engine, Module::Game, &published, false).await;

    let refreshed = engine
        .refresh_module_manifest(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!refreshed);
    assert!(provider.downloads().is_empty());
}

#[tokio::test]
async fn test_checksum_with_line_endings_and_case_matches() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let published = publish(&engine, &provider, Module::Game, &[("a.bin", b"aaaa")]);
    install_local_manifest(&engine, Module::Game, &published, false).await;

    let checksum = hash_bytes(published.to_document().as_bytes()).to_uppercase();
    provider.insert(
        &engine.manifests().manifest_checksum_url(Module::Game),
        format!("{checksum}\r\n\0").as_bytes(),
    );

    let outdated = engine
        .is_manifest_outdated(Module::Game, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!outdated);
}

#[tokio::test]
async fn test_stale_manifest_is_rotated_into_previous_slot() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let old = publish(&engine, &provider, Module::Game, &[("a.bin", b"aaaa")]);
    install_local_manifest(&engine, Module::Game, &old, false).await;
    let new = publish(
        &engine,
        &provider,
        Module::Game,
        &[("a.bin", b"bbbb"), ("b.bin", b"cc")],
    );

    let refreshed = engine
        .refresh_module_manifest(Module::Game, &CancellationToken::new())
        .await
        .unwrap();

    assert!(refreshed);
    let store = engine.manifests();
    assert_eq!(store.get_manifest(Module::Game, false).await, Some(new));
    assert_eq!(store.get_manifest(Module::Game, true).await, Some(old));
    assert!(!store.manifest_local_path(Module::Game, false).with_extension("txt.part").exists());
}

#[tokio::test]
async fn test_second_refresh_replaces_stale_backup() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let first = publish(&engine, &provider, Module::Game, &[("a.bin", b"1")]);
    install_local_manifest(&engine, Module::Game, &first, false).await;

    let second = publish(&engine, &provider, Module::Game, &[("a.bin", b"2")]);
    let cancel = CancellationToken::new();
    assert!(engine.refresh_module_manifest(Module::Game, &cancel).await.unwrap());

    let third = publish(&engine, &provider, Module::Game, &[("a.bin", b"3")]);
    assert!(engine.refresh_module_manifest(Module::Game, &cancel).await.unwrap());

    let store = engine.manifests();
    assert_eq!(store.get_manifest(Module::Game, false).await, Some(third));
    assert_eq!(store.get_manifest(Module::Game, true).await, Some(second));
}

#[tokio::test]
async fn test_failed_download_leaves_no_current_manifest() {
    let (engine, provider, _temp_dir) = create_test_engine();
    let old = publish(&engine, &provider, Module::Game, &[("a.bin", b"aaaa")]);
    install_local_manifest(&engine, Module::Game, &old, false).await;

    // New checksum, but the manifest itself is unreachable
    provider.insert(
        &engine.manifests().manifest_checksum_url(Module::Game),
        b"ffffffffffffffffffffffffffffffff",
    );
    provider.fail_path(&engine.manifests().manifest_url(Module::Game));

    let result = engine
        .refresh_module_manifest(Module::Game, &CancellationToken::new())
        .await;

    assert!(result.is_err());
    let store = engine.manifests();
    assert!(!store.has_local_manifest(Module::Game).await);
    assert!(store.manifest_local_path(Module::Game, true).exists());

    // The moved-aside manifest is no longer served as current
    let outcome = engine
        .verify_module(Module::Game, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, PatchOutcome::Failed { processed: 0, .. }));
}

#[tokio::test]
async fn test_launcher_manifest_uses_launcher_paths() {
    let (engine, provider, _temp_dir) = create_test_engine();
    publish(&engine, &provider, Module::Launcher, &[("Launcher.exe", b"exe")]);

    engine
        .refresh_module_manifest(Module::Launcher, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(provider.downloads()[0].path, "launcher/LauncherManifest.txt");
    assert!(
        engine
            .config()
            .paths
            .launcher_dir
            .join("LauncherManifest.txt")
            .exists()
    );
}
