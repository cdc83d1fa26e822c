//! Custom test assertions for integration tests

use manifest_patch::{Event, Manifest, Operation};
use std::path::Path;
use tokio::sync::broadcast;

/// Drain every event currently buffered in a receiver
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Operation-level progress fractions for `operation`, in emission order
pub fn progress_fractions(events: &[Event], operation: Operation) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress {
                operation: op,
                report,
                ..
            } if *op == operation => Some(report.fraction),
            _ => None,
        })
        .collect()
}

/// Assert that a sequence of fractions never goes backwards
pub fn assert_non_decreasing(fractions: &[f64]) {
    for pair in fractions.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "progress went backwards: {} -> {} in {:?}",
            pair[0],
            pair[1],
            fractions
        );
    }
}

/// Assert that every entry of `manifest` is present under `root` with the expected content
pub fn assert_installed(root: &Path, files: &[(&str, &[u8])], manifest: &Manifest) {
    assert_eq!(files.len(), manifest.len());
    for (path, content) in files {
        let full = root.join(path);
        let written = std::fs::read(&full)
            .unwrap_or_else(|e| panic!("{} should be installed: {e}", full.display()));
        assert_eq!(&written, content, "content of {path}");
    }
}
