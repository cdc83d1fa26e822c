//! Remote mirror fixtures and test content generators

use manifest_patch::manifest::hash_bytes;
use manifest_patch::{Manifest, ManifestEntry};
use std::path::Path;

/// Game files of the first published release
pub const RELEASE_ONE: &[(&str, &[u8])] = &[
    ("Game.exe", b"game executable, release one"),
    ("data/textures.pak", b"texture pack contents that stay the same"),
    ("data/levels/level1.map", b"level one, first revision"),
];

/// Game files of the second published release
///
/// `Game.exe` and `level1.map` change, `textures.pak` stays, `level2.map` is new.
pub const RELEASE_TWO: &[(&str, &[u8])] = &[
    ("Game.exe", b"game executable, release two"),
    ("data/textures.pak", b"texture pack contents that stay the same"),
    ("data/levels/level1.map", b"level one, second revision!"),
    ("data/levels/level2.map", b"level two"),
];

/// Deterministic binary content of `len` bytes
pub fn generate_content(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Manifest describing `files`
pub fn manifest_for(files: &[(&str, &[u8])]) -> Manifest {
    files
        .iter()
        .map(|(path, content)| {
            ManifestEntry::new(path, &hash_bytes(content), content.len() as u64).unwrap()
        })
        .collect()
}

/// Write a module's files, manifest and checksum into a mirror tree
///
/// `module_dir` is the module directory relative to the mirror root, e.g. `game/Linux`.
pub fn publish_release(
    mirror: &Path,
    module_dir: &str,
    manifest_name: &str,
    files: &[(&str, &[u8])],
) -> Manifest {
    let module_root = mirror.join(module_dir);
    for (path, content) in files {
        let full = module_root.join("bin").join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    let manifest = manifest_for(files);
    let document = manifest.to_document();
    std::fs::write(module_root.join(format!("{manifest_name}.txt")), &document).unwrap();
    std::fs::write(
        module_root.join(format!("{manifest_name}.checksum")),
        hash_bytes(document.as_bytes()),
    )
    .unwrap();

    manifest
}

/// Publish a game release for the `Linux` target
pub fn publish_game(mirror: &Path, files: &[(&str, &[u8])]) -> Manifest {
    std::fs::create_dir_all(mirror.join("game/Linux")).unwrap();
    std::fs::write(mirror.join("game/Linux/.provides"), b"").unwrap();
    publish_release(mirror, "game/Linux", "GameManifest", files)
}
