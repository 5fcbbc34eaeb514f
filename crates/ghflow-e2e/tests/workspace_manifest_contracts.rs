use std::fs;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|path| path.parent())
        .expect("crates/ghflow-e2e should have a workspace root parent")
        .to_path_buf()
}

fn crate_dirs() -> Vec<(String, PathBuf)> {
    let crates_dir = repo_root().join("crates");
    let mut crates = Vec::new();
    for entry in fs::read_dir(&crates_dir).expect("read crates directory") {
        let path = entry.expect("read crate entry").path();
        if !path.is_dir() || !path.join("Cargo.toml").exists() {
            continue;
        }

        let crate_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .expect("crate directory name must be valid UTF-8")
            .to_owned();
        crates.push((crate_name, path));
    }
    crates
}

#[test]
fn workspace_manifest_lists_every_crate() {
    let workspace_manifest =
        fs::read_to_string(repo_root().join("Cargo.toml")).expect("read workspace Cargo.toml");

    for (crate_name, _) in crate_dirs() {
        let expected_member = format!("\"crates/{crate_name}\"");
        assert!(
            workspace_manifest.contains(&expected_member),
            "workspace manifest is missing member {expected_member}",
        );
    }
}

#[test]
fn crate_manifests_inherit_workspace_package_metadata() {
    for (crate_name, path) in crate_dirs() {
        let manifest_path = path.join("Cargo.toml");
        let manifest = fs::read_to_string(&manifest_path)
            .unwrap_or_else(|_| panic!("read {}", manifest_path.display()));

        assert!(
            manifest.contains(&format!("name = \"{crate_name}\"")),
            "{} should declare package name {crate_name}",
            manifest_path.display(),
        );
        assert!(
            manifest.contains("version.workspace = true"),
            "{} should inherit the workspace version",
            manifest_path.display(),
        );
    }
}
