//! File discovery filters

use std::fs;
use std::path::Path;

use codelens::analyzer::{discover_files, DiscoveryOptions};
use codelens::Config;
use tempfile::TempDir;

fn touch(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn rel_paths(root: &Path, options: &DiscoveryOptions) -> Vec<String> {
    discover_files(root, options)
        .unwrap()
        .into_iter()
        .map(|f| f.rel_path)
        .collect()
}

#[test]
fn filters_by_extension_directory_and_pattern() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    touch(root, "app/main.py", b"print('hi')\n");
    touch(root, "app/util.rs", b"fn main() {}\n");
    touch(root, "app/README.md", b"# readme\n");
    touch(root, "node_modules/lib/index.py", b"x = 1\n");
    touch(root, "tests/fixtures/sample.py", b"y = 2\n");
    touch(root, "tests/test_main.py", b"def test(): pass\n");

    let options = DiscoveryOptions::new(
        &[".py".to_string(), "rs".to_string()],
        &["node_modules".to_string()],
        &["tests/fixtures/**".to_string()],
    )
    .unwrap();

    assert_eq!(
        rel_paths(root, &options),
        vec!["app/main.py", "app/util.rs", "tests/test_main.py"]
    );
}

#[test]
fn binary_files_are_skipped() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    touch(root, "text.py", b"a = 1\n");
    touch(root, "blob.py", b"a\0b\0c");

    let options = DiscoveryOptions::new(&["py".to_string()], &[], &[]).unwrap();
    assert_eq!(rel_paths(root, &options), vec!["text.py"]);
}

#[test]
fn extension_match_ignores_case() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "Upper.PY", b"a = 1\n");

    let options = DiscoveryOptions::new(&["py".to_string()], &[], &[]).unwrap();
    assert_eq!(rel_paths(temp.path(), &options), vec!["Upper.PY"]);
}

#[test]
fn report_directory_inside_input_is_skipped() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    touch(root, "main.py", b"a = 1\n");
    touch(root, "codelens-reports/main.py", b"stale copy\n");

    let mut config = Config::default();
    config.project_root = root.to_path_buf();
    let options = DiscoveryOptions::from_config(&config).unwrap();
    assert_eq!(rel_paths(root, &options), vec!["main.py"]);
}

#[test]
fn bad_glob_is_a_config_error() {
    let result = DiscoveryOptions::new(&["py".to_string()], &[], &["a/[".to_string()]);
    assert!(result.is_err());
}

#[test]
fn latin1_content_is_decoded() {
    let temp = TempDir::new().unwrap();
    // "café" in Latin-1
    touch(temp.path(), "legacy.py", b"name = 'caf\xe9'\n");

    let options = DiscoveryOptions::new(&["py".to_string()], &[], &[]).unwrap();
    let files = discover_files(temp.path(), &options).unwrap();
    let content = files[0].read_content().unwrap();
    assert_eq!(content.text, "name = 'café'\n");
    assert_eq!(content.encoding, "latin-1");
}

#[test]
fn missing_root_is_an_error() {
    let temp = TempDir::new().unwrap();
    let options = DiscoveryOptions::new(&["py".to_string()], &[], &[]).unwrap();
    assert!(discover_files(&temp.path().join("nope"), &options).is_err());
}
