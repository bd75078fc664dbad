//! Unit tests for TOML atomic write utilities
//!
//! - Atomic write (temp file + rename, no leftover temp file)
//! - Written file reloads to an equal config
//! - Permissions 0600 on Unix, since the file may carry the API key

use spz_common::config::{load_toml_config, write_toml_config, OpenAiConfig, TomlConfig};
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_config() -> TomlConfig {
    TomlConfig {
        root_folder: Some(PathBuf::from("/srv/spz")),
        openai: OpenAiConfig {
            api_key: Some("sk-key123".to_string()),
            ..OpenAiConfig::default()
        },
        ..TomlConfig::default()
    }
}

#[test]
fn test_atomic_write_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("spz-planner.toml");

    write_toml_config(&sample_config(), &target).unwrap();

    assert!(target.exists());
    assert!(!temp_dir.path().join("spz-planner.toml.tmp").exists());
}

#[test]
fn test_written_config_reloads_equal() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("spz-planner.toml");
    let config = sample_config();

    write_toml_config(&config, &target).unwrap();
    let reloaded = load_toml_config(&target).unwrap();

    assert_eq!(reloaded, config);
}

#[test]
fn test_write_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("nested").join("spz").join("spz-planner.toml");

    write_toml_config(&sample_config(), &target).unwrap();
    assert!(target.exists());
}

#[test]
fn test_overwrite_replaces_previous_content() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("spz-planner.toml");

    write_toml_config(&sample_config(), &target).unwrap();

    let mut updated = sample_config();
    updated.openai.api_key = Some("sk-rotated".to_string());
    write_toml_config(&updated, &target).unwrap();

    let content = std::fs::read_to_string(&target).unwrap();
    assert!(content.contains("sk-rotated"));
    assert!(!content.contains("sk-key123"));
}

#[cfg(unix)]
#[test]
fn test_written_file_has_0600_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("spz-planner.toml");
    write_toml_config(&sample_config(), &target).unwrap();

    let mode = std::fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
