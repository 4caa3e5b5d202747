use inkframe::config::{Configuration, ShortImagePolicy};
use inkframe::palette::SPECTRA6;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
library-path: "/photos"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.library_path, PathBuf::from("/photos"));
    assert_eq!(cfg.keep_count, 5);
    assert_eq!(cfg.palette, SPECTRA6.to_vec());
    assert_eq!(cfg.short_image, ShortImagePolicy::Pad { color: [0, 0, 0] });
    assert_eq!(cfg.pointer_file(), PathBuf::from("/photos/.current_photo"));
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_full_config() {
    let yaml = r#"
library-path: "/photos"
pointer-file: "/var/lib/frame/current"
inbox-path: "/inbox"
preview-path: "/tmp/preview.png"
placeholder-path: "/usr/share/frame/hello.jpg"
keep-count: 12
jpeg-quality: 80
display-interval: 30m
check-interval: 5s
inbox-settle: 500ms
display-command: ["epd-show", "--full"]
palette:
  - [0, 0, 0]
  - [255, 255, 255]
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.keep_count, 12);
    assert_eq!(cfg.jpeg_quality, 80);
    assert_eq!(cfg.display_interval, Duration::from_secs(30 * 60));
    assert_eq!(cfg.check_interval, Duration::from_secs(5));
    assert_eq!(cfg.inbox_settle, Duration::from_millis(500));
    assert_eq!(cfg.pointer_file(), PathBuf::from("/var/lib/frame/current"));
    assert_eq!(cfg.quarantine_path(), Some(PathBuf::from("/inbox/.rejected")));
    assert_eq!(
        cfg.display_command,
        Some(vec!["epd-show".to_string(), "--full".to_string()])
    );
    assert_eq!(cfg.palette().unwrap().len(), 2);
}

#[test]
fn parse_short_image_policies() {
    let yaml = r#"
library-path: "/p"
short-image:
  policy: pad
  color: [255, 255, 255]
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        cfg.short_image,
        ShortImagePolicy::Pad {
            color: [255, 255, 255]
        }
    );

    let yaml = r#"
library-path: "/p"
short-image:
  policy: reject
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.short_image, ShortImagePolicy::Reject);
}

#[test]
fn unknown_policy_is_a_parse_error() {
    let yaml = r#"
library-path: "/p"
short-image:
  policy: stretch
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn missing_library_path_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("keep-count: 3\n").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn zero_keep_count_fails_validation() {
    let yaml = r#"
library-path: "/p"
keep-count: 0
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn empty_palette_fails_validation() {
    let yaml = r#"
library-path: "/p"
palette: []
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn jpeg_preview_fails_validation() {
    let yaml = r#"
library-path: "/p"
preview-path: "/tmp/preview.jpg"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn empty_display_command_fails_validation() {
    let yaml = r#"
library-path: "/p"
display-command: []
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn load_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "library-path: /photos\nkeep-count: 2\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.keep_count, 2);
    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}
