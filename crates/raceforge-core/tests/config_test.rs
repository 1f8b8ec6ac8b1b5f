use std::io::Write;

use raceforge_core::config::{load_from_path, Overrides};

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().expect("create temp config file");
	file.write_all(contents.as_bytes()).expect("write temp config file");
	file
}

const BASE: &str = r#"
metadata:
  name: login-race
  vulnerability: CWE-362
target:
  host: 127.0.0.1
  port: 9000
entrypoint:
  state: start
states:
  start:
    request: "GET /{{user}} HTTP/1.1\nHost: x\n\n"
    next: []
"#;

#[test]
fn loads_config_from_disk() {
	let file = write_temp(BASE);
	let config = load_from_path(file.path(), &Overrides { user: Some("alice".to_string()), ..Default::default() }).unwrap();
	assert_eq!(config.metadata.name, "login-race");
	assert_eq!(config.metadata.vulnerability, "CWE-362");
	assert_eq!(config.globals.get("user").unwrap().as_str_rendered(), "alice");
}

#[test]
fn cli_overrides_take_priority_over_file_target() {
	let file = write_temp(BASE.replace("{{user}}", "known"));
	let overrides = Overrides { host: Some("10.0.0.5".to_string()), port: Some(4444), ..Default::default() };
	let config = load_from_path(file.path(), &overrides).unwrap();
	assert_eq!(config.target.host, "10.0.0.5");
	assert_eq!(config.target.port, 4444);
}

#[test]
fn missing_file_is_a_config_error() {
	let missing = std::path::Path::new("/nonexistent/raceforge-config-does-not-exist.yaml");
	assert!(load_from_path(missing, &Overrides::default()).is_err());
}
