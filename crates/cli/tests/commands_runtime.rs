use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use tertulia_cli::commands::{config, doctor, migrate};

const RESOURCES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("TERTULIA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().expect("message").contains("sqlite::memory:"));
    });
}

#[test]
fn migrate_returns_config_failure_for_unknown_backend() {
    with_env(&[("TERTULIA_STATE_BACKEND", "redis")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_rejects_non_sqlite_urls() {
    with_env(&[("TERTULIA_DATABASE_URL", "postgres://localhost/tertulia")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_with_bundled_certificates() {
    with_env(&[("TERTULIA_CERTIFICATES_DIRECTORY", RESOURCES)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");

        let checks = payload["checks"].as_array().expect("checks");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .expect("check present")
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("luis_configuration"), "skipped");
        assert_eq!(status_of("certificate_documents"), "pass");
        assert_eq!(status_of("state_store"), "skipped");
    });
}

#[test]
fn doctor_fails_when_certificates_are_missing() {
    with_env(&[("TERTULIA_CERTIFICATES_DIRECTORY", "/nonexistent/tertulia-certs")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] certificate_documents"));
    });
}

#[test]
fn doctor_checks_sqlite_state_store() {
    with_env(
        &[
            ("TERTULIA_STATE_BACKEND", "sqlite"),
            ("TERTULIA_DATABASE_URL", "sqlite::memory:"),
            ("TERTULIA_CERTIFICATES_DIRECTORY", RESOURCES),
        ],
        || {
            let result = doctor::run(true);
            let payload = parse_payload(&result.output);
            let state_store = payload["checks"]
                .as_array()
                .expect("checks")
                .iter()
                .find(|check| check["name"] == "state_store")
                .cloned()
                .expect("state store check");
            assert_eq!(state_store["status"], "pass");
        },
    );
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(
        &[
            ("TERTULIA_LUIS_APP_ID", "luis-app"),
            ("TERTULIA_LUIS_API_KEY", "luis-secret-value"),
            ("TERTULIA_LUIS_HOST_NAME", "westus.api.cognitive.microsoft.com"),
        ],
        || {
            let output = config::run();

            assert!(!output.contains("luis-secret-value"));
            assert!(output
                .contains("- luis.api_key = <redacted> (source: env (TERTULIA_LUIS_API_KEY))"));
            assert!(output.contains("- luis.app_id = luis-app (source: env (TERTULIA_LUIS_APP_ID))"));
            assert!(output.contains("- vision.api_key = <unset> (source: default)"));
            assert!(output.contains("- server.port = 3978 (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("TERTULIA_LUIS_APP_ID", "app-only")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed:"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TERTULIA_DATABASE_URL",
        "TERTULIA_DATABASE_MAX_CONNECTIONS",
        "TERTULIA_DATABASE_TIMEOUT_SECS",
        "TERTULIA_STATE_BACKEND",
        "TERTULIA_LUIS_APP_ID",
        "TERTULIA_LUIS_API_KEY",
        "TERTULIA_LUIS_HOST_NAME",
        "LuisAppId",
        "LuisAPIKey",
        "LuisAPIHostName",
        "TERTULIA_VISION_API_KEY",
        "TERTULIA_CERTIFICATES_DIRECTORY",
        "TERTULIA_SERVER_PORT",
        "TERTULIA_LOGGING_LEVEL",
        "TERTULIA_LOGGING_FORMAT",
        "TERTULIA_LOG_LEVEL",
        "TERTULIA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
