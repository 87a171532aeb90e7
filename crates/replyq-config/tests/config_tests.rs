// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Replyq configuration system.

use replyq_config::diagnostic::{ConfigError, suggest_key};
use replyq_config::model::{ReplyqConfig, StoreBackend};
use replyq_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_replyq_config() {
    let toml = r#"
[worker]
concurrency = 8
poll_interval_ms = 250
queue_name = "sms"
log_level = "debug"

[store]
backend = "memory"
connect_retries = 5
retry_delay_ms = 100

[database]
path = "/tmp/replyq-test.db"
wal_mode = false

[sms]
account_sid = "AC123"
auth_token = "secret"
default_from = "+15550000000"

[openai]
api_key = "sk-test"
model = "gpt-4o-mini"
timeout_secs = 10

[stats]
snapshot_interval_secs = 30
retention_days = 3
history_max_attempts = 2
history_retry_delay_ms = 50

[webhook]
bind_address = "0.0.0.0"
port = 8080
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(config.worker.poll_interval_ms, 250);
    assert_eq!(config.worker.queue_name, "sms");
    assert_eq!(config.worker.log_level, "debug");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.store.connect_retries, 5);
    assert_eq!(config.database.path, "/tmp/replyq-test.db");
    assert!(!config.database.wal_mode);
    assert_eq!(config.sms.account_sid.as_deref(), Some("AC123"));
    assert_eq!(config.sms.default_from.as_deref(), Some("+15550000000"));
    assert_eq!(config.openai.model, "gpt-4o-mini");
    assert_eq!(config.stats.retention_days, 3);
    assert_eq!(config.stats.history_retry_delay_ms, 50);
    assert_eq!(config.webhook.port, 8080);
}

/// Unknown field in [worker] section produces an error.
#[test]
fn unknown_field_in_worker_produces_error() {
    let toml = r#"
[worker]
concurency = 2
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("concurency"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing sections fall back to compiled defaults.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should deserialize");
    assert_eq!(config.worker.concurrency, 4);
    assert_eq!(config.worker.poll_interval_ms, 1000);
    assert_eq!(config.worker.queue_name, "default");
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.store.connect_retries, 3);
    assert_eq!(config.store.retry_delay_ms, 500);
    assert_eq!(config.openai.model, "gpt-4o");
    assert_eq!(config.stats.snapshot_interval_secs, 60);
    assert_eq!(config.stats.retention_days, 7);
    assert_eq!(config.stats.history_max_attempts, 3);
    assert_eq!(config.stats.history_retry_delay_ms, 1000);
    assert_eq!(config.webhook.port, 5000);
    assert!(!config.webhook.validate_signature);
}

/// A dotted override (what `REPLYQ_SMS_AUTH_TOKEN` maps to) lands on
/// `sms.auth_token`, not `sms.auth.token`.
#[test]
fn dotted_override_sets_underscored_key() {
    use figment::{Figment, providers::Serialized};

    let config: ReplyqConfig = Figment::new()
        .merge(Serialized::defaults(ReplyqConfig::default()))
        .merge(("sms.auth_token", "from-env"))
        .merge(("worker.poll_interval_ms", 50))
        .extract()
        .expect("should set keys via dot notation");

    assert_eq!(config.sms.auth_token.as_deref(), Some("from-env"));
    assert_eq!(config.worker.poll_interval_ms, 50);
}

/// Unknown top-level sections are rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[redis]
url = "redis://localhost"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn diagnostic_error_includes_unknown_key_and_suggestion() {
    let toml = r#"
[worker]
concurency = 2
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "concurency"
                && suggestion.as_deref() == Some("concurrency")
                && valid_keys.contains("poll_interval_ms")
        })
    });
    assert!(
        has_unknown_key,
        "should suggest 'concurrency' for 'concurency', got: {errors:?}"
    );
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[webhook]
port = "not_a_number"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("port"),
        "error should mention type mismatch, got: {err_str}"
    );
}

#[test]
fn unknown_key_points_into_its_section() {
    let toml = "[store]\nbackend = \"memory\"\n\n[worker]\nconcurency = 2\n";

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let (section, span) = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey { section, span, .. } => Some((section.clone(), *span)),
            _ => None,
        })
        .expect("unknown key error");
    assert_eq!(section, "[worker]");
    let span = span.expect("inline source should carry a span");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "concurency");
}

#[test]
fn invalid_type_names_dotted_key_and_span() {
    let toml = "[webhook]\nport = \"not_a_number\"\n";

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    let error = errors
        .iter()
        .find(|e| matches!(e, ConfigError::InvalidType { .. }))
        .expect("invalid type error");
    match error {
        ConfigError::InvalidType { key, span, .. } => {
            assert_eq!(key, "webhook.port");
            let span = (*span).expect("inline source should carry a span");
            assert_eq!(&toml[span.offset()..span.offset() + 4], "port");
        }
        _ => unreachable!(),
    }
}

#[test]
fn suggest_key_matches_store_fields() {
    let valid = ["backend", "path", "connect_retries", "retry_delay_ms"];
    assert_eq!(
        suggest_key("conect_retries", &valid).as_deref(),
        Some("connect_retries")
    );
    assert!(suggest_key("xyzzy", &valid).is_none());
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        section: "[worker]".to_string(),
        key: "concurency".to_string(),
        suggestion: Some("concurrency".to_string()),
        valid_keys: "concurrency, poll_interval_ms, queue_name, log_level".to_string(),
        origin: "replyq.toml".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `concurrency`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("concurency"));
}

#[test]
fn validation_errors_surface_through_load_and_validate_str() {
    let toml = r#"
[worker]
concurrency = 0

[stats]
retention_days = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2, "got: {errors:?}");
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn load_from_file_path() {
    let dir = std::env::temp_dir().join(format!("replyq-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("replyq.toml");
    std::fs::write(
        &path,
        "[worker]\nqueue_name = \"from-file\"\n\n[store]\nbackend = \"memory\"\n",
    )
    .unwrap();

    let config = load_and_validate_path(&path).expect("file config should validate");
    assert_eq!(config.worker.queue_name, "from-file");
    assert_eq!(config.store.backend, StoreBackend::Memory);

    std::fs::remove_dir_all(&dir).unwrap();
}
