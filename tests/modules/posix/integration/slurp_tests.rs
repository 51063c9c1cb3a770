//! Integration tests for the slurp module

use crate::modules::posix::{assert_success, SlurpTestBuilder, TestEnvironment};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;

#[tokio::test]
async fn test_slurp_reports_content_and_encoding() {
    let env = TestEnvironment::new();
    let path = env.create_test_file("motd", "line one\nline two\n");

    for builder in [SlurpTestBuilder::new().native(), SlurpTestBuilder::new().raw()] {
        let result = env
            .execute_module("slurp", builder.src(path.to_string_lossy()).build())
            .await;

        assert_success(&result);
        assert!(!result.changed);
        assert_eq!(result.results.get("content"), Some(&json!("line one\nline two\n")));
        assert_eq!(result.results.get("encoding"), Some(&json!("base64")));
        assert_eq!(
            result.results.get("encoded"),
            Some(&json!(STANDARD.encode("line one\nline two\n")))
        );
        assert_eq!(
            result.results.get("source"),
            Some(&json!(path.to_string_lossy()))
        );
    }
}

#[tokio::test]
async fn test_slurp_missing_file() {
    let env = TestEnvironment::new();
    let missing = env.temp_path("absent");

    for builder in [SlurpTestBuilder::new().native(), SlurpTestBuilder::new().raw()] {
        let result = env
            .execute_module("slurp", builder.src(missing.to_string_lossy()).build())
            .await;
        assert!(result.failed);
        assert_eq!(result.msg, Some(format!("file not found: {}", missing.display())));
    }
}

#[tokio::test]
async fn test_slurp_requires_src() {
    let env = TestEnvironment::new();
    let result = env
        .execute_module("slurp", SlurpTestBuilder::new().build())
        .await;
    assert!(result.failed);
    assert_eq!(result.msg.as_deref(), Some("missing required arguments: src"));
}
