//! Integration tests for the command module

use crate::modules::posix::helpers::environment::{FAKE_RUNTIME, MISSING_RUNTIME};
use crate::modules::posix::{
    assert_changed, assert_failed_with, assert_success, CommandTestBuilder, TestEnvironment,
};
use serde_json::json;
use std::collections::HashMap;

#[tokio::test]
async fn test_argv_runs_without_shell() {
    let env = TestEnvironment::new();

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder.argv(&["printf", "%s|", "a b", "$HOME"]).build();
        let result = env.execute_module("command", args).await;

        assert_changed(&result);
        assert_eq!(result.rc, Some(0));
        assert_eq!(result.stdout.as_deref(), Some("a b|$HOME|"));
        assert_eq!(result.results.get("cmd"), Some(&json!(["printf", "%s|", "a b", "$HOME"])));
        assert!(result.results.contains_key("delta"));
    }
}

#[tokio::test]
async fn test_shell_command_pipes() {
    let env = TestEnvironment::new();

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder.cmd("printf 'b\\na\\n' | sort").shell().build();
        let result = env.execute_module("command", args).await;

        assert_changed(&result);
        assert_eq!(result.stdout_lines, vec!["a", "b"]);
        assert_eq!(result.results.get("cmd"), Some(&json!("printf 'b\\na\\n' | sort")));
    }
}

#[tokio::test]
async fn test_chdir_and_stdin() {
    let env = TestEnvironment::new();
    let dir = env.create_test_directory("work dir");

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder.argv(&["pwd"]).chdir(dir.to_string_lossy()).build();
        let result = env.execute_module("command", args).await;
        assert_success(&result);
        let pwd = std::fs::canonicalize(result.stdout.unwrap().trim()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(&dir).unwrap());
    }

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder.argv(&["cat"]).stdin("from stdin").build();
        let result = env.execute_module("command", args).await;
        assert_eq!(result.stdout.as_deref(), Some("from stdin"));
    }
}

#[tokio::test]
async fn test_missing_chdir_fails_before_running() {
    let env = TestEnvironment::new();
    let missing = env.temp_path("nowhere");
    let marker = env.temp_path("ran");

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder
            .argv(&["touch", marker.to_str().unwrap()])
            .chdir(missing.to_string_lossy())
            .build();
        let result = env.execute_module("command", args).await;

        assert_failed_with(
            &result,
            &format!(
                "Unable to change directory before execution: {}",
                missing.display()
            ),
        );
        assert!(!result.changed);
        assert!(!marker.exists());
    }
}

#[tokio::test]
async fn test_creates_and_removes_gate_execution() {
    let env = TestEnvironment::new();
    let existing = env.create_test_file("exists", "");
    let missing = env.temp_path("missing");

    let args = CommandTestBuilder::new()
        .raw()
        .argv(&["false"])
        .creates(existing.to_string_lossy())
        .build();
    let result = env.execute_module("command", args).await;
    assert_success(&result);
    assert!(!result.changed);
    assert_eq!(result.rc, Some(0));
    assert_eq!(
        result.msg,
        Some(format!("Did not run command since '{}' exists", existing.display()))
    );

    let args = CommandTestBuilder::new()
        .native()
        .argv(&["false"])
        .removes(missing.to_string_lossy())
        .build();
    let result = env.execute_module("command", args).await;
    assert_success(&result);
    assert_eq!(
        result.msg,
        Some(format!(
            "Did not run command since '{}' does not exist",
            missing.display()
        ))
    );
}

#[tokio::test]
async fn test_non_zero_exit_is_failure() {
    let env = TestEnvironment::new();

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder.cmd("echo oops >&2; exit 3").shell().build();
        let result = env.execute_module("command", args).await;

        assert_failed_with(&result, "non-zero return code");
        assert!(result.changed);
        assert_eq!(result.rc, Some(3));
        assert_eq!(result.stderr_lines, vec!["oops"]);
    }
}

#[tokio::test]
async fn test_missing_program_reports_127() {
    let env = TestEnvironment::new();

    let args = CommandTestBuilder::new()
        .raw()
        .argv(&["rustle-no-such-program"])
        .build();
    let result = env.execute_module("command", args).await;
    assert!(result.failed);
    assert_eq!(result.rc, Some(127));

    let args = CommandTestBuilder::new()
        .native()
        .argv(&["rustle-no-such-program"])
        .build();
    let result = env.execute_module("command", args).await;
    assert!(result.failed);
    assert_eq!(result.rc, Some(127));
}

#[tokio::test]
async fn test_raw_expansion_mismatch_fails() {
    let env = TestEnvironment::new();

    let args = CommandTestBuilder::new()
        .raw()
        .argv(&["echo", "$HOME"])
        .expand_argument_vars(true)
        .build();
    let result = env.execute_module("command", args).await;

    assert!(result.failed);
    assert!(result.raw);
    assert!(!result.changed);
    assert!(result
        .msg
        .unwrap()
        .starts_with("Raw fallback requires expand_argument_vars and _uses_shell"));
}

#[tokio::test]
async fn test_native_expansion_with_context_env() {
    let env = TestEnvironment::new();
    let context = env
        .context()
        .clone()
        .with_environment(HashMap::from([("DEPLOY_TARGET".to_string(), "blue".to_string())]));

    let args = CommandTestBuilder::new()
        .native()
        .argv(&["echo", "$DEPLOY_TARGET", "${DEPLOY_TARGET}-2"])
        .expand_argument_vars(true)
        .build();
    let result = env
        .execute_module_with_context("command", args, &context)
        .await;
    assert_eq!(result.stdout.as_deref(), Some("blue blue-2\n"));
}

#[tokio::test]
async fn test_probe_selects_mode() {
    let env = TestEnvironment::with_runtime(MISSING_RUNTIME);
    let result = env
        .execute_module("command", CommandTestBuilder::new().argv(&["true"]).build())
        .await;
    assert_success(&result);
    assert!(result.raw);

    let env = TestEnvironment::with_runtime(FAKE_RUNTIME);
    let result = env
        .execute_module("command", CommandTestBuilder::new().argv(&["true"]).build())
        .await;
    assert_success(&result);
    assert!(!result.raw);
}

#[tokio::test]
async fn test_validation_errors_become_failed_results() {
    let env = TestEnvironment::new();

    let args = CommandTestBuilder::new()
        .raw()
        .argv(&["ls"])
        .cmd("ls")
        .build();
    let result = env.execute_module("command", args).await;
    assert_failed_with(&result, "Only one of 'cmd' or 'argv' can be specified");
    assert!(result.raw);

    let result = env
        .execute_module("command", CommandTestBuilder::new().build())
        .await;
    assert_failed_with(&result, "One of 'cmd' or 'argv' is required");
    assert!(!result.raw);
    assert!(result.stdout_lines.is_empty());
}
