//! Check mode never mutates the target

use crate::modules::posix::{
    assert_file_content, assert_file_not_exists, CommandTestBuilder, LineInFileTestBuilder,
    TestEnvironment,
};

#[tokio::test]
async fn test_command_is_skipped() {
    let env = TestEnvironment::new();
    let marker = env.temp_path("marker");

    for builder in [CommandTestBuilder::new().native(), CommandTestBuilder::new().raw()] {
        let args = builder.argv(&["touch", marker.to_str().unwrap()]).build();
        let result = env
            .execute_module_with_context("command", args, &env.check_context())
            .await;

        assert!(!result.failed);
        assert!(result.skipped);
        assert!(!result.changed);
        assert_eq!(result.rc, Some(0));
        assert_eq!(
            result.msg.as_deref(),
            Some("Command would have run if not in check mode")
        );
        assert_file_not_exists(&marker);
    }
}

#[tokio::test]
async fn test_gated_command_predicts_change() {
    let env = TestEnvironment::new();
    let missing = env.temp_path("not-yet");

    let args = CommandTestBuilder::new()
        .raw()
        .argv(&["touch", missing.to_str().unwrap()])
        .creates(missing.to_string_lossy())
        .build();
    let result = env
        .execute_module_with_context("command", args, &env.check_context())
        .await;

    assert!(result.changed);
    assert!(!result.skipped);
    assert_file_not_exists(&missing);

    let existing = env.create_test_file("present", "");
    let args = CommandTestBuilder::new()
        .native()
        .argv(&["true"])
        .creates(existing.to_string_lossy())
        .build();
    let result = env
        .execute_module_with_context("command", args, &env.check_context())
        .await;
    assert!(!result.changed);
    assert_eq!(
        result.msg,
        Some(format!(
            "Would not run command since '{}' exists",
            existing.display()
        ))
    );
}

#[tokio::test]
async fn test_lineinfile_predicts_without_writing() {
    for builder in [LineInFileTestBuilder::new().native(), LineInFileTestBuilder::new().raw()] {
        let env = TestEnvironment::new();
        let path = env.create_test_file("conf", "a=1\n");
        let created = env.temp_path("sub/new.conf");

        let result = env
            .execute_module_with_context(
                "lineinfile_dedupe",
                builder.path(path.to_string_lossy()).line("b=2").backup().build(),
                &env.check_context().with_diff_mode(true),
            )
            .await;
        assert!(result.changed);
        assert_eq!(
            result.msg.as_deref(),
            Some("Check mode: changes would have been made.")
        );
        assert_eq!(
            result.diff.as_ref().and_then(|d| d.after.as_deref()),
            Some("a=1\nb=2\n")
        );
        assert_file_content(&path, "a=1\n");
        assert_eq!(env.entries(), vec!["conf"]);

        let result = env
            .execute_module_with_context(
                "lineinfile_dedupe",
                LineInFileTestBuilder::new()
                    .raw()
                    .path(created.to_string_lossy())
                    .line("x")
                    .create()
                    .build(),
                &env.check_context(),
            )
            .await;
        assert!(result.changed);
        assert!(!env.temp_path("sub").exists());

        let result = env
            .execute_module_with_context(
                "lineinfile_dedupe",
                LineInFileTestBuilder::new()
                    .raw()
                    .path(path.to_string_lossy())
                    .line("a=1")
                    .build(),
                &env.check_context(),
            )
            .await;
        assert!(!result.changed);
        assert_eq!(result.msg.as_deref(), Some("Check mode: no changes needed."));
    }
}
