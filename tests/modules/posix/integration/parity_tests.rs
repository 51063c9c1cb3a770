//! Native and raw mode must produce the same observable result

use crate::modules::posix::{
    assert_same_outcome, CommandTestBuilder, LineInFileTestBuilder, RecordingChannel,
    SlurpTestBuilder, TestEnvironment,
};
use rustle_posix::config::PosixConfig;
use std::sync::Arc;

#[tokio::test]
async fn test_command_results_match() {
    let env = TestEnvironment::new();
    let scripts = [
        CommandTestBuilder::new().argv(&["echo", "hello world"]),
        CommandTestBuilder::new().cmd("echo a; echo b >&2; exit 4").shell(),
        CommandTestBuilder::new().argv(&["sh", "-c", "exit 0"]).creates("/"),
    ];

    for script in scripts {
        let native_args = script.native().build();
        let mut raw_args = native_args.clone();
        raw_args
            .args
            .insert("_force_raw".to_string(), serde_json::json!(true));

        let native = env.execute_module("command", native_args).await;
        let raw = env.execute_module("command", raw_args).await;
        assert_same_outcome(&native, &raw);
        assert_eq!(native.stderr, raw.stderr);
    }
}

#[tokio::test]
async fn test_lineinfile_results_match() {
    let cases: Vec<(&str, LineInFileTestBuilder)> = vec![
        ("a\nb\na\n", LineInFileTestBuilder::new().line("a")),
        ("x=1\ny=2\n", LineInFileTestBuilder::new().regexp("^x=").line("x=5")),
        ("x=1\ny=2\n", LineInFileTestBuilder::new().line("z=3").insertbefore("^y=")),
        ("x=1\n", LineInFileTestBuilder::new().line("x=1").absent()),
        ("keep\n", LineInFileTestBuilder::new().search_string("nope").absent()),
    ];

    for (initial, builder) in cases {
        let native_env = TestEnvironment::new();
        let raw_env = TestEnvironment::new();
        let native_path = native_env.create_test_file("f", initial);
        let raw_path = raw_env.create_test_file("f", initial);

        let native_args = builder.native().build();
        let mut raw_args = native_args.clone();
        raw_args
            .args
            .insert("_force_raw".to_string(), serde_json::json!(true));
        let mut native_args = native_args;
        native_args.args.insert(
            "path".to_string(),
            serde_json::json!(native_path.to_string_lossy()),
        );
        raw_args.args.insert(
            "path".to_string(),
            serde_json::json!(raw_path.to_string_lossy()),
        );

        let native = native_env.execute_module("lineinfile_dedupe", native_args).await;
        let raw = raw_env.execute_module("lineinfile_dedupe", raw_args).await;

        assert_same_outcome(&native, &raw);
        assert_eq!(
            std::fs::read_to_string(&native_path).unwrap(),
            std::fs::read_to_string(&raw_path).unwrap()
        );
        assert_eq!(native.results.get("checksum"), raw.results.get("checksum"));
    }
}

#[tokio::test]
async fn test_raw_mode_only_sends_shell_lines() {
    let channel = Arc::new(RecordingChannel::new());
    let env = TestEnvironment::with_channel(channel.clone(), PosixConfig::default());
    let path = env.create_test_file("conf", "a=1\n");
    let src = path.to_string_lossy().into_owned();

    env.execute_module(
        "command",
        CommandTestBuilder::new().raw().argv(&["true"]).chdir(env.temp_dir().to_string_lossy()).build(),
    )
    .await;
    env.execute_module(
        "lineinfile_dedupe",
        LineInFileTestBuilder::new().raw().path(src.as_str()).line("b=2").backup().build(),
    )
    .await;
    env.execute_module("slurp", SlurpTestBuilder::new().raw().src(src.as_str()).build())
        .await;

    assert!(!channel.calls().is_empty());
    assert!(channel.only_shell(), "raw mode used {:?}", channel.calls());
    assert_eq!(channel.file_calls(), 0);
    assert!(channel
        .shell_lines()
        .iter()
        .any(|line| line.starts_with("mv -f ")));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "a=1\nb=2\n");
}

#[tokio::test]
async fn test_native_mode_uses_file_channel() {
    let channel = Arc::new(RecordingChannel::new());
    let env = TestEnvironment::with_channel(channel.clone(), PosixConfig::default());
    let path = env.create_test_file("conf", "a=1\n");

    env.execute_module(
        "lineinfile_dedupe",
        LineInFileTestBuilder::new().native().path(path.to_string_lossy()).line("b=2").build(),
    )
    .await;

    assert!(channel.file_calls() >= 3);
    assert!(channel.shell_lines().is_empty());
}
