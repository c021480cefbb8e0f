use super::*;
use futures::StreamExt;
use std::collections::HashMap;

fn sh(script: &str) -> ProcessCommand {
    ProcessCommand::new("sh").with_args(["-c", script])
}

#[tokio::test]
async fn test_streams_lines_in_order_then_succeeds() {
    let runner = TokioProcessRunner;
    let mut lines = runner.run_lines(sh("echo one; echo two; echo three"));

    assert_eq!(lines.next().await.unwrap().unwrap(), "one");
    assert_eq!(lines.next().await.unwrap().unwrap(), "two");
    assert_eq!(lines.next().await.unwrap().unwrap(), "three");
    assert!(lines.next().await.is_none());
}

#[tokio::test]
async fn test_failure_arrives_after_all_lines() {
    let runner = TokioProcessRunner;
    let lines = runner.run_lines(sh("echo a; echo b; echo boom >&2; exit 7"));
    let items: Vec<LineItem> = lines.collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap(), "a");
    assert_eq!(items[1].as_ref().unwrap(), "b");
    let err = items[2].as_ref().unwrap_err();
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.exit_code(), Some(7));
}

#[tokio::test]
async fn test_failure_without_stderr_reports_code() {
    let runner = TokioProcessRunner;
    let err = collect_lines(runner.run_lines(sh("exit 3")))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown error, code:3");
}

#[tokio::test]
async fn test_stderr_is_ignored_on_success() {
    let runner = TokioProcessRunner;
    let lines = collect_lines(runner.run_lines(sh("echo warn >&2; echo ok")))
        .await
        .unwrap();
    assert_eq!(lines, vec!["ok"]);
}

#[tokio::test]
async fn test_unterminated_last_line_is_delivered() {
    let runner = TokioProcessRunner;
    let lines = collect_lines(runner.run_lines(sh("printf 'first\\nlast'")))
        .await
        .unwrap();
    assert_eq!(lines, vec!["first", "last"]);
}

#[tokio::test]
async fn test_missing_executable_fails_lazily() {
    let runner = TokioProcessRunner;
    let mut lines = runner.run_lines(ProcessCommand::new("nonexistent-command-12345"));

    match lines.next().await {
        Some(Err(ProcessError::CommandNotFound(cmd))) => {
            assert_eq!(cmd, "nonexistent-command-12345");
        }
        other => panic!("Expected CommandNotFound, got {other:?}"),
    }
    assert!(lines.next().await.is_none());
}

#[tokio::test]
async fn test_working_dir_and_env_are_applied() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut env = HashMap::new();
    env.insert("GITBRIDGE_TEST_VALUE".to_string(), "42".to_string());

    let command = sh("pwd; echo $GITBRIDGE_TEST_VALUE")
        .with_env(&env)
        .in_dir(Some(dir.path().to_path_buf()));
    let lines = collect_lines(TokioProcessRunner.run_lines(command))
        .await
        .unwrap();

    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(
        std::path::Path::new(&lines[0]).canonicalize().unwrap(),
        expected
    );
    assert_eq!(lines[1], "42");
}

#[tokio::test]
async fn test_parent_environment_is_not_inherited() {
    std::env::set_var("GITBRIDGE_LEAK_CHECK", "leaked");
    let lines = collect_lines(TokioProcessRunner.run_lines(sh("echo \"[$GITBRIDGE_LEAK_CHECK]\"")))
        .await
        .unwrap();
    assert_eq!(lines, vec!["[]"]);
}

#[tokio::test]
async fn test_dropping_stream_early_does_not_hang() {
    let runner = TokioProcessRunner;
    let mut lines = runner.run_lines(sh("echo first; sleep 30; echo never"));
    assert_eq!(lines.next().await.unwrap().unwrap(), "first");
    drop(lines);
}

#[tokio::test]
async fn test_mock_runner_lines() {
    let mock = MockProcessRunner::new();
    mock.expect_command("git")
        .with_args(|args| args == ["show-ref"])
        .returns_lines(["abc refs/heads/main", "def refs/tags/v1"])
        .finish();

    let lines = collect_lines(mock.run_lines(ProcessCommand::new("git").with_args(["show-ref"])))
        .await
        .unwrap();

    assert_eq!(lines, vec!["abc refs/heads/main", "def refs/tags/v1"]);
    assert!(mock.verify_called("git", 1));
}

#[tokio::test]
async fn test_mock_runner_failure_uses_resolution_chain() {
    let mock = MockProcessRunner::new();
    mock.expect_command("git")
        .returns_lines(["partial"])
        .returns_stderr("fatal: not a git repository\n")
        .returns_exit_code(128)
        .finish();

    let items: Vec<LineItem> = mock.run_lines(ProcessCommand::new("git")).collect().await;
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert_eq!(
        items[1].as_ref().unwrap_err().to_string(),
        "fatal: not a git repository"
    );
}

#[tokio::test]
async fn test_mock_runner_spawn_failure() {
    let mock = MockProcessRunner::new();
    mock.expect_command("git")
        .fails_to_spawn(std::io::ErrorKind::NotFound)
        .finish();

    let err = collect_lines(mock.run_lines(ProcessCommand::new("git")))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::CommandNotFound(_)));
}

#[tokio::test]
async fn test_mock_runner_times_limit() {
    let mock = MockProcessRunner::new();
    mock.expect_command("git").times(1).finish();

    assert!(collect_lines(mock.run_lines(ProcessCommand::new("git")))
        .await
        .is_ok());
    let err = collect_lines(mock.run_lines(ProcessCommand::new("git")))
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessError::MockExpectationNotMet(_)));
}

#[tokio::test]
async fn test_mock_runner_unknown_command() {
    let mock = MockProcessRunner::new();
    let err = collect_lines(mock.run_lines(ProcessCommand::new("svn")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No expectation found"));
    assert_eq!(mock.get_call_history().len(), 1);
    mock.reset();
    assert!(mock.get_call_history().is_empty());
}
