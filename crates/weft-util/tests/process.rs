use weft_util::errors::WeftError;
use weft_util::process::CommandBuilder;

#[test]
fn test_exec_captures_stdout() {
    let output = CommandBuilder::new("echo").arg("woven").exec().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "woven");
}

#[test]
fn test_cwd_and_env() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = CommandBuilder::new("sh")
        .args(["-c", "echo $WEFT_TEST_VAR; pwd"])
        .env("WEFT_TEST_VAR", "set")
        .cwd(tmp.path())
        .exec()
        .unwrap();
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.starts_with("set"), "got: {text}");
}

#[test]
fn test_exec_checked_reports_failure() {
    let err = CommandBuilder::new("sh")
        .args(["-c", "echo boom >&2; exit 3"])
        .exec_checked("repo")
        .unwrap_err();
    match err {
        WeftError::FetchFailure { resource, message } => {
            assert_eq!(resource, "repo");
            assert!(message.contains("boom"), "got: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_program_is_io_error() {
    let err = CommandBuilder::new("definitely-not-a-weft-binary").exec();
    assert!(matches!(err, Err(WeftError::Io(_))));
}

#[test]
fn test_display_joins_arguments() {
    let cmd = CommandBuilder::new("git").args(["fetch", "--depth", "1"]);
    assert_eq!(cmd.display(), "git fetch --depth 1");
}
