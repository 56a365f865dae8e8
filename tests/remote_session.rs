
use std::fs;
use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;
use test_util::{spawn_server, SENTINEL};

#[test]
fn command_output_then_sentinel() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("echo hello")?, "hello\n");
    assert_eq!(conn.send("echo a b | tr a-z A-Z")?, "A B\n");
    Ok(())
}

#[test]
fn silent_command_gets_bare_sentinel() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("true")?, "");
    Ok(())
}

#[test]
fn stderr_goes_to_the_client() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    let resp = conn.send("no_such_program_xyz")?;
    assert!(resp.contains("no_such_program_xyz"), "{resp}");
    assert_eq!(conn.send("rc")?, "127\n");
    Ok(())
}

#[test]
fn parse_errors_are_answered() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("   ")?, "warning: no commands provided\n");
    let nine = vec!["true"; 9].join(" | ");
    assert_eq!(conn.send(&nine)?, "error: piping limited to 8 commands\n");
    Ok(())
}

#[test]
fn builtins_acknowledge_or_relay_output() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("sub"))?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("cd sub")?, "Command executed.\n");
    assert!(conn.send("pwd")?.trim_end().ends_with("/sub"));
    assert_eq!(conn.send("false")?, "");
    assert_eq!(conn.send("rc")?, "1\n");
    assert!(conn.send("dragon")?.contains("@___oo"));
    let resp = conn.send("cd missing_dir")?;
    assert!(resp.starts_with("cd: missing_dir:"), "{resp}");
    Ok(())
}

#[test]
fn redirection_runs_in_server_cwd() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("echo stored > saved.txt")?, "");
    assert_eq!(fs::read_to_string(dir.path().join("saved.txt"))?, "stored\n");
    assert_eq!(conn.send("cat saved.txt")?, "stored\n");
    Ok(())
}

#[test]
fn exec_errors_are_reported_inline() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    let resp = conn.send("cat <")?;
    assert!(resp.starts_with("rdsh-error: "), "{resp}");
    assert_eq!(conn.send("rc")?, "1\n");
    Ok(())
}

#[test]
fn coalesced_requests_are_answered_in_order() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    conn.send_raw(b"echo first\0echo second\0")?;
    let all = conn.read_until_sentinels(2)?;
    let mut expected = b"first\n".to_vec();
    expected.push(SENTINEL);
    expected.extend_from_slice(b"second\n");
    expected.push(SENTINEL);
    assert_eq!(all, expected);
    Ok(())
}

#[test]
fn exit_ends_session_but_not_server() -> Result<()> {
    let dir = tempdir()?;
    let mut server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("exit")?, "Goodbye!\n");
    assert!(conn.is_closed()?);
    drop(conn);

    let mut again = server.connect()?;
    assert_eq!(again.send("echo again")?, "again\n");
    assert!(server.is_running()?);
    Ok(())
}

#[test]
fn hangup_without_exit_keeps_server() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("echo one")?, "one\n");
    drop(conn);
    let mut next = server.connect()?;
    assert_eq!(next.send("echo two")?, "two\n");
    Ok(())
}

#[test]
fn session_state_starts_fresh() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    conn.send("false")?;
    assert_eq!(conn.send("rc")?, "1\n");
    assert_eq!(conn.send("exit")?, "Goodbye!\n");
    drop(conn);
    let mut next = server.connect()?;
    assert_eq!(next.send("rc")?, "0\n");
    Ok(())
}

#[test]
fn stop_server_shuts_down() -> Result<()> {
    let dir = tempdir()?;
    let mut server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    assert_eq!(conn.send("stop-server")?, "Server stopping...\n");
    let status = server.wait_exit(Duration::from_secs(5))?;
    assert!(status.success(), "{status}");
    Ok(())
}

#[test]
fn over_limit_request_is_rejected_whole() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    let mut data = vec![b' '; 64 * 1024];
    data.extend_from_slice(b"touch tail-ran\0");
    conn.send_raw(&data)?;
    let mut resp = conn.read_until_sentinels(1)?;
    resp.pop();
    let resp = String::from_utf8_lossy(&resp).into_owned();
    assert!(resp.starts_with("error: request of "), "{resp}");
    // exactly one answer, and nothing from the tail ran
    assert_eq!(conn.send("echo next")?, "next\n");
    assert!(!dir.path().join("tail-ran").exists());
    Ok(())
}

#[test]
fn request_split_over_several_writes() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    conn.send_raw(b"echo sp")?;
    std::thread::sleep(Duration::from_millis(100));
    conn.send_raw(b"lit\0")?;
    let mut resp = conn.read_until_sentinels(1)?;
    resp.pop();
    assert_eq!(resp, b"split\n");
    Ok(())
}

#[test]
fn non_utf8_request_is_refused() -> Result<()> {
    let dir = tempdir()?;
    let server = spawn_server(dir.path())?;
    let mut conn = server.connect()?;
    conn.send_raw(b"touch caf\xe9\0")?;
    let mut resp = conn.read_until_sentinels(1)?;
    resp.pop();
    assert_eq!(resp, b"error: request is not valid UTF-8\n");
    assert_eq!(fs::read_dir(dir.path())?.count(), 0);
    assert_eq!(conn.send("echo ok")?, "ok\n");
    Ok(())
}
