//! Port listener lookup using lsof

use std::process::{Output, Stdio};

use anyhow::{Context, Result};
use log::debug;
use tokio::process::Command;

use crate::model::ProcessRecord;

async fn lsof_listen(lsof: &str, port: u16, terse: bool) -> Result<Output> {
    let filter = format!(":{}", port);
    let mut command = Command::new(lsof);
    command.args(["-Pi", filter.as_str(), "-sTCP:LISTEN"]);
    if terse {
        command.arg("-t");
    }
    command
        .stdin(Stdio::null())
        .output()
        .await
        .context("failed to execute lsof")
}

/// PID of the process listening on `port`, if any.
///
/// lsof exits non-zero when nothing matches, so a failed status is read as
/// "no listener" rather than an error.
pub async fn find_listener_pid(lsof: &str, port: u16) -> Result<Option<i32>> {
    let output = lsof_listen(lsof, port, true).await?;
    if !output.status.success() {
        if !output.stderr.is_empty() {
            debug!(
                "lsof for port {} reported: {}",
                port,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        return Ok(None);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_listener_pids(&stdout).into_iter().next())
}

/// Owning command and PID for `port`, read from the verbose lsof table.
pub async fn describe_listener(lsof: &str, port: u16) -> Result<Option<ProcessRecord>> {
    let output = lsof_listen(lsof, port, false).await?;
    if !output.status.success() {
        return Ok(None);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_listener_table(&stdout, port))
}

/// Parse `lsof -t` output: one PID per line.
pub fn parse_listener_pids(stdout: &str) -> Vec<i32> {
    let mut pids = Vec::new();
    for line in stdout.lines() {
        if let Ok(pid) = line.trim().parse::<i32>()
            && pid > 0
            && !pids.contains(&pid)
        {
            pids.push(pid);
        }
    }
    pids
}

// COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME
pub fn parse_listener_table(stdout: &str, port: u16) -> Option<ProcessRecord> {
    let row = stdout.lines().nth(1)?;
    let mut parts = row.split_whitespace();
    let command = parts.next()?.to_string();
    let pid = parts.next()?.parse::<i32>().ok()?;
    Some(ProcessRecord {
        pid,
        port: Some(port),
        command,
        cpu: "0%".to_string(),
        memory: "0%".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_pid() {
        assert_eq!(parse_listener_pids("4242\n"), vec![4242]);
    }

    #[test]
    fn parses_dual_stack_listeners_once() {
        assert_eq!(parse_listener_pids("4242\n4242\n5150\n"), vec![4242, 5150]);
    }

    #[test]
    fn rejects_garbage_and_non_positive_pids() {
        assert!(parse_listener_pids("").is_empty());
        assert!(parse_listener_pids("abc\n0\n-1\n").is_empty());
    }

    #[test]
    fn parses_verbose_table() {
        let table = "\
COMMAND  PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
node    4242  dev   23u  IPv6 123456      0t0  TCP *:3000 (LISTEN)
";
        let record = parse_listener_table(table, 3000).unwrap();
        assert_eq!(record.pid, 4242);
        assert_eq!(record.command, "node");
        assert_eq!(record.port, Some(3000));
        assert_eq!(record.cpu, "0%");
    }

    #[test]
    fn header_only_table_has_no_listener() {
        assert!(parse_listener_table("COMMAND PID USER\n", 3000).is_none());
        assert!(parse_listener_table("", 3000).is_none());
    }

    #[tokio::test]
    async fn missing_lsof_is_an_error() {
        assert!(find_listener_pid("/nonexistent/lsof", 3000).await.is_err());
    }
}
