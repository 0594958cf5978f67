//! Process table listing using `ps aux`

use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;

use crate::model::ProcessRecord;

// USER PID %CPU %MEM VSZ RSS TTY STAT START TIME COMMAND...
const PID_COLUMN: usize = 1;
const CPU_COLUMN: usize = 2;
const MEM_COLUMN: usize = 3;
const COMMAND_COLUMN: usize = 10;

pub async fn list_processes(ps: &str, filter: &str) -> Result<Vec<ProcessRecord>> {
    let child = Command::new(ps)
        .arg("aux")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to execute ps")?;
    let own_pid = child.id().map(|pid| pid as i32);

    let output = child
        .wait_with_output()
        .await
        .context("failed to collect ps output")?;

    if !output.status.success() {
        return Err(anyhow!(
            "ps failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ps_output(&stdout, filter, own_pid))
}

/// Keep rows whose command mentions `filter`, skipping our own `ps` and any
/// grep that happens to be searching for the same keyword.
pub fn parse_ps_output(stdout: &str, filter: &str, own_pid: Option<i32>) -> Vec<ProcessRecord> {
    let mut results = Vec::new();

    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() <= COMMAND_COLUMN {
            continue;
        }

        let pid = match parts[PID_COLUMN].parse::<i32>() {
            Ok(p) => p,
            Err(_) => continue,
        };
        if Some(pid) == own_pid {
            continue;
        }

        let command = parts[COMMAND_COLUMN..].join(" ");
        if !command.contains(filter) || command.contains("grep") {
            continue;
        }

        results.push(ProcessRecord {
            pid,
            port: None,
            command,
            cpu: parts[CPU_COLUMN].to_string(),
            memory: parts[MEM_COLUMN].to_string(),
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::parse_ps_output;

    const SAMPLE: &str = "\
USER       PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND
dev       4242  1.5  2.1 912344 86012 pts/1    Sl+  09:12   0:03 node /srv/app/node_modules/.bin/next dev -p 3000
dev       4300  0.0  0.0   6432   720 pts/2    S+   09:15   0:00 grep --color=auto node
root         1  0.0  0.1 167744 11500 ?        Ss   08:00   0:02 /sbin/init
dev       4301  0.0  0.0  10072  3300 pts/3    R+   09:15   0:00 ps aux node
dev       4400 12.0  5.3 1203000 210000 ?      Sl   09:20   1:10 /usr/bin/node server.js
short line node
";

    #[test]
    fn keeps_matching_rows_and_rejoins_command() {
        let rows = parse_ps_output(SAMPLE, "node", Some(4301));
        let pids: Vec<i32> = rows.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![4242, 4400]);
        assert_eq!(
            rows[0].command,
            "node /srv/app/node_modules/.bin/next dev -p 3000"
        );
        assert_eq!(rows[1].cpu, "12.0");
        assert_eq!(rows[1].memory, "5.3");
        assert!(rows.iter().all(|r| r.port.is_none()));
    }

    #[test]
    fn excludes_own_query_process() {
        let rows = parse_ps_output(SAMPLE, "node", None);
        assert!(rows.iter().any(|r| r.pid == 4301));
        let rows = parse_ps_output(SAMPLE, "node", Some(4301));
        assert!(rows.iter().all(|r| r.pid != 4301));
    }

    #[test]
    fn skips_header_and_short_lines() {
        let rows = parse_ps_output(SAMPLE, "COMMAND", None);
        assert!(rows.is_empty());
        assert!(parse_ps_output("", "node", None).is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let result = super::list_processes("/nonexistent/ps", "node").await;
        assert!(result.is_err());
    }
}
