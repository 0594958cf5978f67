use std::process::{Output, Stdio};

use log::warn;
use tokio::process::Command;

use crate::utils::find_command;

async fn docker_ps(args: &[&str]) -> Option<Output> {
    let out = Command::new(find_command("docker"))
        .arg("ps")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await;
    match out {
        Ok(o) => Some(o),
        Err(err) => {
            warn!("Docker command failed (docker not installed?): {}", err);
            None
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DockerStatus {
    pub running: bool,
    pub containers: Vec<String>,
}

/// Daemon state plus running container names, for the project info screen.
pub async fn status() -> DockerStatus {
    if !is_running().await {
        return DockerStatus::default();
    }
    DockerStatus {
        running: true,
        containers: container_names().await,
    }
}

/// Whether the Docker daemon answers `docker ps`.
pub async fn is_running() -> bool {
    docker_ps(&[]).await.is_some_and(|out| out.status.success())
}

/// Names of running containers; empty when Docker is unavailable.
pub async fn container_names() -> Vec<String> {
    let Some(out) = docker_ps(&["--format", "{{.Names}}"]).await else {
        return Vec::new();
    };
    if !out.status.success() {
        warn!(
            "Docker ps command failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
        return Vec::new();
    }
    parse_container_names(&String::from_utf8_lossy(&out.stdout))
}

pub fn parse_container_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
