use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;

/// One row of the OS process table. Recreated on every poll.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: i32,
    pub port: Option<u16>,
    pub command: String,
    pub cpu: String,
    pub memory: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortObservation {
    pub port: u16,
    pub in_use: bool,
}

/// Wholesale-replaced view of the monitored state.
#[derive(Clone, Debug)]
pub struct MonitorSnapshot {
    pub processes: Vec<ProcessRecord>,
    pub ports: BTreeMap<u16, bool>,
    pub captured_at: DateTime<Local>,
    pub is_refreshing: bool,
}

impl MonitorSnapshot {
    /// Snapshot shown before the first refresh lands: every port free, loading.
    pub fn pending(ports: &[u16]) -> Self {
        Self {
            processes: Vec::new(),
            ports: ports.iter().map(|port| (*port, false)).collect(),
            captured_at: Local::now(),
            is_refreshing: true,
        }
    }

    pub fn observations(&self) -> impl Iterator<Item = PortObservation> + '_ {
        self.ports.iter().map(|(port, in_use)| PortObservation {
            port: *port,
            in_use: *in_use,
        })
    }

    pub fn is_port_in_use(&self, port: u16) -> bool {
        self.ports.get(&port).copied().unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TerminationOutcome {
    pub port: u16,
    pub succeeded: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

/// State of one package-manager script invocation.
#[derive(Clone, Debug)]
pub struct CommandRun {
    pub command: String,
    pub package_manager: String,
    pub status: RunStatus,
    pub output_lines: Vec<String>,
    pub started_at: Instant,
    pub duration_ms: Option<u64>,
    pub exit_code: Option<i32>,
}

impl CommandRun {
    pub fn new(command: impl Into<String>, package_manager: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            package_manager: package_manager.into(),
            status: RunStatus::Running,
            output_lines: Vec::new(),
            started_at: Instant::now(),
            duration_ms: None,
            exit_code: None,
        }
    }

    /// Moves the run out of `Running`. Returns false if it already finished.
    pub fn finish(&mut self, exit_code: Option<i32>, elapsed: Duration) -> bool {
        if self.status != RunStatus::Running {
            return false;
        }
        self.status = if exit_code == Some(0) {
            RunStatus::Success
        } else {
            RunStatus::Error
        };
        self.exit_code = exit_code;
        self.duration_ms = Some(elapsed.as_millis() as u64);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.status != RunStatus::Running
    }

    /// Trailing window of output for display.
    pub fn visible_lines(&self, window: usize) -> &[String] {
        let start = self.output_lines.len().saturating_sub(window);
        &self.output_lines[start..]
    }

    pub fn duration_label(&self) -> Option<String> {
        self.duration_ms
            .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
    }

    pub fn invocation_label(&self) -> String {
        format!("{} run {}", self.package_manager, self.command)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Pnpm,
    Npm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Pnpm => "pnpm",
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Angular,
    React,
    Next,
    Nest,
    Vue,
    Nuxt,
    Vite,
    Unknown,
}

impl ProjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::Angular => "angular",
            ProjectType::React => "react",
            ProjectType::Next => "next",
            ProjectType::Nest => "nest",
            ProjectType::Vue => "vue",
            ProjectType::Nuxt => "nuxt",
            ProjectType::Vite => "vite",
            ProjectType::Unknown => "unknown",
        }
    }

    /// Dev-server ports commonly bound by this kind of project.
    pub fn common_ports(self) -> Vec<u16> {
        match self {
            ProjectType::Angular => vec![4200, 4300],
            ProjectType::React | ProjectType::Next | ProjectType::Nest | ProjectType::Nuxt => {
                vec![3000, 3001]
            }
            ProjectType::Vue => vec![8080, 8081],
            ProjectType::Vite => vec![5173, 5174],
            ProjectType::Unknown => vec![3000, 8080, 5173],
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceType {
    Nx,
    Turbo,
    Lerna,
    Workspaces,
    None,
}

impl WorkspaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceType::Nx => "nx",
            WorkspaceType::Turbo => "turbo",
            WorkspaceType::Lerna => "lerna",
            WorkspaceType::Workspaces => "workspaces",
            WorkspaceType::None => "none",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub package_manager: PackageManager,
    pub project_type: ProjectType,
    pub workspace_type: WorkspaceType,
    pub has_docker: bool,
    pub has_env_example: bool,
    pub ports: Vec<u16>,
    pub node_version: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MenuAction {
    RunScript(Script),
    PortManagement,
    ProcessMonitor,
    ProjectInfo,
    Exit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Script {
    Dev,
    Build,
    Test,
    Lint,
}

impl Script {
    pub fn name(self) -> &'static str {
        match self {
            Script::Dev => "dev",
            Script::Build => "build",
            Script::Test => "test",
            Script::Lint => "lint",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKey {
    Up,
    Down,
    Enter,
    Back,
    Quit,
    Interrupt,
    Other,
}

#[derive(Clone, Debug)]
pub enum UserEvent {
    Key(InputKey),
    Resize,
}
