use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::integrations::docker::DockerStatus;
use crate::model::{CommandRun, MonitorSnapshot, ProjectDescriptor, RunStatus};
use crate::ui::menu::{MenuItem, Selection};
use crate::utils::truncate_label;

const COMMAND_LABEL_WIDTH: usize = 50;

fn split(frame: &Frame<'_>) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());
    (chunks[0], chunks[1], chunks[2])
}

fn header(frame: &mut Frame<'_>, area: Rect, title: &str, subtitle: String) {
    let header = Paragraph::new(subtitle)
        .block(Block::default().borders(Borders::ALL).title(title.to_owned()))
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(header, area);
}

fn footer(frame: &mut Frame<'_>, area: Rect, hint: &str) {
    let footer = Paragraph::new(hint.to_owned()).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}

fn selectable_list(
    frame: &mut Frame<'_>,
    area: Rect,
    rows: Vec<ListItem<'_>>,
    selection: Selection,
    title: &str,
) {
    let list = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title(title.to_owned()))
        .highlight_style(
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if !selection.is_empty() {
        state.select(Some(selection.index()));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

pub fn project_summary(project: &ProjectDescriptor) -> String {
    format!(
        "{} project · {} · workspace: {}",
        project.project_type.as_str(),
        project.package_manager,
        project.workspace_type.as_str()
    )
}

pub fn draw_menu(
    frame: &mut Frame<'_>,
    project: &ProjectDescriptor,
    items: &[MenuItem],
    selection: Selection,
) {
    let (top, body, bottom) = split(frame);
    header(frame, top, "prodh", project_summary(project));
    let rows = items
        .iter()
        .map(|item| ListItem::new(item.label.clone()))
        .collect::<Vec<_>>();
    selectable_list(frame, body, rows, selection, "Menu");
    footer(frame, bottom, "up/down move  |  enter select  |  q quit");
}

pub fn info_lines(project: &ProjectDescriptor, docker: Option<&DockerStatus>) -> Vec<String> {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut lines = vec![
        format!("Project type:     {}", project.project_type.as_str()),
        format!("Package manager:  {}", project.package_manager),
        format!("Workspace:        {}", project.workspace_type.as_str()),
        format!(
            "Node version:     {}",
            project.node_version.as_deref().unwrap_or("not specified")
        ),
        format!("Docker files:     {}", yes_no(project.has_docker)),
        format!("Env example:      {}", yes_no(project.has_env_example)),
        format!("Common ports:     {}", crate::utils::join_ports(&project.ports)),
    ];
    if project.has_docker {
        lines.push(String::new());
        match docker {
            None => lines.push("Docker: checking...".to_string()),
            Some(status) if !status.running => lines.push("Docker: not running".to_string()),
            Some(status) if status.containers.is_empty() => {
                lines.push("Docker: running, no containers".to_string())
            }
            Some(status) => {
                lines.push(format!("Docker: {} running container(s)", status.containers.len()));
                lines.extend(status.containers.iter().map(|name| format!("  {}", name)));
            }
        }
    }
    lines
}

pub fn draw_info(
    frame: &mut Frame<'_>,
    project: &ProjectDescriptor,
    docker: Option<&DockerStatus>,
) {
    let (top, body, bottom) = split(frame);
    header(frame, top, "Project Information", project_summary(project));
    let body_text = info_lines(project, docker).join("\n");
    frame.render_widget(
        Paragraph::new(body_text).block(Block::default().borders(Borders::ALL)),
        body,
    );
    footer(frame, bottom, "q/esc back");
}

/// "Completed in 1.23s" / "Failed in 0.40s"; `None` while running.
pub fn completion_label(run: &CommandRun) -> Option<String> {
    let verb = match run.status {
        RunStatus::Running => return None,
        RunStatus::Success => "Completed",
        RunStatus::Error => "Failed",
    };
    Some(format!(
        "{} in {}",
        verb,
        run.duration_label().unwrap_or_else(|| "0.00s".to_string())
    ))
}

pub fn draw_command(frame: &mut Frame<'_>, run: &CommandRun, window: usize) {
    let (top, body, bottom) = split(frame);
    let (status, color) = match run.status {
        RunStatus::Running => ("running".to_string(), Color::Yellow),
        RunStatus::Success => (completion_label(run).unwrap_or_default(), Color::Green),
        RunStatus::Error => (completion_label(run).unwrap_or_default(), Color::Red),
    };
    let title = format!("Running: {}", run.invocation_label());
    let header = Paragraph::new(Line::from(Span::styled(status, Style::default().fg(color))))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(header, top);

    let output = Paragraph::new(run.visible_lines(window).join("\n"))
        .block(Block::default().borders(Borders::ALL).title("Output"))
        .wrap(Wrap { trim: false });
    frame.render_widget(output, body);

    let hint = if run.is_finished() {
        "returning to menu...  |  any key now"
    } else {
        "ctrl-c quit"
    };
    footer(frame, bottom, hint);
}

pub fn monitor_lines(
    snapshot: &MonitorSnapshot,
    process_filter: &str,
    max_shown: usize,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Last updated: {}{}",
        snapshot.captured_at.format("%H:%M:%S"),
        if snapshot.is_refreshing { "  (refreshing...)" } else { "" }
    )];

    lines.push(String::new());
    lines.push("Ports:".to_string());
    for observation in snapshot.observations() {
        let state = if observation.in_use { "in use" } else { "free" };
        lines.push(format!("  {:<6} {}", observation.port, state));
    }

    lines.push(String::new());
    if snapshot.processes.is_empty() {
        lines.push(format!("No {} processes running", process_filter));
        return lines;
    }
    lines.push(format!("Processes ({}):", snapshot.processes.len()));
    for process in snapshot.processes.iter().take(max_shown) {
        lines.push(format!(
            "  PID {:<7} CPU {:>5}%  MEM {:>5}%  {}",
            process.pid,
            process.cpu,
            process.memory,
            truncate_label(&process.command, COMMAND_LABEL_WIDTH)
        ));
    }
    if snapshot.processes.len() > max_shown {
        lines.push(format!("  ...and {} more", snapshot.processes.len() - max_shown));
    }
    lines
}

pub fn draw_monitor(
    frame: &mut Frame<'_>,
    snapshot: &MonitorSnapshot,
    process_filter: &str,
    max_shown: usize,
) {
    let (top, body, bottom) = split(frame);
    let indicator = if snapshot.is_refreshing { "refreshing" } else { "live" };
    header(frame, top, "Process Monitor", indicator.to_string());
    frame.render_widget(
        Paragraph::new(monitor_lines(snapshot, process_filter, max_shown).join("\n"))
            .block(Block::default().borders(Borders::ALL)),
        body,
    );
    footer(frame, bottom, "q/esc back");
}

pub fn draw_ports(
    frame: &mut Frame<'_>,
    rows: &[String],
    selection: Selection,
    status: Option<&str>,
    busy: bool,
) {
    let (top, body, bottom) = split(frame);
    let subtitle = match (busy, status) {
        (true, _) => "Killing...".to_string(),
        (false, Some(message)) => message.to_string(),
        (false, None) => "Select a port to free it".to_string(),
    };
    header(frame, top, "Port Management", subtitle);
    let items = rows
        .iter()
        .map(|row| ListItem::new(row.clone()))
        .collect::<Vec<_>>();
    selectable_list(frame, body, items, selection, "Ports");
    footer(frame, bottom, "up/down move  |  enter kill  |  q/esc back");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use chrono::Local;

    use super::*;
    use crate::model::{PackageManager, ProcessRecord, ProjectType, WorkspaceType};

    fn record(pid: i32, command: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            port: None,
            command: command.to_string(),
            cpu: "1.5".to_string(),
            memory: "0.8".to_string(),
        }
    }

    fn snapshot(processes: Vec<ProcessRecord>) -> MonitorSnapshot {
        MonitorSnapshot {
            processes,
            ports: BTreeMap::from([(3000, true), (3001, false)]),
            captured_at: Local::now(),
            is_refreshing: false,
        }
    }

    #[test]
    fn monitor_lists_ports_and_caps_processes() {
        let long = format!("node {}", "x".repeat(80));
        let processes = (1..=12).map(|pid| record(pid, &long)).collect();
        let lines = monitor_lines(&snapshot(processes), "node", 10);

        assert!(lines.iter().any(|l| l.contains("3000") && l.ends_with("in use")));
        assert!(lines.iter().any(|l| l.contains("3001") && l.ends_with("free")));
        assert_eq!(lines.iter().filter(|l| l.contains("PID")).count(), 10);
        assert!(lines.iter().any(|l| l.contains("...and 2 more")));
        let row = lines.iter().find(|l| l.contains("PID")).unwrap();
        assert!(row.ends_with("..."));
    }

    #[test]
    fn monitor_shows_refreshing_and_empty_state() {
        let mut snap = snapshot(Vec::new());
        snap.is_refreshing = true;
        let lines = monitor_lines(&snap, "node", 10);
        assert!(lines[0].contains("refreshing"));
        assert_eq!(lines.last().map(String::as_str), Some("No node processes running"));
    }

    #[test]
    fn completion_label_by_status() {
        let mut run = CommandRun::new("build", "npm");
        assert_eq!(completion_label(&run), None);
        run.finish(Some(0), Duration::from_millis(1500));
        assert_eq!(completion_label(&run).as_deref(), Some("Completed in 1.50s"));

        let mut failed = CommandRun::new("test", "npm");
        failed.finish(Some(1), Duration::from_millis(400));
        assert_eq!(completion_label(&failed).as_deref(), Some("Failed in 0.40s"));
    }

    #[test]
    fn info_reports_docker_only_for_docker_projects() {
        let mut project = ProjectDescriptor {
            package_manager: PackageManager::Yarn,
            project_type: ProjectType::Vue,
            workspace_type: WorkspaceType::Lerna,
            has_docker: false,
            has_env_example: true,
            ports: vec![8080, 8081],
            node_version: Some("20".to_string()),
        };
        let lines = info_lines(&project, None);
        assert!(lines.iter().all(|l| !l.starts_with("Docker:")));
        assert!(lines.iter().any(|l| l.ends_with("8080, 8081")));

        project.has_docker = true;
        let status = DockerStatus {
            running: true,
            containers: vec!["web-db-1".to_string()],
        };
        let lines = info_lines(&project, Some(&status));
        assert!(lines.contains(&"Docker: 1 running container(s)".to_string()));
        assert!(lines.contains(&"  web-db-1".to_string()));
    }
}
