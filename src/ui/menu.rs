use crate::model::{InputKey, MenuAction, ProjectDescriptor, Script};
use crate::utils::join_ports;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MenuItem {
    pub label: String,
    pub action: MenuAction,
}

impl MenuItem {
    fn new(label: impl Into<String>, action: MenuAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Main menu for a project. Build, test and lint entries only appear when
/// package.json declares the script.
pub fn build_main_menu(project: &ProjectDescriptor, scripts: &[String]) -> Vec<MenuItem> {
    let has = |script: Script| scripts.iter().any(|name| name == script.name());

    let mut items = vec![MenuItem::new(
        format!("Start Development ({} run dev)", project.package_manager),
        MenuAction::RunScript(Script::Dev),
    )];
    for (script, label) in [
        (Script::Build, "Build"),
        (Script::Test, "Run Tests"),
        (Script::Lint, "Lint"),
    ] {
        if has(script) {
            items.push(MenuItem::new(label, MenuAction::RunScript(script)));
        }
    }
    items.push(MenuItem::new(
        format!("Port Management ({})", join_ports(&project.ports)),
        MenuAction::PortManagement,
    ));
    items.push(MenuItem::new("Process Monitor", MenuAction::ProcessMonitor));
    items.push(MenuItem::new("Project Information", MenuAction::ProjectInfo));
    items.push(MenuItem::new("Exit", MenuAction::Exit));
    items
}

/// Cursor over a fixed number of rows. Movement wraps at both ends.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    index: usize,
    len: usize,
}

impl Selection {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Applies an arrow key. Returns true if the cursor moved.
    pub fn handle(&mut self, key: InputKey) -> bool {
        if self.len < 2 {
            return false;
        }
        match key {
            InputKey::Up => {
                self.index = self.index.checked_sub(1).unwrap_or(self.len - 1);
                true
            }
            InputKey::Down => {
                self.index = (self.index + 1) % self.len;
                true
            }
            _ => false,
        }
    }
}

/// Row label for the port manager: the port, plus its owner when known.
pub fn format_port_label(port: u16, owner: Option<&str>) -> String {
    match owner {
        Some(command) if !command.is_empty() => format!("Port {} ({})", port, command),
        _ => format!("Port {}", port),
    }
}

pub fn kill_status_message(port: u16, succeeded: bool) -> String {
    if succeeded {
        format!("Successfully killed process on port {}", port)
    } else {
        format!("No process found on port {}", port)
    }
}
