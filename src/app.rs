use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use futures::future::join_all;
use log::{debug, info};
use ratatui::Frame;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::integrations::docker::{self, DockerStatus};
use crate::model::{InputKey, MenuAction, ProjectDescriptor, TerminationOutcome, UserEvent};
use crate::process::{CommandRunner, Monitor, RunHandle, ScriptInvocation, SystemProbe, kill_port};
use crate::ui::input::spawn_input_listener;
use crate::ui::menu::{
    MenuItem, Selection, build_main_menu, format_port_label, kill_status_message,
};
use crate::ui::render;
use crate::ui::terminal::TerminalGuard;

const UI_TICK: Duration = Duration::from_millis(100);

/// Everything the dashboard needs about the project it was opened in.
pub struct AppContext {
    pub project_dir: PathBuf,
    pub config: Config,
    pub project: ProjectDescriptor,
    pub scripts: Vec<String>,
    pub probe: Arc<dyn SystemProbe>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartScreen {
    Menu,
    Monitor,
}

enum Screen {
    Menu,
    Info {
        docker: Option<DockerStatus>,
        pending: Option<oneshot::Receiver<DockerStatus>>,
    },
    Command(RunHandle),
    Monitor(Monitor),
    Ports(PortManager),
}

struct PortManager {
    ports: Vec<u16>,
    owners: BTreeMap<u16, String>,
    pending_owners: Option<oneshot::Receiver<BTreeMap<u16, String>>>,
    pending_kill: Option<oneshot::Receiver<TerminationOutcome>>,
    selection: Selection,
    status: Option<(String, Instant)>,
}

impl PortManager {
    fn rows(&self) -> Vec<String> {
        let mut rows: Vec<String> = self
            .ports
            .iter()
            .map(|port| format_port_label(*port, self.owners.get(port).map(String::as_str)))
            .collect();
        rows.push("Back".to_string());
        rows
    }

    fn selected_port(&self) -> Option<u16> {
        self.ports.get(self.selection.index()).copied()
    }

    fn status_message(&self) -> Option<&str> {
        self.status.as_ref().map(|(message, _)| message.as_str())
    }
}

struct App {
    ctx: AppContext,
    runner: CommandRunner,
    menu: Vec<MenuItem>,
    selection: Selection,
    screen: Screen,
    exit: bool,
}

pub async fn run(ctx: AppContext, start: StartScreen) -> Result<()> {
    let mut app = App::new(ctx);
    if start == StartScreen::Monitor {
        app.open(MenuAction::ProcessMonitor);
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let _input = spawn_input_listener(tx);
    let mut guard = TerminalGuard::enter()?;
    info!("Dashboard opened for {}", app.ctx.project_dir.display());

    let result = event_loop(&mut app, &mut guard, &rx).await;
    drop(guard);
    result
}

async fn event_loop(
    app: &mut App,
    guard: &mut TerminalGuard,
    events: &Receiver<UserEvent>,
) -> Result<()> {
    let mut ticker = time::interval(UI_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        app.poll_background();
        if app.exit {
            return Ok(());
        }
        guard
            .terminal()
            .draw(|frame| app.draw(frame))
            .context("failed to draw frame")?;

        // Yield so the monitor, runner and kill tasks make progress
        ticker.tick().await;

        while let Ok(event) = events.try_recv() {
            if let UserEvent::Key(key) = event {
                app.handle_key(key);
            }
        }
    }
}

impl App {
    fn new(ctx: AppContext) -> Self {
        let menu = build_main_menu(&ctx.project, &ctx.scripts);
        let runner =
            CommandRunner::new(Duration::from_millis(ctx.config.runner.completion_delay_ms));
        Self {
            selection: Selection::new(menu.len()),
            menu,
            runner,
            ctx,
            screen: Screen::Menu,
            exit: false,
        }
    }

    fn ports_of_interest(&self) -> Vec<u16> {
        self.ctx.config.ports_of_interest(&self.ctx.project.ports)
    }

    fn back_to_menu(&mut self) {
        // Dropping the old screen stops its monitor or pending completion
        self.screen = Screen::Menu;
    }

    fn open(&mut self, action: MenuAction) {
        match action {
            MenuAction::RunScript(script) => {
                let invocation =
                    ScriptInvocation::new(self.ctx.project.package_manager, script.name());
                info!("Running {} {}", invocation.program(), invocation.args().join(" "));
                self.screen = Screen::Command(self.runner.run(&invocation));
            }
            MenuAction::PortManagement => {
                let ports = self.ports_of_interest();
                let pending_owners = Some(spawn_describe(self.ctx.probe.clone(), ports.clone()));
                self.screen = Screen::Ports(PortManager {
                    selection: Selection::new(ports.len() + 1),
                    ports,
                    owners: BTreeMap::new(),
                    pending_owners,
                    pending_kill: None,
                    status: None,
                });
            }
            MenuAction::ProcessMonitor => {
                let interval = Duration::from_secs(self.ctx.config.monitoring.poll_interval_secs);
                let monitor =
                    Monitor::start(self.ctx.probe.clone(), self.ports_of_interest(), interval);
                self.screen = Screen::Monitor(monitor);
            }
            MenuAction::ProjectInfo => {
                let pending = self.ctx.project.has_docker.then(|| {
                    let (tx, rx) = oneshot::channel();
                    tokio::spawn(async move {
                        let _ = tx.send(docker::status().await);
                    });
                    rx
                });
                self.screen = Screen::Info {
                    docker: None,
                    pending,
                };
            }
            MenuAction::Exit => self.exit = true,
        }
    }

    fn handle_key(&mut self, key: InputKey) {
        if key == InputKey::Interrupt {
            self.exit = true;
            return;
        }
        match &mut self.screen {
            Screen::Menu => match key {
                InputKey::Quit => self.exit = true,
                InputKey::Enter => {
                    if let Some(item) = self.menu.get(self.selection.index()) {
                        let action = item.action;
                        self.open(action);
                    }
                }
                other => {
                    self.selection.handle(other);
                }
            },
            Screen::Command(handle) => {
                // A running script only yields to ctrl-c
                if handle.current().is_finished() {
                    self.back_to_menu();
                }
            }
            Screen::Info { .. } | Screen::Monitor(_) => {
                if matches!(key, InputKey::Back | InputKey::Quit) {
                    self.back_to_menu();
                }
            }
            Screen::Ports(manager) => match key {
                InputKey::Back | InputKey::Quit => self.back_to_menu(),
                InputKey::Enter => match manager.selected_port() {
                    None => self.back_to_menu(),
                    Some(_) if manager.pending_kill.is_some() => {
                        debug!("Kill already in progress, ignoring");
                    }
                    Some(port) => {
                        manager.pending_kill = Some(spawn_kill(self.ctx.probe.clone(), port));
                    }
                },
                other => {
                    manager.selection.handle(other);
                }
            },
        }
    }

    /// Collect results of background work and expire transient state.
    fn poll_background(&mut self) {
        let now = Instant::now();
        let status_clear = Duration::from_millis(self.ctx.config.ports.status_clear_ms);
        match &mut self.screen {
            Screen::Command(handle) => {
                if let Some(code) = handle.try_completion() {
                    debug!("Script completed with {}, returning to menu", code);
                    self.back_to_menu();
                }
            }
            Screen::Info { docker, pending } => {
                if let Some(status) = take_ready(pending) {
                    *docker = Some(status);
                }
            }
            Screen::Ports(manager) => {
                if let Some(owners) = take_ready(&mut manager.pending_owners) {
                    manager.owners = owners;
                }
                if let Some(outcome) = take_ready(&mut manager.pending_kill) {
                    let message = kill_status_message(outcome.port, outcome.succeeded);
                    manager.status = Some((message, now + status_clear));
                    if outcome.succeeded {
                        manager.pending_owners = Some(spawn_describe(
                            self.ctx.probe.clone(),
                            manager.ports.clone(),
                        ));
                    }
                }
                if manager
                    .status
                    .as_ref()
                    .is_some_and(|(_, deadline)| now >= *deadline)
                {
                    manager.status = None;
                }
            }
            Screen::Menu | Screen::Monitor(_) => {}
        }
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let monitoring = &self.ctx.config.monitoring;
        match &self.screen {
            Screen::Menu => render::draw_menu(frame, &self.ctx.project, &self.menu, self.selection),
            Screen::Info { docker, .. } => {
                render::draw_info(frame, &self.ctx.project, docker.as_ref())
            }
            Screen::Command(handle) => render::draw_command(
                frame,
                &handle.current(),
                self.ctx.config.runner.output_window,
            ),
            Screen::Monitor(monitor) => render::draw_monitor(
                frame,
                &monitor.snapshot(),
                &monitoring.process_filter,
                monitoring.max_processes_shown,
            ),
            Screen::Ports(manager) => render::draw_ports(
                frame,
                &manager.rows(),
                manager.selection,
                manager.status_message(),
                manager.pending_kill.is_some(),
            ),
        }
    }
}

fn spawn_kill(probe: Arc<dyn SystemProbe>, port: u16) -> oneshot::Receiver<TerminationOutcome> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = kill_port(probe.as_ref(), port).await;
        let _ = tx.send(outcome);
    });
    rx
}

/// Command names of the processes listening on `ports`, where known.
fn spawn_describe(
    probe: Arc<dyn SystemProbe>,
    ports: Vec<u16>,
) -> oneshot::Receiver<BTreeMap<u16, String>> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let lookups = ports.iter().map(|port| probe.describe_listener(*port));
        let owners = join_all(lookups)
            .await
            .into_iter()
            .zip(ports.iter())
            .filter_map(|(record, port)| record.map(|record| (*port, record.command)))
            .collect();
        let _ = tx.send(owners);
    });
    rx
}

fn take_ready<T>(slot: &mut Option<oneshot::Receiver<T>>) -> Option<T> {
    let receiver = slot.as_mut()?;
    match receiver.try_recv() {
        Ok(value) => {
            *slot = None;
            Some(value)
        }
        Err(oneshot::error::TryRecvError::Empty) => None,
        Err(oneshot::error::TryRecvError::Closed) => {
            *slot = None;
            None
        }
    }
}
