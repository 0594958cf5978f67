use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, error};

use crate::model::{InputKey, UserEvent};

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Background reader for terminal events. Stops when dropped.
pub struct InputListener {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for InputListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Forward key presses and resizes to `tx` from a dedicated thread, so the
/// UI tick only ever drains a channel.
pub fn spawn_input_listener(tx: Sender<UserEvent>) -> InputListener {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let handle = thread::spawn(move || {
        while !flag.load(Ordering::Relaxed) {
            match event::poll(INPUT_POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    error!("Terminal event poll failed: {}", e);
                    break;
                }
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    Some(UserEvent::Key(map_key(&key)))
                }
                Ok(Event::Resize(_, _)) => Some(UserEvent::Resize),
                Ok(_) => None,
                Err(e) => {
                    error!("Terminal event read failed: {}", e);
                    break;
                }
            };
            if let Some(event) = forwarded
                && tx.send(event).is_err()
            {
                break;
            }
        }
        debug!("Input listener exiting");
    });
    InputListener {
        stop,
        handle: Some(handle),
    }
}

pub fn map_key(key: &KeyEvent) -> InputKey {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return InputKey::Interrupt;
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => InputKey::Up,
        KeyCode::Down | KeyCode::Char('j') => InputKey::Down,
        KeyCode::Enter => InputKey::Enter,
        KeyCode::Esc | KeyCode::Backspace => InputKey::Back,
        KeyCode::Char('q') => InputKey::Quit,
        _ => InputKey::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_navigation_keys() {
        assert_eq!(map_key(&key(KeyCode::Up)), InputKey::Up);
        assert_eq!(map_key(&key(KeyCode::Char('j'))), InputKey::Down);
        assert_eq!(map_key(&key(KeyCode::Enter)), InputKey::Enter);
        assert_eq!(map_key(&key(KeyCode::Esc)), InputKey::Back);
        assert_eq!(map_key(&key(KeyCode::Char('q'))), InputKey::Quit);
        assert_eq!(map_key(&key(KeyCode::Char('x'))), InputKey::Other);
    }

    #[test]
    fn ctrl_c_interrupts() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(&ctrl_c), InputKey::Interrupt);
        assert_eq!(map_key(&key(KeyCode::Char('c'))), InputKey::Other);
    }
}
