//! Line-driven tray for headless machines and development.
//!
//! Commands are read from a [`BufRead`] on a reader thread and pumped one per
//! loop step:
//! - `options` / `o`
//! - `click` / `c` / `screenshot` / `s` (icon click)
//! - `quit` / `q`
//! - `1`..`n`: activates the n-th menu entry
//!
//! End of input is treated as the platform closing the tray.

use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;

use crate::backend::{LoopSignal, LoopStep, TrayBackend};
use crate::controller::Trampoline;
use crate::error::BackendError;
use crate::menu::Activation;
use crate::tray::TrayIcon;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Activate(Activation),
    Item(usize),
    Unknown(String),
}

enum Input {
    Line(String),
    Wake,
    Closed,
}

fn parse_command(line: &str) -> Option<Command> {
    let word = line.trim().to_ascii_lowercase();
    if word.is_empty() {
        return None;
    }
    let command = match word.as_str() {
        "options" | "o" => Command::Activate(Activation::Options),
        "click" | "c" | "screenshot" | "s" => Command::Activate(Activation::Icon),
        "quit" | "q" => Command::Activate(Activation::Quit),
        other => match other.parse::<usize>() {
            Ok(n) if n > 0 => Command::Item(n - 1),
            _ => Command::Unknown(other.to_string()),
        },
    };
    Some(command)
}

type Reader = Box<dyn BufRead + Send>;

/// Tray backend driven by text commands.
pub struct ConsoleBackend {
    reader: Option<Reader>,
    tx: mpsc::Sender<Input>,
    rx: mpsc::Receiver<Input>,
    icon: Option<TrayIcon>,
    trampoline: Option<Trampoline>,
    signal: Option<LoopSignal>,
    closed: bool,
}

impl ConsoleBackend {
    /// Reads commands from standard input.
    ///
    /// The reader thread stays blocked on stdin after `teardown` and only
    /// exits once it reads another line and finds the backend gone. That one
    /// line is lost to a backend created afterwards, so a restarted tray may
    /// need its first command typed twice.
    pub fn stdin() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            reader: Some(Box::new(reader)),
            tx,
            rx,
            icon: None,
            trampoline: None,
            signal: None,
            closed: false,
        }
    }

    fn print_menu(icon: &TrayIcon) {
        println!("[{}] tray ready", icon.tooltip);
        for (i, item) in icon.menu.iter().enumerate() {
            if item.is_separator() {
                println!("  --");
            } else {
                println!("  {}. {}", i + 1, item.label);
            }
        }
        println!("  (click = icon click)");
    }

    fn handle(&self, command: Command) {
        let (Some(trampoline), Some(icon)) = (&self.trampoline, &self.icon) else {
            return;
        };
        match command {
            Command::Activate(target) => trampoline.activate(target),
            Command::Item(index) => match icon.menu.get(index) {
                Some(item) => trampoline.activate_item(item),
                None => tracing::warn!(index = index + 1, "no such menu entry"),
            },
            Command::Unknown(word) => tracing::warn!(%word, "unknown tray command"),
        }
    }
}

impl TrayBackend for ConsoleBackend {
    fn init(
        &mut self,
        icon: &TrayIcon,
        trampoline: Trampoline,
        signal: LoopSignal,
    ) -> Result<(), BackendError> {
        let mut reader = self
            .reader
            .take()
            .ok_or_else(|| BackendError::Platform("console backend already used".into()))?;

        let lines = self.tx.clone();
        thread::Builder::new()
            .name("unishot-console".into())
            .spawn(move || {
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => {
                            let _ = lines.send(Input::Closed);
                            break;
                        }
                        Ok(_) => {
                            if lines.send(Input::Line(line.clone())).is_err() {
                                break;
                            }
                        }
                    }
                }
            })?;

        let waker = self.tx.clone();
        signal.set_waker(move || {
            let _ = waker.send(Input::Wake);
        });

        Self::print_menu(icon);
        self.icon = Some(icon.clone());
        self.trampoline = Some(trampoline);
        self.signal = Some(signal);
        Ok(())
    }

    fn run_loop_step(&mut self, block: bool) -> LoopStep {
        let exit_requested = self
            .signal
            .as_ref()
            .is_none_or(LoopSignal::exit_requested);
        if exit_requested || self.closed {
            return LoopStep::Terminated;
        }

        let input = if block {
            self.rx.recv().unwrap_or(Input::Closed)
        } else {
            match self.rx.try_recv() {
                Ok(input) => input,
                Err(mpsc::TryRecvError::Empty) => return LoopStep::Continue,
                Err(mpsc::TryRecvError::Disconnected) => Input::Closed,
            }
        };

        match input {
            Input::Line(line) => {
                if let Some(command) = parse_command(&line) {
                    self.handle(command);
                }
            }
            Input::Wake => {}
            Input::Closed => {
                tracing::info!("console input closed");
                self.closed = true;
                return LoopStep::Terminated;
            }
        }
        LoopStep::Continue
    }

    fn update(&mut self, icon: &TrayIcon) -> Result<(), BackendError> {
        if self.icon.as_ref().map(|i| &i.tooltip) != Some(&icon.tooltip) {
            println!("[{}]", icon.tooltip);
        }
        self.icon = Some(icon.clone());
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.clear_waker();
        }
        self.trampoline = None;
        self.icon = None;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::controller::{Controller, ControllerState, Handlers};
    use crate::handler::HandlerRef;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> HandlerRef {
        let log = Arc::clone(log);
        HandlerRef::from_fn(name, move || log.lock().unwrap().push(name))
    }

    fn handlers(log: &Arc<Mutex<Vec<&'static str>>>) -> Handlers {
        Handlers::new(
            recorder(log, "screenshot"),
            recorder(log, "options"),
            recorder(log, "quit"),
        )
    }

    #[test]
    fn parse_commands() {
        assert_eq!(
            parse_command("Options\n"),
            Some(Command::Activate(Activation::Options))
        );
        assert_eq!(
            parse_command(" c "),
            Some(Command::Activate(Activation::Icon))
        );
        assert_eq!(parse_command("q"), Some(Command::Activate(Activation::Quit)));
        assert_eq!(parse_command("3"), Some(Command::Item(2)));
        assert_eq!(parse_command("0"), Some(Command::Unknown("0".into())));
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn console_session_dispatches_in_order() {
        let controller = Controller::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let input = Cursor::new("options\nclick\n2\nbogus\nquit\noptions\n");

        controller
            .start(handlers(&log), ConsoleBackend::from_reader(input))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["options", "screenshot", "quit"]);
        assert_eq!(controller.state(), ControllerState::Terminated);
    }

    #[test]
    fn menu_index_activation() {
        let controller = Controller::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let input = Cursor::new("1\n3\n");

        controller
            .start(handlers(&log), ConsoleBackend::from_reader(input))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["options", "quit"]);
    }

    #[test]
    fn end_of_input_terminates_without_quit() {
        let controller = Controller::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        controller
            .start(handlers(&log), ConsoleBackend::from_reader(Cursor::new("o\n")))
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["options"]);
        assert_eq!(controller.state(), ControllerState::Terminated);
    }

    /// Endless `q` lines; reports on the channel when the reader is dropped.
    struct EndlessQuit(mpsc::Sender<()>);

    impl io::Read for EndlessQuit {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let line = b"q\n";
            let n = line.len().min(buf.len());
            buf[..n].copy_from_slice(&line[..n]);
            Ok(n)
        }
    }

    impl Drop for EndlessQuit {
        fn drop(&mut self) {
            let _ = self.0.send(());
        }
    }

    #[test]
    fn reader_thread_exits_after_backend_is_dropped() {
        let controller = Controller::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (dropped_tx, dropped_rx) = mpsc::channel();
        let backend = ConsoleBackend::from_reader(io::BufReader::new(EndlessQuit(dropped_tx)));

        controller.start(handlers(&log), backend).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["quit"]);
        dropped_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("reader thread still running");
    }

    #[test]
    fn backend_cannot_be_initialized_twice() {
        let controller = Controller::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut backend = ConsoleBackend::from_reader(Cursor::new(""));
        controller.start(handlers(&log), &mut backend).unwrap();

        let err = controller.start(handlers(&log), &mut backend).unwrap_err();
        assert!(matches!(err, crate::TrayError::Init(BackendError::Platform(_))));
    }
}
