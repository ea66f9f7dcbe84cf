//! Host-side handlers for the tray actions.
//!
//! Screenshots and options run as separate processes. Only one capture runs
//! at a time; clicks that arrive while one is in progress are ignored.
//! Finished options processes are reaped on every click and on quit.

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};

use unishot_tray::{FnHandler, HandlerError, HandlerRef, Handlers};

/// Process launcher behind the tray handlers.
pub struct Actions {
    screenshot_command: Vec<String>,
    options_command: Vec<String>,
    capture: Mutex<Option<Child>>,
    options: Mutex<Vec<Child>>,
}

impl Actions {
    pub fn new(screenshot_command: Vec<String>, options_command: Vec<String>) -> Self {
        Self {
            screenshot_command,
            options_command,
            capture: Mutex::new(None),
            options: Mutex::new(Vec::new()),
        }
    }

    /// Starts a capture unless one is still running.
    pub fn screenshot(&self) -> Result<(), HandlerError> {
        let mut capture = self.capture.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(child) = capture.as_mut() {
            if let Ok(None) = child.try_wait() {
                tracing::info!(pid = child.id(), "capture already in progress");
                return Ok(());
            }
        }

        let child = spawn(&self.screenshot_command)?;
        tracing::info!(pid = child.id(), "capture started");
        *capture = Some(child);
        Ok(())
    }

    pub fn options(&self) -> Result<(), HandlerError> {
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        reap(&mut options);
        let child = spawn(&self.options_command)?;
        tracing::info!(pid = child.id(), "options opened");
        options.push(child);
        Ok(())
    }

    /// Collects finished options processes. Returns how many are still open.
    pub fn reap_options(&self) -> usize {
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        reap(&mut options);
        options.len()
    }

    /// Stops a capture that is still running.
    pub fn quit(&self) -> Result<(), HandlerError> {
        tracing::info!("quit requested via tray");
        let child = self
            .capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut child) = child {
            if let Ok(None) = child.try_wait() {
                let pid = child.id();
                tracing::debug!(pid, "stopping capture");
                if let Err(e) = child.kill() {
                    tracing::warn!(pid, error = %e, "failed to stop capture");
                }
                if let Err(e) = child.wait() {
                    tracing::warn!(pid, error = %e, "failed to wait for capture");
                }
            }
        }

        let open = self.reap_options();
        if open > 0 {
            tracing::debug!(open, "options windows left open");
        }
        Ok(())
    }

    fn capture_pid(&self) -> Option<u32> {
        self.capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Child::id)
    }
}

/// Wraps the actions as tray handlers.
pub fn handlers(actions: &Arc<Actions>) -> Handlers {
    let screenshot = Arc::clone(actions);
    let options = Arc::clone(actions);
    let quit = Arc::clone(actions);
    Handlers::new(
        HandlerRef::new(FnHandler::new("screenshot", move || screenshot.screenshot())),
        HandlerRef::new(FnHandler::new("options", move || options.options())),
        HandlerRef::new(FnHandler::new("quit", move || quit.quit())),
    )
}

/// Drops children that have exited, waiting on them so none linger as zombies.
fn reap(children: &mut Vec<Child>) {
    children.retain_mut(|child| match child.try_wait() {
        Ok(Some(status)) => {
            tracing::debug!(pid = child.id(), %status, "options closed");
            false
        }
        Ok(None) => true,
        Err(e) => {
            tracing::warn!(pid = child.id(), error = %e, "failed to poll options process");
            false
        }
    });
}

fn spawn(argv: &[String]) -> Result<Child, HandlerError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(HandlerError::Raised("no command configured".into()));
    };
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| HandlerError::Raised(format!("failed to run {program}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_command_is_an_error() {
        let actions = Actions::new(Vec::new(), Vec::new());
        assert_eq!(
            actions.screenshot(),
            Err(HandlerError::Raised("no command configured".into()))
        );
        assert!(actions.options().is_err());
    }

    #[test]
    fn missing_program_is_an_error() {
        let actions = Actions::new(argv(&["/nonexistent/unishot-capture"]), Vec::new());
        match actions.screenshot() {
            Err(HandlerError::Raised(msg)) => assert!(msg.contains("failed to run")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(actions.capture_pid().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn second_capture_is_ignored_while_running() {
        let actions = Actions::new(argv(&["sleep", "5"]), Vec::new());
        actions.screenshot().unwrap();
        let first = actions.capture_pid().unwrap();

        actions.screenshot().unwrap();
        assert_eq!(actions.capture_pid(), Some(first));

        actions.quit().unwrap();
        assert!(actions.capture_pid().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn finished_capture_allows_a_new_one() {
        let actions = Actions::new(argv(&["true"]), argv(&["true"]));
        actions.screenshot().unwrap();
        let first = actions.capture_pid().unwrap();

        // Wait for the first capture to exit before clicking again.
        {
            let mut capture = actions.capture.lock().unwrap();
            capture.as_mut().unwrap().wait().unwrap();
        }

        actions.screenshot().unwrap();
        assert_ne!(actions.capture_pid(), Some(first));
        actions.options().unwrap();
        actions.quit().unwrap();
    }

    /// Whether `pid` is an unreaped child of this process.
    #[cfg(target_os = "linux")]
    fn is_zombie(pid: u32) -> bool {
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
            return false;
        };
        // Fields after the parenthesised command: state, ppid, ...
        let Some((_, rest)) = stat.rsplit_once(')') else {
            return false;
        };
        let mut fields = rest.split_whitespace();
        let state = fields.next();
        let ppid = fields.next().and_then(|p| p.parse::<u32>().ok());
        state == Some("Z") && ppid == Some(std::process::id())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn finished_options_are_reaped() {
        let actions = Actions::new(Vec::new(), argv(&["true"]));
        for _ in 0..5 {
            actions.options().unwrap();
        }
        let pids: Vec<u32> = actions
            .options
            .lock()
            .unwrap()
            .iter()
            .map(Child::id)
            .collect();
        assert!(!pids.is_empty());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while actions.reap_options() > 0 {
            assert!(std::time::Instant::now() < deadline, "options never exited");
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        for pid in pids {
            assert!(!is_zombie(pid), "pid {pid} left as a zombie");
        }
    }

    #[cfg(unix)]
    #[test]
    fn quit_reaps_finished_options() {
        let actions = Actions::new(Vec::new(), argv(&["true"]));
        actions.options().unwrap();
        {
            let mut options = actions.options.lock().unwrap();
            options[0].wait().unwrap();
        }
        actions.quit().unwrap();
        assert!(actions.options.lock().unwrap().is_empty());
    }

    #[test]
    fn handlers_are_callable() {
        let actions = Arc::new(Actions::new(Vec::new(), Vec::new()));
        let handlers = handlers(&actions);
        assert!(handlers.screenshot.is_callable());
        assert_eq!(handlers.options.describe(), "options");
        assert!(handlers.quit.invoke().is_ok());
        assert!(handlers.icon.is_none());
    }
}
