//! Application orchestrator: wires config, actions and the tray together.

use std::path::PathBuf;
use std::sync::Arc;

use unishot_tray::{ConsoleBackend, Controller, TrayBackend, TrayConfig};

use crate::actions::{self, Actions};
use crate::config::{BackendKind, Config};
use crate::startup;

/// Runs the tray until the user quits.
pub fn run(config: Config, config_path: PathBuf) -> anyhow::Result<()> {
    let controller = Controller::global();
    controller.configure(TrayConfig {
        tooltip: config.tooltip.clone(),
        icon_path: config.icon_path.clone(),
    });

    // Login registration failures are not fatal.
    if let Err(e) = startup::apply(config.launch_on_startup) {
        tracing::warn!(error = %e, "could not update launch on startup");
    }

    let actions = Arc::new(Actions::new(
        config.screenshot_command.clone(),
        config.resolved_options_command(&config_path),
    ));

    let backend = select_backend(config.backend);
    controller
        .start(actions::handlers(&actions), backend)
        .map_err(|e| anyhow::anyhow!("tray failed ({:?}): {e}", e.host_kind()))
}

fn select_backend(kind: BackendKind) -> Box<dyn TrayBackend> {
    match kind {
        BackendKind::Console => Box::new(ConsoleBackend::stdin()),
        #[cfg(feature = "native")]
        BackendKind::Native => Box::new(unishot_tray::NativeBackend::new()),
        #[cfg(not(feature = "native"))]
        BackendKind::Native => {
            tracing::warn!("built without native tray support, using console");
            Box::new(ConsoleBackend::stdin())
        }
    }
}
