//! systemd user-unit controller.
//!
//! Restarts `<name>.service` via `systemctl --user restart`. Unit names are
//! derived from the target name with spaces replaced by dashes.

use async_trait::async_trait;
use tracing::info;

use super::{run_program, validate_process_name, ControllerError, ProcessController};

/// Restarts processes managed as systemd user units.
#[derive(Debug, Clone, Default)]
pub struct SystemdController;

impl SystemdController {
    /// Create a systemd controller.
    pub fn new() -> Self {
        Self
    }

    /// Unit file name for a process name (`"Local API"` → `local-api.service`).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn unit_name(name: &str) -> Result<String, ControllerError> {
        validate_process_name(name)?;
        let unit = name.trim().to_ascii_lowercase().replace(' ', "-");
        if unit.ends_with(".service") {
            Ok(unit)
        } else {
            Ok(format!("{unit}.service"))
        }
    }
}

#[async_trait]
impl ProcessController for SystemdController {
    async fn restart(&self, name: &str) -> Result<String, ControllerError> {
        let unit = Self::unit_name(name)?;
        info!(unit = %unit, "restarting systemd unit");
        run_program(
            "systemctl",
            &["--user".to_owned(), "restart".to_owned(), unit],
        )
        .await
    }

    fn kind(&self) -> &'static str {
        "systemd"
    }
}
