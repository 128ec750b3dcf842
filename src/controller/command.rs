//! Template-driven controller (pm2 by default).
//!
//! Each template is an argument vector; every `{name}` occurrence is
//! replaced with the process name. The first element is the program.

use async_trait::async_trait;
use tracing::info;

use super::{run_program, validate_process_name, ControllerError, ProcessController};

/// Placeholder substituted with the process name.
const NAME_PLACEHOLDER: &str = "{name}";

/// Restarts processes by running a configured command.
#[derive(Debug, Clone)]
pub struct CommandController {
    restart: Vec<String>,
    heap_dump: Option<Vec<String>>,
}

impl CommandController {
    /// Create a controller from restart and optional heap-dump templates.
    pub fn new(restart: Vec<String>, heap_dump: Option<Vec<String>>) -> Self {
        Self { restart, heap_dump }
    }

    /// Render a template for a process name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the template is empty.
    pub fn render(template: &[String], name: &str) -> Result<Vec<String>, ControllerError> {
        validate_process_name(name)?;
        if template.is_empty() {
            return Err(ControllerError::Spawn {
                program: String::new(),
                reason: "empty command template".to_owned(),
            });
        }
        Ok(template
            .iter()
            .map(|part| part.replace(NAME_PLACEHOLDER, name))
            .collect())
    }

    async fn run_template(template: &[String], name: &str) -> Result<String, ControllerError> {
        let argv = Self::render(template, name)?;
        let (program, args) = argv.split_first().ok_or_else(|| ControllerError::Spawn {
            program: String::new(),
            reason: "empty command template".to_owned(),
        })?;
        info!(program = %program, process = %name, "running controller command");
        run_program(program, args).await
    }
}

#[async_trait]
impl ProcessController for CommandController {
    async fn restart(&self, name: &str) -> Result<String, ControllerError> {
        Self::run_template(&self.restart, name).await
    }

    async fn heap_dump(&self, name: &str) -> Result<String, ControllerError> {
        match &self.heap_dump {
            Some(template) => Self::run_template(template, name).await,
            None => Err(ControllerError::Unsupported(self.kind())),
        }
    }

    fn kind(&self) -> &'static str {
        "command"
    }
}
