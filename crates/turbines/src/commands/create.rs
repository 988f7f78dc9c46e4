//! `turbines create` command implementation.

use std::path::PathBuf;

use clap::Args;
use turbines_site::scaffold;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the create command.
#[derive(Args)]
pub(crate) struct CreateArgs {
    /// Directory to create the project in.
    path: PathBuf,
}

impl CreateArgs {
    /// Execute the create command.
    ///
    /// # Errors
    ///
    /// Returns an error if a starter file cannot be written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let created = scaffold(&self.path)?;
        if created.is_empty() {
            output.warning(&format!(
                "Nothing to create: {} already contains a project",
                self.path.display()
            ));
            return Ok(());
        }

        for file in &created {
            output.created(file);
        }
        output.success(&format!("Project created in {}", self.path.display()));
        output.link("next", format!("cd {} && turbines serve", self.path.display()));
        Ok(())
    }
}
