//! Compiled-in command plugins.
//!
//! Plugins are registered statically; each one owns a `plugin.<name>`
//! configuration section and a CLI sub-command.

pub mod bill_teams;

use serde_yaml_ng::Mapping;

/// A CLI sub-command shipped with the binary.
pub trait CommandPlugin: Send + Sync {
    /// Configuration key and command name (snake_case).
    fn name(&self) -> &'static str;

    fn about(&self) -> &'static str;

    /// Check the plugin's configuration section. Returns warnings.
    fn validate_config(&self, section: &Mapping) -> Vec<String>;

    /// Command name as typed on the command line.
    fn command_name(&self) -> String {
        self.name().replace('_', "-")
    }
}

static PLUGINS: &[&dyn CommandPlugin] = &[&bill_teams::BillTeams];

/// Every compiled-in plugin.
pub fn registry() -> &'static [&'static dyn CommandPlugin] {
    PLUGINS
}

/// Look a plugin up by configuration name or command name.
pub fn find(name: &str) -> Option<&'static dyn CommandPlugin> {
    PLUGINS
        .iter()
        .copied()
        .find(|p| p.name() == name || p.command_name() == name)
}
