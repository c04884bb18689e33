use crate::error::CampaignSqlResult;
use crate::value::SqlValue;
use minijinja::{path_loader, AutoEscape, Environment, UndefinedBehavior};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Values available to the template, keyed by variable name
pub type RenderParams = BTreeMap<String, SqlValue>;

/// A SQL file template loaded from a template directory
///
/// Templates use jinja2 syntax. Every variable the template references must be
/// present in the parameters; an undefined variable is a render error rather
/// than an empty string.
#[derive(Debug, Clone)]
pub struct SqlTemplate {
    template_dir: PathBuf,
    template_name: String,
}

impl SqlTemplate {
    /// Create a template handle; nothing is read until [`SqlTemplate::compile`]
    #[must_use]
    pub fn new(template_dir: impl Into<PathBuf>, template_name: impl Into<String>) -> Self {
        Self {
            template_dir: template_dir.into(),
            template_name: template_name.into(),
        }
    }

    /// Render the template against `params` and return UTF-8 bytes
    ///
    /// # Errors
    ///
    /// Returns a template error if the file is missing or unreadable, has a
    /// syntax error, or references a variable not present in `params`
    pub fn compile(&self, params: &RenderParams) -> CampaignSqlResult<Vec<u8>> {
        debug!(
            "Rendering template {} from {} with {} parameters",
            self.template_name,
            self.template_dir.display(),
            params.len()
        );

        let mut env = Environment::new();
        env.set_loader(path_loader(&self.template_dir));
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        let rendered = env.get_template(&self.template_name)?.render(params)?;

        Ok(rendered.into_bytes())
    }
}
