use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum length for a campaign name (it becomes a file name)
const MAX_CAMPAIGN_NAME_LEN: usize = 255;

/// campaign-sql - render a campaign's SQL file from its database record
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Name of the campaign to look up
    #[arg(short = 'c', long, env = "CAMPAIGN_NAME")]
    pub campaign_name: String,

    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "127.0.0.1")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value = "3306")]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "root")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    /// Database (schema) name
    #[arg(long, env = "DB_NAME", default_value = "campaigns")]
    pub db_name: String,

    /// Connection timeout in seconds
    #[arg(long, env = "DB_CONNECT_TIMEOUT", default_value = "30")]
    pub connect_timeout: u64,

    /// Directory containing the SQL template
    #[arg(long, env = "TEMPLATE_DIR", default_value = "templates")]
    pub template_dir: PathBuf,

    /// Template file name, relative to the template directory
    #[arg(long, env = "TEMPLATE_NAME", default_value = "campaign.sql.j2")]
    pub template_name: String,

    /// Working directory; output goes to `<work-dir>/sql/<campaign-name>`
    #[arg(long, env = "WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Also write the rendered SQL to the log
    #[arg(long, env = "PRINT_SQL")]
    pub print_sql: bool,

    /// Extra template variable, as KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_template_var)]
    pub vars: Vec<(String, String)>,

    /// Render even if the output file already exists
    #[arg(long)]
    pub force: bool,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_campaign_name(&self.campaign_name)?;

        if self.db_host.is_empty() {
            anyhow::bail!("Database host cannot be empty");
        }

        if self.db_user.is_empty() {
            anyhow::bail!("Database user cannot be empty");
        }

        if self.db_name.is_empty() {
            anyhow::bail!("Database name cannot be empty");
        }

        if self.connect_timeout == 0 {
            anyhow::bail!("Connection timeout must be greater than 0");
        }

        if self.template_name.is_empty() {
            anyhow::bail!("Template name cannot be empty");
        }

        for (key, _) in &self.vars {
            validate_var_name(key)?;
        }

        Ok(())
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// Validate campaign name format
///
/// The name is used verbatim as the output file name, so anything that could
/// escape the `sql/` directory is rejected.
pub fn validate_campaign_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("Campaign name cannot be empty");
    }

    if name.len() > MAX_CAMPAIGN_NAME_LEN {
        anyhow::bail!("Campaign name cannot exceed {MAX_CAMPAIGN_NAME_LEN} bytes");
    }

    if name.chars().any(char::is_control) {
        anyhow::bail!("Campaign name contains invalid characters");
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") {
        anyhow::bail!("Campaign name cannot contain path separators");
    }

    if name.starts_with('.') {
        anyhow::bail!("Campaign name cannot start with '.'");
    }

    Ok(())
}

/// Validate a template variable name
pub fn validate_var_name(name: &str) -> anyhow::Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!(
            "Template variable '{name}' must start with a letter or underscore and contain only alphanumeric characters and underscores"
        );
    }
    Ok(())
}

/// Parse a `KEY=VALUE` template variable
pub fn parse_template_var(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid KEY=VALUE: no '=' found in '{raw}'"))?;

    validate_var_name(key)?;

    Ok((key.to_string(), value.to_string()))
}
