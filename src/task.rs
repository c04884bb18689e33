use crate::campaign::CampaignRepository;
use crate::config::Config;
use crate::error::{CampaignSqlError, CampaignSqlResult};
use crate::executor::{MySqlExecutor, QueryExecutor};
use crate::template::{RenderParams, SqlTemplate};
use crate::value::SqlValue;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::{debug, info};

/// Directory (under the working directory) that receives rendered SQL files
pub const OUTPUT_DIR: &str = "sql";

/// Line written before and after the rendered SQL when it is logged
pub const LOG_SEPARATOR: &str =
    "**********************************************************************";

/// The SQL file a task run rendered and wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Whether a task whose output is `output_path` has already run
///
/// Completion is marked solely by the existence of the output file.
#[must_use]
pub fn is_complete(output_path: &Path) -> bool {
    output_path.exists()
}

/// Whether a run should go ahead given its output path and the force flag
#[must_use]
pub fn should_run(output_path: &Path, force: bool) -> bool {
    force || !is_complete(output_path)
}

/// Output path for `campaign_name` under `work_dir`
#[must_use]
pub fn output_path(work_dir: &Path, campaign_name: &str) -> PathBuf {
    work_dir.join(OUTPUT_DIR).join(campaign_name)
}

/// Render the SQL file for one campaign
///
/// Looks the campaign up, merges its fields with the configured extra
/// variables, renders the template and writes `sql/<campaign_name>`.
pub struct CampaignSqlTask<E> {
    config: Config,
    repository: CampaignRepository<E>,
    template: SqlTemplate,
}

impl CampaignSqlTask<MySqlExecutor> {
    /// Create a task that reads from the MySQL database named in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails
    pub fn new(config: Config) -> CampaignSqlResult<Self> {
        let executor = MySqlExecutor::from_config(&config);
        Self::with_executor(config, executor)
    }
}

impl<E: QueryExecutor> CampaignSqlTask<E> {
    /// Create a task that runs its campaign lookup through `executor`
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails
    pub fn with_executor(config: Config, executor: E) -> CampaignSqlResult<Self> {
        config
            .validate()
            .map_err(|e| CampaignSqlError::InvalidConfig(e.to_string()))?;

        let template =
            SqlTemplate::new(config.template_dir.clone(), config.template_name.clone());

        Ok(Self {
            config,
            repository: CampaignRepository::new(executor),
            template,
        })
    }

    /// Path this task writes to
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        output_path(&self.config.work_dir, &self.config.campaign_name)
    }

    /// Run the task
    ///
    /// Always queries, renders and writes; an existing output file is
    /// replaced. Nothing is written unless the lookup and render both succeed.
    ///
    /// # Errors
    ///
    /// Returns `CampaignNotFound`, the database error, the template error, or
    /// the IO error that stopped the run. Nothing is retried.
    pub async fn run(&self) -> CampaignSqlResult<TaskOutcome> {
        let path = self.output_path();

        let campaign = self
            .repository
            .find_by_name(&self.config.campaign_name)
            .await?;
        info!(
            "Found campaign '{}' ({} to {})",
            campaign.name, campaign.start_dt, campaign.end_dt
        );

        let params = merge_params(campaign.into_params(), &self.config.vars);
        let rendered = self.template.compile(&params)?;

        write_output(&path, &rendered)?;
        info!("Wrote {} bytes to {}", rendered.len(), path.display());

        if self.config.print_sql {
            log_rendered(&rendered);
        }

        Ok(TaskOutcome {
            path,
            bytes: rendered.len(),
        })
    }
}

/// Merge extra variables over the campaign's fields; later keys win
fn merge_params(mut params: RenderParams, extra: &[(String, String)]) -> RenderParams {
    for (key, value) in extra {
        if params.contains_key(key) {
            debug!("Template variable '{}' overrides a campaign field", key);
        }
        params.insert(key.clone(), SqlValue::Text(value.clone()));
    }
    params
}

/// Write `contents` to `path` through a temp file in the same directory
///
/// The file only appears under its final name once fully written; a failure
/// part-way leaves any previous file untouched. The file gets the mode a
/// plain create would, 0666 less the umask.
fn write_output(path: &Path, contents: &[u8]) -> CampaignSqlResult<()> {
    let dir = path.parent().ok_or_else(|| {
        CampaignSqlError::InvalidConfig(format!("{} has no parent directory", path.display()))
    })?;
    std::fs::create_dir_all(dir)?;

    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut file = builder.tempfile_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path).map_err(|e| CampaignSqlError::Io(e.error))?;

    Ok(())
}

fn log_rendered(rendered: &[u8]) {
    info!("{}", LOG_SEPARATOR);
    info!("{}", String::from_utf8_lossy(rendered));
    info!("{}", LOG_SEPARATOR);
}
