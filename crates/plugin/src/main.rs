#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use bc_plugin::logging::{LogFormat, init_logging};
use bc_plugin::serve::{ServeOutcome, serve};
use bc_plugin::{BallotPlugin, PluginDriver, PluginError};
use bc_storage::{
    CACHE_VERSION, CacheConfig, DEFAULT_BUILD_BATCH_SIZE, DEFAULT_PLUGIN_ID, SqliteCache,
};
use clap::Parser;

/// `EX_SOFTWARE`: the cache is out of sync and must not keep serving.
const EXIT_UNRECOVERABLE: u8 = 70;

#[derive(Parser, Debug)]
#[command(
    name = "bc_cache",
    version,
    about = "Ballot plugin cache, served as newline-delimited JSON over stdio"
)]
struct Cli {
    /// Directory holding the cache database.
    #[arg(long, default_value = "./ballot_cache", env = "BALLOT_CACHE_DIR")]
    cache_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_PLUGIN_ID, env = "BALLOT_PLUGIN_ID")]
    plugin_id: String,

    /// Expected cache layout version. A stored record with any other value forces a rebuild.
    #[arg(long, default_value = CACHE_VERSION, env = "BALLOT_PLUGIN_VERSION")]
    plugin_version: String,

    /// Rows per transaction while replaying a snapshot.
    #[arg(long, default_value_t = DEFAULT_BUILD_BATCH_SIZE, env = "BALLOT_BUILD_BATCH")]
    build_batch: usize,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "BALLOT_LOG_LEVEL")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Human, env = "BALLOT_LOG_FORMAT")]
    log_format: LogFormat,

    /// Serve commands without a verified version record.
    #[arg(long, env = "BALLOT_NO_VERSION_CHECK")]
    no_version_check: bool,

    /// Rebuild from this inventory snapshot before serving.
    #[arg(long, value_name = "FILE")]
    inventory: Option<PathBuf>,

    /// Create the plugin tables and version record for a fresh deployment.
    #[arg(long)]
    setup: bool,
}

impl Cli {
    fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig {
            plugin_id: self.plugin_id.clone(),
            ..CacheConfig::default()
        }
        .with_plugin_version(self.plugin_version.clone())
        .with_build_batch_size(self.build_batch);
        if self.no_version_check {
            config = config.without_version_check();
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_format, &cli.log_level) {
        eprintln!("bc_cache: logging setup failed: {err}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(ServeOutcome::Eof) => ExitCode::SUCCESS,
        Ok(ServeOutcome::Fatal) => ExitCode::from(EXIT_UNRECOVERABLE),
        Err(err) if err.is_fatal() => {
            tracing::error!(error = %err, "refusing to serve an out-of-sync cache");
            ExitCode::from(EXIT_UNRECOVERABLE)
        }
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "bc_cache failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ServeOutcome, PluginError> {
    let store = SqliteCache::open(&cli.cache_dir, cli.cache_config())?;
    tracing::info!(
        cache_dir = %store.storage_dir().display(),
        plugin_id = %cli.plugin_id,
        version = %cli.plugin_version,
        "cache opened"
    );
    let plugin = BallotPlugin::new(store);

    if cli.setup {
        plugin.setup()?;
    }

    if let Some(path) = &cli.inventory {
        let inventory = std::fs::read_to_string(path).map_err(bc_storage::StoreError::from)?;
        plugin.build(&inventory)?;
    } else if let Err(err) = plugin.check_version() {
        if !err.needs_rebuild() {
            return Err(err);
        }
        tracing::warn!(error = %err, "cache needs a rebuild; send a build frame");
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(&plugin, stdin.lock(), stdout.lock())
        .map_err(|err| PluginError::Store(bc_storage::StoreError::Io(err)))
}
