use std::process::ExitCode;

use clap::Parser;

use mybackup_lib::backup::BackupRun;
use mybackup_lib::cli::Cli;
use mybackup_lib::config::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref(), cli.backup_dir);

    // init logger; the CLI flag wins over the configured verbosity
    let mut env_logger = env_logger::builder();
    let level = cli
        .verbose
        .or_else(|| config.as_ref().ok().and_then(Config::level_filter));
    if let Some(level) = level {
        env_logger.filter_level(level);
    }
    if let Ok(config) = &config {
        if config.syslog {
            // the capturing stream (journald, cron mailer) does its own stamping
            env_logger.format_timestamp(None).format_target(false);
        }
    }
    env_logger.try_init().expect("env_logger should not fail");

    let config = match config {
        Ok(config) => config,
        Err(error) => {
            log::error!("Reading the configuration failed: {error}");
            return ExitCode::FAILURE;
        }
    };

    match BackupRun::new(config).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("Backup run failed: {error}");
            ExitCode::FAILURE
        }
    }
}
