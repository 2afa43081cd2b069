use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Additional configuration file, merged over the system-wide one.
    #[arg(long, short = 'c', env = "MYBACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Destination directory for produced archives, overriding the configured one.
    #[arg(long, short = 'r')]
    pub backup_dir: Option<PathBuf>,
}
