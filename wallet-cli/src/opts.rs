pub use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

use tracing::Level as LevelFilter;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbose(u8);
impl Verbose {
    pub fn to_log(&self) -> LevelFilter {
        match self.0 {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _more => LevelFilter::TRACE,
        }
    }
    pub fn isdebug(&self) -> bool {
        self.0 > 0
    }
}

impl Cli {
    pub fn verbose(&self) -> Verbose {
        let v = match &self.command {
            Commands::Show(c) => c.verbose,
            Commands::Unit(c) => c.verbose,
            Commands::Proofs(c) => c.verbose,
            Commands::Backup(c) => c.verbose,
            Commands::Restore(c) => c.verbose,
        };
        Verbose(v)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show mints, balances and the active mint/unit
    Show(ShowOpts),
    /// Activate or cycle the active unit
    Unit(UnitOpts),
    /// Add or remove proofs from a json file
    Proofs(ProofsOpts),
    /// Export every persisted slot
    Backup(BackupOpts),
    /// Overwrite the persisted slots from a backup
    Restore(RestoreOpts),
}

#[derive(Args, Debug, Clone)]
pub struct ShowOpts {
    #[clap(short, long, default_value = "mints.redb", help = "The path of databse")]
    pub database: String,
    #[arg(
            long,
            short = 'v',
            action = clap::ArgAction::Count,
            global = true,
            help = "Loglevel: -v(Info), -vv(Debug), -vvv+(Trace)"
        )]
    pub verbose: u8,
    #[clap(short, long, help = "show proofs")]
    pub proofs: bool,
    #[clap(short, long, help = "show spent proofs")]
    pub spent: bool,
    #[clap(short, long, help = "show keysets of every mint")]
    pub keysets: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UnitOpts {
    #[clap(short, long, default_value = "mints.redb", help = "The path of databse")]
    pub database: String,
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Loglevel: -v(Info), -vv(Debug), -vvv+(Trace)"
    )]
    pub verbose: u8,
    #[clap(
        short,
        long,
        default_value = "",
        help = "The url of mint, activate it first"
    )]
    pub mint: String,
    #[clap(value_parser, help = "unit to activate, empty to cycle to the next one")]
    pub unit: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ProofsOpts {
    #[clap(short, long, default_value = "mints.redb", help = "The path of databse")]
    pub database: String,
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Loglevel: -v(Info), -vv(Debug), -vvv+(Trace)"
    )]
    pub verbose: u8,
    #[clap(short, long, help = "mark the proofs spent instead of adding them")]
    pub remove: bool,
    #[clap(value_parser, help = "json file of a proof array")]
    pub file: String,
}

#[derive(Args, Debug, Clone)]
pub struct BackupOpts {
    #[clap(short, long, default_value = "mints.redb", help = "The path of databse")]
    pub database: String,
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Loglevel: -v(Info), -vv(Debug), -vvv+(Trace)"
    )]
    pub verbose: u8,
    #[clap(short, long, default_value = "-", help = "output file, - for stdout")]
    pub output: String,
    #[clap(short, long, help = "base64 encode the json")]
    pub base64: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreOpts {
    #[clap(short, long, default_value = "mints.redb", help = "The path of databse")]
    pub database: String,
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Loglevel: -v(Info), -vv(Debug), -vvv+(Trace)"
    )]
    pub verbose: u8,
    #[clap(value_parser, help = "backup file, json or base64 encoded json")]
    pub input: String,
}
