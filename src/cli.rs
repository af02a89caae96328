use std::path::PathBuf;

#[derive(clap::Parser)]
pub struct Cli {
    #[arg(
        long = "stderr-log-level",
        value_name = "LEVEL",
        value_enum,
        help = "Maximum stderr log level (warn by default)"
    )]
    pub stderr_log_level: Option<LogLevel>,
    #[arg(
        long = "log-file",
        value_name = "PATH",
        help = "File to write logs (besides stderr)"
    )]
    pub log_file: Option<PathBuf>,
    #[arg(
        long = "file-log-level",
        value_name = "LEVEL",
        value_enum,
        help = "Maximum file log level (debug by default)"
    )]
    pub file_log_level: Option<LogLevel>,
    #[arg(
        long = "repo",
        short = 'r',
        value_name = "PATH",
        help = "Repository the dump was generated from; used to pull untangled content \
                (mandatory unless scanning)"
    )]
    pub repo: Option<PathBuf>,
    #[arg(
        long = "output",
        short = 'o',
        value_name = "PATH",
        help = "Output dump file (standard output by default)"
    )]
    pub output: Option<PathBuf>,
    #[arg(
        long = "keep-empty-revs",
        short = 'k',
        help = "Keep revisions left without any node records instead of dropping them"
    )]
    pub keep_empty_revs: bool,
    #[arg(
        long = "stop-renumber-revs",
        short = 's',
        help = "Don't renumber the revisions that remain after filtering (requires -k)"
    )]
    pub stop_renumber: bool,
    #[arg(
        long = "strip-mergeinfo",
        short = 'x',
        help = "Remove svn:mergeinfo properties"
    )]
    pub strip_mergeinfo: bool,
    #[arg(
        long = "file",
        value_name = "PATH",
        help = "Read paths to match from a file, one per line"
    )]
    pub paths_file: Option<PathBuf>,
    #[arg(
        long = "scan",
        help = "Only report which nodes would need untangling, without writing a dump"
    )]
    pub scan: bool,
    #[arg(
        long = "start-revision",
        value_name = "N",
        help = "Begin emitting at input revision N; earlier revisions only feed the \
                renumbering bookkeeping"
    )]
    pub start_revision: Option<u32>,
    #[arg(value_name = "INPUT_DUMP", help = "Input dump file or repository directory")]
    pub input: PathBuf,
    #[arg(value_enum, value_name = "SUBCOMMAND")]
    pub subcommand: Subcommand,
    #[arg(value_name = "PATH", help = "Paths to include or exclude")]
    pub paths: Vec<String>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub enum Subcommand {
    #[value(name = "include")]
    Include,
    #[value(name = "exclude")]
    Exclude,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl LogLevel {
    pub fn to_log_level_filter(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}
