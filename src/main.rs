#![warn(
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_qualifications
)]

use std::io::Write as _;
use std::process::ExitCode;

use svncarve::filter::matcher::{MatchMode, PathMatcher};
use svncarve::svn::source::DumpSource;
use svncarve::{cli, filter, paths_file, probe};

enum RunError {
    Generic,
    Usage,
}

fn main() -> ExitCode {
    match main_inner() {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Generic) => ExitCode::from(1),
        Err(RunError::Usage) => ExitCode::from(2),
    }
}

fn main_inner() -> Result<(), RunError> {
    let args = match <cli::Cli as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return Err(RunError::Usage);
        }
    };

    let stderr_log_level = args
        .stderr_log_level
        .unwrap_or(cli::LogLevel::Warn)
        .to_log_level_filter();
    let file_log_level = args.file_log_level.map(cli::LogLevel::to_log_level_filter);

    if let Err(e) = init_logger(stderr_log_level, args.log_file.as_deref(), file_log_level) {
        eprintln!("failed to initialize logging: {e}");
        return Err(RunError::Generic);
    }

    let mode = match args.subcommand {
        cli::Subcommand::Include => MatchMode::Include,
        cli::Subcommand::Exclude => MatchMode::Exclude,
    };
    let mut matcher = PathMatcher::new(mode);
    for path in &args.paths {
        matcher.add_prefix(path.as_bytes());
    }
    if let Some(ref paths_file_path) = args.paths_file {
        let paths_file = std::fs::OpenOptions::new()
            .read(true)
            .open(paths_file_path)
            .map_err(|e| {
                tracing::error!("failed to open paths file {paths_file_path:?}: {e}");
                RunError::Generic
            })?;
        let paths = paths_file::read_paths(&mut std::io::BufReader::new(paths_file))
            .map_err(|e| {
                tracing::error!("failed to read paths file {paths_file_path:?}: {e}");
                RunError::Generic
            })?;
        for path in &paths {
            matcher.add_prefix(path);
        }
    }

    if matcher.is_empty() {
        tracing::error!("no paths to match; pass path arguments or --file");
        return Err(RunError::Usage);
    }
    if args.stop_renumber && !args.keep_empty_revs {
        tracing::error!(
            "-s only makes sense with -k: revisions cannot keep their numbers while \
             empty revisions are being dropped",
        );
        return Err(RunError::Usage);
    }
    if !args.scan && args.repo.is_none() {
        tracing::error!("-r <repo> is required when not scanning");
        return Err(RunError::Usage);
    }

    let options = filter::FilterOptions {
        keep_empty_revs: args.keep_empty_revs,
        renumber: !args.stop_renumber,
        strip_mergeinfo: args.strip_mergeinfo,
        start_revision: args.start_revision,
    };

    let mut source = DumpSource::open(&args.input).map_err(|e| {
        tracing::error!("failed to open dump source: {e}");
        RunError::Generic
    })?;

    if args.scan {
        let findings = filter::scan::run(source.stream(), &matcher, &options).map_err(|e| {
            tracing::error!("{e}");
            RunError::Generic
        })?;

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for finding in &findings {
            let r = writeln!(
                out,
                "{}\t{}\t{}\t{}",
                finding.rev,
                finding.path.escape_ascii(),
                finding.copyfrom_rev,
                finding.copyfrom_path.escape_ascii(),
            );
            if let Err(e) = r {
                tracing::error!("failed to write scan results: {e}");
                return Err(RunError::Generic);
            }
        }

        if findings.is_empty() {
            tracing::info!("no untangling is necessary to carve these paths");
        } else {
            tracing::warn!("{} node(s) would need untangling", findings.len());
        }
    } else {
        let repo = args.repo.clone().unwrap();
        let svnlook = probe::SvnlookProbe::new(repo);

        let raw_out: Box<dyn std::io::Write> = match args.output {
            Some(ref output_path) => {
                let file = std::fs::File::create(output_path).map_err(|e| {
                    tracing::error!("failed to create {output_path:?}: {e}");
                    RunError::Generic
                })?;
                Box::new(file)
            }
            None => Box::new(std::io::stdout().lock()),
        };
        let mut out = std::io::BufWriter::new(raw_out);

        let stats = filter::run(source.stream(), &mut out, &matcher, &svnlook, &options)
            .map_err(|e| {
                tracing::error!("{e}");
                RunError::Generic
            })?;

        if let Err(e) = out.flush() {
            tracing::error!("failed to write output dump: {e}");
            return Err(RunError::Generic);
        }

        tracing::info!(
            "filtered {} revisions: {} emitted, {} dropped; {} of {} nodes kept, {} synthesized",
            stats.revs_read,
            stats.revs_emitted,
            stats.revs_dropped,
            stats.nodes_emitted,
            stats.nodes_read,
            stats.nodes_synthesized,
        );
    }

    source.close().map_err(|e| {
        tracing::error!("dump source error: {e}");
        RunError::Generic
    })
}

fn init_logger(
    stderr_level: tracing::Level,
    file_path: Option<&std::path::Path>,
    file_level: Option<tracing::Level>,
) -> Result<(), std::io::Error> {
    use tracing_subscriber::layer::{Layer as _, SubscriberExt as _};
    use tracing_subscriber::util::SubscriberInitExt as _;

    let stderr_filter = tracing_subscriber::filter::LevelFilter::from_level(stderr_level);
    let stderr_sub = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let file_sub = if let Some(file_path) = file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        let filter = tracing_subscriber::filter::LevelFilter::from_level(
            file_level.unwrap_or(tracing::Level::DEBUG),
        );
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file)
                .with_filter(filter),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_sub)
        .with(file_sub)
        .init();

    Ok(())
}
