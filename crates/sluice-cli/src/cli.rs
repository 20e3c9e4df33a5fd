//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use reqwest::Url;
use sluice_core::{
    CategoryFilter, FilterCriteria, SearchField, SearchFilter, SortColumn, SortSpec, StatusFilter,
    TagFilter, TrackerFilter,
};
use sluice_telemetry::{CommandSpan, LogFormat, LoggingConfig, init_logging};

use crate::client::{AppContext, CliError, CliResult, parse_url};
use crate::commands::{handle_ls, handle_open, handle_watch};
use crate::output::OutputFormat;

const DEFAULT_URL: &str = "http://127.0.0.1:8080/";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_FILE: &str = ".sluice-state.json";

/// Parses CLI arguments, executes the requested command, and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: option_env!("SLUICE_BUILD_SHA").unwrap_or("dev"),
        ..LoggingConfig::default()
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }
    let _span = CommandSpan::enter(cli.command.label());

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let ctx = AppContext::from_cli(&cli)?;
    match cli.command {
        Command::Ls(args) => handle_ls(&ctx, args, cli.output).await,
        Command::Watch(args) => handle_watch(&ctx, args, cli.output).await,
        Command::Open(args) => handle_open(&ctx, args).await,
    }
}

#[derive(Parser)]
#[command(
    name = "sluice",
    about = "Live, filtered torrent list for a qBittorrent WebUI"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "SLUICE_URL",
        value_parser = parse_url,
        default_value = DEFAULT_URL
    )]
    pub(crate) url: Url,
    #[arg(long, global = true, env = "SLUICE_USERNAME")]
    pub(crate) username: Option<String>,
    #[arg(long, global = true, env = "SLUICE_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    #[arg(
        long,
        global = true,
        env = "SLUICE_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Timeout in seconds for login, auth check and add requests"
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "SLUICE_STATE_FILE",
        default_value = DEFAULT_STATE_FILE,
        help = "File holding deep links between runs"
    )]
    pub(crate) state_file: PathBuf,
    #[arg(
        long,
        global = true,
        env = "SLUICE_CONFIG",
        help = "JSON poll loop configuration"
    )]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, env = "SLUICE_LOG_FORMAT", value_parser = parse_log_format)]
    pub(crate) log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch one full snapshot and print the filtered view.
    Ls(ListArgs),
    /// Keep polling and re-render whenever the view changes.
    Watch(WatchArgs),
    /// Capture a deep link from an address and add it once authenticated.
    Open(OpenArgs),
}

impl Command {
    const fn label(&self) -> &'static str {
        match self {
            Self::Ls(_) => "ls",
            Self::Watch(_) => "watch",
            Self::Open(_) => "open",
        }
    }
}

#[derive(Args, Default)]
pub(crate) struct ListArgs {
    #[command(flatten)]
    pub(crate) view: ViewArgs,
    #[arg(long, help = "Also print sidebar counts")]
    pub(crate) counts: bool,
}

#[derive(Args, Default)]
pub(crate) struct WatchArgs {
    #[command(flatten)]
    pub(crate) view: ViewArgs,
    #[arg(long, help = "Stop after this many renders")]
    pub(crate) cycles: Option<u64>,
    #[arg(long, help = "Poll interval in milliseconds")]
    pub(crate) interval_ms: Option<u64>,
}

#[derive(Args)]
pub(crate) struct OpenArgs {
    #[arg(help = "Address carrying a `download` parameter")]
    pub(crate) address: String,
}

/// Filter and sort flags shared by `ls` and `watch`.
#[derive(Args, Default)]
pub(crate) struct ViewArgs {
    #[arg(long, conflicts_with = "uncategorized")]
    pub(crate) category: Option<String>,
    #[arg(long)]
    pub(crate) uncategorized: bool,
    #[arg(long, conflicts_with = "untagged")]
    pub(crate) tag: Option<String>,
    #[arg(long)]
    pub(crate) untagged: bool,
    #[arg(long, conflicts_with = "trackerless")]
    pub(crate) tracker: Option<String>,
    #[arg(long)]
    pub(crate) trackerless: bool,
    #[arg(long, help = "Status group, e.g. downloading, seeding, stalled_uploading")]
    pub(crate) status: Option<String>,
    #[arg(long)]
    pub(crate) search: Option<String>,
    #[arg(long, requires = "search", help = "Treat --search as a regular expression")]
    pub(crate) regex: bool,
    #[arg(long, requires = "search", help = "name, hash, save_path, category, tags, tracker")]
    pub(crate) search_field: Option<String>,
    #[arg(long, help = "Sort column, e.g. name, dlspeed, added_on")]
    pub(crate) sort: Option<String>,
    #[arg(long, help = "Sort ascending instead of descending")]
    pub(crate) asc: bool,
}

impl ViewArgs {
    pub(crate) fn criteria(&self) -> CliResult<FilterCriteria> {
        let category = match (&self.category, self.uncategorized) {
            (Some(name), _) => CategoryFilter::Named(name.clone()),
            (None, true) => CategoryFilter::Uncategorized,
            (None, false) => CategoryFilter::Any,
        };
        let tag = match (&self.tag, self.untagged) {
            (Some(name), _) => TagFilter::Named(name.clone()),
            (None, true) => TagFilter::Untagged,
            (None, false) => TagFilter::Any,
        };
        let tracker = match (&self.tracker, self.trackerless) {
            (Some(url), _) => TrackerFilter::Named(url.clone()),
            (None, true) => TrackerFilter::Trackerless,
            (None, false) => TrackerFilter::Any,
        };
        let status = self
            .status
            .as_deref()
            .map(str::parse::<StatusFilter>)
            .transpose()
            .map_err(|err| CliError::validation(selector_message(&err)))?
            .unwrap_or_default();
        let field = self
            .search_field
            .as_deref()
            .map(str::parse::<SearchField>)
            .transpose()
            .map_err(|err| CliError::validation(selector_message(&err)))?
            .unwrap_or_default();
        let search = SearchFilter::new(self.search.clone().unwrap_or_default(), field, self.regex);
        search
            .check()
            .map_err(|err| CliError::validation(selector_message(&err)))?;

        Ok(FilterCriteria {
            category,
            status,
            tag,
            tracker,
            use_subcategories: false,
            search,
        })
    }

    pub(crate) fn sort(&self) -> CliResult<SortSpec> {
        let column = self
            .sort
            .as_deref()
            .map(str::parse::<SortColumn>)
            .transpose()
            .map_err(|err| CliError::validation(selector_message(&err)))?
            .unwrap_or_default();
        Ok(SortSpec {
            column,
            descending: !self.asc,
        })
    }
}

fn selector_message(err: &sluice_core::SyncError) -> String {
    match err {
        sluice_core::SyncError::UnknownSelector { kind, value } => {
            format!("unknown {kind} '{value}'")
        }
        sluice_core::SyncError::InvalidPattern { pattern, source } => {
            format!("invalid search pattern '{pattern}': {source}")
        }
        other => other.to_string(),
    }
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input
        .parse()
        .map_err(|_| format!("unknown log format '{input}' (expected json or pretty)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sluice").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn ls_flags_build_criteria_and_sort() -> Result<(), String> {
        let cli = parse(&[
            "ls",
            "--category",
            "movies",
            "--untagged",
            "--status",
            "stalled-uploading",
            "--search",
            "^deb",
            "--regex",
            "--sort",
            "dlspeed",
            "--asc",
        ]);
        let Command::Ls(args) = cli.command else {
            return Err("expected ls".to_string());
        };
        let criteria = args.view.criteria().map_err(|e| e.display_message())?;
        assert_eq!(criteria.category, CategoryFilter::Named("movies".into()));
        assert_eq!(criteria.tag, TagFilter::Untagged);
        assert_eq!(criteria.tracker, TrackerFilter::Any);
        assert_eq!(criteria.status, StatusFilter::StalledUploading);
        assert!(criteria.search.is_regex());
        assert_eq!(
            args.view.sort().map_err(|e| e.display_message())?,
            SortSpec {
                column: SortColumn::DownloadSpeed,
                descending: false,
            }
        );
        Ok(())
    }

    #[test]
    fn unknown_selectors_are_validation_errors() {
        let view = ViewArgs {
            status: Some("sleeping".to_string()),
            ..ViewArgs::default()
        };
        assert!(matches!(view.criteria(), Err(CliError::Validation(message)) if message == "unknown status 'sleeping'"));

        let view = ViewArgs {
            search: Some("(".to_string()),
            regex: true,
            ..ViewArgs::default()
        };
        assert!(matches!(view.criteria(), Err(CliError::Validation(_))));

        let view = ViewArgs {
            sort: Some("colour".to_string()),
            ..ViewArgs::default()
        };
        assert!(matches!(view.sort(), Err(CliError::Validation(_))));
    }

    #[test]
    fn global_flags_parse_anywhere() {
        let cli = parse(&[
            "watch",
            "--url",
            "http://nas.local:8080",
            "--output",
            "json",
            "--cycles",
            "2",
        ]);
        assert_eq!(cli.url.as_str(), "http://nas.local:8080/");
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Watch(WatchArgs { cycles: Some(2), .. })));
    }

    #[test]
    fn conflicting_category_flags_are_rejected() {
        let result = Cli::try_parse_from(["sluice", "ls", "--category", "tv", "--uncategorized"]);
        assert!(result.is_err());
    }
}
