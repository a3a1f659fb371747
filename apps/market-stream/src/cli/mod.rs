//! Command Line Interface
//!
//! The command tree is generated from the asset-class and channel tables, one
//! leaf per pair:
//!
//! ```text
//! market-stream [--api-key KEY] [--ws-url URL] [--rest-url URL] [-o table|json] [-v]
//!   stream <stocks|options|forex|crypto|indices>
//!          <trades|quotes|minute-aggs|second-aggs|fmv> [TICKER]... [--all]
//!   get <PATH> [-p KEY=VALUE]...
//! ```

pub mod render;

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches, ValueEnum};

use crate::domain::subscription::{AssetClass, Channel, Subscription};
use crate::infrastructure::config::env_keys;

/// Binary name.
pub const BIN_NAME: &str = "market-stream";

/// Output format for market data on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// One JSON object per line.
    Json,
}

/// Flags accepted at every level of the tree.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalArgs {
    /// API key, overrides MARKET_DATA_API_KEY
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Streaming base URL, overrides MARKET_DATA_WS_URL
    #[arg(long, global = true, value_name = "URL")]
    pub ws_url: Option<String>,

    /// REST base URL, overrides MARKET_DATA_REST_URL
    #[arg(long, global = true, value_name = "URL")]
    pub rest_url: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// More logging on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Stream one subscription until interrupted.
    Stream(Subscription),
    /// Fetch one REST path.
    Get {
        /// Request path, e.g. `/v3/reference/tickers/AAPL`.
        path: String,
        /// Query parameters in command-line order.
        params: Vec<(String, String)>,
    },
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    /// Global flags.
    pub global: GlobalArgs,
    /// Selected subcommand.
    pub invocation: Invocation,
}

impl Cli {
    /// Parse arguments (including the program name).
    ///
    /// # Errors
    ///
    /// Returns a clap error for usage errors and for `--help`/`--version`;
    /// `clap::Error::exit` prints it with the right exit code.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command_tree().try_get_matches_from(args)?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let global = GlobalArgs::from_arg_matches(matches)?;

        let invocation = match matches.subcommand() {
            Some(("stream", stream)) => Invocation::Stream(stream_subscription(stream)?),
            Some(("get", get)) => Invocation::Get {
                path: get
                    .get_one::<String>("path")
                    .cloned()
                    .ok_or_else(|| clap::Error::raw(ErrorKind::MissingRequiredArgument, "missing PATH\n"))?,
                params: get
                    .get_many::<(String, String)>("param")
                    .into_iter()
                    .flatten()
                    .cloned()
                    .collect(),
            },
            _ => {
                return Err(clap::Error::raw(
                    ErrorKind::MissingSubcommand,
                    "a subcommand is required\n",
                ));
            }
        };

        Ok(Self { global, invocation })
    }

    /// Value of a command-line flag that overrides the environment key `key`.
    #[must_use]
    pub fn flag_override(&self, key: &str) -> Option<String> {
        match key {
            env_keys::API_KEY => self.global.api_key.clone(),
            env_keys::WS_URL => self.global.ws_url.clone(),
            env_keys::REST_URL => self.global.rest_url.clone(),
            _ => None,
        }
    }
}

/// Build the full command tree.
#[must_use]
pub fn command_tree() -> Command {
    let stream = AssetClass::all().iter().fold(
        Command::new("stream")
            .about("Stream real-time events to stdout until interrupted")
            .subcommand_required(true)
            .arg_required_else_help(true),
        |cmd, asset_class| cmd.subcommand(asset_command(*asset_class)),
    );

    let root = Command::new(BIN_NAME)
        .version(clap::crate_version!())
        .about("Market data client: real-time streams and REST lookups")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(stream)
        .subcommand(get_command());

    GlobalArgs::augment_args(root)
}

fn asset_command(asset_class: AssetClass) -> Command {
    Channel::all().iter().fold(
        Command::new(asset_class.as_str())
            .about(format!("Stream {asset_class} data"))
            .subcommand_required(true)
            .arg_required_else_help(true),
        |cmd, channel| cmd.subcommand(channel_command(asset_class, *channel)),
    )
}

fn channel_command(asset_class: AssetClass, channel: Channel) -> Command {
    Command::new(channel.name())
        .about(format!(
            "Stream {asset_class} {} ({}.<TICKER>)",
            channel.name(),
            channel.code()
        ))
        .arg(
            Arg::new("tickers")
                .value_name("TICKER")
                .help("Tickers to subscribe to")
                .num_args(1..)
                .action(ArgAction::Append)
                .required_unless_present("all"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("Subscribe to every ticker; TICKER arguments are ignored")
                .action(ArgAction::SetTrue),
        )
}

fn get_command() -> Command {
    Command::new("get")
        .about("Fetch a REST path and print the JSON response")
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("Request path, e.g. /v3/reference/tickers/AAPL")
                .required(true),
        )
        .arg(
            Arg::new("param")
                .short('p')
                .long("param")
                .value_name("KEY=VALUE")
                .help("Query parameter, repeatable")
                .action(ArgAction::Append)
                .value_parser(parse_key_value),
        )
}

fn stream_subscription(stream: &ArgMatches) -> Result<Subscription, clap::Error> {
    let invalid = |msg: String| clap::Error::raw(ErrorKind::InvalidValue, format!("{msg}\n"));

    let (asset_name, asset) = stream
        .subcommand()
        .ok_or_else(|| clap::Error::raw(ErrorKind::MissingSubcommand, "missing asset class\n"))?;
    let (channel_name, leaf) = asset
        .subcommand()
        .ok_or_else(|| clap::Error::raw(ErrorKind::MissingSubcommand, "missing channel\n"))?;

    let asset_class: AssetClass = asset_name.parse().map_err(|e| invalid(format!("{e}")))?;
    let channel: Channel = channel_name.parse().map_err(|e| invalid(format!("{e}")))?;

    let tickers: Vec<&String> = leaf
        .get_many::<String>("tickers")
        .into_iter()
        .flatten()
        .collect();

    Subscription::build(asset_class, channel, &tickers, leaf.get_flag("all"))
        .map_err(|e| invalid(e.to_string()))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once(BIN_NAME).chain(args.iter().copied()))
    }

    #[test]
    fn command_tree_is_consistent() {
        command_tree().debug_assert();
    }

    #[test]
    fn one_leaf_per_asset_and_channel() {
        let tree = command_tree();
        let stream = tree.find_subcommand("stream").unwrap();
        assert_eq!(stream.get_subcommands().count(), AssetClass::all().len());

        for asset_class in AssetClass::all() {
            let asset = stream.find_subcommand(asset_class.as_str()).unwrap();
            let leaves: Vec<_> = asset.get_subcommands().map(Command::get_name).collect();
            let expected: Vec<_> = Channel::all().iter().map(Channel::name).collect();
            assert_eq!(leaves, expected);
        }
    }

    #[test]
    fn stream_tickers() {
        let cli = parse(&["stream", "stocks", "trades", "AAPL", "MSFT"]).unwrap();
        match cli.invocation {
            Invocation::Stream(subscription) => {
                assert_eq!(subscription.asset_class(), AssetClass::Stocks);
                assert_eq!(subscription.params(), "T.AAPL,T.MSFT");
            }
            other => panic!("expected stream, got {other:?}"),
        }
        assert_eq!(cli.global.output, OutputFormat::Table);
    }

    #[test]
    fn stream_wildcard_ignores_tickers() {
        let cli = parse(&["stream", "crypto", "quotes", "--all", "BTC-USD"]).unwrap();
        assert!(matches!(
            cli.invocation,
            Invocation::Stream(ref s) if s.params() == "Q.*"
        ));
    }

    #[test_case(&["stream", "stocks", "trades"], ErrorKind::MissingRequiredArgument ; "no tickers")]
    #[test_case(&["stream", "stocks", "bars", "AAPL"], ErrorKind::InvalidSubcommand ; "unknown channel")]
    #[test_case(&["stream", "bonds", "trades", "X"], ErrorKind::InvalidSubcommand ; "unknown asset")]
    #[test_case(&["get", "/v1/x", "-p", "novalue"], ErrorKind::ValueValidation ; "bad param")]
    #[test_case(&["stream", "stocks", "trades", "A,B"], ErrorKind::InvalidValue ; "comma in ticker")]
    fn usage_errors(args: &[&str], kind: ErrorKind) {
        let err = parse(args).unwrap_err();
        assert_eq!(err.kind(), kind);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&[
            "stream", "options", "fmv", "O:SPY251219C00650000", "--output", "json", "--api-key", "k",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.global.output, OutputFormat::Json);
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.flag_override(env_keys::API_KEY).as_deref(), Some("k"));
        assert_eq!(cli.flag_override(env_keys::WS_URL), None);
        assert_eq!(cli.flag_override("OTHER"), None);
    }

    #[test]
    fn get_with_params() {
        let cli = parse(&[
            "--rest-url",
            "http://localhost:1",
            "get",
            "/v3/reference/tickers",
            "-p",
            "market=stocks",
            "--param",
            "search=apple inc",
        ])
        .unwrap();
        assert_eq!(
            cli.invocation,
            Invocation::Get {
                path: "/v3/reference/tickers".to_string(),
                params: vec![
                    ("market".to_string(), "stocks".to_string()),
                    ("search".to_string(), "apple inc".to_string()),
                ],
            }
        );
        assert_eq!(
            cli.flag_override(env_keys::REST_URL).as_deref(),
            Some("http://localhost:1")
        );
    }

    #[test]
    fn help_is_not_a_failure() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }
}
