//! CLI argument definitions for parceltrace.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `track` | Resolve one tracking number |
//! | `batch` | Resolve every query listed in a file (or stdin) |
//! | `carriers` | List supported carriers |
//! | `detect` | Infer the carrier of a tracking number without querying it |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Exit 5 when any query failed |
//! | `--verbose` | `false` | Debug logging on stderr |
//! | `--timeout-ms` | `12000` | Per-request timeout |
//! | `--concurrency` | `8` | Simultaneous queries in `batch` |
//!
//! # Examples
//!
//! ```bash
//! parceltrace track SF1234567890123 --pretty
//! parceltrace track 731234567890 --phone 5678
//! parceltrace batch waybills.csv --concurrency 4 --strict
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use parceltrace_core::http_client::DEFAULT_TIMEOUT_MS;
use parceltrace_core::DEFAULT_MAX_CONCURRENCY;

/// Multi-carrier parcel tracking
///
/// Carrier credentials are read from `PARCELTRACE_<CODE>_<KEY>` variables and
/// the Kuaidi100 fallback from `PARCELTRACE_KUAIDI100_CUSTOMER` /
/// `PARCELTRACE_KUAIDI100_KEY`.
#[derive(Debug, Parser)]
#[command(name = "parceltrace", author, version, about = "Multi-carrier parcel tracking")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Exit with code 5 when any query did not succeed.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log provider calls at debug level on stderr.
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    /// Timeout of each outbound provider request in milliseconds.
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Maximum number of queries resolved at once.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub concurrency: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one tracking number.
    ///
    /// # Examples
    ///
    ///   parceltrace track SF1234567890123
    ///   parceltrace track 1234567890 --carrier 中通 --phone 5678
    Track(TrackArgs),

    /// Resolve a list of queries, one `number[,carrier[,digits]]` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Use `-` to read
    /// from stdin.
    Batch(BatchArgs),

    /// List supported carriers with their aliases and transit times.
    Carriers,

    /// Infer the carrier of a tracking number without any network call.
    Detect(DetectArgs),
}

#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Tracking number to resolve.
    pub number: String,

    /// Carrier code (SF, ZTO, YTO, STO, JD) or display name.
    #[arg(long)]
    pub carrier: Option<String>,

    /// Last 4 digits of the recipient phone number.
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Input file, or `-` for stdin.
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Tracking number to classify.
    pub number: String,
}
