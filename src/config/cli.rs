//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// OSPulse - Object storage load-generation harness
#[derive(Parser, Debug, Clone)]
#[command(name = "ospulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Basic Options ===
    /// Container name
    #[arg(short = 'c', long = "cname")]
    pub cname: String,

    /// Object counts per worker: a single value OR colon-separated per-worker list
    #[arg(short = 'n', long = "nobjects")]
    pub nobjects: Option<String>,

    /// Object name prefix
    #[arg(short = 'o', long = "obj")]
    pub oname: String,

    /// Runtime limit in seconds
    #[arg(short = 'r', long = "runtime")]
    pub runtime: Option<u64>,

    /// Object size(s), comma separated, each a number with optional k/m/g suffix
    #[arg(short = 's', long = "size")]
    pub sizes: String,

    /// Tests to run: comma separated combinations of p/g/d (upper case = random access)
    #[arg(short = 't', long = "tests")]
    pub tests: String,

    // === Output Options ===
    /// Report latency distributions at this granularity (digits after the decimal, 0-3)
    #[arg(long)]
    pub ldist: Option<u32>,

    /// Do not print the header with results
    #[arg(long)]
    pub nohead: bool,

    /// Include a per-worker summary line before each batch summary
    #[arg(long)]
    pub psum: bool,

    /// After a PUT batch, list the number of puts by each worker
    #[arg(long)]
    pub putsperproc: bool,

    // === Behavior Options ===
    /// Do not delete container(s) after a delete test
    #[arg(long = "cont-nodelete")]
    pub cont_nodelete: bool,

    /// Container topology: shared|bynode|byproc
    #[arg(long, default_value = "shared")]
    pub ctype: String,

    /// Quit a worker's loop after this many classified errors
    #[arg(long, default_value = "5")]
    pub errmax: u64,

    /// Latency exception range in seconds: "min" or "min-max"; matching
    /// operations emit a warning
    #[arg(long)]
    pub latexc: Option<String>,

    /// Operation log mask: 1=all latencies, 2=traces, 4=latencies over threshold
    /// (thresholds appended as :val per object size)
    #[arg(long, default_value = "0")]
    pub logops: String,

    /// Object option flags: a=append, c=compressible, f=flat hierarchy, u=unique names
    #[arg(long, default_value = "")]
    pub objopts: String,

    /// Use this preauth token together with --proxies
    #[arg(long, default_value = "")]
    pub preauthtoken: String,

    /// Worker counts to run, comma separated
    #[arg(long = "procs")]
    pub procset: Option<String>,

    /// Bypass the load balancer and connect directly to these proxies (comma separated)
    #[arg(long, default_value = "")]
    pub proxies: String,

    /// Suppress api errors and sync time warnings
    #[arg(long)]
    pub quiet: bool,

    /// Number of times to repeat the test set
    #[arg(long = "repeat")]
    pub repeats: Option<u32>,

    /// Exit the run on warnings (latency exceptions, passed sync time, errors)
    #[arg(long)]
    pub warnexit: bool,

    // === Multi-node Access ===
    /// Credentials file (overrides ST_*/OS_* environment variables)
    #[arg(long)]
    pub creds: Option<PathBuf>,

    /// Rank among distributed clients, used in object/container names
    #[arg(long, default_value = "0")]
    pub rank: u64,

    /// Time, in seconds since the epoch, at which all clients start the test
    #[arg(long = "sync")]
    pub synctime: Option<u64>,

    /// Append the run epoch to container names
    #[arg(long)]
    pub utc: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
