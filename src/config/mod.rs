//! Run configuration
//!
//! This module converts parsed CLI arguments into the immutable [`RunConfig`]
//! shared read-only by every component for the lifetime of a run. All option
//! combination checks happen here, before any worker is dispatched.

pub mod cli;
pub mod creds;

use crate::util::size::parse_kmg;
use anyhow::{bail, Result};
use cli::Cli;
use creds::Credentials;
use serde::Serialize;

/// Fallback per-worker budget when only --runtime bounds a test
pub const UNBOUNDED_OBJECTS: u64 = 999_999;

/// Storage operation issued by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Put,
    Get,
    Delete,
}

/// One test to run: an operation plus its access pattern
///
/// Parsed from the single-character codes `p`/`g`/`d` (sequential) and
/// `P`/`G`/`D` (random access against a pre-populated container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestKind {
    pub op: Operation,
    pub random: bool,
}

impl TestKind {
    pub fn from_code(code: char) -> Option<Self> {
        let op = match code.to_ascii_lowercase() {
            'p' => Operation::Put,
            'g' => Operation::Get,
            'd' => Operation::Delete,
            _ => return None,
        };
        Some(Self {
            op,
            random: code.is_ascii_uppercase(),
        })
    }

    /// Short test name used in report lines
    pub fn name(&self) -> &'static str {
        match (self.op, self.random) {
            (Operation::Put, false) => "put",
            (Operation::Put, true) => "putR",
            (Operation::Get, false) => "get",
            (Operation::Get, true) => "getR",
            (Operation::Delete, false) => "del",
            (Operation::Delete, true) => "delR",
        }
    }
}

/// Container naming topology across ranks and workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Topology {
    /// All ranks and workers share one container
    Shared,
    /// One container per rank
    ByNode,
    /// One container per (rank, worker) pair
    ByProc,
}

impl Topology {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "shared" => Ok(Self::Shared),
            "bynode" => Ok(Self::ByNode),
            "byproc" => Ok(Self::ByProc),
            _ => bail!("invalid ctype, expecting: 'shared|bynode|byproc'"),
        }
    }
}

/// Object layout and payload option flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectOpts {
    /// Append new objects after a container's pre-existing object count
    pub append: bool,
    /// Compressible payload (repeated bytes instead of random)
    pub compressible: bool,
    /// Flat hierarchy: objects carry only a numeric id, shared across workers
    pub flat: bool,
    /// Unique-per-run names: object prefix carries the run epoch
    pub unique: bool,
}

impl ObjectOpts {
    fn parse(s: &str) -> Result<Self> {
        let mut opts = Self::default();
        for c in s.chars() {
            match c {
                'a' => opts.append = true,
                'c' => opts.compressible = true,
                'f' => opts.flat = true,
                'u' => opts.unique = true,
                _ => bail!("--objopts must be a combination of 'acfu'"),
            }
        }
        Ok(opts)
    }
}

/// Per-worker operation budgets for one batch
#[derive(Debug, Clone)]
pub enum ObjectBudget {
    /// Same count for every worker (None means runtime-bounded)
    Uniform(Option<u64>),
    /// Explicit per-worker counts, colon separated on the command line
    PerWorker(Vec<u64>),
}

impl ObjectBudget {
    fn parse(spec: Option<&str>) -> Result<Self> {
        match spec {
            None => Ok(Self::Uniform(None)),
            Some(s) if s.contains(':') => {
                let counts = s
                    .split(':')
                    .map(|v| v.parse::<u64>())
                    .collect::<std::result::Result<Vec<_>, _>>();
                match counts {
                    Ok(counts) => Ok(Self::PerWorker(counts)),
                    Err(_) => bail!("-n must be a set of : separated integers"),
                }
            }
            Some(s) => match s.parse::<u64>() {
                Ok(n) => Ok(Self::Uniform(Some(n))),
                Err(_) => bail!("-n must be an integer"),
            },
        }
    }

    /// Expand to one budget per worker
    pub fn per_worker(&self, workers: usize) -> Result<Vec<u64>> {
        match self {
            Self::Uniform(count) => {
                Ok(vec![count.unwrap_or(UNBOUNDED_OBJECTS); workers])
            }
            Self::PerWorker(counts) => {
                if counts.len() < workers {
                    bail!(
                        "-n lists {} counts but {} workers were requested",
                        counts.len(),
                        workers
                    );
                }
                Ok(counts[..workers].to_vec())
            }
        }
    }

    /// The uniform per-worker count, used by offset computation
    pub fn uniform(&self) -> u64 {
        match self {
            Self::Uniform(count) => count.unwrap_or(UNBOUNDED_OBJECTS),
            Self::PerWorker(counts) => counts.first().copied().unwrap_or(UNBOUNDED_OBJECTS),
        }
    }
}

/// Immutable configuration for one run
///
/// Built once from the CLI, then shared read-only by the coordinator and
/// every worker. No component mutates run state after construction.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Tests to run, in order
    pub tests: Vec<TestKind>,
    /// Container base name
    pub cname: String,
    /// Object name prefix
    pub oname: String,
    /// Object sizes in bytes, one batch per size
    pub sizes: Vec<u64>,
    /// Per-worker object budgets
    pub nobjects: ObjectBudget,
    /// Wall-clock runtime limit in seconds
    pub runtime: Option<u64>,
    /// Container topology
    pub ctype: Topology,
    /// Object layout/payload flags
    pub objopts: ObjectOpts,
    /// This client's rank among distributed clients
    pub rank: u64,
    /// Worker counts to run, one section per count
    pub procset: Vec<usize>,
    /// Number of times to repeat the whole test set
    pub repeats: u32,
    /// Synchronized-start epoch, honored by the first test of the run
    pub synctime: Option<u64>,
    /// Per-worker classified-error budget
    pub errmax: u64,
    /// Latency exception bounds (min, max) in seconds
    pub latexc: Option<(f64, f64)>,
    /// Latency distribution granularity in digits (0-3)
    pub ldist: Option<u32>,
    /// Suppress the report header
    pub nohead: bool,
    /// Emit one line per worker before each batch summary
    pub psum: bool,
    /// Emit the machine-consumable puts-per-worker line after PUT batches
    pub putsperproc: bool,
    /// Suppress api errors and sync warnings
    pub quiet: bool,
    /// Append the run epoch to container names
    pub utc: bool,
    /// Terminate the run on warnings
    pub warnexit: bool,
    /// Keep containers after a delete test
    pub cont_nodelete: bool,
    /// Proxy endpoints to contact directly, bypassing the load balancer
    pub proxies: Vec<String>,
    /// Preauth token supplied on the command line (proxies only)
    pub preauthtoken: String,
    /// Resolved storage credentials
    pub creds: Credentials,
    /// Operation log mask (1=latencies, 2=traces, 4=over-threshold latencies)
    pub logmask: u32,
    /// Per-size latency thresholds for logmask 4
    pub loglat: Vec<f64>,
}

impl RunConfig {
    /// Build and validate a run configuration from parsed CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let creds = match &cli.creds {
            Some(path) => Credentials::from_file(path)?,
            None => Credentials::from_env()?,
        };
        if !creds.is_complete() {
            bail!("specify credentials with --creds OR set ST_* variables");
        }

        let mut tests = Vec::new();
        for part in cli.tests.split(',') {
            if part.is_empty() {
                continue;
            }
            for code in part.chars() {
                match TestKind::from_code(code) {
                    Some(kind) => tests.push(kind),
                    None => bail!("valid tests are comma separated combinations of: gpd"),
                }
            }
        }
        if tests.is_empty() {
            bail!("define test list with -t");
        }
        let has_put = tests.iter().any(|t| t.op == Operation::Put && !t.random);

        let mut sizes = Vec::new();
        for size in cli.sizes.split(',') {
            match parse_kmg(size) {
                Some(bytes) => sizes.push(bytes),
                None => bail!("object size must be a number OR number + k/m/g"),
            }
        }
        if sizes.len() > 1 && !has_put {
            bail!("multiple obj sizes require PUT test");
        }

        let nobjects = ObjectBudget::parse(cli.nobjects.as_deref())?;
        if cli.nobjects.is_none() && cli.runtime.is_none() {
            bail!("specify at least one of -n and/or --runtime");
        }

        let procset = match &cli.procset {
            Some(spec) => {
                let mut procs = Vec::new();
                for part in spec.split(',') {
                    match part.parse::<usize>() {
                        Ok(n) if n > 0 => procs.push(n),
                        _ => bail!("--procs must be an integer"),
                    }
                }
                procs
            }
            None => vec![1],
        };

        if let Some(digits) = cli.ldist {
            if digits > 3 {
                bail!("--ldist > 3 not supported");
            }
        }

        let objopts = ObjectOpts::parse(&cli.objopts)?;
        let sequential_read_or_delete = tests
            .iter()
            .any(|t| !t.random && t.op != Operation::Put);
        if objopts.flat && sequential_read_or_delete {
            bail!("flat hierarchies ('--objopts f') not supported for sequential gets/dels");
        }
        if objopts.append {
            if tests.iter().any(|t| t.op == Operation::Put && t.random) {
                bail!("append mode makes no sense for random PUTs");
            }
            if !objopts.flat {
                bail!("append mode only supported for flat hierarchies, consider different onames OR --objopts u");
            }
        }

        let proxies: Vec<String> = cli
            .proxies
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !cli.preauthtoken.is_empty() && proxies.is_empty() {
            bail!("use of --preauthtoken only makes sense with --proxies");
        }

        let latexc = match &cli.latexc {
            Some(spec) => Some(parse_latexc(spec)?),
            None => None,
        };

        let (logmask, loglat) = parse_logops(&cli.logops, sizes.len())?;

        Ok(Self {
            tests,
            cname: cli.cname.clone(),
            oname: cli.oname.clone(),
            sizes,
            nobjects,
            runtime: cli.runtime,
            ctype: Topology::parse(&cli.ctype)?,
            objopts,
            rank: cli.rank,
            procset,
            repeats: cli.repeats.unwrap_or(1),
            synctime: cli.synctime,
            errmax: cli.errmax,
            latexc,
            ldist: cli.ldist,
            nohead: cli.nohead,
            psum: cli.psum,
            putsperproc: cli.putsperproc,
            quiet: cli.quiet,
            utc: cli.utc,
            warnexit: cli.warnexit,
            cont_nodelete: cli.cont_nodelete,
            proxies,
            preauthtoken: cli.preauthtoken.clone(),
            creds,
            logmask,
            loglat,
        })
    }

    /// Histogram granularity multiplier (10^digits), 0 when --ldist is unset
    ///
    /// A zero multiplier collapses every latency into bucket 0, preserving
    /// the bucket-sum invariant without tracking a distribution.
    pub fn granularity(&self) -> f64 {
        match self.ldist {
            Some(digits) => 10f64.powi(digits as i32),
            None => 0.0,
        }
    }

    /// Project id used in proxy storage URLs, the account part of the user name
    pub fn project_id(&self) -> &str {
        self.creds.username.split(':').next().unwrap_or("")
    }

    /// True when the test list contains a sequential PUT
    pub fn has_put(&self) -> bool {
        self.tests
            .iter()
            .any(|t| t.op == Operation::Put && !t.random)
    }
}

/// Parse "--latexc min" or "--latexc min-max" into bounds in seconds
fn parse_latexc(spec: &str) -> Result<(f64, f64)> {
    let (min, max) = match spec.split_once('-') {
        Some((min, max)) => (min, max),
        None => (spec, ""),
    };
    let min: f64 = min
        .parse()
        .map_err(|_| anyhow::anyhow!("--latexc bounds must be numbers"))?;
    let max: f64 = if max.is_empty() {
        9999.0
    } else {
        max.parse()
            .map_err(|_| anyhow::anyhow!("--latexc bounds must be numbers"))?
    };
    Ok((min, max))
}

/// Parse "--logops mask[:lat...]" into a mask and per-size latency thresholds
fn parse_logops(spec: &str, num_sizes: usize) -> Result<(u32, Vec<f64>)> {
    let fields: Vec<&str> = spec.split(':').collect();
    let mask: u32 = fields[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("--logops must be an integer"))?;

    let mut loglat = Vec::new();
    if mask & 4 != 0 {
        let given = fields.len() - 1;
        if given == 0 {
            bail!("--logops 4 must include ':val' for latency exceptions");
        }
        if given > 1 && given != num_sizes {
            bail!("you have specified more than one latency with --logops but their count doesn't match number of sizes");
        }
        for i in 0..num_sizes {
            let field = if given == 1 { fields[1] } else { fields[i + 1] };
            match field.parse::<f64>() {
                Ok(lat) => loglat.push(lat),
                Err(_) => bail!("--logops 4 must include ':val' for latency exceptions"),
            }
        }
    }
    Ok((mask, loglat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        use clap::Parser;
        Cli::parse_from([
            "ospulse", "-c", "cont", "-o", "obj", "-t", "p", "-s", "1k", "-n", "10",
        ])
    }

    // Serializes the tests that touch process-wide environment variables
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn with_env_creds<T>(f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("ST_AUTH", "https://swift.example.com/auth/v1.0");
        std::env::set_var("ST_USER", "acct:user");
        std::env::set_var("ST_KEY", "key");
        let out = f();
        std::env::remove_var("ST_AUTH");
        std::env::remove_var("ST_USER");
        std::env::remove_var("ST_KEY");
        out
    }

    #[test]
    fn test_basic_config() {
        let cli = base_cli();
        let config = with_env_creds(|| RunConfig::from_cli(&cli)).unwrap();
        assert_eq!(config.tests, vec![TestKind { op: Operation::Put, random: false }]);
        assert_eq!(config.sizes, vec![1024]);
        assert_eq!(config.procset, vec![1]);
        assert_eq!(config.errmax, 5);
        assert_eq!(config.granularity(), 0.0);
    }

    #[test]
    fn test_test_codes() {
        assert_eq!(TestKind::from_code('p').unwrap().name(), "put");
        assert_eq!(TestKind::from_code('G').unwrap().name(), "getR");
        assert_eq!(TestKind::from_code('D').unwrap().name(), "delR");
        assert!(TestKind::from_code('x').is_none());
    }

    #[test]
    fn test_flat_sequential_get_rejected() {
        let mut cli = base_cli();
        cli.tests = "p,g".into();
        cli.objopts = "f".into();
        assert!(with_env_creds(|| RunConfig::from_cli(&cli)).is_err());
    }

    #[test]
    fn test_append_requires_flat() {
        let mut cli = base_cli();
        cli.objopts = "a".into();
        assert!(with_env_creds(|| RunConfig::from_cli(&cli)).is_err());
        cli.objopts = "af".into();
        assert!(with_env_creds(|| RunConfig::from_cli(&cli)).is_ok());
    }

    #[test]
    fn test_preauthtoken_requires_proxies() {
        let mut cli = base_cli();
        cli.preauthtoken = "tok".into();
        assert!(with_env_creds(|| RunConfig::from_cli(&cli)).is_err());
        cli.proxies = "10.0.0.1,10.0.0.2".into();
        let config = with_env_creds(|| RunConfig::from_cli(&cli)).unwrap();
        assert_eq!(config.proxies.len(), 2);
    }

    #[test]
    fn test_multiple_sizes_require_put() {
        let mut cli = base_cli();
        cli.tests = "g".into();
        cli.sizes = "1k,2k".into();
        assert!(with_env_creds(|| RunConfig::from_cli(&cli)).is_err());
    }

    #[test]
    fn test_budget_per_worker_list() {
        let budget = ObjectBudget::parse(Some("10:20:30")).unwrap();
        assert_eq!(budget.per_worker(2).unwrap(), vec![10, 20]);
        assert!(budget.per_worker(4).is_err());
    }

    #[test]
    fn test_budget_runtime_only() {
        let budget = ObjectBudget::parse(None).unwrap();
        assert_eq!(budget.per_worker(2).unwrap(), vec![UNBOUNDED_OBJECTS; 2]);
    }

    #[test]
    fn test_latexc_parsing() {
        assert_eq!(parse_latexc("0.5").unwrap(), (0.5, 9999.0));
        assert_eq!(parse_latexc("0.5-2.0").unwrap(), (0.5, 2.0));
        assert!(parse_latexc("fast").is_err());
    }

    #[test]
    fn test_logops_parsing() {
        assert_eq!(parse_logops("0", 1).unwrap(), (0, vec![]));
        assert_eq!(parse_logops("5:0.25", 2).unwrap(), (5, vec![0.25, 0.25]));
        assert!(parse_logops("4", 1).is_err());
        assert!(parse_logops("4:0.1:0.2", 3).is_err());
    }

    #[test]
    fn test_granularity() {
        let cli = base_cli();
        let mut config = with_env_creds(|| RunConfig::from_cli(&cli)).unwrap();
        config.ldist = Some(2);
        assert_eq!(config.granularity(), 100.0);
    }
}
