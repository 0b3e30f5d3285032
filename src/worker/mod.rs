//! Worker task
//!
//! The per-worker execution unit: connect, wait for the synchronized start,
//! run one operation kind in a loop until a stop condition, return a
//! structured result. Workers never share mutable state; everything they
//! measure travels back in the returned [`WorkerOutcome`].

use crate::addressing;
use crate::client::{ClientError, Connector, ObjectClient, Preauth};
use crate::config::{Operation, RunConfig, TestKind};
use crate::stats::{WorkerFault, WorkerOutcome, WorkerResult};
use crate::util::cpu::CpuSnapshot;
use crate::util::oplog::{OpLog, LOG_LATENCIES, LOG_SLOW};
use crate::util::size::utc_stamp;
use crate::util::{epoch_now, host_name};
use chrono::Local;
use std::path::Path;
use std::time::{Duration, Instant};

/// Idle ceiling during a synchronized-start wait, seconds
///
/// A connection left idle longer than ~10s pays a one-time latency penalty
/// on its first real operation, so the wait sleeps in bounded slices and
/// keeps the connection warm in between.
const SYNC_SLEEP_MAX: f64 = 8.0;

/// Remaining wait below which the keep-alive is skipped
const SYNC_KEEPALIVE_MIN: f64 = 2.0;

/// Effectively-unbounded deadline when no runtime is configured
const FAR_FUTURE: f64 = 9_999_999_999.0;

/// Input descriptor for one worker of one batch
#[derive(Debug, Clone)]
pub struct WorkerInput {
    /// Worker index within the batch
    pub worker: usize,
    /// Number of workers in the batch
    pub workers: usize,
    /// Token pair issued by the parent connection, shared by all workers
    pub preauth: Option<Preauth>,
    /// Container this worker operates on
    pub cname: String,
    /// Pre-existing container object count (append/random addressing)
    pub csize: u64,
    /// Object name prefix, fully namespaced for this worker
    pub oname: String,
    /// Operation budget
    pub budget: u64,
    /// Test to run
    pub test: TestKind,
    /// Batch start epoch (the sync time when one is configured)
    pub start_epoch: u64,
    /// Whether this is the first test of the run (sync is honored only then)
    pub first_test: bool,
}

/// Execute one worker task to completion
///
/// Classified api errors are counted and retried-by-continuation up to the
/// error budget; any unclassified fault converts the whole task into a
/// [`WorkerOutcome::Fault`].
pub fn run_worker(
    config: &RunConfig,
    connector: &dyn Connector,
    input: &WorkerInput,
    payload: &[u8],
    size_index: usize,
    log_dir: &Path,
) -> WorkerOutcome {
    let fault = |message: String| {
        WorkerOutcome::Fault(WorkerFault {
            message,
            worker: input.worker,
        })
    };

    // when bypassing the load balancer, each worker targets one proxy,
    // chosen round-robin so ranks spread differently across proxies
    let preauth = if config.proxies.is_empty() {
        input.preauth.clone()
    } else {
        let proxy = &config.proxies[(input.worker + config.rank as usize) % config.proxies.len()];
        let token = match &input.preauth {
            Some(pair) => pair.token.clone(),
            None => return fault("no preauth token for proxy connection".to_string()),
        };
        Some(Preauth {
            url: format!("https://{}/v1/{}", proxy, config.project_id()),
            token,
        })
    };

    let mut client = match connector.connect(preauth.as_ref()) {
        Ok(client) => client,
        Err(err) => return fault(format!("Error: client connect error: {}", err)),
    };

    let mut log = OpLog::open(
        log_dir,
        input.test.name(),
        input.worker,
        input.start_epoch,
        config.logmask,
    );

    if input.first_test {
        if let Some(sync) = config.synctime {
            match wait_for_sync(config, client.as_mut(), sync) {
                SyncOutcome::Started => {}
                SyncOutcome::AlreadyPassed => {
                    // zero-filled result keeps aggregation well formed
                    return WorkerOutcome::Completed(WorkerResult::zeroed(
                        input.test,
                        input.worker,
                        CpuSnapshot::take(),
                    ));
                }
            }
        }
    }

    // non-PUT phases may need longer than the timed PUT that populated the
    // container, so give them double the window to reach every object
    let deadline = match config.runtime {
        Some(runtime) => {
            let mut runtime = runtime as f64;
            if config.has_put() && !(input.test.op == Operation::Put && !input.test.random) {
                runtime *= 2.0;
            }
            epoch_now() + runtime
        }
        None => FAR_FUTURE,
    };

    let offset = addressing::compute_offset(
        config.ctype,
        config.nobjects.uniform(),
        input.workers as u64,
        config.rank,
        input.worker as u64,
        input.csize,
        config.objopts.append,
    );

    let start_cpu = CpuSnapshot::take();
    let mut result = WorkerResult::zeroed(input.test, input.worker, start_cpu);
    let granularity = config.granularity();
    let started = Instant::now();
    let mut rng = rand::thread_rng();

    log.trace(&format!(
        "cname: {}  oname: {}  budget: {}  now: {}  done: {}",
        input.cname,
        input.oname,
        input.budget,
        epoch_now() as u64,
        deadline as u64
    ));

    let mut seq = 1u64;
    while seq <= input.budget && epoch_now() < deadline && result.errors < config.errmax {
        let number = addressing::object_number(
            &mut rng,
            input.test.random,
            config.objopts.flat,
            offset,
            seq,
            input.csize,
        );
        let objname = addressing::object_name(&input.oname, number);
        seq += 1;

        let op_start = epoch_now();
        let timer = Instant::now();
        let outcome = match input.test.op {
            Operation::Put => client
                .put_object(&input.cname, &objname, payload)
                .map(|r| r.transaction_id),
            Operation::Get => client.get_object(&input.cname, &objname).and_then(|resp| {
                // read the whole chunk stream, latency covers the full body
                let mut body = resp.body;
                std::io::copy(&mut body, &mut std::io::sink())
                    .map_err(|e| ClientError::Fault(format!("body read failed: {}", e)))?;
                Ok(resp.transaction_id)
            }),
            Operation::Delete => client
                .delete_object(&input.cname, &objname)
                .map(|r| r.transaction_id),
        };

        let txid = match outcome {
            Ok(txid) => txid,
            Err(ClientError::Api { status }) => {
                if !config.quiet {
                    eprintln!(
                        "{} {} {}/{} apierror {} on worker: {}",
                        Local::now().format("%H:%M:%S"),
                        input.test.name(),
                        input.cname,
                        objname,
                        status,
                        input.worker
                    );
                }
                log.error(status);
                result.errors += 1;
                continue;
            }
            Err(ClientError::Fault(message)) => {
                log.trace(&format!("{} fault: {}", input.test.name(), message));
                return fault(format!(
                    "Unexpected Error - {} failure: {}",
                    input.test.name(),
                    message
                ));
            }
        };

        let latency = timer.elapsed().as_secs_f64();
        result.record_latency(latency, granularity);

        let log_slow = config.logmask & LOG_SLOW != 0
            && config
                .loglat
                .get(size_index)
                .map(|&threshold| latency > threshold)
                .unwrap_or(false);
        if config.logmask & LOG_LATENCIES != 0 || log_slow {
            log.latency(op_start, latency, &txid, &input.cname, &objname);
        }

        if let Some((lo, hi)) = config.latexc {
            if latency >= lo && latency <= hi {
                eprintln!(
                    "Host: {} -- Warning: {} {} latency exception: {:6.3} secs ObjSize: {} TransID: {} Obj: {}/{}",
                    host_name(),
                    utc_stamp(op_start),
                    input.test.name(),
                    latency,
                    payload.len(),
                    txid,
                    input.cname,
                    objname
                );
                if config.warnexit {
                    break;
                }
            }
        }
    }

    result.elapsed = started.elapsed().as_secs_f64();
    log.trace(&format!(
        "Done!  time: {:.6} ops: {} errs: {}",
        result.elapsed, result.ops, result.errors
    ));
    client.close();

    WorkerOutcome::Completed(result)
}

enum SyncOutcome {
    Started,
    AlreadyPassed,
}

/// One iteration of the sync wait: how long to sleep, and whether to issue
/// a keep-alive afterwards
///
/// The slice is capped at [`SYNC_SLEEP_MAX`]; the keep-alive fires only when
/// more than [`SYNC_KEEPALIVE_MIN`] seconds of wait will remain after the
/// sleep.
fn sync_slice(now: f64, sync: f64) -> (f64, bool) {
    let remaining = sync - now;
    let slice = remaining.min(SYNC_SLEEP_MAX);
    (slice, remaining - slice > SYNC_KEEPALIVE_MIN)
}

/// Block until the synchronized-start epoch
///
/// Sleeps in slices of at most [`SYNC_SLEEP_MAX`] seconds, issuing a
/// keep-alive account fetch between slices whenever enough wait remains.
/// Returns `AlreadyPassed` only when the epoch lies in the past AND
/// warnexit asks the worker to give up.
fn wait_for_sync(config: &RunConfig, client: &mut dyn ObjectClient, sync: u64) -> SyncOutcome {
    let sync = sync as f64;
    if epoch_now() >= sync {
        if !config.quiet {
            eprintln!("warning: Sync time passed...");
        }
        if config.warnexit {
            return SyncOutcome::AlreadyPassed;
        }
        return SyncOutcome::Started;
    }

    while epoch_now() < sync {
        let (slice, keepalive) = sync_slice(epoch_now(), sync);
        if slice > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(slice));
        }
        if keepalive {
            // failures here are harmless, the real operations will tell
            let _ = client.head_account();
        }
    }
    SyncOutcome::Started
}
