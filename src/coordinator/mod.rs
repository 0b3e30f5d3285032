//! Worker pool coordination and run orchestration
//!
//! The coordinator owns the whole run: it establishes the parent connection
//! whose token pair all workers reuse, prepares containers before dispatch,
//! builds one [`WorkerInput`] per worker, runs the pool with true
//! parallelism, and hands completed batches to the aggregator. A fault in
//! any worker aborts aggregation for that batch only; the run moves on to
//! the next batch.

use crate::addressing;
use crate::client::{ClientError, Connector, ObjectClient, Preauth};
use crate::config::{Operation, RunConfig, TestKind, Topology};
use crate::stats::aggregator::{self, BatchSummary};
use crate::stats::{WorkerFault, WorkerOutcome, WorkerResult};
use crate::util::cpu::CpuSnapshot;
use crate::util::epoch_now;
use crate::util::payload::build_payload;
use crate::worker::{run_worker, WorkerInput};
use crate::{output, Result};
use anyhow::{anyhow, bail};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stagger between container creations, so a large by-proc batch does not
/// hit the service with a thundering herd of PUT container calls
const CREATE_STAGGER: Duration = Duration::from_millis(10);

/// What the pool produced for one batch
#[derive(Debug)]
pub enum BatchOutcome {
    /// All workers completed, results ordered by worker index
    Completed(Vec<WorkerResult>),
    /// At least one worker died; no aggregation for this batch
    Faulted(WorkerFault),
}

/// Run one batch of workers to completion
///
/// Each worker gets its own OS thread and its own connection; the pool
/// blocks until every member has finished. There is no streaming
/// consumption of results while workers run.
pub fn run_pool(
    config: &RunConfig,
    connector: &dyn Connector,
    inputs: &[WorkerInput],
    payload: &[u8],
    size_index: usize,
    log_dir: &Path,
) -> Result<BatchOutcome> {
    let outcomes: Vec<WorkerOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                scope.spawn(move || run_worker(config, connector, input, payload, size_index, log_dir))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("worker thread panicked")))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            WorkerOutcome::Completed(result) => results.push(result),
            WorkerOutcome::Fault(fault) => return Ok(BatchOutcome::Faulted(fault)),
        }
    }
    Ok(BatchOutcome::Completed(results))
}

/// The full benchmark run: repeats x worker counts x sizes x tests
pub struct Harness<'a> {
    config: &'a RunConfig,
    connector: &'a dyn Connector,
    log_dir: PathBuf,
}

impl<'a> Harness<'a> {
    pub fn new(config: &'a RunConfig, connector: &'a dyn Connector, log_dir: PathBuf) -> Self {
        Self {
            config,
            connector,
            log_dir,
        }
    }

    /// Execute every batch, printing report lines as batches complete
    ///
    /// Returns the summaries of all successfully aggregated batches, in
    /// execution order.
    pub fn run(&self) -> Result<Vec<BatchSummary>> {
        let config = self.config;
        let (mut parent, preauth) = self.establish_parent()?;

        let mut summaries = Vec::new();
        let mut header_printed = false;
        let mut first_test = true;
        let mut payload: Vec<u8> = Vec::new();
        let mut last_size = u64::MAX;

        for _rep in 0..config.repeats {
            for &workers in &config.procset {
                // each worker-count section gets a fresh header unless the
                // whole set is repeating
                if config.repeats == 1 {
                    header_printed = false;
                }
                let budgets = config.nobjects.per_worker(workers)?;

                for (size_index, &object_size) in config.sizes.iter().enumerate() {
                    if object_size != last_size {
                        payload = build_payload(object_size, config.objopts.compressible);
                        last_size = object_size;
                    }

                    let mut puts_per_worker = vec![0u64; workers];
                    let mut run_epoch = 0u64;

                    for &test in &config.tests {
                        let stime = config.synctime.unwrap_or(epoch_now() as u64);

                        // a sequential PUT (or a run with no PUT at all) uses the
                        // requested budgets and stamps the run epoch; everything
                        // after a PUT works on what that PUT actually wrote
                        let uses_requested_budget =
                            (test.op == Operation::Put && !test.random) || !config.has_put();
                        if uses_requested_budget {
                            run_epoch = stime;
                        }
                        let batch_budgets: &[u64] = if uses_requested_budget {
                            &budgets
                        } else {
                            &puts_per_worker
                        };

                        let inputs = self.prepare_batch(
                            parent.as_mut(),
                            test,
                            workers,
                            run_epoch,
                            stime,
                            batch_budgets,
                            first_test,
                            &preauth,
                        )?;

                        let outcome = run_pool(
                            config,
                            self.connector,
                            &inputs,
                            &payload,
                            size_index,
                            &self.log_dir,
                        )?;
                        first_test = false;

                        let results = match outcome {
                            BatchOutcome::Faulted(fault) => {
                                println!(
                                    "{} (worker {}), check the worker trace logs on the remote node for more clues",
                                    fault.message, fault.worker
                                );
                                continue;
                            }
                            BatchOutcome::Completed(results) => results,
                        };

                        if test.op == Operation::Put && !test.random {
                            // a wall-clock deadline may have cut the PUT short;
                            // the following GET/DELETE must see the real counts
                            for result in &results {
                                puts_per_worker[result.worker] = result.ops;
                            }
                        }

                        let summary = aggregator::aggregate(
                            test,
                            &results,
                            object_size,
                            stime,
                            epoch_now() as u64,
                            CpuSnapshot::take(),
                        );
                        output::print_report(config, &summary, run_epoch, &mut header_printed);

                        if test.op == Operation::Put && !test.random && config.putsperproc {
                            let counts: Vec<String> =
                                puts_per_worker.iter().map(|n| n.to_string()).collect();
                            println!("PutsPerProc: {}", counts.join(":"));
                        }

                        if test.op == Operation::Delete && !test.random && !config.cont_nodelete {
                            self.cleanup_containers(parent.as_mut(), run_epoch, workers);
                        }

                        let errors = summary.total_errors;
                        summaries.push(summary);
                        if errors > 0 && config.warnexit {
                            return Ok(summaries);
                        }
                    }
                }
            }
        }
        Ok(summaries)
    }

    /// Connect the parent and settle the token pair workers will share
    ///
    /// Workers cannot reuse the parent's connection, but they can reuse its
    /// auth: one round-trip covers the whole run. With proxies, the URL part
    /// is rebuilt per worker; only the token matters.
    fn establish_parent(&self) -> Result<(Box<dyn ObjectClient>, Option<Preauth>)> {
        let config = self.config;
        if config.proxies.is_empty() || config.preauthtoken.is_empty() {
            let parent = self
                .connector
                .connect(None)
                .map_err(|e| anyhow!("Error: client connect error: {}", e))?;
            let preauth = parent.auth();
            return Ok((parent, Some(preauth)));
        }

        // operator-supplied token: the parent itself goes through a proxy
        let preauth = Preauth {
            url: format!(
                "https://{}/v1/{}",
                config.proxies[0],
                config.project_id()
            ),
            token: config.preauthtoken.clone(),
        };
        let parent = self
            .connector
            .connect(Some(&preauth))
            .map_err(|e| anyhow!("Error: client connect error: {}", e))?;
        Ok((parent, Some(preauth)))
    }

    /// Prepare containers and build one input descriptor per worker
    ///
    /// Container checks and creations happen once per distinct name, before
    /// any worker is dispatched; workers themselves never manage containers.
    #[allow(clippy::too_many_arguments)]
    fn prepare_batch(
        &self,
        parent: &mut dyn ObjectClient,
        test: TestKind,
        workers: usize,
        run_epoch: u64,
        stime: u64,
        budgets: &[u64],
        first_test: bool,
        preauth: &Option<Preauth>,
    ) -> Result<Vec<WorkerInput>> {
        let config = self.config;
        let mut seen = HashSet::new();
        let mut inputs = Vec::with_capacity(workers);
        let mut csize = 0u64;

        for worker in 0..workers {
            let cname = addressing::container_name(
                &config.cname,
                config.ctype,
                config.utc,
                run_epoch,
                config.rank,
                worker as u64,
            );
            let distinct = seen.insert(cname.clone());

            if distinct && test.op != Operation::Put {
                // GET/DELETE targets must exist before anything starts
                match parent.head_container(&cname) {
                    Ok(info) => csize = info.object_count,
                    Err(ClientError::Api { status: 404 }) => {
                        bail!("container '{}' doesn't exist", cname)
                    }
                    Err(err) => bail!("Error {} trying to access '{}'", err, cname),
                }
            } else if distinct && (config.objopts.flat || config.objopts.append || test.random) {
                // flat/append PUTs number objects after whatever is already
                // in the container, so its size must be known up front
                match parent.head_container(&cname) {
                    Ok(info) => csize = info.object_count,
                    Err(ClientError::Api { status: 404 }) => {
                        eprintln!("warning: creating '{}' in append mode", cname);
                        csize = 0;
                    }
                    Err(err) => bail!("head_container error: {} on '{}'", err, cname),
                }
            }

            if distinct && test.op == Operation::Put && !test.random && csize == 0 {
                std::thread::sleep(CREATE_STAGGER);
                parent
                    .put_container(&cname)
                    .map_err(|e| anyhow!("Error: put_container failure: {}", e))?;
            }

            let oname = addressing::object_prefix(
                &config.oname,
                config.objopts,
                test.random,
                run_epoch,
                config.rank,
                worker as u64,
            );

            inputs.push(WorkerInput {
                worker,
                workers,
                preauth: preauth.clone(),
                cname,
                csize,
                oname,
                budget: budgets[worker],
                test,
                start_epoch: stime,
                first_test,
            });
        }
        Ok(inputs)
    }

    /// Delete the batch's containers after a sequential DELETE test
    fn cleanup_containers(&self, parent: &mut dyn ObjectClient, run_epoch: u64, workers: usize) {
        let config = self.config;
        let count = match config.ctype {
            Topology::ByProc => workers as u64,
            _ => 1,
        };
        for worker in 0..count {
            let cname = addressing::container_name(
                &config.cname,
                config.ctype,
                config.utc,
                run_epoch,
                config.rank,
                worker,
            );
            match parent.delete_container(&cname) {
                Ok(()) => {}
                Err(ClientError::Api { status: 409 }) => {
                    println!("container {} is not empty and so couldn't delete", cname);
                }
                Err(ClientError::Api { status }) => {
                    println!("error {} deleting container {}", status, cname);
                }
                Err(err) => {
                    println!("Unexpected Error - delete_container failure: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockConnector;
    use crate::config::creds::Credentials;
    use crate::config::{ObjectBudget, ObjectOpts};

    fn test_config(codes: &str) -> RunConfig {
        let tests = codes
            .chars()
            .filter(|c| *c != ',')
            .map(|c| TestKind::from_code(c).unwrap())
            .collect();
        RunConfig {
            tests,
            cname: "cont".into(),
            oname: "obj".into(),
            sizes: vec![64],
            nobjects: ObjectBudget::Uniform(Some(5)),
            runtime: None,
            ctype: Topology::Shared,
            objopts: ObjectOpts::default(),
            rank: 0,
            procset: vec![2],
            repeats: 1,
            synctime: None,
            errmax: 5,
            latexc: None,
            ldist: Some(0),
            nohead: true,
            psum: false,
            putsperproc: false,
            quiet: true,
            utc: false,
            warnexit: false,
            cont_nodelete: false,
            proxies: vec![],
            preauthtoken: String::new(),
            creds: Credentials::default(),
            logmask: 0,
            loglat: vec![],
        }
    }

    fn harness<'a>(config: &'a RunConfig, connector: &'a MockConnector) -> Harness<'a> {
        Harness::new(config, connector, std::env::temp_dir())
    }

    #[test]
    fn test_put_get_delete_run() {
        let config = test_config("p,g,d");
        let connector = MockConnector::new();

        let summaries = harness(&config, &connector).run().unwrap();
        assert_eq!(summaries.len(), 3);

        // 2 workers x 5 objects per phase
        for summary in &summaries {
            assert_eq!(summary.total_ops, 10);
            assert_eq!(summary.total_errors, 0);
            assert_eq!(summary.histogram.total(), 10);
            assert_eq!(summary.workers, 2);
        }

        // aggregated ops equal the per-worker sums
        let per_worker_ops: u64 = summaries[0].per_worker.iter().map(|w| w.ops).sum();
        assert_eq!(per_worker_ops, summaries[0].total_ops);

        // the delete batch emptied and removed the container
        let store = connector.store();
        assert_eq!(store.lock().unwrap().object_count("cont"), None);
    }

    #[test]
    fn test_parent_connect_failure_ends_run() {
        let config = test_config("p");
        let connector = MockConnector::new();
        connector.fail_next_connect(ClientError::Fault("refused".into()));

        let err = harness(&config, &connector).run().unwrap_err();
        assert!(err.to_string().contains("connect"));
    }

    #[test]
    fn test_fault_skips_batch_but_run_continues() {
        let config = test_config("p,p");
        let connector = MockConnector::new();
        // one worker in the first batch dies on an unclassified failure
        connector.fail_next_op(ClientError::Fault("wire dropped".into()));

        let summaries = harness(&config, &connector).run().unwrap();
        // no summary for the faulted batch, the second PUT still ran
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_ops, 10);
    }

    #[test]
    fn test_get_against_missing_container_is_config_error() {
        let config = test_config("g");
        let connector = MockConnector::new();
        let err = harness(&config, &connector).run().unwrap_err();
        assert!(err.to_string().contains("doesn't exist"));
    }

    #[test]
    fn test_runtime_bounded_put_budgets_flow_to_get() {
        let mut config = test_config("p,g");
        config.nobjects = ObjectBudget::Uniform(None);
        config.runtime = Some(1);
        config.procset = vec![1];
        let connector = MockConnector::new();
        connector.set_op_delay(Duration::from_millis(5));

        let summaries = harness(&config, &connector).run().unwrap();
        assert_eq!(summaries.len(), 2);
        let put_ops = summaries[0].total_ops;
        // the deadline cut the PUT well short of the unbounded budget
        assert!(put_ops > 0 && put_ops < crate::config::UNBOUNDED_OBJECTS);
        // GET re-read exactly what PUT wrote, no 404s
        assert_eq!(summaries[1].total_ops, put_ops);
        assert_eq!(summaries[1].total_errors, 0);
    }

    #[test]
    fn test_per_worker_budgets() {
        let mut config = test_config("p");
        config.nobjects = ObjectBudget::PerWorker(vec![3, 7]);
        let connector = MockConnector::new();

        let summaries = harness(&config, &connector).run().unwrap();
        assert_eq!(summaries[0].total_ops, 10);
        let ops: Vec<u64> = summaries[0].per_worker.iter().map(|w| w.ops).collect();
        assert_eq!(ops, vec![3, 7]);
    }

    #[test]
    fn test_byproc_creates_one_container_per_worker() {
        let mut config = test_config("p");
        config.ctype = Topology::ByProc;
        let connector = MockConnector::new();

        harness(&config, &connector).run().unwrap();
        let store = connector.store();
        let store = store.lock().unwrap();
        assert_eq!(store.object_count("cont-0-0"), Some(5));
        assert_eq!(store.object_count("cont-0-1"), Some(5));
    }

    #[test]
    fn test_cont_nodelete_keeps_containers() {
        let mut config = test_config("p,d");
        config.cont_nodelete = true;
        let connector = MockConnector::new();

        harness(&config, &connector).run().unwrap();
        let store = connector.store();
        // emptied by the delete test but still present
        assert_eq!(store.lock().unwrap().object_count("cont"), Some(0));
    }

    #[test]
    fn test_warnexit_stops_after_errored_batch() {
        let mut config = test_config("p,g,d");
        config.warnexit = true;
        let connector = MockConnector::new();
        connector.fail_next_op(ClientError::Api { status: 500 });

        let summaries = harness(&config, &connector).run().unwrap();
        // the PUT batch reported its error and the run stopped there
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_errors, 1);
    }

    #[test]
    fn test_repeats_multiply_batches() {
        let mut config = test_config("p");
        config.repeats = 3;
        let connector = MockConnector::new();

        let summaries = harness(&config, &connector).run().unwrap();
        assert_eq!(summaries.len(), 3);
    }
}
