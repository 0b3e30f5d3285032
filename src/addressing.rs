//! Container and object addressing
//!
//! Pure functions mapping (topology, rank, worker index, operation sequence
//! number) to container and object names. Keyspaces across ranks and workers
//! are disjoint (or intentionally shared) by construction; no runtime
//! coordination is involved, so PUT, GET and DELETE phases of separate
//! invocations address the same objects as long as they use the same inputs.

use crate::config::{ObjectOpts, Topology};
use rand::Rng;

/// Base object number for one worker's sequential operations
///
/// Under the shared topology every (rank, worker) pair owns a disjoint range
/// of `objects_per_worker` numbers; by-node containers only partition across
/// local workers; by-proc containers are private, so no offset is needed.
/// Append mode shifts the whole range past a container's pre-existing
/// objects instead of overwriting them.
pub fn compute_offset(
    topology: Topology,
    objects_per_worker: u64,
    workers: u64,
    rank: u64,
    worker: u64,
    csize: u64,
    append: bool,
) -> u64 {
    let mut offset = match topology {
        Topology::Shared => objects_per_worker * workers * rank + objects_per_worker * worker,
        Topology::ByNode => objects_per_worker * worker,
        Topology::ByProc => 0,
    };
    if append {
        offset += csize;
    }
    offset
}

/// Object number for operation `seq` (1-based)
///
/// Random access draws uniformly from the container's existing objects;
/// flat hierarchies use the worker's offset range; everything else numbers
/// objects per worker from 1.
pub fn object_number<R: Rng>(
    rng: &mut R,
    random: bool,
    flat: bool,
    offset: u64,
    seq: u64,
    csize: u64,
) -> u64 {
    if random {
        rng.gen_range(1..=csize.max(1))
    } else if flat {
        offset + seq
    } else {
        seq
    }
}

/// Container name for one worker
///
/// Grammar: base, then the run epoch in utc mode (shared by every worker of
/// the invocation), then `-rank` for by-node, then `-rank-worker` for
/// by-proc.
pub fn container_name(
    base: &str,
    topology: Topology,
    utc: bool,
    run_epoch: u64,
    rank: u64,
    worker: u64,
) -> String {
    let mut name = base.to_string();
    if utc {
        name.push_str(&format!("-{}", run_epoch));
    }
    match topology {
        Topology::Shared => {}
        Topology::ByNode => name.push_str(&format!("-{}", rank)),
        Topology::ByProc => name.push_str(&format!("-{}-{}", rank, worker)),
    }
    name
}

/// Object name prefix for one worker
///
/// The `-rank-worker` suffix namespaces sequential objects per worker; flat
/// hierarchies and random access drop it so every worker addresses the one
/// shared numeric namespace. Unique mode stamps the run epoch into the
/// prefix so repeated runs never collide.
pub fn object_prefix(
    base: &str,
    opts: ObjectOpts,
    random: bool,
    run_epoch: u64,
    rank: u64,
    worker: u64,
) -> String {
    let mut prefix = base.to_string();
    if opts.unique {
        prefix.push_str(&format!("-{}", run_epoch));
    }
    if !random && !opts.flat {
        prefix.push_str(&format!("-{}-{}", rank, worker));
    }
    prefix
}

/// Full object name for one numbered object
pub fn object_name(prefix: &str, number: u64) -> String {
    format!("{}-{}", prefix, number)
}
