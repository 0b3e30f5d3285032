//! Result reporting
//!
//! Batches print as they complete, one summary line each, preceded by a
//! column header the first time through a section. `--psum` adds one detail
//! line per worker ahead of the total.

pub mod text;

use crate::config::RunConfig;
use crate::stats::aggregator::BatchSummary;

/// Print one batch's report lines to stdout
pub fn print_report(
    config: &RunConfig,
    summary: &BatchSummary,
    run_epoch: u64,
    header_printed: &mut bool,
) {
    if !config.nohead && !*header_printed {
        println!("{}", text::format_header(config));
        *header_printed = true;
    }
    if config.psum {
        for line in &summary.per_worker {
            println!("{}", text::format_worker_line(config, summary, line, run_epoch));
        }
    }
    println!("{}", text::format_summary_line(config, summary, run_epoch));
}
