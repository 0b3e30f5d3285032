//! OSPulse CLI entry point

use ospulse::client::http::SwiftConnector;
use ospulse::config::cli::Cli;
use ospulse::config::RunConfig;
use ospulse::coordinator::Harness;
use ospulse::util::host_name;

/// On ^C, take down the whole process group so no worker thread lingers
/// mid-request
extern "C" fn terminate_process_group(_: libc::c_int) {
    unsafe {
        libc::kill(0, libc::SIGKILL);
    }
}

fn main() {
    let handler = terminate_process_group as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }

    let cli = Cli::parse_args();
    if let Err(err) = run(cli) {
        // multi-host runs interleave stderr from many ranks, so every
        // failure names the host it came from
        eprintln!("Error -- Host: {} ospulse: {:#}", host_name(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> ospulse::Result<()> {
    let config = RunConfig::from_cli(&cli)?;
    let connector = SwiftConnector::new(config.creds.clone());
    let harness = Harness::new(&config, &connector, std::env::temp_dir());
    harness.run()?;
    Ok(())
}
