//! Sandboxed conversion worker.
//!
//! Started by the parent's queue with a JSON job request on stdin; replies
//! on stdout. Logging goes to stderr so stdout stays a clean reply channel.

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(corkboard_convert::sandbox::run_worker_entry());
}
