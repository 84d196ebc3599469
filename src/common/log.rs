use std::time::Instant;

use tracing::trace;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;

const DEFAULT_FILTER: &str = "phone_shell=info";

pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let tree = HierarchicalLayer::new(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_writer(std::io::stderr);
    if let Err(e) = tracing_subscriber::registry().with(filter).with(tree).try_init() {
        eprintln!("logging already initialized: {e}");
    }
}

/// Runs `f` and records how long it took at trace level.
pub fn trace_misc<T>(desc: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    trace!(target: "phone_shell::timing", "{desc} took {:?}", start.elapsed());
    out
}
