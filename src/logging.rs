//! Tracing initialization. Level is driven by `RUST_LOG`, falling back
//! to `LOG_LEVEL`, falling back to `info`.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let filter = if verbose { filter.add_directive("scopeward=debug".parse().expect("valid directive")) } else { filter };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
