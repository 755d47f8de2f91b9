use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over the verbose flag.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose { "benefitsim=debug,info" } else { "benefitsim=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init();
}

pub fn log_patient_event(component: &str, request_id: &str, event: &str, message: &str) {
    tracing::info!("[{}][request:{}][{}] {}", component, request_id, event, message);
}
