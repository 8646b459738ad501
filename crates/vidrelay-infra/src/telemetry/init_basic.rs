use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidrelay_core::LogFormat;

/// Filter used by the binary when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,aws_config=warn,aws_smithy_runtime=warn,hyper=warn";

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_filter`.
///
/// `Json` emits one object per event for log shippers; `Pretty` is for terminals.
pub fn init_telemetry(
    format: LogFormat,
    default_filter: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?,
    }

    tracing::info!(format = ?format, "Telemetry initialized");
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
