use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "otlp")]
use tracing_subscriber::Registry;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
    #[cfg(feature = "otlp")]
    #[error("otlp exporter error: {0}")]
    Otlp(#[from] opentelemetry::trace::TraceError),
    #[error("an otlp endpoint is configured but this build lacks the `otlp` feature")]
    OtlpUnavailable,
}

/// Flushes pending spans when dropped.
pub struct TelemetryGuard {
    otlp: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otlp")]
        if self.otlp {
            opentelemetry::global::shutdown_tracer_provider();
        }
        #[cfg(not(feature = "otlp"))]
        let _ = self.otlp;
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into())
}

#[cfg(feature = "otlp")]
fn otlp_layer(
    endpoint: &str,
) -> Result<impl Layer<Registry> + Send + Sync, TelemetryError> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::Resource;

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(Resource::new(
            vec![KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                "lab-provisioning",
            )],
        )))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(env_filter()))
}

/// Installs the global subscriber. Log lines go to stderr so that the
/// console menu and report echo on stdout stay readable.
///
/// With an `otlp_endpoint` (and the `otlp` feature) spans are exported too.
/// Must be called from within a tokio runtime in that case.
pub fn setup_telemetry(otlp_endpoint: Option<&str>) -> Result<TelemetryGuard, TelemetryError> {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter());

    #[cfg(feature = "otlp")]
    let exporter = match otlp_endpoint {
        Some(endpoint) => Some(otlp_layer(endpoint)?),
        None => None,
    };
    #[cfg(not(feature = "otlp"))]
    let exporter: Option<tracing_subscriber::layer::Identity> = match otlp_endpoint {
        Some(_) => return Err(TelemetryError::OtlpUnavailable),
        None => None,
    };
    let otlp = exporter.is_some();

    tracing_subscriber::registry()
        .with(exporter)
        .with(stderr_log)
        .try_init()?;

    Ok(TelemetryGuard { otlp })
}
