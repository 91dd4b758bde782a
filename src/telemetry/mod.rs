//! Telemetry (§10.1): `tracing` spans and structured logs throughout the
//! engine, with an optional OpenTelemetry OTLP export path behind the
//! `otel` feature.
//!
//! As a library, this crate does not install a global subscriber on its
//! own — the host process owns that. `init_tracing_subscriber()` is a
//! convenience for binaries and tests that want a sane `RUST_LOG`-driven
//! default without reaching for OTEL.
//!
//! Grounded on the teacher's own `telemetry/mod.rs`, trimmed to the surface
//! this crate actually uses: the teacher's `instrumentation::HttpSpanContext`
//! helper is dropped since `#[tracing::instrument]` on `ReqwestRequester::perform`
//! already carries the same fields as span attributes directly.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Telemetry configuration. `otlp_endpoint`/`sampling_ratio` only take
/// effect when built with the `otel` feature.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub sampling_ratio: f64,
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "scenario-engine".to_string(),
            otlp_endpoint: None,
            sampling_ratio: 1.0,
            log_level: Level::INFO,
        }
    }
}

impl TelemetryConfig {
    /// Reads `OTEL_SERVICE_NAME`, `OTEL_EXPORTER_OTLP_ENDPOINT`, and
    /// `OTEL_TRACES_SAMPLER_ARG` (clamped to `0.0..=1.0`).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp_endpoint = Some(endpoint);
        }
        if let Ok(ratio) = std::env::var("OTEL_TRACES_SAMPLER_ARG") {
            if let Ok(r) = ratio.parse::<f64>() {
                config.sampling_ratio = r.clamp(0.0, 1.0);
            }
        }

        config
    }
}

/// Installs a plain `tracing-subscriber` fmt layer filtered by `RUST_LOG`
/// (falling back to `config.log_level`). The non-`otel` default path.
pub fn init_tracing_subscriber(config: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .try_init();
}

#[cfg(feature = "otel")]
pub use otel::{init_otel, shutdown_otel};

#[cfg(feature = "otel")]
mod otel {
    use super::TelemetryConfig;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::{global, KeyValue};
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime::Tokio;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
    use opentelemetry_sdk::{trace as sdktrace, Resource};
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    /// Installs a subscriber that exports spans to the OTLP endpoint named
    /// by `config.otlp_endpoint`. Falls back to `init_tracing_subscriber`
    /// if no endpoint is configured.
    pub fn init_otel(config: &TelemetryConfig) -> anyhow::Result<()> {
        let Some(endpoint) = &config.otlp_endpoint else {
            super::init_tracing_subscriber(config);
            return Ok(());
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));
        let tracer = build_tracer(&config.service_name, endpoint, config.sampling_ratio)?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(OpenTelemetryLayer::new(tracer))
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()?;

        Ok(())
    }

    pub fn shutdown_otel() {
        global::shutdown_tracer_provider();
    }

    fn build_tracer(service_name: &str, endpoint: &str, sampling_ratio: f64) -> anyhow::Result<Tracer> {
        let sampler = if sampling_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else if sampling_ratio <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(sampling_ratio)
        };

        let provider = TracerProvider::builder()
            .with_batch_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint)
                    .build_span_exporter()?,
                Tokio,
            )
            .with_config(
                sdktrace::Config::default()
                    .with_sampler(sampler)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(Resource::new(vec![KeyValue::new(
                        "service.name",
                        service_name.to_string(),
                    )])),
            )
            .build();

        let tracer = provider.tracer(service_name.to_string());
        global::set_tracer_provider(provider);
        Ok(tracer)
    }
}
