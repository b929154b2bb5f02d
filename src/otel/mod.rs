//! OpenTelemetry integration for session-authority
//!
//! This module provides observability through OpenTelemetry, including
//! tracing, metrics, and the `tracing` subscriber setup.

use crate::config::OtelConfig;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// OpenTelemetry provider
///
/// Owns the tracer and meter providers. OTLP export is only wired up when
/// enabled; otherwise metrics go to a local no-op reader.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;

            let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;
            let meter_provider = Self::init_meter_provider(endpoint, &resource)?;

            (Some(tracer_provider), meter_provider)
        } else {
            let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
            (None, meter_provider)
        };

        if let Some(ref tp) = tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            config: config.clone(),
        })
    }

    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        let trace_config = Config::default()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone());

        Ok(TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build())
    }

    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio).build();

        Ok(SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader)
            .build())
    }

    /// Get a tracer from the provider
    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        match self.tracer_provider {
            Some(ref tp) => tp.tracer(name),
            None => TracerProvider::builder().build().tracer(name),
        }
    }

    /// Get the meter for creating metrics
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flush and shut down both providers
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Err(e) = self.meter_provider.shutdown() {
            return Err(OtelError::Shutdown(format!(
                "Meter shutdown failed: {:?}",
                e
            )));
        }

        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                if let Err(e) = result {
                    return Err(OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Counters for the token lifecycle
pub struct AuthMetrics {
    /// Login attempts by outcome (`success`, `invalid_credentials`, `rate_limited`, `error`)
    pub logins_total: Counter<u64>,

    /// Validations by outcome (`valid` or the reject reason)
    pub validations_total: Counter<u64>,

    /// Refresh attempts by outcome (`success` or the reject reason)
    pub refreshes_total: Counter<u64>,

    /// Logout requests
    pub logouts_total: Counter<u64>,

    /// HTTP request processing duration in seconds
    pub request_duration: Histogram<f64>,
}

impl AuthMetrics {
    pub fn new(meter: &Meter) -> Self {
        let logins_total = meter
            .u64_counter("session_authority_logins_total")
            .with_description("Total number of login attempts")
            .init();

        let validations_total = meter
            .u64_counter("session_authority_validations_total")
            .with_description("Total number of token validations")
            .init();

        let refreshes_total = meter
            .u64_counter("session_authority_refreshes_total")
            .with_description("Total number of token refresh attempts")
            .init();

        let logouts_total = meter
            .u64_counter("session_authority_logouts_total")
            .with_description("Total number of logout requests")
            .init();

        let request_duration = meter
            .f64_histogram("session_authority_request_duration_seconds")
            .with_description("Request processing duration in seconds")
            .init();

        Self {
            logins_total,
            validations_total,
            refreshes_total,
            logouts_total,
            request_duration,
        }
    }

    /// Metrics backed by a meter that exports nowhere
    pub fn noop() -> Self {
        let provider = opentelemetry::metrics::noop::NoopMeterProvider::new();
        Self::new(&provider.meter("session-authority"))
    }

    pub fn record_login(&self, outcome: &str) {
        self.logins_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_validation(&self, outcome: &str) {
        self.validations_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_refresh(&self, outcome: &str) {
        self.refreshes_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_logout(&self) {
        self.logouts_total.add(1, &[]);
    }

    pub fn record_request_duration(&self, route: &str, duration_secs: f64) {
        self.request_duration
            .record(duration_secs, &[KeyValue::new("route", route.to_string())]);
    }
}

fn parse_level(log_level: &str) -> Level {
    match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the tracing subscriber
///
/// `log_format` is `json` or `pretty`; anything else falls back to JSON.
pub fn init_tracing(otel: &OtelProvider, log_level: &str, log_format: &str) -> Result<(), OtelError> {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(parse_level(log_level));

    let fmt_layer = if log_format.eq_ignore_ascii_case("pretty") {
        tracing_subscriber::fmt::layer().pretty().boxed()
    } else {
        tracing_subscriber::fmt::layer().json().boxed()
    };

    let otel_layer = otel.is_enabled().then(|| {
        tracing_opentelemetry::layer().with_tracer(otel.tracer("session-authority"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}
