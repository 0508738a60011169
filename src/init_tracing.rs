use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::Config, Resource};
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::Targets, fmt::format::FmtSpan, layer::SubscriberExt, Layer, Registry,
};

use crate::config;

pub(super) fn init_tracing(tracing: &config::Tracing) -> color_eyre::Result<()> {
    color_eyre::install()?;

    LogTracer::init()?;

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let targets: Targets = tracing.logging.targets.parse()?;

    let format_layer =
        tracing_subscriber::fmt::layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    match tracing.logging.format {
        config::LogFormat::Compact => with_format(format_layer.compact(), tracing, targets),
        config::LogFormat::Json => with_format(format_layer.json(), tracing, targets),
        config::LogFormat::Normal => with_format(format_layer, tracing, targets),
        config::LogFormat::Pretty => with_format(format_layer.pretty(), tracing, targets),
    }
}

fn with_format<F>(
    format_layer: F,
    tracing: &config::Tracing,
    targets: Targets,
) -> color_eyre::Result<()>
where
    F: Layer<Registry> + Send + Sync + 'static,
{
    let subscriber = Registry::default()
        .with(format_layer.with_filter(targets))
        .with(ErrorLayer::default());

    if let Some(url) = &tracing.opentelemetry.url {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_trace_config(Config::default().with_resource(Resource::new(vec![
                KeyValue::new(
                    "service.name",
                    tracing.opentelemetry.service_name.clone(),
                ),
            ])))
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(url.as_str()),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let otel_targets: Targets = tracing.opentelemetry.targets.parse()?;

        let otel_layer = tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(otel_targets);

        set_global_default(subscriber.with(otel_layer))?;
    } else {
        set_global_default(subscriber)?;
    }

    Ok(())
}
