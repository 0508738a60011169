use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use url::Url;

use crate::config::primitives::LogFormat;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            save_to,
            log_format,
            log_targets,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            metrics_prometheus_address,
            temporary_directory,
            media_process_timeout,
            media_process_concurrency,
            client_timeout,
            client_pool_size,
            sessions_capacity,
            sessions_ttl,
            sessions_dedup_capacity,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets,
            },
        };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let media = Media {
            temporary_directory,
            process_timeout: media_process_timeout,
            process_concurrency: media_process_concurrency,
        };

        let client = Client {
            timeout: client_timeout,
            pool_size: client_pool_size,
        };

        let sessions = Sessions {
            capacity: sessions_capacity,
            ttl_seconds: sessions_ttl,
            dedup_capacity: sessions_dedup_capacity,
        };

        Output {
            config_format: ConfigFormat {
                tracing,
                metrics,
                media,
                client,
                sessions,
            },
            config_file,
            save_to,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) config_file: Option<PathBuf>,
    pub(super) save_to: Option<PathBuf>,
}

/// Run the video-note cropping service
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub(super) struct Args {
    /// Path to a config file to read
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Path to write the resolved config to
    #[arg(long)]
    save_to: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<String>,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,

    /// Service name to relay to OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,

    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<String>,

    /// Address to expose prometheus metrics on
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// Temporary directory for scratch files
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Timeout in seconds for external media-toolchain invocations
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// How many external media-toolchain invocations may run at once
    #[arg(long)]
    media_process_concurrency: Option<usize>,

    /// Timeout in seconds for asset downloads
    #[arg(long)]
    client_timeout: Option<u64>,

    /// Pool size for the download client
    #[arg(long)]
    client_pool_size: Option<usize>,

    /// How many pending submissions to keep before evicting the oldest
    #[arg(long)]
    sessions_capacity: Option<usize>,

    /// Seconds a pending submission may wait for a selection
    #[arg(long)]
    sessions_ttl: Option<u64>,

    /// How many event ids the dedup guard remembers per generation
    #[arg(long)]
    sessions_dedup_capacity: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    client: Client,
    sessions: Sessions,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<String>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<String>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_concurrency: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Client {
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool_size: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sessions {
    #[serde(skip_serializing_if = "Option::is_none")]
    capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dedup_capacity: Option<usize>,
}
