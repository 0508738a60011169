use std::path::PathBuf;

use crate::config::primitives::LogFormat;

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Defaults {
    tracing: TracingDefaults,
    metrics: MetricsDefaults,
    media: MediaDefaults,
    client: ClientDefaults,
    sessions: SessionsDefaults,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct TracingDefaults {
    logging: LoggingDefaults,

    opentelemetry: OpenTelemetryDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct LoggingDefaults {
    format: LogFormat,
    targets: String,
}

impl Default for LoggingDefaults {
    fn default() -> Self {
        LoggingDefaults {
            format: LogFormat::Normal,
            targets: String::from("info"),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetryDefaults {
    service_name: String,
    targets: String,
}

impl Default for OpenTelemetryDefaults {
    fn default() -> Self {
        OpenTelemetryDefaults {
            service_name: String::from("roundel"),
            targets: String::from("info"),
        }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MetricsDefaults {}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MediaDefaults {
    temporary_directory: PathBuf,
    process_timeout: u64,
}

impl Default for MediaDefaults {
    fn default() -> Self {
        MediaDefaults {
            temporary_directory: PathBuf::from(String::from("/tmp")),
            process_timeout: 120,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ClientDefaults {
    timeout: u64,
    pool_size: usize,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        ClientDefaults {
            timeout: 30,
            pool_size: 100,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct SessionsDefaults {
    capacity: usize,
    ttl_seconds: u64,
    dedup_capacity: usize,
}

impl Default for SessionsDefaults {
    fn default() -> Self {
        SessionsDefaults {
            capacity: 1024,
            ttl_seconds: 60 * 60,
            dedup_capacity: 4096,
        }
    }
}
