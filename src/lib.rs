mod config;
mod crop;
mod dedup;
mod error;
mod error_code;
mod fetch;
mod ffmpeg;
mod future;
mod init_metrics;
mod init_tracing;
mod process;
mod state;
mod submission;
mod sync;
mod tmp_file;
pub mod transport;

use std::{sync::Arc, time::Duration};

use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

use self::{
    config::Configuration,
    dedup::DedupGuard,
    fetch::HttpFetcher,
    ffmpeg::FfMpeg,
    init_tracing::init_tracing,
    state::State,
    submission::SubmissionTracker,
    tmp_file::TmpDir,
    transport::{InboundEvent, Transport},
};

const MEBIBYTES: u64 = 1024 * 1024;

/// Assets whose declared size exceeds this are rejected before download.
pub(crate) const MAX_ASSET_BYTES: u64 = 49 * MEBIBYTES;

pub struct RoundelConfiguration {
    config: Configuration,
}

impl RoundelConfiguration {
    /// Build the roundel configuration from commandline arguments
    pub fn build_default() -> color_eyre::Result<Self> {
        Ok(RoundelConfiguration {
            config: config::configure()?,
        })
    }

    /// Install the default roundel tracer
    ///
    /// This is probably not useful for applications that install their own
    /// tracing subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;

        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;

            init_metrics::init_metrics();
        }

        Ok(self)
    }

    /// Serve inbound events until the stream ends.
    ///
    /// Events are handled as independent tasks spawned on the current
    /// thread, so this must run inside a `tokio::task::LocalSet`.
    pub async fn run<T, S>(self, transport: T, events: S) -> color_eyre::Result<()>
    where
        T: Transport + Clone + 'static,
        S: futures_core::Stream<Item = InboundEvent>,
    {
        let RoundelConfiguration { config } = self;

        let client = build_client(&config)?;

        let tmp_dir = TmpDir::init(&config.media.temporary_directory).await?;

        let process_concurrency = config.media.process_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        });

        let state = State {
            tmp_dir: tmp_dir.clone(),
            transport,
            fetcher: Arc::new(HttpFetcher::new(client)),
            transform: Arc::new(FfMpeg::new(
                Arc::new(sync::bare_semaphore(process_concurrency)),
                config.media.process_timeout,
            )),
            tracker: Arc::new(SubmissionTracker::new(
                config.sessions.capacity,
                Duration::from_secs(config.sessions.ttl_seconds),
            )),
            dedup: Arc::new(DedupGuard::new(config.sessions.dedup_capacity)),
        };

        let mut events = std::pin::pin!(events);

        while let Some(event) =
            std::future::poll_fn(|cx| futures_core::Stream::poll_next(events.as_mut(), cx)).await
        {
            sync::spawn("handle-event", ingest(state.clone(), event));
        }

        tmp_dir.cleanup().await?;

        Ok(())
    }
}

/// Dedup-check an inbound event, then dispatch it to the submission state
/// machine. Every failure is caught here; none crash the handling task.
#[tracing::instrument(skip(state, event), fields(event = event.id().as_str()))]
pub(crate) async fn ingest<T>(state: State<T>, event: InboundEvent)
where
    T: Transport,
{
    if !state.dedup.check_and_mark(event.id()) {
        tracing::trace!("Skipping duplicate event");

        return;
    }

    let res = match event {
        InboundEvent::Command { owner, command, .. } => {
            submission::on_command(&state, &owner, command).await
        }
        InboundEvent::MediaUpload { id, owner, upload } => {
            submission::intake(&state, &id, &owner, upload).await
        }
        InboundEvent::Text { owner, text, .. } => submission::on_text(&state, &owner, &text).await,
        InboundEvent::Selection { owner, token, .. } => {
            submission::on_selection(&state, &owner, &token).await
        }
    };

    if let Err(e) = res {
        tracing::error!(
            code = %e.error_code(),
            "Failed handling inbound event: {}",
            e.root_cause()
        );
    }
}

fn build_client(config: &Configuration) -> color_eyre::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .user_agent("roundel v0.1.0-main")
        .use_rustls_tls()
        .timeout(Duration::from_secs(config.client.timeout))
        .pool_max_idle_per_host(config.client.pool_size)
        .build()?;

    Ok(ClientBuilder::new(client)
        .with(TracingMiddleware::default())
        .build())
}
