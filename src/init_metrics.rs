pub(super) fn init_metrics() {
    describe_submission();
    describe_dedup();
    describe_process();
    describe_ffmpeg();
}

fn describe_submission() {
    metrics::describe_counter!(
        SUBMISSION_CREATED,
        "How many submissions have been created"
    );
    metrics::describe_counter!(
        SUBMISSION_DELIVERED,
        "How many submissions have been delivered as video notes"
    );
    metrics::describe_counter!(
        SUBMISSION_FAILED,
        "How many submissions have failed, labeled by error code"
    );
}

pub(crate) const SUBMISSION_CREATED: &str = "roundel.submission.created";
pub(crate) const SUBMISSION_DELIVERED: &str = "roundel.submission.delivered";
pub(crate) const SUBMISSION_FAILED: &str = "roundel.submission.failed";

fn describe_dedup() {
    metrics::describe_counter!(
        DUPLICATE_EVENT,
        "How many inbound events have been dropped as duplicate deliveries"
    );
}

pub(crate) const DUPLICATE_EVENT: &str = "roundel.dedup.duplicate-event";

fn describe_process() {
    metrics::describe_counter!(PROCESS_START, "How many times a process has been spawned");
    metrics::describe_counter!(
        PROCESS_END,
        "How many times a process has completed, by command and completion status"
    );
    metrics::describe_histogram!(
        PROCESS_DURATION,
        "How long processes took to complete, by command and completion status"
    );
}

pub(crate) const PROCESS_START: &str = "roundel.process.start";
pub(crate) const PROCESS_END: &str = "roundel.process.end";
pub(crate) const PROCESS_DURATION: &str = "roundel.process.duration";

fn describe_ffmpeg() {
    metrics::describe_histogram!(
        PROBE_DURATION,
        "How long probing video dimensions took, including queueing for a permit"
    );
    metrics::describe_histogram!(
        PREVIEW_DURATION,
        "How long extracting a preview frame took, including queueing for a permit"
    );
    metrics::describe_histogram!(
        TRANSCODE_DURATION,
        "How long transcoding a video note took, including queueing for a permit"
    );
}

pub(crate) const PROBE_DURATION: &str = "roundel.ffmpeg.probe-duration";
pub(crate) const PREVIEW_DURATION: &str = "roundel.ffmpeg.preview-duration";
pub(crate) const TRANSCODE_DURATION: &str = "roundel.ffmpeg.transcode-duration";
