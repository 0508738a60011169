use std::sync::Arc;

use crate::{
    dedup::DedupGuard, fetch::Fetch, ffmpeg::Transform, submission::SubmissionTracker,
    tmp_file::ArcTmpDir,
};

#[derive(Clone)]
pub(crate) struct State<T> {
    pub(super) tmp_dir: ArcTmpDir,
    pub(super) transport: T,
    pub(super) fetcher: Arc<dyn Fetch>,
    pub(super) transform: Arc<dyn Transform>,
    pub(super) tracker: Arc<SubmissionTracker>,
    pub(super) dedup: Arc<DedupGuard>,
}
