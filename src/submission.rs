#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::{
    crop::{self, CropRect, Orientation},
    error::{Error, ProcessingError},
    fetch::{FetchError, FetchedAsset},
    ffmpeg::Dimensions,
    state::State,
    tmp_file::ScratchDir,
    transport::{
        AssetRef, Command, EventId, MediaUpload, OwnerId, SelectionButton, SelectionKind,
        SelectionToken, SubmissionId, Transport,
    },
};

const GREETING: &str = "Hi! Send me a video and I will turn it into a round video note.";

const HELP: &str = "Send a video (up to 49 MiB). I will ask which square region of the frame \
to keep, show a preview of the crop, and reply with a 480x480 video note trimmed to the \
first 60 seconds.\n\
\n\
/start - greeting\n\
/help - this message\n\
/reset - forget any pending crop selection";

const PROMPT_SELECTION: &str = "Which part of the frame should the note keep?";

const PROMPT_COORDS_HINT: &str = "Coordinates should look like 120:40. Try again.";

const STALE_SELECTION: &str = "That selection is no longer active. Send the video again.";

const NOT_WAITING: &str =
    "I am not waiting for coordinates right now. Send a video to get started.";

const RESET_DONE: &str = "Cleared your pending submissions. Send a new video whenever you like.";

const RESET_NOTHING: &str = "Nothing was pending. Send a video to get started.";

fn coords_prompt(dims: Dimensions) -> String {
    format!("Send the top-left corner of the 480x480 window as x:y. The frame is {dims}.")
}

/// A downloaded input, held together with the scratch directory it lives in.
pub(crate) struct FetchedInput {
    pub(crate) scratch: ScratchDir,
    pub(crate) asset: FetchedAsset,
}

pub(crate) enum SubmissionState {
    AwaitingSelection,
    AwaitingCustomCoords {
        dims: Dimensions,
        input: FetchedInput,
    },
}

/// One user-initiated video upload, tracked until it reaches a terminal
/// state. Terminal submissions are not stored; reaching Delivered or
/// Failed removes the record entirely.
pub(crate) struct Submission {
    pub(crate) id: SubmissionId,
    pub(crate) owner: OwnerId,
    pub(crate) asset: AssetRef,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) orientation: Orientation,
    pub(crate) state: SubmissionState,
    pub(crate) created: Instant,
}

impl Submission {
    /// Remove any scratch state without delivering anything.
    pub(crate) async fn discard(self) {
        if let SubmissionState::AwaitingCustomCoords { input, .. } = self.state {
            if let Err(e) = input.scratch.cleanup().await {
                tracing::warn!("Failed to remove scratch directory: {e}");
            }
        }
    }
}

/// In-memory store of non-terminal submissions, bounded by capacity and
/// age. The reference behavior never evicted; these bounds replace that
/// leak with deterministic pruning at insert time.
pub(crate) struct SubmissionTracker {
    pending: DashMap<SubmissionId, Submission>,
    awaiting_coords: DashMap<OwnerId, SubmissionId>,
    capacity: usize,
    ttl: Duration,
}

impl SubmissionTracker {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            awaiting_coords: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn prune(&self) {
        let now = Instant::now();

        let expired: Vec<SubmissionId> = self
            .pending
            .iter()
            .filter(|entry| now.duration_since(entry.created) > self.ttl)
            .map(|entry| entry.id.clone())
            .collect();

        for id in expired {
            tracing::debug!(submission = id.as_str(), "Expiring pending submission");
            drop(self.drop_entry(&id));
        }

        while self.pending.len() >= self.capacity {
            let oldest: Option<SubmissionId> = self
                .pending
                .iter()
                .min_by_key(|entry| entry.created)
                .map(|entry| entry.id.clone());

            let Some(id) = oldest else {
                break;
            };

            tracing::debug!(submission = id.as_str(), "Evicting pending submission");
            drop(self.drop_entry(&id));
        }
    }

    fn drop_entry(&self, id: &SubmissionId) -> Option<Submission> {
        let (_, submission) = self.pending.remove(id)?;

        self.awaiting_coords
            .remove_if(&submission.owner, |_, pending| pending == id);

        Some(submission)
    }

    pub(crate) fn insert_awaiting_selection(&self, submission: Submission) {
        self.prune();
        self.pending.insert(submission.id.clone(), submission);
    }

    pub(crate) fn insert_awaiting_coords(&self, submission: Submission) {
        self.prune();
        self.awaiting_coords
            .insert(submission.owner.clone(), submission.id.clone());
        self.pending.insert(submission.id.clone(), submission);
    }

    /// Claim a submission for processing, but only for its owner.
    pub(crate) fn take_if_owner(
        &self,
        id: &SubmissionId,
        owner: &OwnerId,
    ) -> Option<Submission> {
        let (_, submission) = self.pending.remove_if(id, |_, s| s.owner == *owner)?;

        self.awaiting_coords.remove_if(owner, |_, pending| pending == id);

        Some(submission)
    }

    /// Probed dimensions of the submission awaiting coordinates from this
    /// owner, if any.
    pub(crate) fn coords_target(&self, owner: &OwnerId) -> Option<Dimensions> {
        let id = self.awaiting_coords.get(owner)?.value().clone();

        let entry = self.pending.get(&id)?;

        match &entry.state {
            SubmissionState::AwaitingCustomCoords { dims, .. } => Some(*dims),
            SubmissionState::AwaitingSelection => None,
        }
    }

    pub(crate) fn take_for_coords(&self, owner: &OwnerId) -> Option<Submission> {
        let (_, id) = self.awaiting_coords.remove(owner)?;

        self.pending.remove(&id).map(|(_, submission)| submission)
    }

    /// Remove everything the owner has in flight. Used by /reset and by
    /// cancel-and-replace when a new upload arrives.
    pub(crate) fn cancel_owner_pending(&self, owner: &OwnerId) -> Vec<Submission> {
        let ids: Vec<SubmissionId> = self
            .pending
            .iter()
            .filter(|entry| entry.owner == *owner)
            .map(|entry| entry.id.clone())
            .collect();

        ids.into_iter()
            .filter_map(|id| self.drop_entry(&id))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &SubmissionId) -> bool {
        self.pending.contains_key(id)
    }
}

#[tracing::instrument(skip(state, upload), fields(event = event_id.as_str()))]
pub(crate) async fn intake<T: Transport>(
    state: &State<T>,
    event_id: &EventId,
    owner: &OwnerId,
    upload: MediaUpload,
) -> Result<(), Error> {
    if upload.byte_size > crate::MAX_ASSET_BYTES {
        let err = ProcessingError::from(FetchError::TooLarge {
            size: upload.byte_size,
        });

        return notify_failure(state, owner, err).await;
    }

    // A new upload supersedes whatever the owner had pending.
    for old in state.tracker.cancel_owner_pending(owner) {
        tracing::debug!(submission = old.id.as_str(), "Replacing pending submission");
        old.discard().await;
    }

    let submission = Submission {
        id: SubmissionId::from(event_id),
        owner: owner.clone(),
        asset: upload.asset,
        width: upload.width,
        height: upload.height,
        orientation: Orientation::of(upload.width, upload.height),
        state: SubmissionState::AwaitingSelection,
        created: Instant::now(),
    };

    let mut buttons: Vec<SelectionButton> = submission
        .orientation
        .positions()
        .iter()
        .map(|position| SelectionButton {
            label: position.label().to_string(),
            token: SelectionToken::preset(*position, submission.id.clone()).encode(),
        })
        .collect();

    buttons.push(SelectionButton {
        label: String::from("Custom"),
        token: SelectionToken::custom(submission.id.clone()).encode(),
    });

    state.tracker.insert_awaiting_selection(submission);
    metrics::counter!(crate::init_metrics::SUBMISSION_CREATED).increment(1);

    state
        .transport
        .send_selection_prompt(owner, PROMPT_SELECTION, &buttons)
        .await?;

    Ok(())
}

#[tracing::instrument(skip(state, raw_token))]
pub(crate) async fn on_selection<T: Transport>(
    state: &State<T>,
    owner: &OwnerId,
    raw_token: &str,
) -> Result<(), Error> {
    let token = match SelectionToken::parse(raw_token) {
        Ok(token) => token,
        Err(e) => {
            let err = ProcessingError::from(e);

            tracing::warn!(code = %err.error_code(), "Rejecting selection: {err}");
            state.transport.send_text(owner, &err.user_notice()).await?;

            return Ok(());
        }
    };

    let Some(submission) = state.tracker.take_if_owner(&token.submission, owner) else {
        state.transport.send_text(owner, STALE_SELECTION).await?;

        return Ok(());
    };

    match token.kind {
        SelectionKind::Preset(position) => {
            let rect = match crop::preset(submission.width, submission.height, position) {
                Ok(rect) => rect,
                Err(e) => {
                    submission.discard().await;

                    return notify_failure(state, owner, e.into()).await;
                }
            };

            drive(state, submission, rect).await
        }
        SelectionKind::Custom => begin_custom(state, submission).await,
    }
}

/// Selecting "custom" fetches and probes eagerly, so the coordinate check
/// has authoritative dimensions ready by the time the user answers.
async fn begin_custom<T: Transport>(
    state: &State<T>,
    mut submission: Submission,
) -> Result<(), Error> {
    let res = async {
        let input = fetch_input(state, &submission.asset).await?;
        let dims = state.transform.probe(&input.asset.path).await?;

        Ok::<_, ProcessingError>((input, dims))
    }
    .await;

    match res {
        Ok((input, dims)) => {
            let owner = submission.owner.clone();
            let prompt = coords_prompt(dims);

            submission.state = SubmissionState::AwaitingCustomCoords { dims, input };
            state.tracker.insert_awaiting_coords(submission);

            state.transport.send_text(&owner, &prompt).await?;

            Ok(())
        }
        Err(err) => {
            let owner = submission.owner.clone();
            submission.discard().await;

            notify_failure(state, &owner, err).await
        }
    }
}

#[tracing::instrument(skip(state, text))]
pub(crate) async fn on_text<T: Transport>(
    state: &State<T>,
    owner: &OwnerId,
    text: &str,
) -> Result<(), Error> {
    let Some(dims) = state.tracker.coords_target(owner) else {
        state.transport.send_text(owner, NOT_WAITING).await?;

        return Ok(());
    };

    let Some((x, y)) = crop::parse_coords(text) else {
        state.transport.send_text(owner, PROMPT_COORDS_HINT).await?;

        return Ok(());
    };

    let rect = match crop::custom(dims.width, dims.height, x, y) {
        Ok(rect) => rect,
        Err(e) => {
            // re-prompt; the submission stays in place
            let err = ProcessingError::from(e);

            tracing::debug!(code = %err.error_code(), "Rejecting coordinates: {err}");
            state.transport.send_text(owner, &err.user_notice()).await?;

            return Ok(());
        }
    };

    let Some(submission) = state.tracker.take_for_coords(owner) else {
        // raced with a reset or a replacement upload
        state.transport.send_text(owner, STALE_SELECTION).await?;

        return Ok(());
    };

    drive(state, submission, rect).await
}

#[tracing::instrument(skip(state))]
pub(crate) async fn on_command<T: Transport>(
    state: &State<T>,
    owner: &OwnerId,
    command: Command,
) -> Result<(), Error> {
    match command {
        Command::Start => state.transport.send_text(owner, GREETING).await?,
        Command::Help => state.transport.send_text(owner, HELP).await?,
        Command::Reset => {
            let removed = state.tracker.cancel_owner_pending(owner);
            let had_any = !removed.is_empty();

            for submission in removed {
                submission.discard().await;
            }

            let reply = if had_any { RESET_DONE } else { RESET_NOTHING };
            state.transport.send_text(owner, reply).await?;
        }
    }

    Ok(())
}

/// Processing: fetch if needed, preview, deliver preview, transcode,
/// deliver the note. Failures surface as one user notice; scratch files
/// are removed on every exit path.
#[tracing::instrument(skip(state, submission, rect), fields(submission = submission.id.as_str()))]
async fn drive<T: Transport>(
    state: &State<T>,
    submission: Submission,
    rect: CropRect,
) -> Result<(), Error> {
    let owner = submission.owner.clone();

    match run_pipeline(state, submission, rect).await {
        Ok(()) => {
            metrics::counter!(crate::init_metrics::SUBMISSION_DELIVERED).increment(1);

            Ok(())
        }
        Err(err) => notify_failure(state, &owner, err).await,
    }
}

async fn run_pipeline<T: Transport>(
    state: &State<T>,
    submission: Submission,
    rect: CropRect,
) -> Result<(), ProcessingError> {
    let Submission {
        owner,
        asset,
        state: submission_state,
        ..
    } = submission;

    let input = match submission_state {
        SubmissionState::AwaitingCustomCoords { input, .. } => input,
        SubmissionState::AwaitingSelection => fetch_input(state, &asset).await?,
    };

    let res = async {
        let preview_path = input.scratch.file(Some(".jpeg"));
        state
            .transform
            .extract_preview(&input.asset.path, &preview_path, rect)
            .await?;
        state.transport.send_photo(&owner, &preview_path).await?;

        let output_path = input.scratch.file(Some(".mp4"));
        state
            .transform
            .transcode(&input.asset.path, &output_path, rect)
            .await?;

        state.transport.indicate_upload(&owner).await?;
        state.transport.send_video_note(&owner, &output_path).await?;

        Ok::<_, ProcessingError>(())
    }
    .await;

    if let Err(e) = input.scratch.cleanup().await {
        tracing::warn!("Failed to remove scratch directory: {e}");
    }

    res
}

async fn fetch_input<T: Transport>(
    state: &State<T>,
    asset: &AssetRef,
) -> Result<FetchedInput, ProcessingError> {
    let resolved = state.transport.resolve_asset(asset).await?;

    // enforced before the scratch directory exists, let alone a download
    if resolved.byte_size > crate::MAX_ASSET_BYTES {
        return Err(FetchError::TooLarge {
            size: resolved.byte_size,
        }
        .into());
    }

    let scratch = state.tmp_dir.scratch_dir().await?;
    let asset = state.fetcher.fetch(&resolved, &scratch).await?;

    tracing::debug!(bytes = asset.byte_size, "Fetched input asset");

    Ok(FetchedInput { scratch, asset })
}

async fn notify_failure<T: Transport>(
    state: &State<T>,
    owner: &OwnerId,
    err: ProcessingError,
) -> Result<(), Error> {
    tracing::warn!(code = %err.error_code(), "Submission failed: {err}");
    metrics::counter!(
        crate::init_metrics::SUBMISSION_FAILED,
        "code" => err.error_code().to_string()
    )
    .increment(1);

    state.transport.send_text(owner, &err.user_notice()).await?;

    Ok(())
}
