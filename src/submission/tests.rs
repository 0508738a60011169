use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    crop::{CropRect, Orientation},
    dedup::DedupGuard,
    fetch::{Fetch, FetchError, FetchedAsset},
    ffmpeg::{Dimensions, Transform, TransformError},
    state::State,
    tmp_file::{ScratchDir, TmpDir},
    transport::{
        AssetRef, Command, EventId, InboundEvent, MediaUpload, OwnerId, ResolvedAsset,
        SelectionButton, SubmissionId, Transport, TransportError,
    },
};

use super::{
    intake, on_command, on_selection, on_text, Submission, SubmissionState, SubmissionTracker,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Outbound {
    Text(String),
    Prompt {
        text: String,
        buttons: Vec<SelectionButton>,
    },
    Photo(PathBuf),
    VideoNote(PathBuf),
    Indicated,
}

#[derive(Clone)]
struct TestTransport {
    sent: Rc<RefCell<Vec<Outbound>>>,
    declared_size: u64,
    unavailable: bool,
}

impl TestTransport {
    fn new() -> Self {
        Self::with_size(1024)
    }

    fn with_size(declared_size: u64) -> Self {
        TestTransport {
            sent: Rc::new(RefCell::new(Vec::new())),
            declared_size,
            unavailable: false,
        }
    }

    fn unavailable() -> Self {
        TestTransport {
            unavailable: true,
            ..Self::new()
        }
    }

    fn outbound(&self) -> Vec<Outbound> {
        self.sent.borrow().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|out| match out {
                Outbound::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn last_text(&self) -> String {
        self.texts().last().cloned().expect("at least one text reply")
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for TestTransport {
    async fn resolve_asset(&self, _asset: &AssetRef) -> Result<ResolvedAsset, TransportError> {
        if self.unavailable {
            return Err(TransportError::AssetUnavailable(None));
        }

        Ok(ResolvedAsset {
            url: "http://upstream.invalid/asset.mp4".parse().expect("valid url"),
            byte_size: self.declared_size,
        })
    }

    async fn send_text(&self, _to: &OwnerId, text: &str) -> Result<(), TransportError> {
        self.sent.borrow_mut().push(Outbound::Text(text.to_string()));
        Ok(())
    }

    async fn send_selection_prompt(
        &self,
        _to: &OwnerId,
        text: &str,
        buttons: &[SelectionButton],
    ) -> Result<(), TransportError> {
        self.sent.borrow_mut().push(Outbound::Prompt {
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn send_photo(&self, _to: &OwnerId, photo: &Path) -> Result<(), TransportError> {
        assert!(photo.exists(), "photo delivered before it exists");
        self.sent.borrow_mut().push(Outbound::Photo(photo.to_path_buf()));
        Ok(())
    }

    async fn send_video_note(&self, _to: &OwnerId, video: &Path) -> Result<(), TransportError> {
        assert!(video.exists(), "video note delivered before it exists");
        self.sent
            .borrow_mut()
            .push(Outbound::VideoNote(video.to_path_buf()));
        Ok(())
    }

    async fn indicate_upload(&self, _to: &OwnerId) -> Result<(), TransportError> {
        self.sent.borrow_mut().push(Outbound::Indicated);
        Ok(())
    }
}

struct StubFetch {
    calls: Rc<RefCell<usize>>,
}

#[async_trait::async_trait(?Send)]
impl Fetch for StubFetch {
    async fn fetch(
        &self,
        resolved: &ResolvedAsset,
        scratch: &ScratchDir,
    ) -> Result<FetchedAsset, FetchError> {
        *self.calls.borrow_mut() += 1;

        let path = scratch.file(Some(".mp4"));
        tokio::fs::write(&path, b"input").await.map_err(FetchError::Io)?;

        Ok(FetchedAsset {
            path,
            byte_size: resolved.byte_size,
        })
    }
}

struct StubTransform {
    dims: Dimensions,
    fail_probe: bool,
    fail_transcode: bool,
    probes: Rc<RefCell<usize>>,
}

impl StubTransform {
    fn new(dims: Dimensions) -> Self {
        StubTransform {
            dims,
            fail_probe: false,
            fail_transcode: false,
            probes: Rc::new(RefCell::new(0)),
        }
    }

    fn failing_transcode(dims: Dimensions) -> Self {
        StubTransform {
            fail_transcode: true,
            ..Self::new(dims)
        }
    }

    fn failing_probe(dims: Dimensions) -> Self {
        StubTransform {
            fail_probe: true,
            ..Self::new(dims)
        }
    }
}

#[async_trait::async_trait(?Send)]
impl Transform for StubTransform {
    async fn probe(&self, _input: &Path) -> Result<Dimensions, TransformError> {
        *self.probes.borrow_mut() += 1;

        if self.fail_probe {
            return Err(TransformError::Probe(Box::new(std::io::Error::other(
                "stubbed probe failure",
            ))));
        }

        Ok(self.dims)
    }

    async fn extract_preview(
        &self,
        _input: &Path,
        output: &Path,
        _rect: CropRect,
    ) -> Result<(), TransformError> {
        tokio::fs::write(output, b"jpeg")
            .await
            .map_err(|e| TransformError::Transcode(Box::new(e)))
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _rect: CropRect,
    ) -> Result<(), TransformError> {
        if self.fail_transcode {
            return Err(TransformError::Transcode(Box::new(std::io::Error::other(
                "stubbed transcode failure",
            ))));
        }

        tokio::fs::write(output, b"mp4")
            .await
            .map_err(|e| TransformError::Transcode(Box::new(e)))
    }
}

struct Harness {
    state: State<TestTransport>,
    tmp_root: PathBuf,
    fetch_calls: Rc<RefCell<usize>>,
    probe_calls: Rc<RefCell<usize>>,
}

impl Harness {
    async fn build(transport: TestTransport, transform: StubTransform) -> Self {
        let tmp_dir = TmpDir::init(std::env::temp_dir()).await.expect("tmp dir");
        let tmp_root = tmp_dir.path().to_path_buf();

        let fetch_calls = Rc::new(RefCell::new(0));
        let probe_calls = transform.probes.clone();

        let state = State {
            tmp_dir,
            transport,
            fetcher: Arc::new(StubFetch {
                calls: fetch_calls.clone(),
            }),
            transform: Arc::new(transform),
            tracker: Arc::new(SubmissionTracker::new(64, Duration::from_secs(60))),
            dedup: Arc::new(DedupGuard::new(64)),
        };

        Harness {
            state,
            tmp_root,
            fetch_calls,
            probe_calls,
        }
    }

    fn transport(&self) -> &TestTransport {
        &self.state.transport
    }

    async fn scratch_count(&self) -> usize {
        let mut entries = tokio::fs::read_dir(&self.tmp_root).await.expect("read tmp root");

        let mut count = 0;
        while entries.next_entry().await.expect("entry").is_some() {
            count += 1;
        }

        count
    }
}

fn upload(width: u32, height: u32, byte_size: u64) -> MediaUpload {
    MediaUpload {
        asset: AssetRef::new("asset-1"),
        width,
        height,
        byte_size,
    }
}

fn owner() -> OwnerId {
    OwnerId::new("owner-1")
}

fn prompt_labels(outbound: &[Outbound]) -> Vec<String> {
    outbound
        .iter()
        .find_map(|out| match out {
            Outbound::Prompt { buttons, .. } => {
                Some(buttons.iter().map(|b| b.label.clone()).collect())
            }
            _ => None,
        })
        .expect("a selection prompt was sent")
}

#[tokio::test]
async fn intake_prompts_positions_for_horizontal_video() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    let outbound = harness.transport().outbound();

    assert_eq!(
        prompt_labels(&outbound),
        vec!["Left", "Center", "Right", "Custom"]
    );

    let Outbound::Prompt { buttons, .. } = &outbound[0] else {
        panic!("expected a prompt");
    };
    assert_eq!(buttons[0].token, "crop:left:u1");
    assert_eq!(buttons[3].token, "crop:custom:u1");
}

#[tokio::test]
async fn intake_prompts_positions_for_vertical_video() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 720,
            height: 1280,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(720, 1280, 1024),
    )
    .await
    .expect("intake succeeds");

    assert_eq!(
        prompt_labels(&harness.transport().outbound()),
        vec!["Top", "Center", "Bottom", "Custom"]
    );
}

#[tokio::test]
async fn intake_rejects_oversized_upload() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 60 * 1024 * 1024),
    )
    .await
    .expect("handled");

    assert!(harness.transport().last_text().contains("49 MiB"));
    assert_eq!(harness.state.tracker.pending_len(), 0);
    assert_eq!(harness.scratch_count().await, 0);
    assert_eq!(*harness.fetch_calls.borrow(), 0);
}

#[tokio::test]
async fn preset_selection_delivers_preview_then_note() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:left:u1")
        .await
        .expect("selection handled");

    let outbound = harness.transport().outbound();

    assert!(matches!(outbound[0], Outbound::Prompt { .. }));
    assert!(matches!(outbound[1], Outbound::Photo(_)));
    assert!(matches!(outbound[2], Outbound::Indicated));
    assert!(matches!(outbound[3], Outbound::VideoNote(_)));

    // preset path never probes; declared dimensions are enough
    assert_eq!(*harness.probe_calls.borrow(), 0);
    assert_eq!(*harness.fetch_calls.borrow(), 1);

    assert_eq!(harness.state.tracker.pending_len(), 0);
    assert_eq!(harness.scratch_count().await, 0);
}

#[tokio::test]
async fn malformed_selection_tokens_are_reported() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    on_selection(&harness.state, &owner(), "crop:left")
        .await
        .expect("handled");
    assert!(harness.transport().last_text().contains("malformed"));

    on_selection(&harness.state, &owner(), "crop:diagonal:u1")
        .await
        .expect("handled");
    assert!(harness.transport().last_text().contains("malformed"));
}

#[tokio::test]
async fn selection_for_unknown_submission_is_stale() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    on_selection(&harness.state, &owner(), "crop:left:unknown")
        .await
        .expect("handled");

    assert!(harness
        .transport()
        .last_text()
        .contains("no longer active"));
}

#[tokio::test]
async fn repeated_selection_of_one_submission_is_stale() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:left:u1")
        .await
        .expect("handled");
    on_selection(&harness.state, &owner(), "crop:right:u1")
        .await
        .expect("handled");

    // the second press finds nothing to claim
    assert!(harness
        .transport()
        .last_text()
        .contains("no longer active"));

    let notes = harness
        .transport()
        .outbound()
        .iter()
        .filter(|out| matches!(out, Outbound::VideoNote(_)))
        .count();
    assert_eq!(notes, 1);
}

#[tokio::test]
async fn unavailable_asset_surfaces_actionable_guidance() {
    let harness = Harness::build(
        TestTransport::unavailable(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:left:u1")
        .await
        .expect("handled");

    let notice = harness.transport().last_text();
    assert!(notice.contains("resend the video from your phone"));
    assert!(notice.contains("saved messages"));

    assert_eq!(*harness.fetch_calls.borrow(), 0);
    assert_eq!(harness.scratch_count().await, 0);
}

#[tokio::test]
async fn oversized_resolved_asset_halts_before_download() {
    // the upload event declared a small size, but resolution reveals 60 MiB
    let harness = Harness::build(
        TestTransport::with_size(60 * 1024 * 1024),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:left:u1")
        .await
        .expect("handled");

    assert!(harness.transport().last_text().contains("49 MiB"));
    assert_eq!(*harness.fetch_calls.borrow(), 0);
    assert_eq!(harness.scratch_count().await, 0);
}

#[tokio::test]
async fn transcode_failure_reports_generic_notice_and_cleans_up() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::failing_transcode(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:center:u1")
        .await
        .expect("handled");

    let notice = harness.transport().last_text();
    assert!(notice.contains("Something went wrong"));
    assert!(!notice.contains("stubbed transcode failure"));

    let outbound = harness.transport().outbound();
    assert!(outbound.iter().any(|out| matches!(out, Outbound::Photo(_))));
    assert!(!outbound.iter().any(|out| matches!(out, Outbound::VideoNote(_))));

    // both input and output scratch paths are gone
    assert_eq!(harness.scratch_count().await, 0);
    assert_eq!(harness.state.tracker.pending_len(), 0);
}

#[tokio::test]
async fn probe_failure_reports_and_cleans_up() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::failing_probe(Dimensions {
            width: 640,
            height: 480,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:custom:u1")
        .await
        .expect("handled");

    assert!(harness
        .transport()
        .last_text()
        .contains("Something went wrong"));
    assert_eq!(harness.scratch_count().await, 0);
    assert_eq!(harness.state.tracker.pending_len(), 0);
}

#[tokio::test]
async fn custom_flow_validates_coordinates_against_probed_dimensions() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 640,
            height: 480,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(720, 1280, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:custom:u1")
        .await
        .expect("handled");

    assert_eq!(*harness.probe_calls.borrow(), 1);
    assert!(harness.transport().last_text().contains("640x480"));
    // the input sticks around while we wait for coordinates
    assert_eq!(harness.scratch_count().await, 1);

    // x+480 fits, y+480 does not
    on_text(&harness.state, &owner(), "50:50")
        .await
        .expect("handled");
    assert!(harness.transport().last_text().contains("does not fit"));
    assert_eq!(harness.state.tracker.pending_len(), 1);

    on_text(&harness.state, &owner(), "not coordinates")
        .await
        .expect("handled");
    assert!(harness.transport().last_text().contains("120:40"));
    assert_eq!(harness.state.tracker.pending_len(), 1);

    on_text(&harness.state, &owner(), "10:0")
        .await
        .expect("handled");

    let outbound = harness.transport().outbound();
    assert!(outbound.iter().any(|out| matches!(out, Outbound::VideoNote(_))));

    // the eager fetch is reused, not repeated
    assert_eq!(*harness.fetch_calls.borrow(), 1);

    assert_eq!(harness.state.tracker.pending_len(), 0);
    assert_eq!(harness.scratch_count().await, 0);
}

#[tokio::test]
async fn text_without_pending_coordinates_hints() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 640,
            height: 480,
        }),
    )
    .await;

    on_text(&harness.state, &owner(), "10:10")
        .await
        .expect("handled");

    assert!(harness
        .transport()
        .last_text()
        .contains("not waiting for coordinates"));
}

#[tokio::test]
async fn reset_clears_pending_state_and_scratch() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 640,
            height: 480,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(720, 1280, 1024),
    )
    .await
    .expect("intake succeeds");

    on_selection(&harness.state, &owner(), "crop:custom:u1")
        .await
        .expect("handled");
    assert_eq!(harness.scratch_count().await, 1);

    on_command(&harness.state, &owner(), Command::Reset)
        .await
        .expect("handled");

    assert!(harness.transport().last_text().contains("Cleared"));
    assert_eq!(harness.state.tracker.pending_len(), 0);
    assert_eq!(harness.scratch_count().await, 0);

    on_command(&harness.state, &owner(), Command::Reset)
        .await
        .expect("handled");
    assert!(harness.transport().last_text().contains("Nothing was pending"));
}

#[tokio::test]
async fn new_upload_replaces_pending_custom_submission() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 640,
            height: 480,
        }),
    )
    .await;

    intake(
        &harness.state,
        &EventId::new("u1"),
        &owner(),
        upload(720, 1280, 1024),
    )
    .await
    .expect("intake succeeds");
    on_selection(&harness.state, &owner(), "crop:custom:u1")
        .await
        .expect("handled");
    assert_eq!(harness.scratch_count().await, 1);

    intake(
        &harness.state,
        &EventId::new("u2"),
        &owner(),
        upload(1920, 1080, 1024),
    )
    .await
    .expect("intake succeeds");

    assert_eq!(harness.state.tracker.pending_len(), 1);
    assert!(harness.state.tracker.contains(&SubmissionId::new("u2")));
    assert_eq!(harness.scratch_count().await, 0);

    // the replaced submission no longer accepts coordinates
    on_text(&harness.state, &owner(), "10:10")
        .await
        .expect("handled");
    assert!(harness
        .transport()
        .last_text()
        .contains("not waiting for coordinates"));
}

#[tokio::test]
async fn duplicate_events_are_ignored() {
    let harness = Harness::build(
        TestTransport::new(),
        StubTransform::new(Dimensions {
            width: 1920,
            height: 1080,
        }),
    )
    .await;

    let event = InboundEvent::MediaUpload {
        id: EventId::new("e1"),
        owner: owner(),
        upload: upload(1920, 1080, 1024),
    };

    crate::ingest(harness.state.clone(), event.clone()).await;
    crate::ingest(harness.state.clone(), event).await;

    let prompts = harness
        .transport()
        .outbound()
        .iter()
        .filter(|out| matches!(out, Outbound::Prompt { .. }))
        .count();

    assert_eq!(prompts, 1);
}

fn bare_submission(id: &str, owner: &str) -> Submission {
    Submission {
        id: SubmissionId::new(id),
        owner: OwnerId::new(owner),
        asset: AssetRef::new("asset"),
        width: 1920,
        height: 1080,
        orientation: Orientation::of(1920, 1080),
        state: SubmissionState::AwaitingSelection,
        created: Instant::now(),
    }
}

#[tokio::test]
async fn tracker_evicts_oldest_beyond_capacity() {
    let tracker = SubmissionTracker::new(2, Duration::from_secs(60));

    tracker.insert_awaiting_selection(bare_submission("a", "o1"));
    tracker.insert_awaiting_selection(bare_submission("b", "o2"));
    tracker.insert_awaiting_selection(bare_submission("c", "o3"));

    assert_eq!(tracker.pending_len(), 2);
    assert!(!tracker.contains(&SubmissionId::new("a")));
    assert!(tracker.contains(&SubmissionId::new("c")));
}

#[tokio::test]
async fn tracker_expires_stale_submissions() {
    let tracker = SubmissionTracker::new(64, Duration::ZERO);

    tracker.insert_awaiting_selection(bare_submission("a", "o1"));
    std::thread::sleep(Duration::from_millis(5));
    tracker.insert_awaiting_selection(bare_submission("b", "o2"));

    assert!(!tracker.contains(&SubmissionId::new("a")));
    assert!(tracker.contains(&SubmissionId::new("b")));
}
