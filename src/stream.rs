use crate::cli::TransportMode;
use crate::config::{ChannelEntry, SLOT_COUNT};
use crate::endpoint;
use crate::render::SlotGeometry;
use crate::session;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One decoded RGB frame handed out by [`StreamManager::poll_all`].
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pub seq: u64,
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

/// Why a stream stopped producing frames. Terminal for the slot: the worker
/// has exited and the slot is retired from polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    EndOfStream,
    ReadFailure(String),
}

/// Outcome of polling one slot on one tick.
#[derive(Debug)]
pub enum PollResult {
    Frame(FrameBuffer),
    /// The worker has not published a new frame since the last drain; the
    /// slot keeps showing its previous content.
    Pending,
    EndOfStream,
    ReadFailure(String),
}

#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub label: String,
    pub status: String,
    pub frame_seq: u64,
    pub decode_errors: u64,
    ended: Option<StreamEnd>,
}

impl SlotSnapshot {
    fn new(label: String) -> Self {
        Self {
            label,
            status: "connecting".to_owned(),
            frame_seq: 0,
            decode_errors: 0,
            ended: None,
        }
    }
}

/// Latest-frame mailbox between one stream worker and the poll loop.
///
/// The worker publishes each decoded frame; the poll loop drains at its own
/// rate and only ever sees the most recent frame. Buffers circulate back to
/// the worker through the recycle slot so the steady state allocates nothing.
pub struct SlotCell {
    inner: RwLock<SlotSnapshot>,
    latest_frame: Mutex<Option<LatestFrame>>,
    recycle_frame: Mutex<Vec<u8>>,
}

#[derive(Debug)]
struct LatestFrame {
    seq: u64,
    width: usize,
    height: usize,
    rgb: Vec<u8>,
}

impl SlotCell {
    pub fn new(label: String) -> Self {
        Self {
            inner: RwLock::new(SlotSnapshot::new(label)),
            latest_frame: Mutex::new(None),
            recycle_frame: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.inner.write().status = status.into();
    }

    pub fn inc_decode_error(&self) {
        let mut snapshot = self.inner.write();
        snapshot.decode_errors = snapshot.decode_errors.saturating_add(1);
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        self.inner.read().clone()
    }

    /// Worker side: publish a decoded frame, replacing any unconsumed one.
    /// `frame_rgb` comes back holding a recycled buffer for the next decode.
    pub fn publish(&self, frame_rgb: &mut Vec<u8>, frame_width: usize, frame_height: usize) {
        let frame_seq = {
            let mut snapshot = self.inner.write();
            snapshot.frame_seq = snapshot.frame_seq.saturating_add(1);
            "streaming".clone_into(&mut snapshot.status);
            snapshot.frame_seq
        };

        let produced_rgb = std::mem::take(frame_rgb);
        let mut latest = self.latest_frame.lock();
        if let Some(mut previous) = latest.replace(LatestFrame {
            seq: frame_seq,
            width: frame_width,
            height: frame_height,
            rgb: produced_rgb,
        }) {
            std::mem::swap(frame_rgb, &mut previous.rgb);
            return;
        }
        drop(latest);

        let mut recycle = self.recycle_frame.lock();
        std::mem::swap(frame_rgb, &mut recycle);
    }

    /// Poll side: take the most recent unconsumed frame, if any. The caller's
    /// buffer is swapped in and routed back to the worker via the recycle
    /// slot.
    pub fn take_latest(&self, out_rgb: &mut Vec<u8>) -> Option<(u64, usize, usize)> {
        let mut latest = self.latest_frame.lock();
        let mut frame = latest.take()?;
        std::mem::swap(out_rgb, &mut frame.rgb);
        drop(latest);

        let mut recycle = self.recycle_frame.lock();
        std::mem::swap(&mut *recycle, &mut frame.rgb);
        Some((frame.seq, frame.width, frame.height))
    }

    /// Worker side: mark the stream as finished. Reported by the next poll,
    /// after any final frame has been drained.
    pub fn finish(&self, end: StreamEnd) {
        let mut snapshot = self.inner.write();
        snapshot.status = match &end {
            StreamEnd::EndOfStream => "stream ended".to_owned(),
            StreamEnd::ReadFailure(reason) => format!("error: {reason}"),
        };
        snapshot.ended = Some(end);
    }

    fn take_ended(&self) -> Option<StreamEnd> {
        self.inner.write().ended.take()
    }
}

/// How a slot looks from the outside, for captions and status colors.
#[derive(Debug, Clone)]
pub enum SlotView {
    Empty,
    Failed(String),
    Live(SlotSnapshot),
}

enum Slot {
    Empty,
    Failed { caption: String },
    Open(OpenSlot),
}

struct OpenSlot {
    cell: Arc<SlotCell>,
    worker: JoinHandle<()>,
    scratch: Vec<u8>,
    retired: bool,
}

#[derive(Debug, Clone)]
pub struct OpenFailure {
    pub slot: usize,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct OpenSummary {
    pub requested: usize,
    pub opened: usize,
    pub failures: Vec<OpenFailure>,
}

/// Owns the four display slots and the stream workers feeding them.
///
/// Slots are keyed by the entry's original position in the config document,
/// so an open failure leaves a visible gap instead of shifting later
/// channels into earlier slots.
pub struct StreamManager {
    slots: Vec<Slot>,
}

impl StreamManager {
    /// Opens every decodable channel entry in order. Per-entry failures are
    /// recorded and skipped; partial success is the normal case. Each opened
    /// stream gets a worker task publishing into its slot cell.
    pub async fn open_all(
        entries: Vec<ChannelEntry>,
        transport: TransportMode,
        geometry_rx: watch::Receiver<SlotGeometry>,
    ) -> (Self, OpenSummary) {
        let mut slots = Vec::with_capacity(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            slots.push(Slot::Empty);
        }
        let mut summary = OpenSummary {
            requested: entries.len(),
            ..OpenSummary::default()
        };

        for entry in entries {
            let index = entry.index;
            if index >= SLOT_COUNT {
                continue;
            }

            let config = match entry.parsed {
                Ok(config) => config,
                Err(err) => {
                    summary.failures.push(OpenFailure {
                        slot: index,
                        detail: err.to_string(),
                    });
                    slots[index] = Slot::Failed {
                        caption: format!("config: {}", err.detail),
                    };
                    continue;
                }
            };

            let url = endpoint::realmonitor_url(&config);
            let shown = endpoint::display_endpoint(&url);
            tracing::info!("opening channel {} at {shown}", config.channel);

            match session::connect(&url, transport).await {
                Ok(connected) => {
                    let cell = Arc::new(SlotCell::new(config.slot_label()));
                    let worker_cell = cell.clone();
                    let worker_geometry_rx = geometry_rx.clone();
                    let worker = tokio::spawn(async move {
                        session::run_slot_worker(connected, worker_cell, worker_geometry_rx).await;
                    });
                    slots[index] = Slot::Open(OpenSlot {
                        cell,
                        worker,
                        scratch: Vec::new(),
                        retired: false,
                    });
                    summary.opened += 1;
                }
                Err(err) => {
                    tracing::warn!("channel {} failed to open at {shown}: {err:#}", config.channel);
                    summary.failures.push(OpenFailure {
                        slot: index,
                        detail: format!("{err:#}"),
                    });
                    slots[index] = Slot::Failed {
                        caption: format!("open failed: {err:#}"),
                    };
                }
            }
        }

        (Self { slots }, summary)
    }

    /// Polls every open slot once, in slot order. Never touches the network:
    /// each result is whatever the slot's worker has already published.
    /// Terminal results retire the slot; it is not polled again.
    pub fn poll_all(&mut self) -> Vec<(usize, PollResult)> {
        let mut results = Vec::new();

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let Slot::Open(open) = slot else {
                continue;
            };
            if open.retired {
                continue;
            }

            if let Some((seq, width, height)) = open.cell.take_latest(&mut open.scratch) {
                let rgb = std::mem::take(&mut open.scratch);
                results.push((
                    idx,
                    PollResult::Frame(FrameBuffer {
                        seq,
                        width,
                        height,
                        rgb,
                    }),
                ));
                continue;
            }

            if let Some(end) = open.cell.take_ended() {
                open.retired = true;
                open.worker.abort();
                let result = match end {
                    StreamEnd::EndOfStream => PollResult::EndOfStream,
                    StreamEnd::ReadFailure(reason) => PollResult::ReadFailure(reason),
                };
                results.push((idx, result));
                continue;
            }

            results.push((idx, PollResult::Pending));
        }

        results
    }

    /// Returns a drained frame buffer's allocation to its slot for reuse.
    pub fn recycle_frame(&mut self, idx: usize, mut rgb: Vec<u8>) {
        if let Some(Slot::Open(open)) = self.slots.get_mut(idx)
            && open.scratch.is_empty()
        {
            rgb.clear();
            open.scratch = rgb;
        }
    }

    /// Aborts every worker and releases every slot. Idempotent; safe with
    /// zero slots open.
    pub fn close_all(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Open(open) = slot {
                open.worker.abort();
            }
            *slot = Slot::Empty;
        }
    }

    /// Count of slots still being polled.
    pub fn open_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Open(open) if !open.retired))
            .count()
    }

    pub fn slot_view(&self, idx: usize) -> SlotView {
        match self.slots.get(idx) {
            Some(Slot::Open(open)) => SlotView::Live(open.cell.snapshot()),
            Some(Slot::Failed { caption }) => SlotView::Failed(caption.clone()),
            Some(Slot::Empty) | None => SlotView::Empty,
        }
    }
}
