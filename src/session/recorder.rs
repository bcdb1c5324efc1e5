use super::collector::{assemble, ChunkCollector};
use super::state::{SessionState, StateCell};
use super::stats::RecorderSnapshot;
use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::meter::Meter;
use crate::platform::{PlatformClass, PlatformProfile};
use crate::preview::Preview;
use crate::runtime::{CaptureRuntime, Encoder, EncoderEvent, EncoderEventRx, InputStream};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The single in-flight recording attempt and its device handles.
///
/// Exists exactly while the state machine is outside Idle; destroyed (all
/// handles released) on every exit path.
struct ActiveSession {
    generation: u64,
    mime_type: String,
    stop_requested: bool,
    stream: Box<dyn InputStream>,
    encoder: Box<dyn Encoder>,
    meter: Option<Meter>,
    pump: Option<JoinHandle<()>>,
}

/// State shared between the controller surface and its background tasks.
struct Shared {
    config: RecorderConfig,
    state: StateCell,
    is_recording: AtomicBool,
    /// Session identity; bumped on every start and forced teardown so chunk
    /// deliveries from a superseded session are detected and discarded.
    generation: AtomicU64,
    collector: ChunkCollector,
    result: StdMutex<Option<Preview>>,
    /// Incremented on every finalize outcome (success or failure); waiters
    /// race this signal against their timeouts.
    result_seq: watch::Sender<u64>,
    level_tx: watch::Sender<f32>,
    anchor: Instant,
    started_offset_ms: AtomicU64,
    final_elapsed_ms: AtomicU64,
    started_at: StdMutex<Option<DateTime<Utc>>>,
    session: Mutex<Option<ActiveSession>>,
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.anchor.elapsed().as_millis() as u64
    }

    fn elapsed_since_start(&self) -> u64 {
        self.now_ms()
            .saturating_sub(self.started_offset_ms.load(Ordering::SeqCst))
    }

    /// Release a session's device handles. Never fails: control methods on
    /// the runtime traits are infallible, so a teardown problem cannot trap
    /// the controller outside Idle.
    fn teardown(&self, mut sess: ActiveSession, abort_pump: bool) {
        if let Some(pump) = sess.pump.take() {
            if abort_pump {
                pump.abort();
            }
        }
        sess.encoder.stop();
        sess.stream.stop_tracks();
        if let Some(meter) = sess.meter.take() {
            meter.shutdown();
        }
        debug!("Session {} resources released", sess.generation);
    }

    /// Install a finalize outcome. The previous preview (if any) is revoked:
    /// exactly one playable result exists at a time.
    fn publish_result(&self, preview: Option<Preview>) {
        {
            let mut slot = self.result.lock().expect("result lock");
            if let Some(old) = slot.take() {
                old.revoke();
            }
            *slot = preview;
        }
        self.result_seq.send_modify(|seq| *seq += 1);
    }

    /// Drop the current preview without signalling waiters (used when a new
    /// session resets the surface).
    fn discard_result(&self) {
        let mut slot = self.result.lock().expect("result lock");
        if let Some(old) = slot.take() {
            old.revoke();
        }
    }
}

/// Timer-based duration estimate in whole seconds; the decode probe may raise
/// it later. Clamped to at least one second so a short-but-real clip never
/// reads as empty.
fn duration_estimate_secs(elapsed_ms: u64) -> u64 {
    ((elapsed_ms as f64 / 1000.0).round() as u64).max(1)
}

/// Media capture session controller.
///
/// Owns the session lifecycle (`Idle -> Acquiring -> Recording -> Stopping ->
/// Finalizing -> Idle`), the chunk collector/finalizer, and the level meter.
/// The microphone, encoder, and analysis primitives come from an injected
/// [`CaptureRuntime`].
pub struct Recorder {
    runtime: Arc<dyn CaptureRuntime>,
    profile: PlatformProfile,
    shared: Arc<Shared>,
    level_rx: watch::Receiver<f32>,
    result_rx: watch::Receiver<u64>,
}

impl Recorder {
    pub fn new(
        runtime: Arc<dyn CaptureRuntime>,
        platform: PlatformClass,
        config: RecorderConfig,
    ) -> Self {
        Self::with_profile(runtime, PlatformProfile::for_class(platform), config)
    }

    pub fn with_profile(
        runtime: Arc<dyn CaptureRuntime>,
        profile: PlatformProfile,
        config: RecorderConfig,
    ) -> Self {
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let (result_seq, result_rx) = watch::channel(0u64);

        let shared = Arc::new(Shared {
            config,
            state: StateCell::new(SessionState::Idle),
            is_recording: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            collector: ChunkCollector::new(),
            result: StdMutex::new(None),
            result_seq,
            level_tx,
            anchor: Instant::now(),
            started_offset_ms: AtomicU64::new(0),
            final_elapsed_ms: AtomicU64::new(0),
            started_at: StdMutex::new(None),
            session: Mutex::new(None),
        });

        Self {
            runtime,
            profile,
            shared,
            level_rx,
            result_rx,
        }
    }

    /// Begin a new recording session.
    ///
    /// Valid from Idle; if a session is still active (including one whose
    /// teardown has not completed) it is force-cleaned first, so the call
    /// behaves as a restart. Capability and acquisition failures are returned
    /// to the caller and leave the controller Idle with no device handles.
    pub async fn start(&self) -> Result<(), RecorderError> {
        let mut guard = self.shared.session.lock().await;

        // Defensive release of stale handles; last writer wins, but never
        // with two sessions' resources alive at once.
        if let Some(stale) = guard.take() {
            warn!(
                "start() while session {} is active; forcing cleanup",
                stale.generation
            );
            self.shared.teardown(stale, true);
            self.shared.is_recording.store(false, Ordering::SeqCst);
            self.shared.state.set(SessionState::Idle);
        }

        if !self.runtime.has_input_device() {
            return Err(RecorderError::NoInputDevice);
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.collector.open(generation);
        self.shared.state.set(SessionState::Acquiring);

        // May suspend indefinitely on a permission prompt; that wait is a
        // real user decision and is not timed out.
        let mut stream = match self
            .runtime
            .request_input_stream(&self.profile.constraints)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.state.set(SessionState::Idle);
                warn!("Input stream acquisition failed: {e}");
                return Err(e);
            }
        };

        let requested_mime = match self
            .profile
            .select_format(|mime| self.runtime.supports_format(mime))
        {
            Some(mime) => mime.to_string(),
            None => {
                stream.stop_tracks();
                self.shared.state.set(SessionState::Idle);
                return Err(RecorderError::UnsupportedFormat(
                    self.profile.format_preferences.clone(),
                ));
            }
        };

        let (encoder, events) = match self.runtime.build_encoder(
            stream.as_mut(),
            &requested_mime,
            self.shared.config.timeslice(),
        ) {
            Ok(pair) => pair,
            Err(e) => {
                stream.stop_tracks();
                self.shared.state.set(SessionState::Idle);
                warn!("Encoder construction failed: {e}");
                return Err(e);
            }
        };

        // The runtime may have fallen back to a different container than the
        // requested one; the artifact is tagged with what is actually in use.
        let mime_type = encoder.mime_type().to_string();
        if mime_type != requested_mime {
            info!("Encoder fell back from {requested_mime} to {mime_type}");
        }

        // Metering is best-effort; a runtime without an analysis primitive
        // records fine with the level pinned at zero.
        let meter = self.runtime.attach_level_probe(stream.as_mut()).map(|probe| {
            Meter::spawn(
                probe,
                self.shared.level_tx.clone(),
                self.shared.config.meter_interval(),
            )
        });

        let pump = tokio::spawn(run_pump(
            Arc::clone(&self.shared),
            events,
            generation,
            mime_type.clone(),
        ));

        *guard = Some(ActiveSession {
            generation,
            mime_type: mime_type.clone(),
            stop_requested: false,
            stream,
            encoder,
            meter,
            pump: Some(pump),
        });

        self.shared.discard_result();
        self.shared
            .started_offset_ms
            .store(self.shared.now_ms(), Ordering::SeqCst);
        self.shared.final_elapsed_ms.store(0, Ordering::SeqCst);
        *self.shared.started_at.lock().expect("started_at lock") = Some(Utc::now());
        self.shared.state.set(SessionState::Recording);
        self.shared.is_recording.store(true, Ordering::SeqCst);

        info!(
            "Recording session {} started ({}, {:?} profile)",
            generation, mime_type, self.profile.class
        );

        Ok(())
    }

    /// Request the active session to stop.
    ///
    /// No-op outside Recording. Completion is asynchronous: observe
    /// `is_recording()` turning false and `result()` becoming populated, or
    /// use [`Recorder::stop_and_get_result`].
    pub async fn stop(&self) {
        let mut guard = self.shared.session.lock().await;
        let Some(sess) = guard.as_mut() else {
            debug!("stop() while idle is a no-op");
            return;
        };
        if sess.stop_requested || self.shared.state.get() != SessionState::Recording {
            return;
        }

        sess.stop_requested = true;
        self.shared.state.set(SessionState::Stopping);

        // Flush strictly before stop: buffering runtimes truncate the tail
        // if these arrive out of order.
        if self.profile.flush_before_stop {
            sess.encoder.request_flush();
        }
        sess.encoder.stop();

        info!(
            "Stop requested for session {}; awaiting encoder confirmation",
            sess.generation
        );
    }

    /// Stop and resolve with the eventual result, racing the finalize
    /// pipeline against the safety timeout. On timeout, degrades gracefully:
    /// whatever chunks were collected become a partial result, or `None` if
    /// nothing was captured.
    pub async fn stop_and_get_result(&self) -> Option<Preview> {
        let mut seq_rx = self.result_rx.clone();
        seq_rx.borrow_and_update();
        let generation = self.shared.generation.load(Ordering::SeqCst);

        // Results are published before the Idle transition, so an idle
        // controller has nothing in flight to wait for.
        if self.state() == SessionState::Idle {
            return self.result();
        }

        self.stop().await;

        let finalize = async {
            match seq_rx.changed().await {
                Ok(()) => self.result(),
                Err(_) => None,
            }
        };

        match tokio::time::timeout(self.shared.config.safety_timeout(), finalize).await {
            Ok(result) => result,
            Err(_) => self.degrade(generation).await,
        }
    }

    /// Block (cooperatively) until a result appears or the timeout elapses.
    /// Stops the active session first. Used by flows that gate a submit
    /// action on recording completion.
    pub async fn wait_for_result(&self, timeout: Duration) -> Option<Preview> {
        let mut seq_rx = self.result_rx.clone();
        seq_rx.borrow_and_update();

        if self.is_recording() {
            self.stop().await;
        }

        if let Some(existing) = self.result() {
            return Some(existing);
        }

        let wait = async {
            loop {
                if seq_rx.changed().await.is_err() {
                    return None;
                }
                if let Some(preview) = self.result() {
                    return Some(preview);
                }
                // A failed finalize published "no result"; keep waiting out
                // the caller's budget in case a restart produces one.
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                debug!("wait_for_result timed out");
                None
            }
        }
    }

    /// Discard the current result and revoke its playback handle. Idempotent.
    pub fn clear_result(&self) {
        self.shared.discard_result();
    }

    // Observables ---------------------------------------------------------

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Milliseconds recorded so far (live while recording, frozen at the
    /// final value afterwards).
    pub fn elapsed_ms(&self) -> u64 {
        if self.is_recording() {
            self.shared.elapsed_since_start()
        } else {
            self.shared.final_elapsed_ms.load(Ordering::SeqCst)
        }
    }

    /// Normalized input loudness in [0, 1]; 0 whenever no meter is running.
    pub fn input_level(&self) -> f32 {
        *self.level_rx.borrow()
    }

    pub fn result(&self) -> Option<Preview> {
        self.shared.result.lock().expect("result lock").clone()
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        RecorderSnapshot {
            state: self.state(),
            is_recording: self.is_recording(),
            started_at: *self.shared.started_at.lock().expect("started_at lock"),
            elapsed_ms: self.elapsed_ms(),
            input_level: self.input_level(),
            chunks_collected: self.shared.collector.chunk_count(generation),
            has_result: self.result().is_some(),
        }
    }

    // ---------------------------------------------------------------------

    /// Safety-timeout fallback for `stop_and_get_result`: the stop
    /// confirmation never arrived, so force-clean the session and build a
    /// result from whatever was collected.
    async fn degrade(&self, generation: u64) -> Option<Preview> {
        let mut guard = self.shared.session.lock().await;

        let is_current = matches!(guard.as_ref(), Some(sess) if sess.generation == generation);
        if !is_current {
            // Finalize won the race after our timeout fired.
            drop(guard);
            return self.result();
        }

        warn!("Stop confirmation timed out; degrading to partial data");

        let sess = guard.take().expect("session checked above");
        let mime_type = sess.mime_type.clone();
        // Supersede first so late encoder deliveries are discarded.
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.teardown(sess, true);

        // Guard stays held through the final writes so a racing start()
        // cannot interleave with the Idle re-entry.
        let elapsed = self.shared.elapsed_since_start();
        self.shared.final_elapsed_ms.store(elapsed, Ordering::SeqCst);
        self.shared.is_recording.store(false, Ordering::SeqCst);

        let data = assemble(self.shared.collector.take(generation));
        if data.is_empty() {
            self.shared.publish_result(None);
            self.shared.state.set(SessionState::Idle);
            return None;
        }

        let preview = Preview::new(data, mime_type, duration_estimate_secs(elapsed));
        info!(
            "Degraded result: {} bytes, ~{}s",
            preview.size(),
            preview.duration_seconds()
        );
        self.shared.publish_result(Some(preview.clone()));
        self.shared.state.set(SessionState::Idle);
        Some(preview)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Best-effort release if the controller is dropped mid-session;
        // dropping the encoder closes the event channel, which unblocks and
        // ends the pump.
        if let Ok(mut guard) = self.shared.session.try_lock() {
            if let Some(sess) = guard.take() {
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
                self.shared.teardown(sess, true);
            }
        }
    }
}

/// Drain any events already sitting in the channel without waiting.
fn drain_pending(shared: &Shared, events: &mut EncoderEventRx, generation: u64) {
    while let Ok(event) = events.try_recv() {
        if let EncoderEvent::Data(chunk) = event {
            shared.collector.append(generation, chunk);
        }
    }
}

/// Chunk pump: appends encoder deliveries in capture order, then runs the
/// finalize pipeline once the encoder confirms it has stopped.
async fn run_pump(
    shared: Arc<Shared>,
    mut events: EncoderEventRx,
    generation: u64,
    mime_type: String,
) {
    loop {
        match events.recv().await {
            Some(EncoderEvent::Data(chunk)) => {
                shared.collector.append(generation, chunk);
            }
            Some(EncoderEvent::Stopped) => break,
            None => {
                warn!("Encoder event channel closed without stop confirmation");
                break;
            }
        }
    }

    if shared.generation.load(Ordering::SeqCst) != generation {
        return; // superseded mid-flight
    }

    shared.state.set(SessionState::Finalizing);

    // Some runtimes deliver trailing chunks asynchronously after the stop
    // confirmation; give them a beat, then look again.
    sleep(shared.config.stop_grace()).await;
    drain_pending(&shared, &mut events, generation);

    let mut attempt = 0;
    while shared.collector.is_empty(generation) && attempt < shared.config.finalize_retry_limit {
        attempt += 1;
        debug!("No chunks collected yet; finalize retry {attempt}");
        sleep(shared.config.finalize_retry_delay()).await;
        drain_pending(&shared, &mut events, generation);
    }

    // The session lock is held through the final writes: between taking the
    // session and re-entering Idle, a concurrent start() could otherwise
    // install a fresh session and have its Recording state clobbered here.
    let mut guard = shared.session.lock().await;
    let is_current = matches!(guard.as_ref(), Some(sess) if sess.generation == generation);
    if !is_current {
        return; // superseded while we slept
    }
    let mut sess = guard.take().expect("session checked above");
    // This task *is* the pump; dropping the handle is enough.
    sess.pump.take();
    shared.teardown(sess, false);

    let elapsed = shared.elapsed_since_start();
    shared.final_elapsed_ms.store(elapsed, Ordering::SeqCst);
    shared.is_recording.store(false, Ordering::SeqCst);

    let data = assemble(shared.collector.take(generation));
    if data.is_empty() {
        warn!(
            "Recording session {} produced no data after {} retries",
            generation, attempt
        );
        shared.publish_result(None);
        shared.state.set(SessionState::Idle);
        return;
    }

    let preview = Preview::new(data, mime_type, duration_estimate_secs(elapsed));
    info!(
        "Recording session {} finalized: {} bytes, ~{}s, {}",
        generation,
        preview.size(),
        preview.duration_seconds(),
        preview.mime_type()
    );
    shared.publish_result(Some(preview.clone()));
    shared.state.set(SessionState::Idle);
    drop(guard);

    // Fire-and-forget: the preview is already observable; the decode probe
    // only raises the duration estimate.
    tokio::task::spawn_blocking(move || preview.refine_duration());
}
