//! Playback orchestration.
//!
//! [`PlaybackController`] owns the playback state machine: it resolves the
//! current queue entry to a URL, creates one engine session per loaded
//! track, reacts to engine events (loaded, ended, failed), and serves
//! transport commands from the embedder and the OS media keys.
//!
//! The controller runs as a single task consuming one event stream, so no
//! state is shared under a lock. Everything that wants to influence
//! playback sends a [`ControllerEvent`] through the same channel; engine
//! events carry the [`SessionId`] they belong to and are dropped when that
//! session has already been torn down.

pub mod queue;

pub use queue::{AdvanceOutcome, Direction, QueueState};

use crate::config::DEFAULT_VOLUME;
use crate::engine::{
    EngineEvent, PlaybackSession, SessionId, SessionState, SoundEngine, SoundEngineFactory,
};
use crate::error::{PlaybackError, Result};
use crate::lyrics::{LyricService, LyricTrack};
use crate::model::{PlayMode, TrackDescriptor};
use crate::notify::{NoticeLevel, Notifier};
use crate::resolver::SourceResolver;
use crate::sampler::{ProgressSampler, ProgressShared, TaskbarProgress};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Consecutive initialization failures tolerated before playback halts.
pub const MAX_INIT_FAILURES: u32 = 10;

/// Volume ramp length for play/pause transitions.
pub const FADE_DURATION: Duration = Duration::from_millis(300);

/// Continuous playback required before a remote track scrobbles.
pub const SCROBBLE_DELAY: Duration = Duration::from_secs(5);

/// A stored resume position is only applied when the track duration
/// extends at least this far past it.
pub const MEMORY_SEEK_MARGIN: Duration = Duration::from_secs(2);

/// Transport requests from the embedder or the OS media keys.
#[derive(Debug, Clone)]
pub enum TransportCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    /// Absolute seek, in seconds
    SeekTo(f64),
    /// Seek to a fraction (0.0 - 1.0) of the track duration
    SeekFraction(f64),
    /// Volume 0.0 - 1.0
    SetVolume(f32),
    /// Playback rate multiplier
    SetRate(f32),
    ToggleMute,
    SetMode(PlayMode),
    /// Jump to a queue index and start playing
    JumpTo(usize),
    /// Queue a track right after the current one
    InsertNext {
        track: TrackDescriptor,
        play_now: bool,
    },
}

/// Everything the controller's event loop consumes.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Engine notification stamped with its session
    Engine(SessionId, EngineEvent),
    /// Transport request
    Command(TransportCommand),
}

/// Create the controller's event channel.
pub fn channel() -> (
    mpsc::UnboundedSender<ControllerEvent>,
    mpsc::UnboundedReceiver<ControllerEvent>,
) {
    mpsc::unbounded_channel()
}

/// Cloneable handle for sending transport commands to the controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ControllerHandle {
    pub fn send(&self, command: TransportCommand) {
        // A closed channel means the controller is gone; nothing to do.
        let _ = self.tx.send(ControllerEvent::Command(command));
    }

    pub fn play(&self) {
        self.send(TransportCommand::Play);
    }

    pub fn pause(&self) {
        self.send(TransportCommand::Pause);
    }

    pub fn toggle(&self) {
        self.send(TransportCommand::Toggle);
    }

    pub fn next(&self) {
        self.send(TransportCommand::Next);
    }

    pub fn previous(&self) {
        self.send(TransportCommand::Previous);
    }
}

/// Reports a track as played after the scrobble delay elapses.
#[async_trait]
pub trait Scrobbler: Send + Sync {
    async fn scrobble(&self, track: &TrackDescriptor);
}

/// Receives the artwork URL whenever the current track changes, so the
/// embedder can extract accent colors.
pub trait ArtworkPalette: Send + Sync {
    fn artwork_changed(&self, url: &str);
}

/// Supplies further tracks when the queue runs out in radio mode.
#[async_trait]
pub trait RadioFeed: Send + Sync {
    async fn next_tracks(&self) -> Result<Vec<TrackDescriptor>>;
}

/// Records tracks as they start playing.
pub trait PlayHistory: Send + Sync {
    fn record(&self, track: &TrackDescriptor);
}

/// Pushes now-playing metadata to the OS media session.
pub trait MediaSessionSink: Send + Sync {
    fn track_changed(&self, track: &TrackDescriptor);
    fn playback_changed(&self, playing: bool);
}

/// Collaborators the controller drives. Only the first four are required;
/// the rest are integration points the embedder may leave out.
pub struct ControllerDeps {
    pub engine_factory: Arc<dyn SoundEngineFactory>,
    pub resolver: Arc<SourceResolver>,
    pub lyrics: LyricService,
    pub notifier: Arc<dyn Notifier>,
    pub scrobbler: Option<Arc<dyn Scrobbler>>,
    pub taskbar: Option<Arc<dyn TaskbarProgress>>,
    pub palette: Option<Arc<dyn ArtworkPalette>>,
    pub radio: Option<Arc<dyn RadioFeed>>,
    pub history: Option<Arc<dyn PlayHistory>>,
    pub media: Option<Arc<dyn MediaSessionSink>>,
}

/// Behavior knobs, usually derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub volume: f32,
    pub rate: f32,
    pub fade_enabled: bool,
    pub memory_seek: bool,
    pub word_synced_lyrics: bool,
    pub use_unblock: bool,
    pub advance_on_init_failure: bool,
    pub scrobble: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            rate: 1.0,
            fade_enabled: true,
            memory_seek: true,
            word_synced_lyrics: true,
            use_unblock: false,
            advance_on_init_failure: false,
            scrobble: true,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            volume: config.playback.volume,
            rate: config.playback.rate,
            fade_enabled: config.playback.fade_enabled,
            memory_seek: config.playback.memory_seek,
            word_synced_lyrics: config.playback.word_synced_lyrics,
            use_unblock: config.sources.use_unblock,
            advance_on_init_failure: config.policy.advance_on_init_failure,
            scrobble: config.policy.scrobble,
        }
    }
}

/// The playback state machine.
pub struct PlaybackController {
    queue: QueueState,
    session: Option<PlaybackSession>,
    state: SessionState,
    current_lyrics: Arc<LyricTrack>,
    settings: ControllerSettings,
    volume: f32,
    rate: f32,
    /// `Some` while muted, holding the volume to restore
    pre_mute_volume: Option<f32>,
    /// Whether playback should start once the pending load completes
    play_requested: bool,
    /// Consecutive initialization failures; reset on a successful load
    init_failures: u32,
    /// One-shot resume position restored from saved state
    resume_position: Option<Duration>,
    scrobble_task: Option<JoinHandle<()>>,
    progress: Arc<ProgressShared>,
    sampler: ProgressSampler,
    deps: ControllerDeps,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl PlaybackController {
    pub fn new(
        deps: ControllerDeps,
        settings: ControllerSettings,
        events_tx: mpsc::UnboundedSender<ControllerEvent>,
    ) -> Self {
        Self {
            queue: QueueState::new(),
            session: None,
            state: SessionState::Idle,
            current_lyrics: Arc::new(LyricTrack::empty()),
            volume: settings.volume.clamp(0.0, 1.0),
            rate: settings.rate,
            pre_mute_volume: None,
            play_requested: false,
            init_failures: 0,
            resume_position: None,
            scrobble_task: None,
            progress: Arc::new(ProgressShared::new()),
            sampler: ProgressSampler::new(),
            settings,
            deps,
            events_tx,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.events_tx.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn queue(&self) -> &QueueState {
        &self.queue
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.pre_mute_volume.is_some()
    }

    pub fn lyrics(&self) -> Arc<LyricTrack> {
        self.current_lyrics.clone()
    }

    /// Shared progress state fed by the sampler.
    pub fn progress(&self) -> Arc<ProgressShared> {
        self.progress.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// The track the active session is bound to, falling back to the
    /// queue's current entry.
    pub fn current_track(&self) -> Option<&TrackDescriptor> {
        self.session
            .as_ref()
            .map(|s| &s.track)
            .or_else(|| self.queue.current())
    }

    /// Replace the queue contents and position without starting playback.
    pub fn set_queue(&mut self, tracks: Vec<TrackDescriptor>, index: usize) {
        self.queue.replace(tracks, index);
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.queue.set_mode(mode);
    }

    /// Stored position to resume from on the next successful load.
    pub fn set_resume_position(&mut self, position: Duration) {
        self.resume_position = Some(position);
    }

    /// Consume events until the channel closes.
    pub async fn run(mut self, mut events_rx: mpsc::UnboundedReceiver<ControllerEvent>) {
        while let Some(event) = events_rx.recv().await {
            self.handle_event(event).await;
        }
        self.teardown_session();
    }

    pub async fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Command(command) => self.handle_command(command).await,
            ControllerEvent::Engine(id, engine_event) => match &self.session {
                Some(session) if session.id == id => self.on_engine_event(engine_event).await,
                _ => {
                    tracing::debug!("dropping {:?} from stale session {:?}", engine_event, id);
                }
            },
        }
    }

    pub async fn handle_command(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Play => {
                if self.session.is_some() {
                    self.play_requested = true;
                    self.fade_in().await;
                } else {
                    self.initialize(true).await;
                }
            }
            TransportCommand::Pause => {
                self.play_requested = false;
                self.fade_out_and_pause().await;
            }
            TransportCommand::Toggle => {
                if self.engine().is_some_and(|e| e.is_playing()) {
                    self.play_requested = false;
                    self.fade_out_and_pause().await;
                } else if self.session.is_some() {
                    self.play_requested = true;
                    self.fade_in().await;
                } else {
                    self.initialize(true).await;
                }
            }
            TransportCommand::Next => {
                self.advance_inner(Direction::Next, true, self.attempt_budget())
                    .await;
            }
            TransportCommand::Previous => {
                self.advance_inner(Direction::Prev, true, self.attempt_budget())
                    .await;
            }
            TransportCommand::SeekTo(secs) => {
                if secs.is_finite() && secs >= 0.0 {
                    if let Some(engine) = self.engine() {
                        engine.seek(Duration::from_secs_f64(secs));
                    }
                }
            }
            TransportCommand::SeekFraction(fraction) => {
                if fraction.is_finite() {
                    if let Some(engine) = self.engine() {
                        if let Some(duration) = engine.duration() {
                            let fraction = fraction.clamp(0.0, 1.0);
                            engine.seek(duration.mul_f64(fraction));
                        }
                    }
                }
            }
            TransportCommand::SetVolume(volume) => {
                if volume.is_finite() {
                    self.volume = volume.clamp(0.0, 1.0);
                    self.pre_mute_volume = None;
                    if let Some(engine) = self.engine() {
                        engine.set_volume(self.volume);
                    }
                }
            }
            TransportCommand::SetRate(rate) => {
                if rate.is_finite() && rate > 0.0 {
                    self.rate = rate;
                    if let Some(engine) = self.engine() {
                        engine.set_rate(rate);
                    }
                }
            }
            TransportCommand::ToggleMute => self.toggle_mute(),
            TransportCommand::SetMode(mode) => self.queue.set_mode(mode),
            TransportCommand::JumpTo(index) => {
                if self.queue.jump_to(index) {
                    self.initialize(true).await;
                }
            }
            TransportCommand::InsertNext { track, play_now } => {
                let title = track.title.clone();
                let at = self.queue.insert_next(track);
                if play_now {
                    self.queue.jump_to(at);
                    self.initialize(true).await;
                } else {
                    self.deps
                        .notifier
                        .notice(NoticeLevel::Success, &format!("{title} will play next"));
                }
            }
        }
    }

    /// Load the current queue entry and optionally start playing.
    pub async fn initialize(&mut self, auto_play: bool) {
        let budget = self.attempt_budget();
        self.init_inner(auto_play, budget).await;
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Loaded => self.on_loaded().await,
            EngineEvent::Playing => {
                self.state = SessionState::Playing;
                self.start_sampler();
                if let Some(media) = &self.deps.media {
                    media.playback_changed(true);
                }
            }
            EngineEvent::Paused => {
                self.state = SessionState::Paused;
                self.sampler.stop();
                if let Some(media) = &self.deps.media {
                    media.playback_changed(false);
                }
            }
            EngineEvent::Ended => {
                self.state = SessionState::Ended;
                self.sampler.stop();
                self.advance_inner(Direction::Next, true, self.attempt_budget())
                    .await;
            }
            EngineEvent::LoadFailed(code) => {
                let error = PlaybackError::from_load_error(code);
                let auto_play = self.play_requested;
                let budget = self.attempt_budget();
                self.fail_init(error, auto_play, budget).await;
            }
        }
    }

    async fn on_loaded(&mut self) {
        self.init_failures = 0;
        self.state = SessionState::Ready;
        let Some(session) = &self.session else {
            return;
        };
        let engine = session.engine.clone();
        let track = session.track.clone();

        if self.settings.memory_seek {
            if let Some(resume) = self.resume_position.take() {
                let long_enough = engine
                    .duration()
                    .is_some_and(|d| d > resume + MEMORY_SEEK_MARGIN);
                if long_enough {
                    tracing::info!("resuming {:?} at {:?}", track.title, resume);
                    engine.seek(resume);
                }
            }
        }

        if self.play_requested {
            self.fade_in().await;
            self.schedule_scrobble(&track);
        }
    }

    /// (Re)start progress sampling against the active session. Sampling
    /// runs only while playing; pause, end, and teardown stop it.
    fn start_sampler(&mut self) {
        let Some(engine) = self.engine() else {
            return;
        };
        if self.sampler.is_running() {
            return;
        }
        self.sampler.start(
            engine,
            self.current_lyrics.clone(),
            self.settings.word_synced_lyrics,
            self.progress.clone(),
            self.deps.taskbar.clone(),
        );
    }

    /// Load and (optionally) start the current queue entry.
    ///
    /// `attempts` bounds how many queue entries may be tried before giving
    /// up; the mutual recursion with [`advance_inner`](Self::advance_inner)
    /// decrements it on every hop.
    fn init_inner(
        &mut self,
        auto_play: bool,
        attempts: usize,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let Some(track) = self.queue.current().cloned() else {
                self.deps
                    .notifier
                    .notice(NoticeLevel::Warning, "nothing to play");
                return;
            };

            self.teardown_session();
            self.state = SessionState::Loading;
            self.play_requested = auto_play;
            tracing::info!("initializing {:?}", track.title);

            let resolved = self
                .deps
                .resolver
                .resolve(&track, self.settings.use_unblock)
                .await;
            let url = match resolved {
                Ok(Some(url)) => url,
                Ok(None) => {
                    self.deps.notifier.notice(
                        NoticeLevel::Warning,
                        &format!("{}: {}", track.title, PlaybackError::SourceUnavailable),
                    );
                    self.skip_unplayable(auto_play, attempts).await;
                    return;
                }
                Err(error) => {
                    self.fail_init(error, auto_play, attempts).await;
                    return;
                }
            };

            let (engine_tx, mut engine_rx) = mpsc::unbounded_channel();
            let engine = match self.deps.engine_factory.create(engine_tx) {
                Ok(engine) => engine,
                Err(error) => {
                    self.fail_init(error, auto_play, attempts).await;
                    return;
                }
            };

            let id = SessionId::next();
            let events_tx = self.events_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = engine_rx.recv().await {
                    if events_tx.send(ControllerEvent::Engine(id, event)).is_err() {
                        break;
                    }
                }
            });

            engine.set_volume(self.effective_volume());
            engine.set_rate(self.rate);
            self.session = Some(PlaybackSession::new(
                id,
                track.clone(),
                engine.clone(),
                forwarder,
            ));
            self.state = SessionState::Loading;

            if let Err(error) = engine.load(&url).await {
                self.fail_init(error, auto_play, attempts).await;
                return;
            }

            // Lyric failures never block playback; the service logs and
            // returns empty.
            self.current_lyrics = Arc::new(self.deps.lyrics.fetch(&track).await);

            if let Some(media) = &self.deps.media {
                media.track_changed(&track);
            }
            if let Some(palette) = &self.deps.palette {
                if let Some(url) = track.artwork_url() {
                    palette.artwork_changed(&url);
                }
            }
            if let Some(history) = &self.deps.history {
                history.record(&track);
            }
        })
    }

    /// The current entry has no playable source anywhere; move on or stop.
    async fn skip_unplayable(&mut self, auto_play: bool, attempts: usize) {
        if attempts > 1 {
            self.advance_inner(Direction::Next, auto_play, attempts - 1)
                .await;
        } else {
            self.deps.notifier.notice(
                NoticeLevel::Error,
                &PlaybackError::NoPlayableTracks.to_string(),
            );
            self.state = SessionState::Failed;
        }
    }

    /// Count a failed initialization against the retry ceiling.
    async fn fail_init(&mut self, error: PlaybackError, auto_play: bool, attempts: usize) {
        self.teardown_session();
        self.init_failures += 1;
        tracing::warn!(
            "playback init failed ({}/{}): {}",
            self.init_failures,
            MAX_INIT_FAILURES,
            error
        );

        if self.init_failures > MAX_INIT_FAILURES {
            self.state = SessionState::Failed;
            self.surface_error(&PlaybackError::FatalInitLoop);
            return;
        }

        self.surface_error(&error);

        if self.settings.advance_on_init_failure && attempts > 1 {
            self.advance_inner(Direction::Next, auto_play, attempts - 1)
                .await;
        } else {
            self.state = SessionState::Failed;
        }
    }

    /// Route an error to the matching notifier channel: fatal errors get
    /// the blocking prompt, everything else a transient notice.
    fn surface_error(&self, error: &PlaybackError) {
        if error.is_fatal() {
            self.deps
                .notifier
                .fatal("Playback failed", &format!("{error}. Reload to try again."));
        } else {
            self.deps
                .notifier
                .notice(NoticeLevel::Warning, &error.to_string());
        }
    }

    /// Move the queue and initialize the new current entry. In repeat-one
    /// mode every advance replays the current track in place.
    async fn advance_inner(&mut self, direction: Direction, auto_play: bool, attempts: usize) {
        if direction == Direction::Next {
            self.top_up_radio().await;
        }

        match self.queue.step(direction) {
            None => {
                self.deps
                    .notifier
                    .notice(NoticeLevel::Warning, "queue is empty");
            }
            Some(AdvanceOutcome::RepeatCurrent) => self.restart_current().await,
            Some(AdvanceOutcome::Moved(_)) => {
                if attempts == 0 {
                    self.deps.notifier.notice(
                        NoticeLevel::Error,
                        &PlaybackError::NoPlayableTracks.to_string(),
                    );
                    self.state = SessionState::Failed;
                    return;
                }
                self.init_inner(auto_play, attempts).await;
            }
        }
    }

    /// In radio mode, every forward advance refreshes the queue tail from
    /// the feed so there is always a next pick.
    async fn top_up_radio(&mut self) {
        if self.queue.mode() != PlayMode::Radio {
            return;
        }
        let Some(radio) = self.deps.radio.clone() else {
            return;
        };
        match radio.next_tracks().await {
            Ok(tracks) => {
                tracing::info!("radio feed supplied {} tracks", tracks.len());
                for track in tracks {
                    self.queue.push(track);
                }
            }
            Err(error) => {
                tracing::warn!("radio feed failed: {}", error);
            }
        }
    }

    /// Replay the current session from the start (repeat-one).
    async fn restart_current(&mut self) {
        let Some(engine) = self.engine() else {
            return;
        };
        engine.seek(Duration::ZERO);
        self.fade_in().await;
    }

    /// Start playback with a volume ramp. Does nothing when the engine is
    /// already playing, so repeated play requests cannot stack fades.
    async fn fade_in(&mut self) {
        let Some(engine) = self.engine() else {
            return;
        };
        if engine.is_playing() {
            return;
        }
        let target = self.effective_volume();
        engine.play();
        engine.fade(0.0, target, self.fade_duration()).await;
        self.state = SessionState::Playing;
        self.start_sampler();
        if let Some(media) = &self.deps.media {
            media.playback_changed(true);
        }
    }

    /// Ramp down, pause, then restore the engine volume for the next play.
    async fn fade_out_and_pause(&mut self) {
        let Some(engine) = self.engine() else {
            return;
        };
        if !engine.is_playing() {
            return;
        }
        let level = self.effective_volume();
        engine.fade(level, 0.0, self.fade_duration()).await;
        engine.pause();
        engine.set_volume(level);
        self.state = SessionState::Paused;
        self.sampler.stop();
        if let Some(media) = &self.deps.media {
            media.playback_changed(false);
        }
    }

    fn toggle_mute(&mut self) {
        match self.pre_mute_volume.take() {
            Some(previous) => {
                self.volume = previous;
                if let Some(engine) = self.engine() {
                    engine.set_volume(self.volume);
                }
            }
            None => {
                self.pre_mute_volume = Some(self.volume);
                if let Some(engine) = self.engine() {
                    engine.set_volume(0.0);
                }
            }
        }
    }

    fn schedule_scrobble(&mut self, track: &TrackDescriptor) {
        if let Some(task) = self.scrobble_task.take() {
            task.abort();
        }
        if !self.settings.scrobble || track.is_local() {
            return;
        }
        let Some(scrobbler) = self.deps.scrobbler.clone() else {
            return;
        };
        let track = track.clone();
        self.scrobble_task = Some(tokio::spawn(async move {
            tokio::time::sleep(SCROBBLE_DELAY).await;
            scrobbler.scrobble(&track).await;
        }));
    }

    /// Tear down the active session: sampler and pending scrobble first,
    /// then the session itself (which aborts the event forwarder before
    /// stopping the engine).
    fn teardown_session(&mut self) {
        self.sampler.stop();
        if let Some(task) = self.scrobble_task.take() {
            task.abort();
        }
        if let Some(session) = self.session.take() {
            session.teardown();
        }
        if let Some(taskbar) = &self.deps.taskbar {
            taskbar.clear();
        }
        self.progress.reset();
        self.state = SessionState::Idle;
    }

    fn engine(&self) -> Option<Arc<dyn SoundEngine>> {
        self.session.as_ref().map(|s| s.engine.clone())
    }

    fn effective_volume(&self) -> f32 {
        if self.pre_mute_volume.is_some() {
            0.0
        } else {
            self.volume
        }
    }

    fn fade_duration(&self) -> Duration {
        if self.settings.fade_enabled {
            FADE_DURATION
        } else {
            Duration::ZERO
        }
    }

    fn attempt_budget(&self) -> usize {
        self.queue.len().max(1)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.teardown_session();
    }
}
