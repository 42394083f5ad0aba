//! Shared test doubles: a scriptable sound engine, scripted URL and
//! unblock sources, and recording implementations of the controller's
//! collaborator traits.

use crate::config::SongQuality;
use crate::controller::{
    ControllerDeps, ControllerEvent, ControllerSettings, MediaSessionSink, PlaybackController,
    RadioFeed, Scrobbler,
};
use crate::engine::{EngineEvent, SoundEngine, SoundEngineFactory};
use crate::error::Result;
use crate::lyrics::{LyricApi, LyricService, RawLyricPayload};
use crate::model::TrackDescriptor;
use crate::notify::{NoticeLevel, Notifier};
use crate::resolver::{SongUrlApi, SourceResolver, UnblockResolver, UrlCandidate};
use crate::sampler::TaskbarProgress;
use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Ordered record of engine and factory calls, shared across a fixture.
#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

/// Scriptable in-memory sound engine.
pub struct MockEngine {
    log: Arc<CallLog>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
    playing: AtomicBool,
    position: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
    volume: Mutex<f32>,
    rate: Mutex<f32>,
    /// When set, `load` reports this failure code instead of Loaded
    fail_load_code: Option<u32>,
}

impl MockEngine {
    /// Engine with no event channel, for driving the sampler directly.
    pub fn detached() -> Self {
        Self::build(None, Arc::new(CallLog::new()), None, None)
    }

    fn build(
        events: Option<mpsc::UnboundedSender<EngineEvent>>,
        log: Arc<CallLog>,
        fail_load_code: Option<u32>,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            log,
            events,
            playing: AtomicBool::new(false),
            position: Mutex::new(Duration::ZERO),
            duration: Mutex::new(duration),
            volume: Mutex::new(0.0),
            rate: Mutex::new(1.0),
            fail_load_code,
        }
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    pub fn set_duration(&self, duration: Duration) {
        *self.duration.lock() = Some(duration);
    }

    pub fn current_volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Simulate the track playing to its natural end.
    pub fn finish_track(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.emit(EngineEvent::Ended);
    }
}

#[async_trait]
impl SoundEngine for MockEngine {
    async fn load(&self, url: &str) -> Result<()> {
        self.log.push(format!("load {url}"));
        match self.fail_load_code {
            Some(code) => self.emit(EngineEvent::LoadFailed(code)),
            None => self.emit(EngineEvent::Loaded),
        }
        Ok(())
    }

    fn play(&self) {
        self.playing.store(true, Ordering::SeqCst);
        self.log.push("play");
        self.emit(EngineEvent::Playing);
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.log.push("pause");
        self.emit(EngineEvent::Paused);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.log.push("stop");
    }

    fn seek(&self, position: Duration) {
        *self.position.lock() = position;
        self.log.push(format!("seek {}", position.as_millis()));
    }

    fn position(&self) -> Duration {
        *self.position.lock()
    }

    fn duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
    }

    fn set_rate(&self, rate: f32) {
        *self.rate.lock() = rate;
    }

    async fn fade(&self, from: f32, to: f32, over: Duration) {
        self.log
            .push(format!("fade {from}->{to} {}ms", over.as_millis()));
        *self.volume.lock() = to;
    }

    fn unload(&self) {
        self.log.push("unload");
    }
}

/// Factory handing out [`MockEngine`]s that share one call log.
pub struct MockFactory {
    pub log: Arc<CallLog>,
    engines: Mutex<Vec<Arc<MockEngine>>>,
    fail_codes: Mutex<VecDeque<u32>>,
    fail_all_code: Mutex<Option<u32>>,
    default_duration: Mutex<Option<Duration>>,
}

impl MockFactory {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            engines: Mutex::new(Vec::new()),
            fail_codes: Mutex::new(VecDeque::new()),
            fail_all_code: Mutex::new(None),
            default_duration: Mutex::new(None),
        }
    }

    /// Every created engine fails its load with this code.
    pub fn fail_all_loads(&self, code: u32) {
        *self.fail_all_code.lock() = Some(code);
    }

    /// The first `count` engines fail their load with this code.
    pub fn fail_first_loads(&self, code: u32, count: usize) {
        self.fail_codes.lock().extend(std::iter::repeat_n(code, count));
    }

    pub fn set_default_duration(&self, duration: Duration) {
        *self.default_duration.lock() = Some(duration);
    }

    pub fn last_engine(&self) -> Arc<MockEngine> {
        self.engines.lock().last().cloned().expect("no engine created yet")
    }
}

impl SoundEngineFactory for MockFactory {
    fn create(&self, events: mpsc::UnboundedSender<EngineEvent>) -> Result<Arc<dyn SoundEngine>> {
        self.log.push("create");
        let fail_code =
            (*self.fail_all_code.lock()).or_else(|| self.fail_codes.lock().pop_front());
        let engine = Arc::new(MockEngine::build(
            Some(events),
            self.log.clone(),
            fail_code,
            *self.default_duration.lock(),
        ));
        self.engines.lock().push(engine.clone());
        Ok(engine)
    }
}

enum UrlScript {
    Always(Option<UrlCandidate>),
    Sequence(Mutex<VecDeque<Option<UrlCandidate>>>),
}

/// Scripted primary song-URL source.
pub struct ScriptedUrlApi {
    script: UrlScript,
}

impl ScriptedUrlApi {
    pub fn ok(url: &str) -> Self {
        Self {
            script: UrlScript::Always(Some(UrlCandidate {
                url: url.to_string(),
                trial_only: false,
            })),
        }
    }

    pub fn trial(url: &str) -> Self {
        Self {
            script: UrlScript::Always(Some(UrlCandidate {
                url: url.to_string(),
                trial_only: true,
            })),
        }
    }

    pub fn none() -> Self {
        Self {
            script: UrlScript::Always(None),
        }
    }

    /// Answer one entry per call, in order; exhausted means unavailable.
    pub fn sequence(urls: Vec<Option<&str>>) -> Self {
        let queue = urls
            .into_iter()
            .map(|url| {
                url.map(|url| UrlCandidate {
                    url: url.to_string(),
                    trial_only: false,
                })
            })
            .collect();
        Self {
            script: UrlScript::Sequence(Mutex::new(queue)),
        }
    }
}

#[async_trait]
impl SongUrlApi for ScriptedUrlApi {
    async fn song_url(&self, _id: u64, _quality: SongQuality) -> Result<Option<UrlCandidate>> {
        match &self.script {
            UrlScript::Always(candidate) => Ok(candidate.clone()),
            UrlScript::Sequence(queue) => Ok(queue.lock().pop_front().flatten()),
        }
    }
}

/// Scripted unblock fallback.
pub struct ScriptedUnblock {
    url: String,
    indirect: bool,
    blob: Vec<u8>,
}

impl ScriptedUnblock {
    pub fn direct(url: &str) -> Self {
        Self {
            url: url.to_string(),
            indirect: false,
            blob: Vec::new(),
        }
    }

    pub fn indirect(url: &str, blob: &[u8]) -> Self {
        Self {
            url: url.to_string(),
            indirect: true,
            blob: blob.to_vec(),
        }
    }
}

#[async_trait]
impl UnblockResolver for ScriptedUnblock {
    async fn resolve(&self, _track: &TrackDescriptor) -> Result<Option<String>> {
        Ok(Some(self.url.clone()))
    }

    async fn fetch_blob(&self, _url: &str) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(&self.blob))
    }

    fn is_indirect(&self, _url: &str) -> bool {
        self.indirect
    }
}

/// Lyric source with nothing to offer.
pub struct StubLyricApi;

#[async_trait]
impl LyricApi for StubLyricApi {
    async fn remote_lyrics(&self, _id: u64) -> Result<Option<RawLyricPayload>> {
        Ok(None)
    }

    async fn local_lyrics(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Notifier that records every notice and fatal prompt.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
    fatals: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().clone()
    }

    pub fn fatal_count(&self) -> usize {
        self.fatals.lock().len()
    }

    pub fn fatals(&self) -> Vec<(String, String)> {
        self.fatals.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notice(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push((level, message.to_string()));
    }

    fn fatal(&self, title: &str, message: &str) {
        self.fatals
            .lock()
            .push((title.to_string(), message.to_string()));
    }
}

/// Taskbar that remembers the last reported percentage.
#[derive(Default)]
pub struct RecordingTaskbar {
    last: Mutex<Option<f64>>,
    clears: AtomicUsize,
}

impl RecordingTaskbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_percent(&self) -> Option<f64> {
        *self.last.lock()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl TaskbarProgress for RecordingTaskbar {
    fn set_progress(&self, percent: f64) {
        *self.last.lock() = Some(percent);
    }

    fn clear(&self) {
        *self.last.lock() = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scrobbler that records scrobbled tracks.
#[derive(Default)]
pub struct RecordingScrobbler {
    tracks: Mutex<Vec<TrackDescriptor>>,
}

impl RecordingScrobbler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scrobbled(&self) -> Vec<TrackDescriptor> {
        self.tracks.lock().clone()
    }
}

#[async_trait]
impl Scrobbler for RecordingScrobbler {
    async fn scrobble(&self, track: &TrackDescriptor) {
        self.tracks.lock().push(track.clone());
    }
}

/// Media session sink that records metadata and playback changes.
#[derive(Default)]
pub struct RecordingMediaSink {
    tracks: Mutex<Vec<String>>,
    playing: Mutex<Vec<bool>>,
}

impl RecordingMediaSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_titles(&self) -> Vec<String> {
        self.tracks.lock().clone()
    }

    pub fn playing_changes(&self) -> Vec<bool> {
        self.playing.lock().clone()
    }
}

impl MediaSessionSink for RecordingMediaSink {
    fn track_changed(&self, track: &TrackDescriptor) {
        self.tracks.lock().push(track.title.clone());
    }

    fn playback_changed(&self, playing: bool) {
        self.playing.lock().push(playing);
    }
}

/// Radio feed that hands out its tracks once, then runs dry.
pub struct StaticRadioFeed {
    tracks: Mutex<Vec<TrackDescriptor>>,
}

impl StaticRadioFeed {
    pub fn new(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks: Mutex::new(tracks),
        }
    }
}

#[async_trait]
impl RadioFeed for StaticRadioFeed {
    async fn next_tracks(&self) -> Result<Vec<TrackDescriptor>> {
        Ok(std::mem::take(&mut *self.tracks.lock()))
    }
}

/// Pre-wired controller collaborators for tests.
pub struct ControllerFixture {
    pub log: Arc<CallLog>,
    pub factory: Arc<MockFactory>,
    notifier: Arc<dyn Notifier>,
    scrobbler: Option<Arc<dyn Scrobbler>>,
    media: Option<Arc<dyn MediaSessionSink>>,
    radio: Option<Arc<dyn RadioFeed>>,
    resolver: Arc<SourceResolver>,
}

impl ControllerFixture {
    pub fn builder() -> FixtureBuilder {
        FixtureBuilder::default()
    }

    pub fn make_controller(
        &self,
        settings: ControllerSettings,
    ) -> (
        PlaybackController,
        mpsc::UnboundedReceiver<ControllerEvent>,
    ) {
        let (tx, rx) = crate::controller::channel();
        let deps = ControllerDeps {
            engine_factory: self.factory.clone(),
            resolver: self.resolver.clone(),
            lyrics: LyricService::new(Arc::new(StubLyricApi)),
            notifier: self.notifier.clone(),
            scrobbler: self.scrobbler.clone(),
            taskbar: None,
            palette: None,
            radio: self.radio.clone(),
            history: None,
            media: self.media.clone(),
        };
        (PlaybackController::new(deps, settings, tx), rx)
    }
}

#[derive(Default)]
pub struct FixtureBuilder {
    notifier: Option<Arc<dyn Notifier>>,
    scrobbler: Option<Arc<dyn Scrobbler>>,
    media: Option<Arc<dyn MediaSessionSink>>,
    radio_tracks: Option<Vec<TrackDescriptor>>,
    url_sequence: Option<Vec<Option<String>>>,
    fail_all_code: Option<u32>,
    fail_first: Option<(u32, usize)>,
}

impl FixtureBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn scrobbler(mut self, scrobbler: Arc<dyn Scrobbler>) -> Self {
        self.scrobbler = Some(scrobbler);
        self
    }

    pub fn media(mut self, media: Arc<dyn MediaSessionSink>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn radio(mut self, tracks: Vec<TrackDescriptor>) -> Self {
        self.radio_tracks = Some(tracks);
        self
    }

    pub fn url_sequence(mut self, urls: Vec<Option<&str>>) -> Self {
        self.url_sequence = Some(
            urls.into_iter()
                .map(|url| url.map(|url| url.to_string()))
                .collect(),
        );
        self
    }

    pub fn fail_loads_with_code(mut self, code: u32) -> Self {
        self.fail_all_code = Some(code);
        self
    }

    pub fn fail_first_loads_with_code(mut self, code: u32, count: usize) -> Self {
        self.fail_first = Some((code, count));
        self
    }

    pub fn build(self) -> ControllerFixture {
        let log = Arc::new(CallLog::new());
        let factory = Arc::new(MockFactory::new(log.clone()));
        if let Some(code) = self.fail_all_code {
            factory.fail_all_loads(code);
        }
        if let Some((code, count)) = self.fail_first {
            factory.fail_first_loads(code, count);
        }

        let api: Arc<dyn SongUrlApi> = match self.url_sequence {
            Some(urls) => Arc::new(ScriptedUrlApi::sequence(
                urls.iter().map(|url| url.as_deref()).collect(),
            )),
            None => Arc::new(ScriptedUrlApi::ok("https://cdn.example.com/stream.mp3")),
        };
        let resolver = Arc::new(SourceResolver::new(api, SongQuality::Exhigh));

        ControllerFixture {
            log,
            factory,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(RecordingNotifier::new())),
            scrobbler: self.scrobbler,
            media: self.media,
            radio: self
                .radio_tracks
                .map(|tracks| Arc::new(StaticRadioFeed::new(tracks)) as Arc<dyn RadioFeed>),
            resolver,
        }
    }
}

/// Default controller fixture.
pub fn test_controller() -> (
    PlaybackController,
    mpsc::UnboundedReceiver<ControllerEvent>,
    ControllerFixture,
) {
    test_controller_with(ControllerSettings::default())
}

pub fn test_controller_with(
    settings: ControllerSettings,
) -> (
    PlaybackController,
    mpsc::UnboundedReceiver<ControllerEvent>,
    ControllerFixture,
) {
    let fixture = ControllerFixture::builder().build();
    let (controller, rx) = fixture.make_controller(settings);
    (controller, rx, fixture)
}

/// Let spawned forwarders run, then feed every queued event to the
/// controller, repeating until the channel stays quiet.
pub async fn pump(
    controller: &mut PlaybackController,
    rx: &mut mpsc::UnboundedReceiver<ControllerEvent>,
) {
    for _ in 0..8 {
        tokio::task::yield_now().await;
        while let Ok(event) = rx.try_recv() {
            controller.handle_event(event).await;
        }
    }
}
