//! Streaming multi-track mixer.
//!
//! [`MixerStream`] keeps a set of live tracks, each with its own buffered
//! input and [`SourceState`], and produces mixed audio through
//! [`std::io::Read`]. Every read mixes one frame-aligned segment with
//! [`Mixer::mix`], so fades started through a [`TrackCtrl`] continue
//! seamlessly from one segment to the next.

use super::track::{Pull, TrackBuffer};
use super::{Chunk, Format, MixError, Mixer, MixerOptions, MixTables, SourceState, VolumeCurve};
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, trace, warn};

type TrackCreatedCallback = Arc<dyn Fn(&TrackCtrl) + Send + Sync>;
type TrackClosedCallback = Arc<dyn Fn(&TrackClosed) + Send + Sync>;

/// Seconds of audio each track can buffer ahead of the mixer.
const TRACK_BUFFER_SECS: u64 = 10;

/// How long a reader waits for new data before re-checking.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Options for configuring a MixerStream.
pub struct StreamOptions {
    /// End the stream (EOF) once no tracks are left.
    pub auto_close: bool,
    /// Maximum audio produced by one read.
    pub segment: Duration,
    /// Options for the underlying [`Mixer`].
    pub mixer: MixerOptions,
    on_track_created: Option<TrackCreatedCallback>,
    on_track_closed: Option<TrackClosedCallback>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            auto_close: false,
            segment: Duration::from_millis(50),
            mixer: MixerOptions::default(),
            on_track_created: None,
            on_track_closed: None,
        }
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("auto_close", &self.auto_close)
            .field("segment", &self.segment)
            .field("mixer", &self.mixer)
            .field("on_track_created", &self.on_track_created.is_some())
            .field("on_track_closed", &self.on_track_closed.is_some())
            .finish()
    }
}

impl StreamOptions {
    /// Creates options with auto_close enabled.
    pub fn with_auto_close(mut self) -> Self {
        self.auto_close = true;
        self
    }

    /// Sets the segment duration.
    pub fn with_segment(mut self, segment: Duration) -> Self {
        self.segment = segment;
        self
    }

    /// Sets the volume curve.
    pub fn with_volume_curve(mut self, curve: VolumeCurve) -> Self {
        self.mixer.volume_curve = curve;
        self
    }

    /// Sets the mixer options.
    pub fn with_mixer(mut self, mixer: MixerOptions) -> Self {
        self.mixer = mixer;
        self
    }

    /// Sets a callback that fires when a new track is created.
    ///
    /// The callback may adjust the track's volume before any of its audio
    /// is mixed.
    pub fn with_on_track_created(mut self, f: impl Fn(&TrackCtrl) + Send + Sync + 'static) -> Self {
        self.on_track_created = Some(Arc::new(f));
        self
    }

    /// Sets a callback that fires when a track is removed.
    pub fn with_on_track_closed(
        mut self,
        f: impl Fn(&TrackClosed) + Send + Sync + 'static,
    ) -> Self {
        self.on_track_closed = Some(Arc::new(f));
        self
    }
}

/// Options for configuring a Track.
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Labels used to find the track later.
    pub labels: Vec<String>,
}

impl TrackOptions {
    /// Creates options with a single label.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            labels: vec![label.into()],
        }
    }

    /// Creates options with several labels.
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

/// Report of a track that left the mixer.
#[derive(Debug, Clone)]
pub struct TrackClosed {
    /// Labels of the removed track.
    pub labels: Vec<String>,
    /// Error the track was closed with, if any.
    pub error: Option<String>,
    /// Total bytes mixed from the track.
    pub read_bytes: u64,
    /// Volume state at removal.
    pub state: SourceState,
}

struct StreamState {
    tracks: Vec<Arc<TrackInner>>,
    close_err: Option<String>,
    close_write: bool,
    frames_mixed: u64,
    /// Reusable per-track segment buffers.
    segments: Vec<Vec<u8>>,
}

/// A multi-track streaming mixer.
///
/// Implements `Read` (through `&MixerStream`) to provide the mixed audio.
pub struct MixerStream {
    format: Format,
    segment_bytes: usize,
    auto_close: bool,
    mixer: Mixer,

    state: Mutex<StreamState>,
    notify: Arc<Condvar>,

    on_track_created: Option<TrackCreatedCallback>,
    on_track_closed: Option<TrackClosedCallback>,
}

impl std::fmt::Debug for MixerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixerStream")
            .field("format", &self.format)
            .field("segment_bytes", &self.segment_bytes)
            .field("auto_close", &self.auto_close)
            .finish_non_exhaustive()
    }
}

impl MixerStream {
    /// Creates a stream producing audio in `format`.
    ///
    /// Fails if the mixer options cannot handle the format's sample width.
    pub fn new(format: Format, opts: StreamOptions) -> Result<Arc<Self>, MixError> {
        Self::with_tables(format, opts, Arc::new(MixTables::new()))
    }

    /// Creates a stream sharing already built lookup tables.
    pub fn with_tables(
        format: Format,
        opts: StreamOptions,
        tables: Arc<MixTables>,
    ) -> Result<Arc<Self>, MixError> {
        if format.channels == 0 {
            return Err(MixError::ZeroChannels);
        }
        let mixer = Mixer::new(tables, opts.mixer);
        mixer.sample_width(format.bitdepth())?;

        let frame = format.frame_bytes();
        let segment_bytes = (format.bytes_in_duration(opts.segment) as usize).max(frame);

        Ok(Arc::new(Self {
            format,
            segment_bytes,
            auto_close: opts.auto_close,
            mixer,
            state: Mutex::new(StreamState {
                tracks: Vec::new(),
                close_err: None,
                close_write: false,
                frames_mixed: 0,
                segments: Vec::new(),
            }),
            notify: Arc::new(Condvar::new()),
            on_track_created: opts.on_track_created,
            on_track_closed: opts.on_track_closed,
        }))
    }

    /// Returns the output format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the maximum number of bytes one read produces.
    pub fn segment_bytes(&self) -> usize {
        self.segment_bytes
    }

    /// Returns the number of frames mixed so far.
    pub fn frames_mixed(&self) -> u64 {
        self.state.lock().unwrap().frames_mixed
    }

    /// Returns the number of live tracks.
    pub fn count(&self) -> usize {
        self.state.lock().unwrap().tracks.len()
    }

    /// Creates a new track.
    ///
    /// Returns the Track for writing audio and a TrackCtrl for controlling
    /// its volume and lifecycle.
    pub fn create_track(&self, opts: Option<TrackOptions>) -> io::Result<(Track, TrackCtrl)> {
        let opts = opts.unwrap_or_default();

        self.check_accepting(&self.state.lock().unwrap())?;

        // At least one segment of whole frames, even for degenerate rates.
        let capacity = ((self.format.bytes_rate() * TRACK_BUFFER_SECS) as usize)
            .max(self.segment_bytes);
        let capacity = capacity - capacity % self.format.frame_bytes();
        let inner = Arc::new(TrackInner {
            labels: opts.labels,
            format: self.format,
            source: Mutex::new(SourceState::default()),
            read_bytes: AtomicU64::new(0),
            buffer: TrackBuffer::new(capacity, self.notify.clone()),
        });
        let ctrl = TrackCtrl {
            inner: inner.clone(),
        };

        // Runs unlocked so the callback may call back into the stream.
        // The track is not yet visible to the mixer.
        if let Some(ref cb) = self.on_track_created {
            cb(&ctrl);
        }

        let mut state = self.state.lock().unwrap();
        self.check_accepting(&state)?;
        state.tracks.push(inner.clone());
        debug!(labels = ?inner.labels, tracks = state.tracks.len(), "track created");
        self.notify.notify_all();

        Ok((Track { inner }, ctrl))
    }

    fn check_accepting(&self, state: &StreamState) -> io::Result<()> {
        if let Some(ref err) = state.close_err {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, err.clone()));
        }
        if state.close_write {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "cannot create track after close_write",
            ));
        }
        Ok(())
    }

    /// Returns controllers for tracks carrying any of `labels`, or all tracks
    /// when `labels` is empty.
    pub fn tracks(&self, labels: &[&str]) -> Vec<TrackCtrl> {
        let state = self.state.lock().unwrap();
        state
            .tracks
            .iter()
            .filter(|t| labels.is_empty() || labels.iter().any(|l| t.has_label(l)))
            .map(|t| TrackCtrl { inner: t.clone() })
            .collect()
    }

    /// Fades every track labelled `label` to `volume`. Returns how many
    /// tracks were affected.
    pub fn fade_label(&self, label: &str, volume: f64, duration: Duration) -> usize {
        let tracks = self.tracks(&[label]);
        for t in &tracks {
            t.fade_to(volume, duration);
        }
        tracks.len()
    }

    /// Closes writing to the stream.
    ///
    /// No new tracks can be added; existing tracks stop accepting input and
    /// play out what they have buffered. Reads return EOF once all tracks
    /// are gone.
    pub fn close_write(&self) {
        let mut state = self.state.lock().unwrap();
        self.close_write_locked(&mut state);
    }

    /// Closes the stream with an error. All tracks are closed with it.
    pub fn close_with_error(&self, err: io::Error) {
        let mut state = self.state.lock().unwrap();
        if state.close_err.is_some() {
            return;
        }
        let msg = err.to_string();
        state.close_err = Some(msg.clone());
        state.close_write = true;
        for track in &state.tracks {
            track.buffer.close_with_error(msg.clone());
        }
        self.notify.notify_all();
    }

    /// Closes the stream.
    pub fn close(&self) {
        self.close_with_error(io::Error::new(io::ErrorKind::BrokenPipe, "mixer closed"));
    }

    fn close_write_locked(&self, state: &mut StreamState) {
        if state.close_err.is_some() || state.close_write {
            return;
        }
        state.close_write = true;
        for track in &state.tracks {
            track.buffer.close_write();
        }
        self.notify.notify_all();
    }

    /// Reads one mixed segment into `buf`.
    ///
    /// At most [`segment_bytes`](Self::segment_bytes) are produced, always
    /// whole frames; a buffer shorter than one frame reads nothing. Blocks
    /// until some track has data, the stream ends, or it is closed.
    fn read_mixed(&self, buf: &mut [u8]) -> io::Result<usize> {
        let frame = self.format.frame_bytes();
        let len = buf.len().min(self.segment_bytes);
        let len = len - len % frame;
        if len == 0 {
            return Ok(0);
        }

        let mut state = self.state.lock().unwrap();

        loop {
            if let Some(ref err) = state.close_err {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, err.clone()));
            }

            if state.tracks.is_empty() {
                if self.auto_close {
                    self.close_write_locked(&mut state);
                }
                if state.close_write {
                    return Ok(0);
                }
                state = self.notify.wait_timeout(state, WAIT_SLICE).unwrap().0;
                continue;
            }

            let (mixed, removed) = self.mix_segment(&mut state, &mut buf[..len])?;

            if !removed.is_empty() {
                drop(state);
                for closed in &removed {
                    if let Some(ref err) = closed.error {
                        warn!(labels = ?closed.labels, error = %err, "track closed with error");
                    } else {
                        debug!(labels = ?closed.labels, read_bytes = closed.read_bytes, "track removed");
                    }
                    if let Some(ref cb) = self.on_track_closed {
                        cb(closed);
                    }
                }
                if mixed > 0 {
                    return Ok(mixed);
                }
                state = self.state.lock().unwrap();
                continue;
            }

            if mixed > 0 {
                return Ok(mixed);
            }

            state = self.notify.wait_timeout(state, WAIT_SLICE).unwrap().0;
        }
    }

    /// Pulls up to one segment from every track and mixes it into `out`.
    ///
    /// The output covers the longest pull, rounded up to a whole frame;
    /// tracks that supplied less are padded with silence. Returns the bytes
    /// written, plus the tracks that finished.
    fn mix_segment(
        &self,
        state: &mut StreamState,
        out: &mut [u8],
    ) -> io::Result<(usize, Vec<TrackClosed>)> {
        let len = out.len();
        let frame = self.format.frame_bytes();
        let count = state.tracks.len();
        if state.segments.len() < count {
            state.segments.resize_with(count, Vec::new);
        }

        let mut pulled = 0;
        for (track, seg) in state.tracks.iter().zip(state.segments.iter_mut()) {
            seg.clear();
            seg.resize(len, 0);
            if let Pull::Data(n) = track.buffer.pull(seg, frame) {
                track.read_bytes.fetch_add(n as u64, Ordering::Relaxed);
                pulled = pulled.max(n);
            }
        }

        let mixed_len = pulled.div_ceil(frame) * frame;
        if mixed_len > 0 {
            let mut guards: Vec<_> = state
                .tracks
                .iter()
                .map(|t| t.source.lock().unwrap())
                .collect();
            let mut sources: Vec<SourceState> = guards.iter().map(|g| **g).collect();

            let mixed = self.mixer.mix_format(
                &state.segments[..count],
                &mut sources,
                mixed_len,
                self.format,
            )?;

            for (guard, source) in guards.iter_mut().zip(sources) {
                **guard = source;
            }
            drop(guards);

            out[..mixed_len].copy_from_slice(&mixed);
            state.frames_mixed += (mixed_len / frame) as u64;
            trace!(tracks = count, bytes = mixed_len, "mixed segment");
        }

        let mut removed = Vec::new();
        state.tracks.retain(|t| {
            if t.buffer.is_finished() {
                removed.push(t.closed());
                false
            } else {
                true
            }
        });

        Ok((mixed_len, removed))
    }
}

impl Read for &MixerStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_mixed(buf)
    }
}

struct TrackInner {
    labels: Vec<String>,
    format: Format,
    source: Mutex<SourceState>,
    read_bytes: AtomicU64,
    buffer: TrackBuffer,
}

impl TrackInner {
    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    fn closed(&self) -> TrackClosed {
        TrackClosed {
            labels: self.labels.clone(),
            error: self.buffer.error(),
            read_bytes: self.read_bytes.load(Ordering::Relaxed),
            state: *self.source.lock().unwrap(),
        }
    }
}

/// A writable audio track in a MixerStream.
pub struct Track {
    inner: Arc<TrackInner>,
}

impl Track {
    /// Returns the format the track expects.
    pub fn format(&self) -> Format {
        self.inner.format
    }

    /// Writes an audio chunk to the track.
    ///
    /// The chunk must already be in the stream's format.
    pub fn write(&self, chunk: &dyn Chunk) -> io::Result<()> {
        if chunk.format() != self.inner.format {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "chunk format {} does not match track format {}",
                    chunk.format(),
                    self.inner.format
                ),
            ));
        }
        if let Some(bytes) = chunk.as_bytes() {
            self.inner.buffer.write(bytes)?;
        } else {
            let mut buf = Vec::new();
            chunk.write_to(&mut buf)?;
            self.inner.buffer.write(&buf)?;
        }
        Ok(())
    }

    /// Writes raw PCM bytes in the stream format. Blocks while the track's
    /// buffer is full.
    pub fn write_bytes(&self, data: &[u8]) -> io::Result<usize> {
        self.inner.buffer.write(data)
    }
}

/// Controller for a track in the stream.
///
/// Provides control over volume, fades and the track lifecycle.
#[derive(Clone)]
pub struct TrackCtrl {
    inner: Arc<TrackInner>,
}

impl std::fmt::Debug for TrackCtrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackCtrl")
            .field("labels", &self.inner.labels)
            .field("state", &self.state())
            .finish()
    }
}

impl TrackCtrl {
    /// Returns the labels of the track.
    pub fn labels(&self) -> &[String] {
        &self.inner.labels
    }

    /// Returns true if the track carries `label`.
    pub fn is(&self, label: &str) -> bool {
        self.inner.has_label(label)
    }

    /// Returns the current volume.
    pub fn volume(&self) -> f64 {
        self.inner.source.lock().unwrap().volume
    }

    /// Returns a snapshot of the volume state.
    pub fn state(&self) -> SourceState {
        *self.inner.source.lock().unwrap()
    }

    /// Sets the volume immediately, cancelling any fade.
    pub fn set_volume(&self, volume: f64) {
        self.inner.source.lock().unwrap().set_volume(volume);
    }

    /// Fades from the current volume to `volume` over `duration` of mixed
    /// audio.
    pub fn fade_to(&self, volume: f64, duration: Duration) {
        let rate = self.inner.format.sample_rate;
        self.inner
            .source
            .lock()
            .unwrap()
            .fade_to_duration(volume, duration, rate);
    }

    /// Returns the total number of bytes mixed from this track.
    pub fn read_bytes(&self) -> u64 {
        self.inner.read_bytes.load(Ordering::Relaxed)
    }

    /// Returns the number of whole frames still buffered.
    pub fn remaining_frames(&self) -> u64 {
        self.inner.format.frames(self.inner.buffer.buffered() as u64)
    }

    /// Closes writing to the track. Buffered audio still plays.
    pub fn close_write(&self) {
        self.inner.buffer.close_write();
    }

    /// Closes writing and appends `silence` first.
    pub fn close_write_with_silence(&self, silence: Duration) -> io::Result<()> {
        let chunk = self.inner.format.silence_chunk(silence);
        let mut buf = Vec::new();
        chunk.write_to(&mut buf)?;
        self.inner.buffer.write(&buf)?;
        self.close_write();
        Ok(())
    }

    /// Closes the track with an error, dropping buffered audio.
    pub fn close_with_error(&self, err: io::Error) {
        self.inner.buffer.close_with_error(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::{SampleWidth, mix_sample};
    use std::sync::{Weak, mpsc};

    fn constant(format: Format, value: f64, frames: usize) -> Vec<u8> {
        let samples = vec![value; frames * format.channels as usize];
        format.data_chunk_from_samples(&samples).into_data()
    }

    fn read_all(mixer: &MixerStream) -> Vec<u8> {
        let mut mixed = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            match (&*mixer).read(&mut buf) {
                Ok(0) => break,
                Ok(n) => mixed.extend_from_slice(&buf[..n]),
                Err(e) => panic!("read error: {}", e),
            }
        }
        mixed
    }

    fn decode(width: SampleWidth, data: &[u8]) -> Vec<f64> {
        data.chunks_exact(width.bytes()).map(|b| width.read(b)).collect()
    }

    #[test]
    fn test_create_track() {
        let mixer = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let (_track, ctrl) = mixer
            .create_track(Some(TrackOptions::with_label("song")))
            .unwrap();
        assert_eq!(mixer.count(), 1);
        assert!(ctrl.is("song"));
        assert!(!ctrl.is("tcp"));
        assert_eq!(ctrl.volume(), 1.0);
    }

    #[test]
    fn test_auto_close_without_tracks_is_eof() {
        let mixer = MixerStream::new(
            Format::L16_MONO_16K,
            StreamOptions::default().with_auto_close(),
        )
        .unwrap();
        let mut buf = [0u8; 64];
        assert_eq!((&*mixer).read(&mut buf).unwrap(), 0);
        assert!(mixer.create_track(None).is_err());
    }

    #[test]
    fn test_single_track_passthrough() {
        let format = Format::L16_MONO_16K;
        let mixer = MixerStream::new(format, StreamOptions::default().with_auto_close()).unwrap();
        let (track, ctrl) = mixer.create_track(None).unwrap();

        let data = format
            .data_chunk_from_samples(&[1.0, -1.0, 0.0, 1.0])
            .into_data();
        track.write_bytes(&data).unwrap();
        ctrl.close_write();

        assert_eq!(read_all(&mixer), data);
        assert_eq!(mixer.frames_mixed(), 4);
        assert_eq!(mixer.count(), 0);
    }

    #[test]
    fn test_segments_are_frame_aligned() {
        let format = Format::L16_STEREO_48K;
        let opts = StreamOptions::default()
            .with_auto_close()
            .with_segment(Duration::from_millis(10));
        let mixer = MixerStream::new(format, opts).unwrap();
        assert_eq!(mixer.segment_bytes(), 480 * 4);

        let (track, ctrl) = mixer.create_track(None).unwrap();
        track.write_bytes(&constant(format, 0.25, 1000)).unwrap();
        ctrl.close_write();

        let mut buf = vec![0u8; 4099];
        let n = (&*mixer).read(&mut buf).unwrap();
        assert_eq!(n, 480 * 4);
        let n = (&*mixer).read(&mut buf[..7]).unwrap();
        assert_eq!(n, 4);
    }

    #[test]
    fn test_two_tracks_mix() {
        let format = Format::L16_MONO_16K;
        let mixer = MixerStream::new(format, StreamOptions::default().with_auto_close()).unwrap();
        let (a, ca) = mixer.create_track(None).unwrap();
        let (b, cb) = mixer.create_track(None).unwrap();

        a.write_bytes(&constant(format, 0.5, 100)).unwrap();
        b.write_bytes(&constant(format, -0.5, 100)).unwrap();
        ca.close_write();
        cb.close_write();

        let mixed = read_all(&mixer);
        assert_eq!(mixed.len(), 200);
        assert!(mixed.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_ended_track_is_padded_with_silence() {
        let format = Format::L16_MONO_16K;
        let mixer = MixerStream::new(format, StreamOptions::default().with_auto_close()).unwrap();
        let (long, cl) = mixer.create_track(Some(TrackOptions::with_label("long"))).unwrap();
        let (short, cs) = mixer.create_track(Some(TrackOptions::with_label("short"))).unwrap();

        long.write_bytes(&constant(format, 0.25, 100)).unwrap();
        short.write_bytes(&constant(format, 0.25, 10)).unwrap();
        cs.close_write();
        cl.close_write();

        let mut buf = vec![0u8; 100];
        assert_eq!((&*mixer).read(&mut buf).unwrap(), 100);
        let samples = decode(format.width, &buf);
        // The first 10 frames carry both tracks, the rest only the long one.
        assert!(samples[0] > samples[20]);
        assert!((samples[20] - 0.25).abs() < 1e-4);
        assert_eq!(mixer.count(), 1);
        assert!(mixer.tracks(&["short"]).is_empty());
        assert_eq!(cl.remaining_frames(), 50);
    }

    #[test]
    fn test_fade_to_continues_across_reads() {
        let format = Format::L16_MONO_16K;
        let opts = StreamOptions::default()
            .with_auto_close()
            .with_segment(Duration::from_millis(5));
        let mixer = MixerStream::new(format, opts).unwrap();
        let (track, ctrl) = mixer.create_track(None).unwrap();

        ctrl.set_volume(0.0);
        // 10ms at 16kHz = 160 frames, spread over two 80-frame segments.
        ctrl.fade_to(1.0, Duration::from_millis(10));
        assert_eq!(ctrl.state().transition_length, 160);

        track.write_bytes(&constant(format, 1.0, 400)).unwrap();
        ctrl.close_write();

        let mut buf = vec![0u8; 4096];
        (&*mixer).read(&mut buf).unwrap();
        let mid = ctrl.state();
        assert_eq!(mid.transition_current, 80);
        assert!(mid.volume > 0.0 && mid.volume < 1.0);

        (&*mixer).read(&mut buf).unwrap();
        let done = ctrl.state();
        assert_eq!(done.volume, 1.0);
        assert!(!done.is_transitioning());
    }

    #[test]
    fn test_on_track_created_sets_initial_volume() {
        let format = Format::L16_MONO_16K;
        let opts = StreamOptions::default()
            .with_auto_close()
            .with_on_track_created(|ctrl| {
                if ctrl.is("muted") {
                    ctrl.set_volume(0.0);
                }
            });
        let mixer = MixerStream::new(format, opts).unwrap();
        let (track, ctrl) = mixer
            .create_track(Some(TrackOptions::with_label("muted")))
            .unwrap();
        assert_eq!(ctrl.volume(), 0.0);

        track.write_bytes(&constant(format, 0.9, 20)).unwrap();
        ctrl.close_write();
        assert!(read_all(&mixer).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_on_track_closed_reports_error() {
        let format = Format::L16_MONO_16K;
        let closed = Arc::new(Mutex::new(Vec::<TrackClosed>::new()));
        let sink = closed.clone();
        let opts = StreamOptions::default()
            .with_auto_close()
            .with_on_track_closed(move |c| sink.lock().unwrap().push(c.clone()));
        let mixer = MixerStream::new(format, opts).unwrap();

        let (ok, ok_ctrl) = mixer.create_track(Some(TrackOptions::with_label("ok"))).unwrap();
        let (bad, bad_ctrl) = mixer.create_track(Some(TrackOptions::with_label("bad"))).unwrap();
        ok.write_bytes(&constant(format, 0.1, 10)).unwrap();
        bad.write_bytes(&constant(format, 0.1, 10)).unwrap();
        bad_ctrl.close_with_error(io::Error::other("source failed"));
        ok_ctrl.close_write();

        read_all(&mixer);

        let closed = closed.lock().unwrap();
        assert_eq!(closed.len(), 2);
        let bad = closed.iter().find(|c| c.labels == ["bad"]).unwrap();
        assert_eq!(bad.error.as_deref(), Some("source failed"));
        assert_eq!(bad.read_bytes, 0);
        let ok = closed.iter().find(|c| c.labels == ["ok"]).unwrap();
        assert!(ok.error.is_none());
        assert_eq!(ok.read_bytes, 20);
    }

    #[test]
    fn test_tracks_by_label_and_fade_label() {
        let mixer = MixerStream::new(Format::L16_STEREO_44K, StreamOptions::default()).unwrap();
        let (_t1, _) = mixer
            .create_track(Some(TrackOptions::with_labels(["song", "queue"])))
            .unwrap();
        let (_t2, _) = mixer
            .create_track(Some(TrackOptions::with_label("microphone")))
            .unwrap();
        let (_t3, _) = mixer.create_track(None).unwrap();

        assert_eq!(mixer.tracks(&[]).len(), 3);
        assert_eq!(mixer.tracks(&["song"]).len(), 1);
        assert_eq!(mixer.tracks(&["queue", "microphone"]).len(), 2);
        assert_eq!(mixer.tracks(&["tcp"]).len(), 0);

        let n = mixer.fade_label("song", 0.5, Duration::from_secs(2));
        assert_eq!(n, 1);
        let state = mixer.tracks(&["song"])[0].state();
        assert_eq!(state.transition_to, 0.5);
        assert_eq!(state.transition_length, 88200);
    }

    #[test]
    fn test_chunk_format_must_match() {
        let mixer = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let (track, _ctrl) = mixer.create_track(None).unwrap();
        let other = Format::L16_STEREO_48K.silence_chunk(Duration::from_millis(10));
        let err = track.write(&other).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let same = Format::L16_MONO_16K.silence_chunk(Duration::from_millis(10));
        track.write(&same).unwrap();
    }

    #[test]
    fn test_close_fails_reads() {
        let mixer = MixerStream::new(Format::L16_MONO_16K, StreamOptions::default()).unwrap();
        let (track, _ctrl) = mixer.create_track(None).unwrap();
        mixer.close();
        let mut buf = [0u8; 32];
        let err = (&*mixer).read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(track.write_bytes(&[0, 0]).is_err());
    }

    #[test]
    fn test_concurrent_writers() {
        let format = Format::L16_MONO_16K;
        let mixer = MixerStream::new(format, StreamOptions::default().with_auto_close()).unwrap();

        let mut handles = Vec::new();
        let mut ctrls = Vec::new();
        for value in [0.1, 0.2, 0.3] {
            let (track, ctrl) = mixer.create_track(None).unwrap();
            let data = constant(format, value, 1600);
            // One full segment is queued up front so the first read overlaps
            // all three tracks.
            let (head, rest) = data.split_at(mixer.segment_bytes());
            track.write_bytes(head).unwrap();
            let rest = rest.to_vec();
            let c = ctrl.clone();
            handles.push(std::thread::spawn(move || {
                for chunk in rest.chunks(320) {
                    track.write_bytes(chunk).unwrap();
                }
                c.close_write();
            }));
            ctrls.push(ctrl);
        }

        let mixed = read_all(&mixer);
        for h in handles {
            h.join().unwrap();
        }

        assert!(mixed.len() >= 1600 * 2);
        assert_eq!(mixer.count(), 0);
        for ctrl in &ctrls {
            assert_eq!(ctrl.read_bytes(), 1600 * 2);
        }
        let first = decode(format.width, &mixed[..mixer.segment_bytes()]);
        let expected = mix_sample(mix_sample(0.1, 0.2), 0.3);
        assert!(first.iter().all(|s| (s - expected).abs() < 1e-3), "first {}", first[0]);
    }

    #[test]
    fn test_on_track_created_may_reenter_stream() {
        let format = Format::L16_MONO_16K;
        let stream_ref: Arc<Mutex<Weak<MixerStream>>> = Arc::new(Mutex::new(Weak::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (r, s) = (stream_ref.clone(), seen.clone());
        let opts = StreamOptions::default().with_on_track_created(move |ctrl| {
            if let Some(stream) = r.lock().unwrap().upgrade() {
                s.lock().unwrap().push(stream.count());
                if ctrl.is("last") {
                    stream.close_write();
                }
            }
        });
        let mixer = MixerStream::new(format, opts).unwrap();
        *stream_ref.lock().unwrap() = Arc::downgrade(&mixer);

        let (done_tx, done_rx) = mpsc::channel();
        let m = mixer.clone();
        std::thread::spawn(move || {
            let first = m.create_track(None).map(|_| ());
            let second = m.create_track(None).map(|_| ());
            let last = m.create_track(Some(TrackOptions::with_label("last"))).map(|_| ());
            done_tx.send((first, second, last)).unwrap();
        });
        let (first, second, last) = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("create_track blocked in on_track_created");

        assert!(first.is_ok());
        assert!(second.is_ok());
        // Closed from inside the callback, so the track is never added.
        assert_eq!(last.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        // The callback runs before the new track is visible.
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(mixer.count(), 2);
    }

    #[test]
    fn test_zero_rate_format_still_drains() {
        let format = Format {
            sample_rate: 0,
            channels: 1,
            width: SampleWidth::S16,
        };
        let mixer = MixerStream::new(format, StreamOptions::default().with_auto_close()).unwrap();
        assert_eq!(mixer.segment_bytes(), 2);
        let (track, ctrl) = mixer.create_track(None).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let m = mixer.clone();
        std::thread::spawn(move || done_tx.send(read_all(&m)).unwrap());

        track.write_bytes(&constant(format, 0.5, 4)).unwrap();
        ctrl.close_write();
        let mixed = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("reader stalled");
        assert_eq!(mixed, constant(format, 0.5, 4));
    }

    #[test]
    fn test_rejects_format_the_mixer_refuses() {
        let opts =
            StreamOptions::default().with_mixer(MixerOptions::default().without_packed_24bit());
        let err = MixerStream::new(Format::L24_STEREO_48K, opts).unwrap_err();
        assert!(matches!(err, MixError::UnsupportedSampleWidth(3)));

        let zero = Format {
            sample_rate: 16000,
            channels: 0,
            width: SampleWidth::S16,
        };
        let err = MixerStream::new(zero, StreamOptions::default()).unwrap_err();
        assert!(matches!(err, MixError::ZeroChannels));

        let opts =
            StreamOptions::default().with_mixer(MixerOptions::default().without_packed_24bit());
        assert!(MixerStream::new(Format::L16_STEREO_48K, opts).is_ok());
    }

    #[test]
    fn test_close_write_with_silence() {
        let format = Format::L16_MONO_16K;
        let mixer = MixerStream::new(format, StreamOptions::default().with_auto_close()).unwrap();
        let (track, ctrl) = mixer.create_track(None).unwrap();
        track.write_bytes(&constant(format, 0.5, 10)).unwrap();
        ctrl.close_write_with_silence(Duration::from_millis(1)).unwrap();
        // 10 frames of audio plus 16 frames of silence.
        assert_eq!(read_all(&mixer).len(), 52);
    }
}
