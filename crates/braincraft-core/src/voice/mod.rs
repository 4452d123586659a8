//! Voice input and output.
//!
//! The microphone and speaker are reached only through [`AudioCapture`] and
//! [`AudioPlayback`], so the session logic runs the same against real devices
//! and test fakes. Both are exclusive per session: starting a recording or
//! turning voice mode off stops playback.

#[cfg(feature = "audio-io")]
pub mod device;
pub mod wav;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::api::ChatBackend;
use crate::clock::Clock;
use crate::error::{ApiError, DeviceError, VoiceError};
use crate::logger::Logger;
use crate::state::Message;

#[cfg(feature = "audio-io")]
pub use device::{CpalCapture, RodioPlayback};
pub use wav::encode_wav;

/// A finished recording, already encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Microphone. `stop` must release the device.
pub trait AudioCapture {
    fn start(&mut self) -> Result<(), DeviceError>;
    fn stop(&mut self) -> Result<CapturedAudio, DeviceError>;
    fn is_recording(&self) -> bool;
}

/// Speaker for synthesized replies
pub trait AudioPlayback {
    fn play(&mut self, audio: Vec<u8>) -> Result<(), DeviceError>;
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// Stand-in used when the crate is built without audio devices
#[derive(Debug, Default)]
pub struct NoAudioDevice;

impl AudioCapture for NoAudioDevice {
    fn start(&mut self) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable("built without audio support".to_string()))
    }

    fn stop(&mut self) -> Result<CapturedAudio, DeviceError> {
        Err(DeviceError::Unavailable("built without audio support".to_string()))
    }

    fn is_recording(&self) -> bool {
        false
    }
}

impl AudioPlayback for NoAudioDevice {
    fn play(&mut self, _audio: Vec<u8>) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable("built without audio support".to_string()))
    }

    fn stop(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }
}

/// Default devices for this build
pub fn default_devices(logger: &Logger) -> (Box<dyn AudioCapture>, Box<dyn AudioPlayback>) {
    #[cfg(feature = "audio-io")]
    {
        (
            Box::new(CpalCapture::new(logger.child("AudioCapture"))),
            Box::new(RodioPlayback::new(logger.child("AudioPlayback"))),
        )
    }
    #[cfg(not(feature = "audio-io"))]
    {
        let _ = logger;
        (Box::new(NoAudioDevice), Box::new(NoAudioDevice))
    }
}

pub struct VoiceSession {
    capture: Box<dyn AudioCapture>,
    playback: Box<dyn AudioPlayback>,
    clock: Arc<dyn Clock>,
    logger: Logger,

    voice_enabled: bool,
    enabled_at: Option<DateTime<Utc>>,
    recording: bool,
    transcribing: bool,
    last_spoken: Option<String>,
}

impl VoiceSession {
    pub fn new(
        capture: Box<dyn AudioCapture>,
        playback: Box<dyn AudioPlayback>,
        clock: Arc<dyn Clock>,
        logger: Logger,
    ) -> Self {
        Self {
            capture,
            playback,
            clock,
            logger,
            voice_enabled: false,
            enabled_at: None,
            recording: false,
            transcribing: false,
            last_spoken: None,
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    pub fn enabled_at(&self) -> Option<DateTime<Utc>> {
        self.enabled_at
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribing
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Flip voice output. Turning it on records when, so older replies stay silent.
    pub fn toggle_voice_mode(&mut self) -> bool {
        let enabled = !self.voice_enabled;
        self.set_voice_mode(enabled);
        enabled
    }

    pub fn set_voice_mode(&mut self, enabled: bool) {
        if enabled == self.voice_enabled {
            return;
        }
        self.voice_enabled = enabled;
        if enabled {
            let now = self.clock.now();
            self.enabled_at = Some(now);
            self.logger.info(&format!("Voice mode on at {}", now.to_rfc3339()));
        } else {
            self.enabled_at = None;
            self.stop_playback();
            self.logger.info("Voice mode off");
        }
    }

    pub fn stop_playback(&mut self) {
        if self.playback.is_playing() {
            self.logger.debug("Stopping playback");
        }
        self.playback.stop();
    }

    /// Start capturing from the microphone.
    ///
    /// Refused (returns `Ok(false)`) while `busy` or while a transcription is
    /// in flight. A device failure is logged and leaves the session idle.
    pub fn start_recording(&mut self, busy: bool) -> Result<bool, DeviceError> {
        if self.recording || self.transcribing || busy {
            return Ok(false);
        }

        self.stop_playback();

        match self.capture.start() {
            Ok(()) => {
                self.recording = true;
                self.logger.info("Recording started");
                Ok(true)
            }
            Err(e) => {
                self.logger.error_with("Could not start recording", &e);
                Err(e)
            }
        }
    }

    /// Stop capturing and return the base64 payload for transcription.
    ///
    /// `Ok(None)` when nothing was recorded.
    pub fn stop_recording(&mut self) -> Result<Option<String>, DeviceError> {
        if !self.recording {
            return Ok(None);
        }
        self.recording = false;

        let audio = self.capture.stop().map_err(|e| {
            self.logger.error_with("Could not stop recording", &e);
            e
        })?;

        if audio.bytes.is_empty() {
            self.logger.warn("Recording was empty");
            return Ok(None);
        }

        self.logger.info(&format!("Recorded {} bytes of {}", audio.bytes.len(), audio.mime));
        self.transcribing = true;
        Ok(Some(STANDARD.encode(&audio.bytes)))
    }

    /// Close out a transcription. Returns the text to submit, if any.
    pub fn finish_transcription(&mut self, result: Result<String, ApiError>) -> Result<Option<String>, ApiError> {
        self.transcribing = false;
        match result {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    self.logger.warn("Transcription came back empty");
                    Ok(None)
                } else {
                    Ok(Some(text.to_string()))
                }
            }
            Err(e) => {
                self.logger.error_with("Transcription failed", &e);
                Err(e)
            }
        }
    }

    /// The assistant message to read aloud, at most once per message.
    ///
    /// Only the latest assistant message counts, and only if it arrived
    /// after voice mode was switched on.
    pub fn next_to_speak(&mut self, messages: &[Message]) -> Option<Message> {
        if !self.voice_enabled {
            return None;
        }
        let enabled_at = self.enabled_at?;
        let latest = messages.iter().rev().find(|m| m.is_assistant())?;

        if latest.timestamp <= enabled_at {
            return None;
        }
        if self.last_spoken.as_deref() == Some(latest.id.as_str()) {
            return None;
        }

        self.last_spoken = Some(latest.id.clone());
        Some(latest.clone())
    }

    /// Decode synthesized audio and play it, unless voice mode was turned off meanwhile
    pub fn play_speech(&mut self, audio_base64: &str) -> Result<(), DeviceError> {
        if !self.voice_enabled {
            self.logger.debug("Voice mode off; dropping synthesized audio");
            return Ok(());
        }

        let bytes = STANDARD
            .decode(audio_base64.trim())
            .map_err(|e| DeviceError::Decode(format!("Invalid base64 audio: {}", e)))?;

        self.playback.play(bytes).map_err(|e| {
            self.logger.error_with("Playback failed", &e);
            e
        })
    }

    /// Synthesize `message` and play it
    pub async fn speak<B: ChatBackend + ?Sized>(&mut self, backend: &B, message: &Message) -> Result<(), VoiceError> {
        let audio = backend.synthesize_speech(&message.content).await?;
        self.play_speech(&audio)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MessageStore, Sender};
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    #[derive(Default)]
    struct DeviceLog {
        captures_started: usize,
        captures_stopped: usize,
        played: Vec<Vec<u8>>,
        playback_stops: usize,
        playing: bool,
    }

    struct FakeCapture {
        log: Arc<Mutex<DeviceLog>>,
        fail: Option<DeviceError>,
        audio: Vec<u8>,
    }

    impl AudioCapture for FakeCapture {
        fn start(&mut self) -> Result<(), DeviceError> {
            if let Some(e) = self.fail.clone() {
                return Err(e);
            }
            self.log.lock().captures_started += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<CapturedAudio, DeviceError> {
            self.log.lock().captures_stopped += 1;
            Ok(CapturedAudio {
                bytes: self.audio.clone(),
                mime: "audio/wav",
            })
        }

        fn is_recording(&self) -> bool {
            false
        }
    }

    struct FakePlayback {
        log: Arc<Mutex<DeviceLog>>,
    }

    impl AudioPlayback for FakePlayback {
        fn play(&mut self, audio: Vec<u8>) -> Result<(), DeviceError> {
            let mut log = self.log.lock();
            log.played.push(audio);
            log.playing = true;
            Ok(())
        }

        fn stop(&mut self) {
            let mut log = self.log.lock();
            log.playback_stops += 1;
            log.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.log.lock().playing
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn session(fail: Option<DeviceError>, audio: Vec<u8>) -> (VoiceSession, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let session = VoiceSession::new(
            Box::new(FakeCapture {
                log: log.clone(),
                fail,
                audio,
            }),
            Box::new(FakePlayback { log: log.clone() }),
            Arc::new(FixedClock(Mutex::new(t(0)))),
            Logger::quiet("VoiceSession"),
        );
        (session, log)
    }

    fn assistant_at(store: &mut MessageStore, secs: i64) -> Message {
        store.push_assistant(format!("reply at {}", secs), None, t(secs)).clone()
    }

    #[test]
    fn test_playback_gated_by_enable_time() {
        let (mut voice, _) = session(None, Vec::new());
        voice.toggle_voice_mode();
        assert_eq!(voice.enabled_at(), Some(t(0)));

        let mut store = MessageStore::new();
        assistant_at(&mut store, -1);
        assert!(voice.next_to_speak(store.messages()).is_none());

        let fresh = assistant_at(&mut store, 1);
        assert_eq!(voice.next_to_speak(store.messages()).map(|m| m.id), Some(fresh.id));
        assert!(voice.next_to_speak(store.messages()).is_none());
    }

    #[test]
    fn test_only_latest_assistant_message_considered() {
        let (mut voice, _) = session(None, Vec::new());
        voice.toggle_voice_mode();

        let mut store = MessageStore::new();
        assistant_at(&mut store, 5);
        store.push_user("follow-up", t(6));
        let spoken = voice.next_to_speak(store.messages()).unwrap();
        assert_eq!(spoken.sender, Sender::Assistant);
        assert_eq!(spoken.timestamp, t(5));
    }

    #[test]
    fn test_nothing_spoken_when_voice_off() {
        let (mut voice, _) = session(None, Vec::new());
        let mut store = MessageStore::new();
        assistant_at(&mut store, 10);
        assert!(voice.next_to_speak(store.messages()).is_none());
    }

    #[test]
    fn test_toggle_off_stops_playback() {
        let (mut voice, log) = session(None, Vec::new());
        voice.toggle_voice_mode();
        voice.play_speech(&STANDARD.encode(b"ID3fake")).unwrap();
        assert!(voice.is_playing());

        voice.toggle_voice_mode();
        assert!(!voice.is_playing());
        assert!(voice.enabled_at().is_none());
        assert_eq!(log.lock().played.len(), 1);
    }

    #[test]
    fn test_speech_dropped_after_voice_off() {
        let (mut voice, log) = session(None, Vec::new());
        voice.play_speech(&STANDARD.encode(b"late audio")).unwrap();
        assert!(log.lock().played.is_empty());
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        let (mut voice, _) = session(None, Vec::new());
        voice.toggle_voice_mode();
        let err = voice.play_speech("***not base64***").unwrap_err();
        assert!(matches!(err, DeviceError::Decode(_)));
    }

    #[test]
    fn test_recording_stops_playback_and_encodes() {
        let (mut voice, log) = session(None, b"RIFFdata".to_vec());
        voice.toggle_voice_mode();
        voice.play_speech(&STANDARD.encode(b"audio")).unwrap();

        assert!(voice.start_recording(false).unwrap());
        assert!(!voice.is_playing());
        assert!(voice.is_recording());

        let payload = voice.stop_recording().unwrap().unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), b"RIFFdata");
        assert!(voice.is_transcribing());
        assert_eq!(log.lock().captures_stopped, 1);
    }

    #[test]
    fn test_recording_gated_by_busy_flags() {
        let (mut voice, log) = session(None, b"RIFF".to_vec());
        assert!(!voice.start_recording(true).unwrap());
        assert_eq!(log.lock().captures_started, 0);

        voice.start_recording(false).unwrap();
        voice.stop_recording().unwrap();
        assert!(voice.is_transcribing());
        assert!(!voice.start_recording(false).unwrap());
    }

    #[test]
    fn test_device_failure_leaves_state_untouched() {
        let (mut voice, _) = session(Some(DeviceError::PermissionDenied("denied".to_string())), Vec::new());
        let err = voice.start_recording(false).unwrap_err();
        assert!(matches!(err, DeviceError::PermissionDenied(_)));
        assert!(!voice.is_recording());
        assert!(!voice.is_transcribing());
    }

    #[test]
    fn test_empty_recording_not_sent() {
        let (mut voice, _) = session(None, Vec::new());
        voice.start_recording(false).unwrap();
        assert!(voice.stop_recording().unwrap().is_none());
        assert!(!voice.is_transcribing());
    }

    #[test]
    fn test_finish_transcription() {
        let (mut voice, _) = session(None, b"RIFF".to_vec());
        voice.start_recording(false).unwrap();
        voice.stop_recording().unwrap();

        let text = voice.finish_transcription(Ok("  draw a pie chart \n".to_string())).unwrap();
        assert_eq!(text.as_deref(), Some("draw a pie chart"));
        assert!(!voice.is_transcribing());

        let blank = voice.finish_transcription(Ok("   ".to_string())).unwrap();
        assert!(blank.is_none());

        let err = voice.finish_transcription(Err(ApiError::Network("down".to_string())));
        assert!(err.is_err());
    }

    #[test]
    fn test_enable_time_follows_clock() {
        let clock = Arc::new(FixedClock(Mutex::new(t(0))));
        let mut voice = VoiceSession::new(
            Box::new(NoAudioDevice),
            Box::new(NoAudioDevice),
            clock.clone(),
            Logger::quiet("VoiceSession"),
        );

        voice.toggle_voice_mode();
        assert_eq!(voice.enabled_at(), Some(t(0)));

        *clock.0.lock() = t(0) + Duration::seconds(45);
        voice.toggle_voice_mode();
        assert!(voice.enabled_at().is_none());
        voice.toggle_voice_mode();
        assert_eq!(voice.enabled_at(), Some(t(45)));

        // A reply from before the second enable stays silent
        let mut store = MessageStore::new();
        assistant_at(&mut store, 30);
        assert!(voice.next_to_speak(store.messages()).is_none());
        assistant_at(&mut store, 46);
        assert!(voice.next_to_speak(store.messages()).is_some());
    }
}
