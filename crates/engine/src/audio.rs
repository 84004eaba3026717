//! Audio playback over a cpal output stream.
//!
//! The host owns a command channel plus one mutex-guarded voice table shared
//! with the stream callback. Game code sends commands; the callback drains
//! them and mixes active voices into the output buffer. Every failure while
//! opening the device degrades to a disabled host that ignores playback, so
//! a machine without audio still runs the full game loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

/// Mono PCM samples at a fixed rate. Cheap to clone; playback shares the
/// sample storage.
#[derive(Clone)]
pub struct Clip {
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl Clip {
    pub fn from_samples(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples: samples.into(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("sample_rate", &self.sample_rate)
            .field("samples", &self.samples.len())
            .finish()
    }
}

#[derive(Debug)]
enum Command {
    Play {
        voice: u64,
        clip: Clip,
        looped: bool,
        volume: f32,
    },
    SetVolume {
        voice: u64,
        volume: f32,
    },
    Stop {
        voice: u64,
    },
}

#[derive(Debug)]
struct Voice {
    id: u64,
    clip: Clip,
    position: f64,
    step: f64,
    looped: bool,
    volume: f32,
}

fn apply_command(voices: &mut Vec<Voice>, stream_rate: u32, command: Command) {
    match command {
        Command::Play {
            voice,
            clip,
            looped,
            volume,
        } => {
            if clip.samples.is_empty() {
                warn!(voice, "ignoring empty audio clip");
                return;
            }
            let step = f64::from(clip.sample_rate) / f64::from(stream_rate.max(1));
            voices.push(Voice {
                id: voice,
                clip,
                position: 0.0,
                step,
                looped,
                volume,
            });
        }
        Command::SetVolume { voice, volume } => {
            for entry in voices.iter_mut() {
                if entry.id == voice {
                    entry.volume = volume;
                }
            }
        }
        Command::Stop { voice } => {
            voices.retain(|entry| entry.id != voice);
        }
    }
}

/// Nearest-sample mixer. Finished one-shot voices drop out of the table at
/// the frame they end; looping voices wrap their position.
fn mix_into(voices: &mut Vec<Voice>, buffer: &mut [f32], channels: usize) {
    let channels = channels.max(1);
    for frame in buffer.chunks_mut(channels) {
        let mut acc = 0.0f32;
        voices.retain_mut(|voice| {
            let len = voice.clip.samples.len();
            let mut index = voice.position as usize;
            if index >= len {
                if !voice.looped {
                    return false;
                }
                voice.position %= len as f64;
                index = voice.position as usize;
            }
            acc += voice.clip.samples[index] * voice.volume;
            voice.position += voice.step;
            true
        });
        let sample = acc.clamp(-1.0, 1.0);
        for slot in frame {
            *slot = sample;
        }
    }
}

fn select_device(host: &cpal::Host, preferred: Option<&str>) -> Option<cpal::Device> {
    if let Some(name) = preferred {
        match host.output_devices() {
            Ok(mut devices) => {
                if let Some(device) =
                    devices.find(|device| device.name().map(|n| n == name).unwrap_or(false))
                {
                    return Some(device);
                }
                warn!(name, "requested audio device not found, using default");
            }
            Err(err) => {
                warn!(error = %err, "audio device enumeration failed, using default");
            }
        }
    }
    host.default_output_device()
}

/// Owns the output stream and the clip registry. `start` never fails; it
/// returns a disabled host when no usable device exists.
pub struct AudioHost {
    clips: HashMap<String, Clip>,
    channel: Option<Sender<Command>>,
    _stream: Option<cpal::Stream>,
    voices: Arc<Mutex<Vec<Voice>>>,
    device_name: Option<String>,
    next_voice: AtomicU64,
}

impl AudioHost {
    pub fn disabled() -> Self {
        Self {
            clips: HashMap::new(),
            channel: None,
            _stream: None,
            voices: Arc::new(Mutex::new(Vec::new())),
            device_name: None,
            next_voice: AtomicU64::new(0),
        }
    }

    pub fn start(preferred: Option<&str>) -> Self {
        let host = cpal::default_host();
        let Some(device) = select_device(&host, preferred) else {
            warn!("no output device available, audio disabled");
            return Self::disabled();
        };
        let device_name = device.name().ok();
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "output device has no default config, audio disabled");
                return Self::disabled();
            }
        };
        if config.sample_format() != cpal::SampleFormat::F32 {
            warn!(format = ?config.sample_format(), "output device is not f32, audio disabled");
            return Self::disabled();
        }
        let config: cpal::StreamConfig = config.into();
        let stream_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        let voices: Arc<Mutex<Vec<Voice>>> = Arc::new(Mutex::new(Vec::new()));
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mixer_voices = Arc::clone(&voices);

        let stream = match device.build_output_stream(
            &config,
            move |buffer: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut voices = mixer_voices.lock().expect("voice table lock poisoned");
                while let Ok(command) = receiver.try_recv() {
                    apply_command(&mut voices, stream_rate, command);
                }
                mix_into(&mut voices, buffer, channels);
            },
            |err| warn!(error = %err, "audio stream error"),
            None,
        ) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "output stream construction failed, audio disabled");
                return Self::disabled();
            }
        };
        if let Err(err) = stream.play() {
            warn!(error = %err, "output stream refused to start, audio disabled");
            return Self::disabled();
        }
        info!(
            device = device_name.as_deref().unwrap_or("unknown"),
            sample_rate = stream_rate,
            channels,
            "audio stream running"
        );

        Self {
            clips: HashMap::new(),
            channel: Some(sender),
            _stream: Some(stream),
            voices,
            device_name,
            next_voice: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn register_clip(&mut self, name: impl Into<String>, clip: Clip) {
        let name = name.into();
        debug!(
            clip = %name,
            samples = clip.samples.len(),
            sample_rate = clip.sample_rate,
            "audio clip registered"
        );
        self.clips.insert(name, clip);
    }

    pub fn play(&self, name: &str) {
        self.spawn_voice(name, false, 1.0);
    }

    pub fn play_with_volume(&self, name: &str, volume: f32) {
        self.spawn_voice(name, false, volume);
    }

    /// Starts a looping voice and returns a handle for later volume changes
    /// or stopping. Handles from a disabled host are inert.
    pub fn play_loop(&self, name: &str, volume: f32) -> LoopHandle {
        let voice = self.spawn_voice(name, true, volume);
        LoopHandle {
            voice,
            channel: self.channel.clone(),
        }
    }

    /// Voices currently mixing. Commands still in the channel are not
    /// counted until the callback drains them.
    pub fn voice_count(&self) -> usize {
        self.voices.lock().expect("voice table lock poisoned").len()
    }

    fn spawn_voice(&self, name: &str, looped: bool, volume: f32) -> u64 {
        let voice = self.next_voice.fetch_add(1, Ordering::Relaxed);
        let Some(clip) = self.clips.get(name) else {
            warn!(clip = name, "unknown audio clip");
            return voice;
        };
        let Some(channel) = self.channel.as_ref() else {
            return voice;
        };
        let _ = channel.send(Command::Play {
            voice,
            clip: clip.clone(),
            looped,
            volume,
        });
        voice
    }
}

#[derive(Debug, Clone)]
pub struct LoopHandle {
    voice: u64,
    channel: Option<Sender<Command>>,
}

impl LoopHandle {
    pub fn set_volume(&self, volume: f32) {
        if let Some(channel) = &self.channel {
            let _ = channel.send(Command::SetVolume {
                voice: self.voice,
                volume,
            });
        }
    }

    pub fn stop(&self) {
        if let Some(channel) = &self.channel {
            let _ = channel.send(Command::Stop {
                voice: self.voice,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_host_ignores_playback() {
        let mut host = AudioHost::disabled();
        host.register_clip("blip", Clip::from_samples(4, vec![0.5; 4]));
        assert!(!host.is_enabled());
        host.play("blip");
        host.play_with_volume("blip", 0.5);
        let handle = host.play_loop("blip", 1.0);
        handle.set_volume(0.2);
        handle.stop();
        assert_eq!(host.voice_count(), 0);
    }

    #[test]
    fn mixer_advances_and_drops_finished_voices() {
        let clip = Clip::from_samples(4, vec![0.5; 4]);
        let mut voices = Vec::new();
        apply_command(
            &mut voices,
            4,
            Command::Play {
                voice: 0,
                clip,
                looped: false,
                volume: 1.0,
            },
        );

        let mut buffer = [0.0f32; 8];
        mix_into(&mut voices, &mut buffer, 2);
        assert_eq!(buffer, [0.5; 8]);
        assert_eq!(voices.len(), 1);

        let mut tail = [1.0f32; 2];
        mix_into(&mut voices, &mut tail, 2);
        assert_eq!(tail, [0.0; 2]);
        assert!(voices.is_empty());
    }

    #[test]
    fn looping_voice_wraps_and_honours_volume_and_stop() {
        let clip = Clip::from_samples(2, vec![1.0, -1.0]);
        let mut voices = Vec::new();
        apply_command(
            &mut voices,
            2,
            Command::Play {
                voice: 7,
                clip,
                looped: true,
                volume: 0.5,
            },
        );

        let mut buffer = [0.0f32; 4];
        mix_into(&mut voices, &mut buffer, 1);
        assert_eq!(buffer, [0.5, -0.5, 0.5, -0.5]);

        apply_command(
            &mut voices,
            2,
            Command::SetVolume {
                voice: 7,
                volume: 0.25,
            },
        );
        let mut pair = [0.0f32; 2];
        mix_into(&mut voices, &mut pair, 1);
        assert_eq!(pair, [0.25, -0.25]);

        apply_command(&mut voices, 2, Command::Stop { voice: 7 });
        assert!(voices.is_empty());
        let mut silent = [9.0f32; 2];
        mix_into(&mut voices, &mut silent, 1);
        assert_eq!(silent, [0.0, 0.0]);
    }

    #[test]
    fn empty_clips_are_rejected_at_play() {
        let mut voices = Vec::new();
        apply_command(
            &mut voices,
            44_100,
            Command::Play {
                voice: 0,
                clip: Clip::from_samples(44_100, Vec::new()),
                looped: true,
                volume: 1.0,
            },
        );
        assert!(voices.is_empty());
    }

    #[test]
    fn clip_duration_uses_the_sample_rate() {
        let clip = Clip::from_samples(4, vec![0.0; 6]);
        assert!((clip.duration_secs() - 1.5).abs() < 1e-6);
    }
}
