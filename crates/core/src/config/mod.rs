use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    GapPolicy, MediaKind, MediaTime, Result, ScaledTapError, SourceMedia, TimePitchAlgorithm,
    Variant,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub playback: PlaybackConfig,
    pub probe: ProbeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            playback: PlaybackConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.playback.validate()
    }
}

/// The bundled asset every layout is cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub name: String,
    pub video_duration_secs: f64,
    pub audio_duration_secs: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: "video.mp4".to_string(),
            video_duration_secs: 8.0,
            audio_duration_secs: 8.0,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        for (kind, secs) in [
            (MediaKind::Video, self.video_duration_secs),
            (MediaKind::Audio, self.audio_duration_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ScaledTapError::Config(format!(
                    "{kind} duration must be positive, got {secs}"
                )));
            }
        }
        Ok(())
    }

    pub fn source_media(&self) -> SourceMedia {
        SourceMedia::audio_video(
            self.name.clone(),
            MediaTime::from_secs_f64(self.video_duration_secs),
            MediaTime::from_secs_f64(self.audio_duration_secs),
        )
    }
}

/// How the reference host renders a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub quantum_frames: usize,
    pub pitch_algorithm: TimePitchAlgorithm,
    pub gap_policy: GapPolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            quantum_frames: 1024,
            pitch_algorithm: TimePitchAlgorithm::Varispeed,
            gap_policy: GapPolicy::Reject,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ScaledTapError::Config("sample_rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(ScaledTapError::Config("channels must be non-zero".into()));
        }
        if self.quantum_frames == 0 {
            return Err(ScaledTapError::Config("quantum_frames must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Layout probed when none is named on the command line; all when unset.
    pub variant: Option<Variant>,
    /// Fail source retrieval on every Nth quantum.
    pub fail_every: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.playback.pitch_algorithm, TimePitchAlgorithm::Varispeed);
        assert_eq!(config.playback.gap_policy, GapPolicy::Reject);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "playback": { "sample_rate": 48000, "gap_policy": "materialize" },
                "probe": { "variant": "two-audio-tracks", "fail_every": 5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.playback.sample_rate, 48_000);
        assert_eq!(config.playback.quantum_frames, 1024);
        assert_eq!(config.playback.gap_policy, GapPolicy::Materialize);
        assert_eq!(config.probe.variant, Some(Variant::TwoAudioTracks));
        assert_eq!(config.probe.fail_every, Some(5));
        assert_eq!(config.source, SourceConfig::default());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = AppConfig::default();
        config.probe.variant = Some(Variant::OneAudioTrackWithSilence);
        config.playback.pitch_algorithm = TimePitchAlgorithm::Spectral;

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(AppConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_zero_rates() {
        let err = AppConfig::from_json(r#"{ "playback": { "quantum_frames": 0 } }"#).unwrap_err();
        assert!(matches!(err, ScaledTapError::Config(_)));

        let err = AppConfig::from_json(r#"{ "source": { "audio_duration_secs": 0.0 } }"#)
            .unwrap_err();
        assert!(format!("{err}").contains("audio"));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir()
            .join(format!("scaled-tap-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "source": { "name": "clip.mov" } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.source.source_media().name(), "clip.mov");
        assert!(matches!(AppConfig::load(&path), Err(ScaledTapError::Io(_))));
    }
}
