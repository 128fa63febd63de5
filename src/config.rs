use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::labels::DEFAULT_LABELS_PATH;
use crate::speech::devices::DEFAULT_WORDS_PER_MINUTE;
use crate::AlertThresholds;

const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SPEECH_PROGRAM: &str = "espeak-ng";

#[derive(Debug, Deserialize, Default)]
struct SightConfigFile {
    labels_path: Option<PathBuf>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    speech: Option<SpeechConfigFile>,
    thresholds: Option<AlertThresholds>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    script_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    engine: Option<String>,
    program: Option<String>,
    args: Option<Vec<String>>,
    words_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Scripted,
    Tract,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Scripted => "scripted",
            DetectorKind::Tract => "tract",
        }
    }
}

impl FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scripted" => Ok(DetectorKind::Scripted),
            "tract" => Ok(DetectorKind::Tract),
            other => Err(anyhow!("unknown detector backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEngine {
    Log,
    Command,
}

impl FromStr for SpeechEngine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(SpeechEngine::Log),
            "command" => Ok(SpeechEngine::Command),
            other => Err(anyhow!("unknown speech engine: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SightConfig {
    pub labels_path: PathBuf,
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub speech: SpeechSettings,
    pub thresholds: AlertThresholds,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: DetectorKind,
    pub script_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub engine: SpeechEngine,
    pub program: String,
    pub args: Vec<String>,
    pub words_per_minute: u32,
}

impl SightConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SIGHT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SightConfigFile) -> Result<Self> {
        let labels_path = file
            .labels_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH));

        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
        };

        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: match detector.backend.as_deref() {
                Some(name) => name.parse()?,
                None => DetectorKind::Scripted,
            },
            script_path: detector.script_path,
            model_path: detector.model_path,
        };

        let speech = file.speech.unwrap_or_default();
        let speech = SpeechSettings {
            engine: match speech.engine.as_deref() {
                Some(name) => name.parse()?,
                None => SpeechEngine::Log,
            },
            program: speech
                .program
                .unwrap_or_else(|| DEFAULT_SPEECH_PROGRAM.to_string()),
            args: speech.args.unwrap_or_default(),
            words_per_minute: speech.words_per_minute.unwrap_or(DEFAULT_WORDS_PER_MINUTE),
        };

        Ok(Self {
            labels_path,
            source,
            detector,
            speech,
            thresholds: file.thresholds.unwrap_or_default(),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SIGHT_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.labels_path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("SIGHT_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.parse()?;
            }
        }
        if let Ok(path) = std::env::var("SIGHT_SCRIPT_PATH") {
            if !path.trim().is_empty() {
                self.detector.script_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("SIGHT_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(engine) = std::env::var("SIGHT_SPEECH_ENGINE") {
            if !engine.trim().is_empty() {
                self.speech.engine = engine.parse()?;
            }
        }
        if let Ok(cooldown) = std::env::var("SIGHT_COOLDOWN_MS") {
            self.thresholds.cooldown_ms = cooldown
                .trim()
                .parse()
                .map_err(|_| anyhow!("SIGHT_COOLDOWN_MS must be an integer number of milliseconds"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source geometry must be non-zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be >= 1"));
        }
        if self.speech.engine == SpeechEngine::Command && self.speech.program.trim().is_empty() {
            return Err(anyhow!("speech.program must be set for the command engine"));
        }
        if self.speech.words_per_minute == 0 {
            return Err(anyhow!("speech.words_per_minute must be >= 1"));
        }
        self.thresholds.validate()
    }
}

fn read_config_file(path: &Path) -> Result<SightConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: SightConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
