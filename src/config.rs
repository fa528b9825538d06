use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::elements::{ElementCommand, Trigger};
use crate::router::RouterOptions;
use crate::speech::{CapabilityLookup, RecognitionParams};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub recognition: RecognitionConfig,
    pub synthesis: SynthesisConfig,
    pub telemetry: TelemetryConfig,
    pub elements: Vec<ElementConfig>,
    pub commands: Vec<CommandConfig>,
}

/// Recognition runs in single-result mode; only the language is tunable
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct RecognitionConfig {
    pub lang: String,
    pub recognizer_names: Vec<String>,
    pub grammar_names: Vec<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        let lookup = CapabilityLookup::default();
        Self {
            lang: RecognitionParams::default().lang,
            recognizer_names: lookup.recognizer,
            grammar_names: lookup.grammar,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SynthesisConfig {
    pub synthesizer_names: Vec<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            synthesizer_names: CapabilityLookup::default().synthesizer,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub log_path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: "~/.trigger-commands/commands.log".to_owned(),
        }
    }
}

/// Element known to the demo host
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ElementConfig {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Click,
    Read,
}

/// Startup element command
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    pub element: String,
    pub action: CommandKind,
    pub key: Option<String>,
    pub phrase: Option<String>,
    #[serde(default)]
    pub reserved: bool,
}

impl CommandConfig {
    /// Converts to an [`ElementCommand`]
    ///
    /// # Errors
    /// Returns error unless exactly one of `key` / `phrase` is set, or if
    /// `reserved` is set on a phrase command
    pub fn to_command(&self) -> Result<ElementCommand> {
        let trigger = match (&self.key, &self.phrase) {
            (Some(key), None) if self.reserved => Trigger::ReservedKey(key.clone()),
            (Some(key), None) => Trigger::Key(key.clone()),
            (None, Some(phrase)) if !self.reserved => Trigger::Phrase(phrase.clone()),
            (None, Some(_)) => bail!(
                "command for element {:?}: only key commands can be reserved",
                self.element
            ),
            _ => bail!(
                "command for element {:?} needs exactly one of `key` or `phrase`",
                self.element
            ),
        };
        Ok(ElementCommand {
            element_id: self.element.clone(),
            trigger,
        })
    }
}

const DEFAULT_CONFIG: &str = r#"[recognition]
lang = "en-US"
recognizer_names = ["SpeechRecognition", "webkitSpeechRecognition"]
grammar_names = ["SpeechGrammarList", "webkitSpeechGrammarList"]

[synthesis]
synthesizer_names = ["speechSynthesis"]

[telemetry]
enabled = false
log_path = "~/.trigger-commands/commands.log"

[[elements]]
id = "submit"
text = "Submit form"

[[elements]]
id = "headline"
text = "Welcome to the demo page"

[[commands]]
element = "submit"
action = "click"
key = "Enter"
reserved = true

[[commands]]
element = "headline"
action = "read"
key = "r"

[[commands]]
element = "submit"
action = "click"
phrase = "submit"

[[commands]]
element = "headline"
action = "read"
phrase = "read"
"#;

impl Config {
    /// Load config from ~/.trigger-commands.toml
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("failed to read config file")?;
        Self::parse(&contents)
    }

    /// Parse config TOML
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config TOML")
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".trigger-commands.toml"))
    }

    fn create_default(path: &Path) -> Result<()> {
        fs::write(path, DEFAULT_CONFIG).context("failed to write default config")?;
        Ok(())
    }

    /// Router options derived from the recognition and synthesis sections
    #[must_use]
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            lookup: CapabilityLookup {
                recognizer: self.recognition.recognizer_names.clone(),
                grammar: self.recognition.grammar_names.clone(),
                synthesizer: self.synthesis.synthesizer_names.clone(),
            },
            recognition: RecognitionParams {
                lang: self.recognition.lang.clone(),
                ..RecognitionParams::default()
            },
        }
    }
}
