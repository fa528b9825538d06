use std::rc::Rc;

use tracing::{debug, warn};

use crate::action::ActionResult;
use crate::error::CommandError;

/// Parameters applied to a recognizer when the voice backend initialises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionParams {
    /// BCP 47 language tag
    pub lang: String,
    /// Whether the recognizer should report interim (non-final) results
    pub interim_results: bool,
    /// Alternatives per result; only the first is ever consulted
    pub max_alternatives: u32,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            lang: "en-US".to_owned(),
            interim_results: false,
            max_alternatives: 1,
        }
    }
}

/// One candidate transcript for a recognition result
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAlternative {
    /// Recognized text
    pub transcript: String,
    /// Recognizer confidence in `0.0..=1.0` (reported, not used for routing)
    pub confidence: f32,
}

/// A recognition result; alternatives are ranked best first
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    /// Ranked alternatives
    pub alternatives: Vec<RecognitionAlternative>,
}

/// Event delivered by a recognizer; the newest result is last
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionEvent {
    /// Results accumulated in this recognition session
    pub results: Vec<RecognitionResult>,
}

impl RecognitionEvent {
    /// Event carrying a single result with one alternative
    pub fn phrase(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            results: vec![RecognitionResult {
                alternatives: vec![RecognitionAlternative {
                    transcript: transcript.into(),
                    confidence,
                }],
            }],
        }
    }

    /// Event with no results (nothing matched)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Transcript of the top alternative of the newest result
    #[must_use]
    pub fn top_transcript(&self) -> Option<&str> {
        self.results
            .last()
            .and_then(|result| result.alternatives.first())
            .map(|alternative| alternative.transcript.as_str())
    }
}

/// Handler a recognizer calls for every recognition event
pub type ResultHandler = Rc<dyn Fn(&RecognitionEvent) -> ActionResult>;

/// Continuous phrase recognition engine supplied by the platform
#[cfg_attr(test, mockall::automock)]
pub trait Recognizer {
    /// Applies recognition parameters
    fn configure(&mut self, params: &RecognitionParams);
    /// Installs the handler for recognition events, replacing any previous one
    fn set_result_handler(&mut self, handler: ResultHandler);
    /// Starts continuous recognition
    fn start(&mut self);
    /// Stops recognition
    fn stop(&mut self);
}

/// Grammar-constraint builder attached to the recognizer
#[cfg_attr(test, mockall::automock)]
pub trait GrammarBuilder {
    /// Adds a JSGF grammar with the given weight
    fn add_from_string(&mut self, grammar: &str, weight: f32);
}

/// Text-to-speech output supplied by the platform
#[cfg_attr(test, mockall::automock)]
pub trait Synthesizer {
    /// Vocalizes `text`
    fn speak(&self, text: &str);
}

/// Platform capability provider, queried by name
///
/// Each method returns `None` when the platform has nothing under `name`.
#[cfg_attr(test, mockall::automock)]
pub trait SpeechCapabilities {
    /// Looks up a recognizer constructor
    fn recognizer(&self, name: &str) -> Option<Box<dyn Recognizer>>;
    /// Looks up a grammar-builder constructor
    fn grammar_builder(&self, name: &str) -> Option<Box<dyn GrammarBuilder>>;
    /// Looks up a speech synthesizer
    fn synthesizer(&self, name: &str) -> Option<Rc<dyn Synthesizer>>;
}

/// Ordered lookup names for each capability, standard name first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityLookup {
    /// Names tried for the recognizer
    pub recognizer: Vec<String>,
    /// Names tried for the grammar builder
    pub grammar: Vec<String>,
    /// Names tried for the synthesizer
    pub synthesizer: Vec<String>,
}

impl Default for CapabilityLookup {
    fn default() -> Self {
        Self {
            recognizer: vec![
                "SpeechRecognition".to_owned(),
                "webkitSpeechRecognition".to_owned(),
            ],
            grammar: vec![
                "SpeechGrammarList".to_owned(),
                "webkitSpeechGrammarList".to_owned(),
            ],
            synthesizer: vec!["speechSynthesis".to_owned()],
        }
    }
}

/// Tries each name in order and returns the first capability found
///
/// # Errors
/// Returns [`CommandError::CapabilityUnavailable`] when every name misses
pub fn resolve<T>(
    capability: &'static str,
    names: &[String],
    mut find: impl FnMut(&str) -> Option<T>,
) -> Result<T, CommandError> {
    for (index, name) in names.iter().enumerate() {
        if let Some(found) = find(name) {
            if index > 0 {
                warn!(capability, name = %name, "using fallback capability name");
            } else {
                debug!(capability, name = %name, "capability found");
            }
            return Ok(found);
        }
    }

    Err(CommandError::CapabilityUnavailable {
        capability,
        tried: names.to_vec(),
    })
}
