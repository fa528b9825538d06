/// Platform speech capabilities and their lookup
pub mod capability;
/// Spoken-phrase triggers
pub mod recognition;
/// Text-to-speech output
pub mod synthesis;

pub use capability::{
    CapabilityLookup, GrammarBuilder, RecognitionAlternative, RecognitionEvent, RecognitionParams,
    RecognitionResult, Recognizer, ResultHandler, SpeechCapabilities, Synthesizer,
};
pub use recognition::{build_grammar, VoiceTriggerBackend};
pub use synthesis::SpeechOutput;
