use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::error::CommandError;
use crate::speech::capability::{resolve, SpeechCapabilities, Synthesizer};

/// Speaks text through the platform synthesizer, acquired on first use
pub struct SpeechOutput {
    capabilities: Rc<dyn SpeechCapabilities>,
    names: Vec<String>,
    synthesizer: RefCell<Option<Rc<dyn Synthesizer>>>,
}

impl SpeechOutput {
    /// Creates an output that will look the synthesizer up under `names`
    #[must_use]
    pub fn new(capabilities: Rc<dyn SpeechCapabilities>, names: Vec<String>) -> Self {
        Self {
            capabilities,
            names,
            synthesizer: RefCell::new(None),
        }
    }

    /// Acquires the synthesizer (idempotent)
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if no synthesizer is found
    pub fn init(&self) -> Result<(), CommandError> {
        if self.synthesizer.borrow().is_some() {
            return Ok(());
        }

        let synthesizer = resolve("speech synthesis", &self.names, |name| {
            self.capabilities.synthesizer(name)
        })?;
        *self.synthesizer.borrow_mut() = Some(synthesizer);

        info!("speech output initialized");
        Ok(())
    }

    /// Whether a synthesizer has been acquired
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.synthesizer.borrow().is_some()
    }

    /// Speaks `text`, initializing first if needed
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if initialization fails
    pub fn speak_text(&self, text: &str) -> Result<(), CommandError> {
        self.init()?;

        let synthesizer = self.synthesizer.borrow().clone();
        if let Some(synthesizer) = synthesizer {
            debug!(text_len = text.len(), "speaking text");
            synthesizer.speak(text);
        }
        Ok(())
    }
}
