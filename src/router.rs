use std::rc::Rc;

use tracing::{debug, info};

use crate::action::{Action, ErrorSink};
use crate::elements::{click_element, read_element, ElementCommand, ElementLookup, Trigger};
use crate::error::CommandError;
use crate::input::{KeyEventSource, KeyTriggerBackend};
use crate::speech::{
    CapabilityLookup, RecognitionParams, SpeechCapabilities, SpeechOutput, VoiceTriggerBackend,
};

/// Host capabilities injected into a [`CommandRouter`]
#[derive(Clone)]
pub struct Host {
    /// Source of key events
    pub keys: Rc<dyn KeyEventSource>,
    /// Speech recognition and synthesis
    pub speech: Rc<dyn SpeechCapabilities>,
    /// Element lookup for element commands
    pub elements: Rc<dyn ElementLookup>,
}

/// Settings applied to lazily constructed speech components
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Capability lookup names
    pub lookup: CapabilityLookup,
    /// Recognizer parameters
    pub recognition: RecognitionParams,
}

/// Routes key and phrase bindings to lazily created backends
///
/// Each backend is created on first use. A backend whose initialization
/// fails is not kept, so the next call tries again.
pub struct CommandRouter {
    host: Host,
    options: RouterOptions,
    key_backend: Option<KeyTriggerBackend>,
    voice_backend: Option<VoiceTriggerBackend>,
    speech_output: Option<Rc<SpeechOutput>>,
}

impl CommandRouter {
    /// Creates a router with no backends
    #[must_use]
    pub fn new(host: Host, options: RouterOptions) -> Self {
        Self {
            host,
            options,
            key_backend: None,
            voice_backend: None,
            speech_output: None,
        }
    }

    /// Runs `action` when `key` is pressed
    ///
    /// # Errors
    /// Returns [`CommandError::ReservationConflict`] if `key` is reserved
    pub fn bind_key_action(&mut self, key: &str, action: Action) -> Result<(), CommandError> {
        self.ensure_key_backend().bind(key, action)
    }

    /// Runs `action` when `key` is pressed; regular binds cannot replace it
    pub fn bind_reserved_key_action(&mut self, key: &str, action: Action) {
        self.ensure_key_backend().bind_reserved(key, action);
    }

    /// Runs `action` when `word` is recognized
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if the voice backend
    /// cannot initialize; the router keeps no voice backend in that case
    pub fn bind_voice_action(&mut self, word: &str, action: Action) -> Result<(), CommandError> {
        self.ensure_voice_backend()?.bind(word, action)
    }

    /// Sets the callback for unrecognized or unmatched speech
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if the voice backend
    /// cannot initialize
    pub fn set_voice_error_sink(&mut self, sink: ErrorSink) -> Result<(), CommandError> {
        self.ensure_voice_backend()?.set_error_sink(sink);
        Ok(())
    }

    /// Starts continuous recognition
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if the voice backend
    /// cannot initialize
    pub fn start_listening(&mut self) -> Result<(), CommandError> {
        self.ensure_voice_backend()?.start_listening()
    }

    /// Clicks the command's element when its trigger fires
    ///
    /// # Errors
    /// Propagates the binding error for the command's trigger
    pub fn set_click_on_element_command(
        &mut self,
        command: &ElementCommand,
    ) -> Result<(), CommandError> {
        let action = click_element(Rc::clone(&self.host.elements), &command.element_id);
        self.bind_trigger(&command.trigger, action)
    }

    /// Speaks the text of the command's element when its trigger fires
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if no synthesizer is
    /// available, or the binding error for the command's trigger
    pub fn set_read_on_element_command(
        &mut self,
        command: &ElementCommand,
    ) -> Result<(), CommandError> {
        let speech = self.ensure_speech_output()?;
        let action = read_element(Rc::clone(&self.host.elements), speech, &command.element_id);
        self.bind_trigger(&command.trigger, action)
    }

    /// Disposes both backends and the speech output
    ///
    /// Safe to call at any time; the router can be used again afterwards.
    pub fn dispose(&mut self) {
        if let Some(backend) = self.key_backend.take() {
            backend.dispose();
        }
        if let Some(backend) = self.voice_backend.take() {
            backend.dispose();
        }
        self.speech_output = None;
        info!("command router disposed");
    }

    /// The key backend, if one has been created
    #[must_use]
    pub const fn key_backend(&self) -> Option<&KeyTriggerBackend> {
        self.key_backend.as_ref()
    }

    /// The voice backend, if one has been created
    #[must_use]
    pub const fn voice_backend(&self) -> Option<&VoiceTriggerBackend> {
        self.voice_backend.as_ref()
    }

    /// Whether a key backend exists
    #[must_use]
    pub const fn has_key_backend(&self) -> bool {
        self.key_backend.is_some()
    }

    /// Whether a voice backend exists
    #[must_use]
    pub const fn has_voice_backend(&self) -> bool {
        self.voice_backend.is_some()
    }

    /// Whether the speech output has been created
    #[must_use]
    pub const fn has_speech_output(&self) -> bool {
        self.speech_output.is_some()
    }

    fn bind_trigger(&mut self, trigger: &Trigger, action: Action) -> Result<(), CommandError> {
        match trigger {
            Trigger::Key(key) => self.bind_key_action(key, action),
            Trigger::ReservedKey(key) => {
                self.bind_reserved_key_action(key, action);
                Ok(())
            }
            Trigger::Phrase(word) => self.bind_voice_action(word, action),
        }
    }

    fn ensure_key_backend(&mut self) -> &mut KeyTriggerBackend {
        let keys = &self.host.keys;
        self.key_backend.get_or_insert_with(|| {
            let mut backend = KeyTriggerBackend::new(Rc::clone(keys));
            backend.attach();
            debug!("key backend created");
            backend
        })
    }

    fn ensure_voice_backend(&mut self) -> Result<&mut VoiceTriggerBackend, CommandError> {
        let backend = match self.voice_backend.take() {
            Some(backend) => backend,
            None => {
                let mut backend = VoiceTriggerBackend::new(
                    Rc::clone(&self.host.speech),
                    self.options.lookup.clone(),
                    self.options.recognition.clone(),
                );
                backend.init()?;
                debug!("voice backend created");
                backend
            }
        };
        Ok(self.voice_backend.insert(backend))
    }

    fn ensure_speech_output(&mut self) -> Result<Rc<SpeechOutput>, CommandError> {
        if let Some(output) = &self.speech_output {
            return Ok(Rc::clone(output));
        }

        let output = Rc::new(SpeechOutput::new(
            Rc::clone(&self.host.speech),
            self.options.lookup.synthesizer.clone(),
        ));
        output.init()?;
        debug!("speech output created");
        self.speech_output = Some(Rc::clone(&output));
        Ok(output)
    }
}

impl Drop for CommandRouter {
    fn drop(&mut self) {
        if self.key_backend.is_some() || self.voice_backend.is_some() {
            self.dispose();
        }
    }
}
