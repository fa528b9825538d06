use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::action::{Action, ActionResult, ErrorSink};
use crate::error::CommandError;
use crate::speech::capability::{
    resolve, CapabilityLookup, GrammarBuilder, RecognitionEvent, RecognitionParams, Recognizer,
    ResultHandler, SpeechCapabilities,
};
use crate::state::BackendState;

/// Weight given to the generated grammar
const GRAMMAR_WEIGHT: f32 = 1.0;

/// Builds the JSGF grammar that restricts recognition to `words`
#[must_use]
pub fn build_grammar(words: &[String]) -> String {
    format!(
        "#JSGF V1.0; grammar words; public <word> = {} ;",
        words.join(" | ")
    )
}

/// Phrase bindings shared with the recognizer's result handler
#[derive(Default)]
struct PhraseBindings {
    /// Bound phrases in first-bind order
    words: Vec<String>,
    actions: HashMap<String, Action>,
    error_sink: Option<ErrorSink>,
}

struct Engine {
    recognizer: Box<dyn Recognizer>,
    grammar_builder: Box<dyn GrammarBuilder>,
}

/// Binds spoken phrases to actions through a platform recognizer
pub struct VoiceTriggerBackend {
    capabilities: Rc<dyn SpeechCapabilities>,
    lookup: CapabilityLookup,
    params: RecognitionParams,
    bindings: Rc<RefCell<PhraseBindings>>,
    engine: Option<Engine>,
    grammar: String,
    listening: bool,
}

impl VoiceTriggerBackend {
    /// Creates an uninitialized backend; no capability is touched yet
    #[must_use]
    pub fn new(
        capabilities: Rc<dyn SpeechCapabilities>,
        lookup: CapabilityLookup,
        params: RecognitionParams,
    ) -> Self {
        Self {
            capabilities,
            lookup,
            params,
            bindings: Rc::new(RefCell::new(PhraseBindings::default())),
            engine: None,
            grammar: String::new(),
            listening: false,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> BackendState {
        if self.engine.is_some() {
            BackendState::Active
        } else {
            BackendState::Uninitialized
        }
    }

    /// Acquires the grammar builder and recognizer (idempotent)
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if either capability is
    /// missing under every lookup name. Nothing is retained on failure.
    pub fn init(&mut self) -> Result<(), CommandError> {
        if self.engine.is_some() {
            debug!("voice backend already initialized");
            return Ok(());
        }

        let capabilities = Rc::clone(&self.capabilities);
        let grammar_builder = resolve("speech grammar list", &self.lookup.grammar, |name| {
            capabilities.grammar_builder(name)
        })?;
        let mut recognizer = resolve("speech recognition", &self.lookup.recognizer, |name| {
            capabilities.recognizer(name)
        })?;

        recognizer.configure(&self.params);
        let bindings = Rc::clone(&self.bindings);
        let handler: ResultHandler =
            Rc::new(move |event: &RecognitionEvent| route_result(&bindings, event));
        recognizer.set_result_handler(handler);

        self.engine = Some(Engine {
            recognizer,
            grammar_builder,
        });

        info!(
            lang = %self.params.lang,
            max_alternatives = self.params.max_alternatives,
            "voice backend initialized"
        );
        Ok(())
    }

    /// Binds `word` to `action` and regenerates the grammar
    ///
    /// Initializes the backend first if needed.
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if initialization
    /// fails; the binding is not recorded in that case.
    pub fn bind(&mut self, word: &str, action: Action) -> Result<(), CommandError> {
        self.init()?;

        {
            let mut bindings = self.bindings.borrow_mut();
            if bindings.actions.insert(word.to_owned(), action).is_none() {
                bindings.words.push(word.to_owned());
            }
            self.grammar = build_grammar(&bindings.words);
        }

        if let Some(engine) = self.engine.as_mut() {
            engine
                .grammar_builder
                .add_from_string(&self.grammar, GRAMMAR_WEIGHT);
        }

        debug!(word = %word, grammar = %self.grammar, "phrase bound");
        Ok(())
    }

    /// Registers the callback for recognition events that match no phrase
    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.bindings.borrow_mut().error_sink = Some(sink);
    }

    /// Starts continuous recognition, initializing first if needed
    ///
    /// # Errors
    /// Returns [`CommandError::CapabilityUnavailable`] if initialization fails
    pub fn start_listening(&mut self) -> Result<(), CommandError> {
        self.init()?;

        if let Some(engine) = self.engine.as_mut() {
            engine.recognizer.start();
            self.listening = true;
            info!("voice recognition started");
        }
        Ok(())
    }

    /// Routes a recognition event as the recognizer's handler would
    ///
    /// # Errors
    /// Propagates the matched action's error
    pub fn handle_result(&self, event: &RecognitionEvent) -> ActionResult {
        route_result(&self.bindings, event)
    }

    /// Current grammar; empty until the first bind
    #[must_use]
    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    /// Bound phrases in first-bind order
    #[must_use]
    pub fn bound_words(&self) -> Vec<String> {
        self.bindings.borrow().words.clone()
    }

    /// Whether `word` currently has a binding
    #[must_use]
    pub fn is_bound(&self, word: &str) -> bool {
        self.bindings.borrow().actions.contains_key(word)
    }

    /// Whether recognition has been started
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Stops recognition and clears all bindings
    pub fn dispose(mut self) {
        self.stop_listening();

        let mut bindings = self.bindings.borrow_mut();
        bindings.words.clear();
        bindings.actions.clear();
        bindings.error_sink = None;
        drop(bindings);

        info!("voice backend disposed");
    }

    fn stop_listening(&mut self) {
        if !self.listening {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.recognizer.stop();
            info!("voice recognition stopped");
        }
        self.listening = false;
    }
}

impl Drop for VoiceTriggerBackend {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

fn route_result(bindings: &RefCell<PhraseBindings>, event: &RecognitionEvent) -> ActionResult {
    let transcript = event.top_transcript();

    // Clone out before running so actions can rebind phrases
    let (action, error_sink) = {
        let bindings = bindings.borrow();
        (
            transcript.and_then(|word| bindings.actions.get(word).cloned()),
            bindings.error_sink.clone(),
        )
    };

    if let Some(action) = action {
        debug!(transcript = ?transcript, "dispatching phrase action");
        return action();
    }

    match transcript {
        Some(word) => warn!(transcript = %word, "no binding for recognized phrase"),
        None => warn!(results = event.results.len(), "recognition produced no match"),
    }

    if let Some(sink) = error_sink {
        sink();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{action, error_sink};
    use crate::error::ActionError;
    use crate::host::LoopbackSpeech;
    use crate::speech::capability::{MockGrammarBuilder, MockRecognizer, MockSpeechCapabilities};
    use std::cell::Cell;

    fn backend_with(speech: &Rc<LoopbackSpeech>) -> VoiceTriggerBackend {
        VoiceTriggerBackend::new(
            speech.clone(),
            CapabilityLookup::default(),
            RecognitionParams::default(),
        )
    }

    fn set_counter(counter: &Rc<Cell<u32>>, value: u32) -> Action {
        let counter = Rc::clone(counter);
        action(move || {
            counter.set(value);
            Ok(())
        })
    }

    #[test]
    fn test_build_grammar_single_word() {
        assert_eq!(
            build_grammar(&["test".to_owned()]),
            "#JSGF V1.0; grammar words; public <word> = test ;"
        );
    }

    #[test]
    fn test_init_acquires_capabilities() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        assert_eq!(backend.state(), BackendState::Uninitialized);

        backend.init().unwrap();
        assert_eq!(backend.state(), BackendState::Active);
        assert_eq!(speech.params(), Some(RecognitionParams::default()));
        assert!(speech.has_result_handler());
    }

    #[test]
    fn test_init_fails_without_capabilities() {
        let speech = Rc::new(LoopbackSpeech::without_capabilities());
        let mut backend = backend_with(&speech);

        let result = backend.init();
        assert!(matches!(
            result,
            Err(CommandError::CapabilityUnavailable { .. })
        ));
        assert_eq!(backend.state(), BackendState::Uninitialized);
    }

    #[test]
    fn test_init_falls_back_to_vendor_names() {
        let speech = Rc::new(LoopbackSpeech::new());
        speech.set_recognizer_name(Some("webkitSpeechRecognition"));
        speech.set_grammar_name(Some("webkitSpeechGrammarList"));
        let mut backend = backend_with(&speech);

        backend.init().unwrap();
        assert_eq!(backend.state(), BackendState::Active);
        assert_eq!(
            speech.lookups(),
            vec![
                "SpeechGrammarList".to_owned(),
                "webkitSpeechGrammarList".to_owned(),
                "SpeechRecognition".to_owned(),
                "webkitSpeechRecognition".to_owned(),
            ]
        );
    }

    #[test]
    fn test_init_missing_recognizer_retains_nothing() {
        let mut capabilities = MockSpeechCapabilities::new();
        capabilities
            .expect_grammar_builder()
            .times(1)
            .returning(|_| Some(Box::new(MockGrammarBuilder::new()) as Box<dyn GrammarBuilder>));
        capabilities
            .expect_recognizer()
            .times(2)
            .returning(|_| None);

        let mut backend = VoiceTriggerBackend::new(
            Rc::new(capabilities),
            CapabilityLookup::default(),
            RecognitionParams::default(),
        );

        let result = backend.init();
        match result {
            Err(CommandError::CapabilityUnavailable { capability, tried }) => {
                assert_eq!(capability, "speech recognition");
                assert_eq!(tried.len(), 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(backend.state(), BackendState::Uninitialized);
    }

    #[test]
    fn test_init_twice_is_idempotent() {
        let mut capabilities = MockSpeechCapabilities::new();
        capabilities
            .expect_grammar_builder()
            .times(1)
            .returning(|_| Some(Box::new(MockGrammarBuilder::new()) as Box<dyn GrammarBuilder>));
        capabilities.expect_recognizer().times(1).returning(|_| {
            let mut recognizer = MockRecognizer::new();
            recognizer.expect_configure().times(1).return_const(());
            recognizer.expect_set_result_handler().times(1).return_const(());
            Some(Box::new(recognizer) as Box<dyn Recognizer>)
        });

        let mut backend = VoiceTriggerBackend::new(
            Rc::new(capabilities),
            CapabilityLookup::default(),
            RecognitionParams::default(),
        );
        backend.init().unwrap();
        backend.init().unwrap();
        assert_eq!(backend.state(), BackendState::Active);
    }

    #[test]
    fn test_bind_initializes_lazily_once() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);

        backend.bind("yes", action(|| Ok(()))).unwrap();
        backend.bind("no", action(|| Ok(()))).unwrap();

        assert_eq!(backend.state(), BackendState::Active);
        assert_eq!(speech.lookups().len(), 2);
        assert!(backend.is_bound("yes"));
    }

    #[test]
    fn test_grammar_follows_bind_order() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);

        backend.bind("yes", action(|| Ok(()))).unwrap();
        backend.bind("no", action(|| Ok(()))).unwrap();

        let expected = "#JSGF V1.0; grammar words; public <word> = yes | no ;";
        assert_eq!(backend.grammar(), expected);
        assert_eq!(
            speech.grammars(),
            vec![
                (
                    "#JSGF V1.0; grammar words; public <word> = yes ;".to_owned(),
                    1.0
                ),
                (expected.to_owned(), 1.0),
            ]
        );
    }

    #[test]
    fn test_rebind_keeps_word_position() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);

        backend.bind("yes", action(|| Ok(()))).unwrap();
        backend.bind("no", action(|| Ok(()))).unwrap();
        backend.bind("yes", action(|| Ok(()))).unwrap();

        assert_eq!(backend.bound_words(), vec!["yes".to_owned(), "no".to_owned()]);
        assert_eq!(
            backend.grammar(),
            "#JSGF V1.0; grammar words; public <word> = yes | no ;"
        );
        assert_eq!(speech.grammars().len(), 3);
    }

    #[test]
    fn test_bind_fails_without_capabilities() {
        let speech = Rc::new(LoopbackSpeech::without_capabilities());
        let mut backend = backend_with(&speech);

        let result = backend.bind("test", action(|| Ok(())));
        assert!(matches!(
            result,
            Err(CommandError::CapabilityUnavailable { .. })
        ));
        assert!(!backend.is_bound("test"));
        assert_eq!(backend.grammar(), "");
    }

    #[test]
    fn test_bind_succeeds_once_capability_appears() {
        let speech = Rc::new(LoopbackSpeech::without_capabilities());
        let mut backend = backend_with(&speech);
        assert!(backend.bind("test", action(|| Ok(()))).is_err());

        speech.set_recognizer_name(Some("SpeechRecognition"));
        speech.set_grammar_name(Some("SpeechGrammarList"));

        backend.bind("test", action(|| Ok(()))).unwrap();
        assert_eq!(backend.state(), BackendState::Active);
        assert!(backend.is_bound("test"));
    }

    #[test]
    fn test_mapped_phrase_invokes_action() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        let counter = Rc::new(Cell::new(0));
        backend.bind("test", set_counter(&counter, 1)).unwrap();

        speech.say("test").unwrap();
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn test_unmapped_phrase_invokes_error_sink() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        let counter = Rc::new(Cell::new(0));
        let sink_counter = Rc::clone(&counter);
        backend.set_error_sink(error_sink(move || sink_counter.set(1)));
        backend.bind("test", set_counter(&counter, 2)).unwrap();

        speech.say("notMappedWord").unwrap();
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn test_empty_results_invoke_error_sink_once() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        let sink_calls = Rc::new(Cell::new(0));
        let action_calls = Rc::new(Cell::new(0));
        let calls = Rc::clone(&sink_calls);
        backend.set_error_sink(error_sink(move || calls.set(calls.get() + 1)));
        backend.bind("test", set_counter(&action_calls, 1)).unwrap();

        speech.deliver(&RecognitionEvent::empty()).unwrap();
        assert_eq!(sink_calls.get(), 1);
        assert_eq!(action_calls.get(), 0);
    }

    #[test]
    fn test_failing_action_propagates_and_skips_error_sink() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        let sink_calls = Rc::new(Cell::new(0));
        let calls = Rc::clone(&sink_calls);
        backend.set_error_sink(error_sink(move || calls.set(calls.get() + 1)));
        backend
            .bind(
                "go",
                action(|| {
                    Err(ActionError::ElementNotFound {
                        id: "x".to_owned(),
                    })
                }),
            )
            .unwrap();

        let err = speech.say("go").unwrap_err();
        assert!(matches!(err, ActionError::ElementNotFound { ref id } if id == "x"));
        assert_eq!(sink_calls.get(), 0);
    }

    #[test]
    fn test_mismatch_without_sink_is_dropped() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        backend.bind("test", action(|| Ok(()))).unwrap();

        assert!(speech.say("other").is_ok());
        assert!(backend.handle_result(&RecognitionEvent::empty()).is_ok());
    }

    #[test]
    fn test_matching_is_exact() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        let counter = Rc::new(Cell::new(0));
        backend.bind("test", set_counter(&counter, 1)).unwrap();

        speech.say("Test").unwrap();
        speech.say("test ").unwrap();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_start_listening_starts_recognizer() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);

        backend.start_listening().unwrap();
        assert!(backend.is_listening());
        assert!(speech.is_listening());
        assert_eq!(speech.start_count(), 1);
    }

    #[test]
    fn test_start_listening_fails_without_capabilities() {
        let speech = Rc::new(LoopbackSpeech::without_capabilities());
        let mut backend = backend_with(&speech);

        assert!(backend.start_listening().is_err());
        assert!(!backend.is_listening());
        assert_eq!(speech.start_count(), 0);
    }

    #[test]
    fn test_dispose_clears_bindings_and_stops() {
        let speech = Rc::new(LoopbackSpeech::new());
        let mut backend = backend_with(&speech);
        let counter = Rc::new(Cell::new(0));
        backend.bind("test", set_counter(&counter, 1)).unwrap();
        backend.start_listening().unwrap();

        backend.dispose();
        assert!(!speech.is_listening());
        assert!(!speech.has_result_handler());

        speech.say("test").unwrap();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_dispose_before_init() {
        let speech = Rc::new(LoopbackSpeech::new());
        let backend = backend_with(&speech);
        backend.dispose();
        assert!(speech.lookups().is_empty());
    }
}
