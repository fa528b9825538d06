//! Loopback host
//!
//! In-process implementations of every host capability. The binary drives
//! them from stdin; tests drive them directly.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::info;

use crate::action::ActionResult;
use crate::elements::{Element, ElementLookup};
use crate::input::{KeyEvent, KeyEventBus};
use crate::router::Host;
use crate::speech::capability::{
    GrammarBuilder, RecognitionEvent, RecognitionParams, Recognizer, ResultHandler,
    SpeechCapabilities, Synthesizer,
};

/// Element with fixed text that counts its clicks
pub struct LoopbackElement {
    id: String,
    text: String,
    clicks: Cell<u32>,
}

impl LoopbackElement {
    /// Number of times the element was clicked
    #[must_use]
    pub fn clicks(&self) -> u32 {
        self.clicks.get()
    }
}

impl Element for LoopbackElement {
    fn click(&self) {
        self.clicks.set(self.clicks.get() + 1);
        info!(element = %self.id, "element clicked");
    }

    fn inner_text(&self) -> String {
        self.text.clone()
    }
}

/// Id-keyed element table
#[derive(Default)]
pub struct ElementTable {
    elements: RefCell<HashMap<String, Rc<LoopbackElement>>>,
}

impl ElementTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the element with `id`
    pub fn insert(&self, id: &str, text: &str) -> Rc<LoopbackElement> {
        let element = Rc::new(LoopbackElement {
            id: id.to_owned(),
            text: text.to_owned(),
            clicks: Cell::new(0),
        });
        self.elements
            .borrow_mut()
            .insert(id.to_owned(), Rc::clone(&element));
        element
    }

    /// Removes the element with `id`
    pub fn remove(&self, id: &str) {
        self.elements.borrow_mut().remove(id);
    }
}

impl ElementLookup for ElementTable {
    fn element_by_id(&self, id: &str) -> Option<Rc<dyn Element>> {
        self.elements
            .borrow()
            .get(id)
            .map(|element| Rc::clone(element) as Rc<dyn Element>)
    }
}

#[derive(Default)]
struct RecognizerSlot {
    handler: RefCell<Option<ResultHandler>>,
    params: RefCell<Option<RecognitionParams>>,
    listening: Cell<bool>,
    starts: Cell<u32>,
}

struct LoopbackRecognizer {
    slot: Rc<RecognizerSlot>,
}

impl Recognizer for LoopbackRecognizer {
    fn configure(&mut self, params: &RecognitionParams) {
        *self.slot.params.borrow_mut() = Some(params.clone());
    }

    fn set_result_handler(&mut self, handler: ResultHandler) {
        *self.slot.handler.borrow_mut() = Some(handler);
    }

    fn start(&mut self) {
        self.slot.listening.set(true);
        self.slot.starts.set(self.slot.starts.get() + 1);
    }

    fn stop(&mut self) {
        self.slot.listening.set(false);
    }
}

impl Drop for LoopbackRecognizer {
    fn drop(&mut self) {
        self.slot.handler.borrow_mut().take();
        self.slot.listening.set(false);
    }
}

struct LoopbackGrammar {
    grammars: Rc<RefCell<Vec<(String, f32)>>>,
}

impl GrammarBuilder for LoopbackGrammar {
    fn add_from_string(&mut self, grammar: &str, weight: f32) {
        self.grammars.borrow_mut().push((grammar.to_owned(), weight));
    }
}

/// Synthesizer that logs and records what it was asked to say
#[derive(Default)]
pub struct RecordingSynthesizer {
    spoken: RefCell<Vec<String>>,
}

impl Synthesizer for RecordingSynthesizer {
    fn speak(&self, text: &str) {
        info!(text = %text, "speaking");
        self.spoken.borrow_mut().push(text.to_owned());
    }
}

/// Speech capabilities answering to configurable names
///
/// Each capability is available under at most one name; `None` makes it
/// absent. Recognition events are injected with [`LoopbackSpeech::deliver`].
pub struct LoopbackSpeech {
    recognizer_name: RefCell<Option<String>>,
    grammar_name: RefCell<Option<String>>,
    synthesizer_name: RefCell<Option<String>>,
    slot: Rc<RecognizerSlot>,
    grammars: Rc<RefCell<Vec<(String, f32)>>>,
    synthesizer: Rc<RecordingSynthesizer>,
    lookups: RefCell<Vec<String>>,
}

impl Default for LoopbackSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackSpeech {
    /// Every capability available under its standard name
    #[must_use]
    pub fn new() -> Self {
        let speech = Self::without_capabilities();
        speech.set_recognizer_name(Some("SpeechRecognition"));
        speech.set_grammar_name(Some("SpeechGrammarList"));
        speech.set_synthesizer_name(Some("speechSynthesis"));
        speech
    }

    /// No capability available
    #[must_use]
    pub fn without_capabilities() -> Self {
        Self {
            recognizer_name: RefCell::new(None),
            grammar_name: RefCell::new(None),
            synthesizer_name: RefCell::new(None),
            slot: Rc::new(RecognizerSlot::default()),
            grammars: Rc::new(RefCell::new(Vec::new())),
            synthesizer: Rc::new(RecordingSynthesizer::default()),
            lookups: RefCell::new(Vec::new()),
        }
    }

    /// Name the recognizer answers to
    pub fn set_recognizer_name(&self, name: Option<&str>) {
        *self.recognizer_name.borrow_mut() = name.map(str::to_owned);
    }

    /// Name the grammar builder answers to
    pub fn set_grammar_name(&self, name: Option<&str>) {
        *self.grammar_name.borrow_mut() = name.map(str::to_owned);
    }

    /// Name the synthesizer answers to
    pub fn set_synthesizer_name(&self, name: Option<&str>) {
        *self.synthesizer_name.borrow_mut() = name.map(str::to_owned);
    }

    /// Delivers a recognition event to the installed handler, if any
    ///
    /// # Errors
    /// Propagates the matched action's error
    pub fn deliver(&self, event: &RecognitionEvent) -> ActionResult {
        let handler = self.slot.handler.borrow().clone();
        match handler {
            Some(handler) => handler(event),
            None => Ok(()),
        }
    }

    /// Delivers a single confident result for `phrase`
    ///
    /// # Errors
    /// Propagates the matched action's error
    pub fn say(&self, phrase: &str) -> ActionResult {
        self.deliver(&RecognitionEvent::phrase(phrase, 1.0))
    }

    /// Whether a result handler is installed
    #[must_use]
    pub fn has_result_handler(&self) -> bool {
        self.slot.handler.borrow().is_some()
    }

    /// Whether recognition is running
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.slot.listening.get()
    }

    /// Number of times recognition was started
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.slot.starts.get()
    }

    /// Parameters last applied to the recognizer
    #[must_use]
    pub fn params(&self) -> Option<RecognitionParams> {
        self.slot.params.borrow().clone()
    }

    /// Every grammar added, with its weight, oldest first
    #[must_use]
    pub fn grammars(&self) -> Vec<(String, f32)> {
        self.grammars.borrow().clone()
    }

    /// Every text spoken, oldest first
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.synthesizer.spoken.borrow().clone()
    }

    /// Every capability name looked up, in order
    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }

    fn answers(&self, configured: &RefCell<Option<String>>, name: &str) -> bool {
        self.lookups.borrow_mut().push(name.to_owned());
        configured.borrow().as_deref() == Some(name)
    }
}

impl SpeechCapabilities for LoopbackSpeech {
    fn recognizer(&self, name: &str) -> Option<Box<dyn Recognizer>> {
        self.answers(&self.recognizer_name, name).then(|| {
            Box::new(LoopbackRecognizer {
                slot: Rc::clone(&self.slot),
            }) as Box<dyn Recognizer>
        })
    }

    fn grammar_builder(&self, name: &str) -> Option<Box<dyn GrammarBuilder>> {
        self.answers(&self.grammar_name, name).then(|| {
            Box::new(LoopbackGrammar {
                grammars: Rc::clone(&self.grammars),
            }) as Box<dyn GrammarBuilder>
        })
    }

    fn synthesizer(&self, name: &str) -> Option<Rc<dyn Synthesizer>> {
        self.answers(&self.synthesizer_name, name)
            .then(|| Rc::clone(&self.synthesizer) as Rc<dyn Synthesizer>)
    }
}

/// Bundle of loopback capabilities sharing one session
#[derive(Clone)]
pub struct LoopbackHost {
    /// Key event source
    pub keys: Rc<KeyEventBus>,
    /// Speech capabilities
    pub speech: Rc<LoopbackSpeech>,
    /// Element table
    pub elements: Rc<ElementTable>,
}

impl Default for LoopbackHost {
    fn default() -> Self {
        Self::new(LoopbackSpeech::new())
    }
}

impl LoopbackHost {
    /// Creates a host around the given speech capabilities
    #[must_use]
    pub fn new(speech: LoopbackSpeech) -> Self {
        Self {
            keys: Rc::new(KeyEventBus::new()),
            speech: Rc::new(speech),
            elements: Rc::new(ElementTable::new()),
        }
    }

    /// Capability handles for a router
    #[must_use]
    pub fn host(&self) -> Host {
        Host {
            keys: self.keys.clone(),
            speech: self.speech.clone(),
            elements: self.elements.clone(),
        }
    }

    /// Delivers a key press
    ///
    /// # Errors
    /// Propagates the bound action's error
    pub fn press(&self, key: &str) -> ActionResult {
        self.keys.dispatch(&KeyEvent::new(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyEventSource;

    #[test]
    fn test_element_table_lookup() {
        let table = ElementTable::new();
        let element = table.insert("test", "Hello, world!");

        let found = table.element_by_id("test").unwrap();
        assert_eq!(found.inner_text(), "Hello, world!");
        found.click();
        assert_eq!(element.clicks(), 1);

        table.remove("test");
        assert!(table.element_by_id("test").is_none());
    }

    #[test]
    fn test_speech_answers_only_configured_name() {
        let speech = LoopbackSpeech::new();
        assert!(speech.recognizer("webkitSpeechRecognition").is_none());
        assert!(speech.recognizer("SpeechRecognition").is_some());

        speech.set_recognizer_name(None);
        assert!(speech.recognizer("SpeechRecognition").is_none());
        assert_eq!(speech.lookups().len(), 3);
    }

    #[test]
    fn test_dropping_recognizer_removes_handler() {
        let speech = LoopbackSpeech::new();
        let mut recognizer = speech.recognizer("SpeechRecognition").unwrap();
        recognizer.set_result_handler(Rc::new(|_: &RecognitionEvent| -> ActionResult { Ok(()) }));
        recognizer.start();
        assert!(speech.has_result_handler());
        assert!(speech.is_listening());

        drop(recognizer);
        assert!(!speech.has_result_handler());
        assert!(!speech.is_listening());
    }

    #[test]
    fn test_deliver_without_handler_is_noop() {
        let speech = LoopbackSpeech::new();
        assert!(speech.say("anything").is_ok());
    }

    #[test]
    fn test_synthesizer_records_text() {
        let speech = LoopbackSpeech::new();
        let synthesizer = speech.synthesizer("speechSynthesis").unwrap();
        synthesizer.speak("hello");
        assert_eq!(speech.spoken(), vec!["hello".to_owned()]);
    }

    #[test]
    fn test_host_press_reaches_subscribers() {
        let host = LoopbackHost::default();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        host.keys.subscribe(Rc::new(move |event: &KeyEvent| -> ActionResult {
            assert_eq!(event.key, "a");
            counter.set(counter.get() + 1);
            Ok(())
        }));

        host.press("a").unwrap();
        assert_eq!(hits.get(), 1);
    }
}
