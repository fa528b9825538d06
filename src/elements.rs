use std::rc::Rc;

use anyhow::anyhow;
use tracing::debug;

use crate::action::{action, Action};
use crate::error::ActionError;
use crate::speech::SpeechOutput;

/// A host UI element that commands act on
#[cfg_attr(test, mockall::automock)]
pub trait Element {
    /// Activates the element
    fn click(&self);
    /// Text content of the element
    fn inner_text(&self) -> String;
}

/// Host lookup of elements by id
#[cfg_attr(test, mockall::automock)]
pub trait ElementLookup {
    /// Finds the element with `id`, if present
    fn element_by_id(&self, id: &str) -> Option<Rc<dyn Element>>;
}

/// What fires an element command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A key name
    Key(String),
    /// A key name bound so that regular binds cannot replace it
    ReservedKey(String),
    /// A spoken phrase
    Phrase(String),
}

/// An element command: act on `element_id` when `trigger` fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementCommand {
    /// Target element id
    pub element_id: String,
    /// Trigger that runs the command
    pub trigger: Trigger,
}

impl ElementCommand {
    /// Command fired by a key press
    pub fn on_key(element_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            trigger: Trigger::Key(key.into()),
        }
    }

    /// Command fired by a reserved key binding
    pub fn on_reserved_key(element_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            trigger: Trigger::ReservedKey(key.into()),
        }
    }

    /// Command fired by a spoken phrase
    pub fn on_phrase(element_id: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            trigger: Trigger::Phrase(phrase.into()),
        }
    }
}

fn find(elements: &dyn ElementLookup, id: &str) -> Result<Rc<dyn Element>, ActionError> {
    elements
        .element_by_id(id)
        .ok_or_else(|| ActionError::ElementNotFound { id: id.to_owned() })
}

/// Action that clicks the element with `id`
///
/// The lookup happens when the action runs, not when it is built.
pub fn click_element(elements: Rc<dyn ElementLookup>, id: &str) -> Action {
    let id = id.to_owned();
    action(move || {
        let element = find(elements.as_ref(), &id)?;
        debug!(element = %id, "clicking element");
        element.click();
        Ok(())
    })
}

/// Action that speaks the text of the element with `id`
pub fn read_element(
    elements: Rc<dyn ElementLookup>,
    speech: Rc<SpeechOutput>,
    id: &str,
) -> Action {
    let id = id.to_owned();
    action(move || {
        let element = find(elements.as_ref(), &id)?;
        let text = element.inner_text();
        debug!(element = %id, text_len = text.len(), "reading element");
        speech
            .speak_text(&text)
            .map_err(|e| ActionError::Failed(anyhow!(e)))
    })
}
