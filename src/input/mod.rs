/// Key-press triggers and the key event source
pub mod keyboard;

pub use keyboard::{
    KeyEvent, KeyEventBus, KeyEventSource, KeyHandler, KeyTriggerBackend, SubscriptionHandle,
};
