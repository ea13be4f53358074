mod keyboard;

pub use self::keyboard::{KeyAction, KeyMap, KeyboardHandler};
