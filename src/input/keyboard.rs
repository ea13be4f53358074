use std::collections::HashMap;

use device_query::{DeviceQuery, DeviceState, Keycode};
use tracing::{info, warn};

use crate::audio::AudioBackend;
use crate::error::SynthResult;
use crate::synth::control::VowelSynth;
use crate::synth::vowel::AMERICAN;

const F0_STEP: f32 = 1.059_463_1; // one semitone
const VOLUME_STEP: f32 = 0.05;
const JITTER_STEP: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    SelectVowel(usize),
    TogglePlay,
    CycleSource,
    F0Up,
    F0Down,
    VolumeUp,
    VolumeDown,
    JitterUp,
    JitterDown,
    Quit,
}

/// Key bindings plus press-edge detection, independent of the input device.
pub struct KeyMap {
    bindings: HashMap<Keycode, KeyAction>,
    key_states: HashMap<Keycode, bool>,
}

impl KeyMap {
    /// Actions for keys that went down since the previous call.
    pub fn pressed(&mut self, keys: &[Keycode]) -> Vec<KeyAction> {
        let mut actions = Vec::new();
        for (key, action) in &self.bindings {
            let is_pressed = keys.contains(key);
            let was_pressed = self.key_states.get(key).cloned().unwrap_or(false);
            if is_pressed && !was_pressed {
                actions.push(*action);
            }
            self.key_states.insert(*key, is_pressed);
        }
        actions
    }

    pub fn action_for(&self, key: Keycode) -> Option<KeyAction> {
        self.bindings.get(&key).copied()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        // Number row picks the American vowels in chart order, then minus.
        let vowel_keys = [
            Keycode::Key1,
            Keycode::Key2,
            Keycode::Key3,
            Keycode::Key4,
            Keycode::Key5,
            Keycode::Key6,
            Keycode::Key7,
            Keycode::Key8,
            Keycode::Key9,
            Keycode::Key0,
            Keycode::Minus,
        ];
        let mut bindings: HashMap<Keycode, KeyAction> = vowel_keys
            .iter()
            .take(AMERICAN.len())
            .enumerate()
            .map(|(i, key)| (*key, KeyAction::SelectVowel(i)))
            .collect();

        bindings.extend([
            (Keycode::Space, KeyAction::TogglePlay),
            (Keycode::Tab, KeyAction::CycleSource),
            (Keycode::Up, KeyAction::F0Up),
            (Keycode::Down, KeyAction::F0Down),
            (Keycode::Right, KeyAction::VolumeUp),
            (Keycode::Left, KeyAction::VolumeDown),
            (Keycode::K, KeyAction::JitterUp),
            (Keycode::J, KeyAction::JitterDown),
            (Keycode::Escape, KeyAction::Quit),
        ]);

        let key_states = bindings.keys().map(|key| (*key, false)).collect();
        Self {
            bindings,
            key_states,
        }
    }
}

/// Polls the physical keyboard and drives a synth from it.
pub struct KeyboardHandler {
    device_state: DeviceState,
    keymap: KeyMap,
    resumed: bool,
}

impl KeyboardHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles new key presses. Returns `false` once quit was requested.
    pub fn update<B: AudioBackend>(&mut self, synth: &mut VowelSynth<B>) -> bool {
        let keys: Vec<Keycode> = self.device_state.get_keys();
        for action in self.keymap.pressed(&keys) {
            if action == KeyAction::Quit {
                info!("quit requested");
                return false;
            }
            if let Err(err) = self.apply(synth, action) {
                warn!(?action, %err, "key action failed");
            }
        }
        true
    }

    fn apply<B: AudioBackend>(
        &mut self,
        synth: &mut VowelSynth<B>,
        action: KeyAction,
    ) -> SynthResult<()> {
        match action {
            KeyAction::SelectVowel(index) => {
                if let Some(vowel) = AMERICAN.get(index) {
                    info!(ipa = vowel.ipa, label = vowel.label, "vowel");
                    synth.apply_vowel(vowel)?;
                }
            }
            KeyAction::TogglePlay => {
                // The first press is the user gesture that unlocks output.
                if !self.resumed {
                    synth.resume()?;
                    self.resumed = true;
                }
                if synth.is_playing() {
                    synth.stop()?;
                } else {
                    synth.start()?;
                }
                info!(playing = synth.is_playing(), "playback toggled");
            }
            KeyAction::CycleSource => {
                let next = synth.source_type().next();
                synth.set_source_type(next)?;
            }
            KeyAction::F0Up => synth.set_f0(synth.f0() * F0_STEP)?,
            KeyAction::F0Down => synth.set_f0(synth.f0() / F0_STEP)?,
            KeyAction::VolumeUp => synth.set_volume(synth.volume() + VOLUME_STEP)?,
            KeyAction::VolumeDown => synth.set_volume(synth.volume() - VOLUME_STEP)?,
            KeyAction::JitterUp => synth.set_jitter(synth.params().jitter + JITTER_STEP)?,
            KeyAction::JitterDown => synth.set_jitter(synth.params().jitter - JITTER_STEP)?,
            KeyAction::Quit => {}
        }
        Ok(())
    }
}

impl Default for KeyboardHandler {
    fn default() -> Self {
        Self {
            device_state: DeviceState::new(),
            keymap: KeyMap::default(),
            resumed: false,
        }
    }
}
