use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

/// Friendly names for the non-character keys the viewer binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Escape,
    Space,
    Left,
    Right,
    Up,
    Down,
}

/// Everything the viewer can be asked to do from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    MoveForward,
    MoveBackward,
    StrafeLeft,
    StrafeRight,
    OrbitLeft,
    OrbitRight,
    ToggleCameraLock,
    ToggleDayNight,
    ToggleAutoCycle,
    ToggleDepthView,
    Quit,
}

/// How a binding fires: every frame the key is held, or once per press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    Held,
    Pressed,
}

/// One row of the key map. Bindings are data, not control flow, so the
/// table can be inspected and tested without a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub key: KeyCode,
    pub trigger: Trigger,
    pub action: Action,
}

const fn held(ch: char, action: Action) -> Binding {
    Binding {
        key: KeyCode::Character(ch),
        trigger: Trigger::Held,
        action,
    }
}

const fn pressed(ch: char, action: Action) -> Binding {
    Binding {
        key: KeyCode::Character(ch),
        trigger: Trigger::Pressed,
        action,
    }
}

/// The fixed keyboard mapping of the showcase. Load-bearing constants.
pub fn default_bindings() -> Vec<Binding> {
    vec![
        held('W', Action::MoveForward),
        held('S', Action::MoveBackward),
        held('A', Action::StrafeLeft),
        held('D', Action::StrafeRight),
        held('Q', Action::OrbitLeft),
        held('E', Action::OrbitRight),
        pressed('L', Action::ToggleCameraLock),
        pressed('N', Action::ToggleDayNight),
        pressed('C', Action::ToggleAutoCycle),
        pressed('M', Action::ToggleDepthView),
        Binding {
            key: KeyCode::Named(NamedKey::Escape),
            trigger: Trigger::Pressed,
            action: Action::Quit,
        },
    ]
}

/// Pressed/released snapshot fed by the window event callbacks and read
/// once per frame by the orchestrator.
#[derive(Debug, Default)]
pub struct InputState {
    held: RwLock<HashSet<KeyCode>>,
    pressed_edges: RwLock<HashSet<KeyCode>>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key-down event. OS key repeat does not re-arm the press
    /// edge; only a release followed by a new press does.
    pub fn set_key_down(&self, key: KeyCode) {
        if self.held.write().insert(key) {
            self.pressed_edges.write().insert(key);
        }
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.held.write().remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.held.read().contains(&key)
    }

    /// Resolves the binding table against the current snapshot, consuming
    /// this frame's press edges. Held bindings fire every call while the
    /// key stays down; pressed bindings fire exactly once per press.
    pub fn resolve_actions(&self, bindings: &[Binding]) -> Vec<Action> {
        let held = self.held.read();
        let mut edges = self.pressed_edges.write();
        let actions = bindings
            .iter()
            .filter(|binding| match binding.trigger {
                Trigger::Held => held.contains(&binding.key),
                Trigger::Pressed => edges.contains(&binding.key),
            })
            .map(|binding| binding.action)
            .collect();
        edges.clear();
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_bindings_fire_every_frame() {
        let input = InputState::new();
        let bindings = default_bindings();
        input.set_key_down(KeyCode::Character('W'));
        assert_eq!(
            input.resolve_actions(&bindings),
            vec![Action::MoveForward]
        );
        assert_eq!(
            input.resolve_actions(&bindings),
            vec![Action::MoveForward]
        );
        input.set_key_up(KeyCode::Character('W'));
        assert!(input.resolve_actions(&bindings).is_empty());
    }

    #[test]
    fn pressed_bindings_fire_once_per_press() {
        let input = InputState::new();
        let bindings = default_bindings();
        input.set_key_down(KeyCode::Character('L'));
        assert_eq!(
            input.resolve_actions(&bindings),
            vec![Action::ToggleCameraLock]
        );
        // Key still held: no second toggle.
        assert!(input.resolve_actions(&bindings).is_empty());
        input.set_key_up(KeyCode::Character('L'));
        input.set_key_down(KeyCode::Character('L'));
        assert_eq!(
            input.resolve_actions(&bindings),
            vec![Action::ToggleCameraLock]
        );
    }

    #[test]
    fn key_repeat_does_not_rearm_the_press_edge() {
        let input = InputState::new();
        let bindings = default_bindings();
        input.set_key_down(KeyCode::Character('N'));
        input.set_key_down(KeyCode::Character('N'));
        assert_eq!(
            input.resolve_actions(&bindings),
            vec![Action::ToggleDayNight]
        );
        assert!(input.resolve_actions(&bindings).is_empty());
    }

    #[test]
    fn escape_maps_to_quit() {
        let input = InputState::new();
        let bindings = default_bindings();
        input.set_key_down(KeyCode::Named(NamedKey::Escape));
        assert_eq!(input.resolve_actions(&bindings), vec![Action::Quit]);
    }

    #[test]
    fn every_action_is_bound_exactly_once() {
        let bindings = default_bindings();
        let mut keys = HashSet::new();
        let mut actions = HashSet::new();
        for binding in &bindings {
            assert!(keys.insert(binding.key), "duplicate key {:?}", binding.key);
            assert!(
                actions.insert(binding.action),
                "duplicate action {:?}",
                binding.action
            );
        }
        assert_eq!(actions.len(), 11);
    }
}
