//! Input management system
//!
//! Window events are fed into [`InputManager`] outside the scheduler. Once per
//! frame, before any phase runs, [`InputManager::begin_frame`] produces an
//! immutable [`InputSnapshot`] that systems read through the frame context.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::foundation::math::Vec2;

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// B key
    B,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// G key
    G,
    /// H key
    H,
    /// I key
    I,
    /// J key
    J,
    /// K key
    K,
    /// L key
    L,
    /// M key
    M,
    /// N key
    N,
    /// O key
    O,
    /// P key
    P,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// U key
    U,
    /// V key
    V,
    /// W key
    W,
    /// X key
    X,
    /// Y key
    Y,
    /// Z key
    Z,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Tab key
    Tab,
    /// Left shift
    LeftShift,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

/// Logical actions bound to one or more keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Walk forward
    MoveForward,
    /// Walk backward
    MoveBack,
    /// Strafe left
    MoveLeft,
    /// Strafe right
    MoveRight,
    /// Jump
    Jump,
    /// Confirm or pick
    Select,
    /// Back out of the current choice
    Cancel,
    /// Switch between camera modes
    ToggleCamera,
    /// Leave the application
    Quit,
}

type Bindings = HashMap<Action, Vec<KeyCode>>;

fn default_bindings() -> Bindings {
    HashMap::from([
        (Action::MoveForward, vec![KeyCode::W, KeyCode::Up]),
        (Action::MoveBack, vec![KeyCode::S, KeyCode::Down]),
        (Action::MoveLeft, vec![KeyCode::A, KeyCode::Left]),
        (Action::MoveRight, vec![KeyCode::D, KeyCode::Right]),
        (Action::Jump, vec![KeyCode::Space]),
        (Action::Select, vec![KeyCode::Enter]),
        (Action::Cancel, vec![KeyCode::Escape]),
        (Action::ToggleCamera, vec![KeyCode::Tab]),
        (Action::Quit, vec![KeyCode::Q]),
    ])
}

/// Input manager
///
/// Keeps the live key and button state plus the edges seen since the last
/// frame, so a press and release inside one frame still registers once.
#[derive(Debug)]
pub struct InputManager {
    held_keys: HashSet<KeyCode>,
    pressed_keys: HashSet<KeyCode>,
    held_buttons: HashSet<MouseButton>,
    pressed_buttons: HashSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    bindings: Arc<Bindings>,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    /// Create an input manager with the default bindings
    pub fn new() -> Self {
        Self {
            held_keys: HashSet::new(),
            pressed_keys: HashSet::new(),
            held_buttons: HashSet::new(),
            pressed_buttons: HashSet::new(),
            mouse_position: Vec2::zeros(),
            mouse_delta: Vec2::zeros(),
            bindings: Arc::new(default_bindings()),
        }
    }

    /// Replace the keys bound to an action
    pub fn bind(&mut self, action: Action, keys: Vec<KeyCode>) {
        Arc::make_mut(&mut self.bindings).insert(action, keys);
    }

    /// Handle key input
    pub fn handle_key_input(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            if self.held_keys.insert(key) {
                self.pressed_keys.insert(key);
            }
        } else {
            self.held_keys.remove(&key);
        }
    }

    /// Handle mouse button input
    pub fn handle_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            if self.held_buttons.insert(button) {
                self.pressed_buttons.insert(button);
            }
        } else {
            self.held_buttons.remove(&button);
        }
    }

    /// Handle mouse movement to an absolute cursor position
    pub fn handle_mouse_move(&mut self, x: f64, y: f64) {
        let position = Vec2::new(x as f32, y as f32);
        self.mouse_delta += position - self.mouse_position;
        self.mouse_position = position;
    }

    /// Snapshot the state for this frame and start collecting the next one
    pub fn begin_frame(&mut self) -> InputSnapshot {
        InputSnapshot {
            held_keys: self.held_keys.clone(),
            pressed_keys: std::mem::take(&mut self.pressed_keys),
            held_buttons: self.held_buttons.clone(),
            pressed_buttons: std::mem::take(&mut self.pressed_buttons),
            mouse_position: self.mouse_position,
            mouse_delta: std::mem::replace(&mut self.mouse_delta, Vec2::zeros()),
            bindings: Arc::clone(&self.bindings),
        }
    }
}

/// Immutable input state of one frame
#[derive(Debug, Clone)]
pub struct InputSnapshot {
    held_keys: HashSet<KeyCode>,
    pressed_keys: HashSet<KeyCode>,
    held_buttons: HashSet<MouseButton>,
    pressed_buttons: HashSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    bindings: Arc<Bindings>,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        InputManager::new().begin_frame()
    }
}

impl InputSnapshot {
    fn keys(&self, action: Action) -> &[KeyCode] {
        self.bindings.get(&action).map_or(&[], Vec::as_slice)
    }

    /// Whether any key bound to the action is held
    pub fn pressed(&self, action: Action) -> bool {
        self.keys(action).iter().any(|key| self.held_keys.contains(key))
    }

    /// Whether any key bound to the action went down since the previous frame
    pub fn pressed_once(&self, action: Action) -> bool {
        self.keys(action).iter().any(|key| self.pressed_keys.contains(key))
    }

    /// Whether a key is held
    pub fn key_held(&self, key: KeyCode) -> bool {
        self.held_keys.contains(&key)
    }

    /// Whether a key went down since the previous frame
    pub fn key_pressed_once(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Whether a mouse button is held
    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.held_buttons.contains(&button)
    }

    /// Whether a mouse button went down since the previous frame
    pub fn mouse_clicked(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Cursor position in pixels
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Cursor movement since the previous frame
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Snapshot builder for scripted input
    pub fn with_key(mut self, key: KeyCode) -> Self {
        if self.held_keys.insert(key) {
            self.pressed_keys.insert(key);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pressed_once_only_on_first_frame() {
        let mut input = InputManager::new();
        input.handle_key_input(KeyCode::Space, true);

        let first = input.begin_frame();
        let second = input.begin_frame();

        assert!(first.pressed(Action::Jump) && first.pressed_once(Action::Jump));
        assert!(second.pressed(Action::Jump));
        assert!(!second.pressed_once(Action::Jump));
    }

    #[test]
    fn test_tap_within_frame_registers() {
        let mut input = InputManager::new();
        input.handle_key_input(KeyCode::Enter, true);
        input.handle_key_input(KeyCode::Enter, false);

        let snapshot = input.begin_frame();

        assert!(snapshot.pressed_once(Action::Select));
        assert!(!snapshot.pressed(Action::Select));
    }

    #[test]
    fn test_mouse_delta_accumulates_and_resets() {
        let mut input = InputManager::new();
        input.handle_mouse_move(10.0, 5.0);
        input.handle_mouse_move(15.0, 5.0);

        let first = input.begin_frame();
        let second = input.begin_frame();

        assert_relative_eq!(first.mouse_delta(), Vec2::new(15.0, 5.0));
        assert_relative_eq!(first.mouse_position(), Vec2::new(15.0, 5.0));
        assert_relative_eq!(second.mouse_delta(), Vec2::zeros());
    }

    #[test]
    fn test_rebinding() {
        let mut input = InputManager::new();
        input.bind(Action::Jump, vec![KeyCode::J]);
        input.handle_key_input(KeyCode::Space, true);

        let snapshot = input.begin_frame();

        assert!(!snapshot.pressed(Action::Jump));
        assert!(snapshot.key_held(KeyCode::Space));
    }

    #[test]
    fn test_mouse_buttons() {
        let mut input = InputManager::new();
        input.handle_mouse_button(MouseButton::Left, true);

        let snapshot = input.begin_frame();

        assert!(snapshot.mouse_pressed(MouseButton::Left));
        assert!(snapshot.mouse_clicked(MouseButton::Left));
        assert!(!snapshot.mouse_pressed(MouseButton::Right));
    }
}
