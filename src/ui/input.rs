/// Keyboard input collector.
///
/// The editor is driven by discrete key presses, so every Press/Repeat
/// event is kept in arrival order. Typing `f f f` quickly must add three
/// moves; nothing is debounced.
///
/// Release and resize events are dropped; the renderer notices size
/// changes on its own.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

pub struct InputState {
    /// Presses collected during the most recent drain_events() call.
    presses: Vec<KeyEvent>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            presses: Vec::with_capacity(8),
        }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame.
    pub fn drain_events(&mut self) {
        self.presses.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    self.presses.push(key);
                }
                _ => {}
            }
        }
    }

    /// Key presses of this frame, oldest first.
    pub fn presses(&self) -> &[KeyEvent] {
        &self.presses
    }

    /// Check if any event this frame is Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.presses.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(keys: &[(KeyCode, KeyModifiers)]) -> InputState {
        InputState {
            presses: keys.iter().map(|&(code, mods)| KeyEvent::new(code, mods)).collect(),
        }
    }

    #[test]
    fn presses_keep_arrival_order() {
        let kb = with(&[
            (KeyCode::Char('f'), KeyModifiers::NONE),
            (KeyCode::Char('a'), KeyModifiers::NONE),
            (KeyCode::Char('f'), KeyModifiers::NONE),
        ]);
        let codes: Vec<KeyCode> = kb.presses().iter().map(|k| k.code).collect();
        assert_eq!(codes, [KeyCode::Char('f'), KeyCode::Char('a'), KeyCode::Char('f')]);
    }

    #[test]
    fn ctrl_c_needs_the_modifier() {
        assert!(!with(&[(KeyCode::Char('c'), KeyModifiers::NONE)]).ctrl_c_pressed());
        assert!(with(&[(KeyCode::Char('c'), KeyModifiers::CONTROL)]).ctrl_c_pressed());
        assert!(with(&[(KeyCode::Char('C'), KeyModifiers::CONTROL)]).ctrl_c_pressed());
        assert!(!InputState::new().ctrl_c_pressed());
    }
}
