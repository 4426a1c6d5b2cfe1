//! Collapses continuous wheel/touch/pointer movement into discrete step intents.

use tracing::trace;
use winit::event::MouseScrollDelta;
use winit::keyboard::KeyCode;

use crate::config::GestureConfig;
use crate::events::{StepIntent, ViewerCommand};

/// Raw vertical input, already converted to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSample {
    /// Wheel movement; positive means "scroll down" (content moves up).
    Wheel { delta_y: f32 },
    /// Touch or primary-button press at window y.
    DragStart { y: f32 },
    /// Pointer or finger moved while pressed.
    DragMove { y: f32 },
    DragEnd,
}

#[derive(Debug)]
pub struct GestureRecognizer {
    cfg: GestureConfig,
    accumulated: f32,
    drag_last: Option<f32>,
}

impl GestureRecognizer {
    pub fn new(cfg: GestureConfig) -> Self {
        Self {
            cfg,
            accumulated: 0.0,
            drag_last: None,
        }
    }

    /// Feeds one sample. While `suppressed` (an animation is in flight) movement is
    /// discarded rather than buffered, so nothing fires once the animation ends.
    pub fn feed(&mut self, sample: InputSample, suppressed: bool) -> Option<StepIntent> {
        let dy = match sample {
            InputSample::Wheel { delta_y } => delta_y * self.cfg.wheel_speed,
            InputSample::DragStart { y } => {
                self.drag_last = Some(y);
                self.accumulated = 0.0;
                return None;
            }
            InputSample::DragMove { y } => {
                let Some(last) = self.drag_last else {
                    return None;
                };
                self.drag_last = Some(y);
                y - last
            }
            InputSample::DragEnd => {
                self.drag_last = None;
                self.accumulated = 0.0;
                return None;
            }
        };

        if suppressed {
            self.accumulated = 0.0;
            return None;
        }

        if dy != 0.0 && self.accumulated != 0.0 && dy.signum() != self.accumulated.signum() {
            self.accumulated = 0.0;
        }
        self.accumulated += dy;

        if self.accumulated.abs() < self.cfg.tolerance {
            return None;
        }
        // Upward movement advances, downward movement goes back.
        let intent = if self.accumulated < 0.0 {
            StepIntent::Forward
        } else {
            StepIntent::Backward
        };
        trace!(accumulated = self.accumulated, ?intent, "gesture recognized");
        self.accumulated = 0.0;
        Some(intent)
    }
}

/// Converts a winit wheel delta to DOM-style pixels (positive scrolls down).
pub fn wheel_delta_px(delta: MouseScrollDelta, line_px: f32) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * line_px,
        MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
    }
}

/// Keyboard shortcuts: digits jump to a section, arrows and paging keys step.
pub fn key_command(key: KeyCode) -> Option<ViewerCommand> {
    let digit = match key {
        KeyCode::Digit1 => 1,
        KeyCode::Digit2 => 2,
        KeyCode::Digit3 => 3,
        KeyCode::Digit4 => 4,
        KeyCode::Digit5 => 5,
        KeyCode::Digit6 => 6,
        KeyCode::Digit7 => 7,
        KeyCode::Digit8 => 8,
        KeyCode::Digit9 => 9,
        KeyCode::ArrowDown | KeyCode::PageDown | KeyCode::Space => {
            return Some(ViewerCommand::Step(StepIntent::Forward));
        }
        KeyCode::ArrowUp | KeyCode::PageUp => {
            return Some(ViewerCommand::Step(StepIntent::Backward));
        }
        _ => return None,
    };
    Some(ViewerCommand::GoToSection(digit - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> GestureRecognizer {
        GestureRecognizer::new(GestureConfig::default())
    }

    #[test]
    fn wheel_down_steps_forward() {
        let mut g = recognizer();
        assert_eq!(
            g.feed(InputSample::Wheel { delta_y: 100.0 }, false),
            Some(StepIntent::Forward)
        );
        assert_eq!(
            g.feed(InputSample::Wheel { delta_y: -100.0 }, false),
            Some(StepIntent::Backward)
        );
    }

    #[test]
    fn small_movements_accumulate_to_threshold() {
        let mut g = recognizer();
        for _ in 0..3 {
            assert_eq!(g.feed(InputSample::Wheel { delta_y: 3.0 }, false), None);
        }
        assert_eq!(
            g.feed(InputSample::Wheel { delta_y: 3.0 }, false),
            Some(StepIntent::Forward)
        );
    }

    #[test]
    fn direction_change_discards_partial_motion() {
        let mut g = recognizer();
        assert_eq!(g.feed(InputSample::Wheel { delta_y: 8.0 }, false), None);
        assert_eq!(g.feed(InputSample::Wheel { delta_y: -8.0 }, false), None);
        assert_eq!(g.feed(InputSample::Wheel { delta_y: -1.0 }, false), None);
        assert_eq!(
            g.feed(InputSample::Wheel { delta_y: -2.0 }, false),
            Some(StepIntent::Backward)
        );
    }

    #[test]
    fn dragging_up_steps_forward() {
        let mut g = recognizer();
        assert_eq!(g.feed(InputSample::DragStart { y: 300.0 }, false), None);
        assert_eq!(g.feed(InputSample::DragMove { y: 295.0 }, false), None);
        assert_eq!(
            g.feed(InputSample::DragMove { y: 280.0 }, false),
            Some(StepIntent::Forward)
        );
        assert_eq!(
            g.feed(InputSample::DragMove { y: 320.0 }, false),
            Some(StepIntent::Backward)
        );
    }

    #[test]
    fn moves_without_press_are_ignored() {
        let mut g = recognizer();
        assert_eq!(g.feed(InputSample::DragMove { y: 10.0 }, false), None);
        assert_eq!(g.feed(InputSample::DragMove { y: 500.0 }, false), None);
        g.feed(InputSample::DragStart { y: 0.0 }, false);
        g.feed(InputSample::DragEnd, false);
        assert_eq!(g.feed(InputSample::DragMove { y: 500.0 }, false), None);
    }

    #[test]
    fn suppressed_input_is_dropped_not_queued() {
        let mut g = recognizer();
        assert_eq!(g.feed(InputSample::Wheel { delta_y: 500.0 }, true), None);
        assert_eq!(g.feed(InputSample::Wheel { delta_y: 4.0 }, false), None);
    }

    #[test]
    fn wheel_lines_scale_to_pixels() {
        let down = wheel_delta_px(MouseScrollDelta::LineDelta(0.0, -1.0), 100.0);
        assert_eq!(down, 100.0);
        let up = wheel_delta_px(
            MouseScrollDelta::PixelDelta(winit::dpi::PhysicalPosition::new(0.0, 40.0)),
            100.0,
        );
        assert_eq!(up, -40.0);
    }

    #[test]
    fn digit_keys_jump_to_sections() {
        assert!(matches!(
            key_command(KeyCode::Digit1),
            Some(ViewerCommand::GoToSection(0))
        ));
        assert!(matches!(
            key_command(KeyCode::Digit3),
            Some(ViewerCommand::GoToSection(2))
        ));
        assert!(matches!(
            key_command(KeyCode::PageUp),
            Some(ViewerCommand::Step(StepIntent::Backward))
        ));
        assert!(key_command(KeyCode::KeyQ).is_none());
    }
}
