//! Zoom presets and wheel zoom
//!
//! Keyboard and toolbar zoom walk a fixed ladder of presets. Wheel zoom is
//! multiplicative and lands between presets; the next ladder step then picks
//! the nearest preset in the requested direction.

pub const DEFAULT_ZOOM_LEVELS: [f32; 24] = [
    0.0833, 0.125, 0.18, 0.25, 0.3333, 0.5, 0.6667, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0, 4.0, 6.0,
    8.0, 10.0, 12.0, 16.0, 20.0, 24.0, 32.0, 48.0, 64.0,
];

pub const DEFAULT_WHEEL_FACTOR: f32 = 1.1;

/// Direction of a zoom step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Sorted zoom presets plus the wheel multiplier
#[derive(Clone, Debug, PartialEq)]
pub struct ZoomLadder {
    levels: Vec<f32>,
    wheel_factor: f32,
}

impl Default for ZoomLadder {
    fn default() -> Self {
        Self {
            levels: DEFAULT_ZOOM_LEVELS.to_vec(),
            wheel_factor: DEFAULT_WHEEL_FACTOR,
        }
    }
}

impl ZoomLadder {
    /// Build a ladder from configured presets. Non-positive and non-finite
    /// entries are dropped; an empty result falls back to the defaults.
    pub fn new(levels: &[f32], wheel_factor: f32) -> Self {
        let mut levels: Vec<f32> = levels
            .iter()
            .copied()
            .filter(|z| z.is_finite() && *z > 0.0)
            .collect();
        levels.sort_by(f32::total_cmp);
        levels.dedup();
        if levels.is_empty() {
            levels = DEFAULT_ZOOM_LEVELS.to_vec();
        }

        let wheel_factor = if wheel_factor.is_finite() && wheel_factor > 1.0 {
            wheel_factor
        } else {
            DEFAULT_WHEEL_FACTOR
        };

        Self {
            levels,
            wheel_factor,
        }
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn min(&self) -> f32 {
        self.levels[0]
    }

    pub fn max(&self) -> f32 {
        self.levels[self.levels.len() - 1]
    }

    /// Keep a zoom factor inside the ladder's range
    pub fn clamp_factor(&self, factor: f32) -> f32 {
        factor.clamp(self.min(), self.max())
    }

    /// Smallest preset strictly greater than `current`, saturating at the top.
    pub fn step_in(&self, current: f32) -> f32 {
        self.levels
            .iter()
            .copied()
            .find(|&z| z > current + f32::EPSILON)
            .unwrap_or_else(|| self.max())
    }

    /// Largest preset strictly smaller than `current`, saturating at the bottom.
    pub fn step_out(&self, current: f32) -> f32 {
        self.levels
            .iter()
            .rev()
            .copied()
            .find(|&z| z < current - f32::EPSILON)
            .unwrap_or_else(|| self.min())
    }

    pub fn step(&self, current: f32, direction: ZoomDirection) -> f32 {
        match direction {
            ZoomDirection::In => self.step_in(current),
            ZoomDirection::Out => self.step_out(current),
        }
    }

    /// One wheel notch in `direction`, clamped to the ladder's range.
    pub fn wheel(&self, current: f32, direction: ZoomDirection) -> f32 {
        let next = match direction {
            ZoomDirection::In => current * self.wheel_factor,
            ZoomDirection::Out => current / self.wheel_factor,
        };
        self.clamp_factor(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_to_neighbouring_presets() {
        let ladder = ZoomLadder::default();
        assert_eq!(ladder.step_in(1.0), 1.25);
        assert_eq!(ladder.step_out(1.0), 0.75);
        // Off-ladder values snap to the next preset in the requested direction.
        assert_eq!(ladder.step_in(1.1), 1.25);
        assert_eq!(ladder.step_out(1.1), 1.0);
    }

    #[test]
    fn saturates_at_the_ends() {
        let ladder = ZoomLadder::default();
        assert_eq!(ladder.step_in(64.0), 64.0);
        assert_eq!(ladder.step_in(100.0), 64.0);
        assert_eq!(ladder.step_out(0.0833), 0.0833);
        assert_eq!(ladder.step_out(0.01), 0.0833);
    }

    #[test]
    fn wheel_is_multiplicative_and_clamped() {
        let ladder = ZoomLadder::default();
        assert!((ladder.wheel(1.0, ZoomDirection::In) - 1.1).abs() < 1e-6);
        assert!((ladder.wheel(1.1, ZoomDirection::Out) - 1.0).abs() < 1e-6);
        assert_eq!(ladder.wheel(63.0, ZoomDirection::In), 64.0);
    }

    #[test]
    fn configured_levels_are_sanitized() {
        let ladder = ZoomLadder::new(&[2.0, -1.0, 0.5, f32::NAN, 2.0], 0.9);
        assert_eq!(ladder.levels(), &[0.5, 2.0]);
        assert_eq!(ladder.wheel(1.0, ZoomDirection::In), DEFAULT_WHEEL_FACTOR);

        let fallback = ZoomLadder::new(&[], 1.2);
        assert_eq!(fallback.levels().len(), DEFAULT_ZOOM_LEVELS.len());
    }
}
