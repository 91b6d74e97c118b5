//! Time-based interpolation shared by every multi-phase animation. Instead of chaining
//! completion callbacks, entities store a `Tween` per phase and poll it against the clock each
//! tick, which keeps every phase cancellable by simply dropping or replacing the value.

/// Easing curves, named after the ones the art direction was tuned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ease {
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    SineInOut,
}

impl Ease {
    /// Maps linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::QuadIn => t * t,
            Ease::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Ease::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) * 0.5
                }
            }
            Ease::SineInOut => -((std::f32::consts::PI * t).cos() - 1.0) * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub started: f32,
    pub duration: f32,
    pub ease: Ease,
}

impl Tween {
    pub fn new(started: f32, duration: f32, ease: Ease) -> Self {
        Self {
            started,
            duration,
            ease,
        }
    }

    /// Linear progress, clamped to `[0, 1]`. Zero-length tweens are complete immediately.
    pub fn raw(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started) / self.duration).clamp(0.0, 1.0)
    }

    pub fn progress(&self, now: f32) -> f32 {
        self.ease.apply(self.raw(now))
    }

    pub fn is_finished(&self, now: f32) -> bool {
        now - self.started >= self.duration
    }

    pub fn lerp(&self, from: f32, to: f32, now: f32) -> f32 {
        from + (to - from) * self.progress(now)
    }
}

/// Progress of a looping yoyo (0 → 1 → 0) with the given half-period, eased per half.
pub fn yoyo(elapsed: f32, half_period: f32, ease: Ease) -> f32 {
    if half_period <= 0.0 {
        return 0.0;
    }
    let cycle = (elapsed / half_period).max(0.0);
    let phase = cycle.fract();
    if (cycle as u32) % 2 == 0 {
        ease.apply(phase)
    } else {
        ease.apply(1.0 - phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_hit_their_endpoints() {
        for ease in [
            Ease::Linear,
            Ease::QuadIn,
            Ease::QuadOut,
            Ease::QuadInOut,
            Ease::SineInOut,
        ] {
            assert!(ease.apply(0.0).abs() < 1e-6, "{ease:?}");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-6, "{ease:?}");
        }
        assert!(Ease::QuadOut.apply(0.5) > 0.5);
        assert!(Ease::QuadIn.apply(0.5) < 0.5);
    }

    #[test]
    fn tween_clamps_outside_its_window() {
        let tween = Tween::new(2.0, 0.5, Ease::Linear);
        assert_eq!(tween.lerp(10.0, 20.0, 1.0), 10.0);
        assert_eq!(tween.lerp(10.0, 20.0, 2.25), 15.0);
        assert_eq!(tween.lerp(10.0, 20.0, 9.0), 20.0);
        assert!(!tween.is_finished(2.4));
        assert!(tween.is_finished(2.5));
    }

    #[test]
    fn yoyo_returns_to_rest() {
        assert!(yoyo(0.0, 1.0, Ease::Linear).abs() < 1e-6);
        assert!((yoyo(1.0, 1.0, Ease::Linear) - 1.0).abs() < 1e-6);
        assert!((yoyo(1.5, 1.0, Ease::Linear) - 0.5).abs() < 1e-6);
        assert!(yoyo(2.0, 1.0, Ease::Linear).abs() < 1e-6);
    }
}
