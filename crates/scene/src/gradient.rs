#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub pos: f32,
    pub color: [f32; 3],
}

/// Piecewise-linear RGB gradient. The activation overlay uses two stops:
/// hot at 0.0 for a fresh spike, cold at 1.0 for silence.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGradient {
    pub stops: Vec<ColorStop>,
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self {
            stops: vec![
                ColorStop {
                    pos: 0.0,
                    color: [1.0, 0.0, 0.0],
                },
                ColorStop {
                    pos: 1.0,
                    color: [0.5, 0.5, 0.8],
                },
            ],
        }
    }
}

impl ColorGradient {
    pub fn sample(&self, t: f32) -> [f32; 3] {
        if self.stops.is_empty() {
            return [1.0, 1.0, 1.0];
        }
        let t = t.clamp(0.0, 1.0);
        if self.stops.len() == 1 {
            return self.stops[0].color;
        }
        let mut prev = self.stops[0];
        for stop in &self.stops[1..] {
            if t <= stop.pos {
                let denom = (stop.pos - prev.pos).max(1.0e-6);
                let u = ((t - prev.pos) / denom).clamp(0.0, 1.0);
                return [
                    lerp(prev.color[0], stop.color[0], u),
                    lerp(prev.color[1], stop.color[1], u),
                    lerp(prev.color[2], stop.color[2], u),
                ];
            }
            prev = *stop;
        }
        prev.color
    }

    pub fn hot(&self) -> [f32; 3] {
        self.sample(0.0)
    }

    pub fn cold(&self) -> [f32; 3] {
        self.sample(1.0)
    }

    pub fn set_hot(&mut self, color: [f32; 3]) {
        if let Some(stop) = self.stops.first_mut() {
            stop.color = color;
        }
    }

    pub fn set_cold(&mut self, color: [f32; 3]) {
        if let Some(stop) = self.stops.last_mut() {
            stop.color = color;
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_return_stop_colors() {
        let gradient = ColorGradient::default();
        assert_eq!(gradient.sample(0.0), [1.0, 0.0, 0.0]);
        assert_eq!(gradient.sample(1.0), [0.5, 0.5, 0.8]);
    }

    #[test]
    fn midpoint_interpolates() {
        let gradient = ColorGradient {
            stops: vec![
                ColorStop {
                    pos: 0.0,
                    color: [0.0, 0.0, 0.0],
                },
                ColorStop {
                    pos: 1.0,
                    color: [1.0, 1.0, 1.0],
                },
            ],
        };
        assert_eq!(gradient.sample(0.5), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn out_of_range_clamps() {
        let gradient = ColorGradient::default();
        assert_eq!(gradient.sample(-3.0), gradient.sample(0.0));
        assert_eq!(gradient.sample(42.0), gradient.sample(1.0));
    }

    #[test]
    fn empty_and_single_stop_fallbacks() {
        let empty = ColorGradient { stops: Vec::new() };
        assert_eq!(empty.sample(0.3), [1.0, 1.0, 1.0]);

        let single = ColorGradient {
            stops: vec![ColorStop {
                pos: 0.5,
                color: [0.2, 0.4, 0.6],
            }],
        };
        assert_eq!(single.sample(0.0), [0.2, 0.4, 0.6]);
        assert_eq!(single.sample(1.0), [0.2, 0.4, 0.6]);
    }

    #[test]
    fn cold_stop_can_track_a_new_base() {
        let mut gradient = ColorGradient::default();
        gradient.set_cold([0.1, 0.2, 0.3]);
        assert_eq!(gradient.cold(), [0.1, 0.2, 0.3]);
        assert_eq!(gradient.hot(), [1.0, 0.0, 0.0]);
    }
}
