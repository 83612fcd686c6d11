use vp_core::config::Geometry;
use vp_core::records::Trajectory;

/// Closed-form inter-microphone travel-time difference for a straight pass.
///
/// The vehicle moves at constant speed `v` along a line parallel to the
/// microphone baseline, at distance `L`, passing the midpoint at `t0`. At
/// `t0 + Δt` its along-road position is `v·Δt` and the returned delay is
/// `(|p - m1| - |p - m2|) / c` with the mics at `∓D/2`.
///
/// # Example
/// ```
/// use vp_audio::delay::DelayModel;
/// use vp_core::config::Geometry;
///
/// let model = DelayModel::new(&Geometry::default());
/// assert_eq!(model.delay(0.0, 1.5), 0.0);
/// // Far away the delay approaches ±D/c.
/// assert!((model.delay(10.0, 100.0) - 0.5 / 340.0).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct DelayModel {
    half_separation: f64,
    road_distance_sq: f64,
    sound_speed: f64,
}

impl DelayModel {
    #[must_use]
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            half_separation: geometry.mic_separation / 2.0,
            road_distance_sq: geometry.road_distance * geometry.road_distance,
            sound_speed: geometry.sound_speed,
        }
    }

    /// Delay in seconds at `dt` seconds after the pass, for speed `v`.
    #[inline]
    #[must_use]
    pub fn delay(&self, v: f64, dt: f64) -> f64 {
        let x = v * dt;
        let d1 = ((x + self.half_separation).powi(2) + self.road_distance_sq).sqrt();
        let d2 = ((x - self.half_separation).powi(2) + self.road_distance_sq).sqrt();
        (d1 - d2) / self.sound_speed
    }

    /// Delay at absolute time `t` for a trajectory hypothesis.
    #[inline]
    #[must_use]
    pub fn delay_at(&self, trajectory: Trajectory, t: f64) -> f64 {
        self.delay(trajectory.v, t - trajectory.t0)
    }

    /// Delays at each offset from the pass time.
    #[must_use]
    pub fn delays(&self, v: f64, offsets: &[f64]) -> Vec<f64> {
        offsets.iter().map(|&dt| self.delay(v, dt)).collect()
    }

    /// Evaluate many hypotheses over the same absolute time grid.
    ///
    /// Row `h` holds the delays of `hypotheses[h]` at every entry of `times`.
    /// Each value is bit-identical to [`DelayModel::delay_at`].
    ///
    /// # Example
    /// ```
    /// use vp_audio::delay::DelayModel;
    /// use vp_core::config::Geometry;
    /// use vp_core::records::Trajectory;
    ///
    /// let model = DelayModel::new(&Geometry::default());
    /// let times = [9.5, 10.0, 10.5];
    /// let hyps = [Trajectory::new(10.0, 8.0), Trajectory::new(10.2, -12.0)];
    /// let rows = model.delays_batch(&times, &hyps);
    /// assert_eq!(rows.len(), 2);
    /// assert_eq!(rows[1][2], model.delay_at(hyps[1], 10.5));
    /// ```
    #[must_use]
    pub fn delays_batch(&self, times: &[f64], hypotheses: &[Trajectory]) -> Vec<Vec<f64>> {
        hypotheses
            .iter()
            .map(|&h| times.iter().map(|&t| self.delay_at(h, t)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(d: f64, l: f64) -> Geometry {
        Geometry {
            mic_separation: d,
            road_distance: l,
            sound_speed: 340.0,
        }
    }

    #[test]
    fn batch_agrees_with_scalar() {
        let model = DelayModel::new(&geometry(0.5, 2.0));
        let times: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.05).collect();
        let hyps = [
            Trajectory::new(3.0, 13.9),
            Trajectory::new(5.5, -8.2),
            Trajectory::new(0.0, 0.0),
            Trajectory::new(9.9, 27.0),
        ];
        let rows = model.delays_batch(&times, &hyps);
        for (h, row) in hyps.iter().zip(&rows) {
            assert_eq!(row.len(), times.len());
            for (&t, &batched) in times.iter().zip(row) {
                let scalar = model.delay(h.v, t - h.t0);
                assert!((scalar - batched).abs() <= f64::EPSILON * scalar.abs().max(1.0));
            }
        }
    }

    #[test]
    fn stationary_source_has_no_delay() {
        let model = DelayModel::new(&geometry(0.5, 2.0));
        for t0 in [0.0, 1.0, 37.5] {
            for t in [0.0, 2.0, 100.0] {
                assert_eq!(model.delay_at(Trajectory::new(t0, 0.0), t), 0.0);
            }
        }
    }

    #[test]
    fn coincident_mics_have_no_delay() {
        let model = DelayModel::new(&geometry(0.0, 2.0));
        for dt in [-3.0, -0.1, 0.0, 0.4, 2.0] {
            assert_eq!(model.delay(15.0, dt), 0.0);
        }
    }

    #[test]
    fn s_curve_is_odd_and_bounded() {
        let model = DelayModel::new(&geometry(0.5, 2.0));
        let bound = 0.5 / 340.0;
        for dt in [0.01, 0.1, 0.5, 1.0, 5.0] {
            let ahead = model.delay(10.0, dt);
            let behind = model.delay(10.0, -dt);
            assert!((ahead + behind).abs() < 1e-15);
            assert!(ahead > 0.0 && ahead < bound);
        }
        // Reversing direction mirrors the curve.
        assert!((model.delay(-10.0, 0.3) + model.delay(10.0, 0.3)).abs() < 1e-15);
        assert_eq!(model.delay(10.0, 0.0), 0.0);
    }
}
