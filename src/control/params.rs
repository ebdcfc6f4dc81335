//! Spatializer parameter publishing
//!
//! Turns a channel's pose into named control parameters for the
//! spatializer. Pushes are throttled per channel and skipped when nothing
//! moved enough to be audible; forced pushes bypass both checks.
//!
//! Parameter naming on the spatializer:
//! - slot `s` drives speakers `spk{2s+1}` (left) and `spk{2s+2}` (right),
//!   each with `:Azimuth`, `:Elevation`, `:Radius` and `:Bypass`
//! - mixer channels `2s+1` and `2s+2` each have `mixL:Gain n` and `mixR:Gain n`

use std::time::{Duration, Instant};

use super::channel::{PublishedParams, SourceChannel};
use crate::config::PublisherConfig;

/// Destination of one-way parameter sets
pub trait ParamSink {
    fn set_param(&mut self, name: &str, value: f32);
}

impl<F: FnMut(&str, f32)> ParamSink for F {
    fn set_param(&mut self, name: &str, value: f32) {
        self(name, value)
    }
}

/// What a publish attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No spatializer bound to the channel
    Inactive,
    /// Spatializer known but its control handle is missing
    Unbound,
    /// Bypassed channels get no parameter traffic
    Bypassed,
    /// Too soon after the previous push
    Throttled,
    /// Nothing moved past the thresholds
    Unchanged,
    Sent { gain: bool },
}

/// Wrap an angle into [0, 360)
pub fn wrap360(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// The spatializer counts azimuth the other way round
pub fn mirror_azimuth(degrees: f32) -> f32 {
    wrap360(360.0 - degrees)
}

/// Left and right speaker azimuths (unmirrored) for a center and spread
pub fn stereo_azimuths(center: f32, width: f32) -> (f32, f32) {
    let half = width * 0.5;
    (wrap360(center - half), wrap360(center + half))
}

/// Near-to-far taper: 1.0 close to the listener, 0.1 at full radius
pub fn radius_to_gain(radius_pct: f32) -> f32 {
    let r = (radius_pct * 0.01).clamp(0.01, 1.0);
    (1.0 - 0.9 * r).clamp(0.1, 1.0)
}

/// Speaker target names of a slot (left, right)
pub fn speaker_names(slot: usize) -> [String; 2] {
    [format!("spk{}", slot * 2 + 1), format!("spk{}", slot * 2 + 2)]
}

/// Mixer gain parameter names of a slot
pub fn gain_params(slot: usize) -> Vec<String> {
    (slot * 2 + 1..=slot * 2 + 2)
        .flat_map(|channel| [format!("mixL:Gain {}", channel), format!("mixR:Gain {}", channel)])
        .collect()
}

/// Throttled, hysteresis-filtered parameter pushes
#[derive(Debug, Clone)]
pub struct ParameterPublisher {
    throttle: Duration,
    pose_epsilon: f32,
    gain_epsilon: f32,
    gain_hysteresis: f32,
}

impl ParameterPublisher {
    pub fn new(config: &PublisherConfig) -> Self {
        Self {
            throttle: config.throttle(),
            pose_epsilon: config.pose_epsilon,
            gain_epsilon: config.gain_epsilon,
            gain_hysteresis: config.gain_radius_hysteresis,
        }
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Push the channel's pose unless throttled or unchanged
    pub fn publish(
        &self,
        channel: &mut SourceChannel,
        force: bool,
        now: Instant,
        sink: Option<&mut dyn ParamSink>,
    ) -> PublishOutcome {
        if !channel.active {
            return PublishOutcome::Inactive;
        }
        let Some(sink) = sink else {
            return PublishOutcome::Unbound;
        };
        if channel.bypass {
            return PublishOutcome::Bypassed;
        }

        if force {
            channel.invalidate_publish();
        }

        if let Some(last_at) = channel.last_publish_at {
            if now.saturating_duration_since(last_at) < self.throttle {
                return PublishOutcome::Throttled;
            }
        }

        let params = PublishedParams {
            azimuth: channel.azimuth,
            elevation: channel.elevation,
            radius: channel.radius,
            width: channel.width,
            gain: radius_to_gain(channel.radius),
        };

        let gain_changed = match &channel.last_published {
            Some(last) => {
                if !last.differs(&params, self.pose_epsilon, self.gain_epsilon) {
                    return PublishOutcome::Unchanged;
                }
                (params.radius - last.radius).abs() > self.gain_hysteresis
            }
            None => true,
        };

        let (left, right) = stereo_azimuths(params.azimuth, params.width);
        let bypass = if channel.bypass { 1.0 } else { 0.0 };

        for (speaker, azimuth) in speaker_names(channel.slot).iter().zip([left, right]) {
            let azimuth = mirror_azimuth(azimuth);
            tracing::debug!(
                "{}: azimuth={:.1} elevation={:.1} radius={:.1}",
                speaker,
                azimuth,
                params.elevation,
                params.radius
            );

            sink.set_param(&format!("{}:Azimuth", speaker), azimuth);
            sink.set_param(&format!("{}:Elevation", speaker), params.elevation);
            sink.set_param(&format!("{}:Radius", speaker), params.radius);
            sink.set_param(&format!("{}:Bypass", speaker), bypass);
        }

        if gain_changed {
            for name in gain_params(channel.slot) {
                sink.set_param(&name, params.gain);
            }
        }

        channel.last_published = Some(params);
        channel.last_publish_at = Some(now);
        PublishOutcome::Sent { gain: gain_changed }
    }

    /// Force the slot's mixer gains to zero, outside throttling
    pub fn mute(&self, channel: &mut SourceChannel, sink: &mut dyn ParamSink) {
        tracing::debug!("Muting slot {}", channel.slot);
        for name in gain_params(channel.slot) {
            sink.set_param(&name, 0.0);
        }
        // the next push must restore the gains
        channel.invalidate_publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn publisher() -> ParameterPublisher {
        ParameterPublisher::new(&PublisherConfig::default())
    }

    fn active_channel(slot: usize) -> SourceChannel {
        let mut channel = SourceChannel::new(slot);
        channel.active = true;
        channel
    }

    #[derive(Default)]
    struct Recorder {
        sets: Vec<(String, f32)>,
    }

    impl ParamSink for Recorder {
        fn set_param(&mut self, name: &str, value: f32) {
            self.sets.push((name.to_string(), value));
        }
    }

    impl Recorder {
        fn value(&self, name: &str) -> Option<f32> {
            self.sets.iter().rev().find(|(n, _)| n == name).map(|(_, v)| *v)
        }
    }

    #[test]
    fn test_gain_endpoints() {
        assert!((radius_to_gain(0.0) - 1.0).abs() < 0.01);
        assert!((radius_to_gain(100.0) - 0.1).abs() < 1e-6);
        assert!((radius_to_gain(250.0) - 0.1).abs() < 1e-6);
        assert!((radius_to_gain(50.0) - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_mirror() {
        assert_eq!(mirror_azimuth(0.0), 0.0);
        assert_eq!(mirror_azimuth(90.0), 270.0);
        assert_eq!(mirror_azimuth(350.0), 10.0);
    }

    #[test]
    fn test_names() {
        assert_eq!(speaker_names(0), ["spk1".to_string(), "spk2".to_string()]);
        assert_eq!(speaker_names(3), ["spk7".to_string(), "spk8".to_string()]);
        assert_eq!(
            gain_params(1),
            vec!["mixL:Gain 3", "mixR:Gain 3", "mixL:Gain 4", "mixR:Gain 4"]
        );
    }

    #[test]
    fn test_first_publish_sends_everything() {
        let mut channel = active_channel(1);
        channel.azimuth = 10.0;
        channel.width = 30.0;
        channel.radius = 50.0;
        let mut sink = Recorder::default();

        let outcome = publisher().publish(&mut channel, false, Instant::now(), Some(&mut sink));
        assert_eq!(outcome, PublishOutcome::Sent { gain: true });
        assert_eq!(sink.sets.len(), 8 + 4);

        // left = 355 -> mirrored 5, right = 25 -> mirrored 335
        assert_eq!(sink.value("spk3:Azimuth"), Some(5.0));
        assert_eq!(sink.value("spk4:Azimuth"), Some(335.0));
        assert_eq!(sink.value("spk3:Bypass"), Some(0.0));
        assert_eq!(sink.value("mixR:Gain 4"), Some(radius_to_gain(50.0)));
    }

    #[test]
    fn test_throttle_and_force() {
        let publisher = publisher();
        let mut channel = active_channel(0);
        let mut sink = Recorder::default();
        let start = Instant::now();

        publisher.publish(&mut channel, false, start, Some(&mut sink));
        channel.azimuth = 45.0;

        let soon = start + Duration::from_millis(10);
        assert_eq!(
            publisher.publish(&mut channel, false, soon, Some(&mut sink)),
            PublishOutcome::Throttled
        );
        assert!(matches!(
            publisher.publish(&mut channel, true, soon, Some(&mut sink)),
            PublishOutcome::Sent { gain: true }
        ));

        let later = soon + Duration::from_millis(40);
        assert_eq!(
            publisher.publish(&mut channel, false, later, Some(&mut sink)),
            PublishOutcome::Unchanged
        );
    }

    #[test]
    fn test_gain_hysteresis() {
        let publisher = publisher();
        let mut channel = active_channel(0);
        let mut sink = Recorder::default();
        let mut now = Instant::now();

        publisher.publish(&mut channel, false, now, Some(&mut sink));

        // radius moves 0.4: pose is dirty, gain stays put
        channel.radius += 0.4;
        now += Duration::from_millis(50);
        assert_eq!(
            publisher.publish(&mut channel, false, now, Some(&mut sink)),
            PublishOutcome::Sent { gain: false }
        );

        channel.radius += 0.6;
        now += Duration::from_millis(50);
        assert_eq!(
            publisher.publish(&mut channel, false, now, Some(&mut sink)),
            PublishOutcome::Sent { gain: true }
        );
    }

    #[test]
    fn test_inactive_unbound_bypassed() {
        let publisher = publisher();
        let mut sink = Recorder::default();
        let now = Instant::now();

        let mut channel = SourceChannel::new(0);
        assert_eq!(
            publisher.publish(&mut channel, true, now, Some(&mut sink)),
            PublishOutcome::Inactive
        );

        channel.active = true;
        assert_eq!(publisher.publish(&mut channel, true, now, None), PublishOutcome::Unbound);

        channel.bypass = true;
        assert_eq!(
            publisher.publish(&mut channel, true, now, Some(&mut sink)),
            PublishOutcome::Bypassed
        );
        assert!(sink.sets.is_empty());
    }

    #[test]
    fn test_mute_invalidates() {
        let publisher = publisher();
        let mut channel = active_channel(2);
        let mut sink = Recorder::default();
        let now = Instant::now();

        publisher.publish(&mut channel, false, now, Some(&mut sink));
        publisher.mute(&mut channel, &mut sink);
        assert_eq!(sink.value("mixL:Gain 5"), Some(0.0));
        assert_eq!(sink.value("mixR:Gain 6"), Some(0.0));
        assert!(channel.last_published().is_none());

        assert_eq!(
            publisher.publish(&mut channel, false, now, Some(&mut sink)),
            PublishOutcome::Sent { gain: true }
        );
    }

    proptest! {
        #[test]
        fn prop_azimuths_in_range(center in 0.0f32..360.0, width in 0.0f32..=90.0) {
            let (left, right) = stereo_azimuths(center, width);
            for azimuth in [mirror_azimuth(left), mirror_azimuth(right)] {
                prop_assert!((0.0..360.0).contains(&azimuth));
            }
        }

        #[test]
        fn prop_gain_non_increasing(a in 0.0f32..=100.0, b in 0.0f32..=100.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(radius_to_gain(near) >= radius_to_gain(far));
            prop_assert!((0.1..=1.0).contains(&radius_to_gain(near)));
        }
    }
}
