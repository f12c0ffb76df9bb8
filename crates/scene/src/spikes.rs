use std::collections::HashMap;

use morpho::SpikeReport;

/// Seconds of report time over which a spike cools back down.
pub const ACTIVATION_DELAY: f32 = 20.0;

/// Steps through a spike report, tracking the latest spike per neuron.
#[derive(Debug)]
pub struct SpikePlayer {
    report: Option<SpikeReport>,
    time: f32,
    playing: bool,
    speed: f32,
    cursor: usize,
    last_spike: HashMap<u32, f32>,
}

impl Default for SpikePlayer {
    fn default() -> Self {
        Self {
            report: None,
            time: 0.0,
            playing: false,
            speed: 1.0,
            cursor: 0,
            last_spike: HashMap::new(),
        }
    }
}

impl SpikePlayer {
    pub fn attach(&mut self, report: SpikeReport) {
        self.time = report.start_time();
        self.report = Some(report);
        self.playing = false;
        self.cursor = 0;
        self.last_spike.clear();
        tracing::info!(time = self.time, "spike report attached");
    }

    pub fn detach(&mut self) {
        *self = SpikePlayer::default();
    }

    pub fn is_attached(&self) -> bool {
        self.report.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn end_time(&self) -> f32 {
        self.report.as_ref().map(|r| r.end_time()).unwrap_or(0.0)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn play(&mut self) {
        if self.report.is_some() {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advances playback by wall time, consuming events up to the new
    /// report time. Playback pauses itself at the end of the report.
    pub fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        let Some(report) = &self.report else {
            return;
        };
        self.time += dt.max(0.0) * self.speed;
        let end = report.end_time();
        if self.time >= end {
            self.time = end;
            self.playing = false;
        }
        while self.cursor < report.events.len() && report.events[self.cursor].0 <= self.time {
            let (time, gid) = report.events[self.cursor];
            self.last_spike.insert(gid, time);
            self.cursor += 1;
        }
    }

    /// Rewinding replays the report from the start to rebuild per-neuron
    /// state; seeking forward just consumes more events.
    pub fn seek(&mut self, time: f32) {
        if time < self.time {
            self.cursor = 0;
            self.last_spike.clear();
        }
        self.time = time;
        let Some(report) = &self.report else {
            return;
        };
        while self.cursor < report.events.len() && report.events[self.cursor].0 <= self.time {
            let (event_time, gid) = report.events[self.cursor];
            self.last_spike.insert(gid, event_time);
            self.cursor += 1;
        }
    }

    /// Gradient position for a neuron: 0 right at a spike, 1 after the
    /// cool-down. Neurons that never spiked sit at the cold extreme.
    pub fn activation_position(&self, gid: u32) -> f32 {
        match self.last_spike.get(&gid) {
            Some(spike_time) => ((self.time - spike_time) / ACTIVATION_DELAY).clamp(0.0, 1.0),
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SpikeReport {
        SpikeReport {
            events: vec![(1.0, 10), (2.0, 20), (5.0, 10), (30.0, 30)],
        }
    }

    #[test]
    fn attach_rewinds_to_the_report_start() {
        let mut player = SpikePlayer::default();
        player.attach(report());
        assert!(player.is_attached());
        assert!(!player.is_playing());
        assert_eq!(player.time(), 1.0);
    }

    #[test]
    fn advance_consumes_events_in_order() {
        let mut player = SpikePlayer::default();
        player.attach(report());
        player.play();
        player.advance(1.5);
        assert_eq!(player.time(), 2.5);
        assert_eq!(player.activation_position(10), (2.5 - 1.0) / ACTIVATION_DELAY);
        assert_eq!(player.activation_position(20), (2.5 - 2.0) / ACTIVATION_DELAY);
        assert_eq!(player.activation_position(30), 1.0);

        player.advance(3.0);
        assert_eq!(player.activation_position(10), (5.5 - 5.0) / ACTIVATION_DELAY);
    }

    #[test]
    fn playback_pauses_at_the_end() {
        let mut player = SpikePlayer::default();
        player.attach(report());
        player.play();
        player.advance(1000.0);
        assert_eq!(player.time(), 30.0);
        assert!(!player.is_playing());
        assert_eq!(player.activation_position(30), 0.0);
    }

    #[test]
    fn seek_backwards_rebuilds_state() {
        let mut player = SpikePlayer::default();
        player.attach(report());
        player.seek(10.0);
        assert_eq!(player.activation_position(10), (10.0 - 5.0) / ACTIVATION_DELAY);

        player.seek(1.5);
        assert_eq!(player.activation_position(10), (1.5 - 1.0) / ACTIVATION_DELAY);
        assert_eq!(player.activation_position(20), 1.0);
    }

    #[test]
    fn speed_scales_wall_time() {
        let mut player = SpikePlayer::default();
        player.attach(report());
        player.set_speed(10.0);
        player.play();
        player.advance(0.2);
        assert_eq!(player.time(), 3.0);
    }

    #[test]
    fn detached_player_reports_cold_everywhere() {
        let player = SpikePlayer::default();
        assert_eq!(player.activation_position(7), 1.0);
    }
}
