use crate::{FrameOutcome, WidgetState};
use anyhow::Result;
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Done,
}

/// The stages of one iteration of the frame loop, in the order they run.
pub trait FrameHost {
    type DrawData;

    /// Drains pending window messages without waiting.
    fn pump_messages(&mut self) -> LoopState;

    fn begin_frame(&mut self);

    fn declare_widgets(&mut self, state: &mut WidgetState);

    fn end_frame(&mut self) -> Self::DrawData;

    /// Clears to `clear_color`, submits `draw_data` and presents.
    fn render(&mut self, draw_data: Self::DrawData, clear_color: [f32; 4]) -> Result<FrameOutcome>;
}

#[derive(Debug)]
pub struct FrameLoop {
    state: LoopState,
    iterations: u64,
    frames: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Running,
            iterations: 0,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Frames actually presented.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Loop iterations that got past the message pump, presented or not.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Runs until the host reports a quit. Returns the number of frames
    /// presented.
    pub fn run<H: FrameHost>(&mut self, host: &mut H, widgets: &mut WidgetState) -> Result<u64> {
        while self.step(host, widgets)? == LoopState::Running {}
        Ok(self.frames)
    }

    pub fn step<H: FrameHost>(&mut self, host: &mut H, widgets: &mut WidgetState) -> Result<LoopState> {
        if self.state == LoopState::Done {
            return Ok(LoopState::Done);
        }

        if host.pump_messages() == LoopState::Done {
            log::info!("Quit requested after {} frames", self.frames);
            self.state = LoopState::Done;
            return Ok(LoopState::Done);
        }

        host.begin_frame();
        host.declare_widgets(widgets);
        let draw_data = host.end_frame();
        let outcome = host.render(draw_data, widgets.premultiplied_clear_color())?;

        self.iterations += 1;
        if outcome == FrameOutcome::Presented {
            self.frames += 1;
        }
        Ok(LoopState::Running)
    }
}

const FRAME_SAMPLES: usize = 60;

/// Rolling average over the last 60 frame durations.
#[derive(Debug, Default)]
pub struct FrameTimer {
    samples: VecDeque<Duration>,
    last_tick: Option<Instant>,
}

impl FrameTimer {
    pub fn tick(&mut self) {
        let now = Instant::now();
        if let Some(last_tick) = self.last_tick.replace(now) {
            self.record(now - last_tick);
        }
    }

    pub fn record(&mut self, frame_time: Duration) {
        if self.samples.len() == FRAME_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(frame_time);
    }

    pub fn average_frame_time(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<Duration>() / self.samples.len() as u32)
    }

    pub fn milliseconds_per_frame(&self) -> f32 {
        self.average_frame_time()
            .map(|frame_time| frame_time.as_secs_f32() * 1000.0)
            .unwrap_or_default()
    }

    pub fn frames_per_second(&self) -> f32 {
        self.average_frame_time()
            .map(|frame_time| frame_time.as_secs_f32())
            .filter(|seconds| *seconds > 0.0)
            .map(|seconds| 1.0 / seconds)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[derive(Debug, PartialEq)]
    enum Stage {
        Pump,
        Begin,
        Declare,
        End,
        Render([f32; 4]),
    }

    struct ScriptedHost {
        quit_on_pump: usize,
        pumps: usize,
        fail_render: bool,
        skip_on_pump: Option<usize>,
        stages: Vec<Stage>,
    }

    impl ScriptedHost {
        fn quitting_on(pump: usize) -> Self {
            Self {
                quit_on_pump: pump,
                pumps: 0,
                fail_render: false,
                skip_on_pump: None,
                stages: Vec::new(),
            }
        }

        fn count(&self, stage: &Stage) -> usize {
            self.stages.iter().filter(|s| *s == stage).count()
        }
    }

    impl FrameHost for ScriptedHost {
        type DrawData = usize;

        fn pump_messages(&mut self) -> LoopState {
            self.pumps += 1;
            self.stages.push(Stage::Pump);
            if self.pumps >= self.quit_on_pump {
                LoopState::Done
            } else {
                LoopState::Running
            }
        }

        fn begin_frame(&mut self) {
            self.stages.push(Stage::Begin);
        }

        fn declare_widgets(&mut self, state: &mut WidgetState) {
            state.count_click(true);
            self.stages.push(Stage::Declare);
        }

        fn end_frame(&mut self) -> usize {
            self.stages.push(Stage::End);
            self.pumps
        }

        fn render(&mut self, draw_data: usize, clear_color: [f32; 4]) -> Result<FrameOutcome> {
            if self.fail_render {
                bail!("device lost");
            }
            self.stages.push(Stage::Render(clear_color));
            if self.skip_on_pump == Some(draw_data) {
                Ok(FrameOutcome::Skipped)
            } else {
                Ok(FrameOutcome::Presented)
            }
        }
    }

    #[test]
    fn stops_exactly_on_quit() {
        let mut host = ScriptedHost::quitting_on(4);
        let mut widgets = WidgetState::default();
        let mut frame_loop = FrameLoop::new();

        let frames = frame_loop.run(&mut host, &mut widgets).unwrap();

        assert_eq!(frames, 3);
        assert_eq!(frame_loop.state(), LoopState::Done);
        assert_eq!(host.pumps, 4);
        assert_eq!(host.count(&Stage::Declare), 3);
        assert_eq!(widgets.counter, 3);
        assert_eq!(host.stages.last(), Some(&Stage::Pump));
    }

    #[test]
    fn skipped_frames_are_not_counted_as_presented() {
        let mut host = ScriptedHost::quitting_on(4);
        host.skip_on_pump = Some(2);
        let mut widgets = WidgetState::default();
        let mut frame_loop = FrameLoop::new();

        let frames = frame_loop.run(&mut host, &mut widgets).unwrap();

        assert_eq!(frames, 2);
        assert_eq!(frame_loop.iterations(), 3);
        assert_eq!(host.count(&Stage::Declare), 3);
    }

    #[test]
    fn quit_on_first_pump_declares_nothing() {
        let mut host = ScriptedHost::quitting_on(1);
        let mut widgets = WidgetState::default();

        let frames = FrameLoop::new().run(&mut host, &mut widgets).unwrap();

        assert_eq!(frames, 0);
        assert_eq!(host.stages, vec![Stage::Pump]);
        assert_eq!(widgets, WidgetState::default());
    }

    #[test]
    fn stages_run_in_order() {
        let mut host = ScriptedHost::quitting_on(2);
        let mut widgets = WidgetState::default();
        let clear_color = widgets.premultiplied_clear_color();

        FrameLoop::new().run(&mut host, &mut widgets).unwrap();

        assert_eq!(
            host.stages,
            vec![
                Stage::Pump,
                Stage::Begin,
                Stage::Declare,
                Stage::End,
                Stage::Render(clear_color),
                Stage::Pump,
            ]
        );
    }

    #[test]
    fn finished_loop_does_not_pump_again() {
        let mut host = ScriptedHost::quitting_on(1);
        let mut widgets = WidgetState::default();
        let mut frame_loop = FrameLoop::new();

        frame_loop.run(&mut host, &mut widgets).unwrap();
        assert_eq!(frame_loop.step(&mut host, &mut widgets).unwrap(), LoopState::Done);
        assert_eq!(host.pumps, 1);
    }

    #[test]
    fn render_failure_ends_the_loop_with_an_error() {
        let mut host = ScriptedHost::quitting_on(10);
        host.fail_render = true;
        let mut widgets = WidgetState::default();

        assert!(FrameLoop::new().run(&mut host, &mut widgets).is_err());
        assert_eq!(host.pumps, 1);
    }

    #[test]
    fn timer_without_samples_reports_zero() {
        let timer = FrameTimer::default();
        assert_eq!(timer.average_frame_time(), None);
        assert_eq!(timer.frames_per_second(), 0.0);
        assert_eq!(timer.milliseconds_per_frame(), 0.0);
    }

    #[test]
    fn timer_averages_recorded_frames() {
        let mut timer = FrameTimer::default();
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));
        assert_eq!(timer.average_frame_time(), Some(Duration::from_millis(20)));
        assert!((timer.frames_per_second() - 50.0).abs() < 1e-3);
        assert!((timer.milliseconds_per_frame() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn timer_keeps_only_the_latest_sixty_frames() {
        let mut timer = FrameTimer::default();
        for _ in 0..FRAME_SAMPLES {
            timer.record(Duration::from_millis(100));
        }
        for _ in 0..FRAME_SAMPLES {
            timer.record(Duration::from_millis(10));
        }
        assert_eq!(timer.average_frame_time(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn first_tick_records_nothing() {
        let mut timer = FrameTimer::default();
        timer.tick();
        assert_eq!(timer.average_frame_time(), None);
        timer.tick();
        assert!(timer.average_frame_time().is_some());
    }
}
