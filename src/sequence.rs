//! Frame-sequence driver: renders `duration * fps` frames in order and
//! picks the middle one as the output artifact.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::json;

use crate::error_codes::{has_code, CodedError, EMPTY_PROMPT, SURFACE_UNAVAILABLE};
use crate::renderer::{Frame, FrameRenderer, RenderParams};
use crate::schema::{CanvasSize, DurationPreset, FPS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequencePlan {
    pub fps: u32,
    pub duration_seconds: u32,
    pub total_frames: u32,
    pub representative_index: u32,
}

impl SequencePlan {
    pub fn new(duration: DurationPreset) -> Self {
        let total_frames = duration.total_frames();
        Self {
            fps: FPS,
            duration_seconds: duration.seconds(),
            total_frames,
            representative_index: total_frames / 2,
        }
    }

    pub fn time_at(&self, frame_index: u32) -> f64 {
        f64::from(frame_index) / f64::from(self.fps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration: DurationPreset,
    pub canvas: CanvasSize,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, duration: DurationPreset, canvas: CanvasSize) -> Self {
        Self {
            prompt: prompt.into(),
            duration,
            canvas,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(anyhow!(CodedError::usage(
                EMPTY_PROMPT,
                "prompt must contain at least one non-whitespace character",
            )
            .with_details(json!({ "provided": self.prompt }))));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Completed,
    Cancelled,
    /// No drawing surface could be obtained; nothing was rendered.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub plan: SequencePlan,
    pub frames_rendered: u32,
    pub status: GenerationStatus,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.status == GenerationStatus::Completed
    }
}

/// Receives frames in index order as the driver produces them.
pub trait FrameSink {
    fn accept(&mut self, frame_index: u32, frame: Frame) -> Result<()>;
}

/// Keeps every frame. Memory grows with `width * height * total_frames`.
#[derive(Debug, Default, Clone)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame_index: u32) -> Option<&Frame> {
        self.frames.get(frame_index as usize)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn representative(&self, plan: &SequencePlan) -> Option<&Frame> {
        self.get(plan.representative_index)
    }
}

impl FrameSink for FrameSequence {
    fn accept(&mut self, frame_index: u32, frame: Frame) -> Result<()> {
        if frame_index as usize != self.frames.len() {
            return Err(anyhow!(
                "frame {frame_index} arrived out of order (expected {})",
                self.frames.len()
            ));
        }
        self.frames.push(frame);
        Ok(())
    }
}

/// Keeps only the frame at the chosen index and drops the rest.
#[derive(Debug, Clone)]
pub struct RepresentativeFrame {
    target_index: u32,
    frame: Option<Frame>,
}

impl RepresentativeFrame {
    pub fn for_plan(plan: &SequencePlan) -> Self {
        Self {
            target_index: plan.representative_index,
            frame: None,
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn into_frame(self) -> Option<Frame> {
        self.frame
    }
}

impl FrameSink for RepresentativeFrame {
    fn accept(&mut self, frame_index: u32, frame: Frame) -> Result<()> {
        if frame_index == self.target_index {
            self.frame = Some(frame);
        }
        Ok(())
    }
}

/// Forwards each frame to two sinks.
pub struct TeeSink<'a> {
    first: &'a mut dyn FrameSink,
    second: &'a mut dyn FrameSink,
}

impl<'a> TeeSink<'a> {
    pub fn new(first: &'a mut dyn FrameSink, second: &'a mut dyn FrameSink) -> Self {
        Self { first, second }
    }
}

impl FrameSink for TeeSink<'_> {
    fn accept(&mut self, frame_index: u32, frame: Frame) -> Result<()> {
        self.first.accept(frame_index, frame.clone())?;
        self.second.accept(frame_index, frame)
    }
}

pub trait ProgressObserver {
    fn update(&mut self, completed: u32, total: u32);
    /// Called once when the run ends, whatever the outcome.
    fn clear(&mut self);
}

/// Observer that ignores every update.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn update(&mut self, _completed: u32, _total: u32) {}

    fn clear(&mut self) {}
}

/// Logs progress once per second of rendered frames.
pub struct LogProgress {
    fps: u32,
}

impl LogProgress {
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }
}

impl ProgressObserver for LogProgress {
    fn update(&mut self, completed: u32, total: u32) {
        if completed % self.fps == 0 || completed == total {
            tracing::info!(
                completed,
                total,
                percent = progress_percent(completed, total),
                "rendered frame {}/{}",
                completed,
                total
            );
        }
    }

    fn clear(&mut self) {
        tracing::debug!("progress cleared");
    }
}

pub fn progress_percent(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((u64::from(completed) * 100) / u64::from(total)) as u32
}

/// Renders the whole sequence for `request` into `sink`.
///
/// Refuses empty prompts before rendering anything. A missing drawing
/// surface ends the run as [`GenerationStatus::Aborted`] rather than an
/// error. Setting `cancel` stops the loop before the next frame; frames
/// already handed to the sink are left as they are.
#[tracing::instrument(
    skip_all,
    fields(
        duration = request.duration.seconds(),
        canvas = %request.canvas,
    )
)]
pub fn generate(
    renderer: &mut FrameRenderer,
    request: &GenerationRequest,
    sink: &mut dyn FrameSink,
    progress: &mut dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<GenerationReport> {
    request.validate()?;

    let plan = SequencePlan::new(request.duration);
    let missing = renderer.unsupported_codepoints(&request.prompt);
    if !missing.is_empty() {
        tracing::warn!(?missing, "overlay font has no glyphs for some prompt characters");
    }

    let result = run_frames(renderer, request, &plan, sink, progress, cancel);
    progress.clear();
    result
}

fn run_frames(
    renderer: &mut FrameRenderer,
    request: &GenerationRequest,
    plan: &SequencePlan,
    sink: &mut dyn FrameSink,
    progress: &mut dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<GenerationReport> {
    let mut frames_rendered = 0;

    for frame_index in 0..plan.total_frames {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!(frames_rendered, "generation cancelled");
            return Ok(GenerationReport {
                plan: *plan,
                frames_rendered,
                status: GenerationStatus::Cancelled,
            });
        }

        let params = RenderParams::new(plan.time_at(frame_index), request.canvas, &request.prompt);
        let frame = match renderer.render(&params) {
            Ok(frame) => frame,
            Err(error) if has_code(&error, SURFACE_UNAVAILABLE) => {
                tracing::warn!(error = %error, "no drawing surface; generation aborted");
                return Ok(GenerationReport {
                    plan: *plan,
                    frames_rendered,
                    status: GenerationStatus::Aborted,
                });
            }
            Err(error) => {
                return Err(error).with_context(|| format!("failed rendering frame {frame_index}"))
            }
        };

        sink.accept(frame_index, frame)
            .with_context(|| format!("failed storing frame {frame_index}"))?;
        frames_rendered += 1;
        tracing::debug!(frame_index, time = params.time, "frame rendered");
        progress.update(frames_rendered, plan.total_frames);
    }

    Ok(GenerationReport {
        plan: *plan,
        frames_rendered,
        status: GenerationStatus::Completed,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::Result;

    use super::{
        generate, progress_percent, FrameSequence, FrameSink, GenerationRequest,
        GenerationStatus, NoProgress, ProgressObserver, RepresentativeFrame, SequencePlan,
    };
    use crate::error_codes::{find_coded_error, EMPTY_PROMPT};
    use crate::renderer::{Frame, FrameRenderer, RenderParams};
    use crate::schema::{CanvasSize, DurationPreset};

    const TINY: CanvasSize = CanvasSize::new(32, 18);

    #[derive(Default)]
    struct RecordingProgress {
        updates: Vec<(u32, u32)>,
        cleared: u32,
    }

    impl ProgressObserver for RecordingProgress {
        fn update(&mut self, completed: u32, total: u32) {
            self.updates.push((completed, total));
        }

        fn clear(&mut self) {
            self.cleared += 1;
        }
    }

    /// Raises the cancel flag after a fixed number of frames.
    struct CancelAfter<'a> {
        inner: FrameSequence,
        after: usize,
        cancel: &'a AtomicBool,
    }

    impl FrameSink for CancelAfter<'_> {
        fn accept(&mut self, frame_index: u32, frame: Frame) -> Result<()> {
            self.inner.accept(frame_index, frame)?;
            if self.inner.len() >= self.after {
                self.cancel.store(true, Ordering::Relaxed);
            }
            Ok(())
        }
    }

    #[test]
    fn plan_matches_duration_presets() {
        let five = SequencePlan::new(DurationPreset::Five);
        assert_eq!(five.total_frames, 150);
        assert_eq!(five.representative_index, 75);

        let three = SequencePlan::new(DurationPreset::Three);
        assert_eq!(three.total_frames, 90);
        assert_eq!(three.representative_index, 45);

        let fifteen = SequencePlan::new(DurationPreset::Fifteen);
        assert_eq!(fifteen.total_frames, 450);
        assert_eq!(fifteen.representative_index, 225);
    }

    #[test]
    fn frame_times_step_by_one_thirtieth() {
        let plan = SequencePlan::new(DurationPreset::Three);
        assert_eq!(plan.time_at(0), 0.0);
        assert_eq!(plan.time_at(30), 1.0);
        assert_eq!(plan.time_at(45), 1.5);
    }

    #[test]
    fn full_run_collects_every_frame_in_order() {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        let request = GenerationRequest::new("tiny test", DurationPreset::Three, TINY);
        let mut sequence = FrameSequence::new();
        let mut progress = RecordingProgress::default();

        let report = generate(
            &mut renderer,
            &request,
            &mut sequence,
            &mut progress,
            &AtomicBool::new(false),
        )
        .expect("generation should succeed");

        assert_eq!(report.status, GenerationStatus::Completed);
        assert_eq!(report.frames_rendered, 90);
        assert_eq!(sequence.len(), 90);
        assert_eq!(progress.updates.len(), 90);
        assert_eq!(progress.updates.last(), Some(&(90, 90)));
        assert_eq!(progress.cleared, 1);

        let expected = renderer
            .render(&RenderParams::new(1.5, TINY, "tiny test"))
            .expect("direct render");
        assert_eq!(sequence.representative(&report.plan), Some(&expected));
    }

    #[test]
    fn representative_sink_keeps_only_the_middle_frame() {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        let request = GenerationRequest::new("middle", DurationPreset::Three, TINY);
        let plan = SequencePlan::new(request.duration);
        let mut sink = RepresentativeFrame::for_plan(&plan);

        generate(
            &mut renderer,
            &request,
            &mut sink,
            &mut NoProgress,
            &AtomicBool::new(false),
        )
        .expect("generation should succeed");

        let expected = renderer
            .render(&RenderParams::new(plan.time_at(45), TINY, "middle"))
            .expect("direct render");
        assert_eq!(sink.into_frame(), Some(expected));
    }

    #[test]
    fn blank_prompt_is_refused_before_rendering() {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        let mut sequence = FrameSequence::new();
        let mut progress = RecordingProgress::default();

        for prompt in ["", "   ", "\t\n"] {
            let request = GenerationRequest::new(prompt, DurationPreset::Three, TINY);
            let error = generate(
                &mut renderer,
                &request,
                &mut sequence,
                &mut progress,
                &AtomicBool::new(false),
            )
            .expect_err("blank prompt must be refused");
            assert_eq!(
                find_coded_error(&error).map(|coded| coded.code),
                Some(EMPTY_PROMPT)
            );
        }
        assert!(sequence.is_empty());
        assert!(progress.updates.is_empty());
    }

    #[test]
    fn cancellation_keeps_frames_already_rendered() {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        let request = GenerationRequest::new("stop early", DurationPreset::Three, TINY);
        let cancel = AtomicBool::new(false);
        let mut sink = CancelAfter {
            inner: FrameSequence::new(),
            after: 10,
            cancel: &cancel,
        };
        let mut progress = RecordingProgress::default();

        let report = generate(&mut renderer, &request, &mut sink, &mut progress, &cancel)
            .expect("cancelled run is not an error");

        assert_eq!(report.status, GenerationStatus::Cancelled);
        assert_eq!(report.frames_rendered, 10);
        assert_eq!(sink.inner.len(), 10);
        assert_eq!(progress.cleared, 1);
        let ninth = renderer
            .render(&RenderParams::new(9.0 / 30.0, TINY, "stop early"))
            .expect("direct render");
        assert_eq!(sink.inner.get(9), Some(&ninth));
    }

    #[test]
    fn missing_surface_aborts_without_frames() {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        let request = GenerationRequest::new(
            "no canvas",
            DurationPreset::Three,
            CanvasSize::new(0, 0),
        );
        let mut sequence = FrameSequence::new();
        let mut progress = RecordingProgress::default();

        let report = generate(
            &mut renderer,
            &request,
            &mut sequence,
            &mut progress,
            &AtomicBool::new(false),
        )
        .expect("abort is not an error");

        assert_eq!(report.status, GenerationStatus::Aborted);
        assert_eq!(report.frames_rendered, 0);
        assert!(sequence.is_empty());
        assert_eq!(progress.cleared, 1);
    }

    #[test]
    fn frame_sequence_rejects_out_of_order_frames() {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        let frame = renderer
            .render(&RenderParams::new(0.0, TINY, "x"))
            .expect("render");
        let mut sequence = FrameSequence::new();
        assert!(sequence.accept(1, frame.clone()).is_err());
        sequence.accept(0, frame).expect("first frame accepted");
        assert_eq!(sequence.len(), 1);
    }

    #[test]
    fn percent_is_floor_of_completed_ratio() {
        assert_eq!(progress_percent(0, 150), 0);
        assert_eq!(progress_percent(75, 150), 50);
        assert_eq!(progress_percent(149, 150), 99);
        assert_eq!(progress_percent(150, 150), 100);
        assert_eq!(progress_percent(3, 0), 0);
    }
}
