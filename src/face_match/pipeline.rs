//! Face match loop
//!
//! Every n-th frame is downscaled, analysed, compared against the reference
//! and shown with its annotations. Other frames are dropped.

use image::RgbImage;

use super::{FaceMatcher, MatchVerdict};
use crate::camera::{downscale, FrameSource};
use crate::display::PreviewSink;
use crate::error::{Result, VisionError};
use crate::ml::{FaceAnalyzer, FaceBox};
use crate::overlay::{draw_annotations, Annotation, OverlayStyle, GREEN, RED};
use crate::settings::FaceMatchSettings;

/// Lets through every n-th frame, counting from 1
#[derive(Clone, Debug)]
pub struct FrameThrottle {
    every: u32,
    count: u64,
}

impl FrameThrottle {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            count: 0,
        }
    }

    /// Register a frame, returning whether it should be processed
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        self.count % self.every as u64 == 0
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Counters reported when the loop ends
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub faces_seen: u64,
    pub matches: u64,
}

/// A face located in full-resolution frame coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct FaceResult {
    pub location: FaceBox,
    pub verdict: MatchVerdict,
}

impl FaceResult {
    fn annotation(&self) -> Annotation {
        let label_color = if self.verdict.matched { GREEN } else { RED };
        Annotation {
            location: self.location,
            label: self.verdict.label().to_string(),
            box_color: GREEN,
            label_color,
        }
    }
}

/// Per-frame face matching
pub struct FaceMatchPipeline<A> {
    analyzer: A,
    matcher: FaceMatcher,
    throttle: FrameThrottle,
    detection_scale: f32,
    style: OverlayStyle,
}

impl<A: FaceAnalyzer> FaceMatchPipeline<A> {
    pub fn new(analyzer: A, matcher: FaceMatcher, settings: &FaceMatchSettings) -> Self {
        Self {
            analyzer,
            matcher,
            throttle: FrameThrottle::new(settings.process_every_n_frames),
            detection_scale: settings.detection_scale,
            style: OverlayStyle::default(),
        }
    }

    pub fn matcher(&self) -> &FaceMatcher {
        &self.matcher
    }

    /// Detect and compare faces on a downscaled copy of `image`.
    ///
    /// Locations are returned in `image` coordinates. Faces whose embedding
    /// cannot be compared are left out.
    pub fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceResult>> {
        let small = downscale(image, self.detection_scale);
        let faces = self.analyzer.analyze(&small)?;
        let upscale = 1.0 / self.detection_scale;

        Ok(faces
            .into_iter()
            .filter_map(|face| {
                let verdict = self.matcher.compare(&face.embedding);
                if verdict.is_none() {
                    log::debug!(
                        "Skipping face with {}-d embedding (reference is {}-d)",
                        face.embedding.len(),
                        self.matcher.reference().len()
                    );
                }
                Some(FaceResult {
                    location: face.location.scaled(upscale),
                    verdict: verdict?,
                })
            })
            .collect())
    }
}

/// Load the reference, then open the camera and preview and run the loop.
///
/// The camera is only opened once the reference face is known, so a
/// reference without a face fails before touching the device.
pub fn start_face_match<A, S, P, OpenSource, OpenPreview>(
    settings: &FaceMatchSettings,
    mut analyzer: A,
    reference: &RgbImage,
    open_source: OpenSource,
    open_preview: OpenPreview,
) -> Result<RunSummary>
where
    A: FaceAnalyzer,
    S: FrameSource,
    P: PreviewSink,
    OpenSource: FnOnce() -> Result<S>,
    OpenPreview: FnOnce(u32, u32) -> Result<P>,
{
    let matcher = FaceMatcher::from_reference(&mut analyzer, reference, settings.tolerance)?;
    log::info!("Matching faces within distance {}", matcher.tolerance());

    let mut source = open_source()?;
    let (width, height) = source.resolution();
    let mut preview = open_preview(width, height)?;

    let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, settings);
    run_face_match(&mut pipeline, &mut source, &mut preview)
}

/// Run until the quit key, a closed window, or a capture failure
pub fn run_face_match<A, S, P>(
    pipeline: &mut FaceMatchPipeline<A>,
    source: &mut S,
    preview: &mut P,
) -> Result<RunSummary>
where
    A: FaceAnalyzer,
    S: FrameSource,
    P: PreviewSink,
{
    let mut summary = RunSummary::default();

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Frame source ended");
                break;
            }
            Err(e) => {
                println!("Failed to grab frame");
                log::error!("Capture failed: {}", e);
                break;
            }
        };
        summary.frames_read += 1;

        if !pipeline.throttle.tick() {
            continue;
        }
        summary.frames_processed += 1;

        let mut image = frame.image;
        match pipeline.analyze(&image) {
            Ok(results) => {
                summary.faces_seen += results.len() as u64;
                summary.matches += results.iter().filter(|r| r.verdict.matched).count() as u64;

                let annotations: Vec<Annotation> =
                    results.iter().map(FaceResult::annotation).collect();
                draw_annotations(&mut image, &annotations, pipeline.style);
            }
            Err(e) => {
                log::warn!("Face analysis failed on frame {}: {}", frame.frame_number, e);
            }
        }

        preview.present(&image)?;

        if preview.quit_requested() {
            log::info!("Quit requested, exiting...");
            break;
        }
    }

    log::info!(
        "Processed {} of {} frames, {} face(s), {} match(es)",
        summary.frames_processed,
        summary.frames_read,
        summary.faces_seen,
        summary.matches
    );
    Ok(summary)
}

/// How a `face-match` run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaceMatchExit {
    Finished(RunSummary),
    /// The reference image holds no face; reported to the user, clean exit
    NoReferenceFace,
}

impl FaceMatchExit {
    /// Line to print on stdout, if any
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Finished(_) => None,
            Self::NoReferenceFace => Some(VisionError::NoFaceInReference.to_string()),
        }
    }
}

/// Turn a missing reference face into a clean exit; other errors pass through
pub fn finish_face_match(result: Result<RunSummary>) -> Result<FaceMatchExit> {
    match result {
        Ok(summary) => Ok(FaceMatchExit::Finished(summary)),
        Err(VisionError::NoFaceInReference) => Ok(FaceMatchExit::NoReferenceFace),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{face, FixedAnalyzer, RecordingPreview, ScriptedSource};
    use image::Rgb;

    fn settings() -> FaceMatchSettings {
        FaceMatchSettings::default()
    }

    #[test]
    fn test_throttle_every_fifth() {
        let mut throttle = FrameThrottle::new(5);
        let mut processed = Vec::new();
        for _ in 0..12 {
            if throttle.tick() {
                processed.push(throttle.count());
            }
        }
        assert_eq!(processed, vec![5, 10]);
    }

    #[test]
    fn test_throttle_every_frame() {
        let mut throttle = FrameThrottle::new(1);
        assert!((0..3).all(|_| throttle.tick()));
    }

    #[test]
    fn test_analyze_downscales_and_rescales() {
        let analyzer =
            FixedAnalyzer::new(vec![face(vec![0.0, 0.0], FaceBox::new(10, 60, 50, 20))]);
        let matcher = FaceMatcher::new(vec![0.0, 0.1].into(), 0.6);
        let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, &settings());

        let results = pipeline.analyze(&RgbImage::new(640, 480)).unwrap();

        assert_eq!(pipeline.analyzer.seen_sizes, vec![(320, 240)]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location, FaceBox::new(20, 120, 100, 40));
        assert!(results[0].verdict.matched);
    }

    #[test]
    fn test_incomparable_face_is_skipped() {
        let analyzer = FixedAnalyzer::new(vec![
            face(vec![0.0], FaceBox::new(0, 10, 10, 0)),
            face(vec![5.0, 5.0], FaceBox::new(20, 40, 40, 20)),
        ]);
        let matcher = FaceMatcher::new(vec![0.0, 0.0].into(), 0.6);
        let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, &settings());

        let results = pipeline.analyze(&RgbImage::new(100, 100)).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].verdict.matched);
        assert_eq!(results[0].annotation().label, "No Match");
        assert_eq!(results[0].annotation().label_color, RED);
    }

    #[test]
    fn test_loop_processes_every_fifth_frame() {
        let analyzer =
            FixedAnalyzer::new(vec![face(vec![1.0, 1.0], FaceBox::new(40, 120, 120, 40))]);
        let matcher = FaceMatcher::new(vec![1.0, 1.0].into(), 0.6);
        let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, &settings());
        let mut source = ScriptedSource::blank(12, 320, 240);
        let mut preview = RecordingPreview::default();

        let summary = run_face_match(&mut pipeline, &mut source, &mut preview).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                frames_read: 12,
                frames_processed: 2,
                faces_seen: 2,
                matches: 2,
            }
        );
        assert_eq!(pipeline.analyzer.calls, 2);
        assert_eq!(preview.presented.len(), 2);
        // rectangle drawn at the rescaled location
        assert_eq!(*preview.presented[0].get_pixel(80, 80), GREEN);
    }

    #[test]
    fn test_loop_stops_on_quit() {
        let analyzer = FixedAnalyzer::new(Vec::new());
        let matcher = FaceMatcher::new(vec![0.0].into(), 0.6);
        let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, &settings());
        let mut source = ScriptedSource::blank(20, 64, 48);
        let mut preview = RecordingPreview {
            quit_after: Some(1),
            ..RecordingPreview::default()
        };

        let summary = run_face_match(&mut pipeline, &mut source, &mut preview).unwrap();
        assert_eq!(summary.frames_read, 5);
        assert_eq!(source.remaining(), 15);
    }

    #[test]
    fn test_capture_failure_ends_loop() {
        let analyzer = FixedAnalyzer::new(Vec::new());
        let matcher = FaceMatcher::new(vec![0.0].into(), 0.6);
        let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, &settings());
        let mut source = ScriptedSource::blank(3, 64, 48).then_fail();
        let mut preview = RecordingPreview::default();

        let summary = run_face_match(&mut pipeline, &mut source, &mut preview).unwrap();
        assert_eq!(summary.frames_read, 3);
        assert_eq!(summary.frames_processed, 0);
    }

    #[test]
    fn test_analysis_failure_shows_plain_frame() {
        let mut analyzer = FixedAnalyzer::new(Vec::new());
        analyzer.fail = true;
        let matcher = FaceMatcher::new(vec![0.0].into(), 0.6);
        let mut pipeline = FaceMatchPipeline::new(analyzer, matcher, &settings());
        let mut source = ScriptedSource::blank(5, 8, 8);
        let mut preview = RecordingPreview::default();

        let summary = run_face_match(&mut pipeline, &mut source, &mut preview).unwrap();
        assert_eq!(summary.frames_processed, 1);
        assert_eq!(summary.faces_seen, 0);
        assert_eq!(preview.presented.len(), 1);
        assert!(preview.presented[0].pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_reference_without_face_never_opens_camera() {
        let analyzer = FixedAnalyzer::new(Vec::new());
        let mut camera_opened = false;

        let result = start_face_match(
            &settings(),
            analyzer,
            &RgbImage::new(32, 32),
            || {
                camera_opened = true;
                Ok(ScriptedSource::blank(1, 32, 32))
            },
            |_, _| Ok(RecordingPreview::default()),
        );

        let err = result.unwrap_err();
        assert!(matches!(err, VisionError::NoFaceInReference));
        assert_eq!(err.to_string(), "No face detected in the reference image.");
        assert!(!camera_opened);
    }

    #[test]
    fn test_start_runs_with_valid_reference() {
        let analyzer =
            FixedAnalyzer::new(vec![face(vec![0.2, 0.2], FaceBox::new(4, 20, 20, 4))]);
        let mut preview_size = None;

        let summary = start_face_match(
            &settings(),
            analyzer,
            &RgbImage::new(32, 32),
            || Ok(ScriptedSource::blank(10, 64, 48)),
            |w, h| {
                preview_size = Some((w, h));
                Ok(RecordingPreview::default())
            },
        )
        .unwrap();

        assert_eq!(preview_size, Some((64, 48)));
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.matches, 2);
    }

    #[test]
    fn test_no_reference_face_exits_cleanly() {
        let result = start_face_match(
            &settings(),
            FixedAnalyzer::new(Vec::new()),
            &RgbImage::new(32, 32),
            || Ok(ScriptedSource::blank(1, 32, 32)),
            |_, _| Ok(RecordingPreview::default()),
        );

        let exit = finish_face_match(result).unwrap();
        assert_eq!(exit, FaceMatchExit::NoReferenceFace);
        assert_eq!(
            exit.message().as_deref(),
            Some("No face detected in the reference image.")
        );
    }

    #[test]
    fn test_finished_run_prints_nothing() {
        let exit = finish_face_match(Ok(RunSummary::default())).unwrap();
        assert_eq!(exit, FaceMatchExit::Finished(RunSummary::default()));
        assert_eq!(exit.message(), None);
    }

    #[test]
    fn test_infrastructure_errors_pass_through() {
        let result = finish_face_match(Err(VisionError::Camera("busy".to_string())));
        assert!(matches!(result, Err(VisionError::Camera(_))));
    }
}
