use crate::config::Config;
use crate::report::{BatchReport, UnitOutcome};
use adorn_core::{Catalog, PlacementError, Planner, PlannerConfig};
use adorn_io::canvas::{self, StickerCache};
use adorn_io::{InputUnit, IoError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

#[derive(Error, Debug)]
pub enum UnitError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("placement: {0}")]
    Placement(#[from] PlacementError),
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Base delay between input I/O retries; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Everything a unit needs, shared read-only across workers.
struct UnitContext {
    catalog: Arc<Catalog>,
    planner: PlannerConfig,
    output_dir: PathBuf,
    retries: u32,
    seed: Option<u64>,
    indicate: bool,
}

impl UnitContext {
    /// Load, plan, composite and save one image. Runs on a blocking thread.
    fn process(&self, index: usize, unit: &InputUnit) -> Result<UnitOutcome, UnitError> {
        let id = unit.id();
        let mut image = with_retries(self.retries, RETRY_BACKOFF, || canvas::load_image(&unit.image))?;
        let face = with_retries(self.retries, RETRY_BACKOFF, || unit.read_face())?;
        let size = canvas::image_size(&image);

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        };

        let planner = Planner::new(&self.catalog, self.planner);
        let plan = planner.plan(&face, size, Some(&image), &mut rng)?;
        tracing::debug!(
            image = %id,
            layers = plan.layers.len(),
            scans = plan.scans.len(),
            "plan ready"
        );

        let mut stickers = StickerCache::new();
        canvas::composite(&mut image, &plan.instructions(), &mut stickers)?;
        if self.indicate {
            canvas::draw_indicators(&mut image, &plan.scans, &face.landmarks, &mut rng);
        }

        let file_name = unit
            .image
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{id}.png")));
        let output = self.output_dir.join(file_name);
        canvas::save_image(image, &output)?;

        Ok(UnitOutcome {
            id,
            output,
            record: plan.record,
        })
    }
}

/// Retry `op` on transient I/O failures, up to `retries` extra attempts.
pub fn with_retries<T, F>(retries: u32, backoff: Duration, mut op: F) -> Result<T, IoError>
where
    F: FnMut() -> Result<T, IoError>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, retries, "input I/O failed; retrying");
                std::thread::sleep(backoff * attempt);
            }
            Err(e) => return Err(e),
        }
    }
}

struct UnitReply {
    id: String,
    result: Result<UnitOutcome, UnitError>,
}

/// Keep the first unit for every id; later units sharing it fail up front,
/// reported under their file name since the id is already taken.
fn reject_duplicate_ids(units: Vec<InputUnit>, report: &mut BatchReport) -> Vec<(usize, InputUnit)> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(units.len());
    for (index, unit) in units.into_iter().enumerate() {
        let id = unit.id();
        if seen.insert(id.clone()) {
            kept.push((index, unit));
            continue;
        }
        let key = unit
            .image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{id}#{index}"));
        let err = UnitError::from(IoError::DuplicateId { image: unit.image, id });
        tracing::warn!(image = %key, error = %err, "unit rejected");
        report.record_failure(key, err.to_string());
    }
    kept
}

/// Runs accessorise units with bounded concurrency.
///
/// Units are dispatched one at a time, `batch_delay` apart, onto blocking
/// worker threads gated by a semaphore. Results flow back over a channel to
/// a single coordinator that folds them into the [`BatchReport`].
pub struct Engine {
    ctx: Arc<UnitContext>,
    concurrency: usize,
    batch_delay: Duration,
}

impl Engine {
    pub fn new(config: &Config, catalog: Arc<Catalog>, output_dir: PathBuf) -> Self {
        Self {
            ctx: Arc::new(UnitContext {
                catalog,
                planner: config.planner_config(),
                output_dir,
                retries: config.retries,
                seed: config.seed,
                indicate: config.indicate,
            }),
            concurrency: config.concurrency.max(1),
            batch_delay: config.batch_delay,
        }
    }

    pub async fn run(&self, units: Vec<InputUnit>) -> BatchReport {
        let total = units.len();
        tracing::info!(
            images = total,
            concurrency = self.concurrency,
            delay_ms = self.batch_delay.as_millis() as u64,
            output = %self.ctx.output_dir.display(),
            "batch starting"
        );

        let mut report = BatchReport::new(total);
        let units = reject_duplicate_ids(units, &mut report);

        let (tx, mut rx) = mpsc::channel::<UnitReply>(self.concurrency);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let ctx = Arc::clone(&self.ctx);
        let delay = self.batch_delay;

        let dispatcher = tokio::spawn(async move {
            for (position, (index, unit)) in units.into_iter().enumerate() {
                if position > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                let ctx = Arc::clone(&ctx);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let id = unit.id();
                    tracing::info!(image = %id, index, "unit started");
                    let result = tokio::task::spawn_blocking(move || ctx.process(index, &unit))
                        .await
                        .unwrap_or_else(|e| Err(UnitError::Worker(e.to_string())));
                    drop(permit);
                    let _ = tx.send(UnitReply { id, result }).await;
                });
            }
        });

        while let Some(reply) = rx.recv().await {
            match reply.result {
                Ok(outcome) => {
                    tracing::info!(
                        image = %reply.id,
                        accessories = outcome.record.len(),
                        output = %outcome.output.display(),
                        "unit finished"
                    );
                    report.record_success(outcome);
                }
                Err(e) => {
                    tracing::warn!(image = %reply.id, error = %e, "unit failed");
                    report.record_failure(reply.id, e.to_string());
                }
            }
        }
        if let Err(e) = dispatcher.await {
            tracing::warn!(error = %e, "dispatcher task failed");
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            accessories = report.accessories_added(),
            "batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adorn_core::Region;
    use adorn_io::pair_with_face_data;
    use image::{Rgba, RgbaImage};
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    const SKIN: Rgba<u8> = Rgba([224, 172, 105, 255]);

    const FACE_JSON: &str = r#"{
        "FaceDetails": [{
            "Landmarks": [
                {"Type": "eyeLeft", "X": 0.38, "Y": 0.40},
                {"Type": "eyeRight", "X": 0.62, "Y": 0.40},
                {"Type": "nose", "X": 0.50, "Y": 0.52},
                {"Type": "noseLeft", "X": 0.46, "Y": 0.54},
                {"Type": "noseRight", "X": 0.54, "Y": 0.54},
                {"Type": "mouthLeft", "X": 0.42, "Y": 0.64},
                {"Type": "mouthRight", "X": 0.58, "Y": 0.64},
                {"Type": "mouthUp", "X": 0.50, "Y": 0.61},
                {"Type": "mouthDown", "X": 0.50, "Y": 0.67},
                {"Type": "leftEyeBrowLeft", "X": 0.30, "Y": 0.34},
                {"Type": "leftEyeBrowRight", "X": 0.44, "Y": 0.34},
                {"Type": "leftEyeBrowUp", "X": 0.37, "Y": 0.32},
                {"Type": "rightEyeBrowLeft", "X": 0.56, "Y": 0.34},
                {"Type": "rightEyeBrowRight", "X": 0.70, "Y": 0.34},
                {"Type": "rightEyeBrowUp", "X": 0.63, "Y": 0.32},
                {"Type": "leftEyeLeft", "X": 0.33, "Y": 0.40},
                {"Type": "leftEyeRight", "X": 0.43, "Y": 0.40},
                {"Type": "leftEyeUp", "X": 0.38, "Y": 0.38},
                {"Type": "leftEyeDown", "X": 0.38, "Y": 0.42},
                {"Type": "rightEyeLeft", "X": 0.57, "Y": 0.40},
                {"Type": "rightEyeRight", "X": 0.67, "Y": 0.40},
                {"Type": "rightEyeUp", "X": 0.62, "Y": 0.38},
                {"Type": "rightEyeDown", "X": 0.62, "Y": 0.42},
                {"Type": "midJawlineLeft", "X": 0.28, "Y": 0.66},
                {"Type": "midJawlineRight", "X": 0.72, "Y": 0.66},
                {"Type": "chinBottom", "X": 0.50, "Y": 0.80}
            ],
            "Pose": {"Yaw": 2.0, "Pitch": 0.0, "Roll": 0.0},
            "AgeRange": {"Low": 25, "High": 35},
            "MouthOpen": {"Value": false}
        }]
    }"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        images: PathBuf,
        faces: PathBuf,
        output: PathBuf,
        catalog: Arc<Catalog>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let (images, faces, assets, output) =
            (root.join("images"), root.join("faces"), root.join("assets"), root.join("out"));
        for d in [&images, &faces, &assets, &output] {
            std::fs::create_dir(d).unwrap();
        }
        RgbaImage::from_pixel(10, 6, Rgba([200, 0, 0, 255]))
            .save(assets.join("stud.png"))
            .unwrap();

        let catalog = Catalog::from_toml_str(
            r#"
            [[accessory]]
            name = "stud"
            category = "other"
            probability = 1.0
            direction = "symmetry"
            skip_skin_check = true
            regions = ["nose"]
            left = { path = "stud.png" }
            "#,
            &assets,
            adorn_io::catalog::probe_dimensions,
        )
        .unwrap();

        Fixture {
            _dir: dir,
            images,
            faces,
            output,
            catalog: Arc::new(catalog),
        }
    }

    fn add_avatar(fx: &Fixture, stem: &str, face_json: Option<&str>) -> PathBuf {
        let path = fx.images.join(format!("{stem}.png"));
        RgbaImage::from_pixel(100, 100, SKIN).save(&path).unwrap();
        if let Some(json) = face_json {
            std::fs::write(fx.faces.join(format!("{stem}.json")), json).unwrap();
        }
        path
    }

    fn test_config() -> Config {
        Config {
            concurrency: 2,
            batch_delay: Duration::ZERO,
            retries: 0,
            seed: Some(7),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_affect_siblings() {
        let fx = fixture();
        let good = add_avatar(&fx, "0001", Some(FACE_JSON));
        let no_face_data = add_avatar(&fx, "0002", None);
        let bad_json = add_avatar(&fx, "0003", Some(r#"{"FaceDetails": []}"#));
        let good_too = add_avatar(&fx, "0004", Some(FACE_JSON));

        let units = pair_with_face_data(vec![good, no_face_data, bad_json, good_too], &fx.faces);
        let engine = Engine::new(&test_config(), Arc::clone(&fx.catalog), fx.output.clone());
        let report = engine.run(units).await;

        assert_eq!(report.count, 4);
        let mut succeeded = report.succeeded.clone();
        succeeded.sort();
        assert_eq!(succeeded, vec!["0001", "0004"]);
        assert_eq!(report.failures.keys().collect::<Vec<_>>(), vec!["0002", "0003"]);

        for id in ["0001", "0004"] {
            assert_eq!(report.placements[id].get(Region::Nose), Some("stud"));
            assert!(fx.output.join(format!("{id}.png")).is_file());
        }
        assert!(!fx.output.join("0002.png").exists());
    }

    #[tokio::test]
    async fn test_sticker_composited_at_nose() {
        let fx = fixture();
        let avatar = add_avatar(&fx, "avatar", Some(FACE_JSON));
        let units = pair_with_face_data(vec![avatar], &fx.faces);
        let report = Engine::new(&test_config(), Arc::clone(&fx.catalog), fx.output.clone())
            .run(units)
            .await;
        assert_eq!(report.succeeded, vec!["avatar"]);

        let out = image::open(fx.output.join("avatar.png")).unwrap().into_rgba8();
        // nose (50, 52); 10×6 sticker centered → covers x 45..55, y 49..55.
        assert_eq!(*out.get_pixel(50, 52), Rgba([200, 0, 0, 255]));
        assert_eq!(*out.get_pixel(44, 52), SKIN);
    }

    #[tokio::test]
    async fn test_shared_stem_fails_later_image() {
        let fx = fixture();
        let jpg = fx.images.join("dup.jpg");
        image::RgbImage::from_pixel(100, 100, image::Rgb([224, 172, 105]))
            .save(&jpg)
            .unwrap();
        let png = add_avatar(&fx, "dup", Some(FACE_JSON));

        let units = pair_with_face_data(vec![jpg, png], &fx.faces);
        let report = Engine::new(&test_config(), Arc::clone(&fx.catalog), fx.output.clone())
            .run(units)
            .await;

        assert_eq!(report.count, 2);
        assert_eq!(report.succeeded, vec!["dup"]);
        assert_eq!(report.failures.keys().collect::<Vec<_>>(), vec!["dup.png"]);
        assert!(report.failures["dup.png"].contains("already used"));
        assert_eq!(report.succeeded.len() + report.failures.len(), report.count);
        assert!(fx.output.join("dup.jpg").is_file());
        assert!(!fx.output.join("dup.png").exists());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let fx = fixture();
        let report = Engine::new(&test_config(), Arc::clone(&fx.catalog), fx.output.clone())
            .run(Vec::new())
            .await;
        assert_eq!(report, BatchReport::new(0));
    }

    fn interrupted() -> IoError {
        IoError::Fs {
            path: PathBuf::from("/in/avatar.png"),
            source: std::io::Error::from(std::io::ErrorKind::Interrupted),
        }
    }

    #[test]
    fn test_retries_transient_errors_only() {
        let calls = AtomicU32::new(0);
        let result = with_retries(2, Duration::ZERO, || {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(interrupted())
            } else {
                Ok(5)
            }
        });
        assert_eq!(result.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(5, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(IoError::NoImages(PathBuf::from("/nowhere")))
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_image_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            canvas::load_image(Path::new("/missing/avatar.png")).map(|_| ())
        });
        assert!(matches!(result, Err(IoError::Image { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retries_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(1, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(interrupted())
        });
        assert!(matches!(result, Err(IoError::Fs { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
