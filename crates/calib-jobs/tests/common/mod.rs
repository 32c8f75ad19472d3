#![allow(dead_code)]

use calib_jobs::core::{Correspondence, RefineParams};
use calib_jobs::{
    BoardSize, CalibrationFitter, CalibrationRunner, CameraFit, FitError, FitRequest, ImageSize,
    ImageSource, MemoryStore, ObjectStore, PointExtractor, RunStore, StorageError,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use nalgebra::{Matrix3, Point2};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn encode_png(img: GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// Checker pattern; the fake extractor "finds" a board in any non-uniform image.
pub fn board_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(GrayImage::from_fn(width, height, |x, y| {
        if ((x / 10) + (y / 10)) % 2 == 0 {
            Luma([20u8])
        } else {
            Luma([235u8])
        }
    }))
}

/// A uniformly black frame: no corners to find.
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(GrayImage::new(width, height))
}

pub fn payload(run_id: &str, dataset: &str, board: [u32; 2], images: &[&str]) -> String {
    serde_json::json!({
        "metadata": {
            "run_id": run_id,
            "dataset": dataset,
            "checkerboard_size": board,
        },
        "images": images,
    })
    .to_string()
}

/// Reports a regular grid of `board.corner_count()` corners unless the image
/// is uniform. Records every refinement request it receives.
#[derive(Debug, Default)]
pub struct FakeExtractor {
    pub refine_calls: Mutex<Vec<RefineParams>>,
}

impl PointExtractor for FakeExtractor {
    fn detect_corners(&self, image: &GrayImage, board: BoardSize) -> Option<Vec<Point2<f32>>> {
        let first = image.pixels().next()?;
        if image.pixels().all(|p| p == first) {
            return None;
        }
        let step_x = image.width() as f32 / (board.width + 1) as f32;
        let step_y = image.height() as f32 / (board.height + 1) as f32;
        Some(
            (0..board.height)
                .flat_map(|r| {
                    (0..board.width).map(move |c| {
                        Point2::new(step_x * (c + 1) as f32, step_y * (r + 1) as f32)
                    })
                })
                .collect(),
        )
    }

    fn refine_corners(
        &self,
        _image: &GrayImage,
        corners: &mut [Point2<f32>],
        params: &RefineParams,
    ) {
        for c in corners.iter_mut() {
            c.x += 0.25;
        }
        self.refine_calls.lock().expect("lock").push(*params);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitMode {
    #[default]
    Succeed,
    NotConverged,
    NonFinite,
}

/// Returns a pinhole guess derived from the image size and keeps a copy of
/// every request.
#[derive(Debug, Default)]
pub struct FakeFitter {
    pub mode: FitMode,
    pub seen_views: Mutex<Vec<Vec<Correspondence>>>,
    pub seen_sizes: Mutex<Vec<ImageSize>>,
}

impl FakeFitter {
    pub fn failing(mode: FitMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.seen_sizes.lock().expect("lock").len()
    }
}

impl CalibrationFitter for FakeFitter {
    fn fit(&self, request: &FitRequest<'_>) -> Result<CameraFit, FitError> {
        self.seen_views
            .lock()
            .expect("lock")
            .push(request.views.to_vec());
        self.seen_sizes.lock().expect("lock").push(request.image_size);

        let w = request.image_size.width as f64;
        let h = request.image_size.height as f64;
        let f = match self.mode {
            FitMode::Succeed => w,
            FitMode::NotConverged => return Err(FitError::NotConverged),
            FitMode::NonFinite => f64::NAN,
        };
        Ok(CameraFit {
            camera_matrix: Matrix3::new(f, 0.0, w / 2.0, 0.0, f, h / 2.0, 0.0, 0.0, 1.0),
            dist: vec![0.0; 5],
        })
    }
}

/// Counts fetches before delegating to an inner store.
#[derive(Debug)]
pub struct CountingSource<S = MemoryStore> {
    pub inner: Arc<S>,
    pub fetches: AtomicUsize,
}

impl<S: ObjectStore> CountingSource<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<S: ObjectStore> ImageSource for CountingSource<S> {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }
}

/// Fails every fetch whose key contains `broken`.
#[derive(Debug)]
pub struct FlakySource {
    pub inner: Arc<MemoryStore>,
    pub broken: String,
}

impl ImageSource for FlakySource {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        if key.contains(&self.broken) {
            return Err(StorageError::Unavailable(format!("timeout reading {key}")));
        }
        self.inner.get(key)
    }
}

/// A runner over one in-memory store used for both images and artifacts.
pub struct Harness {
    pub objects: Arc<MemoryStore>,
    pub extractor: Arc<FakeExtractor>,
    pub fitter: Arc<FakeFitter>,
    pub runner: CalibrationRunner,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fitter(FakeFitter::default())
    }

    pub fn with_fitter(fitter: FakeFitter) -> Self {
        let objects = Arc::new(MemoryStore::new());
        Self::with_source(objects.clone(), objects, fitter)
    }

    pub fn with_source(
        objects: Arc<MemoryStore>,
        source: Arc<dyn ImageSource>,
        fitter: FakeFitter,
    ) -> Self {
        let extractor = Arc::new(FakeExtractor::default());
        let fitter = Arc::new(fitter);
        let runner = CalibrationRunner::new(
            source,
            extractor.clone(),
            fitter.clone(),
            Arc::new(RunStore::new(objects.clone())),
        );
        Self {
            objects,
            extractor,
            fitter,
            runner,
        }
    }

    pub fn add_image(&self, key: &str, bytes: Vec<u8>) {
        self.objects.insert(key, bytes);
    }

    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.objects
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }
}
