//! Background image decoding: RGBA8 normalization, EXIF orientation and
//! capture-date extraction, and the worker pool that services decode
//! requests off the display thread.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error;

/// Per-file decode failure, recorded on the request that asked for it.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("decode queue is shut down")]
    Shutdown,
}

pub type DecodeResult = Result<DecodedImage, DecodeError>;

/// An image normalized to RGBA8 with opaque alpha, oriented for display.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// Capture time from EXIF `DateTimeOriginal`, falling back to the file's
    /// last-modified timestamp.
    pub taken_at: Option<NaiveDateTime>,
    /// EXIF orientation code (1..=8) that was applied.
    pub orientation: u8,
}

enum JobState {
    Pending,
    Done(DecodeResult),
    Taken,
}

struct JobInner {
    path: PathBuf,
    state: Mutex<JobState>,
    done: Condvar,
}

/// One decode request. Cloning shares the request; the result can be taken
/// exactly once, which hands the decoded pixels to the owning slide slot.
#[derive(Clone)]
pub struct DecodeJob(Arc<JobInner>);

impl DecodeJob {
    pub fn new(path: PathBuf) -> Self {
        Self(Arc::new(JobInner {
            path,
            state: Mutex::new(JobState::Pending),
            done: Condvar::new(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn is_done(&self) -> bool {
        !matches!(
            *self.0.state.lock().expect("decode job poisoned"),
            JobState::Pending
        )
    }

    /// Take the result if the decode has finished. `None` while pending or
    /// after the result was already taken.
    pub fn try_take(&self) -> Option<DecodeResult> {
        let mut state = self.0.state.lock().expect("decode job poisoned");
        match std::mem::replace(&mut *state, JobState::Taken) {
            JobState::Pending => {
                *state = JobState::Pending;
                None
            }
            JobState::Done(result) => Some(result),
            JobState::Taken => None,
        }
    }

    /// Block until the decode finishes, then take the result. Used only when
    /// priming the very first slide; steady-state consumers poll.
    pub fn wait_take(&self) -> Option<DecodeResult> {
        let mut state = self.0.state.lock().expect("decode job poisoned");
        loop {
            match std::mem::replace(&mut *state, JobState::Taken) {
                JobState::Pending => {
                    *state = JobState::Pending;
                    state = self.0.done.wait(state).expect("decode job poisoned");
                }
                JobState::Done(result) => return Some(result),
                JobState::Taken => return None,
            }
        }
    }

    fn fulfill(&self, result: DecodeResult) {
        let mut state = self.0.state.lock().expect("decode job poisoned");
        *state = JobState::Done(result);
        self.0.done.notify_all();
    }
}

/// Cloneable submission side of the decode queue.
#[derive(Clone)]
pub struct DecodeHandle {
    tx: Sender<DecodeJob>,
}

impl DecodeHandle {
    /// Enqueue a request, fire-and-forget. If the pool has shut down the job
    /// is fulfilled with [`DecodeError::Shutdown`] so waiters never hang.
    pub fn submit(&self, job: &DecodeJob) {
        if self.tx.send(job.clone()).is_err() {
            job.fulfill(Err(DecodeError::Shutdown));
        }
    }
}

/// A fixed set of worker threads consuming a shared FIFO request queue.
///
/// Requests are serviced FIFO per worker; with several workers, completion
/// order across requests is not guaranteed. Dropping the pool closes the
/// queue and joins the workers; in-flight decodes finish, they are never
/// aborted mid-operation.
pub struct DecodePool {
    tx: Option<Sender<DecodeJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl DecodePool {
    /// Spawn the worker threads. A failed spawn is reported to the caller;
    /// any workers already running exit once the queue sender is dropped.
    pub fn new(worker_count: usize) -> Result<Self, error::Error> {
        let (tx, rx) = unbounded::<DecodeJob>();
        let mut workers = Vec::with_capacity(worker_count.max(1));
        for i in 0..worker_count.max(1) {
            let rx = rx.clone();
            let worker = std::thread::Builder::new()
                .name(format!("decode-{i}"))
                .spawn(move || worker_loop(&rx))
                .map_err(error::Error::Io)?;
            workers.push(worker);
        }
        Ok(Self {
            tx: Some(tx),
            workers,
        })
    }

    pub fn handle(&self) -> DecodeHandle {
        DecodeHandle {
            tx: self.tx.as_ref().expect("pool already shut down").clone(),
        }
    }
}

impl Drop for DecodePool {
    fn drop(&mut self) {
        drop(self.tx.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(rx: &Receiver<DecodeJob>) {
    while let Ok(job) = rx.recv() {
        let result = decode_slide(job.path());
        match &result {
            Ok(image) => debug!(
                path = %job.path().display(),
                width = image.width,
                height = image.height,
                orientation = image.orientation,
                "decoded slide"
            ),
            Err(error) => warn!(path = %job.path().display(), %error, "decode failed"),
        }
        job.fulfill(result);
    }
    debug!("decode worker exiting");
}

/// Decode an image to RGBA8 with opaque alpha and EXIF orientation applied.
pub fn decode_slide(path: &Path) -> DecodeResult {
    let reader = image::ImageReader::open(path)
        .map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let decoded = reader.decode().map_err(|source| DecodeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rgba = decoded.to_rgba8();
    for px in rgba.pixels_mut() {
        px.0[3] = 0xFF;
    }

    let meta = read_metadata(path);
    let rgba = apply_orientation(rgba, meta.orientation);
    let (width, height) = rgba.dimensions();
    let taken_at = meta.taken_at.or_else(|| modified_time(path));
    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
        taken_at,
        orientation: meta.orientation,
    })
}

/// Map an EXIF orientation code onto the transpose/rotate sequence that
/// brings the image upright. Rotations are clockwise.
pub(crate) fn apply_orientation(img: RgbaImage, orientation: u8) -> RgbaImage {
    use image::imageops;
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

struct SlideMeta {
    orientation: u8,
    taken_at: Option<NaiveDateTime>,
}

fn read_metadata(path: &Path) -> SlideMeta {
    let mut meta = SlideMeta {
        orientation: 1,
        taken_at: None,
    };
    let Ok(file) = fs::File::open(path) else {
        return meta;
    };
    let mut reader = BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return meta;
    };
    if let Some(field) = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        if let Some(value) = field.value.get_uint(0) {
            if (1..=8).contains(&value) {
                meta.orientation = value as u8;
            }
        }
    }
    if let Some(field) = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY) {
        if let exif::Value::Ascii(ref lines) = field.value {
            if let Some(Ok(text)) = lines.first().map(|bytes| std::str::from_utf8(bytes)) {
                meta.taken_at = parse_exif_datetime(text);
            }
        }
    }
    meta
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp. The all-zero sentinel some
/// cameras write for "unknown" is treated as absent.
pub(crate) fn parse_exif_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.starts_with("0000") {
        return None;
    }
    NaiveDateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S").ok()
}

fn modified_time(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(chrono::DateTime::<chrono::Local>::from(modified).naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::Rgba;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded.
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    const A: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const B: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const C: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const D: Rgba<u8> = Rgba([255, 255, 0, 255]);

    fn square() -> RgbaImage {
        // A B
        // C D
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, A);
        img.put_pixel(1, 0, B);
        img.put_pixel(0, 1, C);
        img.put_pixel(1, 1, D);
        img
    }

    fn grid(img: &RgbaImage) -> [Rgba<u8>; 4] {
        [
            *img.get_pixel(0, 0),
            *img.get_pixel(1, 0),
            *img.get_pixel(0, 1),
            *img.get_pixel(1, 1),
        ]
    }

    #[test]
    fn orientation_one_is_identity() {
        assert_eq!(grid(&apply_orientation(square(), 1)), [A, B, C, D]);
    }

    #[test]
    fn orientation_codes_are_distinct_transforms() {
        let expected: [[Rgba<u8>; 4]; 8] = [
            [A, B, C, D], // 1 identity
            [B, A, D, C], // 2 horizontal flip
            [D, C, B, A], // 3 rotate 180
            [C, D, A, B], // 4 vertical flip
            [A, C, B, D], // 5 transpose
            [C, A, D, B], // 6 rotate 90 CW
            [D, B, C, A], // 7 anti-transpose
            [B, D, A, C], // 8 rotate 270 CW
        ];
        let mut seen = Vec::new();
        for code in 1..=8u8 {
            let got = grid(&apply_orientation(square(), code));
            assert_eq!(got, expected[code as usize - 1], "orientation {code}");
            assert!(!seen.contains(&got), "orientation {code} duplicates another");
            seen.push(got);
        }
    }

    #[test]
    fn exif_datetime_parses_and_rejects_sentinel() {
        let parsed = parse_exif_datetime("2021:05:06 07:08:09").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2021-05-06 07:08:09");
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("not a date").is_none());
        assert!(parse_exif_datetime("2021:05:06 07:08:09\0").is_some());
    }

    #[test]
    fn decode_applies_orientation_and_falls_back_to_mtime() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();

        let image = decode_slide(&path).unwrap();
        assert_eq!((image.width, image.height), (1, 2));
        assert_eq!(image.orientation, 6);
        // No DateTimeOriginal in the fixture: mtime fallback applies.
        assert!(image.taken_at.is_some());
    }

    #[test]
    fn decode_forces_opaque_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translucent.png");
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(1, 0, Rgba([40, 50, 60, 128]));
        img.save(&path).unwrap();

        let image = decode_slide(&path).unwrap();
        assert!(image.pixels.chunks(4).all(|px| px[3] == 0xFF));
    }

    #[test]
    fn decode_reports_open_and_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");
        assert!(matches!(
            decode_slide(&missing),
            Err(DecodeError::Open { .. })
        ));

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"not an image at all").unwrap();
        assert!(matches!(
            decode_slide(&garbage),
            Err(DecodeError::Decode { .. })
        ));
    }

    #[test]
    fn pool_fulfills_jobs_and_results_match_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        RgbaImage::from_pixel(1, 1, A).save(&good).unwrap();
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"junk").unwrap();

        let pool = DecodePool::new(2).unwrap();
        let handle = pool.handle();
        let good_job = DecodeJob::new(good);
        let bad_job = DecodeJob::new(bad);
        handle.submit(&good_job);
        handle.submit(&bad_job);

        assert!(good_job.wait_take().unwrap().is_ok());
        assert!(bad_job.wait_take().unwrap().is_err());
        // A result can be taken exactly once.
        assert!(good_job.try_take().is_none());
    }

    #[test]
    fn pool_creation_is_fallible_and_clamps_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        RgbaImage::from_pixel(1, 1, A).save(&path).unwrap();

        // Zero workers still yields one usable thread; spawn problems come
        // back as an error instead of unwinding.
        let pool = DecodePool::new(0).unwrap();
        let job = DecodeJob::new(path);
        pool.handle().submit(&job);
        assert!(job.wait_take().unwrap().is_ok());
    }

    #[test]
    fn submit_after_shutdown_fulfills_with_error() {
        let pool = DecodePool::new(1).unwrap();
        let handle = pool.handle();
        drop(pool);
        let job = DecodeJob::new(PathBuf::from("x.jpg"));
        handle.submit(&job);
        assert!(matches!(
            job.wait_take(),
            Some(Err(DecodeError::Shutdown))
        ));
    }
}
