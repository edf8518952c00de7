// tests/integration_tests.rs
use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use imgdups::grouping::group_pairs;
use imgdups::histogram;
use imgdups::scorer::{diff, score_pair};
use imgdups::{
    find, BinCount, CancelToken, ChannelProgress, DuplicateFinder, FindResult, FinderOptions,
    Histogram, ImageRecord, NoProgress, ProgressUpdate, DEFAULT_THRESHOLD,
};

const IMAGE_SIZE: u32 = 32;

struct TestEnv {
    dir: TempDir,
    rng: StdRng,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            rng: StdRng::seed_from_u64(0x1ab5),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn solid_jpeg(&self, name: &str, color: [u8; 3]) -> PathBuf {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb(color))
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();
        path
    }

    /// Random noise; two of these are far apart at any sane threshold.
    fn noise_jpeg(&mut self, name: &str) -> PathBuf {
        let path = self.root().join(name);
        let rng = &mut self.rng;
        RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |_, _| Rgb(rng.gen::<[u8; 3]>()))
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();
        path
    }

    fn corrupt_file(&self, name: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, b"\xff\xd8 not really a jpeg").unwrap();
        path
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap()
}

fn partition(result: &FindResult) -> Vec<Vec<PathBuf>> {
    result
        .groups
        .iter()
        .map(|g| g.paths().map(Path::to_path_buf).collect())
        .collect()
}

fn histogram_with_red_bin(count: u64) -> Arc<Histogram> {
    let mut red = vec![0u64; 256];
    red[0] = count;
    Arc::new(Histogram::from_channels(red, vec![0; 256], vec![0; 256]).unwrap())
}

#[test]
fn test_identical_images_form_one_group() -> Result<()> {
    let env = TestEnv::new();
    let a = env.solid_jpeg("a.jpg", [120, 60, 30]);
    let b = env.solid_jpeg("nested/b.jpg", [120, 60, 30]);
    let c = env.solid_jpeg("nested/deeper/c.jpeg", [120, 60, 30]);

    let result = find(env.root(), DEFAULT_THRESHOLD, &NoProgress, &CancelToken::new())?;

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.len(), 3);
    for path in [&a, &b, &c] {
        assert!(group.contains(&canonical(path)));
    }
    assert_eq!(group.representative().unwrap().path(), canonical(&a));
    assert_eq!(group.marked_for_removal().count(), 2);
    assert!(result.failed.is_empty());
    Ok(())
}

#[test]
fn test_corrupt_file_is_reported_not_fatal() -> Result<()> {
    let env = TestEnv::new();
    env.solid_jpeg("one.jpg", [10, 200, 10]);
    env.solid_jpeg("two.jpg", [10, 200, 10]);
    let bad = env.corrupt_file("broken.jpg");

    let result = find(env.root(), DEFAULT_THRESHOLD, &NoProgress, &CancelToken::new())?;

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
    assert!(!result.groups[0].contains(&canonical(&bad)));
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].path(), canonical(&bad));
    assert!(result.failed[0].error().is_some());
    Ok(())
}

#[test]
fn test_distinct_images_are_not_grouped() -> Result<()> {
    let mut env = TestEnv::new();
    for i in 0..4 {
        env.noise_jpeg(&format!("noise_{}.jpg", i));
    }
    env.solid_jpeg("white.jpg", [255, 255, 255]);

    let result = find(env.root(), 1_000, &NoProgress, &CancelToken::new())?;
    assert!(result.groups.is_empty());
    assert!(result.failed.is_empty());
    Ok(())
}

#[test]
fn test_cancel_before_start_returns_empty() -> Result<()> {
    let env = TestEnv::new();
    env.solid_jpeg("a.jpg", [1, 2, 3]);
    env.solid_jpeg("b.jpg", [1, 2, 3]);

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = find(env.root(), DEFAULT_THRESHOLD, &NoProgress, &cancel)?;
    assert!(result.is_empty());
    Ok(())
}

#[test]
fn test_empty_directory() -> Result<()> {
    let env = TestEnv::new();
    let seen = std::sync::Mutex::new(Vec::new());
    let sink = |percent: u8, _label: &str| seen.lock().unwrap().push(percent);

    let result = find(env.root(), DEFAULT_THRESHOLD, &sink, &CancelToken::new())?;
    assert!(result.is_empty());
    // Both phases still announce themselves
    assert_eq!(seen.into_inner().unwrap(), vec![0, 0]);
    Ok(())
}

#[test]
fn test_threshold_is_strict() -> Result<()> {
    let below = score_pair(
        &ImageRecord::with_histogram("a.jpg".into(), histogram_with_red_bin(5_000_000)),
        &ImageRecord::with_histogram("b.jpg".into(), histogram_with_red_bin(0)),
    );
    assert_eq!(below.diff, 5_000_000);
    assert!(below.is_below(DEFAULT_THRESHOLD));
    let groups = group_pairs(&[below]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);

    let at = score_pair(
        &ImageRecord::with_histogram("a.jpg".into(), histogram_with_red_bin(10_000_000)),
        &ImageRecord::with_histogram("b.jpg".into(), histogram_with_red_bin(0)),
    );
    assert_eq!(at.diff, 10_000_000);
    assert!(!at.is_below(DEFAULT_THRESHOLD));
    let retained: Vec<_> = [at].into_iter().filter(|p| p.is_below(DEFAULT_THRESHOLD)).collect();
    assert!(group_pairs(&retained).is_empty());
    Ok(())
}

#[test]
fn test_threshold_boundary_end_to_end() -> Result<()> {
    let env = TestEnv::new();
    let a = env.solid_jpeg("a.jpg", [100, 100, 100]);
    let b = env.solid_jpeg("b.jpg", [140, 100, 100]);

    let bins = BinCount::default();
    let ha = histogram::extract(&a, bins);
    let hb = histogram::extract(&b, bins);
    let d = diff(ha.histogram().unwrap(), hb.histogram().unwrap());

    let at = find(env.root(), d, &NoProgress, &CancelToken::new())?;
    assert!(at.groups.is_empty());

    let above = find(env.root(), d + 1, &NoProgress, &CancelToken::new())?;
    assert_eq!(above.groups.len(), 1);
    assert_eq!(above.groups[0].len(), 2);
    Ok(())
}

#[test]
fn test_repeated_runs_agree() -> Result<()> {
    let mut env = TestEnv::new();
    for i in 0..3 {
        env.solid_jpeg(&format!("red_{}.jpg", i), [220, 20, 20]);
        env.solid_jpeg(&format!("blue_{}.jpg", i), [20, 20, 220]);
    }
    env.noise_jpeg("noise.jpg");

    let options = FinderOptions {
        threshold: 100,
        ..FinderOptions::default()
    };
    let first = DuplicateFinder::new(options.clone()).find(env.root(), &NoProgress, &CancelToken::new())?;
    let second = DuplicateFinder::new(FinderOptions {
        parallel: Some(1),
        ..options
    })
    .find(env.root(), &NoProgress, &CancelToken::new())?;

    assert_eq!(first.groups.len(), 2);
    assert_eq!(partition(&first), partition(&second));
    for group in &first.groups {
        assert_eq!(group.len(), 3);
        let keep = group.representative().unwrap().path();
        assert!(group.paths().all(|p| p >= keep));
    }
    Ok(())
}

#[test]
fn test_extension_filter() -> Result<()> {
    let env = TestEnv::new();
    env.solid_jpeg("a.jpg", [50, 50, 50]);
    let png = env.root().join("b.png");
    RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb([50, 50, 50])).save_with_format(&png, ImageFormat::Png)?;

    let default = find(env.root(), DEFAULT_THRESHOLD, &NoProgress, &CancelToken::new())?;
    assert!(default.groups.is_empty());

    let with_png = DuplicateFinder::new(FinderOptions {
        extensions: vec!["jpg".into(), "png".into()],
        ..FinderOptions::default()
    })
    .find(env.root(), &NoProgress, &CancelToken::new())?;
    assert_eq!(with_png.groups.len(), 1);
    Ok(())
}

#[test]
fn test_channel_progress_sends_one_message_per_distinct_update() -> Result<()> {
    let env = TestEnv::new();
    for i in 0..60 {
        env.solid_jpeg(&format!("img_{:02}.jpg", i), [i as u8, 40, 80]);
    }

    let (tx, rx) = crossbeam_channel::unbounded::<ProgressUpdate>();
    let sink = ChannelProgress::new(tx);
    find(env.root(), DEFAULT_THRESHOLD, &sink, &CancelToken::new())?;
    drop(sink);

    let updates: Vec<ProgressUpdate> = rx.iter().collect();
    // 60 files and 1770 pairs, but at most 0..=100 per phase
    assert!(updates.len() <= 2 * 101);
    assert!(updates.windows(2).all(|w| w[0] != w[1]));
    assert_eq!(updates.last().map(|u| u.percent), Some(100));
    Ok(())
}
