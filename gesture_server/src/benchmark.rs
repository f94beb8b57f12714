//! Latency statistics of model runs over an image dataset.
//!
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Result};
use itertools::{Itertools, MinMaxResult};

use crate::nn::Timings;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Image files directly inside `dir`, sorted by path.
pub fn dataset_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .sorted()
        .collect();

    if images.is_empty() {
        bail!("no images found in {}", dir.display());
    }

    Ok(images)
}

/// Measurement of a single image.
#[derive(Clone, Copy, Debug)]
pub struct Run {
    pub timings: Timings,
    pub detections: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub images: usize,
    pub mean: Timings,
    pub min_inference: Duration,
    pub max_inference: Duration,
    pub detections: usize,
}

impl Summary {
    /// Summarize a set of runs, `None` if there are none.
    pub fn from_runs(runs: &[Run]) -> Option<Self> {
        let (min_inference, max_inference) =
            match runs.iter().map(|run| run.timings.inference).minmax() {
                MinMaxResult::NoElements => return None,
                MinMaxResult::OneElement(inference) => (inference, inference),
                MinMaxResult::MinMax(min, max) => (min, max),
            };

        let images = runs.len();
        let count = images as u32;
        let mean = Timings {
            preprocess: runs.iter().map(|run| run.timings.preprocess).sum::<Duration>() / count,
            inference: runs.iter().map(|run| run.timings.inference).sum::<Duration>() / count,
            postprocess: runs.iter().map(|run| run.timings.postprocess).sum::<Duration>() / count,
        };

        Some(Self {
            images,
            mean,
            min_inference,
            max_inference,
            detections: runs.iter().map(|run| run.detections).sum(),
        })
    }

    /// Images per second over all stages.
    pub fn throughput(&self) -> f64 {
        match self.mean.total().as_secs_f64() {
            secs if secs > 0.0 => 1.0 / secs,
            _ => 0.0,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "images       {:>10}", self.images)?;
        writeln!(f, "preprocess   {:>10.2} ms", millis(self.mean.preprocess))?;
        writeln!(
            f,
            "inference    {:>10.2} ms (min {:.2} ms, max {:.2} ms)",
            millis(self.mean.inference),
            millis(self.min_inference),
            millis(self.max_inference)
        )?;
        writeln!(f, "postprocess  {:>10.2} ms", millis(self.mean.postprocess))?;
        writeln!(f, "throughput   {:>10.2} images/s", self.throughput())?;
        write!(f, "detections   {:>10}", self.detections)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn run(preprocess_ms: u64, inference_ms: u64, detections: usize) -> Run {
        Run {
            timings: Timings {
                preprocess: Duration::from_millis(preprocess_ms),
                inference: Duration::from_millis(inference_ms),
                postprocess: Duration::from_millis(1),
            },
            detections,
        }
    }

    #[test]
    fn summary_of_runs() {
        let summary = Summary::from_runs(&[run(2, 10, 1), run(4, 30, 0), run(3, 20, 2)]).unwrap();

        assert_eq!(summary.images, 3);
        assert_eq!(summary.mean.preprocess, Duration::from_millis(3));
        assert_eq!(summary.mean.inference, Duration::from_millis(20));
        assert_eq!(summary.min_inference, Duration::from_millis(10));
        assert_eq!(summary.max_inference, Duration::from_millis(30));
        assert_eq!(summary.detections, 3);
        // 24 ms per image
        assert!((summary.throughput() - 1000.0 / 24.0).abs() < 1e-6);

        let report = summary.to_string();
        assert!(report.contains("inference         20.00 ms (min 10.00 ms, max 30.00 ms)"));
    }

    #[test]
    fn no_runs_no_summary() {
        assert_eq!(Summary::from_runs(&[]), None);
    }

    #[test]
    fn dataset_lists_images_only() -> Result<()> {
        let dir = std::env::temp_dir().join("gesture_server_benchmark_dataset");
        std::fs::create_dir_all(&dir)?;
        for name in ["b.jpg", "a.PNG", "labels.txt"] {
            std::fs::write(dir.join(name), b"")?;
        }

        let images = dataset_images(&dir)?;
        let names: Vec<_> = images
            .iter()
            .filter_map(|path| path.file_name()?.to_str())
            .collect();
        assert_eq!(names, ["a.PNG", "b.jpg"]);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
