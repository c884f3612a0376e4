// src/batch.rs - Parallel curvature batch over a directory of images

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::aggregate::ImageSummary;
use crate::config::{Config, FailurePolicy};
use crate::errors::{FiberMorphError, Result};
use crate::image_io::{find_images_in_dir, image_id, load_image, probe_image};
use crate::output::{summary_file_name, write_summary_csv};
use crate::pipeline::{process_image, OutputLayout};

/// Receives job lifecycle events from the worker threads
pub trait ProgressSink: Send + Sync {
    /// Called once, after the pre-flight checks passed
    fn batch_started(&self, _total: usize) {}
    fn job_started(&self, id: &str);
    fn job_finished(&self, id: &str, success: bool);
}

/// Logs `[done/total]` as jobs complete
#[derive(Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
    failed: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn batch_started(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    fn job_started(&self, id: &str) {
        log::debug!("Started {}", id);
    }

    fn job_finished(&self, id: &str, success: bool) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        if success {
            log::info!("[{}/{}] {}", done, total, id);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!("[{}/{}] {} failed", done, total, id);
        }
    }
}

/// A job that did not produce a summary row
#[derive(Debug)]
pub struct JobFailure {
    pub id: String,
    pub path: PathBuf,
    pub reason: FiberMorphError,
}

/// Outcome of a completed batch
#[derive(Debug)]
pub struct BatchReport {
    /// Summary rows sorted by image id
    pub rows: Vec<ImageSummary>,
    pub failures: Vec<JobFailure>,
    pub summary_path: PathBuf,
}

/// Matching images under `dir`, recursively and sorted; none is an error
pub fn discover_images<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let files = find_images_in_dir(dir, extension)?;
    if files.is_empty() {
        return Err(FiberMorphError::NoImagesFound {
            dir: dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        });
    }
    Ok(files)
}

/// Pair every file with its id, rejecting ids used twice
pub fn assign_ids(files: &[PathBuf]) -> Result<Vec<(String, PathBuf)>> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    let mut jobs = Vec::with_capacity(files.len());

    for path in files {
        let id = image_id(path)?;
        if let Some(first) = seen.get(&id) {
            return Err(FiberMorphError::DuplicateImageId {
                id,
                first: first.to_path_buf(),
                second: path.clone(),
            });
        }
        seen.insert(id.clone(), path);
        jobs.push((id, path.clone()));
    }

    Ok(jobs)
}

/// Run the curvature pipeline on every image of the input directory
pub fn run_batch(config: &Config, sink: &dyn ProgressSink) -> Result<BatchReport> {
    config.validate()?;

    // Everything that can fail before dispatch fails here
    let files = discover_images(&config.input_directory, &config.file_type)?;
    let jobs = assign_ids(&files)?;
    for (_, path) in &jobs {
        probe_image(path)?;
    }
    log::info!("Found {} images in {}", jobs.len(), config.input_directory);
    sink.batch_started(jobs.len());

    let layout = OutputLayout::create(&config.output_directory, config)?;
    config.save_to_file(layout.root.join("config_used.toml"))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()?;
    log::debug!("Running on {} worker threads", config.jobs);

    let outcomes: Vec<(String, PathBuf, Result<ImageSummary>)> = pool.install(|| {
        jobs.par_iter()
            .map(|(id, path)| {
                sink.job_started(id);
                let result = load_image(path).and_then(|image| process_image(image, config, &layout));
                sink.job_finished(id, result.is_ok());
                (id.clone(), path.clone(), result)
            })
            .collect()
    });

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (id, path, result) in outcomes {
        match result {
            Ok(row) => rows.push(row),
            Err(reason) => {
                log::warn!("Failed to process {}: {}", path.display(), reason);
                failures.push(JobFailure { id, path, reason });
            }
        }
    }

    if !failures.is_empty() && config.failure_policy == FailurePolicy::Abort {
        return Err(FiberMorphError::JobsFailed {
            failed: failures.len(),
            total: jobs.len(),
        });
    }

    rows.sort_by(|a, b| a.id.cmp(&b.id));

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let summary_path = write_summary_csv(&rows, layout.root.join(summary_file_name(&timestamp)))?;

    Ok(BatchReport {
        rows,
        failures,
        summary_path,
    })
}
