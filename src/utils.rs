use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Build the rayon pool the conversion runs on.
///
/// `None` lets rayon pick one thread per CPU.
pub fn create_worker_pool(
    workers: Option<usize>,
) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|index| format!("panoptic2coco-worker-{}", index));
    if let Some(workers) = workers {
        builder = builder.num_threads(workers);
    }
    builder.build()
}

/// Create a directory (and its parents) unless it already exists
pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        log::debug!("Creating directory {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(())
}
