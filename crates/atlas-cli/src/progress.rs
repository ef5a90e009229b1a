use atlas_core::models::Category;
use atlas_import::{CategoryCounts, ImportObserver, ImportStage};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {}", message));
}

/// Finish a progress bar with a warning
pub fn finish_warning(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("⚠ {}", message));
}

/// One spinner per category, stacked under the current stage
pub struct ImportProgress {
    multi: MultiProgress,
    current: RefCell<Option<ProgressBar>>,
}

impl ImportProgress {
    pub fn new(hidden: bool) -> Self {
        let multi = MultiProgress::new();
        if hidden {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { multi, current: RefCell::new(None) }
    }
}

impl ImportObserver for ImportProgress {
    fn stage_started(&self, stage: ImportStage) {
        if matches!(stage, ImportStage::LoadingAreaBounds | ImportStage::ClearingStore) {
            // Short-lived, printed once and left in place
            let _ = self.multi.println(format!("» {}", stage));
        }
    }

    fn category_started(&self, category: Category) {
        let pb = self.multi.add(create_spinner(&format!("{}: reading...", category)));
        *self.current.borrow_mut() = Some(pb);
    }

    fn feature_processed(&self, category: Category, counts: &CategoryCounts) {
        if let Some(pb) = self.current.borrow().as_ref() {
            pb.set_message(format!("{}: {} features processed", category, counts.processed()));
        }
    }

    fn category_finished(&self, category: Category, counts: &CategoryCounts) {
        let Some(pb) = self.current.borrow_mut().take() else { return };
        let message = format!(
            "{}: {} imported, {} skipped, {} filtered, {} errors",
            category, counts.imported, counts.skipped, counts.filtered, counts.errors
        );

        if counts.source_missing() {
            finish_warning(&pb, &format!("{}: no source found", category));
        } else if counts.errors > 0 || counts.failed_sources > 0 {
            finish_warning(&pb, &message);
        } else {
            finish_success(&pb, &message);
        }
    }
}
