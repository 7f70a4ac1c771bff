mod config;
mod error;
mod exif_reader;
mod metadata;
mod modifier;
mod naming;
mod pipeline;
mod progress;
mod reader;
mod rotate;
mod scanner;
mod settings;
mod sorter;
mod writer;

#[cfg(test)]
mod fixtures;

pub use config::{
    app_paths, load_settings, load_settings_from, save_settings, save_settings_to, AppPaths,
};
pub use error::{FileFailure, SortError};
pub use exif_reader::read_image_metadata;
pub use metadata::{CaptureMetadata, ImageRecord, DEFAULT_ORIENTATION};
pub use modifier::{apply_camera_offsets, shift_by_rule};
pub use naming::{
    assign_filenames, calculate_filename, calculate_filenames, digit_count, FilenameScheme,
};
pub use pipeline::{list_camera_models, run_pipeline, PlannedFile, RunHooks, RunReport};
pub use progress::{CancellationToken, ProgressFn};
pub use reader::{read_images, read_images_with, ReadOutcome};
pub use rotate::{rotate_in_place, write_upright, Orientation};
pub use scanner::{scan_image_files, DEFAULT_EXTENSIONS};
pub use settings::{CameraOffsetRule, CameraRuleError, PipelineSettings, WriteSettings};
pub use sorter::{
    compare_chain, default_sort_criteria, sort_by_chain, sort_records, SortCriterion, SortDirection,
    SortKey,
};
pub use writer::{write_images, WriteOutcome, WritePlan, WrittenFile};
