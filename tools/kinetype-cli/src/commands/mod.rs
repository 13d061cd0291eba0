pub mod check;
pub mod config;
pub mod estimate;
pub mod export;

use kinetype_common::config::ExportDefaults;
use kinetype_export_model::spec::ExportSpec;

use crate::RangeArgs;

/// Spec for `range`, filling unset options from the config defaults.
pub fn spec_from_range(
    range: &RangeArgs,
    defaults: &ExportDefaults,
    output: impl Into<std::path::PathBuf>,
) -> ExportSpec {
    ExportSpec::new(
        range.start_ms,
        range.end_ms,
        range.fps.unwrap_or(defaults.fps),
        range.width,
        range.height,
        output,
    )
    .with_batch_size(range.batch_size.unwrap_or(defaults.batch_size))
    .with_quality(defaults.quality)
}
