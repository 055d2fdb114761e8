//! Directory scanning logic

mod walker;

pub use walker::{
    collect_matching_files, has_deployable_extension, is_hidden, ExclusionSet, ProgressCallback,
    ScanFilter, DEPLOYABLE_EXTENSIONS,
};
