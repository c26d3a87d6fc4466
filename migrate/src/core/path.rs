//! Migration path construction.

use crate::core::version::Version;

/// Select the steps that bridge `from` to `to`, in ascending order.
///
/// Keeps exactly the versions `v` with `from < v <= to`. A `from` of `None`
/// (nothing recorded yet) is below every version. Duplicates in `discovered`
/// are passed through; the sort is stable.
pub fn build_path(from: Option<&Version>, to: &Version, discovered: &[Version]) -> Vec<Version> {
    let mut path: Vec<Version> = discovered
        .iter()
        .filter(|version| from.is_none_or(|from| *version > from))
        .filter(|version| *version <= to)
        .cloned()
        .collect();
    path.sort();
    path
}
