use mediaforge_config::ThumbnailSize;

/// Choose the canonical target dimensions for a requested size.
///
/// Candidates are scanned in configured order:
/// - an exact match on both dimensions short-circuits immediately;
/// - a candidate strictly smaller than the request in either dimension is
///   skipped, unless it is the last candidate (the last entry is always a
///   fallback, even undersized);
/// - among the rest, the candidate with the smallest signed sum of
///   differences `(cw - w) + (ch - h)` wins, first match taking precedence
///   on ties.
///
/// An empty candidate list leaves the requested dimensions unchanged.
pub fn select_target_size(
    sizes: &[ThumbnailSize],
    width: u32,
    height: u32,
) -> (u32, u32) {
    let mut target_width = width;
    let mut target_height = height;
    let mut found_first = false;

    for (index, size) in sizes.iter().enumerate() {
        let last_size = index == sizes.len() - 1;

        if size.width == width && size.height == height {
            return (width, height);
        }

        if (size.width < width || size.height < height) && !last_size {
            continue; // too small
        }

        let diff = i64::from(size.width) - i64::from(width)
            + i64::from(size.height)
            - i64::from(height);
        let curr_diff = i64::from(target_width) - i64::from(width)
            + i64::from(target_height)
            - i64::from(height);

        if !found_first || diff < curr_diff {
            found_first = true;
            target_width = size.width;
            target_height = size.height;
        }
    }

    (target_width, target_height)
}
