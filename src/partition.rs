/// A contiguous, inclusive byte span of the source resource.
///
/// `index` is 1-based and doubles as the multipart part number, since object
/// stores require positive part numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Number of ranges [`partition`] would produce, without materializing them.
///
/// A range spans `chunk + 1` bytes inclusive (except possibly the last), so
/// the count is `ceil((total + 1) / (chunk + 1))`. Callers validate this
/// against their task ceiling before building a plan; `total` comes straight
/// from an untrusted `Content-Length`, and a pathological value must be
/// rejected, not allocated for.
pub fn task_count(total: u64, chunk: u64) -> u64 {
    debug_assert!(chunk > 0, "chunk size must be positive");

    if total == 0 {
        return 0;
    }
    // u128 sidesteps overflow at total == u64::MAX.
    ((total as u128 + 1).div_ceil(chunk as u128 + 1)) as u64
}

/// Splits `total` bytes into ordered, contiguous ranges of roughly `chunk`
/// span each.
///
/// The first range starts at 0, every subsequent range starts one past the
/// previous end, and the final end is clamped to `total` (ranged HTTP servers
/// clamp an overshooting last request themselves). `total == 0` yields no
/// ranges. Pure function: the same inputs always produce the same sequence.
pub fn partition(total: u64, chunk: u64) -> Vec<Range> {
    debug_assert!(chunk > 0, "chunk size must be positive");

    let n = total.div_ceil(chunk);
    // Capacity hint only, clamped: count validation is the caller's job.
    let mut ranges = Vec::with_capacity(task_count(total, chunk).min(1 << 16) as usize);
    for i in 0..n {
        let start = if i == 0 { 0 } else { (chunk + 1) * i };
        let end = (start + chunk).min(total);
        ranges.push(Range {
            index: (i + 1) as u32,
            start,
            end,
        });

        if end == total {
            break;
        }
    }

    ranges
}
