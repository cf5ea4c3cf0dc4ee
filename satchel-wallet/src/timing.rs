//! System clock checks against global (NTP) time.

/// Largest tolerated local clock offset, in microseconds.
pub const ALLOWED_TIME_DIFFERENCE: u64 = 15 * 1_000_000;

/// Outcome of comparing the local clock with NTP time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClockStatus {
    /// No offset could be measured.
    NtpUnreachable,
    /// The offset is within [`ALLOWED_TIME_DIFFERENCE`].
    InSync,
    /// The offset exceeds [`ALLOWED_TIME_DIFFERENCE`].
    OutOfSync {
        /// Measured offset in microseconds (sign = direction).
        offset_us: i64,
    },
}

impl ClockStatus {
    /// Classifies a measured offset in microseconds.
    ///
    /// A missing or zero measurement means the NTP check never produced a
    /// result.
    pub const fn evaluate(local_time_difference: Option<i64>) -> Self {
        match local_time_difference {
            None | Some(0) => Self::NtpUnreachable,
            Some(offset_us) if offset_us.unsigned_abs() <= ALLOWED_TIME_DIFFERENCE => Self::InSync,
            Some(offset_us) => Self::OutOfSync { offset_us },
        }
    }

    /// Returns `true` if the wallet can sync with this clock.
    pub const fn can_sync(self) -> bool {
        matches!(self, Self::InSync)
    }
}

/// Calendar units used by [`humanize_offset`], largest first.
const UNITS: &[(u64, &str)] = &[
    (31_557_600, "year"),
    (2_629_800, "month"),
    (604_800, "week"),
    (86_400, "day"),
    (3_600, "hour"),
    (60, "minute"),
    (1, "second"),
];

/// Renders an offset in microseconds as e.g. `2 hours 12 minutes 54 seconds`.
///
/// The sign is ignored, the value is rounded to whole seconds, and zero
/// components are skipped.
pub fn humanize_offset(offset_us: i64) -> String {
    let mut secs = offset_us.unsigned_abs().saturating_add(500_000) / 1_000_000;
    if secs == 0 {
        return "0 seconds".to_owned();
    }
    let mut parts = Vec::new();
    for &(size, name) in UNITS {
        let count = secs / size;
        if count == 0 {
            continue;
        }
        secs %= size;
        let plural = if count == 1 { "" } else { "s" };
        parts.push(format!("{count} {name}{plural}"));
    }
    parts.join(" ")
}

/// Maps a UI locale to the language code used for duration wording.
pub fn duration_language(locale: &str) -> &'static str {
    match locale {
        "ja-JP" => "ja",
        "zh-CN" => "zh_CN",
        "ko-KR" => "ko",
        "de-DE" => "de",
        _ => "en",
    }
}
