//! GdiSettings - external dispatch の実行時パラメータ
//!
//! 値は `ParameterSource` から毎回読み直します（設定の再読込に追従するため）。
//! 解釈できない値はその key のデフォルトに戻し、warn を出します。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ports::ParameterSource;
use crate::ports::params::{CL_PING, GDI_RETRIES, GDI_TIMEOUT};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// How many extra receive attempts follow a timed-out one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RetryCount {
    /// `-1`: keep retrying until something other than a timeout happens.
    Infinite,
    Limited(u32),
}

impl RetryCount {
    /// May another attempt follow after `used` retries have been spent?
    pub fn permits(self, used: u32) -> bool {
        match self {
            RetryCount::Infinite => true,
            RetryCount::Limited(n) => used < n,
        }
    }

    /// Retry count after one more retry, or `None` if none is permitted.
    /// Saturates instead of wrapping when retrying forever.
    pub fn next_retry(self, used: u32) -> Option<u32> {
        self.permits(used).then(|| used.saturating_add(1))
    }
}

impl Default for RetryCount {
    fn default() -> Self {
        RetryCount::Limited(0)
    }
}

impl From<i64> for RetryCount {
    fn from(raw: i64) -> Self {
        match raw {
            -1 => RetryCount::Infinite,
            n if n < 0 => RetryCount::Limited(0),
            n => RetryCount::Limited(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }
}

impl From<RetryCount> for i64 {
    fn from(count: RetryCount) -> Self {
        match count {
            RetryCount::Infinite => -1,
            RetryCount::Limited(n) => i64::from(n),
        }
    }
}

impl fmt::Display for RetryCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryCount::Infinite => f.write_str("infinite"),
            RetryCount::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Snapshot of the receive-side parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdiSettings {
    pub retries: RetryCount,
    /// Synchronous receive timeout in seconds.
    pub timeout_secs: u64,
    /// Probe the master's endpoint status after a receive timeout.
    pub ping: bool,
}

impl Default for GdiSettings {
    fn default() -> Self {
        Self {
            retries: RetryCount::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            ping: false,
        }
    }
}

impl GdiSettings {
    pub fn from_source(source: &dyn ParameterSource) -> Self {
        let defaults = Self::default();
        Self {
            retries: read(source, GDI_RETRIES, |v| v.parse::<i64>().ok().map(RetryCount::from))
                .unwrap_or(defaults.retries),
            timeout_secs: read(source, GDI_TIMEOUT, |v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            ping: read(source, CL_PING, parse_flag).unwrap_or(defaults.ping),
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn read<T>(
    source: &dyn ParameterSource,
    key: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let raw = source.get(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparseable parameter");
    }
    parsed
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::ParameterList;
    use rstest::rstest;

    #[test]
    fn defaults_when_nothing_is_configured() {
        let settings = GdiSettings::from_source(&ParameterList::new());
        assert_eq!(settings, GdiSettings::default());
        assert_eq!(settings.receive_timeout(), Duration::from_secs(60));
        assert!(!settings.retries.permits(0));
    }

    #[test]
    fn reads_configured_values() {
        let params = ParameterList::parse("gdi_retries=-1,gdi_timeout=5,cl_ping=TRUE");
        let settings = GdiSettings::from_source(&params);
        assert_eq!(settings.retries, RetryCount::Infinite);
        assert_eq!(settings.timeout_secs, 5);
        assert!(settings.ping);
    }

    #[test]
    fn garbage_falls_back_per_key() {
        let params = ParameterList::parse("gdi_retries=lots,gdi_timeout=7,cl_ping=maybe");
        let settings = GdiSettings::from_source(&params);
        assert_eq!(settings.retries, RetryCount::Limited(0));
        assert_eq!(settings.timeout_secs, 7);
        assert!(!settings.ping);
    }

    #[rstest]
    #[case::infinite(-1, RetryCount::Infinite)]
    #[case::none(0, RetryCount::Limited(0))]
    #[case::two(2, RetryCount::Limited(2))]
    #[case::other_negative(-5, RetryCount::Limited(0))]
    fn retry_count_from_raw(#[case] raw: i64, #[case] expected: RetryCount) {
        assert_eq!(RetryCount::from(raw), expected);
    }

    #[test]
    fn limited_retries_permit_exactly_n_more_attempts() {
        let two = RetryCount::Limited(2);
        assert!(two.permits(0));
        assert!(two.permits(1));
        assert!(!two.permits(2));
        assert!(RetryCount::Infinite.permits(u32::MAX));
    }

    #[rstest]
    #[case::first(RetryCount::Limited(2), 0, Some(1))]
    #[case::last(RetryCount::Limited(2), 1, Some(2))]
    #[case::spent(RetryCount::Limited(2), 2, None)]
    #[case::forever(RetryCount::Infinite, 7, Some(8))]
    #[case::forever_at_the_top(RetryCount::Infinite, u32::MAX, Some(u32::MAX))]
    fn next_retry_counts_up_without_wrapping(
        #[case] retries: RetryCount,
        #[case] used: u32,
        #[case] expected: Option<u32>,
    ) {
        assert_eq!(retries.next_retry(used), expected);
    }

    #[test]
    fn serializes_retry_count_as_integer() {
        let json = serde_json::to_value(GdiSettings {
            retries: RetryCount::Infinite,
            ..GdiSettings::default()
        })
        .unwrap();
        assert_eq!(json["retries"], -1);

        let back: GdiSettings = serde_json::from_str(r#"{"retries": 3}"#).unwrap();
        assert_eq!(back.retries, RetryCount::Limited(3));
        assert_eq!(back.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
