//! Single-line statistics rendering

use crate::error::AppError;
use crate::escalation::state::StreamMonitor;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

/// Size of the statistics buffer in bytes
pub const STATS_BUFFER_CAPACITY: usize = 1024;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Rendered statistics line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsLine {
    pub text: String,

    /// The rendering did not fit and `text` was cut short
    pub truncated: bool,

    pub capacity: usize,
}

impl StatsLine {
    /// Complete line, or `RenderOverflow` when it was truncated
    pub fn into_result(self) -> Result<String, AppError> {
        if self.truncated {
            Err(AppError::RenderOverflow {
                capacity: self.capacity,
            })
        } else {
            Ok(self.text)
        }
    }
}

fn local_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

fn render_monitor(out: &mut String, monitor: &StreamMonitor) {
    out.push_str(&monitor.id);

    if monitor.level1_count == 0 && monitor.level2_count == 0 {
        return;
    }

    out.push_str(" (");
    if monitor.level1_count > 0 {
        let _ = write!(out, "L1={}", monitor.level1_count);
        if let Some(at) = monitor.last_level1_at {
            let _ = write!(out, "/{}", local_timestamp(at));
        }
    }
    if monitor.level2_count > 0 {
        if monitor.level1_count > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "L2={}", monitor.level2_count);
        if let Some(at) = monitor.last_level2_at {
            let _ = write!(out, "/{}", local_timestamp(at));
        }
    }
    out.push(')');
}

fn truncate_to(text: &mut String, max_len: usize) {
    let mut cut = max_len.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Render global counters followed by every topic in registration order.
///
/// The line holds at most `capacity - 1` bytes, leaving room for the
/// terminator of a fixed-size buffer.
pub fn render_summary(
    level1_total: u64,
    level2_total: u64,
    monitors: &[StreamMonitor],
    capacity: usize,
) -> StatsLine {
    let limit = capacity.saturating_sub(1);
    let mut text = String::with_capacity(capacity);
    let _ = write!(text, "L1={}, L2={}: ", level1_total, level2_total);

    let mut truncated = text.len() > limit;
    if !truncated {
        for (i, monitor) in monitors.iter().enumerate() {
            if i > 0 {
                text.push_str(", ");
            }
            render_monitor(&mut text, monitor);

            if text.len() > limit {
                truncated = true;
                break;
            }
        }
    }

    if truncated {
        truncate_to(&mut text, limit);
    }

    StatsLine {
        text,
        truncated,
        capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::state::StreamSpec;
    use std::time::Duration;

    fn monitor(id: &str) -> StreamMonitor {
        StreamMonitor::new(
            StreamSpec::new(id, Duration::from_secs(60), Duration::from_secs(300)),
            Utc::now(),
        )
    }

    #[test]
    fn test_render_quiet_topics() {
        let line = render_summary(0, 0, &[monitor("a"), monitor("b")], STATS_BUFFER_CAPACITY);

        assert!(!line.truncated);
        assert_eq!(line.text, "L1=0, L2=0: a, b");
    }

    #[test]
    fn test_render_annotations() {
        let mut b = monitor("b");
        b.level1_count = 2;
        b.last_level1_at = Some(Utc::now());
        b.level2_count = 1;
        b.last_level2_at = Some(Utc::now());

        let line = render_summary(2, 1, &[monitor("a"), b], STATS_BUFFER_CAPACITY);

        assert!(line.text.starts_with("L1=2, L2=1: a, b (L1=2/"));
        assert!(line.text.contains(", L2=1/"));
        assert!(line.text.ends_with(')'));
    }

    #[test]
    fn test_render_level2_only() {
        let mut a = monitor("a");
        a.level2_count = 1;
        a.last_level2_at = Some(Utc::now());

        let line = render_summary(0, 1, &[a], STATS_BUFFER_CAPACITY);

        assert!(line.text.starts_with("L1=0, L2=1: a (L2=1/"));
        assert!(!line.text.contains("L1=1"));
    }

    #[test]
    fn test_render_overflow_truncates() {
        let monitors: Vec<_> = (0..20).map(|i| monitor(&format!("topic/{i}"))).collect();

        let line = render_summary(0, 0, &monitors, 32);

        assert!(line.truncated);
        assert_eq!(line.text.len(), 31);
        assert!(line.text.starts_with("L1=0, L2=0: topic/0"));
        assert!(matches!(
            line.into_result(),
            Err(AppError::RenderOverflow { capacity: 32 })
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let mut text = "ab\u{00e9}".to_string();
        truncate_to(&mut text, 3);
        assert_eq!(text, "ab");
    }
}
