//! Historical aggregation and summary views
//!
//! Computes average posture and focus over the persisted history for a time
//! range, and the display-ready values of the post-session summary and the
//! dashboard. Metrics without qualifying data are `None`, never zero, so a
//! view can show a placeholder instead of a misleading 0.

use crate::types::{SessionRecord, TrackingMode, POSTURE_STORAGE_SCALE};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days covered by the "week" dashboard range
pub const WEEK_DAYS: i64 = 7;

/// Days covered by the "five weeks" dashboard range
pub const FIVE_WEEK_DAYS: i64 = 35;

/// Placeholder shown for metrics without data
pub const PLACEHOLDER: &str = "--";

/// Averages over the records at or after a cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeAverages {
    /// Mean stored posture average (0-1 scale) of records that tracked posture
    pub posture_avg: Option<f64>,
    /// Rounded mean focus percent of records that tracked focus
    pub focus_avg_percent: Option<u8>,
    /// Number of records in range
    pub count: usize,
}

/// Average posture and focus over records with `timestamp >= cutoff_ms`.
///
/// Records without posture (or focus) data are left out of that metric's mean
/// rather than counted as zero.
pub fn average_for_range(history: &[SessionRecord], cutoff_ms: i64) -> RangeAverages {
    let in_range: Vec<&SessionRecord> = history
        .iter()
        .filter(|r| r.timestamp_ms() >= cutoff_ms)
        .collect();

    let posture: Vec<f64> = in_range
        .iter()
        .filter_map(|r| r.posture_avg)
        .filter(|v| v.is_finite())
        .collect();
    let posture_avg = mean(&posture);

    let focus: Vec<f64> = in_range
        .iter()
        .filter_map(|r| r.focus_stats.as_ref())
        .map(|s| f64::from(s.percent))
        .collect();
    let focus_avg_percent = mean(&focus).map(|m| m.round().clamp(0.0, 100.0) as u8);

    RangeAverages {
        posture_avg,
        focus_avg_percent,
        count: in_range.len(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Stored 0-1 posture average as a whole 0-10 score
pub fn posture_display_score(posture_avg: f64) -> u8 {
    (posture_avg * POSTURE_STORAGE_SCALE)
        .round()
        .clamp(0.0, POSTURE_STORAGE_SCALE) as u8
}

/// Display values of one range on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeView {
    /// Whole 0-10 posture score
    pub posture_score: Option<u8>,
    /// Fill of the posture gauge (0-100), 0 without data
    pub posture_percent: f64,
    pub focus_percent: Option<u8>,
    pub sessions: usize,
}

impl From<RangeAverages> for RangeView {
    fn from(averages: RangeAverages) -> Self {
        let posture_score = averages.posture_avg.map(posture_display_score);
        Self {
            posture_score,
            posture_percent: posture_score.map(|s| f64::from(s) * 10.0).unwrap_or(0.0),
            focus_percent: averages.focus_avg_percent,
            sessions: averages.count,
        }
    }
}

impl RangeView {
    /// "7/10" or the placeholder
    pub fn posture_label(&self) -> String {
        self.posture_score
            .map(|s| format!("{s}/10"))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    /// "82%" or the placeholder
    pub fn focus_label(&self) -> String {
        self.focus_percent
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

/// Focus panel of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusView {
    pub focused_secs: u64,
    pub unfocused_secs: u64,
    pub percent: u8,
}

/// Post-session summary of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub mode: Option<TrackingMode>,
    /// Present when the session tracked posture and has data
    pub posture_score: Option<u8>,
    /// Present when the session tracked focus and has data
    pub focus: Option<FocusView>,
    pub selected_time: String,
}

impl SessionView {
    /// Build the view. An unrecognized mode shows nothing for either metric.
    pub fn from_record(record: &SessionRecord) -> Self {
        let mode = record.mode();
        let posture_score = mode
            .filter(TrackingMode::tracks_posture)
            .and(record.posture_avg)
            .map(posture_display_score);
        let focus = mode
            .filter(TrackingMode::tracks_focus)
            .and(record.focus_stats.as_ref())
            .map(|stats| FocusView {
                focused_secs: stats.focused.max(0.0).round() as u64,
                unfocused_secs: stats.unfocused.max(0.0).round() as u64,
                percent: stats.percent,
            });

        Self {
            mode,
            posture_score,
            focus,
            selected_time: record.selected_time.clone(),
        }
    }
}

/// Everything the dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub last_session: Option<SessionView>,
    pub lifetime: RangeView,
    pub week: RangeView,
    pub five_weeks: RangeView,
}

impl DashboardSummary {
    /// Summarize `history` as of `now`
    pub fn build(
        history: &[SessionRecord],
        last_session: Option<&SessionRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = |days: i64| (now - Duration::days(days)).timestamp_millis();

        Self {
            last_session: last_session.map(SessionView::from_record),
            lifetime: average_for_range(history, 0).into(),
            week: average_for_range(history, cutoff(WEEK_DAYS)).into(),
            five_weeks: average_for_range(history, cutoff(FIVE_WEEK_DAYS)).into(),
        }
    }
}

/// Format seconds as `M:SS`, or `H:MM:SS` from one hour up
pub fn format_hms(total_secs: f64) -> String {
    let secs = if total_secs.is_finite() {
        total_secs.max(0.0).floor() as u64
    } else {
        0
    };
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FocusStats;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(
        timestamp_ms: i64,
        option: &str,
        posture_avg: Option<f64>,
        focus_percent: Option<u8>,
    ) -> SessionRecord {
        SessionRecord {
            timestamp: Utc.timestamp_millis_opt(timestamp_ms).unwrap(),
            selected_option: option.to_string(),
            posture_avg,
            focus_stats: focus_percent.map(|percent| FocusStats {
                focused: f64::from(percent),
                unfocused: f64::from(100 - percent),
                percent,
            }),
            selected_time: "None".to_string(),
        }
    }

    #[test]
    fn test_cutoff_filters_records() {
        let history = vec![
            record(0, "Posture", Some(0.5), None),
            record(100_000, "Posture", Some(0.9), None),
        ];

        let recent = average_for_range(&history, 50_000);
        assert_eq!(recent.count, 1);
        assert!((recent.posture_avg.unwrap() - 0.9).abs() < 1e-9);

        let lifetime = average_for_range(&history, 0);
        assert_eq!(lifetime.count, 2);
        assert!((lifetime.posture_avg.unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_record_without_selection_still_aggregates() {
        let raw = r#"[
            {"timestamp":1000,"postureAvg":0.5,"focusStats":{"focused":60.0,"unfocused":0.0,"percent":100}},
            {"timestamp":2000,"selectedOption":"Posture","postureAvg":0.9}
        ]"#;
        let history = crate::history::parse_history(raw);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].mode(), None);

        let averages = average_for_range(&history, 0);
        assert_eq!(averages.count, 2);
        assert!((averages.posture_avg.unwrap() - 0.7).abs() < 1e-9);
        assert_eq!(averages.focus_avg_percent, Some(100));

        // Without a mode the session view has nothing to show
        let view = SessionView::from_record(&history[0]);
        assert_eq!(view.posture_score, None);
        assert_eq!(view.focus, None);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let history = vec![record(50_000, "Focus", None, Some(80))];
        assert_eq!(average_for_range(&history, 50_000).count, 1);
        assert_eq!(average_for_range(&history, 50_001).count, 0);
    }

    #[test]
    fn test_empty_range_is_none_not_zero() {
        let history = vec![record(1_000, "Focus & Posture", Some(0.4), Some(50))];

        let empty = average_for_range(&history, 2_000);
        assert_eq!(
            empty,
            RangeAverages {
                posture_avg: None,
                focus_avg_percent: None,
                count: 0,
            }
        );

        let none = average_for_range(&[], 0);
        assert_eq!(none.posture_avg, None);
        assert_eq!(none.focus_avg_percent, None);
    }

    #[test]
    fn test_missing_metrics_are_excluded() {
        let history = vec![
            record(1, "Posture", Some(0.6), None),
            record(2, "Focus", None, Some(90)),
            record(3, "Focus", None, Some(75)),
        ];

        let averages = average_for_range(&history, 0);
        assert_eq!(averages.count, 3);
        assert!((averages.posture_avg.unwrap() - 0.6).abs() < 1e-9);
        // (90 + 75) / 2 = 82.5 -> 83
        assert_eq!(averages.focus_avg_percent, Some(83));
    }

    #[test]
    fn test_range_view_labels() {
        let view = RangeView::from(RangeAverages {
            posture_avg: Some(0.66),
            focus_avg_percent: Some(71),
            count: 4,
        });
        assert_eq!(view.posture_score, Some(7));
        assert_eq!(view.posture_percent, 70.0);
        assert_eq!(view.posture_label(), "7/10");
        assert_eq!(view.focus_label(), "71%");

        let empty = RangeView::from(average_for_range(&[], 0));
        assert_eq!(empty.posture_label(), "--");
        assert_eq!(empty.focus_label(), "--");
        assert_eq!(empty.posture_percent, 0.0);
    }

    #[test]
    fn test_dashboard_ranges() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let days_ago = |d: i64| (now - Duration::days(d)).timestamp_millis();

        let history = vec![
            record(days_ago(60), "Posture", Some(0.2), None),
            record(days_ago(20), "Posture", Some(0.6), None),
            record(days_ago(2), "Focus & Posture", Some(1.0), Some(90)),
        ];

        let dashboard = DashboardSummary::build(&history, history.last(), now);

        assert_eq!(dashboard.lifetime.sessions, 3);
        assert_eq!(dashboard.lifetime.posture_score, Some(6));
        assert_eq!(dashboard.five_weeks.sessions, 2);
        assert_eq!(dashboard.five_weeks.posture_score, Some(8));
        assert_eq!(dashboard.week.sessions, 1);
        assert_eq!(dashboard.week.posture_score, Some(10));
        assert_eq!(dashboard.week.focus_percent, Some(90));
        assert_eq!(dashboard.five_weeks.focus_percent, Some(90));

        let last = dashboard.last_session.unwrap();
        assert_eq!(last.mode, Some(TrackingMode::Both));
        assert_eq!(last.posture_score, Some(10));
    }

    #[test]
    fn test_session_view_follows_mode() {
        let both = record(0, "Focus & Posture", Some(0.73), Some(64));
        let view = SessionView::from_record(&both);
        assert_eq!(view.posture_score, Some(7));
        assert_eq!(
            view.focus,
            Some(FocusView {
                focused_secs: 64,
                unfocused_secs: 36,
                percent: 64,
            })
        );

        let posture_only = record(0, "Posture", Some(0.5), Some(100));
        let view = SessionView::from_record(&posture_only);
        assert_eq!(view.posture_score, Some(5));
        assert_eq!(view.focus, None);
    }

    #[test]
    fn test_degenerate_mode_shows_nothing() {
        let odd = record(0, "", Some(0.5), Some(50));
        let view = SessionView::from_record(&odd);
        assert_eq!(view.mode, None);
        assert_eq!(view.posture_score, None);
        assert_eq!(view.focus, None);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0.0), "0:00");
        assert_eq!(format_hms(59.9), "0:59");
        assert_eq!(format_hms(61.0), "1:01");
        assert_eq!(format_hms(3_600.0), "1:00:00");
        assert_eq!(format_hms(5_025.0), "1:23:45");
        assert_eq!(format_hms(-5.0), "0:00");
        assert_eq!(format_hms(f64::NAN), "0:00");
    }
}
