//! Chart projection
//!
//! Maps a sample sequence into plot coordinates for a fixed-size
//! viewport and resolves pointer positions back to samples. Projection
//! is a pure function of its inputs: identical inputs produce
//! bit-identical coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MetricKey, Sample};

/// Default vertical padding as a fraction of the value range
pub const DEFAULT_PADDING_RATIO: f64 = 0.1;

/// Padding used when every value is identical
pub const FLAT_PADDING: f64 = 10.0;

/// Number of labelled ticks on the value axis
pub const TICK_COUNT: usize = 4;

/// Value range assumed when there is nothing to plot
const EMPTY_RANGE: (f64, f64) = (0.0, 100.0);

/// Plot area size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 240.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewBounds {
    pub min_value: f64,
    pub max_value: f64,
    pub padding: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickMark {
    pub value: f64,
    pub y: f64,
}

/// Plot-ready view of one metric over a sample sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartProjection {
    pub metric: MetricKey,
    pub points: Vec<ChartPoint>,
    pub view_bounds: ViewBounds,
    pub tick_marks: Vec<TickMark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_line_y: Option<f64>,
}

impl ChartProjection {
    /// Point under a pointer at horizontal fraction `ratio`
    pub fn point_at(&self, ratio: f64) -> Option<&ChartPoint> {
        resolve_hover(ratio, self.points.len()).map(|idx| &self.points[idx])
    }

    /// Points as an SVG polyline `points` attribute
    pub fn polyline(&self) -> String {
        self.points
            .iter()
            .map(|p| format!("{:.2},{:.2}", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Shared vertical mapping for points, ticks and the threshold line
#[derive(Debug, Clone, Copy)]
struct YAxis {
    min: f64,
    padding: f64,
    scale: f64,
    height: f64,
}

impl YAxis {
    fn new(min: f64, max: f64, padding_ratio: f64, height: f64) -> (Self, f64) {
        let padding = if max == min {
            FLAT_PADDING
        } else {
            (max - min) * padding_ratio
        };
        let span = (max - min) + 2.0 * padding;
        let scale = if span > 0.0 && span.is_finite() {
            height / span
        } else {
            0.0
        };
        (
            Self {
                min,
                padding,
                scale,
                height,
            },
            padding,
        )
    }

    fn y(&self, value: f64) -> f64 {
        self.height - (value - self.min + self.padding) * self.scale
    }
}

/// Project `metric` of `samples` into `viewport`.
///
/// Samples lacking the metric are skipped. An empty input yields no
/// points and a default `0..100` value range. When `threshold` is given
/// its line is mapped through the same axis and clamped to the viewport.
pub fn project(
    samples: &[Sample],
    metric: MetricKey,
    viewport: Viewport,
    padding_ratio: f64,
    threshold: Option<f64>,
) -> ChartProjection {
    let series: Vec<(f64, DateTime<Utc>)> = samples
        .iter()
        .filter_map(|s| s.value(metric).map(|v| (v, s.timestamp)))
        .collect();

    let (min, max) = if series.is_empty() {
        EMPTY_RANGE
    } else {
        series.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (v, _)| {
            (lo.min(*v), hi.max(*v))
        })
    };

    let (axis, padding) = YAxis::new(min, max, padding_ratio, viewport.height);
    let x_scale = viewport.width / (series.len().saturating_sub(1).max(1)) as f64;

    let points = series
        .iter()
        .enumerate()
        .map(|(i, (value, timestamp))| ChartPoint {
            x: i as f64 * x_scale,
            y: axis.y(*value),
            value: *value,
            timestamp: *timestamp,
        })
        .collect();

    let step = (max - min) / (TICK_COUNT - 1) as f64;
    let tick_marks = (0..TICK_COUNT)
        .map(|k| {
            let value = if k == TICK_COUNT - 1 {
                min
            } else {
                max - step * k as f64
            };
            TickMark {
                value,
                y: axis.y(value),
            }
        })
        .collect();

    let threshold_line_y = threshold.map(|t| axis.y(t).clamp(0.0, viewport.height.max(0.0)));

    ChartProjection {
        metric,
        points,
        view_bounds: ViewBounds {
            min_value: min,
            max_value: max,
            padding,
            width: viewport.width,
            height: viewport.height,
        },
        tick_marks,
        threshold_line_y,
    }
}

/// Resolve a horizontal pointer fraction to a sample index.
///
/// The fraction is clamped to `[0, 1]` (non-finite input counts as 0) and
/// mapped to `round(ratio * (count - 1))`. Monotonic in `ratio`.
pub fn resolve_hover(ratio: f64, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let idx = (ratio * (count - 1) as f64).round() as usize;
    Some(idx.min(count - 1))
}

/// Convert a pointer's pixel offset inside the plot to a fraction
pub fn hover_from_pixel(pixel_x: f64, width: f64) -> f64 {
    if !width.is_finite() || width <= 0.0 || !pixel_x.is_finite() {
        return 0.0;
    }
    (pixel_x / width).clamp(0.0, 1.0)
}
