//! Geometry generation for the two graph styles.
//!
//! Each frame is classified into a [`RenderUpdate`]; the renderers keep one
//! tight loop per case instead of branching per vertex.

mod line;
mod stacked;

pub use line::LineRenderer;
pub use stacked::StackedAreaRenderer;

use crate::bounds::{AffineTransform, AxisBounds, RenderBounds};
use crate::config::GraphStyle;
use crate::gpu::mesh::Vertex;
use crate::ring_buffer::RingBuffer;
use crate::sampler::DataSampler;

/// What changed since the previous frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderUpdate {
    NoChange,
    /// New points arrived, bounds unchanged.
    Scrolled,
    /// Bounds changed, no new points.
    Rescaled,
    ScrolledAndRescaled,
}

impl RenderUpdate {
    pub fn classify(points_to_advance: usize, y_transform: &AffineTransform) -> Self {
        match (points_to_advance > 0, !y_transform.is_identity()) {
            (false, false) => RenderUpdate::NoChange,
            (true, false) => RenderUpdate::Scrolled,
            (false, true) => RenderUpdate::Rescaled,
            (true, true) => RenderUpdate::ScrolledAndRescaled,
        }
    }
}

/// Minimum and maximum of plotted values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

/// Mapping from (point index, value) to render space for one frame.
#[derive(Clone, Copy, Debug)]
pub struct PlotLayout {
    pub render: RenderBounds,
    pub axis: AxisBounds,
    pub stat_count: usize,
    pub point_count: usize,
}

impl PlotLayout {
    /// Horizontal distance between consecutive points.
    pub fn x_step(&self) -> f32 {
        if self.point_count > 1 {
            self.render.width() / (self.point_count - 1) as f32
        } else {
            0.0
        }
    }

    #[inline]
    pub fn x_at(&self, point: usize) -> f32 {
        self.render.x_min + point as f32 * self.x_step()
    }

    #[inline]
    pub fn y_at(&self, value: f32) -> f32 {
        let range = self.axis.range();
        if range > 0.0 {
            self.render.y_min + (value - self.axis.min) / range * self.render.height()
        } else {
            self.render.y_min
        }
    }
}

/// Inputs of one geometry update.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    pub layout: PlotLayout,
    pub points_to_advance: usize,
    pub y_transform: AffineTransform,
    /// Regenerate everything regardless of the classified update.
    pub full_rebuild: bool,
}

impl FrameContext {
    pub fn update(&self) -> RenderUpdate {
        RenderUpdate::classify(self.points_to_advance, &self.y_transform)
    }
}

/// Per-point extremes over the visible window with running min/max.
///
/// A full scan only happens when the evicted point held the current extreme.
#[derive(Clone, Debug)]
pub struct PointExtremes {
    lows: RingBuffer<f32>,
    highs: RingBuffer<f32>,
    min: f32,
    max: f32,
}

impl PointExtremes {
    pub fn new(point_count: usize) -> Self {
        Self {
            lows: RingBuffer::new(point_count),
            highs: RingBuffer::new(point_count),
            min: 0.0,
            max: 0.0,
        }
    }

    pub fn reset(&mut self, point_count: usize) {
        self.lows.clear();
        self.highs.clear();
        self.lows.set_capacity(point_count);
        self.highs.set_capacity(point_count);
        self.min = 0.0;
        self.max = 0.0;
    }

    pub fn clear(&mut self) {
        self.lows.clear();
        self.highs.clear();
        self.min = 0.0;
        self.max = 0.0;
    }

    pub fn push(&mut self, low: f32, high: f32) {
        let evicted_low = self.lows.push_back(low);
        let evicted_high = self.highs.push_back(high);
        if self.highs.len() == 1 {
            self.min = low;
            self.max = high;
            return;
        }

        if high >= self.max {
            self.max = high;
        } else if evicted_high == Some(self.max) {
            self.max = self.highs.max().unwrap_or(high);
            log::trace!("Evicted maximum, rescanned: {}", self.max);
        }

        if low <= self.min {
            self.min = low;
        } else if evicted_low == Some(self.min) {
            self.min = self.lows.min().unwrap_or(low);
        }
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn range(&self) -> ValueRange {
        ValueRange { min: self.min, max: self.max }
    }
}

/// Style-specific renderer, selected by the graph configuration.
pub enum GraphRenderer {
    Line(LineRenderer),
    StackedArea(StackedAreaRenderer),
}

impl GraphRenderer {
    pub fn new(style: GraphStyle, line_thickness: f32) -> Self {
        match style {
            GraphStyle::Line => GraphRenderer::Line(LineRenderer::new(line_thickness)),
            GraphStyle::StackedArea => GraphRenderer::StackedArea(StackedAreaRenderer::new()),
        }
    }

    /// Whether this renderer has anything to draw at all.
    pub fn is_drawable(&self) -> bool {
        match self {
            GraphRenderer::Line(r) => r.half_thickness() > 0.0,
            GraphRenderer::StackedArea(_) => true,
        }
    }

    pub fn resize(&mut self, point_count: usize) {
        match self {
            GraphRenderer::Line(r) => r.resize(point_count),
            GraphRenderer::StackedArea(r) => r.resize(point_count),
        }
    }

    pub fn clear(&mut self) {
        match self {
            GraphRenderer::Line(r) => r.clear(),
            GraphRenderer::StackedArea(r) => r.clear(),
        }
    }

    /// Bring vertex positions up to date. Colors are left untouched.
    pub fn update_vertices(&mut self, frame: &FrameContext, sampler: &DataSampler, vertices: &mut [Vertex]) {
        match self {
            GraphRenderer::Line(r) => r.update_vertices(frame, sampler, vertices),
            GraphRenderer::StackedArea(r) => r.update_vertices(frame, sampler, vertices),
        }
    }

    pub fn value_range(&self) -> ValueRange {
        match self {
            GraphRenderer::Line(r) => r.value_range(),
            GraphRenderer::StackedArea(r) => r.value_range(),
        }
    }
}

/// Move the vertices of `stat` left by `points` columns, dropping the oldest.
/// The last `points` columns keep stale positions until recomputed.
fn shift_columns(vertices: &mut [Vertex], stat: usize, points: usize, layout: &PlotLayout) {
    let start = 2 * stat * layout.point_count;
    let end = start + 2 * layout.point_count;
    let columns = &mut vertices[start..end];
    columns.copy_within(2 * points.., 0);
    let dx = points as f32 * layout.x_step();
    for vertex in &mut columns[..2 * (layout.point_count - points)] {
        vertex.position[0] -= dx;
    }
}

/// Like [`shift_columns`], also applying a vertical rescale in the same pass.
fn shift_and_rescale_columns(
    vertices: &mut [Vertex],
    stat: usize,
    points: usize,
    layout: &PlotLayout,
    y_transform: &AffineTransform,
) {
    let start = 2 * stat * layout.point_count;
    let end = start + 2 * layout.point_count;
    let columns = &mut vertices[start..end];
    columns.copy_within(2 * points.., 0);
    let dx = points as f32 * layout.x_step();
    for vertex in &mut columns[..2 * (layout.point_count - points)] {
        vertex.position[0] -= dx;
        vertex.position[1] = y_transform.apply(vertex.position[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let scale = AffineTransform::new(0.5, 0.0);
        assert_eq!(RenderUpdate::classify(0, &AffineTransform::IDENTITY), RenderUpdate::NoChange);
        assert_eq!(RenderUpdate::classify(2, &AffineTransform::IDENTITY), RenderUpdate::Scrolled);
        assert_eq!(RenderUpdate::classify(0, &scale), RenderUpdate::Rescaled);
        assert_eq!(RenderUpdate::classify(1, &scale), RenderUpdate::ScrolledAndRescaled);
    }

    #[test]
    fn test_layout_mapping() {
        let layout = PlotLayout {
            render: RenderBounds::new(10.0, 20.0, 0.0, 100.0),
            axis: AxisBounds::new(0.0, 50.0),
            stat_count: 1,
            point_count: 6,
        };
        assert_eq!(layout.x_step(), 2.0);
        assert_eq!(layout.x_at(0), 10.0);
        assert_eq!(layout.x_at(5), 20.0);
        assert_eq!(layout.y_at(25.0), 50.0);
    }

    #[test]
    fn test_extremes_track_window() {
        let mut extremes = PointExtremes::new(3);
        for (lo, hi) in [(1.0, 5.0), (0.0, 9.0), (2.0, 3.0)] {
            extremes.push(lo, hi);
        }
        assert_eq!(extremes.range(), ValueRange { min: 0.0, max: 9.0 });
        // Evicts (1, 5): max survives.
        extremes.push(3.0, 4.0);
        assert_eq!(extremes.range(), ValueRange { min: 0.0, max: 9.0 });
        // Evicts (0, 9): both extremes rescanned.
        extremes.push(3.0, 4.0);
        assert_eq!(extremes.range(), ValueRange { min: 2.0, max: 4.0 });
    }

    #[test]
    fn test_shift_columns() {
        let layout = PlotLayout {
            render: RenderBounds::new(0.0, 3.0, 0.0, 1.0),
            axis: AxisBounds::new(0.0, 1.0),
            stat_count: 1,
            point_count: 4,
        };
        let mut vertices: Vec<Vertex> = (0..8)
            .map(|i| Vertex::new([(i / 2) as f32, i as f32], [0.0; 4]))
            .collect();
        shift_columns(&mut vertices, 0, 1, &layout);
        let xs: Vec<f32> = vertices[..6].iter().map(|v| v.x()).collect();
        let ys: Vec<f32> = vertices[..6].iter().map(|v| v.y()).collect();
        assert_eq!(xs, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(ys, vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }
}
