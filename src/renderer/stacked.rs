//! Stacked-area geometry: every metric is a band on top of the previous ones.

use super::{
    shift_and_rescale_columns, shift_columns, FrameContext, PlotLayout, PointExtremes, RenderUpdate, ValueRange,
};
use crate::bounds::{AffineTransform, AxisBounds};
use crate::buffers::vertex_index;
use crate::gpu::mesh::Vertex;
use crate::sampler::DataSampler;

pub struct StackedAreaRenderer {
    /// Lowest and highest cumulative sum of each column (unclamped).
    stack_heights: PointExtremes,
    /// Axis the current vertices were computed for.
    drawn_axis: Option<AxisBounds>,
}

impl Default for StackedAreaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StackedAreaRenderer {
    pub fn new() -> Self {
        Self {
            stack_heights: PointExtremes::new(0),
            drawn_axis: None,
        }
    }

    pub fn resize(&mut self, point_count: usize) {
        self.stack_heights.reset(point_count);
        self.drawn_axis = None;
    }

    pub fn clear(&mut self) {
        self.stack_heights.clear();
        self.drawn_axis = None;
    }

    pub fn value_range(&self) -> ValueRange {
        self.stack_heights.range()
    }

    pub fn update_vertices(&mut self, frame: &FrameContext, sampler: &DataSampler, vertices: &mut [Vertex]) {
        let layout = &frame.layout;
        if layout.point_count < 2 {
            return;
        }
        let n = frame.points_to_advance;
        let update = frame.update();
        let must_regenerate = frame.full_rebuild
            || n >= layout.point_count
            || self.drawn_axis.is_none()
            || (matches!(update, RenderUpdate::Rescaled | RenderUpdate::ScrolledAndRescaled)
                && self.has_clamped_columns(&layout.axis));

        if must_regenerate {
            self.regenerate(sampler, layout, vertices);
        } else {
            match update {
                RenderUpdate::NoChange => {}
                RenderUpdate::Scrolled => {
                    for stat in 0..layout.stat_count {
                        shift_columns(vertices, stat, n, layout);
                    }
                    self.write_new_columns(sampler, layout, vertices, n);
                }
                RenderUpdate::Rescaled => {
                    let end = 2 * layout.stat_count * layout.point_count;
                    rescale_in_place(&mut vertices[..end], &frame.y_transform, layout.render.y_max);
                }
                RenderUpdate::ScrolledAndRescaled => {
                    for stat in 0..layout.stat_count {
                        shift_and_rescale_columns(vertices, stat, n, layout, &frame.y_transform);
                    }
                    let end = 2 * layout.stat_count * layout.point_count;
                    clamp_to_top(&mut vertices[..end], layout.render.y_max);
                    self.write_new_columns(sampler, layout, vertices, n);
                }
            }
        }
        self.drawn_axis = Some(layout.axis);
    }

    /// Whether some column was clamped at the previous axis maximum and the
    /// axis moved since, so clamped vertices cannot be rescaled.
    fn has_clamped_columns(&self, axis: &AxisBounds) -> bool {
        match self.drawn_axis {
            Some(drawn) => drawn != *axis && self.stack_heights.max() > drawn.max,
            None => true,
        }
    }

    fn regenerate(&mut self, sampler: &DataSampler, layout: &PlotLayout, vertices: &mut [Vertex]) {
        log::trace!("Regenerating stacked geometry: {} stats x {} points", layout.stat_count, layout.point_count);
        self.stack_heights.clear();
        for p in 0..layout.point_count {
            let (low, high) = write_column(sampler, layout, vertices, p);
            self.stack_heights.push(low, high);
        }
    }

    fn write_new_columns(&mut self, sampler: &DataSampler, layout: &PlotLayout, vertices: &mut [Vertex], n: usize) {
        for p in layout.point_count - n..layout.point_count {
            let (low, high) = write_column(sampler, layout, vertices, p);
            self.stack_heights.push(low, high);
        }
    }
}

/// Write every band of column `p` in stacking order and return the lowest and
/// highest cumulative sum of the column.
fn write_column(sampler: &DataSampler, layout: &PlotLayout, vertices: &mut [Vertex], p: usize) -> (f32, f32) {
    let x = layout.x_at(p);
    let ceiling = layout.axis.max;
    let mut base = 0.0f32;
    let mut low = 0.0f32;
    let mut high = 0.0f32;
    for stat in 0..layout.stat_count {
        let top = base + sampler.value(stat, p);
        let i = vertex_index(stat, p, layout.point_count);
        vertices[i].position = [x, layout.y_at(base.min(ceiling))];
        vertices[i + 1].position = [x, layout.y_at(top.min(ceiling))];
        low = low.min(top);
        high = high.max(top);
        base = top;
    }
    (low, high)
}

fn rescale_in_place(vertices: &mut [Vertex], y_transform: &AffineTransform, top: f32) {
    for vertex in vertices {
        vertex.position[1] = y_transform.apply(vertex.position[1]).min(top);
    }
}

fn clamp_to_top(vertices: &mut [Vertex], top: f32) {
    for vertex in vertices {
        vertex.position[1] = vertex.position[1].min(top);
    }
}
