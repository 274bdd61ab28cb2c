//! Thick polyline geometry with mitred joints.

use glam::Vec2;

use super::{shift_columns, FrameContext, PlotLayout, PointExtremes, RenderUpdate, ValueRange};
use crate::buffers::vertex_index;
use crate::gpu::mesh::Vertex;
use crate::sampler::DataSampler;

/// Slope differences below this are treated as a straight joint.
const PARALLEL_SLOPE_EPSILON: f32 = 1e-4;

pub struct LineRenderer {
    half_thickness: f32,
    extremes: PointExtremes,
    scratch: Vec<Vec2>,
}

impl LineRenderer {
    pub fn new(thickness: f32) -> Self {
        Self {
            half_thickness: thickness * 0.5,
            extremes: PointExtremes::new(0),
            scratch: Vec::new(),
        }
    }

    pub fn half_thickness(&self) -> f32 {
        self.half_thickness
    }

    pub fn resize(&mut self, point_count: usize) {
        self.extremes.reset(point_count);
        self.scratch.clear();
        self.scratch.reserve(point_count);
    }

    pub fn clear(&mut self) {
        self.extremes.clear();
    }

    pub fn value_range(&self) -> ValueRange {
        self.extremes.range()
    }

    pub fn update_vertices(&mut self, frame: &FrameContext, sampler: &DataSampler, vertices: &mut [Vertex]) {
        let layout = &frame.layout;
        if layout.point_count < 2 {
            return;
        }
        let n = frame.points_to_advance;
        if frame.full_rebuild || n >= layout.point_count {
            self.rebuild_extremes(sampler, layout);
            self.regenerate(sampler, layout, vertices);
            return;
        }

        match frame.update() {
            RenderUpdate::NoChange => {}
            RenderUpdate::Scrolled => {
                self.push_extremes(sampler, layout, n);
                for stat in 0..layout.stat_count {
                    shift_columns(vertices, stat, n, layout);
                    // The new leftmost point lost its left-hand neighbour.
                    self.write_point(sampler, layout, vertices, stat, 0);
                    // The last shifted point gets a new right-hand neighbour.
                    for p in layout.point_count - n - 1..layout.point_count {
                        self.write_point(sampler, layout, vertices, stat, p);
                    }
                }
            }
            // Rescaling mitred joints in place is not exact, so regenerate.
            RenderUpdate::Rescaled => self.regenerate(sampler, layout, vertices),
            RenderUpdate::ScrolledAndRescaled => {
                self.push_extremes(sampler, layout, n);
                self.regenerate(sampler, layout, vertices);
            }
        }
    }

    fn push_extremes(&mut self, sampler: &DataSampler, layout: &PlotLayout, new_points: usize) {
        for p in layout.point_count - new_points..layout.point_count {
            let (low, high) = column_extremes(sampler, layout.stat_count, p);
            self.extremes.push(low, high);
        }
    }

    fn rebuild_extremes(&mut self, sampler: &DataSampler, layout: &PlotLayout) {
        self.extremes.clear();
        for p in 0..layout.point_count {
            let (low, high) = column_extremes(sampler, layout.stat_count, p);
            self.extremes.push(low, high);
        }
    }

    fn regenerate(&mut self, sampler: &DataSampler, layout: &PlotLayout, vertices: &mut [Vertex]) {
        log::trace!("Regenerating line geometry: {} stats x {} points", layout.stat_count, layout.point_count);
        for stat in 0..layout.stat_count {
            self.scratch.clear();
            self.scratch
                .extend((0..layout.point_count).map(|p| plot_point(sampler, layout, stat, p)));
            for p in 0..layout.point_count {
                let prev = p.checked_sub(1).map(|i| self.scratch[i]);
                let next = self.scratch.get(p + 1).copied();
                let (below, above) = ribbon_offsets(prev, self.scratch[p], next, self.half_thickness);
                let i = vertex_index(stat, p, layout.point_count);
                vertices[i].position = below.to_array();
                vertices[i + 1].position = above.to_array();
            }
        }
    }

    fn write_point(&self, sampler: &DataSampler, layout: &PlotLayout, vertices: &mut [Vertex], stat: usize, p: usize) {
        let prev = p.checked_sub(1).map(|i| plot_point(sampler, layout, stat, i));
        let next = (p + 1 < layout.point_count).then(|| plot_point(sampler, layout, stat, p + 1));
        let cur = plot_point(sampler, layout, stat, p);
        let (below, above) = ribbon_offsets(prev, cur, next, self.half_thickness);
        let i = vertex_index(stat, p, layout.point_count);
        vertices[i].position = below.to_array();
        vertices[i + 1].position = above.to_array();
    }
}

fn column_extremes(sampler: &DataSampler, stat_count: usize, p: usize) -> (f32, f32) {
    (0..stat_count)
        .map(|stat| sampler.value(stat, p))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

#[inline]
fn plot_point(sampler: &DataSampler, layout: &PlotLayout, stat: usize, p: usize) -> Vec2 {
    Vec2::new(layout.x_at(p), layout.y_at(sampler.value(stat, p)))
}

/// Vertices `(below, above)` bracketing `cur` at `half` distance from the line.
pub(crate) fn ribbon_offsets(prev: Option<Vec2>, cur: Vec2, next: Option<Vec2>, half: f32) -> (Vec2, Vec2) {
    match (prev, next) {
        (Some(prev), Some(next)) => mitre_offsets(prev, cur, next, half),
        (Some(prev), None) => perpendicular_offsets(next_direction(prev, cur), cur, half),
        (None, Some(next)) => perpendicular_offsets(next_direction(cur, next), cur, half),
        (None, None) => (cur - Vec2::Y * half, cur + Vec2::Y * half),
    }
}

fn next_direction(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}

fn perpendicular_offsets(direction: Vec2, at: Vec2, half: f32) -> (Vec2, Vec2) {
    let normal = if direction == Vec2::ZERO { Vec2::Y } else { direction.perp() };
    (at - normal * half, at + normal * half)
}

/// Intersect the lines parallel to both adjacent segments, each offset by
/// `half` perpendicular to its segment (`half * sqrt(1 + slope^2)` vertically).
fn mitre_offsets(prev: Vec2, cur: Vec2, next: Vec2, half: f32) -> (Vec2, Vec2) {
    let run_in = cur.x - prev.x;
    let run_out = next.x - cur.x;
    if run_in <= 0.0 || run_out <= 0.0 {
        return perpendicular_offsets(next_direction(prev, next), cur, half);
    }
    let slope_in = (cur.y - prev.y) / run_in;
    let slope_out = (next.y - cur.y) / run_out;
    let offset_in = half * (1.0 + slope_in * slope_in).sqrt();

    if (slope_in - slope_out).abs() < PARALLEL_SLOPE_EPSILON {
        return (cur - Vec2::Y * offset_in, cur + Vec2::Y * offset_in);
    }

    let offset_out = half * (1.0 + slope_out * slope_out).sqrt();
    let dx = (offset_out - offset_in) / (slope_in - slope_out);
    let above = Vec2::new(cur.x + dx, cur.y + slope_in * dx + offset_in);
    let below = Vec2::new(cur.x - dx, cur.y - slope_in * dx - offset_in);
    (below, above)
}
