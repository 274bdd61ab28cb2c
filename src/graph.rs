//! Per-frame entry point tying the pipeline together.
//!
//! Each frame: synchronizer (points to advance) -> sampler (new points) ->
//! bounds transformer (rescale) -> buffer manager (topology, colors) ->
//! renderer (shift old and compute new vertices).

use crate::bounds::{AffineTransform, AxisBounds, BoundsTransformer, RenderBounds};
use crate::buffers::{BufferManager, GraphBuffers};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::gpu::mesh::Color;
use crate::history::SampleHistory;
use crate::perf_profiling::{self, BufferStats};
use crate::renderer::{FrameContext, GraphRenderer, PlotLayout, RenderUpdate, ValueRange};
use crate::sample_sync::SampleSynchronizer;
use crate::sampler::DataSampler;

pub struct Graph {
    config: GraphConfig,
    synchronizer: SampleSynchronizer,
    sampler: DataSampler,
    bounds: Option<BoundsTransformer>,
    buffers: BufferManager,
    renderer: GraphRenderer,
    frame: u64,
    last_points_advanced: usize,
    last_update: RenderUpdate,
    last_y_transform: AffineTransform,
    last_stats: BufferStats,
}

impl Graph {
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let renderer = GraphRenderer::new(config.style, config.line_thickness);
        Ok(Self {
            config,
            synchronizer: SampleSynchronizer::new(),
            sampler: DataSampler::new(),
            bounds: None,
            buffers: BufferManager::new(),
            renderer,
            frame: 0,
            last_points_advanced: 0,
            last_update: RenderUpdate::NoChange,
            last_y_transform: AffineTransform::IDENTITY,
            last_stats: BufferStats::default(),
        })
    }

    pub fn buffers(&self) -> &GraphBuffers {
        self.buffers.buffers()
    }

    pub fn sampler(&self) -> &DataSampler {
        &self.sampler
    }

    pub fn last_points_advanced(&self) -> usize {
        self.last_points_advanced
    }

    pub fn last_update(&self) -> RenderUpdate {
        self.last_update
    }

    pub fn last_y_transform(&self) -> AffineTransform {
        self.last_y_transform
    }

    pub fn buffer_stats(&self) -> BufferStats {
        let buffers = self.buffers.buffers();
        BufferStats {
            vertices: buffers.vertices.len(),
            indices: buffers.indices.len(),
            reallocations: self.buffers.reallocations(),
        }
    }

    /// Advance by the samples that arrived since the last frame and bring the
    /// geometry up to date for `viewport` and `axis`.
    ///
    /// Returns the true range of the plotted values, meant to drive the axis
    /// bounds of the next frame.
    pub fn advance_and_rebuild<H, F>(
        &mut self,
        history: &H,
        viewport: RenderBounds,
        axis: AxisBounds,
        colors: F,
    ) -> ValueRange
    where
        H: SampleHistory + ?Sized,
        F: Fn(usize, usize) -> Color,
    {
        let range = crate::perf_time!("graph rebuild", self.rebuild(history, viewport, axis, colors));

        self.frame += 1;
        if perf_profiling::should_log_stats() {
            let stats = self.buffer_stats();
            stats.log(self.frame);
            if let Some(warning) = stats.check_churn(&self.last_stats) {
                log::warn!("{}", warning);
            }
            self.last_stats = stats;
        }
        range
    }

    fn rebuild<H, F>(&mut self, history: &H, viewport: RenderBounds, axis: AxisBounds, colors: F) -> ValueRange
    where
        H: SampleHistory + ?Sized,
        F: Fn(usize, usize) -> Color,
    {
        let params = self.config.params_for_width(viewport.width());
        if params.stat_count == 0 || params.point_count < 2 || !self.renderer.is_drawable() {
            if !self.buffers.buffers().vertices.is_empty() {
                log::debug!(
                    "Nothing to draw ({} stats, {} points); clearing geometry",
                    params.stat_count,
                    params.point_count
                );
            }
            self.buffers.clear();
            self.renderer.clear();
            self.bounds = None;
            self.last_points_advanced = 0;
            self.last_update = RenderUpdate::NoChange;
            self.last_y_transform = AffineTransform::IDENTITY;
            return ValueRange::default();
        }

        let topology_changed = self.buffers.update_if_needed(&params, &colors);
        if topology_changed {
            self.sampler.resize(params.stat_count, params.point_count);
            self.renderer.resize(params.point_count);
        }

        let points = self
            .synchronizer
            .compute_points_to_advance(history.timestamps(), params.samples_per_point);
        self.sampler.fill(
            history,
            &self.config.metrics,
            points,
            params.samples_per_point,
            self.synchronizer.unconsumed(),
        );

        let mut full_rebuild = topology_changed;
        let y_transform = match self.bounds.as_mut() {
            Some(bounds) => {
                let previous = bounds.render_bounds();
                let (_x, y) = bounds.compute_transforms_for_new_bounds(viewport, axis, points);
                if !previous.same_horizontal(&viewport) || !y.is_finite() {
                    full_rebuild = true;
                }
                y
            }
            None => {
                self.bounds = Some(BoundsTransformer::new(viewport, axis));
                full_rebuild = true;
                AffineTransform::IDENTITY
            }
        };

        let frame = FrameContext {
            layout: PlotLayout {
                render: viewport,
                axis,
                stat_count: params.stat_count,
                point_count: params.point_count,
            },
            points_to_advance: points,
            y_transform,
            full_rebuild,
        };
        log::trace!(
            "Frame {}: {:?}, {} points advanced, full rebuild: {}",
            self.frame,
            frame.update(),
            points,
            full_rebuild
        );
        self.renderer
            .update_vertices(&frame, &self.sampler, self.buffers.vertices_mut());

        self.last_points_advanced = points;
        self.last_update = frame.update();
        self.last_y_transform = y_transform;
        self.renderer.value_range()
    }
}
