use std::f32::consts::TAU;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::bounds::{AxisBounds, RenderBounds};
use crate::config::{GraphConfig, GraphStyle};
use crate::gpu::mesh::Color;
use crate::gpu::renderer::GpuGraphRenderer;
use crate::graph::Graph;
use crate::history::{MetricId, MetricKind, MultiRateHistory};
use crate::renderer::ValueRange;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render graph frames of a synthetic stat stream to disk
    Render {
        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Graph config (JSON); defaults to a line graph of every synthetic metric
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of frames to render
        #[arg(long, default_value_t = 240)]
        frames: usize,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 300)]
        height: u32,
    },
    /// Run the CPU pipeline only, printing one JSON line per frame
    Trace {
        /// Graph config (JSON); defaults to a line graph of every synthetic metric
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of frames to trace
        #[arg(long, default_value_t = 60)]
        frames: usize,

        /// Viewport width
        #[arg(long, default_value_t = 800.0)]
        width: f32,

        /// Viewport height
        #[arg(long, default_value_t = 300.0)]
        height: f32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { out, config, frames, width, height } => {
            let config = load_config(config.as_deref())?;
            pollster::block_on(render_offline(config, out, frames, width, height))?;
        }
        Commands::Trace { config, frames, width, height } => {
            let config = load_config(config.as_deref())?;
            trace(config, frames, RenderBounds::from_size(width, height))?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<GraphConfig> {
    match path {
        Some(path) => Ok(GraphConfig::load(path)?),
        None => Ok(GraphConfig {
            style: GraphStyle::Line,
            metrics: SyntheticStream::METRICS.iter().map(|&(id, _)| id).collect(),
            sample_window: 120,
            ..GraphConfig::default()
        }),
    }
}

/// Deterministic network-like stats: one round-trip gauge and two byte counters.
pub struct SyntheticStream {
    history: MultiRateHistory,
    tick: u64,
    frame: usize,
}

impl SyntheticStream {
    pub const METRICS: [(MetricId, MetricKind); 3] = [
        (MetricId(1), MetricKind::Gauge),
        (MetricId(2), MetricKind::Counter),
        (MetricId(3), MetricKind::Counter),
    ];
    const TICK_SECONDS: f64 = 1.0 / 20.0;
    /// Ticks simulated per rendered frame, cycled.
    const SCHEDULE: [u32; 9] = [1, 0, 2, 0, 1, 5, 0, 3, 1];

    pub fn new(capacity: usize) -> Self {
        let mut history = MultiRateHistory::new(capacity, capacity);
        for (metric, kind) in Self::METRICS {
            history.register(metric, kind);
        }
        Self { history, tick: 0, frame: 0 }
    }

    pub fn history(&self) -> &MultiRateHistory {
        &self.history
    }

    /// Simulate the ticks that happen before the next frame.
    pub fn advance_frame(&mut self) {
        let ticks = Self::SCHEDULE[self.frame % Self::SCHEDULE.len()];
        for _ in 0..ticks {
            let t = self.tick as f32;
            let samples = [
                (MetricId(1), 40.0 + 15.0 * (t * 0.11).sin() + 5.0 * (t * 0.73).sin()),
                (MetricId(2), 1200.0 + 800.0 * (t * 0.05).sin().abs()),
                (MetricId(3), 300.0 + 250.0 * ((t * 0.17).cos() * 0.5 + 0.5)),
            ];
            self.history
                .record_tick(self.tick as f64 * Self::TICK_SECONDS, &samples);
            self.tick += 1;
        }
        self.frame += 1;
    }
}

/// Evenly spaced hues, one per metric.
pub fn palette(index: usize, total: usize) -> Color {
    let hue = index as f32 / total.max(1) as f32;
    hsv_to_rgb(hue, 0.65, 0.95, 0.9)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32, alpha: f32) -> Color {
    let channel = |offset: f32| {
        let k = (offset + hue * 6.0) % 6.0;
        value - value * saturation * k.min(4.0 - k).clamp(0.0, 1.0)
    };
    [channel(5.0), channel(3.0), channel(1.0), alpha]
}

/// Axis for the next frame: zero-based, topped at the next power of two above
/// the plotted maximum so it only moves on large changes.
fn axis_for(range: ValueRange) -> AxisBounds {
    let top = range.max.max(1.0);
    AxisBounds::new(range.min.min(0.0), 2f32.powf(top.log2().ceil()))
}

#[derive(Serialize)]
struct TraceLine {
    frame: usize,
    points_advanced: usize,
    min: f32,
    max: f32,
    vertices: usize,
}

fn trace(config: GraphConfig, frames: usize, viewport: RenderBounds) -> Result<()> {
    let rate = config.sample_rate;
    let mut stream = SyntheticStream::new(config.sample_window as usize * 2);
    let mut graph = Graph::new(config)?;
    let mut axis = AxisBounds::default();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for frame in 0..frames {
        stream.advance_frame();
        let range = graph.advance_and_rebuild(stream.history().history(rate), viewport, axis, palette);
        axis = axis_for(range);
        let line = TraceLine {
            frame,
            points_advanced: graph.last_points_advanced(),
            min: range.min,
            max: range.max,
            vertices: graph.buffers().vertices.len(),
        };
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    }
    Ok(())
}

async fn render_offline(config: GraphConfig, out_dir: PathBuf, frames: usize, width: u32, height: u32) -> Result<()> {
    std::fs::create_dir_all(&out_dir)?;

    // WGPU Init
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None, // Headless
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await?;

    let texture_desc = wgpu::TextureDescriptor {
        label: Some("Target Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    };

    let texture = device.create_texture(&texture_desc);
    let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Buffer for reading back data
    let u32_size = std::mem::size_of::<u32>() as u32;
    let unpadded_bytes_per_row = u32_size * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row_padding = (align - unpadded_bytes_per_row % align) % align;
    let padded_bytes_per_row = unpadded_bytes_per_row + padded_bytes_per_row_padding;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let rate = config.sample_rate;
    let mut stream = SyntheticStream::new(config.sample_window as usize * 2);
    let mut graph = Graph::new(config)?;
    let mut renderer = GpuGraphRenderer::new(device, queue, texture_desc.format);
    let viewport = RenderBounds::from_size(width as f32, height as f32);
    let mut axis = AxisBounds::default();

    println!("Rendering {} frames to {:?}...", frames, out_dir);

    for i in 0..frames {
        stream.advance_frame();
        let range = graph.advance_and_rebuild(stream.history().history(rate), viewport, axis, palette);
        axis = axis_for(range);

        renderer.upload(graph.buffers(), &viewport);
        renderer.render(&texture_view);

        let mut encoder = renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            texture_desc.size,
        );
        renderer.queue().submit(Some(encoder.finish()));

        // Map buffer and save
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        renderer.device().poll(wgpu::Maintain::Wait);
        rx.recv()??;

        let data = buffer_slice.get_mapped_range();
        let mut unpadded_data = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + (width * 4) as usize;
            unpadded_data.extend_from_slice(&data[start..end]);
        }

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &unpadded_data, width, height, image::ColorType::Rgba8)?;

        drop(data);
        output_buffer.unmap();

        if i % 60 == 0 {
            print!(".");
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphParams;
    use crate::history::{SampleHistory, SampleRate};

    #[test]
    fn test_palette_is_distinct_and_opaque_enough() {
        let colors: Vec<Color> = (0..3).map(|i| palette(i, 3)).collect();
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        for c in &colors {
            assert!(c.iter().all(|v| (0.0..=1.0).contains(v)));
            assert_eq!(c[3], 0.9);
        }
    }

    #[test]
    fn test_axis_rounds_up_to_power_of_two() {
        let axis = axis_for(ValueRange { min: 3.0, max: 50.0 });
        assert_eq!(axis, AxisBounds::new(0.0, 64.0));
        assert_eq!(axis_for(ValueRange::default()), AxisBounds::new(0.0, 1.0));
    }

    #[test]
    fn test_stream_follows_schedule() {
        let mut stream = SyntheticStream::new(64);
        for _ in 0..SyntheticStream::SCHEDULE.len() {
            stream.advance_frame();
        }
        let total: u32 = SyntheticStream::SCHEDULE.iter().sum();
        let ticks = stream.history().history(SampleRate::EveryTick).timestamps();
        assert_eq!(ticks.len(), total as usize);
    }

    #[test]
    fn test_trace_pipeline_runs() {
        let config = load_config(None).unwrap();
        let GraphParams { point_count, .. } = config.params_for_width(800.0);
        let mut stream = SyntheticStream::new(240);
        let mut graph = Graph::new(config).unwrap();
        let viewport = RenderBounds::from_size(800.0, 300.0);
        let mut axis = AxisBounds::default();
        for _ in 0..30 {
            stream.advance_frame();
            let range = graph.advance_and_rebuild(stream.history().history(SampleRate::EveryTick), viewport, axis, palette);
            axis = axis_for(range);
        }
        assert_eq!(graph.buffers().vertices.len(), 3 * 2 * point_count);
        assert!(axis.max >= 64.0);
    }
}
