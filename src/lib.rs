pub mod ring_buffer;
pub mod history;
pub mod sample_sync;
pub mod sampler;
pub mod bounds;
pub mod buffers;
pub mod renderer;
pub mod graph;

pub mod config;
pub mod error;
pub mod perf_profiling;

pub mod gpu;
pub mod cli;

pub use bounds::{AxisBounds, RenderBounds};
pub use config::{GraphConfig, GraphStyle};
pub use error::GraphError;
pub use graph::Graph;
pub use history::{MetricId, MetricKind, MultiRateHistory, SampleHistory, SampleRate, StatHistory};
pub use renderer::ValueRange;
