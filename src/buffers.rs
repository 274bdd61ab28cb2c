//! Vertex and index storage for every tracked metric of a graph.
//!
//! Layout: metric `s`, point `p` owns vertices `2 * (s * point_count + p)`
//! ("below") and the one after it ("above"). Each metric is a ribbon of two
//! triangles per consecutive pair of points.

use crate::config::GraphParams;
use crate::gpu::mesh::{Color, Vertex};

/// Vertex/index arrays ready for submission to a triangle rasterizer.
#[derive(Clone, Debug, Default)]
pub struct GraphBuffers {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl GraphBuffers {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

/// Index of the "below" vertex of `point` in metric `stat`.
#[inline]
pub fn vertex_index(stat: usize, point: usize, point_count: usize) -> usize {
    2 * (stat * point_count + point)
}

/// Cheap FNV-1a hash over the bit patterns of a color.
pub fn color_hash(color: &Color) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for component in color {
        hash ^= component.to_bits() as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Owns the graph's buffers and keeps their topology and colors current.
#[derive(Default)]
pub struct BufferManager {
    buffers: GraphBuffers,
    stat_count: usize,
    point_count: usize,
    color_hashes: Vec<u64>,
    reallocations: u64,
}

impl BufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffers(&self) -> &GraphBuffers {
        &self.buffers
    }

    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.buffers.vertices
    }

    pub fn stat_count(&self) -> usize {
        self.stat_count
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Number of times the vertex or index storage changed size.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Drop all geometry while keeping the allocations.
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.color_hashes.clear();
        self.stat_count = 0;
        self.point_count = 0;
    }

    /// Rebuild the index topology when the stat or point count changed and
    /// recolor the vertices of every metric whose color changed.
    ///
    /// Returns true when the topology was rebuilt; vertex positions are then
    /// stale and must be regenerated.
    pub fn update_if_needed<F>(&mut self, params: &GraphParams, colors: F) -> bool
    where
        F: Fn(usize, usize) -> Color,
    {
        let GraphParams { stat_count, point_count, .. } = *params;
        let topology_changed = stat_count != self.stat_count || point_count != self.point_count;
        if topology_changed {
            self.rebuild_topology(stat_count, point_count);
        }

        for stat in 0..stat_count {
            let color = colors(stat, stat_count);
            let hash = color_hash(&color);
            if !topology_changed && self.color_hashes[stat] == hash {
                continue;
            }
            self.color_hashes[stat] = hash;
            let start = vertex_index(stat, 0, point_count);
            let end = vertex_index(stat + 1, 0, point_count);
            for vertex in &mut self.buffers.vertices[start..end] {
                vertex.color = color;
            }
        }

        topology_changed
    }

    fn rebuild_topology(&mut self, stat_count: usize, point_count: usize) {
        log::debug!(
            "Rebuilding graph topology: {} stats x {} points -> {} stats x {} points",
            self.stat_count,
            self.point_count,
            stat_count,
            point_count
        );
        self.stat_count = stat_count;
        self.point_count = point_count;

        let vertex_count = 2 * stat_count * point_count;
        let index_count = 6 * stat_count * point_count.saturating_sub(1);
        if vertex_count != self.buffers.vertices.len() || index_count != self.buffers.indices.len() {
            self.reallocations += 1;
        }
        self.buffers.vertices.resize(vertex_count, Vertex::default());
        self.buffers.indices.clear();
        self.buffers.indices.reserve(index_count);
        for stat in 0..stat_count {
            for p in 0..point_count.saturating_sub(1) {
                let below = vertex_index(stat, p, point_count) as u32;
                let above = below + 1;
                let next_below = below + 2;
                let next_above = below + 3;
                self.buffers.indices.extend_from_slice(&[
                    below, next_below, above,
                    above, next_below, next_above,
                ]);
            }
        }
        self.color_hashes.clear();
        self.color_hashes.resize(stat_count, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = [1.0, 0.0, 0.0, 1.0];
    const BLUE: Color = [0.0, 0.0, 1.0, 1.0];

    fn params(stat_count: usize, point_count: usize) -> GraphParams {
        GraphParams { stat_count, point_count, samples_per_point: 1.0 }
    }

    #[test]
    fn test_topology() {
        let mut manager = BufferManager::new();
        assert!(manager.update_if_needed(&params(2, 3), |_, _| RED));
        let buffers = manager.buffers();
        assert_eq!(buffers.vertices.len(), 12);
        assert_eq!(buffers.indices.len(), 24);
        assert_eq!(&buffers.indices[..6], &[0, 2, 1, 1, 2, 3]);
        // Second metric starts after the first metric's 3 points.
        assert_eq!(&buffers.indices[12..18], &[6, 8, 7, 7, 8, 9]);
        assert!(buffers.indices.iter().all(|&i| (i as usize) < buffers.vertices.len()));
    }

    #[test]
    fn test_unchanged_topology_is_not_rebuilt() {
        let mut manager = BufferManager::new();
        manager.update_if_needed(&params(1, 4), |_, _| RED);
        let reallocations = manager.reallocations();
        assert!(!manager.update_if_needed(&params(1, 4), |_, _| RED));
        assert_eq!(manager.reallocations(), reallocations);
    }

    #[test]
    fn test_recolors_only_changed_metric() {
        let mut manager = BufferManager::new();
        manager.update_if_needed(&params(2, 2), |_, _| RED);
        // Mark positions so we can see they survive recoloring.
        for v in manager.vertices_mut() {
            v.position = [5.0, 6.0];
        }
        let topology = manager.update_if_needed(&params(2, 2), |i, _| if i == 1 { BLUE } else { RED });
        assert!(!topology);
        let vertices = &manager.buffers().vertices;
        assert!(vertices[..4].iter().all(|v| v.color == RED));
        assert!(vertices[4..].iter().all(|v| v.color == BLUE));
        assert!(vertices.iter().all(|v| v.position == [5.0, 6.0]));
    }

    #[test]
    fn test_single_point_has_no_triangles() {
        let mut manager = BufferManager::new();
        manager.update_if_needed(&params(3, 1), |_, _| RED);
        assert_eq!(manager.buffers().vertices.len(), 6);
        assert!(manager.buffers().is_empty());
    }

    #[test]
    fn test_color_hash_distinguishes_components() {
        assert_ne!(color_hash(&RED), color_hash(&BLUE));
        assert_eq!(color_hash(&RED), color_hash(&[1.0, 0.0, 0.0, 1.0]));
    }
}
