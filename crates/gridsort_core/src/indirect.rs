//! Indirect draw arguments
//!
//! Layout matches an indexed indirect draw command (five 32-bit words), so
//! the struct can be copied straight into a device buffer.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// How compacted triangles are submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    /// One three-index proxy triangle instanced once per output triangle;
    /// the vertex stage fetches the real indices by instance id.
    #[default]
    ProxyInstanced,
    /// A single instance drawing every compacted index.
    Indexed,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawArgs {
    pub index_count_per_instance: u32,
    pub instance_count: u32,
    pub start_index: u32,
    pub base_vertex_index: i32,
    pub start_instance: u32,
}

impl IndirectDrawArgs {
    /// Arguments drawing `triangles` compacted triangles.
    pub fn for_triangles(mode: DrawMode, triangles: u32) -> Self {
        let (index_count_per_instance, instance_count) = match mode {
            DrawMode::ProxyInstanced => (3, triangles),
            DrawMode::Indexed => (3 * triangles, 1),
        };
        Self {
            index_count_per_instance,
            instance_count,
            ..Self::default()
        }
    }

    /// Indices the draw will consume across all instances.
    #[inline]
    pub fn total_indices(&self) -> u32 {
        self.index_count_per_instance * self.instance_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_indices() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_triangles_draw_nothing() {
        let proxy = IndirectDrawArgs::for_triangles(DrawMode::ProxyInstanced, 0);
        assert_eq!(proxy.instance_count, 0);
        assert_eq!(proxy.index_count_per_instance, 3);
        assert!(proxy.is_empty());

        let indexed = IndirectDrawArgs::for_triangles(DrawMode::Indexed, 0);
        assert_eq!(indexed.index_count_per_instance, 0);
        assert!(indexed.is_empty());
    }

    #[test]
    fn test_modes_agree_on_index_total() {
        for triangles in [1, 5, 1234] {
            let proxy = IndirectDrawArgs::for_triangles(DrawMode::ProxyInstanced, triangles);
            let indexed = IndirectDrawArgs::for_triangles(DrawMode::Indexed, triangles);
            assert_eq!(proxy.total_indices(), 3 * triangles);
            assert_eq!(indexed.total_indices(), 3 * triangles);
            assert_eq!(indexed.instance_count, 1);
        }
    }

    #[test]
    fn test_word_layout() {
        let args = IndirectDrawArgs::for_triangles(DrawMode::ProxyInstanced, 5);
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&args));
        assert_eq!(words, &[3, 5, 0, 0, 0]);
    }
}
