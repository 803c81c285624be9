// src/atlas/shelf_pack.rs
// Reference chart packer: per-triangle charts, planar projection, shelf packing.
// This file exists so the pipeline runs end-to-end without an external packer.
// RELEVANT FILES:src/atlas/mod.rs,src/raster/mod.rs

use glam::{Vec2, Vec3};

use super::{ChartPacker, PackError, PackInput, PackOptions, PackedAtlas, PackedMesh, PackedVertex};

/// Packs every triangle as its own chart.
///
/// Each triangle is projected onto the plane of its dominant normal axis,
/// scaled by a global texel density, and shelf-packed with the configured
/// padding. Chart disjointness holds by construction; atlas occupancy is
/// traded away for that, which is acceptable at the scene sizes the demo
/// and tests bake. Deterministic for identical inputs.
#[derive(Debug, Clone)]
pub struct TriShelfPacker {
    /// Target fraction of the atlas area charts may occupy at the initial
    /// density guess.
    pub fill_ratio: f32,
    /// Density back-off attempts before giving up.
    pub max_attempts: u32,
}

impl Default for TriShelfPacker {
    fn default() -> Self {
        Self {
            fill_ratio: 0.65,
            max_attempts: 16,
        }
    }
}

struct Chart {
    input: usize,
    /// Projected corners, translated so the chart origin is (0, 0).
    corners: [Vec2; 3],
    extent: Vec2,
}

struct Placement {
    origin: Vec2,
}

impl ChartPacker for TriShelfPacker {
    fn pack(
        &self,
        inputs: &[PackInput<'_>],
        options: &PackOptions,
    ) -> Result<PackedAtlas, PackError> {
        let resolution = options.resolution;
        // Highest pixel coordinate a packed UV may take. Dividing by (L-1)
        // later must keep normalized UVs inside [0, (L-1)/L], which pins
        // pixel coordinates to (L-1)^2/L.
        let max_px = ((resolution - 1) * (resolution - 1)) as f32 / resolution as f32;

        let charts = project_charts(inputs);

        let total_area: f32 = charts
            .iter()
            .map(|c| (c.extent.x * c.extent.y).max(1e-6))
            .sum();
        let max_dim = charts
            .iter()
            .map(|c| c.extent.x.max(c.extent.y))
            .fold(0.0f32, f32::max)
            .max(1e-6);

        // Initial texels-per-world-unit density, capped so the largest
        // chart fits the atlas on its own.
        let mut scale = (self.fill_ratio * max_px * max_px / total_area).sqrt();
        scale = scale.min((max_px - 2.0 - options.padding as f32).max(1.0) / max_dim);

        let mut last_failure = 0usize;
        for attempt in 0..self.max_attempts {
            match shelf_place(&charts, scale, options.padding as f32, max_px) {
                Ok(placements) => {
                    log::debug!(
                        "shelf pack: {} charts at {:.3} texels/unit (attempt {})",
                        charts.len(),
                        scale,
                        attempt + 1
                    );
                    return Ok(emit(inputs, &charts, &placements, scale, resolution));
                }
                Err(chart_idx) => {
                    last_failure = charts[chart_idx].input;
                    scale *= 0.85;
                }
            }
        }

        Err(PackError {
            submesh: last_failure,
            reason: format!(
                "charts do not fit a {resolution}x{resolution} atlas with padding {} after {} density reductions",
                options.padding, self.max_attempts
            ),
        })
    }
}

/// Project every triangle of every input onto its dominant-axis plane.
/// Chart order is (input, triangle), which placement and emission preserve.
fn project_charts(inputs: &[PackInput<'_>]) -> Vec<Chart> {
    let mut charts = Vec::new();
    for (input_idx, input) in inputs.iter().enumerate() {
        for tri in input.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri
                .iter()
                .map(|&i| input.positions[(i + input.index_offset) as usize])
                .collect();
            let normal = (p[1] - p[0]).cross(p[2] - p[0]);
            let axis = dominant_axis(normal);
            let (u, v) = match axis {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            let projected = [
                Vec2::new(p[0][u], p[0][v]),
                Vec2::new(p[1][u], p[1][v]),
                Vec2::new(p[2][u], p[2][v]),
            ];
            let min = projected[0].min(projected[1]).min(projected[2]);
            let max = projected[0].max(projected[1]).max(projected[2]);
            charts.push(Chart {
                input: input_idx,
                corners: [
                    projected[0] - min,
                    projected[1] - min,
                    projected[2] - min,
                ],
                extent: max - min,
            });
        }
    }
    charts
}

fn dominant_axis(n: Vec3) -> usize {
    let a = n.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// Shelf-pack all charts at the given density. Returns per-chart origins in
/// chart order, or the index of the first chart that did not fit.
fn shelf_place(
    charts: &[Chart],
    scale: f32,
    padding: f32,
    max_px: f32,
) -> Result<Vec<Placement>, usize> {
    // Tallest-first keeps shelves dense; the sort is stable so equal
    // heights keep (input, triangle) order and the result is deterministic.
    let mut order: Vec<usize> = (0..charts.len()).collect();
    order.sort_by(|&a, &b| {
        let ha = charts[a].extent.y;
        let hb = charts[b].extent.y;
        hb.partial_cmp(&ha).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut placements: Vec<Option<Placement>> = (0..charts.len()).map(|_| None).collect();
    let mut cursor = Vec2::ZERO;
    let mut shelf_height = 0.0f32;

    for &idx in &order {
        let chart = &charts[idx];
        // Integer chart footprint: one texel beyond the scaled extent so
        // edge samples land inside the chart rectangle.
        let w = (chart.extent.x * scale).ceil() + 1.0;
        let h = (chart.extent.y * scale).ceil() + 1.0;

        if cursor.x + w - 1.0 > max_px {
            cursor.x = 0.0;
            cursor.y += shelf_height + padding;
            shelf_height = 0.0;
        }
        if cursor.x + w - 1.0 > max_px || cursor.y + h - 1.0 > max_px {
            return Err(idx);
        }

        placements[idx] = Some(Placement { origin: cursor });
        cursor.x += w + padding;
        shelf_height = shelf_height.max(h);
    }

    Ok(placements.into_iter().map(|p| p.unwrap()).collect())
}

/// Build the per-input packed meshes: three vertices per triangle carrying
/// the source xref and the assigned pixel-space UV.
fn emit(
    inputs: &[PackInput<'_>],
    charts: &[Chart],
    placements: &[Placement],
    scale: f32,
    resolution: u32,
) -> PackedAtlas {
    let mut meshes: Vec<PackedMesh> = (0..inputs.len()).map(|_| PackedMesh::default()).collect();

    let mut chart_iter = charts.iter().zip(placements.iter());
    for (input_idx, input) in inputs.iter().enumerate() {
        let mesh = &mut meshes[input_idx];
        for tri in input.indices.chunks_exact(3) {
            let (chart, placement) = chart_iter.next().expect("chart per triangle");
            debug_assert_eq!(chart.input, input_idx);
            for (corner, &src_index) in chart.corners.iter().zip(tri.iter()) {
                let local = mesh.vertices.len() as u32;
                mesh.vertices.push(PackedVertex {
                    xref: src_index + input.index_offset,
                    uv: placement.origin + *corner * scale,
                });
                mesh.indices.push(local);
            }
        }
    }

    PackedAtlas {
        width: resolution,
        height: resolution,
        meshes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_input<'a>(
        positions: &'a [Vec3],
        normals: &'a [Vec3],
        uvs: &'a [Vec2],
        indices: &'a [u32],
    ) -> PackInput<'a> {
        PackInput {
            positions,
            normals,
            uvs,
            indices,
            index_offset: 0,
        }
    }

    #[test]
    fn packs_a_quad_within_the_clamp_rect() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        let normals = vec![Vec3::Y; 4];
        let uvs = vec![Vec2::ZERO; 4];
        let indices = vec![0, 1, 2, 0, 2, 3];

        let packer = TriShelfPacker::default();
        let atlas = packer
            .pack(
                &[quad_input(&positions, &normals, &uvs, &indices)],
                &PackOptions {
                    padding: 6,
                    resolution: 256,
                },
            )
            .unwrap();

        assert_eq!(atlas.meshes.len(), 1);
        let mesh = &atlas.meshes[0];
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices.len(), 6);
        let max_px = 255.0 * 255.0 / 256.0;
        for v in &mesh.vertices {
            assert!(v.uv.x >= 0.0 && v.uv.x <= max_px);
            assert!(v.uv.y >= 0.0 && v.uv.y <= max_px);
            assert!((v.xref as usize) < positions.len());
        }
    }

    #[test]
    fn chart_rects_keep_padding_apart() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 4.0),
            Vec3::new(0.0, 0.0, 4.0),
        ];
        let normals = vec![Vec3::Y; 4];
        let uvs = vec![Vec2::ZERO; 4];
        let indices = vec![0, 1, 2, 0, 2, 3];
        let padding = 6u32;

        let packer = TriShelfPacker::default();
        let atlas = packer
            .pack(
                &[quad_input(&positions, &normals, &uvs, &indices)],
                &PackOptions {
                    padding,
                    resolution: 128,
                },
            )
            .unwrap();

        // Per-triangle bounding rectangles must not come closer than the
        // padding in at least one axis.
        let mesh = &atlas.meshes[0];
        let rect = |tri: usize| {
            let vs = &mesh.vertices[tri * 3..tri * 3 + 3];
            let min = vs[0].uv.min(vs[1].uv).min(vs[2].uv);
            let max = vs[0].uv.max(vs[1].uv).max(vs[2].uv);
            (min, max)
        };
        let (min_a, max_a) = rect(0);
        let (min_b, max_b) = rect(1);
        let gap_x = (min_b.x - max_a.x).max(min_a.x - max_b.x);
        let gap_y = (min_b.y - max_a.y).max(min_a.y - max_b.y);
        assert!(
            gap_x >= padding as f32 - 1.0 || gap_y >= padding as f32 - 1.0,
            "charts packed closer than padding: gaps {gap_x}, {gap_y}"
        );
    }

    #[test]
    fn overfull_atlas_is_rejected() {
        // Two charts with padding wider than the atlas cannot coexist at
        // any density: the second chart overflows both shelf axes.
        let positions = vec![
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let normals = vec![Vec3::Y; 3];
        let uvs = vec![Vec2::ZERO; 3];
        let indices = vec![0, 1, 2];

        let inputs: Vec<PackInput<'_>> = (0..2)
            .map(|_| quad_input(&positions, &normals, &uvs, &indices))
            .collect();
        let packer = TriShelfPacker::default();
        let err = packer
            .pack(
                &inputs,
                &PackOptions {
                    padding: 60,
                    resolution: 64,
                },
            )
            .unwrap_err();
        assert!(err.reason.contains("do not fit"));
    }
}
