//! OBJ mesh loading on top of `tobj`, deduplicated into a single indexed mesh.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use corelib::{CoreError, CoreResult};
use glam::Vec3;

use crate::mesh::{MeshData, Vertex, VertexDeduper};

/// Knobs for turning OBJ attributes into [`Vertex`] values.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjLoadOptions {
    /// Store `1.0 - v`: OBJ puts the texture origin bottom-left, GPUs top-left.
    pub flip_v: bool,
    /// Used when the file has no per-vertex colors.
    pub default_color: [f32; 3],
    /// Used when the file has no normals and `generate_normals` is off.
    pub default_normal: [f32; 3],
    /// Compute flat face normals when the file has none.
    pub generate_normals: bool,
}

impl Default for ObjLoadOptions {
    fn default() -> Self {
        Self {
            flip_v: true,
            default_color: [1.0, 1.0, 1.0],
            default_normal: [0.0, 0.0, 1.0],
            generate_normals: false,
        }
    }
}

/// Counters gathered while loading, mostly for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub shapes: usize,
    pub materials: usize,
    pub corners: usize,
    pub unique_vertices: usize,
}

fn tobj_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Load an OBJ mesh from a file path. A sibling `.mtl` is read if referenced.
pub fn load_obj_from_path(path: impl AsRef<Path>, opts: &ObjLoadOptions) -> Result<MeshData> {
    load_obj_with_stats(path, opts).map(|(mesh, _)| mesh)
}

/// Like [`load_obj_from_path`], also returning [`LoadStats`].
pub fn load_obj_with_stats(
    path: impl AsRef<Path>,
    opts: &ObjLoadOptions,
) -> Result<(MeshData, LoadStats)> {
    let path = path.as_ref();
    log::info!("Loading model {}", path.display());

    let (models, materials) = tobj::load_obj(path, &tobj_options())
        .with_context(|| format!("Failed to load OBJ file: {}", path.display()))?;
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    scan_face_corners(BufReader::new(file))
        .with_context(|| format!("Failed to read OBJ file: {}", path.display()))?
        .check()
        .with_context(|| format!("Invalid mesh in {}", path.display()))?;
    let materials = match materials {
        Ok(materials) => materials.len(),
        Err(e) => {
            log::warn!("Material library for {} not loaded: {}", path.display(), e);
            0
        }
    };

    let (mesh, stats) = build_mesh(&models, materials, opts)
        .with_context(|| format!("Invalid mesh in {}", path.display()))?;
    log::info!(
        "Finished loading model: {} shapes, {} corners -> {} unique vertices",
        stats.shapes,
        stats.corners,
        stats.unique_vertices
    );
    Ok((mesh, stats))
}

/// Load an OBJ mesh from a [`BufRead`] implementation. Material libraries are skipped.
pub fn load_obj_from_reader<R: BufRead>(mut reader: R, opts: &ObjLoadOptions) -> Result<MeshData> {
    let mut src = String::new();
    reader
        .read_to_string(&mut src)
        .context("Failed to read OBJ data")?;
    scan_face_corners(src.as_bytes())?.check()?;

    let (models, _) = tobj::load_obj_buf(&mut src.as_bytes(), &tobj_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .context("Failed to parse OBJ data")?;
    let (mesh, _) = build_mesh(&models, 0, opts)?;
    Ok(mesh)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str, opts: &ObjLoadOptions) -> Result<MeshData> {
    load_obj_from_reader(io::Cursor::new(contents), opts)
}

/// Face-corner attribute counts over every `f` line of the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct FaceCorners {
    total: usize,
    texcoords: usize,
    normals: usize,
}

impl FaceCorners {
    /// tobj pads a corner without `vt`/`vn` with index 0 when other corners have
    /// one, so a partially present attribute has to be caught on the source.
    fn check(self) -> CoreResult<()> {
        for (attribute, found) in [("texcoord", self.texcoords), ("normal", self.normals)] {
            if found != 0 && found != self.total {
                return Err(CoreError::AttributeMismatch {
                    attribute,
                    expected: self.total,
                    found,
                });
            }
        }
        Ok(())
    }
}

fn scan_face_corners<R: BufRead>(reader: R) -> io::Result<FaceCorners> {
    let mut corners = FaceCorners::default();
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if parts.next() != Some("f") {
            continue;
        }
        for corner in parts {
            let mut split = corner.split('/').skip(1);
            corners.total += 1;
            if split.next().is_some_and(|vt| !vt.is_empty()) {
                corners.texcoords += 1;
            }
            if split.next().is_some_and(|vn| !vn.is_empty()) {
                corners.normals += 1;
            }
        }
    }
    Ok(corners)
}

fn build_mesh(
    models: &[tobj::Model],
    materials: usize,
    opts: &ObjLoadOptions,
) -> CoreResult<(MeshData, LoadStats)> {
    let corners = models.iter().map(|m| m.mesh.indices.len()).sum();
    let mut dedup = VertexDeduper::with_capacity(corners);

    for model in models {
        log::debug!(
            "Shape '{}': {} corners",
            model.name,
            model.mesh.indices.len()
        );
        append_shape(&mut dedup, &model.mesh, opts)?;
    }

    let stats = LoadStats {
        shapes: models.len(),
        materials,
        corners: dedup.corner_count(),
        unique_vertices: dedup.unique_count(),
    };
    let mesh = dedup.finish();
    if !mesh.is_valid() {
        return Err(CoreError::EmptyMesh);
    }
    Ok((mesh, stats))
}

fn append_shape(
    dedup: &mut VertexDeduper,
    mesh: &tobj::Mesh,
    opts: &ObjLoadOptions,
) -> CoreResult<()> {
    let corners = mesh.indices.len();
    let texcoord_indices = optional_stream("texcoord", &mesh.texcoord_indices, corners)?;
    let normal_indices = optional_stream("normal", &mesh.normal_indices, corners)?;
    let has_colors =
        !mesh.vertex_color.is_empty() && mesh.vertex_color.len() == mesh.positions.len();

    // Triangulated by tobj, so corners come in threes.
    for start in (0..corners).step_by(3) {
        let face = start..(start + 3).min(corners);
        let flat_normal = match normal_indices {
            None if opts.generate_normals => {
                Some(face_normal(mesh, &mesh.indices[face.clone()], opts)?)
            }
            _ => None,
        };

        for i in face {
            let pi = mesh.indices[i] as usize;
            let position = fetch::<3>("position", &mesh.positions, pi)?;

            let color = if has_colors {
                fetch::<3>("color", &mesh.vertex_color, pi)?
            } else {
                opts.default_color
            };

            let tex_coord = match texcoord_indices {
                Some(ti) => {
                    let [u, v] = fetch::<2>("texcoord", &mesh.texcoords, ti[i] as usize)?;
                    if opts.flip_v { [u, 1.0 - v] } else { [u, v] }
                }
                None => [0.0, 0.0],
            };

            let normal = match (normal_indices, flat_normal) {
                (Some(ni), _) => fetch::<3>("normal", &mesh.normals, ni[i] as usize)?,
                (None, Some(n)) => n,
                (None, None) => opts.default_normal,
            };

            dedup.push(Vertex::new(position, color, tex_coord, normal))?;
        }
    }
    Ok(())
}

/// An attribute index stream is either absent or parallel to the position stream.
fn optional_stream<'a>(
    attribute: &'static str,
    indices: &'a [u32],
    corners: usize,
) -> CoreResult<Option<&'a [u32]>> {
    match indices.len() {
        0 => Ok(None),
        n if n == corners => Ok(Some(indices)),
        found => Err(CoreError::AttributeMismatch {
            attribute,
            expected: corners,
            found,
        }),
    }
}

fn fetch<const N: usize>(attribute: &'static str, values: &[f32], index: usize) -> CoreResult<[f32; N]> {
    let len = values.len() / N;
    if index >= len {
        return Err(CoreError::AttributeOutOfRange {
            attribute,
            index,
            len,
        });
    }
    let mut out = [0.0; N];
    out.copy_from_slice(&values[N * index..N * index + N]);
    Ok(out)
}

fn face_normal(mesh: &tobj::Mesh, corners: &[u32], opts: &ObjLoadOptions) -> CoreResult<[f32; 3]> {
    if corners.len() < 3 {
        return Ok(opts.default_normal);
    }
    let p = |i: usize| -> CoreResult<Vec3> {
        fetch::<3>("position", &mesh.positions, corners[i] as usize).map(Vec3::from_array)
    };
    let (a, b, c) = (p(0)?, p(1)?, p(2)?);
    let n = (b - a).cross(c - a).normalize_or_zero();
    if n == Vec3::ZERO {
        Ok(opts.default_normal)
    } else {
        Ok(n.to_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";

    // Two triangles sharing an edge, written as separate faces.
    const SHARED_QUAD: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    #[test]
    fn parse_simple_triangle() {
        let mesh = load_obj_from_str(TRIANGLE, &ObjLoadOptions::default()).expect("parse triangle");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.is_valid());
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[1].color, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn shared_corners_are_deduplicated() {
        let mesh = load_obj_from_str(SHARED_QUAD, &ObjLoadOptions::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn polygons_are_triangulated() {
        let src = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let mesh = load_obj_from_str(src, &ObjLoadOptions::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn texcoord_v_is_flipped_by_default() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0.25 0.25
f 1/1 2/1 3/1
";
        let flipped = load_obj_from_str(src, &ObjLoadOptions::default()).unwrap();
        assert_eq!(flipped.vertices[0].tex_coord, [0.25, 0.75]);

        let opts = ObjLoadOptions {
            flip_v: false,
            ..Default::default()
        };
        let raw = load_obj_from_str(src, &opts).unwrap();
        assert_eq!(raw.vertices[0].tex_coord, [0.25, 0.25]);
    }

    #[test]
    fn missing_attributes_fall_back_to_defaults() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";
        let opts = ObjLoadOptions {
            default_color: [0.5, 0.5, 0.5],
            default_normal: [0.0, 1.0, 0.0],
            ..Default::default()
        };
        let mesh = load_obj_from_str(src, &opts).unwrap();
        for v in &mesh.vertices {
            assert_eq!(v.tex_coord, [0.0, 0.0]);
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
            assert_eq!(v.color, [0.5, 0.5, 0.5]);
        }
    }

    #[test]
    fn generated_normals_follow_winding() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";
        let opts = ObjLoadOptions {
            generate_normals: true,
            ..Default::default()
        };
        let mesh = load_obj_from_str(src, &opts).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));

        let flipped = load_obj_from_str(&src.replace("f 1 2 3", "f 1 3 2"), &opts).unwrap();
        assert!(flipped.vertices.iter().all(|v| v.normal == [0.0, 0.0, -1.0]));
    }

    #[test]
    fn vertex_colors_are_used() {
        let src = "\
v 0 0 0 1 0 0
v 1 0 0 0 1 0
v 0 1 0 0 0 1
f 1 2 3
";
        let mesh = load_obj_from_str(src, &ObjLoadOptions::default()).unwrap();
        assert_eq!(mesh.vertices[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].color, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn shapes_merge_into_one_mesh() {
        let src = format!("o first\n{TRIANGLE}o second\nf 1/1/1 3/3/1 2/2/1\n");
        let mesh = load_obj_from_str(&src, &ObjLoadOptions::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 1]);
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = load_obj_from_str("# nothing here\nv 0 0 0\n", &ObjLoadOptions::default())
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CoreError>(), Some(&CoreError::EmptyMesh));
    }

    #[test]
    fn mismatched_streams_are_rejected() {
        assert_eq!(
            optional_stream("normal", &[0, 1], 3),
            Err(CoreError::AttributeMismatch {
                attribute: "normal",
                expected: 3,
                found: 2
            })
        );
        assert_eq!(optional_stream("normal", &[], 3), Ok(None));
        assert_eq!(
            fetch::<3>("normal", &[0.0; 6], 2),
            Err(CoreError::AttributeOutOfRange {
                attribute: "normal",
                index: 2,
                len: 2
            })
        );
    }

    #[test]
    fn faces_missing_some_normals_are_rejected() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 1 0
f 1//1 2//1 3//1
f 1 3 2
";
        let err = load_obj_from_str(src, &ObjLoadOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CoreError>(),
            Some(&CoreError::AttributeMismatch {
                attribute: "normal",
                expected: 6,
                found: 3
            })
        );
    }

    #[test]
    fn faces_missing_some_texcoords_are_rejected() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0.5 0.5
f 1/1 2/1 3
";
        let err = load_obj_from_str(src, &ObjLoadOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::AttributeMismatch {
                attribute: "texcoord",
                ..
            })
        ));
    }

    #[test]
    fn mixed_file_on_disk_is_rejected() {
        let path = std::env::temp_dir().join(format!("modelup-mixed-{}.obj", std::process::id()));
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//1 2//1 3//1\nf 1 3 2\n")
            .unwrap();
        let err = load_obj_from_path(&path, &ObjLoadOptions::default()).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(format!("{err:#}").contains("normal index stream has 3 entries, expected 6"));
    }

    #[test]
    fn out_of_range_face_index_is_rejected() {
        // tobj bounds-checks face indices before they reach the deduper.
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n";
        let err = load_obj_from_str(src, &ObjLoadOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse OBJ data"));
    }

    #[test]
    fn face_corner_scan_counts_attributes() {
        let corners = scan_face_corners("# c\nf 1/1/1 2//2 3/3\nvn 0 0 1\nf 4 5 6\n".as_bytes())
            .unwrap();
        assert_eq!(
            corners,
            FaceCorners {
                total: 6,
                texcoords: 2,
                normals: 2,
            }
        );
        assert!(FaceCorners { total: 3, texcoords: 0, normals: 3 }.check().is_ok());
    }

    #[test]
    fn missing_material_library_is_not_fatal() {
        let path = std::env::temp_dir().join(format!("modelup-mtl-{}.obj", std::process::id()));
        std::fs::write(
            &path,
            "mtllib nothere.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n",
        )
        .unwrap();
        let loaded = load_obj_with_stats(&path, &ObjLoadOptions::default());
        std::fs::remove_file(&path).ok();

        let (mesh, stats) = loaded.unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(
            stats,
            LoadStats {
                shapes: 1,
                materials: 0,
                corners: 3,
                unique_vertices: 3,
            }
        );
    }

    #[test]
    fn load_from_path_reports_stats() {
        let path = std::env::temp_dir().join(format!("modelup-quad-{}.obj", std::process::id()));
        std::fs::write(&path, SHARED_QUAD).unwrap();
        let (mesh, stats) = load_obj_with_stats(&path, &ObjLoadOptions::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(
            stats,
            LoadStats {
                shapes: 1,
                materials: 0,
                corners: 6,
                unique_vertices: 4,
            }
        );
    }

    #[test]
    fn missing_file_names_path() {
        let err = load_obj_from_path("/definitely/not/here.obj", &ObjLoadOptions::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.obj"));
    }
}
