//! Asset loading/parsers.
//! OBJ meshes are parsed with `tobj` and collapsed into a deduplicated,
//! GPU-ready vertex + `u32` index representation.

pub mod mesh;
pub mod obj;

pub use mesh::{Aabb, MeshData, Vertex, VertexDeduper};
pub use obj::{LoadStats, ObjLoadOptions, load_obj_from_path, load_obj_from_str, load_obj_with_stats};
