mod export;
mod generator;
mod mesh;
mod patch;
mod refine;
mod simplify;

pub use export::{write_off, write_obj, ExportFormat, ExportInfo};
pub use generator::{generate_mesh, generate_mesh_with, generate_meshes, GeometryError};
pub use mesh::TriangleMesh;
pub use patch::{PatchMesh, PatchVertex, QuadPatch};
pub use refine::{
    refine_mesh, refine_patches, refinement_signature, RefineContext, SubdivisionCriterion,
    TessellationParams,
};
pub use simplify::{adapt_soma, simplify};
