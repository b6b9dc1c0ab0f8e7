use std::path::Path;

use glam::DVec3;

use crate::{element::VH, error::Error, mesh::Mesh};

impl Mesh {
    /// Load the triangles of an OBJ file as a 2-dimensional mesh. All models
    /// in the file end up in one mesh. Faces that are not triangles are
    /// rejected.
    pub fn load_obj(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::InvalidObjFile(path.to_path_buf()));
        }
        let options = tobj::LoadOptions::default();
        let (models, _) =
            tobj::load_obj(path, &options).map_err(|e| Error::ObjLoadFailed(format!("{}", e)))?;
        let mut outmesh = Mesh::new(2)?;
        let mut positions = Vec::new();
        let mut fvs: Vec<VH> = Vec::with_capacity(3);
        for model in models {
            let mesh = model.mesh;
            if mesh.positions.len() % 3 != 0 {
                return Err(Error::IncorrectNumberOfCoordinates(mesh.positions.len()));
            }
            positions.clear();
            positions.extend(
                mesh.positions
                    .chunks(3)
                    .map(|triplet| DVec3::new(triplet[0], triplet[1], triplet[2])),
            );
            let verts = outmesh.add_vertices(&positions)?;
            // Empty arities mean every face is a triangle.
            let arities: Vec<usize> = if mesh.face_arities.is_empty() {
                vec![3; mesh.indices.len() / 3]
            } else {
                mesh.face_arities.iter().map(|a| *a as usize).collect()
            };
            let mut start = 0usize;
            for size in arities {
                if size != 3 {
                    return Err(Error::NonTriangularFace(size));
                }
                let indices = &mesh.indices[start..(start + size)];
                start += size;
                fvs.clear();
                for i in indices {
                    fvs.push(
                        *verts
                            .get(*i as usize)
                            .ok_or(Error::InvalidVertex((*i).into()))?,
                    );
                }
                outmesh.add_element(&fvs)?;
            }
        }
        Ok(outmesh)
    }
}
