use glam::{DMat3, DVec3};

use crate::{
    element::{Entity, EH},
    math,
    mesh::Mesh,
};

/// Supplies the metric used to measure edges and score element shapes.
///
/// Implementors only have to provide [`SizeField::transform_at`]: the linear
/// map taking a physical vector at a point to metric space, where the desired
/// edge length is 1 in every direction. Everything else is derived from it,
/// but can be overridden.
pub trait SizeField {
    fn transform_at(&self, x: DVec3) -> DMat3;

    /// The metric transform at the reference coordinates `xi` of `element`.
    fn transform(&self, mesh: &Mesh, element: Entity, xi: DVec3) -> DMat3 {
        let points = mesh.entity_points(element);
        self.transform_at(math::map_point(&points, xi))
    }

    /// Length of an edge in metric space.
    fn measure(&self, mesh: &Mesh, e: EH) -> f64 {
        let [a, b] = mesh.edge_vertices(e);
        let (pa, pb) = (mesh.point(a), mesh.point(b));
        (self.transform_at((pa + pb) * 0.5) * (pb - pa)).length()
    }

    /// Shape quality of the simplex with the given vertex positions, measured
    /// in metric space. See [`math::tet_quality`] and [`math::tri_quality`].
    fn simplex_quality(&self, points: &[DVec3], reference: Option<DVec3>) -> f64 {
        let t = self.transform_at(math::centroid(points));
        match *points {
            [a, b, c, d] => {
                let q = math::tet_quality(t * a, t * b, t * c, t * d);
                // A reflecting transform flips every volume.
                if t.determinant() < 0.0 { -q } else { q }
            }
            [a, b, c] => {
                let q = math::tri_quality(t * a, t * b, t * c, None);
                match reference {
                    Some(r) if math::tri_normal(a, b, c).dot(r) < 0.0 => -q,
                    _ => q,
                }
            }
            _ => 0.0,
        }
    }

    fn quality(&self, mesh: &Mesh, element: Entity) -> f64 {
        self.simplex_quality(&mesh.entity_points(element), None)
    }
}

/// Isotropic metric asking for the same edge length everywhere.
#[derive(Debug, Clone, Copy)]
pub struct UniformSizeField {
    size: f64,
}

impl UniformSizeField {
    pub fn new(size: f64) -> Self {
        UniformSizeField { size }
    }

    /// Size field asking for the mean edge length of the mesh, i.e. one that
    /// leaves a well shaped mesh as it is.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let (sum, count) = mesh.edges().fold((0.0, 0usize), |(sum, count), e| {
            let [a, b] = mesh.edge_vertices(e);
            (sum + mesh.point(a).distance(mesh.point(b)), count + 1)
        });
        if count == 0 || sum <= 0.0 {
            UniformSizeField::new(1.0)
        } else {
            UniformSizeField::new(sum / count as f64)
        }
    }

    pub fn size(&self) -> f64 {
        self.size
    }
}

impl SizeField for UniformSizeField {
    fn transform_at(&self, _x: DVec3) -> DMat3 {
        DMat3::from_diagonal(DVec3::splat(self.size.recip()))
    }
}

/// Constant anisotropic metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricSizeField {
    transform: DMat3,
}

impl MetricSizeField {
    pub fn new(transform: DMat3) -> Self {
        MetricSizeField { transform }
    }

    /// Metric asking for the edge lengths `sizes` along the orthonormal
    /// directions `axes`.
    pub fn from_axes(axes: [DVec3; 3], sizes: [f64; 3]) -> Self {
        let rotation = DMat3::from_cols(axes[0], axes[1], axes[2]).transpose();
        let scale = DMat3::from_diagonal(DVec3::new(
            sizes[0].recip(),
            sizes[1].recip(),
            sizes[2].recip(),
        ));
        MetricSizeField::new(scale * rotation)
    }
}

impl SizeField for MetricSizeField {
    fn transform_at(&self, _x: DVec3) -> DMat3 {
        self.transform
    }
}

/// Metric given by a function of position.
pub struct FunctionSizeField<F>
where
    F: Fn(DVec3) -> DMat3,
{
    func: F,
}

impl<F> FunctionSizeField<F>
where
    F: Fn(DVec3) -> DMat3,
{
    pub fn new(func: F) -> Self {
        FunctionSizeField { func }
    }
}

impl<F> SizeField for FunctionSizeField<F>
where
    F: Fn(DVec3) -> DMat3,
{
    fn transform_at(&self, x: DVec3) -> DMat3 {
        (self.func)(x)
    }
}
