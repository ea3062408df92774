use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::keywords::value::Minimum;
use crate::engine::keywords::{NodeValueKeyword, Vec3NodeValueKeyword};
use crate::engine::node::{GENERATION_ONLY, NodeContext, NodeType, ProcedureNode};
use crate::engine::region::Region;
use nalgebra::{Point3, Unit};
use tracing::info;

/// Publishes an infinite cylinder.
#[derive(Debug)]
pub struct CylindricalRegionNode {
    origin_frac: Vec3NodeValueKeyword,
    vector: Vec3NodeValueKeyword,
    radius: NodeValueKeyword,
}

impl Default for CylindricalRegionNode {
    fn default() -> Self {
        Self {
            origin_frac: Vec3NodeValueKeyword::new(
                "OriginFrac",
                "Point on the cylinder axis, in fractional coordinates",
                [0.0; 3],
            ),
            vector: Vec3NodeValueKeyword::new("Vector", "Direction of the cylinder axis", [0.0, 0.0, 1.0]),
            radius: NodeValueKeyword::new("Radius", "Cylinder radius", 5.0)
                .with_minimum(Minimum::Exclusive(0.0)),
        }
    }
}

impl ProcedureNode for CylindricalRegionNode {
    fn node_type(&self) -> NodeType {
        NodeType::CylindricalRegion
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let axis = Unit::try_new(self.vector.as_vector(), 1.0e-8).ok_or(NodeError::InvalidValue {
            keyword: "Vector",
            message: "the axis vector has zero length".to_string(),
        })?;
        let radius = self.radius.get().as_double();
        if !(radius > 0.0) {
            return Err(NodeError::InvalidValue {
                keyword: "Radius",
                message: format!("evaluates to {}, which is not positive", radius),
            });
        }
        let origin = ctx
            .configuration()
            .cell()
            .fractional_to_real(&Point3::from(self.origin_frac.as_vector()));
        info!(
            "[CylindricalRegion] Cylinder through ({:.3},{:.3},{:.3}) with radius {}.",
            origin.x, origin.y, origin.z, radius
        );
        ctx.publish_region(Region::Cylinder {
            origin,
            axis,
            radius,
        });
        Ok(())
    }

    crate::node_keywords!(origin_frac, vector, radius);
}

/// Publishes the free space further than a tolerance from every atom present.
#[derive(Debug)]
pub struct GeneralRegionNode {
    tolerance: NodeValueKeyword,
}

impl Default for GeneralRegionNode {
    fn default() -> Self {
        Self {
            tolerance: NodeValueKeyword::new(
                "Tolerance",
                "Minimum distance from any existing atom",
                5.0,
            )
            .with_minimum(Minimum::Exclusive(0.0)),
        }
    }
}

impl ProcedureNode for GeneralRegionNode {
    fn node_type(&self) -> NodeType {
        NodeType::GeneralRegion
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let tolerance = self.tolerance.get().as_double();
        if !(tolerance > 0.0) {
            return Err(NodeError::InvalidValue {
                keyword: "Tolerance",
                message: format!("evaluates to {}, which is not positive", tolerance),
            });
        }
        let atoms: Vec<Point3<f64>> = ctx
            .configuration()
            .molecules()
            .flat_map(|(_, m)| m.positions().iter().copied())
            .collect();
        info!(
            "[GeneralRegion] Free space further than {} from {} atom(s).",
            tolerance,
            atoms.len()
        );
        ctx.publish_region(Region::FreeSpace { tolerance, atoms });
        Ok(())
    }

    crate::node_keywords!(tolerance);
}
