//! Sample geometries for emitters and specimens, and the detector geometry.

use base::{
    math::{DVec3, Onb, Ray, NEAR_ZERO},
    random::canonical,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Surface from which points are drawn uniformly.
///
/// Implementations hold no sampling state; all randomness comes from the
/// generator passed in.
pub trait SampleGeometry: Send + Sync {
    /// Returns a point uniformly distributed on the surface.
    fn sample_point(&self, rng: &mut dyn RngCore) -> DVec3;
}

/// A single fixed point.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSample {
    /// Position of the point.
    pub position: DVec3,
}

impl PointSample {
    /// Creates a point sample geometry.
    pub fn new(position: DVec3) -> Self { Self { position } }
}

impl SampleGeometry for PointSample {
    fn sample_point(&self, _: &mut dyn RngCore) -> DVec3 { self.position }
}

/// A flat disk.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSample {
    /// Centre of the disk.
    pub center: DVec3,
    /// Normal of the disk.
    pub normal: DVec3,
    /// Radius of the disk.
    pub radius: f64,
}

impl DiskSample {
    /// Creates a disk sample geometry.
    pub fn new(center: DVec3, normal: DVec3, radius: f64) -> Self {
        Self {
            center,
            normal,
            radius,
        }
    }
}

impl SampleGeometry for DiskSample {
    fn sample_point(&self, rng: &mut dyn RngCore) -> DVec3 {
        let onb = Onb::from_w(self.normal);
        let r = self.radius * canonical(rng).sqrt();
        let t = TAU * canonical(rng);
        self.center + onb.to_world(DVec3::new(r * t.cos(), r * t.sin(), 0.0))
    }
}

/// Intersection of a ray with a detector geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayHit {
    /// Distance along the ray.
    pub t: f64,
    /// Point of intersection.
    pub point: DVec3,
    /// Outward surface normal at the point.
    pub normal: DVec3,
    /// Whether the ray hit the outer side of the surface.
    pub front_face: bool,
}

/// Surface that catches scattered rays.
pub trait DetectorGeometry {
    /// Intersects the ray with the surface, considering only the requested
    /// faces.
    fn intersect(&self, ray: &Ray, front_faces: bool, back_faces: bool) -> Option<RayHit>;
}

/// Sphere centred at the origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SphereGeometry {
    /// Radius of the sphere.
    pub radius: f64,
}

impl SphereGeometry {
    /// Creates a sphere centred at the origin.
    pub fn new(radius: f64) -> Self { Self { radius } }
}

impl DetectorGeometry for SphereGeometry {
    fn intersect(&self, ray: &Ray, front_faces: bool, back_faces: bool) -> Option<RayHit> {
        let a = ray.dir.length_squared();
        let half_b = ray.org.dot(ray.dir);
        let c = ray.org.length_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();
        let near = (-half_b - sqrtd) / a;
        let far = (-half_b + sqrtd) / a;

        // A ray starting outside the sphere enters through the front face,
        // one starting inside can only leave through the back face.
        let (t, front_face) = if c > 0.0 {
            if !front_faces || near <= NEAR_ZERO {
                return None;
            }
            (near, true)
        } else {
            if !back_faces || far <= NEAR_ZERO {
                return None;
            }
            (far, false)
        };
        let point = ray.at(t);
        Some(RayHit {
            t,
            point,
            normal: point / self.radius,
            front_face,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use base::random::seeded_rng;

    #[test]
    fn test_sphere_back_face_from_inside() {
        let sphere = SphereGeometry::new(2.0);
        let ray = Ray::new(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0).normalize());
        let hit = sphere.intersect(&ray, false, true).unwrap();
        assert!(!hit.front_face);
        assert_abs_diff_eq!(hit.t, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.point.length(), 2.0, epsilon = 1e-12);
        assert!(sphere.intersect(&ray, true, false).is_none());
    }

    #[test]
    fn test_sphere_front_face_from_outside() {
        let sphere = SphereGeometry::new(1.0);
        let ray = Ray::new(DVec3::new(0.0, 0.0, 5.0), -DVec3::Z);
        let hit = sphere.intersect(&ray, true, false).unwrap();
        assert!(hit.front_face);
        assert_abs_diff_eq!(hit.t, 4.0, epsilon = 1e-12);
        assert!(sphere.intersect(&ray, false, true).is_none());
        let away = Ray::new(DVec3::new(0.0, 0.0, 5.0), DVec3::Z);
        assert!(sphere.intersect(&away, true, true).is_none());
    }

    #[test]
    fn test_disk_samples_stay_on_disk() {
        let disk = DiskSample::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(0.0, 1.0, 1.0), 0.5);
        let mut rng = seeded_rng(11, 0);
        for _ in 0..1000 {
            let p = disk.sample_point(&mut rng) - disk.center;
            assert!(p.length() <= 0.5 + 1e-12);
            assert_abs_diff_eq!(p.dot(disk.normal.normalize()), 0.0, epsilon = 1e-12);
        }
        let point = PointSample::new(DVec3::ONE);
        assert_eq!(point.sample_point(&mut rng), DVec3::ONE);
    }
}
