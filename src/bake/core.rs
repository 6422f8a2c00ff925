use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Maximum number of UV channels a vertex instance can carry.
pub const MAX_UV_CHANNELS: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Vec2
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Z component of the 3D cross product of two planar vectors.
    #[must_use]
    pub const fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y))
    }

    #[must_use]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y))
    }

    /// Component-wise comparison within `tolerance`.
    #[must_use]
    pub fn equals(self, rhs: Self, tolerance: f32) -> bool {
        (self.x - rhs.x).abs() <= tolerance && (self.y - rhs.y).abs() <= tolerance
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Bit-exact hash key; `-0.0` and `0.0` map to the same key.
    #[must_use]
    pub fn bits_key(self) -> [u32; 2] {
        let canon = |v: f32| if v == 0.0 { 0.0f32.to_bits() } else { v.to_bits() };
        [canon(self.x), canon(self.y)]
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from(arr: [f32; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[must_use]
    pub const fn length_squared(self) -> f32 {
        self.dot(self)
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(self / len)
        } else {
            None
        }
    }

    /// Unit vector, or zero when the squared length is at or below `tolerance`.
    #[must_use]
    pub fn safe_normal(self, tolerance: f32) -> Self {
        let len_sq = self.length_squared();
        if len_sq.is_finite() && len_sq > tolerance {
            self / len_sq.sqrt()
        } else {
            Self::ZERO
        }
    }

    /// In-place normalization that leaves near-zero vectors untouched.
    pub fn normalize(&mut self) -> bool {
        let len_sq = self.length_squared();
        if len_sq.is_finite() && len_sq > Tolerance::SMALL_NUMBER {
            *self = *self / len_sq.sqrt();
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_nearly_zero(self, tolerance: f32) -> bool {
        self.x.abs() <= tolerance && self.y.abs() <= tolerance && self.z.abs() <= tolerance
    }

    #[must_use]
    pub fn contains_nan(self) -> bool {
        !(self.x.is_finite() && self.y.is_finite() && self.z.is_finite())
    }

    /// Component-wise comparison within `tolerance`.
    #[must_use]
    pub fn equals(self, rhs: Self, tolerance: f32) -> bool {
        (self.x - rhs.x).abs() <= tolerance
            && (self.y - rhs.y).abs() <= tolerance
            && (self.z - rhs.z).abs() <= tolerance
    }

    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    #[must_use]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    #[must_use]
    pub const fn mul_components(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    #[must_use]
    pub fn max_component(self) -> f32 {
        self.x.max(self.y).max(self.z)
    }

    /// Bit-exact hash key; `-0.0` and `0.0` map to the same key.
    #[must_use]
    pub fn bits_key(self) -> [u32; 3] {
        let canon = |v: f32| if v == 0.0 { 0.0f32.to_bits() } else { v.to_bits() };
        [canon(self.x), canon(self.y), canon(self.z)]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(arr: [f32; 3]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f32 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        rhs * self
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// `+1.0` for a right-handed (tangent, binormal, normal) frame, `-1.0` otherwise.
#[must_use]
pub fn basis_determinant_sign(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> f32 {
    if x_axis.dot(y_axis.cross(z_axis)) < 0.0 { -1.0 } else { 1.0 }
}

/// Projects `x_axis` and `y_axis` onto the plane of `z_axis` and normalizes all three.
pub fn create_orthonormal_basis(x_axis: &mut Vec3, y_axis: &mut Vec3, z_axis: &mut Vec3) {
    const DELTA: f32 = 0.000_01;
    let zz = z_axis.length_squared();
    if zz > 0.0 {
        *x_axis -= *z_axis * (x_axis.dot(*z_axis) / zz);
        *y_axis -= *z_axis * (y_axis.dot(*z_axis) / zz);
    }
    if x_axis.length_squared() < DELTA * DELTA {
        *x_axis = y_axis.cross(*z_axis);
    }
    if y_axis.length_squared() < DELTA * DELTA {
        *y_axis = x_axis.cross(*z_axis);
    }
    x_axis.normalize();
    y_axis.normalize();
    z_axis.normalize();
}

// ─────────────────────────────────────────────────────────────────────────────
// LinearColor
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl LinearColor {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    #[must_use]
    pub fn equals(self, rhs: Self, tolerance: f32) -> bool {
        (self.r - rhs.r).abs() <= tolerance
            && (self.g - rhs.g).abs() <= tolerance
            && (self.b - rhs.b).abs() <= tolerance
            && (self.a - rhs.a).abs() <= tolerance
    }

    /// Quantizes to 8-bit RGBA without sRGB conversion.
    #[must_use]
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl Default for LinearColor {
    fn default() -> Self {
        Self::WHITE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Matrix3
// ─────────────────────────────────────────────────────────────────────────────

/// Row-major 3×3 matrix using row-vector convention (`v * M`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    pub rows: [Vec3; 3],
}

impl Matrix3 {
    pub const IDENTITY: Self = Self::from_rows(Vec3::X, Vec3::Y, Vec3::Z);

    #[must_use]
    pub const fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Self {
        Self { rows: [r0, r1, r2] }
    }

    #[must_use]
    pub fn determinant(&self) -> f32 {
        self.rows[0].dot(self.rows[1].cross(self.rows[2]))
    }

    /// Inverse, or `None` when the matrix is singular within `tolerance`.
    #[must_use]
    pub fn inverse(&self, tolerance: f32) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() <= tolerance {
            return None;
        }
        let [r0, r1, r2] = self.rows;
        // Columns of the inverse are the cross products of the rows.
        let c0 = r1.cross(r2) / det;
        let c1 = r2.cross(r0) / det;
        let c2 = r0.cross(r1) / det;
        Some(Self::from_rows(
            Vec3::new(c0.x, c1.x, c2.x),
            Vec3::new(c0.y, c1.y, c2.y),
            Vec3::new(c0.z, c1.z, c2.z),
        ))
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let [r0, r1, r2] = self.rows;
        Self::from_rows(
            Vec3::new(r0.x, r1.x, r2.x),
            Vec3::new(r0.y, r1.y, r2.y),
            Vec3::new(r0.z, r1.z, r2.z),
        )
    }

    #[must_use]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rows[0] * v.x + self.rows[1] * v.y + self.rows[2] * v.z
    }

    #[must_use]
    pub fn mul(&self, rhs: &Self) -> Self {
        Self::from_rows(
            rhs.transform_vector(self.rows[0]),
            rhs.transform_vector(self.rows[1]),
            rhs.transform_vector(self.rows[2]),
        )
    }

    #[must_use]
    pub fn scale(s: Vec3) -> Self {
        Self::from_rows(
            Vec3::new(s.x, 0.0, 0.0),
            Vec3::new(0.0, s.y, 0.0),
            Vec3::new(0.0, 0.0, s.z),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bounds
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox {
    /// Inverted box that any `include` turns valid.
    pub const EMPTY: Self = Self {
        min: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
        max: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
    };

    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, Self::include)
    }

    #[must_use]
    pub fn include(self, p: Vec3) -> Self {
        Self::new(self.min.min(p), self.max.max(p))
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

impl Default for BBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Comparison thresholds shared by every bake stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f32,
}

impl Tolerance {
    pub const SMALL_NUMBER: f32 = 1.0e-8;
    pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;
    pub const THRESH_POINTS_ARE_SAME: f32 = 0.000_02;
    pub const THRESH_NORMALS_ARE_SAME: f32 = 0.000_02;
    pub const THRESH_UVS_ARE_SAME: f32 = 1.0 / 1024.0;

    /// Position welding tolerance used by the vertex buffer builder.
    pub const POINTS: Self = Self { eps: Self::THRESH_POINTS_ARE_SAME };
    pub const NORMALS: Self = Self { eps: Self::THRESH_NORMALS_ARE_SAME };
    pub const UVS: Self = Self { eps: Self::THRESH_UVS_ARE_SAME };
    /// Exact comparison.
    pub const EXACT: Self = Self { eps: 0.0 };

    #[must_use]
    pub const fn new(eps: f32) -> Self {
        Self { eps }
    }

    #[must_use]
    pub const fn eps_squared(self) -> f32 {
        self.eps * self.eps
    }

    #[must_use]
    pub fn points_equal(self, a: Vec3, b: Vec3) -> bool {
        a.equals(b, self.eps)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::POINTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_normal_zeroes_tiny_vectors() {
        assert_eq!(Vec3::new(1e-6, 0.0, 0.0).safe_normal(Tolerance::SMALL_NUMBER), Vec3::ZERO);
        let n = Vec3::new(0.0, 3.0, 4.0).safe_normal(Tolerance::SMALL_NUMBER);
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn matrix_inverse_round_trips() {
        let m = Matrix3::from_rows(
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(1.0, 3.0, 0.0),
            Vec3::new(0.5, 0.25, 1.0),
        );
        let inv = m.inverse(Tolerance::SMALL_NUMBER).expect("invertible");
        let id = m.mul(&inv);
        for (row, expected) in id.rows.iter().zip(Matrix3::IDENTITY.rows) {
            assert!(row.equals(expected, 1e-5), "{row:?} != {expected:?}");
        }
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = Matrix3::from_rows(Vec3::X, Vec3::X * 2.0, Vec3::Z);
        assert!(m.inverse(Tolerance::SMALL_NUMBER).is_none());
    }

    #[test]
    fn determinant_sign_tracks_handedness() {
        assert_eq!(basis_determinant_sign(Vec3::X, Vec3::Y, Vec3::Z), 1.0);
        assert_eq!(basis_determinant_sign(Vec3::X, -Vec3::Y, Vec3::Z), -1.0);
    }

    #[test]
    fn orthonormal_basis_removes_normal_component() {
        let mut x = Vec3::new(1.0, 0.0, 0.5);
        let mut y = Vec3::new(0.0, 1.0, 0.5);
        let mut z = Vec3::Z;
        create_orthonormal_basis(&mut x, &mut y, &mut z);
        assert!(x.dot(z).abs() < 1e-6);
        assert!(y.dot(z).abs() < 1e-6);
        assert!((x.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bbox_union_and_center() {
        let a = BBox::from_points([Vec3::ZERO, Vec3::ONE]);
        let b = BBox::from_points([Vec3::new(-1.0, 0.0, 0.0)]);
        let u = a.union(b);
        assert_eq!(u.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(u.center(), Vec3::new(0.0, 0.5, 0.5));
        assert!(!BBox::EMPTY.is_valid());
    }

    #[test]
    fn bits_key_merges_signed_zero() {
        assert_eq!(Vec2::new(-0.0, 1.0).bits_key(), Vec2::new(0.0, 1.0).bits_key());
    }
}
