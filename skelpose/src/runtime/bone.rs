use crate::{BoneData, Inherit};

/// Normalizes an angle in degrees into `(-180, 180]`.
pub(crate) fn wrap_degrees(degrees: f32) -> f32 {
    degrees - ((degrees / 360.0 - 0.5).ceil()) * 360.0
}

/// Same as [`wrap_degrees`] for a value already within one turn of the range.
pub(crate) fn wrap_once(mut degrees: f32) -> f32 {
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees < -180.0 {
        degrees += 360.0;
    }
    degrees
}

fn cos_deg(degrees: f32) -> f32 {
    degrees.to_radians().cos()
}

fn sin_deg(degrees: f32) -> f32 {
    degrees.to_radians().sin()
}

/// A bone's 2x2 world matrix and world translation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorldTransform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl WorldTransform {
    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Maps a world point into this transform's local space.
    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> [f32; 2] {
        let det = self.determinant();
        let x = world_x - self.world_x;
        let y = world_y - self.world_y;
        [
            (x * self.d - y * self.b) / det,
            (y * self.a - x * self.c) / det,
        ]
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> [f32; 2] {
        [
            local_x * self.a + local_y * self.b + self.world_x,
            local_x * self.c + local_y * self.d + self.world_y,
        ]
    }
}

/// Skeleton placement: root bones are composed against it instead of a parent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RootTransform {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl RootTransform {
    /// The matrix a root bone behaves as if it were parented to.
    pub fn as_parent(&self) -> WorldTransform {
        WorldTransform {
            a: self.scale_x,
            b: 0.0,
            c: 0.0,
            d: self.scale_y,
            world_x: self.x,
            world_y: self.y,
        }
    }
}

/// Local pose values fed into world composition.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
}

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub inherit: Inherit,
    pub active: bool,
    pub(crate) sorted: bool,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    pub(crate) fn new(data_index: usize, data: &BoneData) -> Self {
        let mut bone = Self {
            data_index,
            parent: data.parent,
            inherit: data.inherit,
            active: !data.skin_required,
            sorted: false,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            ax: 0.0,
            ay: 0.0,
            arotation: 0.0,
            ascale_x: 1.0,
            ascale_y: 1.0,
            ashear_x: 0.0,
            ashear_y: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
        };
        bone.set_to_setup_pose(data);
        bone
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
        self.shear_x = data.shear_x;
        self.shear_y = data.shear_y;
        self.inherit = data.inherit;
    }

    pub fn local(&self) -> LocalTransform {
        LocalTransform {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            shear_x: self.shear_x,
            shear_y: self.shear_y,
        }
    }

    pub fn applied(&self) -> LocalTransform {
        LocalTransform {
            x: self.ax,
            y: self.ay,
            rotation: self.arotation,
            scale_x: self.ascale_x,
            scale_y: self.ascale_y,
            shear_x: self.ashear_x,
            shear_y: self.ashear_y,
        }
    }

    pub(crate) fn set_applied(&mut self, local: LocalTransform) {
        self.ax = local.x;
        self.ay = local.y;
        self.arotation = local.rotation;
        self.ascale_x = local.scale_x;
        self.ascale_y = local.scale_y;
        self.ashear_x = local.shear_x;
        self.ashear_y = local.shear_y;
    }

    pub fn world(&self) -> WorldTransform {
        WorldTransform {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            world_x: self.world_x,
            world_y: self.world_y,
        }
    }

    /// Stores `local` as the applied pose and composes the world transform from it.
    ///
    /// `parent` is `None` for root bones, which are placed by `root` alone.
    pub fn update_world_transform_with(
        &mut self,
        parent: Option<WorldTransform>,
        root: RootTransform,
        local: LocalTransform,
    ) {
        self.set_applied(local);
        let LocalTransform {
            x,
            y,
            rotation,
            scale_x,
            scale_y,
            shear_x,
            shear_y,
        } = local;
        let (sx, sy) = (root.scale_x, root.scale_y);

        let Some(p) = parent else {
            let rotation_y = rotation + 90.0 + shear_y;
            self.a = cos_deg(rotation + shear_x) * scale_x * sx;
            self.b = cos_deg(rotation_y) * scale_y * sx;
            self.c = sin_deg(rotation + shear_x) * scale_x * sy;
            self.d = sin_deg(rotation_y) * scale_y * sy;
            self.world_x = x * sx + root.x;
            self.world_y = y * sy + root.y;
            return;
        };

        let (mut pa, mut pb, mut pc, mut pd) = (p.a, p.b, p.c, p.d);
        self.world_x = pa * x + pb * y + p.world_x;
        self.world_y = pc * x + pd * y + p.world_y;

        match self.inherit {
            Inherit::Normal => {
                let rotation_y = rotation + 90.0 + shear_y;
                let la = cos_deg(rotation + shear_x) * scale_x;
                let lb = cos_deg(rotation_y) * scale_y;
                let lc = sin_deg(rotation + shear_x) * scale_x;
                let ld = sin_deg(rotation_y) * scale_y;
                self.a = pa * la + pb * lc;
                self.b = pa * lb + pb * ld;
                self.c = pc * la + pd * lc;
                self.d = pc * lb + pd * ld;
                return;
            }
            Inherit::OnlyTranslation => {
                let rotation_y = rotation + 90.0 + shear_y;
                self.a = cos_deg(rotation + shear_x) * scale_x;
                self.b = cos_deg(rotation_y) * scale_y;
                self.c = sin_deg(rotation + shear_x) * scale_x;
                self.d = sin_deg(rotation_y) * scale_y;
            }
            Inherit::NoRotationOrReflection => {
                let (isx, isy) = (1.0 / sx, 1.0 / sy);
                pa *= isx;
                pc *= isy;
                let mut s = pa * pa + pc * pc;
                let prx;
                if s > 1.0e-4 {
                    s = (pa * pd * isy - pb * isx * pc).abs() / s;
                    pb = pc * s;
                    pd = pa * s;
                    prx = pc.atan2(pa).to_degrees();
                } else {
                    pa = 0.0;
                    pc = 0.0;
                    prx = 90.0 - pd.atan2(pb).to_degrees();
                }
                let rx = rotation + shear_x - prx;
                let ry = rotation + shear_y - prx + 90.0;
                let la = cos_deg(rx) * scale_x;
                let lb = cos_deg(ry) * scale_y;
                let lc = sin_deg(rx) * scale_x;
                let ld = sin_deg(ry) * scale_y;
                self.a = pa * la - pb * lc;
                self.b = pa * lb - pb * ld;
                self.c = pc * la + pd * lc;
                self.d = pc * lb + pd * ld;
            }
            Inherit::NoScale | Inherit::NoScaleOrReflection => {
                let (cos, sin) = (cos_deg(rotation), sin_deg(rotation));
                let mut za = (pa * cos + pb * sin) / sx;
                let mut zc = (pc * cos + pd * sin) / sy;
                let mut s = (za * za + zc * zc).sqrt();
                if s > 1.0e-5 {
                    s = 1.0 / s;
                }
                za *= s;
                zc *= s;
                s = (za * za + zc * zc).sqrt();
                if self.inherit == Inherit::NoScale
                    && ((pa * pd - pb * pc < 0.0) != ((sx < 0.0) != (sy < 0.0)))
                {
                    s = -s;
                }
                let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
                let zb = r.cos() * s;
                let zd = r.sin() * s;
                let la = cos_deg(shear_x) * scale_x;
                let lb = cos_deg(90.0 + shear_y) * scale_y;
                let lc = sin_deg(shear_x) * scale_x;
                let ld = sin_deg(90.0 + shear_y) * scale_y;
                self.a = za * la + zb * lc;
                self.b = za * lb + zb * ld;
                self.c = zc * la + zd * lc;
                self.d = zc * lb + zd * ld;
            }
        }
        self.a *= sx;
        self.b *= sx;
        self.c *= sy;
        self.d *= sy;
    }

    /// Recomputes the applied pose from the current world transform, after a constraint has
    /// written world values directly.
    pub fn update_applied_transform(
        &mut self,
        parent: Option<WorldTransform>,
        root: RootTransform,
    ) {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let Some(p) = parent else {
            self.ax = self.world_x - root.x;
            self.ay = self.world_y - root.y;
            self.arotation = c.atan2(a).to_degrees();
            self.ascale_x = (a * a + c * c).sqrt();
            self.ascale_y = (b * b + d * d).sqrt();
            self.ashear_x = 0.0;
            self.ashear_y = (a * b + c * d).atan2(a * d - b * c).to_degrees();
            return;
        };

        let pid = 1.0 / p.determinant();
        let dx = self.world_x - p.world_x;
        let dy = self.world_y - p.world_y;
        self.ax = dx * p.d * pid - dy * p.b * pid;
        self.ay = dy * p.a * pid - dx * p.c * pid;
        let ia = pid * p.d;
        let id = pid * p.a;
        let ib = pid * p.b;
        let ic = pid * p.c;
        let ra = ia * a - ib * c;
        let rb = ia * b - ib * d;
        let rc = id * c - ic * a;
        let rd = id * d - ic * b;
        self.ashear_x = 0.0;
        self.ascale_x = (ra * ra + rc * rc).sqrt();
        if self.ascale_x > 1.0e-4 {
            let det = ra * rd - rb * rc;
            self.ascale_y = det / self.ascale_x;
            self.ashear_y = (ra * rb + rc * rd).atan2(det).to_degrees();
            self.arotation = rc.atan2(ra).to_degrees();
        } else {
            self.ascale_x = 0.0;
            self.ascale_y = (rb * rb + rd * rd).sqrt();
            self.ashear_y = 0.0;
            self.arotation = 90.0 - rd.atan2(rb).to_degrees();
        }
    }

    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    pub fn world_rotation_y(&self) -> f32 {
        self.d.atan2(self.b).to_degrees()
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> [f32; 2] {
        self.world().world_to_local(world_x, world_y)
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> [f32; 2] {
        self.world().local_to_world(local_x, local_y)
    }

    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let (sin, cos) = (sin_deg(world_rotation), cos_deg(world_rotation));
        (self.a * sin - self.c * cos)
            .atan2(self.d * cos - self.b * sin)
            .to_degrees()
            + self.rotation
            - self.shear_x
    }

    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let local_rotation = local_rotation - (self.rotation - self.shear_x);
        let (sin, cos) = (sin_deg(local_rotation), cos_deg(local_rotation));
        (cos * self.c + sin * self.d)
            .atan2(cos * self.a + sin * self.b)
            .to_degrees()
    }

    /// Rotates the world matrix by `degrees`. The applied pose is left stale.
    pub fn rotate_world(&mut self, degrees: f32) {
        let (cos, sin) = (cos_deg(degrees), sin_deg(degrees));
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = cos * a - sin * c;
        self.b = cos * b - sin * d;
        self.c = sin * a + cos * c;
        self.d = sin * b + cos * d;
    }

    #[cfg(feature = "glam")]
    pub fn world_matrix(&self) -> glam::Affine2 {
        glam::Affine2::from_cols_array(&[
            self.a,
            self.c,
            self.b,
            self.d,
            self.world_x,
            self.world_y,
        ])
    }
}
