//! Fixed-function light commit.
//!
//! The hardware supports eight lights, each one of three kinds. The kinds
//! form a closed set, so they are a tagged variant rather than a dispatch
//! hierarchy; committing a light emits its register block and nothing else —
//! the context's own state is untouched, and committing twice emits the same
//! words twice.

use glam::{Mat4, Vec3};
use nv2a_regs::nv097;

use crate::error::PgraphError;
use crate::push::Pushbuffer;

pub const MAX_LIGHTS: u32 = 8;

/// Range value used for directional lights; the hardware treats 1e30 as
/// infinity (the same bit pattern as the 24-bit float depth maximum).
const INFINITE_RANGE: f32 = 1e30;

/// Colors shared by every light kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightColors {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub back_ambient: Vec3,
    pub back_diffuse: Vec3,
    pub back_specular: Vec3,
}

/// Spotlight attenuation-curve presets. Each expands to the three-term
/// polynomial the hardware evaluates; the factors were measured against the
/// canonical falloff exponents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FalloffPreset {
    Flat,
    Half,
    One,
    Two,
    Ten,
    Fifty,
}

impl FalloffPreset {
    pub fn factors(self) -> [f32; 3] {
        match self {
            Self::Flat => [-0.0, 1.0, 0.0],
            Self::Half => [-0.000244, 0.500122, 0.499634],
            Self::One => [0.0, -0.494592, 1.494592],
            Self::Two => [-0.170208, -0.855843, 1.685635],
            Self::Ten => [-0.706496, -2.507095, 2.800600],
            Self::Fifty => [-0.932112, -3.097628, 3.165516],
        }
    }
}

/// Geometry parameters for one light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light shining along `direction`.
    Directional { direction: Vec3 },
    /// Local light at `position` with a range and attenuation polynomial.
    Point {
        position: Vec3,
        range: f32,
        attenuation: [f32; 3],
    },
    /// Local light with a cone: `phi` is the outer and `theta` the inner
    /// cone angle, in degrees.
    Spot {
        position: Vec3,
        direction: Vec3,
        range: f32,
        phi: f32,
        theta: f32,
        attenuation: [f32; 3],
        falloff: [f32; 3],
    },
}

/// One hardware light: index, colors and kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub index: u32,
    pub colors: LightColors,
    pub kind: LightKind,
}

impl Light {
    pub fn directional(index: u32, direction: Vec3) -> Self {
        Self {
            index,
            colors: LightColors::default(),
            kind: LightKind::Directional { direction },
        }
    }

    pub fn point(index: u32, position: Vec3, range: f32, attenuation: [f32; 3]) -> Self {
        Self {
            index,
            colors: LightColors::default(),
            kind: LightKind::Point {
                position,
                range,
                attenuation,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spot(
        index: u32,
        position: Vec3,
        direction: Vec3,
        range: f32,
        phi: f32,
        theta: f32,
        attenuation: [f32; 3],
        falloff: FalloffPreset,
    ) -> Self {
        Self {
            index,
            colors: LightColors::default(),
            kind: LightKind::Spot {
                position,
                direction,
                range,
                phi,
                theta,
                attenuation,
                falloff: falloff.factors(),
            },
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    /// This light's contribution to `SET_LIGHT_ENABLE_MASK`.
    pub fn enable_mask_bits(&self) -> u32 {
        let mode = match self.kind {
            LightKind::Directional { .. } => nv097::LIGHT_MODE_INFINITE,
            LightKind::Point { .. } => nv097::LIGHT_MODE_LOCAL,
            LightKind::Spot { .. } => nv097::LIGHT_MODE_SPOT,
        };
        nv097::light_mode(self.index, mode)
    }

    fn commit_colors(&self, pb: &mut Pushbuffer) {
        let light = |method| nv097::set_light(self.index, method);
        let back = |method| nv097::set_back_light(self.index, method);
        let c = &self.colors;

        pb.begin();
        pb.push_f(light(nv097::SET_LIGHT_AMBIENT_COLOR), &c.ambient.to_array());
        pb.push_f(light(nv097::SET_LIGHT_DIFFUSE_COLOR), &c.diffuse.to_array());
        pb.push_f(light(nv097::SET_LIGHT_SPECULAR_COLOR), &c.specular.to_array());
        pb.push_f(back(nv097::SET_BACK_LIGHT_AMBIENT_COLOR), &c.back_ambient.to_array());
        pb.push_f(back(nv097::SET_BACK_LIGHT_DIFFUSE_COLOR), &c.back_diffuse.to_array());
        pb.push_f(back(nv097::SET_BACK_LIGHT_SPECULAR_COLOR), &c.back_specular.to_array());
        pb.end();
    }

    /// Emits this light's register block.
    ///
    /// `model_view` transforms local-light positions into eye space;
    /// `look_direction` is required by directional lights to derive the
    /// Blinn half vector.
    pub fn commit(
        &self,
        pb: &mut Pushbuffer,
        model_view: &Mat4,
        look_direction: Vec3,
    ) -> Result<(), PgraphError> {
        if self.index >= MAX_LIGHTS {
            return Err(PgraphError::InvalidLightIndex(self.index));
        }

        self.commit_colors(pb);
        let light = |method| nv097::set_light(self.index, method);

        match self.kind {
            LightKind::Directional { direction } => {
                // Blinn half vector between the view direction and the
                // direction towards the light.
                let half = -(look_direction + direction).normalize_or_zero();
                let infinite_direction = -direction;

                pb.begin();
                pb.push_f(light(nv097::SET_LIGHT_LOCAL_RANGE), &[INFINITE_RANGE]);
                pb.push_f(
                    light(nv097::SET_LIGHT_INFINITE_HALF_VECTOR),
                    &half.to_array(),
                );
                pb.push_f(
                    light(nv097::SET_LIGHT_INFINITE_DIRECTION),
                    &infinite_direction.to_array(),
                );
                pb.end();
            }
            LightKind::Point {
                position,
                range,
                attenuation,
            } => {
                let eye_position = model_view.transform_point3(position);

                pb.begin();
                pb.push_f(light(nv097::SET_LIGHT_LOCAL_RANGE), &[range]);
                pb.push_f(
                    light(nv097::SET_LIGHT_LOCAL_POSITION),
                    &eye_position.to_array(),
                );
                pb.push_f(light(nv097::SET_LIGHT_LOCAL_ATTENUATION), &attenuation);
                pb.end();
            }
            LightKind::Spot {
                position,
                direction,
                range,
                phi,
                theta,
                attenuation,
                falloff,
            } => {
                let eye_position = model_view.transform_point3(position);

                // The cone is encoded as a scaled direction whose W carries
                // the outer-cone cosine term.
                let cos_half_theta = (0.5 * theta.to_radians()).cos();
                let cos_half_phi = (0.5 * phi.to_radians()).cos();
                let inv_scale = -1.0 / (cos_half_theta - cos_half_phi);
                let scaled = direction.normalize_or_zero() * inv_scale;
                let spot_direction = [scaled.x, scaled.y, scaled.z, cos_half_phi * inv_scale];

                pb.begin();
                pb.push_f(light(nv097::SET_LIGHT_LOCAL_RANGE), &[range]);
                pb.push_f(
                    light(nv097::SET_LIGHT_LOCAL_POSITION),
                    &eye_position.to_array(),
                );
                pb.push_f(light(nv097::SET_LIGHT_LOCAL_ATTENUATION), &attenuation);
                pb.push_f(light(nv097::SET_LIGHT_SPOT_FALLOFF), &falloff);
                pb.push_f(light(nv097::SET_LIGHT_SPOT_DIRECTION), &spot_direction);
                pb.end();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{CommandLog, RecordingTransport};

    fn recording_pushbuffer() -> (Pushbuffer, CommandLog) {
        let (transport, log) = RecordingTransport::new();
        (Pushbuffer::new(Box::new(transport)), log)
    }

    #[test]
    fn enable_mask_bits_per_kind() {
        assert_eq!(
            Light::directional(0, Vec3::Z).enable_mask_bits(),
            nv097::LIGHT_MODE_INFINITE
        );
        assert_eq!(
            Light::point(1, Vec3::ZERO, 10.0, [1.0, 0.0, 0.0]).enable_mask_bits(),
            nv097::LIGHT_MODE_LOCAL << 2
        );
    }

    #[test]
    fn directional_commit_emits_infinite_block() {
        let (mut pb, log) = recording_pushbuffer();
        let light = Light::directional(2, Vec3::new(0.0, 0.0, 1.0));
        light
            .commit(&mut pb, &Mat4::IDENTITY, Vec3::new(0.0, 0.0, 1.0))
            .unwrap();

        let range_reg = nv097::set_light(2, nv097::SET_LIGHT_LOCAL_RANGE);
        assert_eq!(log.last_write_to(range_reg), Some(1e30f32.to_bits()));

        let dir_reg = nv097::set_light(2, nv097::SET_LIGHT_INFINITE_DIRECTION);
        let dir = log.writes_to(dir_reg);
        assert_eq!(f32::from_bits(dir[0]), 0.0);
        // The infinite direction points towards the light source.
        let z = log
            .register_writes()
            .iter()
            .find(|&&(reg, _)| reg == dir_reg + 8)
            .map(|&(_, v)| f32::from_bits(v))
            .unwrap();
        assert_eq!(z, -1.0);
    }

    #[test]
    fn point_commit_transforms_position_into_eye_space() {
        let (mut pb, log) = recording_pushbuffer();
        let light = Light::point(0, Vec3::new(1.0, 2.0, 3.0), 50.0, [1.0, 0.1, 0.01]);
        let view = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        light.commit(&mut pb, &view, Vec3::Z).unwrap();

        let pos = log.writes_to(nv097::SET_LIGHT_LOCAL_POSITION);
        assert_eq!(f32::from_bits(pos[0]), 11.0);
        assert_eq!(f32::from_bits(pos[1]), 2.0);
        assert_eq!(f32::from_bits(pos[2]), 3.0);
    }

    #[test]
    fn spot_commit_emits_cone_encoding() {
        let (mut pb, log) = recording_pushbuffer();
        let light = Light::spot(
            1,
            Vec3::ZERO,
            Vec3::Z,
            100.0,
            60.0,
            30.0,
            [1.0, 0.0, 0.0],
            FalloffPreset::One,
        );
        light.commit(&mut pb, &Mat4::IDENTITY, Vec3::Z).unwrap();

        let falloff_reg = nv097::set_light(1, nv097::SET_LIGHT_SPOT_FALLOFF);
        let falloff_y = log.last_write_to(falloff_reg + 4).unwrap();
        assert_eq!(f32::from_bits(falloff_y), -0.494592);

        let dir_reg = nv097::set_light(1, nv097::SET_LIGHT_SPOT_DIRECTION);
        assert_eq!(log.writes_to(dir_reg).len(), 1);

        let cos_half_theta = (0.5f32 * 30.0f32.to_radians()).cos();
        let cos_half_phi = (0.5f32 * 60.0f32.to_radians()).cos();
        let inv_scale = -1.0 / (cos_half_theta - cos_half_phi);
        let z = log
            .register_writes()
            .iter()
            .find(|&&(reg, _)| reg == dir_reg + 8)
            .map(|&(_, v)| f32::from_bits(v))
            .unwrap();
        assert!((z - inv_scale).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let (mut pb, _log) = recording_pushbuffer();
        let light = Light::directional(8, Vec3::Z);
        assert_eq!(
            light.commit(&mut pb, &Mat4::IDENTITY, Vec3::Z),
            Err(PgraphError::InvalidLightIndex(8))
        );
    }
}
