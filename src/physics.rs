/// Falling-Ball Viscometry Physics
/// Converts a terminal velocity measured in pixels into dynamic viscosity via Stokes' law,
/// and checks the result against manufacturer reference viscosities (Arrhenius model)
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{TrackResult, TrackingError};

const GAS_CONSTANT: f64 = 8.314; // J/(mol·K)
const KELVIN_OFFSET: f64 = 273.15;
const REFERENCE_LOW_C: f64 = 40.0;
const REFERENCE_HIGH_C: f64 = 100.0;
const MAX_GRAVITY: f64 = 15.0; // m/s²
const LARGE_BALL_MM: f64 = 50.0;
const CENTIPOISE_TO_PA_S: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StokesParameters {
    pub ball_diameter_mm: f64,
    /// Local gravitational acceleration (m/s²)
    pub gravity: f64,
    /// kg/m³
    pub ball_density: f64,
    /// kg/m³
    pub liquid_density: f64,
}

impl StokesParameters {
    pub fn validate(&self) -> TrackResult<()> {
        if !(self.ball_diameter_mm > 0.0) {
            return Err(TrackingError::InvalidParameters(format!(
                "ball diameter {} mm must be positive",
                self.ball_diameter_mm
            )));
        }
        if self.ball_diameter_mm > LARGE_BALL_MM {
            warn!(
                "Ball diameter ({} mm) is unusually large",
                self.ball_diameter_mm
            );
        }
        if !(self.gravity > 0.0 && self.gravity <= MAX_GRAVITY) {
            return Err(TrackingError::InvalidParameters(format!(
                "gravity {} m/s² out of range (typical 9.78-9.82 m/s²)",
                self.gravity
            )));
        }
        if !(self.ball_density > 0.0) {
            return Err(TrackingError::InvalidParameters(format!(
                "ball density {} kg/m³ must be positive",
                self.ball_density
            )));
        }
        if !(self.liquid_density > 0.0) {
            return Err(TrackingError::InvalidParameters(format!(
                "liquid density {} kg/m³ must be positive",
                self.liquid_density
            )));
        }
        if self.ball_density <= self.liquid_density {
            return Err(TrackingError::InvalidParameters(format!(
                "ball density ({} kg/m³) must exceed liquid density ({} kg/m³) for the ball to sink",
                self.ball_density, self.liquid_density
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViscosityResult {
    pub mm_per_pixel: f64,
    pub velocity_mm_s: f64,
    /// Dynamic viscosity (Pa·s), infinite when the ball did not move
    pub viscosity_pa_s: f64,
}

/// Stokes' law for a sphere at terminal velocity
///
/// Physics: η = d² g (ρ_ball − ρ_liquid) / (18 v)
/// Where:
///   - d: ball diameter (m), scaled from pixels by the known real diameter
///   - v: terminal velocity (m/s)
pub fn compute_viscosity(
    params: &StokesParameters,
    velocity_px_s: f64,
    pixel_diameter: f64,
) -> TrackResult<ViscosityResult> {
    params.validate()?;
    if !(pixel_diameter > 0.0) {
        return Err(TrackingError::InvalidParameters(format!(
            "pixel diameter {pixel_diameter} must be positive"
        )));
    }

    let mm_per_pixel = params.ball_diameter_mm / pixel_diameter;
    let velocity_mm_s = velocity_px_s * mm_per_pixel;

    let viscosity_pa_s = if velocity_mm_s == 0.0 {
        warn!("Ball velocity is zero, the ball was probably not tracked");
        f64::INFINITY
    } else {
        let diameter_m = params.ball_diameter_mm / 1000.0;
        let velocity_m_s = velocity_mm_s / 1000.0;
        diameter_m.powi(2) * params.gravity * (params.ball_density - params.liquid_density)
            / (18.0 * velocity_m_s)
    };

    Ok(ViscosityResult {
        mm_per_pixel,
        velocity_mm_s,
        viscosity_pa_s,
    })
}

/// η(T) = A · exp(Ea / (R T)) fitted through reference viscosities at 40 °C and 100 °C
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrheniusCalibration {
    /// J/mol
    pub activation_energy: f64,
    /// Pa·s
    pub pre_exponential_factor: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub temperature_c: f64,
    pub expected_viscosity_pa_s: f64,
    pub measured_viscosity_pa_s: f64,
    pub relative_error: f64,
}

impl ArrheniusCalibration {
    /// Fit from manufacturer viscosities in centipoise
    pub fn from_reference(visc_40c_cp: f64, visc_100c_cp: f64) -> TrackResult<Self> {
        if !(visc_40c_cp > 0.0 && visc_100c_cp > 0.0) {
            return Err(TrackingError::InvalidParameters(format!(
                "reference viscosities must be positive (40 °C: {visc_40c_cp} cP, 100 °C: {visc_100c_cp} cP)"
            )));
        }
        let t_low = REFERENCE_LOW_C + KELVIN_OFFSET;
        let t_high = REFERENCE_HIGH_C + KELVIN_OFFSET;
        let eta_low = visc_40c_cp * CENTIPOISE_TO_PA_S;
        let eta_high = visc_100c_cp * CENTIPOISE_TO_PA_S;

        let activation_energy =
            GAS_CONSTANT * (eta_low / eta_high).ln() / (1.0 / t_low - 1.0 / t_high);
        let pre_exponential_factor = eta_low / (activation_energy / (GAS_CONSTANT * t_low)).exp();

        Ok(Self {
            activation_energy,
            pre_exponential_factor,
        })
    }

    /// Expected viscosity (Pa·s) at `temperature_c`
    pub fn expected_at(&self, temperature_c: f64) -> f64 {
        let t = temperature_c + KELVIN_OFFSET;
        self.pre_exponential_factor * (self.activation_energy / (GAS_CONSTANT * t)).exp()
    }

    pub fn report(&self, temperature_c: f64, measured_viscosity_pa_s: f64) -> CalibrationReport {
        let expected = self.expected_at(temperature_c);
        CalibrationReport {
            temperature_c,
            expected_viscosity_pa_s: expected,
            measured_viscosity_pa_s,
            relative_error: ((expected - measured_viscosity_pa_s) / expected).abs(),
        }
    }
}
