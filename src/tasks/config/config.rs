/* ************************************************************************ **
** This file is part of mpole, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of mpole is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */


use serde::de;

use mpole_electrostatics as mpole;

/// The highest config `version` this build understands.
pub const MAX_VERSION: u32 = 1;

/// Root settings object.
///
/// This is what you should deserialize.
#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings(pub Settings);

/// Raw deserialized form of settings.
///
/// Deserialize `ValidatedSettings` instead, so that incompatible combinations
/// are caught while the file name is still in the error context.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Identifies the version of the settings that this file uses.
    ///
    /// If not specified, assumes a value of 1.
    #[serde(default = "_settings__version")]
    pub version: u32,

    #[serde(default)]
    pub threading: Threading,

    #[serde(default)]
    pub electrostatics: Electrostatics,

    /// Geometry of the built-in water cluster scenario.
    #[serde(default)]
    pub water_cluster: WaterCluster,
}
fn _settings__version() -> u32 { 1 }

derive_yaml_read!{ValidatedSettings}

impl<'de> de::Deserialize<'de> for ValidatedSettings {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cereal: Settings = de::Deserialize::deserialize(deserializer)?;

        cereal.validate().map_err(de::Error::custom)
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Threading {
    /// Tile pairs and PME points are distributed over the rayon pool.
    Rayon,

    /// Everything runs on the calling thread.
    Serial,
}

impl Default for Threading {
    fn default() -> Self { Threading::Rayon }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Electrostatics {
    #[serde(default = "_electrostatics__method")]
    pub method: Method,

    /// Real space cutoff in nm.  Ignored by `no-cutoff`.
    #[serde(default = "_electrostatics__cutoff")]
    pub cutoff: f64,

    /// Target relative force error, used to pick the Ewald parameter and PME grid.
    #[serde(default = "_electrostatics__ewald_error_tolerance")]
    pub ewald_error_tolerance: f64,

    /// Ewald splitting parameter in 1/nm.  Overrides the tolerance.
    #[serde(default)]
    pub pme_alpha: Option<f64>,

    /// PME grid dimensions.  Overrides the tolerance.
    #[serde(default)]
    pub pme_grid: Option<[usize; 3]>,

    #[serde(default = "_electrostatics__polarization")]
    pub polarization: Polarization,

    /// RMS induced dipole change (Debye) at which the mutual solve stops.
    #[serde(default = "_electrostatics__mutual_epsilon")]
    pub mutual_epsilon: f64,

    #[serde(default = "_electrostatics__max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "_electrostatics__dielectric")]
    pub dielectric: f64,

    #[serde(default)]
    pub scale_factors: ScaleFactors,
}
fn _electrostatics__method() -> Method { Method::NoCutoff }
fn _electrostatics__cutoff() -> f64 { 1.0 }
fn _electrostatics__ewald_error_tolerance() -> f64 { 1e-4 }
fn _electrostatics__polarization() -> Polarization { Polarization::Mutual }
fn _electrostatics__mutual_epsilon() -> f64 { 1e-5 }
fn _electrostatics__max_iterations() -> usize { 60 }
fn _electrostatics__dielectric() -> f64 { 1.0 }

impl Default for Electrostatics {
    fn default() -> Self {
        Electrostatics {
            method: _electrostatics__method(),
            cutoff: _electrostatics__cutoff(),
            ewald_error_tolerance: _electrostatics__ewald_error_tolerance(),
            pme_alpha: None,
            pme_grid: None,
            polarization: _electrostatics__polarization(),
            mutual_epsilon: _electrostatics__mutual_epsilon(),
            max_iterations: _electrostatics__max_iterations(),
            dielectric: _electrostatics__dielectric(),
            scale_factors: Default::default(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    NoCutoff,
    CutoffNonPeriodic,
    CutoffPeriodic,
    Pme,
}

impl Method {
    pub fn is_periodic(self) -> bool
    { mpole::Method::from(self).is_periodic() }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Polarization {
    None,
    Direct,
    Mutual,
}

/// Multipole and polarization scale factors for 1-4 and 1-5 pairs.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleFactors {
    #[serde(default = "_scale_factors__m14")]
    pub m14: f64,
    #[serde(default = "_scale_factors__m15")]
    pub m15: f64,
    #[serde(default = "_scale_factors__p14")]
    pub p14: f64,
    #[serde(default = "_scale_factors__p15")]
    pub p15: f64,
}
fn _scale_factors__m14() -> f64 { 0.4 }
fn _scale_factors__m15() -> f64 { 0.8 }
fn _scale_factors__p14() -> f64 { 1.0 }
fn _scale_factors__p15() -> f64 { 1.0 }

impl Default for ScaleFactors {
    fn default() -> Self {
        ScaleFactors {
            m14: _scale_factors__m14(),
            m15: _scale_factors__m15(),
            p14: _scale_factors__p14(),
            p15: _scale_factors__p15(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct WaterCluster {
    /// Number of water molecules.
    #[serde(default = "_water_cluster__molecules")]
    pub molecules: usize,

    /// Distance in nm between neighboring oxygens.
    #[serde(default = "_water_cluster__spacing")]
    pub spacing: f64,

    /// Side length in nm of the cubic box used by the periodic methods.
    #[serde(default)]
    pub box_size: Option<f64>,
}
fn _water_cluster__molecules() -> usize { 3 }
fn _water_cluster__spacing() -> f64 { 0.3 }

impl Default for WaterCluster {
    fn default() -> Self {
        WaterCluster {
            molecules: _water_cluster__molecules(),
            spacing: _water_cluster__spacing(),
            box_size: None,
        }
    }
}

//------------------------------------------------------------------------------

impl From<Method> for mpole::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::NoCutoff => mpole::Method::NoCutoff,
            Method::CutoffNonPeriodic => mpole::Method::CutoffNonPeriodic,
            Method::CutoffPeriodic => mpole::Method::CutoffPeriodic,
            Method::Pme => mpole::Method::Pme,
        }
    }
}

impl From<Polarization> for mpole::PolarizationType {
    fn from(polarization: Polarization) -> Self {
        match polarization {
            Polarization::None => mpole::PolarizationType::None,
            Polarization::Direct => mpole::PolarizationType::Direct,
            Polarization::Mutual => mpole::PolarizationType::Mutual,
        }
    }
}

impl<'a> From<&'a ScaleFactors> for mpole::ScaleFactors {
    fn from(scales: &'a ScaleFactors) -> Self {
        let ScaleFactors { m14, m15, p14, p15 } = *scales;
        mpole::ScaleFactors { m14, m15, p14, p15 }
    }
}

impl<'a> From<&'a Settings> for mpole::Options {
    fn from(settings: &'a Settings) -> Self {
        let e = &settings.electrostatics;
        mpole::Options {
            method: e.method.into(),
            cutoff: e.cutoff,
            ewald_error_tolerance: e.ewald_error_tolerance,
            pme_alpha: e.pme_alpha,
            pme_grid: e.pme_grid,
            polarization: e.polarization.into(),
            mutual_epsilon: e.mutual_epsilon,
            max_iterations: e.max_iterations,
            dielectric: e.dielectric,
            scale_factors: (&e.scale_factors).into(),
            use_rayon: settings.threading == Threading::Rayon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::YamlRead;

    #[test]
    fn empty_config_uses_defaults() {
        let ValidatedSettings(settings) = YamlRead::from_reader(&b"{}"[..]).unwrap();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.threading, Threading::Rayon);
        assert_eq!(settings.electrostatics, Electrostatics::default());
        assert_eq!(settings.water_cluster, WaterCluster::default());
        assert_eq!(mpole::Options::from(&settings), mpole::Options::default());
    }

    #[test]
    fn kebab_case_keys() {
        let yaml = b"\
threading: serial
electrostatics:
  method: pme
  cutoff: 0.9
  ewald-error-tolerance: 1.0e-5
  pme-grid: [32, 36, 40]
  polarization: direct
  scale-factors:
    m14: 0.5
water-cluster:
  molecules: 8
  box-size: 2.5
";
        let ValidatedSettings(settings) = YamlRead::from_reader(&yaml[..]).unwrap();
        let options = mpole::Options::from(&settings);
        assert_eq!(options.method, mpole::Method::Pme);
        assert_eq!(options.cutoff, 0.9);
        assert_eq!(options.ewald_error_tolerance, 1e-5);
        assert_eq!(options.pme_alpha, None);
        assert_eq!(options.pme_grid, Some([32, 36, 40]));
        assert_eq!(options.polarization, mpole::PolarizationType::Direct);
        assert_eq!(options.scale_factors.m14, 0.5);
        assert_eq!(options.scale_factors.m15, 0.8);
        assert!(!options.use_rayon);
        assert_eq!(settings.water_cluster.molecules, 8);
        assert_eq!(settings.water_cluster.box_size, Some(2.5));
    }

    #[test]
    fn unknown_method() {
        let yaml = b"electrostatics: {method: ewald}";
        assert!(<ValidatedSettings as YamlRead>::from_reader(&yaml[..]).is_err());
    }
}
