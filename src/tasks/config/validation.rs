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


//! Checks on combinations of settings that serde cannot express.

use failure::Error;

use crate::config::*;

impl Settings {
    pub fn validate(self) -> Result<ValidatedSettings, Error> {
        check_version(self.version)?;
        check_electrostatics(&self.electrostatics)?;
        check_water_cluster(&self.water_cluster, &self.electrostatics)?;
        Ok(ValidatedSettings(self))
    }
}

fn check_version(version: u32) -> Result<(), Error> {
    if version == 0 || version > MAX_VERSION {
        bail!("config version {} is not supported (max: {})", version, MAX_VERSION);
    }
    Ok(())
}

fn check_electrostatics(settings: &Electrostatics) -> Result<(), Error> {
    if settings.method != Method::NoCutoff && !(settings.cutoff > 0.0) {
        bail!("electrostatics.cutoff must be positive");
    }
    if settings.method != Method::Pme && (settings.pme_alpha.is_some() || settings.pme_grid.is_some()) {
        warn!("pme-alpha and pme-grid are only used by the 'pme' method");
    }
    if !(settings.mutual_epsilon > 0.0) {
        bail!("electrostatics.mutual-epsilon must be positive");
    }
    Ok(())
}

fn check_water_cluster(cluster: &WaterCluster, electrostatics: &Electrostatics) -> Result<(), Error> {
    if cluster.molecules == 0 {
        bail!("water-cluster.molecules must be at least 1");
    }
    if !(cluster.spacing > 0.0) {
        bail!("water-cluster.spacing must be positive");
    }
    match (electrostatics.method.is_periodic(), cluster.box_size) {
        (true, None) => bail!("the '{:?}' method requires water-cluster.box-size", electrostatics.method),
        (_, Some(size)) if !(size > 0.0) => bail!("water-cluster.box-size must be positive"),
        _ => {},
    }
    Ok(())
}
