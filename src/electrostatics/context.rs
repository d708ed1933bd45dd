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


//! The evaluation context: owns every buffer and drives the passes.

use mpole_array_types::V3;
use mpole_structure::{CovalentMaps, PeriodicBox};

use crate::FailResult;
use crate::accumulate::Accumulator;
use crate::consts::MAX_PREV_DIIS_DIPOLES;
use crate::diis::{self, DiisHistory, MutualProblem, SolveReport};
use crate::direct::{DirectSpace, FieldSums};
use crate::errors::{ConfigError, TopologyChangedError};
use crate::flags::ExclusionFlags;
use crate::frame::lab_multipoles;
use crate::moments;
use crate::params::{ForceParameters, Method, Options, ParticleTable, PolarizationType};
use crate::pme::{self, Pme};
use crate::tensors::{Multipole, Potential};
use crate::tiles::TileLayout;
use crate::torque::torque_to_forces;

/// How induced dipoles are obtained.  Fixed at construction.
#[derive(Debug)]
enum Polarization {
    None,
    Direct,
    Mutual(DiisHistory),
}

/// Everything that stays fixed between parameter updates, plus the coordinates.
#[derive(Debug)]
struct System {
    options: Options,
    layout: TileLayout,
    table: ParticleTable,
    /// Slot order, padded.
    positions: Vec<V3>,
    has_positions: bool,
    pbox: Option<PeriodicBox>,
    pme: Option<Pme>,
}

/// Results that depend only on positions and parameters.  All in slot order.
#[derive(Debug, Clone)]
struct Cache {
    generation: u64,
    lab: Vec<Multipole>,
    /// Total permanent field, including reciprocal and self parts.
    field: Vec<FieldSums>,
    mu_d: Vec<V3>,
    mu_p: Vec<V3>,
}

/// Polarizable multipole electrostatics for one fixed set of particles.
///
/// All inputs and outputs are in the caller's particle order.
#[derive(Debug)]
pub struct Context {
    system: System,
    covalent: CovalentMaps,
    // built on first use, then never modified
    flags: Option<ExclusionFlags>,
    polarization: Polarization,
    generation: u64,
    cache: Option<Cache>,
    report: Option<SolveReport>,
}

impl Context {
    /// Validate everything and allocate the context.
    ///
    /// `box_vectors` is required for the periodic methods and ignored otherwise.
    pub fn new(
        force: &ForceParameters,
        options: Options,
        layout: TileLayout,
        box_vectors: Option<[V3; 3]>,
    ) -> FailResult<Self> {
        options.validate()?;
        let table = ParticleTable::build(force, &layout)?;

        let pbox = match (options.method.is_periodic(), box_vectors) {
            (false, _) => None,
            (true, None) => {
                throw!(ConfigError::new(format!("{:?} requires periodic box vectors", options.method)));
            },
            (true, Some(vectors)) => {
                let pbox = PeriodicBox::new(vectors)?;
                pme::check_cutoff(options.cutoff, &pbox)?;
                Some(pbox)
            },
        };
        let pme = match (options.method, &pbox) {
            (Method::Pme, Some(pbox)) => Some(Pme::new(&options, pbox)?),
            _ => None,
        };

        let polarization = match options.polarization {
            PolarizationType::None => Polarization::None,
            PolarizationType::Direct => Polarization::Direct,
            PolarizationType::Mutual => {
                Polarization::Mutual(DiisHistory::new(layout.padded_len(), MAX_PREV_DIIS_DIPOLES))
            },
        };

        info!(
            "multipoles: {} particles in {} tiles, {:?}, {:?} polarization{}",
            table.num_real, layout.num_tiles(), options.method, options.polarization,
            if table.has_quadrupoles { "" } else { ", no quadrupoles" },
        );

        let positions = vec![V3::zero(); layout.padded_len()];
        Ok(Context {
            system: System { options, layout, table, positions, has_positions: false, pbox, pme },
            covalent: force.covalent.clone(),
            flags: None,
            polarization,
            generation: 0,
            cache: None,
            report: None,
        })
    }

    pub fn num_particles(&self) -> usize
    { self.system.table.num_real }

    /// The Ewald parameter and grid, for PME.
    pub fn pme_parameters(&self) -> Option<(f64, [usize; 3])>
    { self.system.pme.as_ref().map(|pme| (pme.alpha(), pme.dims())) }

    pub fn set_positions(&mut self, positions: &[V3]) -> FailResult<()> {
        if positions.len() != self.num_particles() {
            throw!(ConfigError::new(format!(
                "expected {} positions, got {}", self.num_particles(), positions.len(),
            )));
        }
        self.system.positions = self.system.layout.to_slot_order(positions, V3::zero());
        self.system.has_positions = true;
        self.generation += 1;
        Ok(())
    }

    pub fn set_box_vectors(&mut self, vectors: [V3; 3]) -> FailResult<()> {
        let pbox = PeriodicBox::new(vectors)?;
        if self.system.options.method.is_periodic() {
            pme::check_cutoff(self.system.options.cutoff, &pbox)?;
        }
        self.system.pbox = Some(pbox);
        self.generation += 1;
        Ok(())
    }

    /// Evaluate everything and add the requested parts to `acc`.
    ///
    /// Returns the energy that was added (zero when `include_energy` is unset).
    pub fn execute(&mut self, acc: &mut Accumulator, include_forces: bool, include_energy: bool) -> FailResult<f64> {
        if acc.num_particles() != self.num_particles() {
            throw!(ConfigError::new(format!(
                "accumulator holds {} particles, but the context has {}",
                acc.num_particles(), self.num_particles(),
            )));
        }
        self.ensure_multipoles()?;
        let (cache, flags) = self.current()?;
        let sys = &self.system;
        let n = sys.table.num_real;
        let use_rayon = sys.options.use_rayon;

        let mutual = match self.polarization {
            Polarization::Mutual(_) => true,
            _ => false,
        };
        let induced = match self.polarization {
            Polarization::None => None,
            _ => Some((&cache.mu_d[..], &cache.mu_p[..])),
        };

        let sums = sys.space(flags).electrostatics(&cache.lab, induced, mutual);
        let mut energy: f64 = sums.iter().map(|s| s.energy).sum();
        let mut forces: Vec<V3> = sums.iter().map(|s| s.force).collect();
        let mut torques: Vec<V3> = sums.iter().map(|s| s.torque).collect();

        if let (Some(pme), Some(pbox)) = (&sys.pme, &sys.pbox) {
            let real = sys.real_positions();
            let lab = &cache.lab[..n];
            let phi_m = pme.potentials(pbox, real, lab, real, 3, use_rayon);
            energy += 0.5 * lab.iter().zip(&phi_m).map(|(m, pot)| m.energy_in(pot)).sum::<f64>();
            energy += pme.self_energy(lab);

            match induced {
                None => {
                    for i in 0..n {
                        forces[i] += lab[i].force_in(&phi_m[i]);
                        torques[i] += lab[i].torque_in(&phi_m[i]);
                    }
                },
                Some((mu_d, mu_p)) => {
                    let dipoles = |mu: &[V3]| -> Vec<Multipole> { mu[..n].iter().map(|&m| Multipole::dipole(m)).collect() };
                    let phi_d = pme.potentials(pbox, real, &dipoles(mu_d), real, 3, use_rayon);
                    let phi_p = pme.potentials(pbox, real, &dipoles(mu_p), real, 3, use_rayon);
                    let self_factor = pme.self_field_factor();
                    for i in 0..n {
                        let mut total = phi_m[i];
                        total.add_scaled(0.5, &phi_d[i]);
                        total.add_scaled(0.5, &phi_p[i]);
                        forces[i] += lab[i].force_in(&total);
                        torques[i] += lab[i].torque_in(&total);
                        torques[i] += lab[i].mu.cross(&(mu_d[i] + mu_p[i])) * (0.5 * self_factor);

                        forces[i] += Multipole::dipole((mu_d[i] + mu_p[i]) * 0.5).force_in(&phi_m[i]);
                        if mutual {
                            forces[i] += Multipole::dipole(mu_d[i] * 0.5).force_in(&phi_p[i]);
                            forces[i] += Multipole::dipole(mu_p[i] * 0.5).force_in(&phi_d[i]);
                        }
                    }
                },
            }
        }

        if induced.is_some() {
            energy += polarization_energy(&cache.mu_d, &cache.field);
        }

        let scale = sys.options.energy_scale();
        let energy = energy * scale;
        if include_forces {
            for slot in 0..n {
                let torque = torques[slot];
                for (target, force) in torque_to_forces(&sys.table.records[slot], slot, &sys.positions, torque) {
                    forces[target] += force;
                }
            }
            for slot in 0..n {
                if let Some(atom) = sys.layout.atom_at(slot) {
                    acc.add_force(atom, forces[slot] * scale);
                }
            }
        }
        match include_energy {
            true => {
                acc.add_energy(energy);
                Ok(energy)
            },
            false => Ok(0.0),
        }
    }

    /// The "d" induced dipoles, in e nm.
    pub fn induced_dipoles(&mut self) -> FailResult<Vec<V3>> {
        self.ensure_multipoles()?;
        let (cache, _) = self.current()?;
        Ok(self.system.to_caller_order(&cache.mu_d))
    }

    /// Electrostatic potential (kJ/mol/e) of the permanent and induced multipoles
    /// at arbitrary points.
    pub fn electrostatic_potential(&mut self, points: &[V3]) -> FailResult<Vec<f64>> {
        self.ensure_multipoles()?;
        let (cache, flags) = self.current()?;
        let sys = &self.system;
        let n = sys.table.num_real;

        let sources: Vec<Multipole> = {
            cache.lab.iter().zip(&cache.mu_d)
                .map(|(m, &mu)| Multipole { mu: m.mu + mu, ..*m })
                .collect()
        };
        let mut phi = sys.space(flags).potential_at(points, &sources);
        if let (Some(pme), Some(pbox)) = (&sys.pme, &sys.pbox) {
            let recip = pme.potentials(pbox, sys.real_positions(), &sources[..n], points, 0, sys.options.use_rayon);
            for (phi, pot) in phi.iter_mut().zip(&recip) {
                *phi += pot.phi;
            }
        }
        let scale = sys.options.energy_scale();
        Ok(phi.into_iter().map(|phi| phi * scale).collect())
    }

    /// Charge, dipole (Debye) and traceless quadrupole (Debye Angstrom) of the
    /// whole system about its center of mass.
    pub fn system_multipole_moments(&mut self, masses: &[f64]) -> FailResult<[f64; 13]> {
        self.ensure_multipoles()?;
        let (cache, _) = self.current()?;
        let sys = &self.system;
        moments::system_moments(
            &sys.to_caller_order(&sys.positions),
            masses,
            &sys.to_caller_order(&cache.lab),
            &sys.to_caller_order(&cache.mu_d),
        )
    }

    /// Replace the per-particle parameters.
    ///
    /// The particle count, the covalent topology and the absence of
    /// quadrupoles are fixed at construction.  Nothing changes on failure.
    pub fn update_parameters(&mut self, force: &ForceParameters) -> FailResult<()> {
        if force.particles.len() != self.num_particles() {
            throw!(ConfigError::new("The number of multipoles has changed"));
        }
        if force.covalent != self.covalent {
            throw!(TopologyChangedError {
                message: "covalent maps cannot be changed after initialization".to_string(),
            });
        }
        let table = self.system.table.rebuild(force, &self.system.layout)?;
        self.system.table = table;
        self.generation += 1;
        Ok(())
    }

    /// Outcome of the most recent mutual polarization solve.
    pub fn solve_report(&self) -> Option<SolveReport>
    { self.report }

    //--------------------------------------------------------------------------

    fn current(&self) -> FailResult<(&Cache, &ExclusionFlags)> {
        match (&self.cache, &self.flags) {
            (Some(cache), Some(flags)) if cache.generation == self.generation => Ok((cache, flags)),
            _ => bail!("multipoles are out of date"),
        }
    }

    fn ensure_multipoles(&mut self) -> FailResult<()> {
        if let Some(cache) = &self.cache {
            if cache.generation == self.generation {
                return Ok(());
            }
        }
        if !self.system.has_positions {
            bail!("positions must be set before evaluating");
        }

        let flags = match self.flags.take() {
            Some(flags) => flags,
            None => ExclusionFlags::build(&self.covalent, &self.system.layout)?,
        };
        let result = compute_multipoles(&self.system, &flags, &mut self.polarization, self.generation);
        self.flags = Some(flags);

        let (cache, report) = result?;
        self.cache = Some(cache);
        if report.is_some() {
            self.report = report;
        }
        Ok(())
    }
}

impl System {
    fn space<'a>(&'a self, flags: &'a ExclusionFlags) -> DirectSpace<'a> {
        let method = self.options.method;
        DirectSpace {
            table: &self.table,
            layout: &self.layout,
            flags,
            scales: &self.options.scale_factors,
            positions: &self.positions,
            periodic: if method.is_periodic() { self.pbox.as_ref() } else { None },
            cutoff: if method.uses_cutoff() { Some(self.options.cutoff) } else { None },
            ewald_alpha: self.pme.as_ref().map(|pme| pme.alpha()),
            use_rayon: self.options.use_rayon,
        }
    }

    fn real_positions(&self) -> &[V3]
    { &self.positions[..self.table.num_real] }

    fn to_caller_order<T: Clone>(&self, by_slot: &[T]) -> Vec<T>
    { self.layout.to_caller_order(by_slot) }

    // Reciprocal potentials of some sources at every real particle, if using PME.
    fn reciprocal(&self, sources: &[Multipole], max_deriv: usize) -> Option<Vec<Potential>> {
        match (&self.pme, &self.pbox) {
            (Some(pme), Some(pbox)) => {
                let n = self.table.num_real;
                let real = self.real_positions();
                Some(pme.potentials(pbox, real, &sources[..n], real, max_deriv, self.options.use_rayon))
            },
            _ => None,
        }
    }

    fn self_field_factor(&self) -> f64
    { self.pme.as_ref().map_or(0.0, |pme| pme.self_field_factor()) }

    /// Total field of the permanent multipoles.
    fn fixed_field(&self, flags: &ExclusionFlags, lab: &[Multipole]) -> Vec<FieldSums> {
        let mut field = self.space(flags).fixed_field(lab);
        if let Some(recip) = self.reciprocal(lab, 1) {
            let c = self.self_field_factor();
            for (i, pot) in recip.iter().enumerate() {
                let extra = pot.field() + lab[i].mu * c;
                field[i].d += extra;
                field[i].p += extra;
            }
        }
        field
    }

    /// Total field of the induced dipoles, for the d and p sets.
    fn induced_field(&self, flags: &ExclusionFlags, mu_d: &[V3], mu_p: &[V3]) -> (Vec<V3>, Vec<V3>) {
        let sums = self.space(flags).induced_field(mu_d, mu_p);
        let mut field_d: Vec<V3> = sums.iter().map(|s| s.d).collect();
        let mut field_p: Vec<V3> = sums.iter().map(|s| s.p).collect();

        let c = self.self_field_factor();
        for (mu, field) in vec![(mu_d, &mut field_d), (mu_p, &mut field_p)] {
            let dipoles: Vec<Multipole> = mu.iter().map(|&m| Multipole::dipole(m)).collect();
            if let Some(recip) = self.reciprocal(&dipoles, 1) {
                for (i, pot) in recip.iter().enumerate() {
                    field[i] += pot.field() + mu[i] * c;
                }
            }
        }
        (field_d, field_p)
    }
}

/// `-1/2 sum mu_d . E_p`, before the energy scale.
fn polarization_energy(mu_d: &[V3], field: &[FieldSums]) -> f64
{ -0.5 * mu_d.iter().zip(field).map(|(mu, f)| mu.dot(&f.p)).sum::<f64>() }

fn compute_multipoles(
    sys: &System,
    flags: &ExclusionFlags,
    polarization: &mut Polarization,
    generation: u64,
) -> FailResult<(Cache, Option<SolveReport>)> {
    let lab = lab_multipoles(&sys.table, &sys.positions, sys.options.use_rayon);
    let field = sys.fixed_field(flags, &lab);

    let alpha: Vec<f64> = sys.table.records.iter().map(|r| r.polarizability).collect();
    let mut mu_d: Vec<V3> = field.iter().zip(&alpha).map(|(f, &a)| f.d * a).collect();
    let mut mu_p: Vec<V3> = field.iter().zip(&alpha).map(|(f, &a)| f.p * a).collect();

    let report = match polarization {
        Polarization::None => {
            mu_d = vec![V3::zero(); mu_d.len()];
            mu_p = vec![V3::zero(); mu_p.len()];
            None
        },
        Polarization::Direct => None,
        Polarization::Mutual(history) => {
            let fixed_d: Vec<V3> = field.iter().map(|f| f.d).collect();
            let fixed_p: Vec<V3> = field.iter().map(|f| f.p).collect();
            let problem = MutualProblem {
                polarizability: &alpha,
                fixed_field_d: &fixed_d,
                fixed_field_p: &fixed_p,
                num_real: sys.table.num_real,
                epsilon: sys.options.mutual_epsilon,
                max_iterations: sys.options.max_iterations,
            };
            let report = diis::solve_mutual(&problem, history, &mut mu_d, &mut mu_p, |d, p| {
                Ok(sys.induced_field(flags, d, p))
            })?;
            debug!("induced dipoles: {:?}", report);
            if !report.converged {
                warn!(
                    "induced dipoles did not converge in {} iterations (residual {:.3e} D)",
                    report.iterations, report.residual,
                );
            }
            Some(report)
        },
    };

    Ok((Cache { generation, lab, field, mu_d, mu_p }, report))
}
