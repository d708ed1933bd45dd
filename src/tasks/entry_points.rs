/* ********************************************************************** **
**  This file is part of mpole.                                           **
**                                                                        **
**  mpole is free software: you can redistribute it and/or modify it      **
**  under the terms of the GNU General Public License as published by the **
**  Free Software Foundation, either version 3 of the License, or (at     **
**  your option) any later version.                                       **
**                                                                        **
**      http://www.gnu.org/licenses/                                      **
**                                                                        **
** Do note that, while the whole of mpole is licensed under the GPL, many **
** parts of it are licensed under more permissive terms.                  **
** ********************************************************************** */

use crate::FailResult;
use crate::logging::GlobalLogger;
use crate::water::build_water_cluster;

use std::ffi::OsStr;
use std::fs::File;

use clap::{App, Arg};
use mpole_array_types::V3;
use mpole_electrostatics::{Accumulator, Context, Options, TileLayout};
use mpole_tasks_config::{ValidatedSettings, YamlRead};

fn wrap_result_main<F>(main: F)
where F: FnOnce() -> FailResult<()>,
{
    main().unwrap_or_else(|e| {
        for cause in e.iter_chain() {
            error!("{}", cause);
        }

        if std::env::var_os("RUST_BACKTRACE") == Some(OsStr::new("1").to_owned()) {
            error!("{}", e.backtrace());
        } else {
            error!("(for more detail, try again with RUST_BACKTRACE=1)");
        }
        std::process::exit(1);
    });
}

fn read_settings(path: Option<&str>) -> FailResult<ValidatedSettings> {
    match path {
        Some(path) => {
            let file = File::open(path).map_err(|e| format_err!("{}: {}", path, e))?;
            Ok(YamlRead::from_reader(file)?)
        },
        None => Ok(YamlRead::from_reader(&b"{}"[..])?),
    }
}

fn cubic_box(side: f64) -> [V3; 3]
{ [V3([side, 0.0, 0.0]), V3([0.0, side, 0.0]), V3([0.0, 0.0, side])] }

fn rows(vs: &[V3]) -> Vec<[f64; 3]>
{ vs.iter().map(|v| v.0).collect() }

// %% CRATES: binary: mpole-water-cluster %%
pub fn water_cluster() {
    wrap_result_main(|| {
        let matches = {
            App::new("mpole-water-cluster")
                .version(env!("CARGO_PKG_VERSION"))
                .about("Evaluate polarizable multipole electrostatics on a cluster of waters, printing JSON.")
                .args(&[
                    Arg::with_name("config").short("c").long("config")
                        .takes_value(true).value_name("CONFIG")
                        .help("settings yaml"),
                    Arg::with_name("log").long("log")
                        .takes_value(true).value_name("FILE")
                        .help("also write the log to this file"),
                    Arg::with_name("molecules").long("molecules")
                        .takes_value(true).value_name("N")
                        .help("number of waters (overrides water-cluster.molecules)"),
                    Arg::with_name("verbose").short("v").long("verbose")
                        .help("log every induced dipole iteration"),
                ])
                .get_matches()
        };

        let mut logger = GlobalLogger::default();
        logger.verbose(matches.is_present("verbose"));
        if let Some(path) = matches.value_of("log") {
            logger.path(path);
        }
        logger.apply()?;

        let ValidatedSettings(mut settings) = read_settings(matches.value_of("config"))?;
        if let Some(n) = matches.value_of("molecules") {
            settings.water_cluster.molecules = n.parse()?;
        }
        let output = run_water_cluster(&ValidatedSettings(settings))?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    });
}

/// Evaluate the water cluster scenario and collect everything as JSON.
pub fn run_water_cluster(settings: &ValidatedSettings) -> FailResult<serde_json::Value> {
    let ValidatedSettings(settings) = settings;
    let cluster = build_water_cluster(&settings.water_cluster)?;
    let options = Options::from(settings);
    let box_vectors = settings.water_cluster.box_size.map(cubic_box);
    info!("{} waters, {:?} with {:?} polarization",
        cluster.num_molecules(), options.method, options.polarization);

    let layout = TileLayout::new(&cluster.force.covalent);
    let mut context = Context::new(&cluster.force, options, layout, box_vectors)?;
    context.set_positions(&cluster.positions)?;

    let mut acc = Accumulator::new(context.num_particles());
    let energy = context.execute(&mut acc, true, true)?;
    let induced = context.induced_dipoles()?;
    let moments = context.system_multipole_moments(&cluster.masses)?;
    info!("energy: {:.6} kJ/mol", energy);

    let solve = context.solve_report().map(|report| json!({
        "iterations": report.iterations,
        "residual": report.residual,
        "converged": report.converged,
    }));
    Ok(json!({
        "energy": energy,
        "forces": rows(&acc.forces()),
        "induced-dipoles": rows(&induced),
        "moments": {
            "charge": moments[0],
            "dipole": &moments[1..4],
            "quadrupole": &moments[4..13],
        },
        "pme": context.pme_parameters().map(|(alpha, grid)| json!({"alpha": alpha, "grid": grid})),
        "solve": solve,
    }))
}
