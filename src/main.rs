use std::path::PathBuf;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use layered_erosion::export;
use layered_erosion::heightmap::{self, TerrainParams};
use layered_erosion::hydrology::{self, HydroParams, HydroPreset, HydroWorld};
use layered_erosion::soil::SoilTable;

#[derive(Parser, Debug)]
#[command(name = "layered_erosion")]
#[command(about = "Erode layered terrain with water particles, seepage and cascades")]
struct Args {
    /// Width of the map in cells
    #[arg(short = 'W', long, default_value = "256")]
    width: usize,

    /// Height of the map in cells
    #[arg(short = 'H', long, default_value = "256")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Simulation preset (fast, normal, detailed, incised)
    #[arg(long, default_value = "normal")]
    preset: HydroPreset,

    /// Particles per cycle (default depends on preset and map size)
    #[arg(short = 'p', long)]
    particles: Option<usize>,

    /// Number of simulation cycles
    #[arg(short = 'c', long, default_value = "20")]
    cycles: usize,

    /// Hydrology parameters JSON, overrides the preset
    #[arg(long)]
    params: Option<PathBuf>,

    /// Soil table JSON (built-in table if not specified)
    #[arg(long)]
    soils: Option<PathBuf>,

    /// Output path prefix for PNG exports
    #[arg(short, long, default_value = "erosion")]
    output: String,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let soils = match &args.soils {
        Some(path) => SoilTable::from_json_file(path)?,
        None => SoilTable::default(),
    };
    let params = match &args.params {
        Some(path) => HydroParams::from_json_file(path)?,
        None => HydroParams::from_preset(args.preset),
    };
    let particles = args
        .particles
        .unwrap_or_else(|| HydroParams::particles_for(args.preset, args.width * args.height));

    println!("Generating layered terrain with seed: {}", seed);
    println!("Map size: {}x{}, {} soil types", args.width, args.height, soils.len());
    let terrain_params = TerrainParams::for_table(&soils);
    let terrain =
        heightmap::generate_layered(args.width, args.height, &soils, &terrain_params, seed);
    let initial = terrain.surface_heights();

    let mut world = HydroWorld::new(terrain, soils, params);
    println!(
        "Running {} cycles of {} particles ({}: {})",
        args.cycles,
        particles,
        args.preset,
        args.preset.description()
    );
    let stats = hydrology::simulate(&mut world, args.cycles, particles, &mut rng);

    println!(
        "Eroded {:.2}, deposited {:.2}, {} floods, {} exits, {} cascade particles",
        stats.total_eroded,
        stats.total_deposited,
        stats.floods,
        stats.out_of_bounds,
        stats.cascade_spawns
    );

    let heights = world.terrain.surface_heights();
    let depths = world.terrain.water_depths();
    println!("Standing water: {:.3} units", depths.total());
    let mut change = heights.clone();
    for (x, y, h) in change.iter_mut() {
        *h -= *initial.get(x, y);
    }

    export::export_heightmap(&heights, format!("{}_height.png", args.output))?;
    export::export_heightmap(&change, format!("{}_change.png", args.output))?;
    export::export_water_map(&heights, &depths, 1.0, format!("{}_water.png", args.output))?;
    export::export_frequency_map(
        world.traffic.frequency_map(),
        format!("{}_traffic.png", args.output),
    )?;
    println!("Wrote {}_{{height,change,water,traffic}}.png", args.output);

    if let Some(path) = &args.stats {
        std::fs::write(path, serde_json::to_string_pretty(&stats)?)?;
        println!("Wrote statistics to {}", path.display());
    }

    Ok(())
}
