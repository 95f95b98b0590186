//! Profiling tool: times terrain generation, particle cycles and sweeps

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use layered_erosion::heightmap::{self, TerrainParams};
use layered_erosion::hydrology::{HydroParams, HydroPreset, HydroWorld, WaterParticle};
use layered_erosion::soil::SoilTable;

fn main() {
    env_logger::init();
    let width = 256;
    let height = 256;
    let seed = 1337u64;
    let cycles = 5;
    let preset = HydroPreset::Normal;

    println!("=== Hydrology Profiling ===");
    println!("Map size: {}x{} ({} cells)", width, height, width * height);
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let soils = SoilTable::default();

    let start = Instant::now();
    let terrain_params = TerrainParams::for_table(&soils);
    let terrain = heightmap::generate_layered(width, height, &soils, &terrain_params, seed);
    let terrain_time = start.elapsed();
    println!("Terrain generation: {:?}", terrain_time);

    let params = HydroParams::from_preset(preset);
    let particles = HydroParams::particles_for(preset, width * height);
    println!("\nPreset: {} ({} particles per cycle, spill {})", preset, particles, params.spill);
    println!();

    let mut world = HydroWorld::new(terrain, soils, params);
    let mut particle_time = Duration::ZERO;
    let mut sweep_time = Duration::ZERO;
    let mut traffic_time = Duration::ZERO;

    for cycle in 0..cycles {
        let steps_before = world.stats.steps;

        let start = Instant::now();
        for _ in 0..particles {
            let mut particle = WaterParticle::spawn(&world, &mut rng);
            particle.descend(&mut world);
            world.stats.particles += 1;
        }
        let elapsed = start.elapsed();
        particle_time += elapsed;

        let start = Instant::now();
        world.sweep();
        sweep_time += start.elapsed();

        let start = Instant::now();
        world
            .traffic
            .update(world.params.frequency_rate, world.params.frequency_steepness);
        world.traffic.reset();
        traffic_time += start.elapsed();

        let steps = world.stats.steps - steps_before;
        println!(
            "Cycle {}: {:?} particles, {} steps ({:.0} steps/ms)",
            cycle + 1,
            elapsed,
            steps,
            steps as f64 / elapsed.as_secs_f64().max(1e-9) / 1000.0
        );
    }

    let stats = &world.stats;
    println!("  Eroded: {:.2} units", stats.total_eroded);
    println!("  Deposited: {:.2} units", stats.total_deposited);
    println!(
        "  Floods: {}, exits: {}, cascade particles: {}",
        stats.floods, stats.out_of_bounds, stats.cascade_spawns
    );

    let total = terrain_time + particle_time + sweep_time + traffic_time;
    let pct = |d: Duration| 100.0 * d.as_secs_f64() / total.as_secs_f64().max(1e-9);
    println!("\n=== Summary ===");
    println!("Terrain:          {:>8.2}% ({:?})", pct(terrain_time), terrain_time);
    println!("Particles:        {:>8.2}% ({:?})", pct(particle_time), particle_time);
    println!("Sweeps:           {:>8.2}% ({:?})", pct(sweep_time), sweep_time);
    println!("Traffic update:   {:>8.2}% ({:?})", pct(traffic_time), traffic_time);
    println!("─────────────────────────────────");
    println!("Total:            {:?}", total);
}
