use std::path::Path;
use zonesim::telemetry::logging;
use zonesim::world::zone_data::{YamlZoneDataSource, ZoneData};

fn audit_zone(data: &ZoneData) -> usize {
    let zero_weight: Vec<String> = data
        .spawn_points
        .iter()
        .filter(|point| point.group.total_chance() <= 0)
        .map(|point| format!("{} ({})", point.id, point.group.name))
        .collect();
    let total_weight: i64 = data
        .spawn_points
        .iter()
        .map(|point| point.group.total_chance().max(0))
        .sum();
    let pathed = data
        .spawn_points
        .iter()
        .filter(|point| point.path_id.is_some())
        .count();

    println!("zone {} ({}):", data.zone.id, data.zone.short_name);
    println!("- spawn points: {}", data.spawn_points.len());
    println!("- npc types: {}", data.templates.len());
    println!("- paths: {} (spawn points with own path: {})", data.paths.len(), pathed);
    println!("- total spawn weight: {}", total_weight);
    if !zero_weight.is_empty() {
        println!("- zero-weight groups: {}", zero_weight.join(", "));
    }
    for warning in &data.warnings {
        println!("- warning: {}", warning);
    }
    zero_weight.len()
}

fn main() {
    logging::init_stderr();
    let args: Vec<String> = std::env::args().collect();
    let Some(root) = args.get(1) else {
        eprintln!("usage: spawn_audit <data-root>");
        std::process::exit(2);
    };
    let source = YamlZoneDataSource::from_root(Path::new(root));
    let loaded = match source.load_all() {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("spawn_audit: {}", err);
            std::process::exit(1);
        }
    };

    let mut failures = 0usize;
    let mut zero_weight = 0usize;
    for (path, result) in &loaded {
        match result {
            Ok(data) => zero_weight += audit_zone(data),
            Err(err) => {
                failures += 1;
                eprintln!("spawn_audit: {}: {}", path.display(), err);
            }
        }
    }
    println!(
        "zone files: {}, failed: {}, zero-weight groups: {}",
        loaded.len(),
        failures,
        zero_weight
    );
    if failures > 0 {
        std::process::exit(1);
    }
}
