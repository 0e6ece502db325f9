//! Unit tests for crop efficiency rankings.

use farm_autopilot::analytics::{
    fertilized_grow_time, format_duration, is_normal_crop, parse_grow_time, plant_rankings, SortBy,
};
use farm_autopilot::game::PlantRecord;

fn plant(
    id: u64,
    seed_id: u64,
    phases: &str,
    exp: i64,
    output: i64,
    price: i64,
    level: u32,
) -> PlantRecord {
    PlantRecord {
        id,
        seed_id,
        name: format!("plant-{id}"),
        grow_phases: phases.into(),
        exp,
        output,
        price,
        land_level_need: level,
    }
}

fn catalogue() -> Vec<PlantRecord> {
    vec![
        // 1h, 60 exp, 10x5 gold
        plant(1_020_001, 20_001, "seed:600;sprout:3000;", 60, 10, 5, 0),
        // 30m, 40 exp, 4x10 gold
        plant(1_020_002, 20_002, "seed:900;bloom:900;", 40, 4, 10, 5),
        // 2h, 100 exp, 20x20 gold
        plant(1_020_003, 20_003, "a:3600;b:3600;", 100, 20, 20, 12),
        // not a normal crop: seed id out of range
        plant(1_020_004, 90_001, "a:60;", 1000, 1, 1, 0),
        // not a normal crop: id prefix
        plant(2_030_001, 20_004, "a:60;", 1000, 1, 1, 0),
        // no grow time
        plant(1_020_005, 20_005, "", 10, 1, 1, 0),
    ]
}

#[test]
fn grow_time_sums_phase_suffixes() {
    assert_eq!(parse_grow_time("seed:600;sprout:3000;"), 3600);
    assert_eq!(parse_grow_time("a:10;broken;b:x;c:5"), 15);
    assert_eq!(parse_grow_time(""), 0);
}

#[test]
fn durations_format_compactly() {
    assert_eq!(format_duration(45), "45s");
    assert_eq!(format_duration(200), "3m20s");
    assert_eq!(format_duration(7200), "2h");
    assert_eq!(format_duration(8100), "2h15m");
}

#[test]
fn fertiliser_saves_at_least_thirty_seconds() {
    assert!((fertilized_grow_time(3600.0) - 2880.0).abs() < f64::EPSILON);
    assert!((fertilized_grow_time(100.0) - 70.0).abs() < f64::EPSILON);
    assert!((fertilized_grow_time(20.0) - 1.0).abs() < f64::EPSILON);
}

#[test]
fn only_normal_crops_are_ranked() {
    let plants = catalogue();
    assert!(is_normal_crop(&plants[0]));
    assert!(!is_normal_crop(&plants[3]));
    assert!(!is_normal_crop(&plants[4]));

    let ranked = plant_rankings(&plants, SortBy::Exp);
    let ids: Vec<u64> = ranked.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1_020_002, 1_020_001, 1_020_003]);
}

#[test]
fn ranking_fields_are_rounded_rates() {
    let ranked = plant_rankings(&catalogue(), SortBy::Exp);
    let hourly = ranked.iter().find(|r| r.id == 1_020_001).unwrap();

    assert_eq!(hourly.grow_time, 3600);
    assert_eq!(hourly.grow_time_str, "1h");
    assert!((hourly.exp_per_hour - 60.0).abs() < f64::EPSILON);
    assert!((hourly.normal_fertilizer_exp_per_hour - 75.0).abs() < f64::EPSILON);
    assert!((hourly.gold_per_hour - 50.0).abs() < f64::EPSILON);
    assert_eq!(hourly.income, 50);
    assert_eq!(hourly.level, None);
}

#[test]
fn sort_by_gold_and_level() {
    let by_gold: Vec<u64> = plant_rankings(&catalogue(), SortBy::Gold)
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(by_gold, vec![1_020_003, 1_020_002, 1_020_001]);

    let by_level: Vec<Option<u32>> = plant_rankings(&catalogue(), SortBy::Level)
        .iter()
        .map(|r| r.level)
        .collect();
    assert_eq!(by_level, vec![Some(12), Some(5), None]);
}

#[test]
fn sort_keys_parse() {
    assert_eq!("fert".parse::<SortBy>().unwrap(), SortBy::Fert);
    assert_eq!("level".parse::<SortBy>().unwrap(), SortBy::Level);
    assert!("fast".parse::<SortBy>().is_err());
}
