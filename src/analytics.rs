//! Crop efficiency rankings.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::Serialize;

use crate::game::PlantRecord;
use crate::AppError;

/// Seconds in an hour.
const HOUR_SECS: f64 = 3600.0;

/// Fertiliser speed-up ratio.
const FERTILIZER_RATIO: f64 = 0.2;

/// Minimum fertiliser saving in seconds.
const FERTILIZER_MIN_SAVING_SECS: f64 = 30.0;

/// Ranking key for `getAnalytics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Exp per hour.
    #[default]
    Exp,
    /// Exp per hour with normal fertiliser.
    Fert,
    /// Fruit income per hour.
    Gold,
    /// Required land level, highest first.
    Level,
}

impl FromStr for SortBy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "exp" => Ok(Self::Exp),
            "fert" => Ok(Self::Fert),
            "gold" => Ok(Self::Gold),
            "level" => Ok(Self::Level),
            other => Err(AppError::Control(format!("unknown sort key: {other}"))),
        }
    }
}

/// One ranked crop.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlantRanking {
    /// Plant id.
    pub id: u64,
    /// Seed id.
    pub seed_id: u64,
    /// Display name.
    pub name: String,
    /// Required land level, if restricted.
    pub level: Option<u32>,
    /// Total grow time in seconds.
    pub grow_time: u64,
    /// Grow time for display.
    pub grow_time_str: String,
    /// Exp per hour.
    pub exp_per_hour: f64,
    /// Exp per hour with normal fertiliser.
    pub normal_fertilizer_exp_per_hour: f64,
    /// Fruit income per hour.
    pub gold_per_hour: f64,
    /// Fruit income per harvest.
    pub income: i64,
}

/// Sum of the `:<secs>` suffixes in a `name:secs;name:secs;` phase list.
#[must_use]
pub fn parse_grow_time(phases: &str) -> u64 {
    phases
        .split(';')
        .filter_map(|phase| phase.rsplit_once(':'))
        .filter_map(|(_, secs)| secs.parse::<u64>().ok())
        .sum()
}

/// `45s`, `3m20s`, `2h` or `2h15m`.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 3600 {
        return format!("{}m{}s", seconds / 60, seconds % 60);
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if minutes > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{hours}h")
    }
}

/// Grow time with normal fertiliser: 20% shorter, or 30s shorter when 20% is
/// less than that. Never below one second.
#[must_use]
pub fn fertilized_grow_time(grow_time: f64) -> f64 {
    let saving = grow_time * FERTILIZER_RATIO;
    let fertilized = if saving < FERTILIZER_MIN_SAVING_SECS {
        grow_time - FERTILIZER_MIN_SAVING_SECS
    } else {
        grow_time - saving
    };
    if fertilized > 0.0 {
        fertilized
    } else {
        1.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Ordinary crops: id starting with `102` and seed id in `[20000, 30000)`.
#[must_use]
pub fn is_normal_crop(plant: &PlantRecord) -> bool {
    plant.id.to_string().starts_with("102") && (20_000..30_000).contains(&plant.seed_id)
}

/// Rank ordinary crops by `sort_by`, best first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn plant_rankings(plants: &[PlantRecord], sort_by: SortBy) -> Vec<PlantRanking> {
    let mut results: Vec<PlantRanking> = plants
        .iter()
        .filter(|plant| is_normal_crop(plant))
        .filter_map(|plant| {
            let grow_time = parse_grow_time(&plant.grow_phases);
            if grow_time == 0 {
                return None;
            }
            let secs = grow_time as f64;
            let exp = plant.exp as f64;
            let income = plant.output * plant.price;
            Some(PlantRanking {
                id: plant.id,
                seed_id: plant.seed_id,
                name: plant.name.clone(),
                level: (plant.land_level_need > 0).then_some(plant.land_level_need),
                grow_time,
                grow_time_str: format_duration(grow_time),
                exp_per_hour: round2(exp / secs * HOUR_SECS),
                normal_fertilizer_exp_per_hour: round2(
                    exp / fertilized_grow_time(secs) * HOUR_SECS,
                ),
                gold_per_hour: round2(income as f64 / secs * HOUR_SECS),
                income,
            })
        })
        .collect();

    let descending = |a: f64, b: f64| b.partial_cmp(&a).unwrap_or(Ordering::Equal);
    match sort_by {
        SortBy::Exp => results.sort_by(|a, b| descending(a.exp_per_hour, b.exp_per_hour)),
        SortBy::Fert => results.sort_by(|a, b| {
            descending(
                a.normal_fertilizer_exp_per_hour,
                b.normal_fertilizer_exp_per_hour,
            )
        }),
        SortBy::Gold => results.sort_by(|a, b| descending(a.gold_per_hour, b.gold_per_hour)),
        SortBy::Level => results.sort_by(|a, b| b.level.cmp(&a.level)),
    }
    results
}
