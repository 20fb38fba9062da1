//! River mouth landforms: estuaries and distributary deltas.

use geo::{Area, Coord, LineString, Polygon};
use glam::DVec2;
use rand::Rng;
use tidewater_config::TerrainConfig;

use crate::feature::{
    DeltaChannelProperties, DeltaType, EstuaryProperties, FeatureProperties, TerrainFeature,
    WetlandProperties, WetlandType,
};
use crate::geometry::{chaikin, line_length, polygon_from_ring, to_coord, to_dvec};
use crate::grid::{Heightfield, NEIGHBORS_8, TileFrame};
use crate::river::River;

/// Offshore depth statistics sampled along the river's final heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OffshoreProfile {
    /// Deepest sampled depth below the water level.
    pub max_depth: f64,
    /// Average depth gained per cell past the mouth.
    pub drop_rate: f64,
}

/// Classifies a mouth from its offshore profile and discharge.
pub fn classify_mouth(
    profile: OffshoreProfile,
    mouth_flow: f64,
    config: &TerrainConfig,
) -> DeltaType {
    let settings = &config.delta;
    if profile.max_depth >= settings.estuary_depth
        && profile.drop_rate >= settings.estuary_drop_rate
    {
        DeltaType::Estuary
    } else if mouth_flow >= settings.birds_foot_flow && profile.drop_rate < settings.gentle_slope {
        DeltaType::BirdsFoot
    } else {
        DeltaType::Fan
    }
}

fn depth_at(heights: &Heightfield, x: i64, y: i64, water_level: f64) -> Option<f64> {
    heights.get_signed(x, y).map(|h| (water_level - h).max(0.0))
}

/// Samples depths along `dir` from the terminus cell.
pub fn offshore_profile(
    heights: &Heightfield,
    terminus: (usize, usize),
    dir: DVec2,
    samples: usize,
    water_level: f64,
) -> OffshoreProfile {
    let start = DVec2::new(terminus.0 as f64, terminus.1 as f64);
    let base = heights.get(terminus.0, terminus.1);
    let base_depth = (water_level - base).max(0.0);
    let mut max_depth = base_depth;
    let mut taken = 0;
    for k in 1..=samples {
        let p = start + dir * k as f64;
        let (x, y) = (p.x.round() as i64, p.y.round() as i64);
        let Some(depth) = depth_at(heights, x, y, water_level) else {
            break;
        };
        max_depth = max_depth.max(depth);
        taken = k;
    }
    let drop_rate = if taken == 0 {
        0.0
    } else {
        (max_depth - base_depth) / taken as f64
    };
    OffshoreProfile { max_depth, drop_rate }
}

fn near_water(heights: &Heightfield, (x, y): (usize, usize), water_level: f64) -> bool {
    heights.get(x, y) < water_level
        || NEIGHBORS_8.iter().any(|&(dx, dy)| {
            heights
                .get_signed(x as i64 + dx, y as i64 + dy)
                .is_some_and(|h| h < water_level)
        })
}

struct Mouth<'a> {
    river: &'a River,
    at: DVec2,
    dir: DVec2,
    kind: DeltaType,
}

fn estuary(mouth: &Mouth<'_>, config: &TerrainConfig, cell_size: f64) -> Vec<TerrainFeature> {
    let settings = &config.delta;
    let length = settings.channel_length_cells * cell_size;
    let head = mouth.river.width;
    let mouth_width = head * settings.estuary_widening;
    let side = mouth.dir.perp();
    let far = mouth.at + mouth.dir * length;

    let head_l = mouth.at + side * head * 0.5;
    let head_r = mouth.at - side * head * 0.5;
    let far_l = far + side * mouth_width * 0.5;
    let far_r = far - side * mouth_width * 0.5;

    let mut features = Vec::new();
    let Some(channel) = polygon_from_ring(vec![
        to_coord(head_r),
        to_coord(far_r),
        to_coord(far_l),
        to_coord(head_l),
    ]) else {
        return features;
    };
    features.push(TerrainFeature::polygon(
        channel.clone(),
        FeatureProperties::Estuary(EstuaryProperties {
            river_id: mouth.river.id,
            area: channel.unsigned_area(),
            length,
            head_width: head,
            mouth_width,
        }),
    ));

    let strip = settings.wetland_strip_cells * cell_size;
    for (near, far_edge, sign) in [(head_l, far_l, 1.0), (head_r, far_r, -1.0)] {
        let out = side * strip * sign;
        let ring = vec![
            to_coord(near),
            to_coord(far_edge),
            to_coord(far_edge + out),
            to_coord(near + out),
        ];
        if let Some(wetland) = polygon_from_ring(ring) {
            features.push(wetland_feature(wetland, WetlandType::Estuarine, mouth.river.id));
        }
    }
    features
}

fn wetland_feature(
    polygon: Polygon<f64>,
    wetland_type: WetlandType,
    river_id: usize,
) -> TerrainFeature {
    let area = polygon.unsigned_area();
    TerrainFeature::polygon(
        polygon,
        FeatureProperties::Wetland(WetlandProperties {
            area,
            wetland_type,
            river_id,
        }),
    )
}

fn distributaries(
    mouth: &Mouth<'_>,
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
    rng: &mut impl Rng,
) -> Vec<TerrainFeature> {
    let settings = &config.delta;
    let cs = frame.cell_size();
    let count: usize = rng.random_range(3..=6);
    let spread = match mouth.kind {
        DeltaType::BirdsFoot => 35.0_f64.to_radians(),
        _ => 60.0_f64.to_radians(),
    };
    let steps = settings.channel_length_cells.round().max(2.0) as usize;
    let base_angle = mouth.dir.y.atan2(mouth.dir.x);
    let width_start = mouth.river.width * 0.6;
    let width_end = width_start * 0.3;

    let mut channels: Vec<Vec<Coord<f64>>> = Vec::with_capacity(count);
    for i in 0..count {
        let frac = i as f64 / (count - 1) as f64;
        let jitter = rng.random_range(-0.5..=0.5) * spread / count as f64;
        let mut heading = base_angle - spread + 2.0 * spread * frac + jitter;
        let mut p = mouth.at;
        let mut coords = vec![to_coord(p)];
        for _ in 0..steps {
            heading += rng.random_range(-0.15..=0.15);
            p += DVec2::from_angle(heading) * cs;
            coords.push(to_coord(p));
        }
        channels.push(chaikin(&coords, 2));
    }

    let mut features: Vec<TerrainFeature> = channels
        .iter()
        .map(|coords| {
            let line = LineString::new(coords.clone());
            let length = line_length(&line);
            TerrainFeature::line(
                line,
                FeatureProperties::DeltaChannel(DeltaChannelProperties {
                    river_id: mouth.river.id,
                    delta_type: mouth.kind,
                    length,
                    width_start,
                    width_end,
                }),
            )
        })
        .collect();

    let limit = config.water_level + settings.wetland_max_height;
    for pair in channels.windows(2) {
        let mut ring = pair[0].clone();
        ring.extend(pair[1].iter().rev().take(pair[1].len() - 1));
        let mean = ring
            .iter()
            .map(|&c| {
                let (gx, gy) = frame.to_grid(c);
                heights.sample(gx, gy)
            })
            .sum::<f64>()
            / ring.len() as f64;
        if mean >= limit {
            continue;
        }
        if let Some(wetland) = polygon_from_ring(ring) {
            features.push(wetland_feature(wetland, WetlandType::Deltaic, mouth.river.id));
        }
    }
    features
}

/// Delta or estuary features for every qualifying river mouth.
pub fn extract_deltas(
    rivers: &[River],
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
    rng: &mut impl Rng,
) -> Vec<TerrainFeature> {
    let settings = &config.delta;
    let wl = config.water_level;
    let mut features = Vec::new();
    if !settings.enabled {
        return features;
    }

    for river in rivers {
        let tail = (river.cells.last(), river.cells.iter().rev().nth(1));
        let (Some(&last), Some(&prev)) = tail else {
            continue;
        };
        if river.mouth_flow < settings.min_flow || !near_water(heights, last, wl) {
            continue;
        }
        let step = DVec2::new(last.0 as f64 - prev.0 as f64, last.1 as f64 - prev.1 as f64);
        let Some(dir) = step.try_normalize() else {
            continue;
        };
        let Some(&end) = river.line.0.last() else { continue };

        let profile = offshore_profile(heights, last, dir, settings.sample_cells, wl);
        let kind = classify_mouth(profile, river.mouth_flow, config);
        tracing::trace!(river = river.id, ?kind, ?profile, "river mouth");

        let mouth = Mouth {
            river,
            at: to_dvec(end),
            dir,
            kind,
        };
        match kind {
            DeltaType::Estuary => features.extend(estuary(&mouth, config, frame.cell_size())),
            DeltaType::BirdsFoot | DeltaType::Fan => {
                features.extend(distributaries(&mouth, heights, frame, config, rng));
            }
        }
    }
    features
}
