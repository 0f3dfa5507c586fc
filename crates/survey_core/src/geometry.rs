use std::f64::consts::PI;

/// Width of one survey bin in light years.
pub const Z_BIN_SIZE: i64 = 50;

/// Simplified galactic core position used for the worksheet's "R from Core".
pub const GALACTIC_CORE: [f64; 3] = [0.0, 0.0, 25_900.0];

/// Reference radius for samples that ran out of systems before reaching 50.
const SHORT_SAMPLE_RADIUS_LY: f64 = 20.0;
const FULL_SAMPLE_N: i64 = 50;

/// Height above the galactic plane. Journal `StarPos` is `[x, y, z]` with
/// `y` pointing out of the plane, so that is what density samples climb.
pub fn survey_axis(star_pos: [f64; 3]) -> f64 {
    star_pos[1]
}

/// Snap a coordinate to its bin centre, rounding half-way cases to even.
///
/// `calculate_z_bin(347.0, 50) == 350`, `calculate_z_bin(25.0, 50) == 0`.
#[allow(clippy::cast_possible_truncation)]
pub fn calculate_z_bin(coord: f64, bin_size: i64) -> i64 {
    if bin_size <= 0 || !coord.is_finite() {
        return 0;
    }
    let bins = (coord / bin_size as f64).round_ties_even();
    bins as i64 * bin_size
}

pub fn sol_distance(star_pos: [f64; 3]) -> f64 {
    let [x, y, z] = star_pos;
    (x * x + y * y + z * z).sqrt()
}

pub fn distance_from_core(star_pos: [f64; 3]) -> f64 {
    let dx = star_pos[0] - GALACTIC_CORE[0];
    let dy = star_pos[1] - GALACTIC_CORE[1];
    let dz = star_pos[2] - GALACTIC_CORE[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Stellar density estimate for one sampled system.
///
/// A full sample (n == 50) divides by the sphere reaching the 50th system;
/// a short sample (n < 50) uses the fixed 20 ly reference sphere. Anything
/// above 50 is not a valid sample and yields `None`.
pub fn density_rho(corrected_n: i64, max_distance: f64) -> Option<f64> {
    let sphere = |r: f64| (4.0 * PI / 3.0) * r.powi(3);
    match corrected_n.cmp(&FULL_SAMPLE_N) {
        std::cmp::Ordering::Equal if max_distance > 0.0 => {
            Some(FULL_SAMPLE_N as f64 / sphere(max_distance))
        }
        std::cmp::Ordering::Less => Some(corrected_n as f64 / sphere(SHORT_SAMPLE_RADIUS_LY)),
        _ => None,
    }
}
