//! Candidate classification and scoring for Earth-like and terraformable
//! bodies.
//!
//! Three independent views of one body:
//! 1. `worth_landing`: a yes/no with a human reason, from temperature,
//!    gravity and distance limits.
//! 2. `earth_similarity_score`: weighted relative deviation from Earth
//!    (0 = Earth twin), ELWs only.
//! 3. `goldilocks_score`: 0..=16 habitability points, ELWs only.

use serde::{Deserialize, Serialize};

pub const STANDARD_GRAVITY: f64 = 9.806_65;
pub const ATMOSPHERE_PA: f64 = 101_325.0;
pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const METRES_PER_AU: f64 = 149_597_870_700.0;

pub const ELW_CANDIDATE_TYPE: &str = "ELW";

/// Rating thresholds. Temperatures in kelvin, gravity in g, distance in ls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub temp_a_min: f64,
    pub temp_a_max: f64,
    pub temp_b_min: f64,
    pub temp_b_max: f64,
    pub grav_a_min: f64,
    pub grav_a_max: f64,
    pub grav_b_min: f64,
    pub grav_b_max: f64,
    pub worth_dist_max: f64,
    pub worth_temp_min: f64,
    pub worth_temp_max: f64,
    pub worth_grav_max: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            temp_a_min: 240.0,
            temp_a_max: 320.0,
            temp_b_min: 200.0,
            temp_b_max: 360.0,
            grav_a_min: 0.80,
            grav_a_max: 1.30,
            grav_b_min: 0.50,
            grav_b_max: 1.80,
            worth_dist_max: 8000.0,
            worth_temp_min: 210.0,
            worth_temp_max: 340.0,
            worth_grav_max: 1.60,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit helpers
// ---------------------------------------------------------------------------

pub fn gravity_g(surface_gravity_ms2: f64) -> f64 {
    surface_gravity_ms2 / STANDARD_GRAVITY
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateKind {
    Elw,
    Terraformable { planet_class: String },
}

impl CandidateKind {
    /// Label stored with the candidate: `ELW` or `"<class> - Terraformable"`.
    pub fn label(&self) -> String {
        match self {
            CandidateKind::Elw => ELW_CANDIDATE_TYPE.to_string(),
            CandidateKind::Terraformable { planet_class } => {
                format!("{planet_class} - Terraformable")
            }
        }
    }
}

pub fn is_earthlike(planet_class: &str) -> bool {
    matches!(planet_class, "Earthlike body" | "Earth-like body")
}

/// `None` for bodies that are neither Earth-like nor terraformable.
pub fn classify_body(planet_class: &str, terraform_state: &str) -> Option<CandidateKind> {
    if is_earthlike(planet_class) {
        Some(CandidateKind::Elw)
    } else if terraform_state.contains("Terraformable") {
        Some(CandidateKind::Terraformable {
            planet_class: planet_class.to_string(),
        })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Worth landing
// ---------------------------------------------------------------------------

/// `("Yes" | "No", reason)`. Checks run distance, temperature, gravity.
pub fn worth_landing(
    config: &RatingConfig,
    temp_k: Option<f64>,
    gravity_g: Option<f64>,
    distance_ls: Option<f64>,
) -> (&'static str, String) {
    let (Some(temp), Some(grav), Some(dist)) = (temp_k, gravity_g, distance_ls) else {
        return ("No", "Missing data".to_string());
    };
    if dist > config.worth_dist_max {
        return ("No", format!("Too far ({dist:.0} LS)"));
    }
    if !(config.worth_temp_min..=config.worth_temp_max).contains(&temp) {
        let celsius = kelvin_to_celsius(temp);
        return ("No", format!("Temperature extreme ({celsius:.0}°C)"));
    }
    if grav > config.worth_grav_max {
        return ("No", format!("High gravity ({grav:.2}G)"));
    }
    ("Yes", "Good landing conditions".to_string())
}

// ---------------------------------------------------------------------------
// Earth similarity
// ---------------------------------------------------------------------------

/// Physical properties of a scanned body, in the units the scores expect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyProperties {
    pub planet_class: String,
    pub gravity_g: Option<f64>,
    pub temp_k: Option<f64>,
    pub pressure_atm: Option<f64>,
    pub eccentricity: Option<f64>,
    pub tidal_lock: bool,
    pub orbital_period_days: Option<f64>,
    pub rotation_period_days: Option<f64>,
    pub axial_tilt_deg: Option<f64>,
    pub star_count: u32,
}

struct Reference {
    gravity_g: f64,
    temp_k: f64,
    pressure_atm: f64,
    orbital_period_days: f64,
    rotation_period_days: f64,
    axial_tilt_deg: f64,
    eccentricity: f64,
    tidal_lock: bool,
    star_count: u32,
}

const EARTH: Reference = Reference {
    gravity_g: 9.797_759 / 9.81,
    temp_k: 288.0,
    pressure_atm: 101_231.656_25 / ATMOSPHERE_PA,
    orbital_period_days: 31_558_150.649_071 / SECONDS_PER_DAY,
    rotation_period_days: 86_164.106_59 / SECONDS_PER_DAY,
    // 0.401426 rad
    axial_tilt_deg: 23.000_016,
    eccentricity: 0.0167,
    tidal_lock: false,
    star_count: 1,
};

/// Relative deviation of `target` from `reference`, weighted separately for
/// overshoot and undershoot.
fn weighted(target: f64, reference: f64, over: f64, under: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    let factor = (target - reference) / reference;
    if factor >= 0.0 {
        factor * over
    } else {
        factor.abs() * under
    }
}

/// Lower is closer to Earth; 0 is an exact match. Non-ELWs score -1.
pub fn earth_similarity_score(body: &BodyProperties) -> f64 {
    if !is_earthlike(&body.planet_class) {
        return -1.0;
    }
    let r = &EARTH;
    let tidal = |locked: bool| if locked { 2.0 } else { 1.0 };

    let mut score = 0.0;
    score += weighted(body.gravity_g.unwrap_or(0.0), r.gravity_g, 25.0, 20.0);
    score += weighted(body.temp_k.unwrap_or(0.0), r.temp_k, 2.0, 1.0);
    score += weighted(body.pressure_atm.unwrap_or(0.0), r.pressure_atm, 1.0, 2.0);
    score += weighted(body.eccentricity.unwrap_or(0.0), r.eccentricity, 20.0, 0.0);
    score += weighted(tidal(body.tidal_lock), tidal(r.tidal_lock), 5.0, 1.0);
    score += weighted(
        body.orbital_period_days.unwrap_or(0.0).abs(),
        r.orbital_period_days,
        1.0,
        1.0,
    );
    score += weighted(
        body.rotation_period_days.unwrap_or(0.0).abs(),
        r.rotation_period_days,
        10.0,
        15.0,
    );
    score += weighted(
        body.axial_tilt_deg.unwrap_or(0.0).abs(),
        r.axial_tilt_deg,
        1.0,
        1.0,
    );
    score += weighted(
        f64::from(body.star_count.max(1)),
        f64::from(r.star_count),
        5.0,
        0.0,
    );
    score
}

pub fn score_to_category(score: f64) -> &'static str {
    match score {
        s if s < 0.0 => "Unknown",
        s if s <= 25.0 => "Earth Twin",
        s if s <= 50.0 => "Excellent",
        s if s <= 100.0 => "Very Good",
        s if s <= 150.0 => "Good",
        s if s <= 250.0 => "Fair",
        s if s <= 400.0 => "Marginal",
        _ => "Poor",
    }
}

/// Every category a candidate can be filed under, best first.
pub const RATING_CATEGORIES: [&str; 8] = [
    "Earth Twin",
    "Excellent",
    "Very Good",
    "Good",
    "Fair",
    "Marginal",
    "Poor",
    "Unknown",
];

/// Overall rating: the similarity category when a score exists, otherwise
/// a coarse Good/Fair from the A temperature and gravity bands.
pub fn earth2_rating(
    config: &RatingConfig,
    similarity_score: f64,
    temp_k: Option<f64>,
    gravity_g: Option<f64>,
    distance_ls: Option<f64>,
) -> &'static str {
    if similarity_score >= 0.0 {
        return score_to_category(similarity_score);
    }
    let (Some(temp), Some(grav), Some(_)) = (temp_k, gravity_g, distance_ls) else {
        return "Unknown";
    };
    let temp_good = (config.temp_a_min..=config.temp_a_max).contains(&temp);
    let grav_good = (config.grav_a_min..=config.grav_a_max).contains(&grav);
    if temp_good && grav_good {
        "Good"
    } else {
        "Fair"
    }
}

// ---------------------------------------------------------------------------
// Goldilocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldilocksScore {
    pub temperature: u8,
    pub gravity: u8,
    pub pressure: u8,
    pub day_length: u8,
}

impl GoldilocksScore {
    pub const MAX: u8 = 16;

    pub fn total(&self) -> u8 {
        self.temperature + self.gravity + self.pressure + self.day_length
    }

    pub fn category(&self) -> &'static str {
        match self.total() {
            16 => "Perfect Goldilocks",
            14..=15 => "Excellent Habitat",
            12..=13 => "Very Good Habitat",
            10..=11 => "Good Habitat",
            7..=9 => "Acceptable Habitat",
            4..=6 => "Marginal Habitat",
            _ => "Poor Habitat",
        }
    }
}

/// Score a value against nested bands, best band first. Each band is
/// `(lo, hi)` inclusive; the first band containing the value decides the
/// points (4, 3, 2, 1), anything outside every band scores 0.
fn banded(value: f64, bands: [(f64, f64); 4]) -> u8 {
    for (points, (lo, hi)) in (1..=4u8).rev().zip(bands) {
        if (lo..=hi).contains(&value) {
            return points;
        }
    }
    0
}

fn temperature_points(temp_k: f64) -> u8 {
    banded(
        temp_k,
        [(280.0, 295.0), (270.0, 310.0), (250.0, 330.0), (230.0, 350.0)],
    )
}

fn gravity_points(gravity_g: f64) -> u8 {
    banded(gravity_g, [(0.9, 1.1), (0.7, 1.3), (0.5, 1.5), (0.3, 2.0)])
}

fn pressure_points(pressure_atm: f64) -> u8 {
    banded(pressure_atm, [(0.8, 1.2), (0.6, 1.5), (0.4, 2.0), (0.2, 3.0)])
}

fn day_length_points(rotation_days: f64, tidal_lock: bool) -> u8 {
    if tidal_lock {
        return 0;
    }
    let hours = rotation_days.abs() * 24.0;
    banded(hours, [(18.0, 30.0), (12.0, 48.0), (6.0, 96.0), (1.0, 240.0)])
}

/// `None` for non-ELWs.
pub fn goldilocks_score(body: &BodyProperties) -> Option<GoldilocksScore> {
    if !is_earthlike(&body.planet_class) {
        return None;
    }
    Some(GoldilocksScore {
        temperature: temperature_points(body.temp_k.unwrap_or(0.0)),
        gravity: gravity_points(body.gravity_g.unwrap_or(0.0)),
        pressure: pressure_points(body.pressure_atm.unwrap_or(0.0)),
        day_length: day_length_points(body.rotation_period_days.unwrap_or(0.0), body.tidal_lock),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earth_like() -> BodyProperties {
        BodyProperties {
            planet_class: "Earthlike body".to_string(),
            gravity_g: Some(EARTH.gravity_g),
            temp_k: Some(EARTH.temp_k),
            pressure_atm: Some(EARTH.pressure_atm),
            eccentricity: Some(EARTH.eccentricity),
            tidal_lock: false,
            orbital_period_days: Some(EARTH.orbital_period_days),
            rotation_period_days: Some(EARTH.rotation_period_days),
            axial_tilt_deg: Some(EARTH.axial_tilt_deg),
            star_count: 1,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify_body("Earthlike body", ""), Some(CandidateKind::Elw));
        assert_eq!(classify_body("Earth-like body", ""), Some(CandidateKind::Elw));
        let hmc = classify_body("High metal content body", "Terraformable").unwrap();
        assert_eq!(hmc.label(), "High metal content body - Terraformable");
        assert_eq!(classify_body("Icy body", ""), None);
        assert_eq!(classify_body("Icy body", "Terraformed"), None);
    }

    #[test]
    fn gravity_conversion() {
        assert!((gravity_g(STANDARD_GRAVITY) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn worth_landing_reasons() {
        let cfg = RatingConfig::default();
        assert_eq!(worth_landing(&cfg, None, Some(1.0), Some(10.0)).1, "Missing data");
        assert_eq!(
            worth_landing(&cfg, Some(288.0), Some(1.0), Some(9000.4)),
            ("No", "Too far (9000 LS)".to_string())
        );
        assert_eq!(
            worth_landing(&cfg, Some(373.15), Some(1.0), Some(10.0)),
            ("No", "Temperature extreme (100°C)".to_string())
        );
        assert_eq!(
            worth_landing(&cfg, Some(288.0), Some(1.7), Some(10.0)),
            ("No", "High gravity (1.70G)".to_string())
        );
        assert_eq!(
            worth_landing(&cfg, Some(288.0), Some(1.0), Some(10.0)),
            ("Yes", "Good landing conditions".to_string())
        );
    }

    #[test]
    fn earth_scores_zero() {
        let score = earth_similarity_score(&earth_like());
        assert!(score.abs() < 1e-6, "score was {score}");
        assert_eq!(score_to_category(score), "Earth Twin");
    }

    #[test]
    fn similarity_penalises_deviation() {
        let heavy = BodyProperties {
            gravity_g: Some(EARTH.gravity_g * 2.0),
            ..earth_like()
        };
        let score = earth_similarity_score(&heavy);
        assert!((score - 25.0).abs() < 1e-6, "score was {score}");

        let locked = BodyProperties {
            tidal_lock: true,
            ..earth_like()
        };
        assert!((earth_similarity_score(&locked) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn non_elw_has_no_similarity() {
        let body = BodyProperties {
            planet_class: "Water world".to_string(),
            ..earth_like()
        };
        assert!(earth_similarity_score(&body) < 0.0);
        assert!(goldilocks_score(&body).is_none());
    }

    #[test]
    fn category_boundaries() {
        assert_eq!(score_to_category(-1.0), "Unknown");
        assert_eq!(score_to_category(25.0), "Earth Twin");
        assert_eq!(score_to_category(50.0), "Excellent");
        assert_eq!(score_to_category(100.0), "Very Good");
        assert_eq!(score_to_category(150.0), "Good");
        assert_eq!(score_to_category(250.0), "Fair");
        assert_eq!(score_to_category(400.0), "Marginal");
        assert_eq!(score_to_category(400.1), "Poor");
    }

    #[test]
    fn fallback_rating_uses_a_bands() {
        let cfg = RatingConfig::default();
        assert_eq!(earth2_rating(&cfg, -1.0, Some(288.0), Some(1.0), Some(5.0)), "Good");
        assert_eq!(earth2_rating(&cfg, -1.0, Some(350.0), Some(1.0), Some(5.0)), "Fair");
        assert_eq!(earth2_rating(&cfg, -1.0, Some(288.0), None, Some(5.0)), "Unknown");
        assert_eq!(earth2_rating(&cfg, 30.0, None, None, None), "Excellent");
    }

    #[test]
    fn goldilocks_for_earth_is_perfect() {
        let score = goldilocks_score(&earth_like()).unwrap();
        assert_eq!(score.total(), GoldilocksScore::MAX);
        assert_eq!(score.category(), "Perfect Goldilocks");
    }

    #[test]
    fn goldilocks_bands() {
        assert_eq!(temperature_points(300.0), 3);
        assert_eq!(temperature_points(229.0), 0);
        assert_eq!(gravity_points(1.4), 2);
        assert_eq!(pressure_points(2.5), 1);
        assert_eq!(day_length_points(1.0, true), 0);
        assert_eq!(day_length_points(0.1, false), 1);
        let locked = BodyProperties {
            tidal_lock: true,
            ..earth_like()
        };
        assert_eq!(goldilocks_score(&locked).unwrap().category(), "Very Good Habitat");
    }
}
