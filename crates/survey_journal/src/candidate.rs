//! Turning a `Scan` event into a [`CandidateRecord`].

use serde_json::Value;
use survey_core::rating::{
    classify_body, earth2_rating, earth_similarity_score, goldilocks_score, gravity_g,
    worth_landing, BodyProperties, RatingConfig, ATMOSPHERE_PA, METRES_PER_AU, SECONDS_PER_DAY,
};
use survey_core::{sol_distance, CandidateRecord, JournalEvent};

/// Coordinates at or beyond this magnitude are treated as garbage.
pub const MAX_COORDINATE_LY: f64 = 100_000.0;

/// Atmosphere components below this share are left out of the summary.
const MIN_COMPONENT_PERCENT: f64 = 5.0;

/// Where the commander was when the scan arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanContext {
    pub cmdr_name: Option<String>,
    pub session_id: String,
    pub system_name: Option<String>,
    pub system_address: Option<i64>,
    pub star_pos: [f64; 3],
}

/// `StarPos` from a position event, if every coordinate is plausible.
pub fn plausible_star_pos(event: &JournalEvent) -> Option<[f64; 3]> {
    event
        .star_pos()
        .filter(|pos| pos.iter().all(|c| c.abs() < MAX_COORDINATE_LY))
}

/// Short atmosphere description: the game's text, else its type, else the
/// two leading components above 5%.
pub fn atmosphere_text(event: &JournalEvent) -> String {
    if let Some(text) = event
        .str_field("Atmosphere")
        .or_else(|| event.str_field("AtmosphereType"))
        .filter(|s| !s.is_empty())
    {
        return text.to_string();
    }
    let Some(components) = event
        .raw()
        .get("AtmosphereComposition")
        .and_then(Value::as_array)
    else {
        return String::new();
    };
    components
        .iter()
        .take(2)
        .filter_map(|component| {
            let name = component.get("Name")?.as_str()?;
            let percent = component.get("Percent")?.as_f64()?;
            (!name.is_empty() && percent > MIN_COMPONENT_PERCENT)
                .then(|| format!("{name} {percent:.0}%"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Star count for the similarity score: the body's parent chain mentions
/// each star it orbits, so count the `Star` parents, at least one.
fn parent_star_count(event: &JournalEvent) -> u32 {
    let stars = event
        .raw()
        .get("Parents")
        .and_then(Value::as_array)
        .map_or(0, |parents| {
            parents
                .iter()
                .filter(|parent| parent.get("Star").is_some())
                .count()
        });
    u32::try_from(stars).unwrap_or(u32::MAX).max(1)
}

/// Build a candidate from a scan, or `None` when the body is neither
/// Earth-like nor terraformable, or the system or body name is unknown.
pub fn extract_candidate(
    event: &JournalEvent,
    context: &ScanContext,
    rating: &RatingConfig,
) -> Option<CandidateRecord> {
    let planet_class = event.str_field("PlanetClass").unwrap_or_default();
    let terraform_state = event.str_field("TerraformState").unwrap_or_default();
    let kind = classify_body(planet_class, terraform_state)?;

    let star_system = event
        .star_system()
        .map(str::to_string)
        .or_else(|| context.system_name.clone())
        .filter(|s| !s.is_empty())?;
    let body_name = event.body_name()?.to_string();

    let temp_k = event.f64_field("SurfaceTemperature");
    let surface_gravity_g = event.f64_field("SurfaceGravity").map(gravity_g);
    let distance_ls = event.f64_field("DistanceFromArrivalLS");
    let pressure_atm = event.f64_field("SurfacePressure").map(|pa| pa / ATMOSPHERE_PA);
    let rotation_period_days = event
        .f64_field("RotationPeriod")
        .map(|s| s / SECONDS_PER_DAY);
    let orbital_period_days = event
        .f64_field("OrbitalPeriod")
        .map(|s| s / SECONDS_PER_DAY);
    let tidal_lock = event.bool_field("TidalLock");

    let body = BodyProperties {
        planet_class: planet_class.to_string(),
        gravity_g: surface_gravity_g,
        temp_k,
        pressure_atm,
        eccentricity: event.f64_field("Eccentricity"),
        tidal_lock: tidal_lock.unwrap_or(false),
        orbital_period_days,
        rotation_period_days,
        axial_tilt_deg: event.f64_field("AxialTilt"),
        star_count: parent_star_count(event),
    };
    let similarity_score = earth_similarity_score(&body);
    let goldilocks = goldilocks_score(&body);
    let (worth, worth_reason) = worth_landing(rating, temp_k, surface_gravity_g, distance_ls);

    Some(CandidateRecord {
        timestamp_utc: event.timestamp().to_string(),
        event: event.name().to_string(),
        event_id: event.event_id(),
        cmdr_name: context
            .cmdr_name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        session_id: context.session_id.clone(),

        star_system,
        system_address: event.system_address().or(context.system_address),
        body_name,
        body_id: event.body_id(),

        candidate_type: kind.label(),
        planet_class: planet_class.to_string(),
        terraform_state: terraform_state.to_string(),
        atmosphere: atmosphere_text(event),
        volcanism: event.str_field("Volcanism").unwrap_or_default().to_string(),
        landable: event.bool_field("Landable"),
        tidal_lock,
        was_discovered: event.bool_field("WasDiscovered"),
        was_mapped: event.bool_field("WasMapped"),

        distance_from_arrival_ls: distance_ls,
        surface_temp_k: temp_k,
        surface_gravity_g,
        surface_pressure_atm: pressure_atm,
        mass_em: event.f64_field("MassEM"),
        radius_km: event.f64_field("Radius").map(|m| m / 1000.0),
        rotation_period_days,
        orbital_period_days,
        semi_major_axis_au: event
            .f64_field("SemiMajorAxis")
            .map(|m| m / METRES_PER_AU),
        orbital_eccentricity: body.eccentricity,
        axial_tilt_deg: body.axial_tilt_deg,

        earth2_rating: earth2_rating(
            rating,
            similarity_score,
            temp_k,
            surface_gravity_g,
            distance_ls,
        )
        .to_string(),
        similarity_score,
        goldilocks_score: goldilocks.map_or(-1, |g| i64::from(g.total())),
        goldilocks_category: goldilocks
            .map(|g| g.category().to_string())
            .unwrap_or_default(),
        worth_landing: worth.to_string(),
        worth_reason,

        distance_from_sol_ly: sol_distance(context.star_pos),
        star_pos: context.star_pos,
    })
}
