use utility::edit_distance::edit_distance_shorten;
use utility::geo::BoundingBox;

/// A station or stopping place known to the reference provider (spec
/// GLOSSARY "Point").
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub name: String,
    /// Alternate upstream ids that should be treated as the same physical
    /// point when merging timetable entries (spec §4.6.1 step 1).
    pub sim_rail_point_ids: Vec<String>,
    pub bounds: BoundingBox,
    /// Whether this point can host a scheduled stop at all. A plain passing
    /// point never gets a JIT arrival/departure pair inserted for it (spec
    /// §4.8 "Arrival at a point").
    pub has_schedulable_prefix: bool,
}

/// Read-only point lookups (spec §4.4): by id, by fuzzy name, and by
/// geographic containment.
#[async_trait::async_trait]
pub trait PointProvider: Send + Sync {
    async fn by_id(&self, point_id: &str) -> Option<Point>;
    async fn by_name(&self, name: &str) -> Option<Point>;
    async fn containing(&self, lat: f64, lon: f64) -> Option<Point>;
}

/// An in-memory provider sufficient to drive and test the core (spec's
/// Non-goal: reference-data providers are out of scope as a product).
pub struct InMemoryPointProvider {
    points: Vec<Point>,
}

impl InMemoryPointProvider {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

#[async_trait::async_trait]
impl PointProvider for InMemoryPointProvider {
    async fn by_id(&self, point_id: &str) -> Option<Point> {
        self.points
            .iter()
            .find(|p| p.id == point_id || p.sim_rail_point_ids.iter().any(|a| a == point_id))
            .cloned()
    }

    async fn by_name(&self, name: &str) -> Option<Point> {
        self.points
            .iter()
            .min_by_key(|p| edit_distance_shorten(&p.name.to_lowercase(), &name.to_lowercase()))
            .cloned()
    }

    async fn containing(&self, lat: f64, lon: f64) -> Option<Point> {
        self.points
            .iter()
            .find(|p| p.bounds.contains(lat, lon))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point(id: &str, name: &str) -> Point {
        Point {
            id: id.to_string(),
            name: name.to_string(),
            sim_rail_point_ids: vec![],
            bounds: BoundingBox::around(50.0, 19.0, 1.0),
            has_schedulable_prefix: true,
        }
    }

    #[tokio::test]
    async fn by_name_picks_closest_match() {
        let provider = InMemoryPointProvider::new(vec![
            sample_point("1", "Katowice"),
            sample_point("2", "Krakow Glowny"),
        ]);
        let found = provider.by_name("Krakow Glwny").await.unwrap();
        assert_eq!(found.id, "2");
    }

    #[tokio::test]
    async fn containing_uses_bounding_box() {
        let provider = InMemoryPointProvider::new(vec![sample_point("1", "Katowice")]);
        assert!(provider.containing(50.0, 19.0).await.is_some());
        assert!(provider.containing(10.0, 10.0).await.is_none());
    }
}
