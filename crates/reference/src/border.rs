/// A playable-border point: optionally advertises the set of upstream point
/// ids that must come next for the border to be considered "entered" (spec
/// §4.6.1 step 2, §9 "border flip semantics").
#[derive(Debug, Clone, PartialEq)]
pub struct BorderPoint {
    pub point_id: String,
    /// `None` means this border point uses the simple toggle fallback.
    pub required_next_point_ids: Option<Vec<String>>,
}

#[async_trait::async_trait]
pub trait BorderPointProvider: Send + Sync {
    async fn by_id(&self, point_id: &str) -> Option<BorderPoint>;
}

pub struct InMemoryBorderPointProvider {
    borders: Vec<BorderPoint>,
}

impl InMemoryBorderPointProvider {
    pub fn new(borders: Vec<BorderPoint>) -> Self {
        Self { borders }
    }
}

#[async_trait::async_trait]
impl BorderPointProvider for InMemoryBorderPointProvider {
    async fn by_id(&self, point_id: &str) -> Option<BorderPoint> {
        self.borders.iter().find(|b| b.point_id == point_id).cloned()
    }
}
