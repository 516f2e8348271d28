use serde::{Deserialize, Serialize};

// =============================================================================
// Spots
// =============================================================================

/// A tour spot from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    /// Catalog identifier, unique within the catalog.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Long-form description shown on the detail view and fed to the guide persona.
    pub description: String,
    /// Cover image URL.
    #[serde(default)]
    pub image: String,
}

/// The part of a spot a chat session needs. Immutable for the session's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotContext {
    pub name: String,
    pub description: String,
}

impl SpotContext {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl From<&Spot> for SpotContext {
    fn from(spot: &Spot) -> Self {
        Self {
            name: spot.name.clone(),
            description: spot.description.clone(),
        }
    }
}

/// Look up a spot by catalog id.
pub fn find_spot<'a>(spots: &'a [Spot], id: &str) -> Option<&'a Spot> {
    spots.iter().find(|s| s.id == id)
}

/// The built-in Hangzhou catalog used when the config file lists no spots.
pub fn default_spots() -> Vec<Spot> {
    vec![
        Spot {
            id: "1".to_string(),
            name: "西湖".to_string(),
            description: "杭州市区最著名的景点，有着悠久的历史和美丽的自然风光。西湖三面环山，一面临城，湖中点缀着许多亭台楼阁，是游客必访的景点之一。".to_string(),
            image: "https://images.unsplash.com/photo-1598887142487-3c854d51d1c7".to_string(),
        },
        Spot {
            id: "2".to_string(),
            name: "灵隐寺".to_string(),
            description: "始建于东晋，是杭州最古老的寺院之一。寺院依山而建，环境清幽，是体验佛教文化的理想去处。".to_string(),
            image: "https://images.unsplash.com/photo-1599888384589-5cae656cc89c".to_string(),
        },
        Spot {
            id: "3".to_string(),
            name: "千岛湖".to_string(),
            description: "位于淳安县，是世界上岛屿最多的湖泊之一。这里水质清澈，空气清新，是休闲度假的绝佳选择。".to_string(),
            image: "https://images.unsplash.com/photo-1501785888041-af3ef285b470".to_string(),
        },
        Spot {
            id: "4".to_string(),
            name: "宋城".to_string(),
            description: "以宋朝文化为主题的大型主题公园，在这里可以体验到丰富的宋代文化和精彩的表演节目。".to_string(),
            image: "https://images.unsplash.com/photo-1533727937480-da3a97967e95".to_string(),
        },
        Spot {
            id: "5".to_string(),
            name: "河坊街".to_string(),
            description: "杭州著名的古街，保留了明清时期的建筑风格。街道两旁有许多特色小店和老字号，是感受杭州传统文化的好去处。".to_string(),
            image: "https://images.unsplash.com/photo-1518563222397-1875011bbf5a".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spots_have_unique_ids() {
        let spots = default_spots();
        assert_eq!(spots.len(), 5);
        let mut ids: Vec<&str> = spots.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_find_spot() {
        let spots = default_spots();
        assert_eq!(find_spot(&spots, "1").map(|s| s.name.as_str()), Some("西湖"));
        assert!(find_spot(&spots, "99").is_none());
    }

    #[test]
    fn test_spot_context_from_spot() {
        let spots = default_spots();
        let ctx = SpotContext::from(&spots[1]);
        assert_eq!(ctx.name, "灵隐寺");
        assert_eq!(ctx.description, spots[1].description);
    }

    #[test]
    fn test_spot_image_defaults_when_missing() {
        let spot: Spot =
            serde_json::from_str(r#"{"id":"x","name":"n","description":"d"}"#).unwrap();
        assert!(spot.image.is_empty());
    }
}
