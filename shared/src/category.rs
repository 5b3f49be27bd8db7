use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed task classification buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Health,
    Errands,
    Finance,
    Social,
    Learning,
    Home,
    #[default]
    Other,
}

/// Display metadata for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

static REGISTRY: [(Category, CategoryInfo); 9] = [
    (Category::Work, CategoryInfo { label: "Work", color: "#6366f1", icon: "💼" }),
    (Category::Personal, CategoryInfo { label: "Personal", color: "#ec4899", icon: "👤" }),
    (Category::Health, CategoryInfo { label: "Health & Fitness", color: "#10b981", icon: "🏃" }),
    (Category::Errands, CategoryInfo { label: "Errands", color: "#f59e0b", icon: "🛒" }),
    (Category::Finance, CategoryInfo { label: "Finance", color: "#06b6d4", icon: "💰" }),
    (Category::Social, CategoryInfo { label: "Social", color: "#8b5cf6", icon: "👥" }),
    (Category::Learning, CategoryInfo { label: "Learning", color: "#f43f5e", icon: "📚" }),
    (Category::Home, CategoryInfo { label: "Home", color: "#84cc16", icon: "🏠" }),
    (Category::Other, CategoryInfo { label: "Other", color: "#71717a", icon: "📌" }),
];

impl Category {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Personal => "personal",
            Self::Health => "health",
            Self::Errands => "errands",
            Self::Finance => "finance",
            Self::Social => "social",
            Self::Learning => "learning",
            Self::Home => "home",
            Self::Other => "other",
        }
    }

    pub fn info(&self) -> &'static CategoryInfo {
        // REGISTRY covers every variant
        REGISTRY
            .iter()
            .find(|(c, _)| c == self)
            .map(|(_, info)| info)
            .unwrap_or(&REGISTRY[REGISTRY.len() - 1].1)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .map(|(c, _)| *c)
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Looks up display info for a category key. Unknown keys get the "other" entry.
pub fn resolve(key: &str) -> &'static CategoryInfo {
    key.parse::<Category>().unwrap_or_default().info()
}

/// All registry entries in display order.
pub fn all() -> impl Iterator<Item = (Category, &'static CategoryInfo)> {
    REGISTRY.iter().map(|(c, info)| (*c, info))
}
