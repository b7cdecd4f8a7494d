/// Ordinal severity parsed from a free-text risk label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskRank {
    #[default]
    Unknown = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl RiskRank {
    /// Keyword match, most severe first: "high"/"red", then "med"/"amber"/"yellow",
    /// then "low"/"green".
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        let has_any = |keywords: &[&str]| keywords.iter().any(|keyword| label.contains(keyword));
        if has_any(&["high", "red"]) {
            RiskRank::High
        } else if has_any(&["med", "amber", "yellow"]) {
            RiskRank::Medium
        } else if has_any(&["low", "green"]) {
            RiskRank::Low
        } else {
            RiskRank::Unknown
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskRank::Unknown => "Unknown",
            RiskRank::Low => "Low",
            RiskRank::Medium => "Medium",
            RiskRank::High => "High",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_expected_tiers() {
        assert_eq!(RiskRank::from_label("HIGH"), RiskRank::High);
        assert_eq!(RiskRank::from_label("Red flag"), RiskRank::High);
        assert_eq!(RiskRank::from_label("Medium"), RiskRank::Medium);
        assert_eq!(RiskRank::from_label("amber"), RiskRank::Medium);
        assert_eq!(RiskRank::from_label("Yellow"), RiskRank::Medium);
        assert_eq!(RiskRank::from_label("low"), RiskRank::Low);
        assert_eq!(RiskRank::from_label("Green"), RiskRank::Low);
        assert_eq!(RiskRank::from_label(""), RiskRank::Unknown);
        assert_eq!(RiskRank::from_label("n/a"), RiskRank::Unknown);
    }

    #[test]
    fn most_severe_keyword_wins() {
        assert_eq!(RiskRank::from_label("Low to High"), RiskRank::High);
        assert_eq!(RiskRank::from_label("low-medium"), RiskRank::Medium);
    }

    #[test]
    fn ordering_matches_severity() {
        assert!(RiskRank::High > RiskRank::Medium);
        assert!(RiskRank::Medium > RiskRank::Low);
        assert!(RiskRank::Low > RiskRank::Unknown);
        assert_eq!(RiskRank::High.value(), 3);
        assert_eq!(RiskRank::default().label(), "Unknown");
    }
}
