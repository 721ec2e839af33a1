//! Precision policy
//!
//! Maps a named precision level to a perturbation sample budget. Higher
//! budgets trade latency for explanation fidelity; this is the only
//! behavioral knob at the request boundary besides `explain`. Unknown names
//! resolve to a small fallback budget rather than failing.

/// Sample budget used when the request names an unrecognized precision.
pub const FALLBACK_SAMPLES: usize = 10;

/// Named explanation precision level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionLevel {
    Low,
    Medium,
    High,
}

impl Default for PrecisionLevel {
    fn default() -> Self {
        PrecisionLevel::Medium
    }
}

impl PrecisionLevel {
    /// Parse a level name. Accepts the English names and the historical
    /// French UI names. Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Low" | "Faible" => Some(PrecisionLevel::Low),
            "Medium" | "Moyenne" => Some(PrecisionLevel::Medium),
            "High" | "Importante" => Some(PrecisionLevel::High),
            _ => None,
        }
    }

    /// Number of perturbation samples drawn at this level.
    pub fn sample_budget(&self) -> usize {
        match self {
            PrecisionLevel::Low => 50,
            PrecisionLevel::Medium => 200,
            PrecisionLevel::High => 1000,
        }
    }

    /// Resolve a level name to a sample budget, falling back to
    /// [`FALLBACK_SAMPLES`] for unknown names.
    pub fn resolve(name: &str) -> usize {
        Self::from_name(name)
            .map(|level| level.sample_budget())
            .unwrap_or(FALLBACK_SAMPLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets_are_strictly_monotonic() {
        assert!(PrecisionLevel::resolve("Low") < PrecisionLevel::resolve("Medium"));
        assert!(PrecisionLevel::resolve("Medium") < PrecisionLevel::resolve("High"));
    }

    #[test]
    fn test_unknown_name_falls_back() {
        assert_eq!(PrecisionLevel::resolve("unknown"), FALLBACK_SAMPLES);
        assert_eq!(PrecisionLevel::resolve(""), FALLBACK_SAMPLES);
    }

    #[test]
    fn test_locale_variants() {
        assert_eq!(
            PrecisionLevel::from_name("Faible"),
            Some(PrecisionLevel::Low)
        );
        assert_eq!(
            PrecisionLevel::from_name("Moyenne"),
            Some(PrecisionLevel::Medium)
        );
        assert_eq!(
            PrecisionLevel::from_name("Importante"),
            Some(PrecisionLevel::High)
        );
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(PrecisionLevel::default(), PrecisionLevel::Medium);
        assert_eq!(PrecisionLevel::default().sample_budget(), 200);
    }
}
