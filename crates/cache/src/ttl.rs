//! Base TTLs per cache class and the quality-score multiplier applied on top.

use book_gateway_core::config::TtlConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Title,
    Isbn,
    Author,
    Enrichment,
}

pub fn base_ttl(class: TtlClass, config: &TtlConfig) -> Duration {
    let days = match class {
        TtlClass::Title => config.title_days,
        TtlClass::Isbn => config.isbn_days,
        TtlClass::Author => config.author_days,
        TtlClass::Enrichment => config.enrichment_days,
    };
    Duration::from_secs((days.max(0) as u64) * 86_400)
}

/// 2.0x for a high-confidence record, 0.5x for a low-confidence one, 1.0x otherwise.
pub fn quality_multiplier(quality_score: f32) -> f64 {
    if quality_score >= 0.8 {
        2.0
    } else if quality_score < 0.3 {
        0.5
    } else {
        1.0
    }
}

pub fn effective_ttl(class: TtlClass, config: &TtlConfig, quality_score: f32) -> Duration {
    let base = base_ttl(class, config);
    let scaled = base.as_secs_f64() * quality_multiplier(quality_score);
    Duration::from_secs_f64(scaled.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TtlConfig {
        TtlConfig::default()
    }

    #[test]
    fn high_quality_doubles_ttl() {
        let ttl = effective_ttl(TtlClass::Title, &config(), 0.9);
        assert_eq!(ttl, Duration::from_secs(7 * 86_400 * 2));
    }

    #[test]
    fn low_quality_halves_ttl() {
        let ttl = effective_ttl(TtlClass::Title, &config(), 0.1);
        assert_eq!(ttl, Duration::from_secs(7 * 86_400 / 2));
    }

    #[test]
    fn mid_quality_keeps_base_ttl() {
        let ttl = effective_ttl(TtlClass::Isbn, &config(), 0.5);
        assert_eq!(ttl, Duration::from_secs(365 * 86_400));
    }

    #[test]
    fn boundary_at_0_8_applies_high_multiplier() {
        assert_eq!(quality_multiplier(0.8), 2.0);
    }

    #[test]
    fn boundary_at_0_3_applies_mid_multiplier() {
        assert_eq!(quality_multiplier(0.3), 1.0);
    }
}
