//! Vital signs extraction and NEWS2 early warning scoring.
//!
//! Scenario authors write observations as free text
//! (`"RR 22, SpO2 92% on 2L via nasal cannula, HR 92, BP 145/88, Temp 36.8°C"`).
//! The parser pulls out what it recognizes and falls back to unremarkable
//! adult defaults for everything else.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RESPIRATORY_RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRR:?\s*(\d+)").unwrap());

static OXYGEN_SATURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:SpO2|O2\s*sats?):?\s*(\d+)%?").unwrap());

static OXYGEN_THERAPY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bon\s+\d+(?:\.\d+)?\s*L\b|nasal\s+cannula|face\s*mask|oxygen|O2\s+therapy").unwrap()
});

static HEART_RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:HR|pulse):?\s*(\d+)").unwrap());

static BLOOD_PRESSURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bBP:?\s*(\d+)/(\d+)").unwrap());

// Word boundary keeps "sat 92" from reading as a temperature
static TEMPERATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:Temp|T):?\s*(\d+(?:\.\d+)?)").unwrap());

static REDUCED_CONSCIOUSNESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)confused|drowsy|unresponsive|unconscious").unwrap());

static PAIN_SCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bpain\s*(?:score)?:?\s*(\d+)(?:/10)?").unwrap());

/// AVPU collapsed to the two bands NEWS2 distinguishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consciousness {
    #[default]
    Alert,
    /// New confusion, or responds only to voice or pain, or unresponsive
    #[serde(rename = "CVPU")]
    Cvpu,
}

/// Structured vital signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Beats per minute
    pub heart_rate: u32,
    pub blood_pressure_systolic: u32,
    pub blood_pressure_diastolic: u32,
    /// Degrees Celsius
    pub temperature: f64,
    /// Breaths per minute
    pub respiratory_rate: u32,
    /// Percent
    pub oxygen_saturation: u32,
    /// On supplemental oxygen
    pub oxygen_therapy: bool,
    pub consciousness: Consciousness,
    /// 0-10 if documented
    pub pain_score: Option<u32>,
}

impl Default for VitalSigns {
    fn default() -> Self {
        Self {
            heart_rate: 75,
            blood_pressure_systolic: 120,
            blood_pressure_diastolic: 80,
            temperature: 36.5,
            respiratory_rate: 16,
            oxygen_saturation: 95,
            oxygen_therapy: false,
            consciousness: Consciousness::Alert,
            pain_score: None,
        }
    }
}

fn capture<T: std::str::FromStr>(re: &Regex, text: &str, group: usize) -> Option<T> {
    re.captures(text)
        .and_then(|caps| caps.get(group))
        .and_then(|m| m.as_str().parse().ok())
}

impl VitalSigns {
    /// Extracts vitals from free-text observations.
    ///
    /// Never fails; unrecognized values keep their defaults.
    pub fn parse(observations: &str) -> Self {
        let defaults = Self::default();

        let (systolic, diastolic) = match (
            capture(&BLOOD_PRESSURE, observations, 1),
            capture(&BLOOD_PRESSURE, observations, 2),
        ) {
            (Some(s), Some(d)) => (s, d),
            _ => (defaults.blood_pressure_systolic, defaults.blood_pressure_diastolic),
        };

        let consciousness = if REDUCED_CONSCIOUSNESS.is_match(observations) {
            Consciousness::Cvpu
        } else {
            Consciousness::Alert
        };

        Self {
            heart_rate: capture(&HEART_RATE, observations, 1).unwrap_or(defaults.heart_rate),
            blood_pressure_systolic: systolic,
            blood_pressure_diastolic: diastolic,
            temperature: capture(&TEMPERATURE, observations, 1).unwrap_or(defaults.temperature),
            respiratory_rate: capture(&RESPIRATORY_RATE, observations, 1)
                .unwrap_or(defaults.respiratory_rate),
            oxygen_saturation: capture(&OXYGEN_SATURATION, observations, 1)
                .unwrap_or(defaults.oxygen_saturation),
            oxygen_therapy: OXYGEN_THERAPY.is_match(observations),
            consciousness,
            pain_score: capture(&PAIN_SCORE, observations, 1),
        }
    }

    /// Aggregate NEWS2 score (SpO2 scale 1).
    pub fn news2_score(&self) -> u32 {
        let respiratory = match self.respiratory_rate {
            0..=8 => 3,
            9..=11 => 1,
            12..=20 => 0,
            21..=24 => 2,
            _ => 3,
        };

        let saturation = match self.oxygen_saturation {
            0..=91 => 3,
            92..=93 => 2,
            94..=95 => 1,
            _ => 0,
        };

        let supplemental_oxygen = if self.oxygen_therapy { 2 } else { 0 };

        let systolic = match self.blood_pressure_systolic {
            0..=90 => 3,
            91..=100 => 2,
            101..=110 => 1,
            111..=219 => 0,
            _ => 3,
        };

        let pulse = match self.heart_rate {
            0..=40 => 3,
            41..=50 => 1,
            51..=90 => 0,
            91..=110 => 1,
            111..=130 => 2,
            _ => 3,
        };

        let consciousness = match self.consciousness {
            Consciousness::Alert => 0,
            Consciousness::Cvpu => 3,
        };

        let t = self.temperature;
        let temperature = if t <= 35.0 {
            3
        } else if t <= 36.0 {
            1
        } else if t <= 38.0 {
            0
        } else if t <= 39.0 {
            1
        } else {
            2
        };

        respiratory + saturation + supplemental_oxygen + systolic + pulse + consciousness + temperature
    }
}

/// Clinical risk band for an aggregate NEWS2 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NewsRisk {
    Low,
    Medium,
    High,
}

impl NewsRisk {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=4 => NewsRisk::Low,
            5..=6 => NewsRisk::Medium,
            _ => NewsRisk::High,
        }
    }

    /// Escalation guidance for a score.
    pub fn recommended_action(score: u32) -> &'static str {
        match score {
            0 => "Continue routine monitoring",
            1..=4 => "Monitor at least every 4-6 hours",
            5..=6 => "Urgent review by clinician skilled in acute illness assessment",
            _ => "Emergency assessment by clinical team - consider ICU",
        }
    }
}

/// Scored vitals as shown on the EHR summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsReading {
    pub timestamp: NaiveDateTime,
    pub vitals: VitalSigns,
    pub news2_score: u32,
    pub risk: NewsRisk,
    pub recommended_action: String,
}

impl VitalsReading {
    pub fn from_observations(observations: &str, timestamp: NaiveDateTime) -> Self {
        let vitals = VitalSigns::parse(observations);
        let score = vitals.news2_score();
        Self {
            timestamp,
            vitals,
            news2_score: score,
            risk: NewsRisk::from_score(score),
            recommended_action: NewsRisk::recommended_action(score).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_full_observation_line() {
        let v = VitalSigns::parse(
            "RR 22, SpO2 92% on 2L/min via nasal cannula, HR 92, BP 145/88, Temp 36.8°C",
        );

        assert_eq!(v.respiratory_rate, 22);
        assert_eq!(v.oxygen_saturation, 92);
        assert!(v.oxygen_therapy);
        assert_eq!(v.heart_rate, 92);
        assert_eq!(v.blood_pressure_systolic, 145);
        assert_eq!(v.blood_pressure_diastolic, 88);
        assert_relative_eq!(v.temperature, 36.8);
        assert_eq!(v.consciousness, Consciousness::Alert);
        assert_eq!(v.pain_score, None);
    }

    #[test]
    fn test_parse_uses_defaults_for_missing_values() {
        let v = VitalSigns::parse("Patient comfortable, no concerns");
        assert_eq!(v, VitalSigns::default());
    }

    #[test]
    fn test_parse_alternate_spellings() {
        let v = VitalSigns::parse("pulse: 118, O2 sat 89%, T 38.6, drowsy, pain score 6/10");

        assert_eq!(v.heart_rate, 118);
        assert_eq!(v.oxygen_saturation, 89);
        assert_relative_eq!(v.temperature, 38.6);
        assert_eq!(v.consciousness, Consciousness::Cvpu);
        assert_eq!(v.pain_score, Some(6));
        assert!(!v.oxygen_therapy);
    }

    #[test]
    fn test_saturation_is_not_read_as_temperature() {
        let v = VitalSigns::parse("O2 sat 91%");
        assert_relative_eq!(v.temperature, 36.5);
    }

    #[test]
    fn test_default_vitals_score() {
        // SpO2 95 alone scores 1
        assert_eq!(VitalSigns::default().news2_score(), 1);
    }

    #[test]
    fn test_news2_deteriorating_copd() {
        let v = VitalSigns::parse(
            "RR 22, SpO2 92% on 2L/min via nasal cannula, HR 92, BP 145/88, Temp 36.8°C",
        );
        // RR 2 + SpO2 2 + O2 2 + HR 1
        assert_eq!(v.news2_score(), 7);
        assert_eq!(NewsRisk::from_score(7), NewsRisk::High);
    }

    #[test]
    fn test_news2_critically_unwell() {
        let v = VitalSigns {
            heart_rate: 135,
            blood_pressure_systolic: 88,
            blood_pressure_diastolic: 50,
            temperature: 39.4,
            respiratory_rate: 30,
            oxygen_saturation: 85,
            oxygen_therapy: true,
            consciousness: Consciousness::Cvpu,
            pain_score: None,
        };
        assert_eq!(v.news2_score(), 3 + 3 + 2 + 3 + 3 + 3 + 2);
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(NewsRisk::from_score(0), NewsRisk::Low);
        assert_eq!(NewsRisk::from_score(4), NewsRisk::Low);
        assert_eq!(NewsRisk::from_score(5), NewsRisk::Medium);
        assert_eq!(NewsRisk::from_score(6), NewsRisk::Medium);
        assert_eq!(NewsRisk::from_score(7), NewsRisk::High);
        assert_eq!(NewsRisk::recommended_action(0), "Continue routine monitoring");
    }

    #[test]
    fn test_reading_from_observations() {
        let reading = VitalsReading::from_observations("RR 26, HR 112, confused", at(22, 0));
        assert_eq!(reading.news2_score, 3 + 1 + 2 + 3);
        assert_eq!(reading.risk, NewsRisk::High);
        assert_eq!(reading.timestamp, at(22, 0));
    }
}
