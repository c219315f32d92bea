//! Session configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunables applied to every action executed in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Artificial minutes charged for an in-person review when the action
    /// does not name its own cost (travel + assessment)
    pub review_cost_minutes: u32,

    /// Turnaround used for investigation types missing from `turnaround_minutes`
    pub default_turnaround_minutes: u32,

    /// Laboratory / imaging turnaround per investigation type, in sim minutes
    pub turnaround_minutes: HashMap<String, u32>,

    /// Delay before a senior responds to an escalation
    pub escalation_response_minutes: u32,

    /// Author recorded on notes the trainee produces
    pub examiner_name: String,

    /// Grade recorded alongside `examiner_name`
    pub examiner_role: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let turnaround_minutes = [
            ("ABG", 20),
            ("ECG", 5),
            ("FBC", 60),
            ("U&E", 60),
            ("LFT", 60),
            ("CRP", 60),
            ("Troponin", 60),
            ("CXR", 120),
            ("CT_Head", 240),
            ("CT_Chest", 240),
            ("Blood_Cultures", 2880),
        ]
        .into_iter()
        .map(|(name, minutes)| (name.to_string(), minutes))
        .collect();

        Self {
            review_cost_minutes: 30,
            default_turnaround_minutes: 60,
            turnaround_minutes,
            escalation_response_minutes: 15,
            examiner_name: "User".to_string(),
            examiner_role: "FY1".to_string(),
        }
    }
}

impl SessionConfig {
    /// Sets the default in-person review cost.
    pub fn with_review_cost(mut self, minutes: u32) -> Self {
        self.review_cost_minutes = minutes;
        self
    }

    /// Sets the escalation response delay.
    pub fn with_escalation_response(mut self, minutes: u32) -> Self {
        self.escalation_response_minutes = minutes;
        self
    }

    /// Overrides the turnaround of one investigation type.
    pub fn with_turnaround(mut self, investigation: &str, minutes: u32) -> Self {
        self.turnaround_minutes.insert(investigation.to_string(), minutes);
        self
    }

    /// Returns the turnaround for an investigation type.
    pub fn turnaround_for(&self, investigation: &str) -> u32 {
        self.turnaround_minutes
            .get(investigation)
            .copied()
            .unwrap_or(self.default_turnaround_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_turnarounds() {
        let config = SessionConfig::default();
        assert_eq!(config.turnaround_for("ABG"), 20);
        assert_eq!(config.turnaround_for("CXR"), 120);
        assert_eq!(config.turnaround_for("Blood_Cultures"), 2880);
        assert_eq!(config.turnaround_for("Something_Exotic"), 60);
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::default()
            .with_review_cost(45)
            .with_escalation_response(10)
            .with_turnaround("ABG", 5);

        assert_eq!(config.review_cost_minutes, 45);
        assert_eq!(config.escalation_response_minutes, 10);
        assert_eq!(config.turnaround_for("ABG"), 5);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "review_cost_minutes": 20 }"#).unwrap();
        assert_eq!(config.review_cost_minutes, 20);
        assert_eq!(config.escalation_response_minutes, 15);
        assert_eq!(config.turnaround_for("ECG"), 5);
    }
}
