//! Persona profiles (static input) and per-persona runtime state.
//!
//! RULE: PersonaProfile is never mutated by the engine.
//! PersonaRuntimeState lives in the loop's arena, indexed by
//! PersonaIndex, and is only touched for the persona being stepped.

use crate::{
    config::{EmotionConfig, LifecyclePolicy, SimConfig, MAX_HISTORY_WINDOW},
    error::{SimError, SimResult},
    lifecycle::{LifecycleStage, StageTransition},
    types::{Day, PersonaIndex},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

// ── Closed trait enumerations ───────────────────────────────────────
//
// Each enum accepts any string. Unrecognised values land in Unknown,
// which every weighting function maps to a neutral 1.0 multiplier.

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Archetype {
    Explorer,
    Pragmatist,
    Skeptic,
    PowerUser,
    Casual,
    #[default]
    Unknown,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explorer   => "explorer",
            Self::Pragmatist => "pragmatist",
            Self::Skeptic    => "skeptic",
            Self::PowerUser  => "power_user",
            Self::Casual     => "casual",
            Self::Unknown    => "unknown",
        }
    }
}

impl From<String> for Archetype {
    fn from(raw: String) -> Self {
        match normalize(&raw).as_str() {
            "explorer"                => Self::Explorer,
            "pragmatist"              => Self::Pragmatist,
            "skeptic" | "sceptic"     => Self::Skeptic,
            "power_user" | "poweruser" => Self::PowerUser,
            "casual"                  => Self::Casual,
            _                         => Self::Unknown,
        }
    }
}

impl From<Archetype> for String {
    fn from(v: Archetype) -> Self { v.as_str().to_string() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExperienceLevel {
    Novice,
    Intermediate,
    Expert,
    #[default]
    Unknown,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novice       => "novice",
            Self::Intermediate => "intermediate",
            Self::Expert       => "expert",
            Self::Unknown      => "unknown",
        }
    }
}

impl From<String> for ExperienceLevel {
    fn from(raw: String) -> Self {
        match normalize(&raw).as_str() {
            "novice" | "beginner" | "junior" => Self::Novice,
            "intermediate" | "mid"           => Self::Intermediate,
            "expert" | "senior" | "advanced" => Self::Expert,
            _                                => Self::Unknown,
        }
    }
}

impl From<ExperienceLevel> for String {
    fn from(v: ExperienceLevel) -> Self { v.as_str().to_string() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TechAdoption {
    Innovator,
    EarlyAdopter,
    EarlyMajority,
    LateMajority,
    Laggard,
    #[default]
    Unknown,
}

impl TechAdoption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Innovator     => "innovator",
            Self::EarlyAdopter  => "early_adopter",
            Self::EarlyMajority => "early_majority",
            Self::LateMajority  => "late_majority",
            Self::Laggard       => "laggard",
            Self::Unknown       => "unknown",
        }
    }
}

impl From<String> for TechAdoption {
    fn from(raw: String) -> Self {
        match normalize(&raw).as_str() {
            "innovator"      => Self::Innovator,
            "early_adopter"  => Self::EarlyAdopter,
            "early_majority" => Self::EarlyMajority,
            "late_majority"  => Self::LateMajority,
            "laggard"        => Self::Laggard,
            _                => Self::Unknown,
        }
    }
}

impl From<TechAdoption> for String {
    fn from(v: TechAdoption) -> Self { v.as_str().to_string() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CollaborationStyle {
    Independent,
    Collaborative,
    Leader,
    #[default]
    Unknown,
}

impl CollaborationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Independent   => "independent",
            Self::Collaborative => "collaborative",
            Self::Leader        => "leader",
            Self::Unknown       => "unknown",
        }
    }
}

impl From<String> for CollaborationStyle {
    fn from(raw: String) -> Self {
        match normalize(&raw).as_str() {
            "independent" | "solo"      => Self::Independent,
            "collaborative" | "team"    => Self::Collaborative,
            "leader" | "lead"           => Self::Leader,
            _                           => Self::Unknown,
        }
    }
}

impl From<CollaborationStyle> for String {
    fn from(v: CollaborationStyle) -> Self { v.as_str().to_string() }
}

// ── Profile ─────────────────────────────────────────────────────────

/// Static persona traits supplied by the persona generator.
/// `id`, `archetype`, `risk_tolerance` and `patience_level` are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub archetype: Archetype,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    pub risk_tolerance: f64,
    pub patience_level: f64,
    #[serde(default)]
    pub tech_adoption: TechAdoption,
    #[serde(default)]
    pub collaboration_style: CollaborationStyle,
    #[serde(default)]
    pub delight_triggers: Vec<String>,
    #[serde(default)]
    pub referral_triggers: Vec<String>,
}

impl PersonaProfile {
    pub fn new(id: impl Into<String>, archetype: Archetype, risk_tolerance: f64, patience_level: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            archetype,
            role: String::new(),
            experience_level: ExperienceLevel::Unknown,
            risk_tolerance,
            patience_level,
            tech_adoption: TechAdoption::Unknown,
            collaboration_style: CollaborationStyle::Unknown,
            delight_triggers: Vec::new(),
            referral_triggers: Vec::new(),
        }
    }

    pub fn with_experience(mut self, level: ExperienceLevel) -> Self {
        self.experience_level = level;
        self
    }

    pub fn with_tech_adoption(mut self, adoption: TechAdoption) -> Self {
        self.tech_adoption = adoption;
        self
    }

    pub fn with_collaboration(mut self, style: CollaborationStyle) -> Self {
        self.collaboration_style = style;
        self
    }

    pub fn with_delight_triggers<I, T>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.delight_triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_referral_triggers<I, T>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.referral_triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    /// Risk tolerance clamped to [0, 1].
    pub fn risk(&self) -> f64 {
        self.risk_tolerance.clamp(0.0, 1.0)
    }

    /// Patience clamped to [0, 1].
    pub fn patience(&self) -> f64 {
        self.patience_level.clamp(0.0, 1.0)
    }

    /// First delight trigger keyword contained in `action_name`.
    pub fn delight_trigger_in(&self, action_name: &str) -> Option<&str> {
        keyword_in(&self.delight_triggers, action_name)
    }

    /// First referral trigger keyword contained in `action_name`.
    pub fn referral_trigger_in(&self, action_name: &str) -> Option<&str> {
        keyword_in(&self.referral_triggers, action_name)
    }

    /// Shape check only. Trait semantics belong to the persona generator.
    pub fn validate(&self) -> SimResult<()> {
        let reject = |reason: &str| {
            Err(SimError::InvalidPersona {
                persona_id: self.id.clone(),
                reason: reason.to_string(),
            })
        };
        if self.id.trim().is_empty() {
            return reject("id must not be empty");
        }
        if !self.risk_tolerance.is_finite() {
            return reject("risk_tolerance must be a finite number");
        }
        if !self.patience_level.is_finite() {
            return reject("patience_level must be a finite number");
        }
        Ok(())
    }
}

fn keyword_in<'a>(keywords: &'a [String], action_name: &str) -> Option<&'a str> {
    let haystack = action_name.to_ascii_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .find(|k| !k.is_empty() && haystack.contains(&k.to_ascii_lowercase()))
}

/// Validate every profile and reject duplicate ids.
pub fn validate_personas(personas: &[PersonaProfile]) -> SimResult<()> {
    let mut seen = HashSet::with_capacity(personas.len());
    for persona in personas {
        persona.validate()?;
        if !seen.insert(persona.id.as_str()) {
            return Err(SimError::InvalidPersona {
                persona_id: persona.id.clone(),
                reason: "duplicate persona id".into(),
            });
        }
    }
    Ok(())
}

// ── Emotional state ─────────────────────────────────────────────────

/// Four running emotional metrics, each kept in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EmotionalState {
    pub frustration: f64,
    pub confidence:  f64,
    pub delight:     f64,
    pub confusion:   f64,
}

impl EmotionalState {
    /// Starting point for a persona, shaped by experience level.
    pub fn initial(level: ExperienceLevel, config: &EmotionConfig) -> Self {
        let (confidence, confusion) = match level {
            ExperienceLevel::Novice       => (0.3, 0.4),
            ExperienceLevel::Intermediate => (0.5, 0.2),
            ExperienceLevel::Expert       => (0.7, 0.1),
            ExperienceLevel::Unknown      => (0.5, 0.2),
        };
        Self {
            frustration: config.frustration.baseline,
            confidence,
            delight: config.delight.baseline,
            confusion,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            frustration: self.frustration.clamp(0.0, 1.0),
            confidence:  self.confidence.clamp(0.0, 1.0),
            delight:     self.delight.clamp(0.0, 1.0),
            confusion:   self.confusion.clamp(0.0, 1.0),
        }
    }

    pub fn is_bounded(&self) -> bool {
        [self.frustration, self.confidence, self.delight, self.confusion]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

// ── Runtime state ───────────────────────────────────────────────────

/// One remembered action, used for pattern-based decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub day:             Day,
    pub sequence:        u64,
    pub action_name:     String,
    pub action_kind:     String,
    pub success:         bool,
    /// Frustration right after the action was applied.
    pub frustration:     f64,
    pub delight:         f64,
    pub delight_trigger: bool,
    pub referral_trigger: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaRuntimeState {
    pub index:            PersonaIndex,
    pub persona_id:       String,
    pub stage:            LifecycleStage,
    pub action_count:     u64,
    pub actions_today:    u32,
    pub sessions:         u64,
    pub last_action:      Option<String>,
    pub last_action_at:   Option<DateTime<Utc>>,
    pub emotions:         EmotionalState,
    pub history:          VecDeque<HistoryEntry>,
    history_window:       usize,
    pub consecutive_high_frustration: u32,
    /// Consecutive actions ending above the abandonment threshold.
    pub consecutive_severe_frustration: u32,
    pub at_risk_since:    Option<Day>,
    pub referral_seen:    bool,
    /// Per-persona action counter. Strictly increasing.
    pub sequence:         u64,
    pub stage_history:    Vec<StageTransition>,
}

impl PersonaRuntimeState {
    pub fn new(index: PersonaIndex, profile: &PersonaProfile, config: &SimConfig) -> Self {
        let window = config.history_window.clamp(1, MAX_HISTORY_WINDOW);
        Self {
            index,
            persona_id: profile.id.clone(),
            stage: LifecycleStage::New,
            action_count: 0,
            actions_today: 0,
            sessions: 0,
            last_action: None,
            last_action_at: None,
            emotions: EmotionalState::initial(profile.experience_level, &config.emotion),
            history: VecDeque::with_capacity(window),
            history_window: window,
            consecutive_high_frustration: 0,
            consecutive_severe_frustration: 0,
            at_risk_since: None,
            referral_seen: false,
            sequence: 0,
            stage_history: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Reset the per-day counters at a day boundary.
    pub fn begin_day(&mut self) {
        self.actions_today = 0;
    }

    /// Append to the bounded history, evicting the oldest entry.
    pub fn remember(&mut self, entry: HistoryEntry) {
        if entry.referral_trigger {
            self.referral_seen = true;
        }
        while self.history.len() >= self.history_window {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    /// Track the runs of consecutive actions ending above the at-risk
    /// and abandonment thresholds.
    pub fn note_frustration(&mut self, policy: &LifecyclePolicy) {
        let f = self.emotions.frustration;
        self.consecutive_high_frustration = if f > policy.at_risk_frustration {
            self.consecutive_high_frustration + 1
        } else {
            0
        };
        self.consecutive_severe_frustration = if f > policy.abandonment_frustration {
            self.consecutive_severe_frustration + 1
        } else {
            0
        };
    }

    pub fn average_recent_delight(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().map(|h| h.delight).sum::<f64>() / self.history.len() as f64
    }

    /// Mean frustration recorded after past uses of `action_name`.
    pub fn mean_frustration_for(&self, action_name: &str) -> Option<f64> {
        let (sum, n) = self
            .history
            .iter()
            .filter(|h| h.action_name == action_name)
            .fold((0.0, 0usize), |(s, n), h| (s + h.frustration, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Recent entries of `action_kind` that left frustration above `threshold`.
    pub fn frustrating_uses_of_kind(&self, action_kind: &str, threshold: f64) -> usize {
        self.history
            .iter()
            .filter(|h| h.action_kind == action_kind && h.frustration > threshold)
            .count()
    }
}
