use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pbis::PbisError;

/// What happens when a lifetime total is past the last rung of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOverflow {
    /// Treat the student as sitting on the highest defined level
    ClampToHighest,
    /// No further level is defined, leave the student out of leveling
    Exclude,
}

impl LevelOverflow {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clamp" | "clamp_to_highest" => Some(Self::ClampToHighest),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

/// Upper bound on how far back the first collection counts cards
pub const MAX_FALLBACK_WINDOW_YEARS: i32 = 100;

/// Tunables for the weekly collection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PbisConfig {
    /// Ascending lifetime card cutoffs, one per individual level
    pub personal_level_thresholds: Vec<u32>,
    pub level_overflow: LevelOverflow,
    pub cards_per_ta_level: u32,
    pub weekly_winner_count: usize,
    /// Winners from this many of the latest collections sit out the drawing
    pub collections_without_repeat_winners: usize,
    pub random_drawing_enabled: bool,
    pub confirmation_token: String,
    pub recent_collection_days: i64,
    pub fallback_window_years: i32,
    pub staff_winner_count: usize,
    #[serde(with = "duration_millis")]
    pub email_delay: Duration,
    pub default_from_address: String,
    pub revalidate_path: String,
}

impl Default for PbisConfig {
    fn default() -> Self {
        Self {
            personal_level_thresholds: vec![
                25, 50, 85, 120, 165, 210, 265, 320, 385, 450, 525, 600, 675, 750,
            ],
            level_overflow: LevelOverflow::ClampToHighest,
            cards_per_ta_level: 24,
            weekly_winner_count: 10,
            collections_without_repeat_winners: 3,
            random_drawing_enabled: true,
            confirmation_token: "yes".to_string(),
            recent_collection_days: 7,
            fallback_window_years: 2,
            staff_winner_count: 5,
            email_delay: Duration::from_millis(1000),
            default_from_address: "noreply@ncujhs.tech".to_string(),
            revalidate_path: "/pbis".to_string(),
        }
    }
}

impl PbisConfig {
    /// Defaults overridden by any `PBIS_*` variables present in the environment
    pub fn from_env() -> Result<Self, PbisError> {
        let mut config = Self::default();

        if let Some(ladder) = env_value("PBIS_PERSONAL_LEVEL_THRESHOLDS") {
            config.personal_level_thresholds = ladder
                .split(',')
                .map(|rung| rung.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    PbisError::Config(format!("PBIS_PERSONAL_LEVEL_THRESHOLDS: {}", e))
                })?;
        }
        if let Some(policy) = env_value("PBIS_LEVEL_OVERFLOW") {
            config.level_overflow = LevelOverflow::parse(&policy).ok_or_else(|| {
                PbisError::Config(format!("PBIS_LEVEL_OVERFLOW: unknown policy '{}'", policy))
            })?;
        }
        if let Some(value) = env_parsed("PBIS_CARDS_PER_TA_LEVEL") {
            config.cards_per_ta_level = value;
        }
        if let Some(value) = env_parsed("PBIS_WEEKLY_WINNER_COUNT") {
            config.weekly_winner_count = value;
        }
        if let Some(value) = env_parsed("PBIS_COLLECTIONS_WITHOUT_REPEAT_WINNERS") {
            config.collections_without_repeat_winners = value;
        }
        if let Some(flag) = env_value("PBIS_STUDENT_RANDOM_DRAWING_WINNERS") {
            config.random_drawing_enabled = parse_flag(&flag);
        }
        if let Some(token) = env_value("PBIS_CONFIRMATION_TOKEN") {
            config.confirmation_token = token;
        }
        if let Some(value) = env_parsed("PBIS_RECENT_COLLECTION_DAYS") {
            config.recent_collection_days = value;
        }
        if let Some(value) = env_parsed("PBIS_FALLBACK_WINDOW_YEARS") {
            config.fallback_window_years = value;
        }
        if let Some(value) = env_parsed("PBIS_STAFF_WINNER_COUNT") {
            config.staff_winner_count = value;
        }
        if let Some(millis) = env_parsed::<u64>("PBIS_EMAIL_DELAY_MS") {
            config.email_delay = Duration::from_millis(millis);
        }
        if let Some(address) = env_value("PBIS_FROM_ADDRESS") {
            config.default_from_address = address;
        }
        if let Some(path) = env_value("PBIS_REVALIDATE_PATH") {
            config.revalidate_path = path;
        }

        config.validate()?;
        debug!(?config, "Loaded PBIS configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PbisError> {
        if self.personal_level_thresholds.is_empty() {
            return Err(PbisError::Config(
                "personal level thresholds must not be empty".to_string(),
            ));
        }
        if self
            .personal_level_thresholds
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(PbisError::Config(
                "personal level thresholds must be strictly ascending".to_string(),
            ));
        }
        if self.cards_per_ta_level == 0 {
            return Err(PbisError::Config(
                "cards per TA level must be greater than zero".to_string(),
            ));
        }
        if !(0..=MAX_FALLBACK_WINDOW_YEARS).contains(&self.fallback_window_years) {
            return Err(PbisError::Config(format!(
                "fallback window must be between 0 and {} years",
                MAX_FALLBACK_WINDOW_YEARS
            )));
        }
        if self.confirmation_token.is_empty() {
            return Err(PbisError::Config(
                "confirmation token must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
