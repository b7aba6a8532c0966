use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

str_enum!(PipelinePhase {
    Idle => "idle",
    Extracting => "extracting",
    Aggregating => "aggregating",
    Complete => "complete",
});

str_enum!(Tier {
    Weekly => "weekly",
    Monthly => "monthly",
    Quarterly => "quarterly",
    Synthesis => "synthesis",
});

impl Tier {
    /// Tiers in dependency order. Each consumes the previous tier's outputs.
    pub fn all() -> &'static [Tier] {
        &[Self::Weekly, Self::Monthly, Self::Quarterly, Self::Synthesis]
    }
}

str_enum!(JobKind {
    Extraction => "extraction",
    Aggregation => "aggregation",
});

str_enum!(JobState {
    Pending => "pending",
    Running => "running",
    Succeeded => "succeeded",
    DeadLettered => "dead_lettered",
});

impl JobState {
    /// Terminal states never regress on upsert.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::DeadLettered)
    }
}

str_enum!(TrendLabel {
    Improving => "improving",
    Declining => "declining",
    Stable => "stable",
    Volatile => "volatile",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_str() {
        for tier in Tier::all() {
            assert_eq!(Tier::from_str(tier.as_str()).unwrap(), *tier);
        }
        assert_eq!(
            JobState::from_str("dead_lettered").unwrap(),
            JobState::DeadLettered
        );
        assert_eq!(
            TrendLabel::from_str("volatile").unwrap(),
            TrendLabel::Volatile
        );
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        assert!(PipelinePhase::from_str("paused").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::DeadLettered.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&JobState::DeadLettered).unwrap();
        assert_eq!(json, "\"dead_lettered\"");
    }
}
