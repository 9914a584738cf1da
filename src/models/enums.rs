use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
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
    };
}

str_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Rescheduled => "rescheduled",
    Completed => "completed",
    Rejected => "rejected",
    Cancelled => "cancelled",
    NoShow => "no-show",
});

impl AppointmentStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Rejected | Self::Cancelled | Self::NoShow
        )
    }

    /// Statuses that keep the appointment's time slot reserved.
    pub fn holds_slot(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Rescheduled)
    }
}

str_enum!(UserRole {
    Patient => "patient",
    Doctor => "doctor",
    Admin => "admin",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_parses_hyphenated_no_show() {
        assert_eq!(
            AppointmentStatus::from_str("no-show").unwrap(),
            AppointmentStatus::NoShow
        );
        assert_eq!(AppointmentStatus::NoShow.as_str(), "no-show");
    }

    #[test]
    fn unknown_status_is_invalid_enum() {
        let err = AppointmentStatus::from_str("archived").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn terminal_statuses_do_not_hold_slots() {
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(status.is_terminal());
            assert!(!status.holds_slot());
        }
        assert!(AppointmentStatus::Rescheduled.holds_slot());
        assert!(!AppointmentStatus::Pending.is_terminal());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"no-show\"");
        let role: UserRole = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(role, UserRole::Doctor);
    }
}
