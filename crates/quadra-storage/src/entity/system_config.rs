use super::{Entity, EntityKind};
use crate::codec::{RecordReader, RecordWriter};
use quadra_common::Result;
use serde::{Deserialize, Serialize};

/// System-wide registration window and flags, persisted as one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Unix seconds.
    pub registration_start: i64,
    /// Unix seconds.
    pub registration_end: i64,
    pub registration_open: bool,
    pub timetable_generated: bool,
}

impl SystemConfig {
    /// True iff registration is flagged open and `start <= now <= end`.
    pub fn is_registration_open_at(&self, now: i64) -> bool {
        self.registration_open && self.registration_start <= now && now <= self.registration_end
    }
}

impl Entity for SystemConfig {
    const KIND: EntityKind = EntityKind::SystemConfig;

    fn key(&self) -> String {
        "system".to_string()
    }

    fn encode(&self) -> String {
        RecordWriter::new()
            .num(self.registration_start)
            .num(self.registration_end)
            .bool(self.registration_open)
            .bool(self.timetable_generated)
            .finish()
    }

    fn decode(line: &str) -> Result<Self> {
        let mut r = RecordReader::new(Self::KIND.name(), line, 4)?;
        Ok(Self {
            registration_start: r.num()?,
            registration_end: r.num()?,
            registration_open: r.bool()?,
            timetable_generated: r.bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_window() {
        let config = SystemConfig {
            registration_start: 100,
            registration_end: 200,
            registration_open: true,
            timetable_generated: false,
        };
        assert!(config.is_registration_open_at(100));
        assert!(config.is_registration_open_at(200));
        assert!(!config.is_registration_open_at(99));
        assert!(!config.is_registration_open_at(201));

        let closed = SystemConfig {
            registration_open: false,
            ..config
        };
        assert!(!closed.is_registration_open_at(150));
    }

    #[test]
    fn test_config_codec() {
        let config = SystemConfig {
            registration_start: -5,
            registration_end: 1_800_000_000,
            registration_open: true,
            timetable_generated: true,
        };
        assert_eq!(config.encode(), "-5|1800000000|1|1");
        assert_eq!(SystemConfig::decode(&config.encode()).unwrap(), config);
        assert!(SystemConfig::decode("1|2|yes|0").is_err());
    }
}
