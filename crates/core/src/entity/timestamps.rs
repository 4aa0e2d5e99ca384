use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{get_datetime, put_datetime, Item, ItemError};

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Creation and last-mutation instants carried by every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    /// Both instants set to `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Records a mutation. `created_at` is left untouched.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn write(&self, item: &mut Item) {
        put_datetime(item, CREATED_AT, &self.created_at);
        put_datetime(item, UPDATED_AT, &self.updated_at);
    }

    pub(crate) fn read(item: &Item) -> Result<Self, ItemError> {
        Ok(Self {
            created_at: get_datetime(item, CREATED_AT)?,
            updated_at: get_datetime(item, UPDATED_AT)?,
        })
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_touch_preserves_created_at() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ts = Timestamps::at(start);

        ts.touch(start + Duration::minutes(5));

        assert_eq!(ts.created_at, start);
        assert_eq!(ts.updated_at, start + Duration::minutes(5));
    }

    #[test]
    fn test_item_round_trip() {
        let ts = Timestamps {
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
                + Duration::nanoseconds(123),
        };
        let mut item = Item::new();
        ts.write(&mut item);

        assert_eq!(Timestamps::read(&item).unwrap(), ts);
    }
}
