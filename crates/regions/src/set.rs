use crate::record::RegionRecord;
use crate::region::{Region, RegionError};
use alphabot_core::{Signal, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Active regions of one instrument.
///
/// Only checked regions are admitted. Regions leave the set through
/// [`remove`](RegionSet::remove) or [`purge`](RegionSet::purge), never on their own.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    next_id: i64,
    allow_when_empty: bool,
}

impl Default for RegionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionSet {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            next_id: 1,
            allow_when_empty: true,
        }
    }

    /// Whether signals pass when no region is defined (default true).
    pub fn with_allow_when_empty(mut self, allow: bool) -> Self {
        self.allow_when_empty = allow;
        self
    }

    /// Admit a region, allocating an id when it has none. Returns the region id.
    pub fn add(&mut self, mut region: Region) -> Result<i64, RegionError> {
        region.check()?;

        if region.id() < 0 {
            region.set_id(self.next_id);
        } else if self.get(region.id()).is_some() {
            return Err(RegionError::DuplicateId(region.id()));
        }
        let after = region
            .id()
            .checked_add(1)
            .ok_or(RegionError::IdOutOfRange(region.id()))?;
        self.next_id = self.next_id.max(after);

        let id = region.id();
        info!(id, region = %region, "region added");
        self.regions.push(region);
        Ok(id)
    }

    pub fn remove(&mut self, id: i64) -> Result<Region, RegionError> {
        let index = self
            .regions
            .iter()
            .position(|r| r.id() == id)
            .ok_or(RegionError::NotFound(id))?;
        let region = self.regions.remove(index);
        info!(id, "region removed");
        Ok(region)
    }

    pub fn get(&self, id: i64) -> Option<&Region> {
        self.regions.iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Remove and return every region whose deletion condition holds at this price.
    pub fn purge(&mut self, timestamp: Timestamp, bid: Decimal, ask: Decimal) -> Vec<Region> {
        let (deleted, kept): (Vec<Region>, Vec<Region>) = std::mem::take(&mut self.regions)
            .into_iter()
            .partition(|r| r.can_delete(timestamp, bid, ask));
        self.regions = kept;

        for region in &deleted {
            let reason = if region.is_expired(timestamp) {
                "expired"
            } else {
                "canceled"
            };
            info!(id = region.id(), timestamp, reason, "region deleted");
        }
        deleted
    }

    /// First region letting the signal through, if any.
    pub fn passing(&self, timestamp: Timestamp, signal: &Signal) -> Option<&Region> {
        self.regions.iter().find(|r| r.test_region(timestamp, signal))
    }

    /// Gate a signal: true when any region accepts it, or when the set is empty
    /// and empty sets allow everything.
    pub fn allows(&self, timestamp: Timestamp, signal: &Signal) -> bool {
        if self.regions.is_empty() {
            return self.allow_when_empty;
        }
        match self.passing(timestamp, signal) {
            Some(region) => {
                debug!(id = region.id(), price = %signal.price, "signal inside region");
                true
            }
            None => false,
        }
    }

    /// Parse a JSON array of region records. Every region is checked on load.
    pub fn load_json(json: &str) -> Result<Self, RegionError> {
        let records: Vec<RegionRecord> = serde_json::from_str(json)?;
        let mut set = Self::new();
        for record in &records {
            set.add(Region::loads(record)?)?;
        }
        Ok(set)
    }

    pub fn dump_json(&self) -> Result<String, RegionError> {
        let records: Vec<RegionRecord> = self.regions.iter().map(Region::dumps).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{RangeBounds, RegionDirection, Stage, TrendChannel};
    use alphabot_core::Direction;
    use rust_decimal_macros::dec;

    fn range(low: Decimal, high: Decimal, direction: RegionDirection, cancelation: Decimal) -> Region {
        Region::range(
            0,
            Stage::Both,
            direction,
            0,
            0,
            RangeBounds { low, high, cancelation },
        )
        .unwrap()
    }

    fn exit_at(price: Decimal) -> Signal {
        Signal::exit(60, 30, Direction::Long, price)
    }

    #[test]
    fn test_max_id_rejected() {
        let json = r#"[{"version": "1.0.0", "region": 1, "id": 9223372036854775807, "low": 10.0, "high": 20.0}]"#;
        assert!(matches!(
            RegionSet::load_json(json),
            Err(RegionError::IdOutOfRange(i64::MAX))
        ));
    }

    #[test]
    fn test_add_allocates_ids() {
        let mut set = RegionSet::new();
        let a = set
            .add(range(dec!(10), dec!(20), RegionDirection::Both, dec!(0)))
            .unwrap();
        let b = set
            .add(range(dec!(30), dec!(40), RegionDirection::Both, dec!(0)))
            .unwrap();
        assert_eq!((a, b), (1, 2));

        let mut explicit = range(dec!(1), dec!(2), RegionDirection::Both, dec!(0));
        explicit.set_id(10);
        assert_eq!(set.add(explicit.clone()).unwrap(), 10);
        assert!(matches!(set.add(explicit), Err(RegionError::DuplicateId(10))));
        assert_eq!(
            set.add(range(dec!(1), dec!(2), RegionDirection::Both, dec!(0)))
                .unwrap(),
            11
        );
    }

    #[test]
    fn test_allows() {
        let mut set = RegionSet::new();
        assert!(set.allows(30, &exit_at(dec!(100))));
        assert!(!RegionSet::new()
            .with_allow_when_empty(false)
            .allows(30, &exit_at(dec!(100))));

        set.add(range(dec!(10), dec!(20), RegionDirection::Both, dec!(0)))
            .unwrap();
        set.add(range(dec!(30), dec!(40), RegionDirection::Both, dec!(0)))
            .unwrap();
        assert!(set.allows(30, &exit_at(dec!(15))));
        assert!(set.allows(30, &exit_at(dec!(35))));
        assert!(!set.allows(30, &exit_at(dec!(25))));
        assert_eq!(set.passing(30, &exit_at(dec!(35))).map(Region::id), Some(2));
    }

    #[test]
    fn test_purge_removes_triggered_and_expired() {
        let mut set = RegionSet::new();
        let long = set
            .add(range(dec!(10), dec!(20), RegionDirection::Long, dec!(5)))
            .unwrap();
        let trend = set
            .add(
                Region::trend(
                    0,
                    Stage::Both,
                    RegionDirection::Both,
                    0,
                    100,
                    TrendChannel::new(dec!(10), dec!(20), dec!(20), dec!(30), dec!(0)),
                )
                .unwrap(),
            )
            .unwrap();

        assert!(set.purge(50, dec!(6), dec!(6)).is_empty());

        let deleted = set.purge(50, dec!(4), dec!(4.5));
        assert_eq!(deleted.iter().map(Region::id).collect::<Vec<_>>(), vec![long]);

        let deleted = set.purge(100, dec!(15), dec!(15));
        assert_eq!(deleted.iter().map(Region::id).collect::<Vec<_>>(), vec![trend]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut set = RegionSet::new();
        let id = set
            .add(range(dec!(10), dec!(20), RegionDirection::Both, dec!(0)))
            .unwrap();
        assert_eq!(set.remove(id).unwrap().id(), id);
        assert!(matches!(set.remove(id), Err(RegionError::NotFound(_))));
    }

    #[test]
    fn test_json_set_round_trip() {
        let mut set = RegionSet::new();
        set.add(range(dec!(10), dec!(20), RegionDirection::Long, dec!(5)))
            .unwrap();
        set.add(range(dec!(30.5), dec!(40), RegionDirection::Short, dec!(45)))
            .unwrap();

        let loaded = RegionSet::load_json(&set.dump_json().unwrap()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(2), set.get(2));
    }

    #[test]
    fn test_load_json_refuses_invalid_region() {
        let json = r#"[
            {"version": "1.0.0", "region": 1, "low": 10, "high": 20},
            {"version": "1.0.0", "region": 1, "low": 0, "high": 20}
        ]"#;
        assert!(matches!(
            RegionSet::load_json(json),
            Err(RegionError::NonPositivePrice)
        ));
    }
}
