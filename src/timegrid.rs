use serde::{Deserialize, Serialize};

/// A timeslot label on the daily grid. Ordering is derived, and because the
/// text form is always zero-padded "HH:MM" it coincides with chronological
/// order, so slots can be compared without any date-time arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot {
    hour: u8,
    min: u8,
}

impl Slot {
    pub fn to_minutes(self) -> u32 {
        self.hour as u32 * 60 + self.min as u32
    }

    /// Inverse of `to_minutes`. None past the end of the day.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        if minutes >= 24 * 60 {
            return None;
        }
        Some(Self {
            hour: (minutes / 60) as u8,
            min: (minutes % 60) as u8,
        })
    }
}

impl TryFrom<&str> for Slot {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        //ensure only 5 chars
        if value.len() != 5 {
            return Err(format!("Invalid length: {}", value.len()));
        }
        let mut parts = value.split(':');
        let hour = parts
            .next()
            .ok_or_else(|| "Missing hour".to_string())?
            .parse::<u8>()
            .map_err(|e| format!("Invalid hour: {}", e))?;
        if hour > 23 {
            return Err(format!("Invalid hour, value too high: {}", hour));
        }

        let min = parts
            .next()
            .ok_or_else(|| "Missing min".to_string())?
            .parse::<u8>()
            .map_err(|e| format!("Invalid min: {}", e))?;
        if min > 59 {
            return Err(format!("Invalid min, value too high: {}", min));
        }
        Ok(Self { hour, min })
    }
}

impl TryFrom<String> for Slot {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slot::try_from(value.as_str())
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.to_string()
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.min)
    }
}

/// Shape of the daily grid as configured: first slot, slot width and count.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub start: Slot,
    pub slot_minutes: u32,
    pub slot_count: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            start: Slot { hour: 7, min: 0 },
            slot_minutes: 30,
            slot_count: 25,
        }
    }
}

/// The canonical ordered sequence of timeslot boundaries for one operating
/// day. Built once from config; every call sees the same labels.
#[derive(Debug, Clone)]
pub struct TimeGrid {
    slots: Vec<Slot>,
}

impl TimeGrid {
    pub fn new(config: &GridConfig) -> Result<Self, String> {
        if config.slot_minutes == 0 || config.slot_count < 2 {
            return Err(format!(
                "Grid needs at least two boundaries of nonzero width, got {}x{}min",
                config.slot_count, config.slot_minutes
            ));
        }
        let base = config.start.to_minutes();
        let slots = (0..config.slot_count)
            .map(|i| {
                Slot::from_minutes(base + i as u32 * config.slot_minutes)
                    .ok_or_else(|| format!("Grid slot {} runs past midnight", i))
            })
            .collect::<Result<Vec<Slot>, String>>()?;
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.slots.binary_search(&slot).is_ok()
    }

    /// The suffix of `slots()` strictly after `label`, constraining end-time
    /// choices. None when `label` is not on the grid.
    pub fn slots_after(&self, label: Slot) -> Option<&[Slot]> {
        let idx = self.slots.binary_search(&label).ok()?;
        Some(&self.slots[idx + 1..])
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(&GridConfig::default()).expect("default grid shape is valid")
    }
}
