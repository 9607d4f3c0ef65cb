use crate::api::NewBooking;
use crate::availability;
use crate::store::{Booking, BookingStore, StoreError};
use crate::sync::SnapshotSync;
use crate::timegrid::{GridConfig, Slot, TimeGrid};
use anyhow::Result;
use chrono::{Days, NaiveDate};
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// A year of weekly occurrences; anything longer is a typo, not a booking.
pub const MAX_RECUR_WEEKS: u32 = 52;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Booking info must not be empty")]
    EmptyInfo,
    #[error("Start time {start} must precede end time {end}")]
    SlotOrder { start: Slot, end: Slot },
    #[error("{label} is not a timeslot on the grid")]
    InvalidSlot { label: String },
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Room {0} does not exist")]
    UnknownRoom(String),
    #[error("Room is already booked on {date} over the requested timeslot")]
    Conflict { date: NaiveDate },
    #[error("Recurring booking must repeat for at least one week")]
    ZeroWeeks,
    #[error("Recurring booking may repeat for at most {MAX_RECUR_WEEKS} weeks, got {0}")]
    TooManyWeeks(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One grid row for rendering: the slot label plus one cell per configured
/// room, in room order. An occupied cell carries the covering booking.
#[derive(Serialize, Debug, JsonSchema)]
pub struct GridRow {
    pub slot: String,
    pub cells: Vec<Option<BookingView>>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct BookingView {
    pub room: String,
    pub date: String,
    pub start: String,
    pub end: String,
    pub info: String,
}

impl From<&Booking> for BookingView {
    fn from(booking: &Booking) -> Self {
        Self {
            room: booking.room.clone(),
            date: booking.date.to_string(),
            start: booking.start.to_string(),
            end: booking.end.to_string(),
            info: booking.info.clone(),
        }
    }
}

pub struct BookingApp {
    rooms: Vec<String>,
    grid: TimeGrid,
    store: BookingStore,
    sync: Arc<dyn SnapshotSync>,
}

impl BookingApp {
    pub fn from_config(
        config_dir: &str,
        store: BookingStore,
        sync: Arc<dyn SnapshotSync>,
    ) -> Result<Self> {
        //load using serde_json
        let rooms_path = format!("{config_dir}/rooms.json");
        info!("Loading rooms from: {}", rooms_path);

        let rooms_content = std::fs::read_to_string(rooms_path)?;
        let rooms: Vec<String> = serde_json::from_str(&rooms_content)?;

        let grid_path = format!("{config_dir}/grid.json");
        info!("Loading grid template from: {}", grid_path);

        let grid_content = std::fs::read_to_string(grid_path)?;
        let grid_config: GridConfig = serde_json::from_str(&grid_content)?;
        let grid = TimeGrid::new(&grid_config).map_err(anyhow::Error::msg)?;

        Ok(Self {
            rooms,
            grid,
            store,
            sync,
        })
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    /// Slot labels for the pickers: the full grid, or with `after` the strict
    /// suffix of labels later than it (the valid end times for that start).
    pub fn slot_labels(&self, after: Option<Slot>) -> Result<Vec<String>, BookingError> {
        let slots = match after {
            Some(label) => self
                .grid
                .slots_after(label)
                .ok_or_else(|| BookingError::InvalidSlot {
                    label: label.to_string(),
                })?,
            None => self.grid.slots(),
        };
        Ok(slots.iter().map(|s| s.to_string()).collect())
    }

    /// Entry point for the API payload: parses the text fields and dispatches
    /// to a single or recurring proposal.
    pub fn handle_new_booking(&mut self, payload: NewBooking) -> Result<Vec<Booking>, BookingError> {
        let date = parse_date(&payload.date)?;
        let start = parse_slot(&payload.start_time)?;
        let end = parse_slot(&payload.end_time)?;

        match payload.repeat_weeks {
            None => self
                .propose_single(&payload.room, date, start, end, &payload.info)
                .map(|booking| vec![booking]),
            Some(weeks) => {
                self.propose_recurring(&payload.room, date, start, end, &payload.info, weeks)
            }
        }
    }

    pub fn propose_single(
        &mut self,
        room: &str,
        date: NaiveDate,
        start: Slot,
        end: Slot,
        info: &str,
    ) -> Result<Booking, BookingError> {
        self.validate(room, start, end, info)?;

        if !availability::is_available(&self.store, room, date, start, end) {
            return Err(BookingError::Conflict { date });
        }

        let booking = Booking {
            room: room.to_string(),
            date,
            start,
            end,
            info: info.trim().to_string(),
        };
        self.store.insert(booking.clone())?;
        info!("Booked {room} on {date} {start}-{end}");
        self.sync.after_mutation(self.store.path());
        Ok(booking)
    }

    /// Weekly recurrence: one booking per date in {base + 7i : i < weeks},
    /// identical room/times/info. The whole date set is checked before
    /// anything is inserted and the insert itself is a single durable step,
    /// so a conflict or storage failure leaves zero of the weeks booked.
    pub fn propose_recurring(
        &mut self,
        room: &str,
        base_date: NaiveDate,
        start: Slot,
        end: Slot,
        info: &str,
        weeks: u32,
    ) -> Result<Vec<Booking>, BookingError> {
        if weeks == 0 {
            return Err(BookingError::ZeroWeeks);
        }
        if weeks > MAX_RECUR_WEEKS {
            return Err(BookingError::TooManyWeeks(weeks));
        }
        self.validate(room, start, end, info)?;

        let dates: Vec<NaiveDate> = (0..weeks)
            .map(|i| {
                base_date
                    .checked_add_days(Days::new(7 * i as u64))
                    .ok_or_else(|| BookingError::InvalidDate(base_date.to_string()))
            })
            .collect::<Result<_, _>>()?;

        debug!("Checking availability over {} weekly dates", dates.len());
        if let Err(date) = availability::check_range(&self.store, room, &dates, start, end) {
            return Err(BookingError::Conflict { date });
        }

        let batch: Vec<Booking> = dates
            .into_iter()
            .map(|date| Booking {
                room: room.to_string(),
                date,
                start,
                end,
                info: info.trim().to_string(),
            })
            .collect();
        let created = batch.clone();
        self.store.insert_all(batch)?;
        info!("Booked {room} {start}-{end} weekly from {base_date} for {weeks} weeks");
        self.sync.after_mutation(self.store.path());
        Ok(created)
    }

    /// Idempotent: removing an absent key succeeds quietly.
    pub fn remove(&mut self, room: &str, date: NaiveDate, start: Slot) -> Result<(), BookingError> {
        let removed = self.store.delete(room, date, start)?;
        if removed {
            info!("Deleted booking {room} {date} {start}");
            self.sync.after_mutation(self.store.path());
        }
        Ok(())
    }

    pub fn bookings_for_date(&self, date: NaiveDate) -> Vec<BookingView> {
        let mut bookings = self.store.list_for_date(date);
        bookings.sort_by(|a, b| (&a.room, a.start).cmp(&(&b.room, b.start)));
        bookings.into_iter().map(BookingView::from).collect()
    }

    pub fn grid_for_date(&self, date: NaiveDate) -> Vec<GridRow> {
        self.grid
            .slots()
            .iter()
            .map(|&slot| GridRow {
                slot: slot.to_string(),
                cells: self
                    .rooms
                    .iter()
                    .map(|room| self.store.find_at(room, date, slot).map(BookingView::from))
                    .collect(),
            })
            .collect()
    }

    fn validate(&self, room: &str, start: Slot, end: Slot, info: &str) -> Result<(), BookingError> {
        if info.trim().is_empty() {
            return Err(BookingError::EmptyInfo);
        }
        if !self.rooms.iter().any(|r| r == room) {
            return Err(BookingError::UnknownRoom(room.to_string()));
        }
        for label in [start, end] {
            if !self.grid.contains(label) {
                return Err(BookingError::InvalidSlot {
                    label: label.to_string(),
                });
            }
        }
        if start >= end {
            return Err(BookingError::SlotOrder { start, end });
        }
        Ok(())
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, BookingError> {
    text.parse()
        .map_err(|_| BookingError::InvalidDate(text.to_string()))
}

fn parse_slot(text: &str) -> Result<Slot, BookingError> {
    Slot::try_from(text).map_err(|_| BookingError::InvalidSlot {
        label: text.to_string(),
    })
}
