use crate::availability::overlaps;
use crate::timegrid::Slot;
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// One reservation of a room for a contiguous [start, end) block of slots.
/// (room, date, start) is the de-facto key; there is no separate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub room: String,
    pub date: NaiveDate,
    pub start: Slot,
    pub end: Slot,
    pub info: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a booking for {room} on {date} already starts at {start}")]
    ConstraintViolation {
        room: String,
        date: NaiveDate,
        start: Slot,
    },
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(#[from] anyhow::Error),
}

/// Durable store of booking records: an in-memory list mirrored to a JSON
/// file. Every mutation rewrites the file before returning, so a successful
/// call is already durable when the snapshot hook fires.
pub struct BookingStore {
    path: PathBuf,
    bookings: Vec<Booking>,
}

impl BookingStore {
    /// Open the store at `path`, creating an empty file when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!("Bookings file does not exist, creating empty file");
            std::fs::write(&path, "[]")
                .with_context(|| format!("creating {}", path.display()))?;
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let bookings: Vec<Booking> =
            serde_json::from_str(&content).context("deserializing bookings file")?;
        info!("Loaded {} bookings from {}", bookings.len(), path.display());
        Ok(Self { path, bookings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The booking whose interval covers `slot` on that room/date, if any.
    /// Half-open: a booking covers its start but not its end.
    pub fn find_at(&self, room: &str, date: NaiveDate, slot: Slot) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|b| b.room == room && b.date == date && b.start <= slot && slot < b.end)
    }

    /// The booking (if any) whose interval overlaps [start, end) on that
    /// room/date.
    pub fn find_overlapping(
        &self,
        room: &str,
        date: NaiveDate,
        start: Slot,
        end: Slot,
    ) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|b| b.room == room && b.date == date && overlaps(start, end, b.start, b.end))
    }

    pub fn list_for_date(&self, date: NaiveDate) -> Vec<&Booking> {
        self.bookings.iter().filter(|b| b.date == date).collect()
    }

    pub fn insert(&mut self, booking: Booking) -> Result<(), StoreError> {
        self.check_key_free(&booking)?;
        debug!("Adding booking: {:?}", booking);
        self.bookings.push(booking);
        if let Err(e) = self.persist() {
            self.bookings.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Insert a batch as one durable step: either every record lands or none
    /// do. Used for recurring bookings.
    pub fn insert_all(&mut self, batch: Vec<Booking>) -> Result<(), StoreError> {
        for (i, booking) in batch.iter().enumerate() {
            self.check_key_free(booking)?;
            // duplicates within the batch itself
            if batch[..i]
                .iter()
                .any(|b| b.room == booking.room && b.date == booking.date && b.start == booking.start)
            {
                return Err(StoreError::ConstraintViolation {
                    room: booking.room.clone(),
                    date: booking.date,
                    start: booking.start,
                });
            }
        }
        let staged_from = self.bookings.len();
        debug!("Adding batch of {} bookings", batch.len());
        self.bookings.extend(batch);
        if let Err(e) = self.persist() {
            self.bookings.truncate(staged_from);
            return Err(e);
        }
        Ok(())
    }

    /// Remove the booking with this key. Removing an absent key is a no-op,
    /// not an error; returns whether anything was removed.
    pub fn delete(&mut self, room: &str, date: NaiveDate, start: Slot) -> Result<bool, StoreError> {
        let Some(idx) = self
            .bookings
            .iter()
            .position(|b| b.room == room && b.date == date && b.start == start)
        else {
            debug!("Delete of {room} {date} {start}: no such booking");
            return Ok(false);
        };
        let removed = self.bookings.swap_remove(idx);
        if let Err(e) = self.persist() {
            self.bookings.push(removed);
            return Err(e);
        }
        Ok(true)
    }

    fn check_key_free(&self, booking: &Booking) -> Result<(), StoreError> {
        if self
            .bookings
            .iter()
            .any(|b| b.room == booking.room && b.date == booking.date && b.start == booking.start)
        {
            return Err(StoreError::ConstraintViolation {
                room: booking.room.clone(),
                date: booking.date,
                start: booking.start,
            });
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        info!("Saving {} bookings to: {}", self.bookings.len(), self.path.display());
        let content =
            serde_json::to_string_pretty(&self.bookings).context("serializing bookings")?;
        // write to a sibling temp file first so an interrupted write never
        // truncates the real file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).context("atomic rename")?;
        Ok(())
    }
}
