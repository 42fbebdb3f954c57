//! Fixed-size ring of slide slots driving steady-state slideshow
//! advancement: foreground/background bookkeeping, prefetch recycling, and
//! the crossfade clock.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::decode::{DecodeHandle, DecodeJob, DecodedImage};
use crate::error::Error;
use crate::fade::FadeClock;
use crate::library::{Catalog, Entry};

/// Consecutive catalog entries tried for one slot before it is left failed.
pub const MAX_LOAD_ATTEMPTS: u32 = 10;

/// Lifecycle of one slide slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Decode submitted, result not yet harvested.
    Loading,
    Loaded,
    /// All retry attempts exhausted; the display layer skips this slot.
    Failed,
}

struct Slot {
    entry: Entry,
    entry_idx: usize,
    job: DecodeJob,
    image: Option<DecodedImage>,
    state: SlotState,
    attempts: u32,
}

impl Slot {
    fn request(entry: Entry, entry_idx: usize, root: &Path, queue: &DecodeHandle) -> Self {
        let job = DecodeJob::new(entry.path(root));
        queue.submit(&job);
        Self {
            entry,
            entry_idx,
            job,
            image: None,
            state: SlotState::Loading,
            attempts: 1,
        }
    }

    /// Re-aim a failed slot at the next catalog entry and resubmit.
    fn retry_next(&mut self, catalog: &Catalog, root: &Path, queue: &DecodeHandle) {
        self.entry_idx = (self.entry_idx + 1) % catalog.entry_count();
        if let Some(next) = catalog.entry_at(self.entry_idx) {
            debug!(
                file = %next.file,
                attempt = self.attempts + 1,
                "retrying slot with next entry"
            );
            self.entry = next.clone();
            self.job = DecodeJob::new(self.entry.path(root));
            queue.submit(&self.job);
            self.attempts += 1;
            self.state = SlotState::Loading;
        }
    }

    fn accept(&mut self, image: DecodedImage) {
        self.image = Some(image);
        self.state = SlotState::Loaded;
    }
}

/// Compute the (slot, entry) index offsets for the slot recycled on an
/// advance by `step`.
///
/// Half the ring stays prefetched ahead of the focus and the other half is
/// retained history, so stepping backwards is instant; the recycled slot is
/// always the one furthest from being displayed again. The entry offset is
/// kept congruent with the slot offset modulo the ring size so every slot
/// holds exactly the entry the focus will want when it gets there.
fn recycle_offsets(ring: usize, step: i64) -> (i64, i64) {
    let half = (ring / 2) as f32;
    let slot = (0.5 - (half + 0.5) * step as f32) as i64;
    (slot, slot + ring as i64 * step)
}

fn wrap(value: i64, modulus: usize) -> usize {
    value.rem_euclid(modulus as i64) as usize
}

/// The slide carousel: a ring of slots bound to catalog entries, advanced by
/// the display thread while decode workers fill the slots behind it.
pub struct Carousel {
    root: PathBuf,
    catalog: Catalog,
    queue: DecodeHandle,
    slots: Vec<Slot>,
    focus: usize,
    fg_index: usize,
    entry_pos: usize,
    advances: u64,
    fade: FadeClock,
}

impl Carousel {
    pub fn new(
        catalog: Catalog,
        root: PathBuf,
        ring_size: usize,
        queue: DecodeHandle,
        fade: FadeClock,
    ) -> Result<Self, Error> {
        if ring_size < 2 {
            return Err(Error::RingTooSmall(ring_size));
        }
        if catalog.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        let n = catalog.entry_count();
        let slots = (0..ring_size)
            .map(|i| {
                let idx = i % n;
                let entry = catalog.entry_at(idx).cloned().ok_or(Error::EmptyCatalog)?;
                Ok(Slot::request(entry, idx, &root, &queue))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self {
            root,
            catalog,
            queue,
            slots,
            focus: ring_size - 1,
            fg_index: ring_size - 1,
            entry_pos: n - 1,
            advances: 0,
            fade,
        })
    }

    /// Harvest finished decodes into their slots; failed slots are re-aimed
    /// at the next catalog entry (fire-and-forget) until the retry cap.
    pub fn refresh(&mut self) {
        for slot in &mut self.slots {
            if slot.state != SlotState::Loading {
                continue;
            }
            let Some(result) = slot.job.try_take() else {
                continue;
            };
            match result {
                Ok(image) => slot.accept(image),
                Err(error) => {
                    if slot.attempts < MAX_LOAD_ATTEMPTS {
                        slot.retry_next(&self.catalog, &self.root, &self.queue);
                    } else {
                        warn!(file = %slot.entry.file, %error, "slot failed after retry cap");
                        slot.state = SlotState::Failed;
                    }
                }
            }
        }
    }

    /// Move the focus by `step` (+1 or -1): the slot at the new focus becomes
    /// the background of the crossfade, the old focus its foreground, and the
    /// slot furthest from display is recycled to prefetch ahead.
    ///
    /// Returns `true` when the catalog cursor has completed a full pass, so
    /// the caller can reshuffle and restart.
    pub fn advance(&mut self, step: i64) -> bool {
        debug_assert!(step == 1 || step == -1);
        self.refresh();
        self.fade.restart();
        self.fg_index = self.focus;

        let ring = self.slots.len();
        let n = self.catalog.entry_count();
        self.focus = wrap(self.focus as i64 + step, ring);
        self.entry_pos = wrap(self.entry_pos as i64 + step, n);

        let (slot_off, entry_off) = recycle_offsets(ring, step);
        let recycle = wrap(self.focus as i64 + slot_off, ring);
        if recycle != self.focus {
            let entry_idx = wrap(self.entry_pos as i64 + entry_off, n);
            if let Some(entry) = self.catalog.entry_at(entry_idx) {
                self.slots[recycle] =
                    Slot::request(entry.clone(), entry_idx, &self.root, &self.queue);
            }
        }

        self.advances += 1;
        self.advances % n as u64 == 0
    }

    /// Block until the first slide is decoded, retrying subsequent entries up
    /// to the cap. This is the only place the consumer thread waits on a
    /// decode; afterwards all prefetching is fire-and-forget.
    pub fn prime(&mut self) -> Result<(), Error> {
        self.advance(1);
        let focus = self.focus;
        loop {
            let slot = &mut self.slots[focus];
            match slot.state {
                SlotState::Loaded => break,
                SlotState::Failed => return Err(Error::Undisplayable(MAX_LOAD_ATTEMPTS)),
                SlotState::Loading => match slot.job.wait_take() {
                    Some(Ok(image)) => slot.accept(image),
                    Some(Err(error)) if slot.attempts < MAX_LOAD_ATTEMPTS => {
                        debug!(%error, "first slide failed, trying next entry");
                        slot.retry_next(&self.catalog, &self.root, &self.queue);
                    }
                    _ => {
                        slot.state = SlotState::Failed;
                        return Err(Error::Undisplayable(MAX_LOAD_ATTEMPTS));
                    }
                },
            }
        }
        // The very first slide appears without a transition.
        self.fade.complete();
        Ok(())
    }

    /// The outgoing slide of the current crossfade, if its slot is loaded.
    pub fn foreground(&self) -> Option<&DecodedImage> {
        self.slot_image(self.fg_index)
    }

    /// The incoming slide (the focus slot), if loaded.
    pub fn background(&self) -> Option<&DecodedImage> {
        self.slot_image(self.focus)
    }

    /// Entry bound to the focus slot, for captions and progress reporting.
    pub fn focus_entry(&self) -> &Entry {
        &self.slots[self.focus].entry
    }

    /// Advance the transition clock by one display tick.
    pub fn fade_tick(&mut self) -> f32 {
        self.fade.tick()
    }

    pub fn fade_fraction(&self) -> f32 {
        self.fade.fraction()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ring_size(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|s| s.state).collect()
    }

    fn slot_image(&self, index: usize) -> Option<&DecodedImage> {
        let slot = &self.slots[index];
        match slot.state {
            SlotState::Loaded => slot.image.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycle_offsets_split_the_ring() {
        // Ring of 8 going forward: reload the antipodal slot with the entry
        // four ahead of the focus.
        assert_eq!(recycle_offsets(8, 1), (-4, 4));
        // Going backward: five ahead in ring order, three entries back.
        assert_eq!(recycle_offsets(8, -1), (5, -3));
    }

    #[test]
    fn recycle_offsets_stay_congruent_for_any_ring() {
        for ring in 2..=9usize {
            for step in [1i64, -1] {
                let (slot, entry) = recycle_offsets(ring, step);
                assert_eq!(
                    slot.rem_euclid(ring as i64),
                    entry.rem_euclid(ring as i64),
                    "ring {ring} step {step}"
                );
            }
        }
    }

    #[test]
    fn wrap_handles_negative_values() {
        assert_eq!(wrap(-1, 8), 7);
        assert_eq!(wrap(8, 8), 0);
        assert_eq!(wrap(-9, 8), 7);
    }
}
