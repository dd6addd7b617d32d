use super::frame::FrameState;
use crate::error::{SimError, SimResult};
use log::{error, trace};
use parking_lot::Mutex;
use std::fmt;

/// Fixed-capacity table of frames plus the number of loaded frames.
///
/// Both fields live behind one mutex, and every public method holds it only
/// for the duration of the method itself. Callers therefore never see a
/// half-applied update, and nobody can keep the lock across a sleep or a
/// mailbox operation. Logging happens after the lock is released.
///
/// Invariant: `occupied` equals the number of frames that are not
/// [`FrameState::Free`].
pub struct FrameTable {
    inner: Mutex<TableInner>,
    capacity: usize,
}

struct TableInner {
    frames: Vec<FrameState>,
    occupied: usize,
}

/// Occupied count after a mutation, plus the recorded count if it had to be
/// corrected.
struct Change {
    occupied: usize,
    drifted_from: Option<usize>,
}

impl Change {
    fn report(&self) {
        if let Some(recorded) = self.drifted_from {
            error!(
                "Occupied count {} does not match {} loaded frames, corrected",
                recorded, self.occupied
            );
        }
    }
}

impl TableInner {
    fn check_index(&self, index: usize) -> SimResult<()> {
        if index >= self.frames.len() {
            return Err(SimError::FrameOutOfRange {
                index,
                capacity: self.frames.len(),
            });
        }
        Ok(())
    }

    fn mark_dirty(&mut self, index: usize) -> SimResult<()> {
        self.check_index(index)?;
        if !self.frames[index].is_loaded() {
            return Err(SimError::FrameNotLoaded(index));
        }
        self.frames[index] = FrameState::Dirty;
        Ok(())
    }

    fn install_and_grow(&mut self, index: usize) -> SimResult<Change> {
        self.check_index(index)?;
        if self.occupied >= self.frames.len() {
            return Err(SimError::TableFull);
        }
        if self.frames[index].is_loaded() {
            return Err(SimError::FrameOccupied(index));
        }
        self.frames[index] = FrameState::Clean;
        self.occupied += 1;
        Ok(self.reconcile())
    }

    fn free_and_shrink(&mut self, index: usize) -> SimResult<(bool, Change)> {
        self.check_index(index)?;
        let was_loaded = self.frames[index].is_loaded();
        self.frames[index] = FrameState::Free;
        if was_loaded {
            self.occupied = self.occupied.saturating_sub(1);
        }
        Ok((was_loaded, self.reconcile()))
    }

    fn loaded_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_loaded()).count()
    }

    /// Panics on a count mismatch in debug builds; recomputes the count in
    /// release builds.
    fn reconcile(&mut self) -> Change {
        let actual = self.loaded_count();
        debug_assert_eq!(
            self.occupied, actual,
            "occupied count does not match loaded frames"
        );
        let drifted_from = (self.occupied != actual).then_some(self.occupied);
        self.occupied = actual;
        Change {
            occupied: actual,
            drifted_from,
        }
    }
}

impl FrameTable {
    /// Creates a table of `capacity` free frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                frames: vec![FrameState::Free; capacity],
                occupied: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupied_count(&self) -> usize {
        self.inner.lock().occupied
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().occupied >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().occupied == 0
    }

    /// Returns a consistent copy of the table, never a live view.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            frames: inner.frames.clone(),
            occupied: inner.occupied,
        }
    }

    /// Marks a loaded frame as modified.
    pub fn mark_dirty(&self, index: usize) -> SimResult<()> {
        self.inner.lock().mark_dirty(index)?;
        trace!("Frame {} marked dirty", index);
        Ok(())
    }

    /// Loads a clean frame into the free slot `index`.
    pub fn install_and_grow(&self, index: usize) -> SimResult<()> {
        let change = self.inner.lock().install_and_grow(index)?;
        change.report();
        trace!("Frame {} installed ({} occupied)", index, change.occupied);
        Ok(())
    }

    /// Resets `index` to free. Returns whether the frame was loaded before;
    /// the occupied count only shrinks in that case.
    pub fn free_and_shrink(&self, index: usize) -> SimResult<bool> {
        let (was_loaded, change) = self.inner.lock().free_and_shrink(index)?;
        change.report();
        trace!(
            "Frame {} freed (was loaded: {}, {} occupied)",
            index,
            was_loaded,
            change.occupied
        );
        Ok(was_loaded)
    }

    /// Loads a clean frame into the lowest free slot and returns its index.
    pub fn install_at_free_slot(&self) -> SimResult<usize> {
        let (index, change) = {
            let mut inner = self.inner.lock();
            let index = inner
                .frames
                .iter()
                .position(|f| !f.is_loaded())
                .ok_or(SimError::TableFull)?;
            (index, inner.install_and_grow(index)?)
        };
        change.report();
        trace!("Frame {} installed ({} occupied)", index, change.occupied);
        Ok(index)
    }

    /// Marks one loaded frame dirty, chosen by `choose`.
    ///
    /// `choose` receives the number of loaded frames `n` and must return a
    /// position in `0..n`; the k-th loaded frame in table order is dirtied.
    /// Returns the dirtied index, or `None` if no frame is loaded.
    pub fn mark_random_dirty<F>(&self, choose: F) -> SimResult<Option<usize>>
    where
        F: FnOnce(usize) -> usize,
    {
        let index = {
            let mut inner = self.inner.lock();
            if inner.occupied == 0 {
                return Ok(None);
            }

            let occupied = inner.occupied;
            let position = choose(occupied);
            let index = inner
                .frames
                .iter()
                .enumerate()
                .filter(|(_, f)| f.is_loaded())
                .map(|(i, _)| i)
                .nth(position)
                .ok_or(SimError::FrameOutOfRange {
                    index: position,
                    capacity: occupied,
                })?;
            inner.mark_dirty(index)?;
            index
        };
        trace!("Frame {} marked dirty", index);
        Ok(Some(index))
    }
}

impl fmt::Debug for FrameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FrameTable")
            .field("frames", &inner.frames)
            .field("occupied", &inner.occupied)
            .finish()
    }
}

/// Point-in-time copy of a [`FrameTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    frames: Vec<FrameState>,
    occupied: usize,
}

impl Snapshot {
    pub fn frames(&self) -> &[FrameState] {
        &self.frames
    }

    /// The occupied counter as recorded by the table.
    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    /// Number of frames actually holding a page.
    pub fn loaded_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_loaded()).count()
    }

    pub fn dirty_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| **f == FrameState::Dirty)
            .count()
    }

    /// Whether the recorded count agrees with the frames.
    pub fn is_consistent(&self) -> bool {
        self.occupied == self.loaded_count()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            writeln!(f, "{}|{}", index, frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn filled_table(capacity: usize, loaded: usize) -> SimResult<FrameTable> {
        let table = FrameTable::new(capacity);
        for index in 0..loaded {
            table.install_and_grow(index)?;
        }
        Ok(table)
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = FrameTable::new(5);
        let snapshot = table.snapshot();

        assert_eq!(table.capacity(), 5);
        assert!(table.is_empty());
        assert!(!table.is_full());
        assert_eq!(snapshot.frames(), &[FrameState::Free; 5]);
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_install_and_grow() -> SimResult<()> {
        let table = filled_table(5, 5)?;

        assert!(table.is_full());
        assert_eq!(table.occupied_count(), 5);
        assert_eq!(table.snapshot().frames(), &[FrameState::Clean; 5]);
        Ok(())
    }

    #[test]
    fn test_install_over_loaded_frame() -> SimResult<()> {
        let table = filled_table(5, 2)?;

        let result = table.install_and_grow(1);
        assert!(matches!(result, Err(SimError::FrameOccupied(1))));
        assert_eq!(table.occupied_count(), 2);
        Ok(())
    }

    #[test]
    fn test_install_into_full_table() -> SimResult<()> {
        let table = filled_table(3, 3)?;

        assert!(matches!(table.install_and_grow(0), Err(SimError::TableFull)));
        assert!(matches!(table.install_at_free_slot(), Err(SimError::TableFull)));
        assert_eq!(table.occupied_count(), 3);
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let table = FrameTable::new(2);

        assert!(matches!(
            table.install_and_grow(2),
            Err(SimError::FrameOutOfRange {
                index: 2,
                capacity: 2
            })
        ));
        assert!(table.mark_dirty(7).is_err());
        assert!(table.free_and_shrink(2).is_err());
    }

    #[test]
    fn test_mark_dirty() -> SimResult<()> {
        let table = filled_table(5, 3)?;

        table.mark_dirty(1)?;
        let snapshot = table.snapshot();
        assert_eq!(snapshot.frames()[1], FrameState::Dirty);
        assert_eq!(snapshot.dirty_count(), 1);
        assert_eq!(snapshot.occupied_count(), 3);

        assert!(matches!(table.mark_dirty(4), Err(SimError::FrameNotLoaded(4))));
        Ok(())
    }

    #[test]
    fn test_free_and_shrink() -> SimResult<()> {
        let table = filled_table(5, 5)?;
        table.mark_dirty(3)?;

        assert!(table.free_and_shrink(3)?);
        assert_eq!(table.occupied_count(), 4);

        // Freeing an already free frame leaves the count alone
        assert!(!table.free_and_shrink(3)?);
        assert_eq!(table.occupied_count(), 4);
        assert!(table.snapshot().is_consistent());
        Ok(())
    }

    #[test]
    fn test_install_at_free_slot_uses_lowest_hole() -> SimResult<()> {
        let table = filled_table(5, 5)?;
        table.free_and_shrink(4)?;
        table.free_and_shrink(2)?;

        assert_eq!(table.install_at_free_slot()?, 2);
        assert_eq!(table.install_at_free_slot()?, 4);
        assert!(table.is_full());
        Ok(())
    }

    #[test]
    fn test_mark_random_dirty_on_compact_table() -> SimResult<()> {
        let table = filled_table(5, 3)?;

        let dirtied = table.mark_random_dirty(|n| {
            assert_eq!(n, 3);
            2
        })?;
        assert_eq!(dirtied, Some(2));
        Ok(())
    }

    #[test]
    fn test_mark_random_dirty_skips_free_frames() -> SimResult<()> {
        let table = filled_table(5, 5)?;
        table.free_and_shrink(1)?;
        table.free_and_shrink(2)?;

        // Loaded frames are 0, 3 and 4
        assert_eq!(table.mark_random_dirty(|_| 1)?, Some(3));
        assert_eq!(table.mark_random_dirty(|_| 2)?, Some(4));
        assert_eq!(table.snapshot().dirty_count(), 2);
        Ok(())
    }

    #[test]
    fn test_mark_random_dirty_empty_table() -> SimResult<()> {
        let table = FrameTable::new(5);
        assert_eq!(table.mark_random_dirty(|_| 0)?, None);
        Ok(())
    }

    #[test]
    fn test_mark_random_dirty_bad_choice() -> SimResult<()> {
        let table = filled_table(5, 2)?;
        assert!(table.mark_random_dirty(|_| 2).is_err());
        assert_eq!(table.snapshot().dirty_count(), 0);
        Ok(())
    }

    #[test]
    fn test_snapshot_is_a_copy() -> SimResult<()> {
        let table = filled_table(3, 1)?;
        let before = table.snapshot();

        table.install_and_grow(1)?;
        assert_eq!(before.occupied_count(), 1);
        assert_eq!(before.frames()[1], FrameState::Free);
        assert_ne!(before, table.snapshot());
        Ok(())
    }

    #[test]
    fn test_snapshot_display() -> SimResult<()> {
        let table = filled_table(3, 2)?;
        table.mark_dirty(0)?;

        assert_eq!(table.snapshot().to_string(), "0|1\n1|0\n2|-\n");
        Ok(())
    }

    #[test]
    fn test_concurrent_install_and_free() {
        let table = Arc::new(FrameTable::new(8));
        let mut handles = Vec::new();

        for worker in 0..4 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                for round in 0..500 {
                    if (worker + round) % 2 == 0 {
                        let _ = table.install_at_free_slot();
                    } else {
                        let _ = table.free_and_shrink((worker * 3 + round) % 8);
                    }
                    let _ = table.mark_random_dirty(|n| round % n);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = table.snapshot();
        assert!(snapshot.is_consistent());
        assert!(snapshot.occupied_count() <= 8);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "occupied count does not match")]
    fn test_count_drift_panics_in_debug() {
        let table = filled_table(5, 3).unwrap();
        table.inner.lock().occupied = 4;

        let _ = table.free_and_shrink(0);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_count_drift_corrected_in_release() -> SimResult<()> {
        let table = filled_table(5, 3)?;
        table.inner.lock().occupied = 4;

        assert!(table.free_and_shrink(0)?);
        assert_eq!(table.occupied_count(), 2);

        table.inner.lock().occupied = 0;
        table.install_and_grow(0)?;
        assert_eq!(table.occupied_count(), 3);
        assert!(table.snapshot().is_consistent());
        Ok(())
    }
}
