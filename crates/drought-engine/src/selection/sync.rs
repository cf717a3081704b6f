//! Cross-panel selection synchronization.
//!
//! The dashboard has two map panels, each with its own control cluster.
//! Control origins are interleaved: panel `k` owns origins `k, k+2, .., k+8`.
//! While synced every accepted selection goes to both panels; otherwise a
//! panel only takes selections from its own controls.

use super::SpatialSelection;

/// Number of map panels.
pub const PANELS: usize = 2;

/// Offsets from a panel key that identify its own controls.
const OWN_OFFSETS: [usize; 5] = [0, 2, 4, 6, 8];

/// Last accepted selection per panel.
#[derive(Debug, Clone, Default)]
pub struct LocationStore {
    synced: bool,
    panels: [Option<SpatialSelection>; PANELS],
}

impl LocationStore {
    pub fn new(synced: bool) -> Self {
        Self {
            synced,
            panels: Default::default(),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn set_synced(&mut self, synced: bool) {
        self.synced = synced;
    }

    /// Whether `panel` takes a selection from control `origin`.
    pub fn accepts(&self, panel: usize, origin: usize) -> bool {
        if panel >= PANELS {
            return false;
        }
        self.synced || (origin >= panel && OWN_OFFSETS.contains(&(origin - panel)))
    }

    /// Offer a selection to every panel; returns the panels that took it.
    pub fn update(&mut self, selection: SpatialSelection) -> Vec<usize> {
        let accepted: Vec<usize> = (0..PANELS)
            .filter(|&panel| self.accepts(panel, selection.origin))
            .collect();

        for &panel in &accepted {
            self.panels[panel] = Some(selection.clone());
        }

        tracing::debug!(
            origin = selection.origin,
            synced = self.synced,
            panels = ?accepted,
            "Location store update"
        );
        accepted
    }

    pub fn current(&self, panel: usize) -> Option<&SpatialSelection> {
        self.panels.get(panel).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsynced_panels_take_own_controls() {
        let mut store = LocationStore::new(false);

        assert_eq!(store.update(SpatialSelection::all_domain(4)), vec![0]);
        assert_eq!(store.update(SpatialSelection::all_domain(3)), vec![1]);
        assert_eq!(store.current(0).unwrap().origin, 4);
        assert_eq!(store.current(1).unwrap().origin, 3);

        // beyond the control offsets
        assert!(store.update(SpatialSelection::all_domain(10)).is_empty());
        assert!(!store.accepts(1, 0));
    }

    #[test]
    fn test_synced_broadcasts() {
        let mut store = LocationStore::new(true);
        assert_eq!(store.update(SpatialSelection::all_domain(5)), vec![0, 1]);
        assert_eq!(store.current(0), store.current(1));

        store.set_synced(false);
        assert_eq!(store.update(SpatialSelection::all_domain(2)), vec![0]);
        assert_eq!(store.current(1).unwrap().origin, 5);
    }
}
