// src/ledger.rs
//
// Owns per-feature identity across the whole video. A feature is created at
// session start, updated every frame the tracker reports it valid, and
// removed permanently the first frame it is not — there is no re-acquisition,
// so an id that leaves the ledger never comes back.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TrackedFeature {
    pub id: u32,
    /// Fixed at creation; displacement is measured against this.
    pub initial_position: (f32, f32),
    pub current_position: (f32, f32),
    /// Number of frames (inclusive) the tracker has reported this feature
    /// valid since creation. The time base for velocity, not wall-clock.
    pub tracked_frame_count: u32,
    /// Set only when a sample passes the monotonicity filter and the
    /// acceptance floor.
    pub last_accepted_velocity: Option<f64>,
}

impl TrackedFeature {
    pub fn displacement_px(&self) -> f64 {
        let dx = (self.current_position.0 - self.initial_position.0) as f64;
        let dy = (self.current_position.1 - self.initial_position.1) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Default)]
pub struct FeatureLedger {
    features: BTreeMap<u32, TrackedFeature>,
    next_id: u32,
}

impl FeatureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the initial feature set detected at session start.
    pub fn seed(&mut self, positions: impl IntoIterator<Item = (f32, f32)>) {
        for position in positions {
            let id = self.next_id;
            self.next_id += 1;
            self.features.insert(
                id,
                TrackedFeature {
                    id,
                    initial_position: position,
                    current_position: position,
                    tracked_frame_count: 0,
                    last_accepted_velocity: None,
                },
            );
        }
    }

    /// Apply one frame of tracker output. Ids present in `valid` are updated
    /// and their frame count incremented; ids absent are dropped for good.
    pub fn update(&mut self, valid: &[(u32, (f32, f32))]) {
        let mut survivors = BTreeMap::new();
        for &(id, position) in valid {
            match self.features.remove(&id) {
                Some(mut feature) => {
                    feature.current_position = position;
                    feature.tracked_frame_count += 1;
                    survivors.insert(id, feature);
                }
                None => {
                    // Should not occur post-seed (no re-acquisition), but an
                    // unknown id still gets a fresh entry rather than a panic.
                    survivors.insert(
                        id,
                        TrackedFeature {
                            id,
                            initial_position: position,
                            current_position: position,
                            tracked_frame_count: 1,
                            last_accepted_velocity: None,
                        },
                    );
                }
            }
        }
        self.features = survivors;
    }

    /// (id, current position) pairs in id order — the tracker's next input.
    pub fn tracked_points(&self) -> Vec<(u32, (f32, f32))> {
        self.features
            .values()
            .map(|f| (f.id, f.current_position))
            .collect()
    }

    pub fn get(&self, id: u32) -> Option<&TrackedFeature> {
        self.features.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut TrackedFeature> {
        self.features.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
