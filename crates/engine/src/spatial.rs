use rustc_hash::FxHashMap;
use tracing::trace;

use crate::entity::EntityId;
use crate::geometry::Vec2;

pub const DEFAULT_BUCKET_SIZE: f32 = 32.0;

/// Buckets entity ids by position. Holds ids only; positions are resolved
/// through the owner at query time and ids that no longer resolve are purged.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    bucket_size: f32,
    buckets: FxHashMap<(i32, i32), Vec<EntityId>>,
}

impl Default for SpatialHash {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}

impl SpatialHash {
    pub fn new(bucket_size: f32) -> Self {
        let bucket_size = if bucket_size.is_finite() && bucket_size > 0.0 {
            bucket_size
        } else {
            DEFAULT_BUCKET_SIZE
        };
        Self {
            bucket_size,
            buckets: FxHashMap::default(),
        }
    }

    pub fn bucket_size(&self) -> f32 {
        self.bucket_size
    }

    pub fn bucket_key(&self, position: Vec2) -> (i32, i32) {
        (
            (position.x / self.bucket_size).floor() as i32,
            (position.y / self.bucket_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: EntityId, position: Vec2) {
        let key = self.bucket_key(position);
        self.buckets.entry(key).or_default().push(id);
    }

    /// Removes `id`, looking in the bucket for `position` first and falling
    /// back to a full scan when the caller's position is out of date.
    pub fn remove(&mut self, id: EntityId, position: Vec2) -> bool {
        let key = self.bucket_key(position);
        if self.remove_from_bucket(key, id) {
            return true;
        }

        let Some(found) = self
            .buckets
            .iter()
            .find_map(|(key, ids)| ids.contains(&id).then_some(*key))
        else {
            return false;
        };
        trace!(index = id.index, "spatial_remove_fell_back_to_scan");
        self.remove_from_bucket(found, id)
    }

    pub fn update(&mut self, id: EntityId, old: Vec2, new: Vec2) {
        let old_key = self.bucket_key(old);
        let new_key = self.bucket_key(new);
        if old_key == new_key
            && self
                .buckets
                .get(&old_key)
                .is_some_and(|ids| ids.contains(&id))
        {
            return;
        }
        self.remove(id, old);
        self.insert(id, new);
    }

    /// Live ids within `radius` of `center`, inclusive. `resolve` maps an id
    /// to its current position, or `None` once the entity is gone.
    pub fn query_radius(
        &mut self,
        center: Vec2,
        radius: f32,
        resolve: impl Fn(EntityId) -> Option<Vec2>,
    ) -> Vec<EntityId> {
        let mut found = Vec::new();
        if !radius.is_finite() || radius < 0.0 {
            return found;
        }

        let min_key = self.bucket_key(Vec2::new(center.x - radius, center.y - radius));
        let max_key = self.bucket_key(Vec2::new(center.x + radius, center.y + radius));
        let radius_squared = radius * radius;
        let mut emptied = Vec::new();

        for key in self.candidate_keys(min_key, max_key) {
            if !self.bucket_touches_circle(key.0, key.1, center, radius_squared) {
                continue;
            }
            let Some(ids) = self.buckets.get_mut(&key) else {
                continue;
            };
            ids.retain(|id| match resolve(*id) {
                Some(position) => {
                    if position.distance_squared(center) <= radius_squared {
                        found.push(*id);
                    }
                    true
                }
                None => false,
            });
            if ids.is_empty() {
                emptied.push(key);
            }
        }

        for key in emptied {
            self.buckets.remove(&key);
        }
        found
    }

    pub fn total_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_of(&self, id: EntityId) -> Option<(i32, i32)> {
        self.buckets
            .iter()
            .find_map(|(key, ids)| ids.contains(&id).then_some(*key))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    fn remove_from_bucket(&mut self, key: (i32, i32), id: EntityId) -> bool {
        let Some(ids) = self.buckets.get_mut(&key) else {
            return false;
        };
        let Some(slot) = ids.iter().position(|candidate| *candidate == id) else {
            return false;
        };
        ids.swap_remove(slot);
        if ids.is_empty() {
            self.buckets.remove(&key);
        }
        true
    }

    /// Bucket keys inside the inclusive key box, row by row. Walks the
    /// occupied buckets instead when the box holds more keys than exist.
    fn candidate_keys(&self, min_key: (i32, i32), max_key: (i32, i32)) -> Vec<(i32, i32)> {
        let columns = i64::from(max_key.0) - i64::from(min_key.0) + 1;
        let rows = i64::from(max_key.1) - i64::from(min_key.1) + 1;
        if columns.saturating_mul(rows) <= self.buckets.len() as i64 {
            return (min_key.1..=max_key.1)
                .flat_map(|y| (min_key.0..=max_key.0).map(move |x| (x, y)))
                .collect();
        }

        let mut occupied: Vec<(i32, i32)> = self
            .buckets
            .keys()
            .copied()
            .filter(|(x, y)| {
                (min_key.0..=max_key.0).contains(x) && (min_key.1..=max_key.1).contains(y)
            })
            .collect();
        occupied.sort_unstable_by_key(|&(x, y)| (y, x));
        occupied
    }

    fn bucket_touches_circle(
        &self,
        bucket_x: i32,
        bucket_y: i32,
        center: Vec2,
        radius_squared: f32,
    ) -> bool {
        let left = bucket_x as f32 * self.bucket_size;
        let top = bucket_y as f32 * self.bucket_size;
        let nearest_x = center.x.clamp(left, left + self.bucket_size);
        let nearest_y = center.y.clamp(top, top + self.bucket_size);
        Vec2::new(nearest_x, nearest_y).distance_squared(center) <= radius_squared
    }
}
