//! Fixed-memory live point cloud.
//!
//! Points are appended until the buffer reaches its capacity; after that each
//! new point overwrites a uniformly random slot. This keeps memory bounded but
//! is not a correct reservoir sample: late points are over-represented.

use crate::scene::TimerDriven;

use glam::Vec3;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Where [`PointCloudBuffer::add`] put a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Appended(usize),
    Replaced(usize),
}

impl Slot {
    pub fn index(self) -> usize {
        match self {
            Self::Appended(i) | Self::Replaced(i) => i,
        }
    }
}

#[derive(Debug)]
pub struct PointCloudBuffer<R: Rng = StdRng> {
    capacity: usize,
    points: Vec<Vec3>,
    rng: R,
    /// Bumped on every change so a renderer knows to re-upload.
    generation: u64,
}

impl PointCloudBuffer<StdRng> {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    pub fn seeded(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PointCloudBuffer<R> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_rng(capacity: usize, rng: R) -> Self {
        assert!(capacity > 0, "point cloud capacity must be positive");
        Self {
            capacity,
            points: Vec::with_capacity(capacity),
            rng,
            generation: 0,
        }
    }

    pub fn add(&mut self, point: Vec3) -> Slot {
        self.generation += 1;
        if self.points.len() < self.capacity {
            self.points.push(point);
            Slot::Appended(self.points.len() - 1)
        } else {
            let index = self.rng.gen_range(0..self.capacity);
            self.points[index] = point;
            Slot::Replaced(index)
        }
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = Vec3>) {
        for point in points {
            self.add(point);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.points.len() == self.capacity
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Per point scalar used for coloring (the z coordinate).
    pub fn depths(&self) -> impl Iterator<Item = f32> + '_ {
        self.points.iter().map(|p| p.z)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

/// Grows a [`PointCloudBuffer`] with random points on every timer tick.
pub struct PointCloudFeed<R: Rng = StdRng> {
    buffer: PointCloudBuffer<R>,
    batch_size: usize,
    extent: f32,
    interval: Duration,
    ticks: u64,
}

impl<R: Rng> PointCloudFeed<R> {
    /// # Panics
    ///
    /// Panics if `extent` is not a positive finite number.
    pub fn new(
        buffer: PointCloudBuffer<R>,
        batch_size: usize,
        extent: f32,
        interval: Duration,
    ) -> Self {
        assert!(
            extent.is_finite() && extent > 0.0,
            "point cloud extent must be positive"
        );
        Self {
            buffer,
            batch_size,
            extent,
            interval,
            ticks: 0,
        }
    }

    pub fn buffer(&self) -> &PointCloudBuffer<R> {
        &self.buffer
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Uniform point in the cube of edge `extent` centered on the origin.
    fn random_point(&mut self) -> Vec3 {
        let half = self.extent / 2.0;
        let rng = self.buffer.rng_mut();
        Vec3::new(
            rng.gen_range(-half..half),
            rng.gen_range(-half..half),
            rng.gen_range(-half..half),
        )
    }
}

impl<R: Rng> TimerDriven for PointCloudFeed<R> {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn on_tick(&mut self) {
        for _ in 0..self.batch_size {
            let point = self.random_point();
            self.buffer.add(point);
        }
        self.ticks += 1;
        debug!(
            "tick {}: {} / {} points",
            self.ticks,
            self.buffer.len(),
            self.buffer.capacity()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn appends_until_full_then_replaces() {
        let mut buffer = PointCloudBuffer::seeded(3, 7);
        assert_eq!(buffer.add(Vec3::X), Slot::Appended(0));
        assert_eq!(buffer.add(Vec3::Y), Slot::Appended(1));
        assert_eq!(buffer.add(Vec3::Z), Slot::Appended(2));
        assert!(buffer.is_full());

        let slot = buffer.add(Vec3::ONE);
        assert!(matches!(slot, Slot::Replaced(i) if i < 3));
        assert_eq!(buffer.points()[slot.index()], Vec3::ONE);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.generation(), 4);
    }

    #[test]
    fn depth_is_z() {
        let mut buffer = PointCloudBuffer::seeded(4, 1);
        buffer.extend([Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -4.0)]);
        assert_eq!(buffer.depths().collect::<Vec<_>>(), vec![3.0, -4.0]);
    }

    #[test]
    fn feed_adds_a_batch_per_tick_inside_the_cube() {
        let buffer = PointCloudBuffer::seeded(500, 42);
        let mut feed = PointCloudFeed::new(buffer, 200, 20.0, Duration::from_millis(50));
        feed.on_tick();
        assert_eq!(feed.buffer().len(), 200);
        feed.on_tick();
        feed.on_tick();
        assert_eq!(feed.buffer().len(), 500);
        assert_eq!(feed.ticks(), 3);
        assert!(
            feed.buffer()
                .points()
                .iter()
                .all(|p| p.abs().max_element() <= 10.0)
        );
    }

    #[test]
    #[should_panic(expected = "extent must be positive")]
    fn feed_rejects_empty_extent() {
        let buffer = PointCloudBuffer::seeded(10, 1);
        PointCloudFeed::new(buffer, 5, 0.0, Duration::from_millis(50));
    }

    proptest! {
        #[test]
        fn size_stays_at_capacity(
            capacity in 1usize..64,
            extra in 1usize..200,
            seed in any::<u64>(),
        ) {
            let mut buffer = PointCloudBuffer::seeded(capacity, seed);
            for i in 0..capacity {
                prop_assert_eq!(buffer.add(Vec3::splat(i as f32)), Slot::Appended(i));
            }

            let mut touched = HashSet::new();
            for i in 0..extra {
                let before = buffer.points().to_vec();
                let point = Vec3::splat(-(i as f32) - 1.0);
                let slot = buffer.add(point);
                prop_assert!(matches!(slot, Slot::Replaced(_)));
                prop_assert_eq!(buffer.len(), capacity);

                let changed = before
                    .iter()
                    .zip(buffer.points())
                    .filter(|(a, b)| a != b)
                    .count();
                prop_assert!(changed <= 1);
                prop_assert_eq!(buffer.points()[slot.index()], point);
                touched.insert(slot.index());
            }
            prop_assert!(touched.len() <= capacity);
        }
    }
}
