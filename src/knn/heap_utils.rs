//! Bounded max-heap keeping the k closest candidates seen so far.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

/// One candidate in the heap: a distance and the payload it belongs to.
#[derive(Debug)]
struct HeapEntry<P> {
    distance: OrderedFloat<f64>,
    payload: P,
}

impl<P> PartialEq for HeapEntry<P> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl<P> Eq for HeapEntry<P> {}

impl<P> PartialOrd for HeapEntry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for HeapEntry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so the worst of the kept candidates sits
        // on top and is the one evicted first.
        self.distance.cmp(&other.distance)
    }
}

/// Keeps the `capacity` smallest-distance payloads out of a stream of
/// candidates.
#[derive(Debug)]
pub struct KBest<P> {
    capacity: usize,
    heap: BinaryHeap<HeapEntry<P>>,
}

impl<P> KBest<P> {
    pub fn new(capacity: usize) -> Self {
        KBest { capacity, heap: BinaryHeap::with_capacity(capacity + 1) }
    }

    /// Offers a candidate; it is kept only while it beats the current worst.
    pub fn add(&mut self, distance: f64, payload: P) {
        if self.capacity == 0 {
            return;
        }
        let entry = HeapEntry { distance: OrderedFloat(distance), payload };
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
        } else if entry.distance < self.heap.peek().expect("heap is non-empty here").distance {
            self.heap.pop();
            self.heap.push(entry);
        }
    }

    /// The distance of the worst kept candidate, once the heap is full.
    /// `None` while under capacity, meaning every candidate still gets in.
    pub fn worst_distance(&self) -> Option<f64> {
        if self.heap.len() == self.capacity {
            self.heap.peek().map(|entry| entry.distance.0)
        } else {
            None
        }
    }

    /// Consumes the heap, yielding payloads from closest to farthest.
    pub fn into_sorted(self) -> Vec<P> {
        self.heap.into_sorted_vec().into_iter().map(|entry| entry.payload).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
