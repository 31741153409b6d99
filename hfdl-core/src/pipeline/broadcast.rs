//! Barrier-based one-to-many broadcast from the channelizer to its channel
//! workers (§5). The channelizer blocks on publishing its next block until
//! every consumer has announced it drained the previous one; each consumer
//! blocks on receiving until the channelizer has data ready.

use std::sync::{Arc, Condvar, Mutex};

struct Inner<T> {
    generation: u64,
    ready_count: usize,
    buffer: Option<Arc<T>>,
}

pub struct ChannelizerBroadcast<T> {
    num_consumers: usize,
    inner: Mutex<Inner<T>>,
    cv: Condvar,
}

impl<T> ChannelizerBroadcast<T> {
    pub fn new(num_consumers: usize) -> Arc<Self> {
        Arc::new(Self {
            num_consumers,
            inner: Mutex::new(Inner {
                generation: 0,
                ready_count: num_consumers,
                buffer: None,
            }),
            cv: Condvar::new(),
        })
    }

    /// Called once per channelizer output block. Blocks until every
    /// consumer has drained the prior block.
    pub fn publish(&self, item: Arc<T>) {
        let mut guard = self.inner.lock().unwrap();
        while guard.ready_count < self.num_consumers {
            guard = self.cv.wait(guard).unwrap();
        }
        guard.buffer = Some(item);
        guard.generation += 1;
        guard.ready_count = 0;
        self.cv.notify_all();
    }

    /// A consumer's receive call. `seen_generation` is the caller's
    /// per-consumer cursor, updated in place.
    pub fn recv(&self, seen_generation: &mut u64) -> Arc<T> {
        let mut guard = self.inner.lock().unwrap();
        while guard.generation == *seen_generation {
            guard = self.cv.wait(guard).unwrap();
        }
        *seen_generation = guard.generation;
        let item = guard
            .buffer
            .clone()
            .expect("generation advanced without a buffer");
        guard.ready_count += 1;
        if guard.ready_count == self.num_consumers {
            self.cv.notify_all();
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn every_consumer_observes_every_published_block() {
        let broadcast = ChannelizerBroadcast::<Vec<i32>>::new(2);
        let b1 = broadcast.clone();
        let b2 = broadcast.clone();

        let h1 = thread::spawn(move || {
            let mut gen = 0;
            let first = b1.recv(&mut gen);
            let second = b1.recv(&mut gen);
            (first.clone(), second.clone())
        });
        let h2 = thread::spawn(move || {
            let mut gen = 0;
            let first = b2.recv(&mut gen);
            let second = b2.recv(&mut gen);
            (first.clone(), second.clone())
        });

        broadcast.publish(Arc::new(vec![1, 2, 3]));
        broadcast.publish(Arc::new(vec![4, 5, 6]));

        let (a1, a2) = h1.join().unwrap();
        let (b1, b2) = h2.join().unwrap();
        assert_eq!(*a1, vec![1, 2, 3]);
        assert_eq!(*a2, vec![4, 5, 6]);
        assert_eq!(*b1, vec![1, 2, 3]);
        assert_eq!(*b2, vec![4, 5, 6]);
    }
}
