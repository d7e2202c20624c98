//! Fixed-capacity circular sample storage shared by the capture callback and
//! the transform worker.
//!
//! Each channel gets a `SampleRing` of `2 × transform_size` samples. The
//! producer overwrites the oldest samples unconditionally: an overrun is a
//! lossy policy, not a fault. The extra `transform_size` of depth keeps the
//! frame the worker is copying out of reach of the next callback.
//!
//! Writes never allocate. `StereoRing` is guarded by the sample-buffer lock
//! in `engine::Shared`; nothing here synchronises on its own.

pub mod frame;

/// Number of captured channels. Capture is fixed stereo.
pub const CHANNEL_COUNT: usize = 2;

/// Capture channel, processed in declaration order by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Processing order for one worker pass.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::Left, Channel::Right];

    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// Single-channel circular buffer.
#[derive(Debug, Clone)]
pub struct SampleRing {
    storage: Vec<f32>,
    transform_size: usize,
    write_cursor: usize,
    read_cursor: usize,
}

impl SampleRing {
    /// Allocate a zeroed ring with capacity `2 × transform_size`.
    pub fn new(transform_size: usize) -> Self {
        Self {
            storage: vec![0.0; transform_size * 2],
            transform_size,
            write_cursor: 0,
            read_cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Append `samples` at the write cursor, wrapping as often as needed.
    pub fn write(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.push(sample);
        }
        self.update_read_cursor();
    }

    /// Copy the latest `transform_size` samples, oldest first, into `dst`.
    ///
    /// Copies `min(dst.len(), transform_size)` samples; callers size `dst`
    /// from `transform_size()` under the same lock.
    pub fn snapshot_frame(&self, dst: &mut [f32]) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        let len = dst.len().min(self.transform_size);
        // The frame is at most two contiguous runs of storage.
        let first = len.min(capacity - self.read_cursor);
        dst[..first].copy_from_slice(&self.storage[self.read_cursor..self.read_cursor + first]);
        dst[first..len].copy_from_slice(&self.storage[..len - first]);
    }

    #[inline]
    fn push(&mut self, sample: f32) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        self.storage[self.write_cursor] = sample;
        self.write_cursor = (self.write_cursor + 1) % capacity;
    }

    #[inline]
    fn update_read_cursor(&mut self) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        self.read_cursor = (self.write_cursor + capacity - self.transform_size) % capacity;
    }
}

/// Left/right rings written in lockstep from interleaved capture blocks.
#[derive(Debug, Clone)]
pub struct StereoRing {
    channels: [SampleRing; CHANNEL_COUNT],
    epoch: u64,
}

impl StereoRing {
    pub fn new(transform_size: usize, epoch: u64) -> Self {
        Self {
            channels: [SampleRing::new(transform_size), SampleRing::new(transform_size)],
            epoch,
        }
    }

    /// Zero-capacity ring used before the first configuration.
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn transform_size(&self) -> usize {
        self.channels[0].transform_size()
    }

    pub fn channel(&self, channel: Channel) -> &SampleRing {
        &self.channels[channel.index()]
    }

    /// Deinterleave `L R L R …` samples into the two rings.
    ///
    /// Returns the number of whole frames consumed; a trailing half frame is
    /// ignored.
    pub fn write_interleaved(&mut self, data: &[f32]) -> usize {
        self.write_interleaved_with(data, |s| s)
    }

    /// Like `write_interleaved`, converting each device sample to `f32` in place.
    pub fn write_interleaved_with<T, F>(&mut self, data: &[T], convert: F) -> usize
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let frames = data.len() / CHANNEL_COUNT;
        let [left, right] = &mut self.channels;
        for frame in data.chunks_exact(CHANNEL_COUNT) {
            left.push(convert(frame[0]));
            right.push(convert(frame[1]));
        }
        left.update_read_cursor();
        right.update_read_cursor();
        frames
    }

    /// Copy the latest frame of `channel` into `dst`. See `SampleRing::snapshot_frame`.
    pub fn snapshot_frame(&self, channel: Channel, dst: &mut [f32]) {
        self.channels[channel.index()].snapshot_frame(dst);
    }
}
