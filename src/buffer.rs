//! C7 -- output buffer with a size-threshold flush hook delivering
//! completed items downstream.

/// Default flush threshold: a page-multiple (1 MiB) chosen so a run of
/// typical OSM areas doesn't cross it mid-burst.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1 << 20;

/// A sink that takes ownership of a full buffer of `T`.
pub trait BufferSink<T>: Send {
    fn accept(&mut self, items: Vec<T>);
}

impl<T, F: FnMut(Vec<T>) + Send> BufferSink<T> for F {
    fn accept(&mut self, items: Vec<T>) {
        self(items)
    }
}

/// Items appended by an assembler, flushed to a registered sink once their
/// approximate combined size crosses `threshold`, or on demand.
///
/// Generic over the emitted item rather than a raw byte vector: the Area
/// binary layout is an external concern (see crate docs), so this operates
/// on whatever typed item the assembler produces and never splits one item
/// across two flushed buffers, since a flush only ever happens between
/// whole items.
pub struct CallbackBuffer<T> {
    items: Vec<T>,
    approx_size: usize,
    threshold: usize,
    sink: Option<Box<dyn BufferSink<T>>>,
}

impl<T> CallbackBuffer<T> {
    pub fn new(threshold: usize) -> Self {
        CallbackBuffer {
            items: Vec::new(),
            approx_size: 0,
            threshold,
            sink: None,
        }
    }

    pub fn set_callback(&mut self, sink: Option<Box<dyn BufferSink<T>>>) {
        self.sink = sink;
    }

    /// Appends one item with its approximate size, for `possibly_flush`'s
    /// threshold accounting.
    pub fn push(&mut self, item: T, approx_size: usize) {
        self.items.push(item);
        self.approx_size += approx_size;
    }

    /// If the buffer's approximate size has crossed the threshold, swaps it
    /// with a fresh empty one and hands the full one to the registered
    /// sink, synchronously. A no-op in pull mode (no sink registered).
    pub fn possibly_flush(&mut self) {
        if self.approx_size >= self.threshold {
            self.flush();
        }
    }

    /// Forces a hand-off regardless of size.
    pub fn flush(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let items = std::mem::take(&mut self.items);
        self.approx_size = 0;
        if let Some(sink) = self.sink.as_mut() {
            sink.accept(items);
        } else {
            // pull mode: items stay available via `read` until then.
            self.items = items;
        }
    }

    /// Pulls the current buffer's contents without waiting for a sink.
    /// Only meaningful in pull mode (no callback registered).
    pub fn read(&mut self) -> Vec<T> {
        self.approx_size = 0;
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for CallbackBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_THRESHOLD)
    }
}
