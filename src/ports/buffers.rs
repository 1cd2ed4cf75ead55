use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Same default as the chunk size used by stream copy helpers.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Port for the scratch buffers used while relaying
///
/// A buffer handed out by `get` is used by a single relay direction at a
/// time and is not touched by the caller after it went back through `put`.
pub trait BufferSource: Send + Sync {
    fn get(&self) -> Vec<u8>;

    fn put(&self, buf: Vec<u8>);
}

/// Allocates a fresh buffer for every request and never pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBufferSource;

impl BufferSource for DefaultBufferSource {
    fn get(&self) -> Vec<u8> {
        vec![0; DEFAULT_BUFFER_SIZE]
    }

    fn put(&self, _buf: Vec<u8>) {}
}

/// A buffer on loan from a [`BufferSource`], given back when dropped.
pub struct BorrowedBuffer {
    source: Arc<dyn BufferSource>,
    buf: Option<Vec<u8>>,
}

impl BorrowedBuffer {
    pub fn borrow_from(source: &Arc<dyn BufferSource>) -> Self {
        Self {
            buf: Some(source.get()),
            source: source.clone(),
        }
    }
}

impl Deref for BorrowedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for BorrowedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for BorrowedBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.source.put(buf);
        }
    }
}
