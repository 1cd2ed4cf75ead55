use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::ports::{BoxedStream, Relay};

/// Copies both directions of a tunnel inside the calling task.
///
/// A direction reaching end of stream shuts down the write side it feeds and
/// the other direction keeps running until it ends too, so half-closed
/// connections still get their answer. A failing direction stops the other,
/// which then reports what it copied so far. Closing the streams is left to
/// the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct BidiCopy;

enum Finished {
    AtoB(io::Result<()>),
    BtoA(io::Result<()>),
}

#[async_trait]
impl Relay for BidiCopy {
    async fn relay(
        &self,
        a: &mut BoxedStream,
        b: &mut BoxedStream,
        buf_ab: &mut [u8],
        buf_ba: &mut [u8],
    ) -> (io::Result<u64>, io::Result<u64>) {
        let (mut a_read, mut a_write) = tokio::io::split(a);
        let (mut b_read, mut b_write) = tokio::io::split(b);
        let mut copied_ab = 0u64;
        let mut copied_ba = 0u64;

        let (result_ab, result_ba) = {
            let ab = copy_one(&mut a_read, &mut b_write, buf_ab, &mut copied_ab);
            let ba = copy_one(&mut b_read, &mut a_write, buf_ba, &mut copied_ba);
            tokio::pin!(ab);
            tokio::pin!(ba);

            let first = tokio::select! {
                result = &mut ab => Finished::AtoB(result),
                result = &mut ba => Finished::BtoA(result),
            };

            match first {
                Finished::AtoB(Ok(())) => (Ok(()), ba.await),
                Finished::BtoA(Ok(())) => (ab.await, Ok(())),
                Finished::AtoB(Err(err)) => (Err(err), Ok(())),
                Finished::BtoA(Err(err)) => (Ok(()), Err(err)),
            }
        };

        (result_ab.map(|()| copied_ab), result_ba.map(|()| copied_ba))
    }
}

async fn copy_one<R, W>(reader: &mut R, writer: &mut W, buf: &mut [u8], copied: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    if buf.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "relay buffer is empty"));
    }

    loop {
        let n = reader.read(buf).await?;
        if n == 0 {
            // The peer may already be gone, its own direction reports that.
            if let Err(err) = writer.shutdown().await {
                trace!("Unable to half-close relay peer: {}", err);
            }
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}
