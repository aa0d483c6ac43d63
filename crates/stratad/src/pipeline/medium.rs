//! Shared medium: one duplicate per receiver, serialized onto the wire.

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use super::Frame;

#[derive(Debug, Clone, Copy, Default)]
pub struct MediumReport {
    pub frames: u64,
    pub copies: u64,
    pub wire_bytes: u64,
}

pub async fn run(
    mut frames: mpsc::Receiver<Frame>,
    receivers: Vec<mpsc::Sender<Bytes>>,
    corrupt_every: u32,
) -> Result<MediumReport> {
    let mut report = MediumReport::default();
    while let Some(frame) = frames.recv().await {
        report.frames += 1;
        for (id, receiver) in receivers.iter().enumerate() {
            // duplicates share every chunk with the original frame
            let copy = frame.packet.duplicate();
            let mut wire = copy
                .serialize()
                .with_context(|| format!("failed to serialize frame {}", frame.sequence))?;
            if id == 0 && should_corrupt(frame.sequence, corrupt_every) {
                tracing::debug!(sequence = frame.sequence, "corrupting frame for receiver 0");
                wire = corrupt(&wire);
            }
            report.copies += 1;
            report.wire_bytes += wire.len() as u64;
            receiver
                .send(wire)
                .await
                .with_context(|| format!("receiver {id} hung up"))?;
        }
    }
    Ok(report)
}

fn should_corrupt(sequence: u32, every: u32) -> bool {
    every > 0 && (sequence + 1) % every == 0
}

/// Flip every bit of the middle byte.
fn corrupt(wire: &Bytes) -> Bytes {
    if wire.is_empty() {
        return wire.clone();
    }
    let mut damaged = BytesMut::from(&wire[..]);
    let middle = damaged.len() / 2;
    damaged[middle] ^= 0xff;
    damaged.freeze()
}
