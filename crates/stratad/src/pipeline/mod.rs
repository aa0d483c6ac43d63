//! Demo protocol stack — sender, shared medium and receivers connected by
//! tokio channels.
//!
//!   sender ──Frame──▶ medium ──wire bytes──▶ receiver 0..N
//!
//! The sender builds packets layer by layer, the medium duplicates every
//! frame once per receiver and puts it on the wire, and each receiver
//! parses raw bytes back into a packet and peels the layers off again.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use strata_core::{Packet, PacketContext};

use crate::config::PipelineConfig;

pub mod medium;
pub mod receiver;
pub mod sender;

pub use receiver::ReceiverReport;

/// A packet handed from the sender to the medium.
#[derive(Debug)]
pub struct Frame {
    pub sequence: u32,
    pub packet: Packet,
}

/// Everything the pipeline observed, printed as JSON by `main`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub frames_sent: u32,
    pub frame_length: u64,
    pub copies_delivered: u64,
    pub wire_bytes: u64,
    pub receivers: Vec<ReceiverReport>,
}

/// Run every stage to completion.
pub async fn run(ctx: Arc<PacketContext>, config: &PipelineConfig) -> Result<Summary> {
    let capacity = config.channel_capacity.max(1);
    let (frame_tx, frame_rx) = mpsc::channel::<Frame>(capacity);

    let mut wire_txs = Vec::new();
    let mut receivers = Vec::new();
    for id in 0..config.receivers {
        let (wire_tx, wire_rx) = mpsc::channel::<Bytes>(capacity);
        wire_txs.push(wire_tx);
        let receiver = receiver::Receiver::new(id, ctx.clone(), config);
        receivers.push(tokio::spawn(receiver.run(wire_rx)));
    }

    let medium = tokio::spawn(medium::run(frame_rx, wire_txs, config.corrupt_every));
    let sent = sender::run(ctx, config, frame_tx).await?;
    let carried = medium.await.context("medium task panicked")??;

    let mut reports = Vec::with_capacity(receivers.len());
    for handle in receivers {
        reports.push(handle.await.context("receiver task panicked")??);
    }

    tracing::info!(
        frames = sent.frames,
        copies = carried.copies,
        wire_bytes = carried.wire_bytes,
        "pipeline finished"
    );
    Ok(Summary {
        frames_sent: sent.frames,
        frame_length: sent.frame_length,
        copies_delivered: carried.copies,
        wire_bytes: carried.wire_bytes,
        receivers: reports,
    })
}
