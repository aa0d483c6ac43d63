//! Sending side: payload → echo header → link header → padding → frame check.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::mpsc;

use strata_core::{Chunk, Packet, PacketContext};

use super::Frame;
use crate::config::PipelineConfig;
use crate::proto::{station_mac, EchoHeader, FrameCheck, LinkHeader, BROADCAST};

/// Station id of the sender.
pub const SENDER_ID: u32 = 0xffff;

pub const PADDING_FILL: u8 = 0x00;

#[derive(Debug, Clone, Copy, Default)]
pub struct SenderReport {
    pub frames: u32,
    pub frame_length: u64,
}

/// Payload of frame `sequence`: a byte ramp starting at the sequence number.
pub fn payload_for(sequence: u32, length: u32) -> Bytes {
    (0..length)
        .map(|i| (sequence as u8).wrapping_add(i as u8))
        .collect::<Vec<u8>>()
        .into()
}

/// Build one frame, outermost header first on the wire.
pub fn build_frame(ctx: &Arc<PacketContext>, config: &PipelineConfig, sequence: u32) -> Result<Packet> {
    let mut packet = Packet::new(ctx.clone());
    packet.push_trailer(Chunk::bytes(payload_for(sequence, config.payload_length)))?;
    packet.push_header(Chunk::fields(EchoHeader::request(SENDER_ID as u16, sequence)))?;
    packet.push_header(Chunk::fields(LinkHeader::new(BROADCAST, station_mac(SENDER_ID))))?;
    if config.padding > 0 {
        packet.push_trailer(Chunk::byte_count(u64::from(config.padding), PADDING_FILL))?;
    }

    let body = packet.serialize().context("failed to serialize frame body")?;
    packet.push_trailer(Chunk::fields(FrameCheck::over(&body)))?;
    Ok(packet)
}

pub async fn run(
    ctx: Arc<PacketContext>,
    config: &PipelineConfig,
    frames: mpsc::Sender<Frame>,
) -> Result<SenderReport> {
    let mut report = SenderReport::default();
    for sequence in 0..config.packets {
        let packet = build_frame(&ctx, config, sequence)?;
        report.frame_length = packet.packet_length();
        tracing::debug!(sequence, length = packet.packet_length(), chunks = packet.num_chunks(), "frame built");
        frames
            .send(Frame { sequence, packet })
            .await
            .context("medium hung up")?;
        report.frames += 1;
    }
    Ok(report)
}
