//! Receiving side: parse wire bytes and peel the layers in reverse.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use strata_core::{ChunkType, Packet, PacketContext};

use super::sender::payload_for;
use crate::config::PipelineConfig;
use crate::proto::{station_mac, EchoHeader, FrameCheck, LinkHeader, MacAddress};

const PREVIEW_BYTES: usize = 16;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverReport {
    pub id: u32,
    pub frames: u64,
    pub accepted: u64,
    pub corrupted: u64,
    pub malformed: u64,
    pub ignored: u64,
    pub payload_bytes: u64,
    /// Hex of the first bytes of the first frame seen.
    pub first_frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { sequence: u32, payload_length: u64 },
    Corrupted,
    Malformed(&'static str),
    NotForUs,
}

pub struct Receiver {
    id: u32,
    mac: MacAddress,
    ctx: Arc<PacketContext>,
    payload_length: u32,
    padding: u32,
}

impl Receiver {
    pub fn new(id: u32, ctx: Arc<PacketContext>, config: &PipelineConfig) -> Self {
        Self {
            id,
            mac: station_mac(id),
            ctx,
            payload_length: config.payload_length,
            padding: config.padding,
        }
    }

    pub async fn run(self, mut wire: mpsc::Receiver<Bytes>) -> Result<ReceiverReport> {
        let mut report = ReceiverReport {
            id: self.id,
            ..ReceiverReport::default()
        };
        while let Some(frame) = wire.recv().await {
            report.frames += 1;
            if report.first_frame.is_none() {
                report.first_frame = Some(hex::encode(&frame[..frame.len().min(PREVIEW_BYTES)]));
            }
            match self.process(frame)? {
                Verdict::Accepted { payload_length, .. } => {
                    report.accepted += 1;
                    report.payload_bytes += payload_length;
                }
                Verdict::Corrupted => report.corrupted += 1,
                Verdict::Malformed(layer) => {
                    tracing::warn!(receiver = self.id, layer, "dropping malformed frame");
                    report.malformed += 1;
                }
                Verdict::NotForUs => report.ignored += 1,
            }
        }
        Ok(report)
    }

    /// Decapsulate one frame.
    pub fn process(&self, wire: Bytes) -> Result<Verdict> {
        let mut packet = Packet::deserialize(self.ctx.clone(), wire, ChunkType::BYTES)?;

        let Some(link) = packet.pop_header_as::<LinkHeader>()? else {
            return Ok(Verdict::Malformed("link"));
        };
        if !link.accepts(&self.mac) {
            return Ok(Verdict::NotForUs);
        }

        let Some(check) = packet.pop_trailer_as::<FrameCheck>()? else {
            return Ok(Verdict::Malformed("frame check"));
        };
        let body = packet
            .peek_at(ChunkType::BYTES, 0, Some(packet.trailer_pop_offset()))?
            .and_then(|chunk| chunk.as_bytes().cloned())
            .unwrap_or_default();
        if !check.verifies(&body) {
            tracing::warn!(receiver = self.id, length = body.len(), "frame check failed");
            return Ok(Verdict::Corrupted);
        }

        if self.padding > 0
            && packet
                .pop_trailer(ChunkType::BYTE_COUNT, Some(u64::from(self.padding)))?
                .is_none()
        {
            return Ok(Verdict::Malformed("padding"));
        }

        let Some(echo) = packet.pop_header_as::<EchoHeader>()? else {
            return Ok(Verdict::Malformed("echo"));
        };
        let sequence = echo.sequence.get();
        let payload = packet.peek_data_bytes()?;
        if payload != payload_for(sequence, self.payload_length) {
            return Ok(Verdict::Malformed("payload"));
        }

        tracing::trace!(receiver = self.id, sequence, "frame accepted");
        Ok(Verdict::Accepted {
            sequence,
            payload_length: payload.len() as u64,
        })
    }
}
