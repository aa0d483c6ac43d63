use crate::*;

#[test]
fn test_push_then_pop_one_header() {
    let ctx = context();
    let mut packet = Packet::new(ctx);
    packet
        .push_header(Chunk::fields(ShortHeader { id: 0x0102_0304 }))
        .unwrap();
    packet.push_trailer(payload(b"abcdef")).unwrap();
    assert_eq!(packet.packet_length(), 12);

    let header = packet.pop_header_as::<ShortHeader>().unwrap().unwrap();
    assert_eq!(header.id, 0x0102_0304);
    assert_eq!(packet.header_pop_offset(), 4);
    assert_eq!(packet.data_length(), 8);

    // Next chunk is a payload, not another header.
    assert!(packet.pop_header_as::<ShortHeader>().unwrap().is_none());
    assert_eq!(packet.header_pop_offset(), 4);
    assert_regions(&packet);
}

#[test]
fn test_aligned_peek_returns_stored_child() {
    let ctx = context();
    let first = frozen(Chunk::bytes(&b"abc"[..]));
    let second = frozen(Chunk::bytes(&b"defgh"[..]));
    let root = Chunk::sequence_of([first, second.clone()], true).unwrap();
    let packet = Packet::with_contents(ctx, root).unwrap();
    assert_eq!(packet.num_chunks(), 2);

    let found = packet.peek_at(ChunkType::BYTES, 3, Some(5)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&found, &second));
}

#[test]
fn test_encapsulate_transmit_decapsulate() {
    let ctx = context();
    let sent = layered_packet(&ctx, b"strata over the wire");
    let wire = sent.serialize().unwrap();

    let mut received = Packet::deserialize(ctx, wire, ChunkType::BYTES).unwrap();
    let short = received.pop_header_as::<ShortHeader>().unwrap().unwrap();
    assert_eq!(short.id, 0xaa);
    let check = received.pop_trailer_as::<Checksum>().unwrap().unwrap();
    let covered = received
        .peek_at(ChunkType::BYTES, 0, Some(received.trailer_pop_offset()))
        .unwrap()
        .unwrap();
    assert_eq!(*check, Checksum::over(covered.as_bytes().unwrap()));

    let long = received.pop_header_as::<LongHeader>().unwrap().unwrap();
    assert_eq!(long.sequence, 77);
    assert_eq!(u64::from(long.length), received.data_length());

    let body = received.peek_data_as::<Payload>(0).unwrap().unwrap();
    assert_eq!(&body.data[..], b"strata over the wire");
    assert_regions(&received);
}

#[test]
fn test_trim_to_payload_after_decapsulation() {
    let ctx = context();
    let mut packet = layered_packet(&ctx, b"payload");
    packet.pop_header_as::<ShortHeader>().unwrap().unwrap();
    packet.pop_header_as::<LongHeader>().unwrap().unwrap();
    packet.pop_trailer_as::<Checksum>().unwrap().unwrap();

    let front = packet.header_pop_offset();
    let back = packet.trailer_popped_length();
    packet.remove_from_beginning(front).unwrap();
    packet.remove_from_end(back).unwrap();

    assert_eq!(packet.header_pop_offset(), 0);
    assert_eq!(packet.trailer_popped_length(), 0);
    assert_eq!(packet.packet_length(), 9);
    let body = packet.pop_header_as::<Payload>().unwrap().unwrap();
    assert_eq!(&body.data[..], b"payload");
}

#[test]
fn test_regions_hold_across_random_pops() {
    let ctx = context();
    let mut rng = seeded(0xfeed);
    let data: Vec<u8> = (0..64u8).collect();
    let mut packet = Packet::deserialize(ctx, Bytes::from(data), ChunkType::BYTES).unwrap();

    while packet.data_length() > 0 {
        let take = rng.gen_range(1..=packet.data_length().min(5));
        let popped = if rng.gen_bool(0.5) {
            packet.pop_header(ChunkType::BYTES, Some(take)).unwrap()
        } else {
            packet.pop_trailer(ChunkType::BYTES, Some(take)).unwrap()
        };
        assert_eq!(popped.unwrap().byte_length(), take);
        assert_regions(&packet);
    }
    assert_eq!(packet.header_pop_offset(), packet.trailer_pop_offset());

    // Nothing left between the cursors.
    let err = packet.pop_header(ChunkType::BYTES, Some(1)).unwrap_err();
    assert!(matches!(err, ChunkError::OutOfBounds { available: 0, .. }));
}

#[test]
fn test_rewind_and_reparse_header() {
    let ctx = context();
    let wire = layered_packet(&ctx, b"xy").serialize().unwrap();
    let mut packet = Packet::deserialize(ctx, wire, ChunkType::BYTES).unwrap();

    packet.pop_header(ChunkType::BYTES, Some(4)).unwrap().unwrap();
    packet.set_header_pop_offset(0).unwrap();
    let short = packet.pop_header_as::<ShortHeader>().unwrap().unwrap();
    assert_eq!(short.id, 0xaa);
    assert_eq!(packet.header_pop_offset(), 4);
}
