use crate::*;

fn raw(data: impl Into<Bytes>) -> Packet {
    Packet::deserialize(context(), data.into(), ChunkType::BYTES).unwrap()
}

#[test]
fn test_stored_and_parsed_layers_agree() {
    let ctx = context();
    let mut stored = layered_packet(&ctx, b"same bytes either way");
    let mut parsed = Packet::deserialize(ctx, stored.serialize().unwrap(), ChunkType::BYTES).unwrap();

    assert_eq!(
        stored.pop_header_as::<ShortHeader>().unwrap(),
        parsed.pop_header_as::<ShortHeader>().unwrap()
    );
    assert_eq!(
        stored.pop_trailer_as::<Checksum>().unwrap(),
        parsed.pop_trailer_as::<Checksum>().unwrap()
    );
    assert_eq!(
        stored.pop_header_as::<LongHeader>().unwrap(),
        parsed.pop_header_as::<LongHeader>().unwrap()
    );
    let body = stored.peek_data_as::<Payload>(0).unwrap();
    assert!(body.is_some());
    assert_eq!(body, parsed.peek_data_as::<Payload>(0).unwrap());
    assert_eq!(stored.peek_data_bytes().unwrap(), parsed.peek_data_bytes().unwrap());
}

#[test]
fn test_cursor_index_and_linear_walk_agree() {
    let ctx = context();
    let mut packet = layered_packet(&ctx, b"walk");
    packet.pop_header_as::<ShortHeader>().unwrap().unwrap();

    let via_cursor = packet.peek_header(LongHeader::TYPE, None).unwrap().unwrap();
    let via_offset = packet.peek_at(LongHeader::TYPE, 4, None).unwrap().unwrap();
    assert!(Arc::ptr_eq(&via_cursor, &via_offset));
    assert!(Arc::ptr_eq(&via_cursor, &packet.chunk(1).unwrap()));
}

#[test]
fn test_misaligned_range_is_serialized() {
    let ctx = context();
    let packet = layered_packet(&ctx, b"misaligned");
    let wire = packet.serialize().unwrap();

    let bytes = packet.peek_at(ChunkType::BYTES, 2, Some(7)).unwrap().unwrap();
    assert_eq!(bytes.as_bytes().unwrap(), &wire[2..9]);

    let view = packet.peek_at(ChunkType::ANY, 2, Some(7)).unwrap().unwrap();
    assert_eq!(view.byte_length(), 7);
    assert_eq!(ctx.registry().serialize(&view).unwrap(), &wire[2..9]);
}

#[test]
fn test_stored_field_set_of_other_type_is_definitive() {
    let ctx = context();
    let mut stored = Packet::new(ctx.clone());
    stored.push_trailer(payload(b"abcd")).unwrap();
    stored
        .push_header(Chunk::fields(ShortHeader { id: 0x0000_0102 }))
        .unwrap();
    assert!(stored.peek_header_as::<LongHeader>().unwrap().is_none());

    // The same bytes without structure do decode as a long header.
    let parsed = Packet::deserialize(ctx, stored.serialize().unwrap(), ChunkType::BYTES).unwrap();
    let long = parsed.peek_header_as::<LongHeader>().unwrap().unwrap();
    assert_eq!(long.flags, 0);
    assert_eq!(long.length, 0x0102);
    assert_eq!(long.sequence, 0x0004_6162);
}

#[test]
fn test_backward_parse_is_tail_relative() {
    let mut packet = raw((0..20u8).collect::<Vec<u8>>());
    assert_eq!(
        packet.peek_trailer_as::<ShortHeader>().unwrap().unwrap().id,
        0x1011_1213
    );

    packet.pop_trailer(ChunkType::BYTES, Some(3)).unwrap().unwrap();
    let tail = packet.peek_trailer_as::<ShortHeader>().unwrap().unwrap();
    assert_eq!(tail.id, 0x0d0e_0f10);
    assert_eq!(Some(tail), packet.peek_data_as::<ShortHeader>(13).unwrap());
}

#[test]
fn test_variable_trailer_needs_a_length() {
    let mut data = b"front".to_vec();
    data.extend_from_slice(&[0, 4]);
    data.extend_from_slice(b"wxyz");
    let packet = raw(data);

    let err = packet.peek_trailer(Payload::TYPE, None).unwrap_err();
    assert!(matches!(err, ChunkError::UnknownLength { .. }));

    let tail = packet.peek_trailer(Payload::TYPE, Some(6)).unwrap().unwrap();
    assert_eq!(tail.field_set::<Payload>().unwrap().data, &b"wxyz"[..]);
}

#[test]
fn test_fixed_length_past_end_is_absent() {
    let mut packet = raw(vec![0u8; 6]);
    assert!(packet.pop_header_as::<LongHeader>().unwrap().is_none());
    assert_eq!(packet.header_pop_offset(), 0);
    assert!(!packet.has_trailer(LongHeader::TYPE).unwrap());
}

#[test]
fn test_raw_view_stops_at_region_edge() {
    let mut packet = raw((0..10u8).collect::<Vec<u8>>());
    packet.pop_trailer(ChunkType::BYTES, Some(3)).unwrap().unwrap();

    let front = packet.peek_header(ChunkType::BYTES, None).unwrap().unwrap();
    assert_eq!(front.as_bytes().unwrap(), &[0, 1, 2, 3, 4, 5, 6][..]);
}

#[test]
fn test_field_set_crossing_region_edge_is_absent() {
    let ctx = context();
    let mut packet = Packet::new(ctx);
    packet.push_trailer(payload(b"wxyz")).unwrap();
    packet
        .push_header(Chunk::fields(ShortHeader { id: 3 }))
        .unwrap();
    assert!(packet.peek_data_as::<Payload>(4).unwrap().is_some());

    packet.pop_trailer(ChunkType::BYTES, Some(1)).unwrap().unwrap();
    assert!(packet.peek_data_as::<Payload>(4).unwrap().is_none());
}

#[test]
fn test_implicit_serialization_can_be_disabled() {
    let ctx = context_with(ChunkConfig {
        implicit_serialization: false,
        ..ChunkConfig::default()
    });
    let mut stored = layered_packet(&ctx, b"strict");
    let wire = stored.serialize().unwrap();

    // Stored chunks are still reachable.
    assert_eq!(stored.pop_header_as::<ShortHeader>().unwrap().unwrap().id, 0xaa);
    let err = stored.peek_at(ChunkType::BYTES, 2, Some(3)).unwrap_err();
    assert!(matches!(err, ChunkError::ImplicitSerializationDisabled { .. }));

    let mut parsed = Packet::deserialize(ctx, wire.clone(), ChunkType::BYTES).unwrap();
    let err = parsed.pop_header_as::<ShortHeader>().unwrap_err();
    assert!(matches!(err, ChunkError::ImplicitSerializationDisabled { .. }));

    // Contiguous bytes need no serializer.
    let front = parsed.pop_header(ChunkType::BYTES, Some(4)).unwrap().unwrap();
    assert_eq!(front.as_bytes().unwrap(), &wire[..4]);
}

#[test]
fn test_out_of_range_peek_is_an_error() {
    let packet = raw(vec![1u8; 4]);
    let err = packet.peek_at(ChunkType::BYTES, 2, Some(3)).unwrap_err();
    assert!(matches!(
        err,
        ChunkError::OutOfBounds {
            offset: 2,
            length: 3,
            available: 2,
            ..
        }
    ));
    assert!(packet.peek_at(ChunkType::BYTES, 4, None).unwrap().is_none());
}
