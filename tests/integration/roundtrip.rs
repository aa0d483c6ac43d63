use crate::*;

#[test]
fn test_random_trees_survive_the_wire() {
    let ctx = context();
    let mut rng = seeded(0x5eed);
    for round in 0..64 {
        let tree = random_tree(&mut rng, 3);
        let sent = Packet::with_contents(ctx.clone(), tree).unwrap();
        let wire = sent.serialize().unwrap();
        assert_eq!(wire.len() as u64, sent.packet_length(), "round {round}");

        let received = Packet::deserialize(ctx.clone(), wire.clone(), ChunkType::BYTES).unwrap();
        assert_eq!(received.serialize().unwrap(), wire, "round {round}");
        assert_ranges_agree(&sent, &received, &mut rng, 24)
            .with_context(|| format!("round {round}"))
            .unwrap();
    }
}

#[test]
fn test_sub_ranges_match_the_serialized_form() {
    let ctx = context();
    let mut rng = seeded(0xabcd);
    for _ in 0..32 {
        let tree = frozen(random_tree(&mut rng, 4));
        let wire = ctx.registry().serialize(&tree).unwrap();
        let total = tree.byte_length();
        for _ in 0..8 {
            let offset = rng.gen_range(0..total);
            let length = rng.gen_range(1..=total - offset);
            let range = ctx.registry().serialize_range(&tree, offset, length).unwrap();
            assert_eq!(range, wire.slice(offset as usize..(offset + length) as usize));
        }
    }
}

#[test]
fn test_slices_of_random_trees_serialize_their_window() {
    let ctx = context();
    let mut rng = seeded(42);
    for _ in 0..32 {
        let backing = frozen(random_tree(&mut rng, 3));
        let wire = ctx.registry().serialize(&backing).unwrap();
        let total = backing.byte_length();
        let offset = rng.gen_range(0..total);
        let length = rng.gen_range(1..=total - offset);

        let packet =
            Packet::with_contents(ctx.clone(), Chunk::slice(backing, offset, length).unwrap())
                .unwrap();
        assert_eq!(
            packet.serialize().unwrap(),
            wire.slice(offset as usize..(offset + length) as usize)
        );
    }
}

#[test]
fn test_contiguous_slices_merge_when_flattening() {
    let data: Vec<u8> = (0..32u8).collect();
    let backing = frozen(Chunk::bytes(data.clone()));

    let mut merged = Packet::new(context());
    merged
        .push_trailer(Chunk::slice(backing.clone(), 4, 6).unwrap())
        .unwrap();
    merged
        .push_trailer(Chunk::slice(backing.clone(), 10, 10).unwrap())
        .unwrap();
    assert_eq!(merged.num_chunks(), 1);
    let only = merged.chunk(0).unwrap();
    let slice = only.as_slice().unwrap();
    assert_eq!((slice.offset(), slice.length()), (4, 16));
    assert_eq!(merged.serialize().unwrap(), &data[4..20]);

    let mut kept = Packet::new(context_with(ChunkConfig {
        flatten: false,
        ..ChunkConfig::default()
    }));
    kept.push_trailer(Chunk::slice(backing.clone(), 4, 6).unwrap())
        .unwrap();
    kept.push_trailer(Chunk::slice(backing, 10, 10).unwrap())
        .unwrap();
    assert_eq!(kept.num_chunks(), 2);
    assert_eq!(kept.serialize().unwrap(), merged.serialize().unwrap());
}

#[test]
fn test_flattening_twice_changes_nothing() {
    let ctx = context();
    let mut rng = seeded(99);
    for _ in 0..32 {
        let tree = frozen(random_tree(&mut rng, 3));
        let once = frozen(Chunk::sequence_of([tree.clone()], true).unwrap());
        let twice = frozen(Chunk::sequence_of([once.clone()], true).unwrap());

        let once_children = once.as_sequence().map_or(1, |seq| seq.len());
        let twice_children = twice.as_sequence().map_or(1, |seq| seq.len());
        assert_eq!(once_children, twice_children);
        assert_eq!(
            ctx.registry().serialize(&once).unwrap(),
            ctx.registry().serialize(&twice).unwrap()
        );
    }
}

#[test]
fn test_structured_root_keeps_leftover_bytes() {
    let ctx = context();
    let mut wire = BytesMut::new();
    ShortHeader { id: 0x0a0b_0c0d }.encode(&mut wire);
    wire.extend_from_slice(b"rest");

    let mut packet = Packet::deserialize(ctx, wire.freeze(), ShortHeader::TYPE).unwrap();
    assert_eq!(packet.num_chunks(), 2);
    assert_eq!(packet.pop_header_as::<ShortHeader>().unwrap().unwrap().id, 0x0a0b_0c0d);
    assert_eq!(packet.peek_data_bytes().unwrap(), &b"rest"[..]);
}

#[test]
fn test_undecodable_root_is_an_error() {
    let ctx = context();
    let err = Packet::deserialize(ctx, Bytes::from_static(&[1, 2]), ShortHeader::TYPE).unwrap_err();
    assert!(matches!(err, ChunkError::Decode { .. }));
}

#[test]
fn test_padding_travels_as_fill_bytes() {
    let ctx = context();
    let mut packet = Packet::new(ctx.clone());
    packet.push_trailer(payload(b"p")).unwrap();
    packet.push_trailer(Chunk::byte_count(5, 0xee)).unwrap();
    let wire = packet.serialize().unwrap();
    assert_eq!(&wire[3..], &[0xee; 5]);

    let mut received = Packet::deserialize(ctx, wire, ChunkType::BYTES).unwrap();
    let padding = received
        .pop_trailer(ChunkType::BYTE_COUNT, Some(5))
        .unwrap()
        .unwrap();
    assert_eq!(padding.byte_length(), 5);
    assert_eq!(received.pop_header_as::<Payload>().unwrap().unwrap().data, &b"p"[..]);
}
