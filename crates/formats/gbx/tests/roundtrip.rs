use gbx::cursor::Writer;
use gbx::engines::game::{
    CGameCtnChallenge, CGameCtnChallengeParameters, CGameCtnCollector, CGameItemModel, Icon,
    CGAME_CTN_CHALLENGE, CGAME_ITEM_MODEL,
};
use gbx::engines::plug::{CPlugSurface, CPLUG_SURFACE};
use gbx::engines::{self, mw::CMW_NOD};
use gbx::header::HEAVY_BIT;
use gbx::registry::ClassDescriptor;
use gbx::stream::{self, FACADE, SKIP};
use gbx::{
    Epoch, Error, GameVersion, Gbx, GbxReader, GbxWriter, Id, Ident, NodeRef, ReadSettings, Registry,
    WriteSettings,
};

/// Assemble a version 6 binary file around an uncompressed body.
fn gbx_file(class_id: u32, user_data: &[(u32, bool, Vec<u8>)], num_nodes: u32, body: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_bytes(b"GBX");
    w.write_u16(6);
    w.write_bytes(b"BUUR");
    w.write_u32(class_id);
    if user_data.is_empty() {
        w.write_u32(0);
    } else {
        let payload: usize = user_data.iter().map(|(_, _, p)| p.len()).sum();
        w.write_u32((user_data.len() * 8 + 4 + payload) as u32);
        w.write_u32(user_data.len() as u32);
        for (id, heavy, p) in user_data {
            w.write_u32(*id);
            w.write_u32(p.len() as u32 | if *heavy { HEAVY_BIT } else { 0 });
        }
        for (_, _, p) in user_data {
            w.write_bytes(p);
        }
    }
    w.write_u32(num_nodes);
    w.write_u32(0);
    w.write_bytes(body);
    w.into_bytes()
}

/// Lookback ids of a fresh table, every name new.
fn fresh_names(w: &mut Writer, names: &[&str]) {
    w.write_u32(3);
    for name in names {
        w.write_u32(0x4000_0000);
        w.write_string(name).unwrap();
    }
}

fn legacy_challenge() -> Vec<u8> {
    let mut description = Writer::new();
    description.write_u8(1);
    fresh_names(&mut description, &["uid123", "Alpine", "Nadeo"]);
    description.write_string("My map").unwrap();
    description.write_u8(6);
    description.write_bool(false);

    let mut body = Writer::new();
    body.write_u32(0x2400_300D);
    fresh_names(&mut body, &["American", "Alpine", "Nadeo"]);
    body.write_u32(0x2400_3011);
    body.write_i32(1);
    body.write_u32(0x2400_C000);
    body.write_u32(0x2400_C001);
    for tip in ["bronze", "silver", "gold", "author"] {
        body.write_string(tip).unwrap();
    }
    body.write_u32(FACADE);
    body.write_u32(2);
    body.write_u32(FACADE);

    gbx_file(0x2400_3000, &[(0x2400_3003, false, description.into_bytes())], 2, &body.into_bytes())
}

fn collector_2008() -> Vec<u8> {
    let mut description = Writer::new();
    fresh_names(&mut description, &["Pillar", "Stadium", "Nadeo"]);
    description.write_i32(7);
    description.write_string("Blocks").unwrap();
    description.write_i32(0);
    description.write_u32(3);
    description.write_string("Pillar").unwrap();

    let mut body = Writer::new();
    body.write_u32(0x0301_A00B);
    fresh_names(&mut body, &["Pillar", "Stadium", "Nadeo"]);
    body.write_u32(0x2E00_2015);
    body.write_u32(SKIP);
    body.write_u32(4);
    body.write_u32(1);
    body.write_u32(FACADE);

    gbx_file(CGAME_ITEM_MODEL, &[(0x0301_A003, false, description.into_bytes())], 1, &body.into_bytes())
}

#[test]
fn empty_unskippable_chunk_then_terminator() {
    let registry = engines::builtin().unwrap();
    let settings = ReadSettings::default();
    let bytes = [0x00, 0x10, 0x00, 0x01, 0x01, 0xDE, 0xCA, 0xFA];

    let mut node = registry.construct_instance(CMW_NOD).unwrap();
    let mut r = GbxReader::new(&bytes, &registry, &settings);
    stream::read_chunks(&mut node, &mut r).unwrap();
    assert_eq!(node.chunks.len(), 1);
    assert_eq!(node.chunks.iter().next().unwrap().id, 0x0100_1000);

    let mut w = GbxWriter::new(&registry, Epoch::Latest);
    stream::write_chunks(&mut node, &mut w).unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn unknown_chunk_payload_is_reproduced() {
    let registry = engines::builtin().unwrap();
    let settings = ReadSettings::default();
    let mut b = Writer::new();
    b.write_u32(0xAAAA_0042);
    b.write_u32(SKIP);
    b.write_u32(3);
    b.write_bytes(&[0xAA, 0xBB, 0xCC]);
    b.write_u32(FACADE);
    let bytes = b.into_bytes();

    let mut node = registry.construct_instance(CMW_NOD).unwrap();
    let mut r = GbxReader::new(&bytes, &registry, &settings);
    stream::read_chunks(&mut node, &mut r).unwrap();
    let chunk = node.chunks.find(0xAAAA_0042).expect("opaque chunk attached");
    assert!(chunk.is_opaque());
    assert_eq!(chunk.data.as_deref(), Some(&[0xAA, 0xBB, 0xCC][..]));

    let mut w = GbxWriter::new(&registry, Epoch::Latest);
    stream::write_chunks(&mut node, &mut w).unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn legacy_challenge_round_trips_in_its_own_numbering() {
    let registry = engines::builtin().unwrap();
    let bytes = legacy_challenge();

    let mut gbx = Gbx::parse(&bytes, &registry, &ReadSettings::default()).expect("parse legacy map");
    assert_eq!(gbx.epoch(), Epoch::Epoch2006);
    assert_eq!(gbx.class_id(), CGAME_CTN_CHALLENGE);
    assert_eq!(gbx.header.num_nodes, 2);

    let node = gbx.node().unwrap();
    let map = node.get::<CGameCtnChallenge>().unwrap();
    assert_eq!(map.map_info, Ident::new("uid123", "Alpine", "Nadeo"));
    assert_eq!(map.map_name, "My map");
    assert_eq!(map.vehicle.id, Id::name("American"));
    assert_eq!(map.map_kind, 2);
    let parameters = map.parameters.as_ref().and_then(NodeRef::node).unwrap();
    assert_eq!(
        parameters.get::<CGameCtnChallengeParameters>().unwrap().tips[2],
        "gold"
    );
    let header_ids: Vec<u32> = gbx.header_chunks().map(|c| c.id).collect();
    assert_eq!(header_ids, [0x0304_3003]);

    let out = gbx.write(&registry, &WriteSettings::default()).unwrap();
    assert_eq!(out, bytes);
}

#[test]
fn collector_in_2008_numbering() {
    let registry = engines::builtin().unwrap();
    let bytes = collector_2008();

    let mut gbx = Gbx::parse(&bytes, &registry, &ReadSettings::default()).unwrap();
    assert_eq!(gbx.epoch(), Epoch::Epoch2008);
    let node = gbx.node().unwrap();
    let collector = node.get::<CGameCtnCollector>().unwrap();
    assert_eq!(collector.page_name, "Blocks");
    assert_eq!(collector.catalog_position, 3);
    assert_eq!(collector.ident.collection, Id::name("Stadium"));
    assert_eq!(node.get::<CGameItemModel>().unwrap().item_type, 1);
    assert!(node.chunks.find(0x2E00_100B).is_some());

    assert_eq!(gbx.write(&registry, &WriteSettings::default()).unwrap(), bytes);

    // Re-emit in the latest numbering and read it back.
    let latest = gbx
        .write(&registry, &WriteSettings { epoch: Some(Epoch::Latest) })
        .unwrap();
    assert_ne!(latest, bytes);
    assert_eq!(latest.len(), bytes.len());
    let reread = Gbx::parse(&latest, &registry, &ReadSettings::default()).unwrap();
    assert_eq!(reread.epoch(), Epoch::Latest);
    assert_eq!(
        reread.node().unwrap().get::<CGameCtnCollector>().unwrap().name,
        "Pillar"
    );
}

#[test]
fn built_item_round_trips() {
    let registry = engines::builtin().unwrap();

    let mut surface = registry.construct_populated(CPLUG_SURFACE).unwrap();
    {
        let data = surface.get_mut::<CPlugSurface>().unwrap();
        data.materials = vec![Id::name("Grass"), Id::name("Grass"), Id::Number(5)];
        data.skin = Some("Dirt".into());
    }

    let mut node = registry.construct_populated(CGAME_ITEM_MODEL).unwrap();
    {
        let item = node.get_mut::<CGameItemModel>().unwrap();
        item.collector.ident = Ident::new("Pillar", "Stadium", "Nadeo");
        item.collector.page_name = "Blocks/Pillars".into();
        item.collector.name = "Pillar".into();
        item.collector.icon = Icon {
            width: 2,
            height: 1,
            pixels: vec![0xFF; 8],
        };
        item.skins = vec!["A".into(), "B".into()];
        item.item_type = 2;
        item.entity_model = Some(NodeRef::Internal(Box::new(surface)));
        item.waypoint = true;
    }
    assert_eq!(node.game_version(), GameVersion::MP4 | GameVersion::TM2020);

    let mut gbx = Gbx::new(node);
    let bytes = gbx.write(&registry, &WriteSettings::default()).unwrap();
    assert_eq!(gbx.header.num_nodes, 2);

    let mut parsed = Gbx::parse(&bytes, &registry, &ReadSettings::default()).unwrap();
    let heavy: Vec<bool> = parsed.header_chunks().map(|c| c.heavy).collect();
    assert_eq!(heavy, [false, true]);

    let item = parsed.node().unwrap().get::<CGameItemModel>().unwrap();
    assert_eq!(item.collector.icon.pixels.len(), 8);
    assert_eq!(item.skins, ["A", "B"]);
    assert!(item.waypoint);
    let surface = item.entity_model.as_ref().and_then(NodeRef::node).unwrap();
    let data = surface.get::<CPlugSurface>().unwrap();
    assert_eq!(data.materials[1], Id::name("Grass"));
    assert_eq!(data.skin.as_deref(), Some("Dirt"));

    assert_eq!(parsed.write(&registry, &WriteSettings::default()).unwrap(), bytes);
}

#[test]
fn user_data_total_matches_entries() {
    let registry = engines::builtin().unwrap();
    let bytes = legacy_challenge();
    let mut gbx = Gbx::parse(&bytes, &registry, &ReadSettings::default()).unwrap();
    let out = gbx.write(&registry, &WriteSettings { epoch: Some(Epoch::Latest) }).unwrap();

    // "GBX" + version + 4 flag bytes + class id
    let at = 3 + 2 + 4 + 4;
    let field = |i: usize| u32::from_le_bytes(out[at + i * 4..at + i * 4 + 4].try_into().unwrap());
    let (total, count, id, size) = (field(0), field(1), field(2), field(3));
    assert_eq!(count, 1);
    assert_eq!(id, 0x0304_3003);
    assert_eq!(size & HEAVY_BIT, 0);
    assert_eq!(total, 8 * count + 4 + size);
}

#[test]
fn deep_clone_shares_nothing() {
    let registry = engines::builtin().unwrap();
    let gbx = Gbx::parse(&legacy_challenge(), &registry, &ReadSettings::default()).unwrap();
    let original = gbx.into_node().unwrap();

    let mut copy = original.clone();
    copy.get_mut::<CGameCtnChallenge>().unwrap().map_name = "Changed".into();
    if let Some(NodeRef::Internal(parameters)) = &mut copy.get_mut::<CGameCtnChallenge>().unwrap().parameters {
        parameters.get_mut::<CGameCtnChallengeParameters>().unwrap().tips[0].clear();
    }
    copy.chunks.remove(0x0304_300D);

    let map = original.get::<CGameCtnChallenge>().unwrap();
    assert_eq!(map.map_name, "My map");
    let parameters = map.parameters.as_ref().and_then(NodeRef::node).unwrap();
    assert_eq!(parameters.get::<CGameCtnChallengeParameters>().unwrap().tips[0], "bronze");
    assert!(original.chunks.find(0x0304_300D).is_some());
}

#[test]
fn shared_node_index_is_rejected() {
    let registry = engines::builtin().unwrap();
    let mut body = Writer::new();
    for _ in 0..2 {
        body.write_u32(0x0304_3011);
        body.write_i32(1);
        body.write_u32(0x0305_B000);
        body.write_u32(0x0305_B001);
        for _ in 0..4 {
            body.write_string("").unwrap();
        }
        body.write_u32(FACADE);
        body.write_u32(0);
    }
    body.write_u32(FACADE);
    let bytes = gbx_file(CGAME_CTN_CHALLENGE, &[], 2, &body.into_bytes());

    let err = Gbx::parse(&bytes, &registry, &ReadSettings::default()).unwrap_err();
    assert!(matches!(err, Error::SharedNodeRef { index: 1 }));
}

#[test]
fn read_only_class_refuses_to_write() {
    let registry = engines::builder()
        .class(ClassDescriptor::new(0x0309_3000, "CGameCtnReplayRecord").write_not_supported())
        .build()
        .unwrap();
    let bytes = gbx_file(0x0309_3000, &[(0x0309_3002, false, vec![1, 2])], 1, &[0xAB; 16]);

    let mut gbx = Gbx::parse(&bytes, &registry, &ReadSettings::default()).unwrap();
    assert_eq!(gbx.raw_body(), Some(&[0xAB; 16][..]));
    assert!(matches!(
        gbx.write(&registry, &WriteSettings::default()),
        Err(Error::ClassWriteNotSupported { class_id: 0x0309_3000 })
    ));

    // Without the flag the same file is copied through untouched.
    let plain = engines::builtin().unwrap();
    let mut gbx = Gbx::parse(&bytes, &plain, &ReadSettings::default()).unwrap();
    assert_eq!(gbx.write(&plain, &WriteSettings::default()).unwrap(), bytes);
}

#[test]
fn independent_streams_in_parallel() {
    let registry = engines::builtin().unwrap();
    let files = [
        (legacy_challenge(), Epoch::Epoch2006),
        (collector_2008(), Epoch::Epoch2008),
        (
            gbx_file(CMW_NOD, &[], 1, &[0x00, 0x10, 0x00, 0x01, 0x01, 0xDE, 0xCA, 0xFA]),
            Epoch::Latest,
        ),
    ];

    std::thread::scope(|s| {
        for _ in 0..4 {
            for (bytes, epoch) in &files {
                let registry = &registry;
                s.spawn(move || {
                    let mut gbx = Gbx::parse(bytes, registry, &ReadSettings::default()).unwrap();
                    assert_eq!(gbx.epoch(), *epoch);
                    assert_eq!(&gbx.write(registry, &WriteSettings::default()).unwrap(), bytes);
                });
            }
        }
    });
}

#[test]
fn header_only_read_skips_the_body() {
    let registry = engines::builtin().unwrap();
    let bytes = legacy_challenge();
    let settings = ReadSettings {
        header_only: true,
        ..ReadSettings::default()
    };
    let mut gbx = Gbx::parse(&bytes, &registry, &settings).unwrap();
    let map = gbx.node().unwrap().get::<CGameCtnChallenge>().unwrap();
    assert_eq!(map.map_name, "My map");
    assert!(map.parameters.is_none());
    assert!(gbx.raw_body().is_some());
    assert_eq!(gbx.write(&registry, &WriteSettings::default()).unwrap(), bytes);
}

#[test]
fn registries_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Registry>();
    assert_send_sync::<Gbx>();
}

#[test]
fn chained_legacy_family_reaches_the_canonical_class() {
    let registry = engines::builder().remap(0x0A00_1000, 0x2400_3000).build().unwrap();
    assert_eq!(registry.wrap(0x0A00_100D), 0x0304_300D);

    let mut b = Writer::new();
    b.write_u32(0x0A00_1018);
    b.write_u32(SKIP);
    b.write_u32(8);
    b.write_bool(true);
    b.write_u32(3);
    b.write_u32(FACADE);
    let bytes = b.into_bytes();

    let settings = ReadSettings::default();
    let mut node = registry.construct_instance(CGAME_CTN_CHALLENGE).unwrap();
    let mut r = GbxReader::new(&bytes, &registry, &settings);
    stream::read_chunks(&mut node, &mut r).unwrap();
    assert_eq!(r.epoch(), Epoch::Epoch2006);

    let laps = node.chunks.find(0x0304_3018).unwrap();
    assert!(!laps.is_opaque());
    let map = node.get::<CGameCtnChallenge>().unwrap();
    assert!(map.lapped);
    assert_eq!(map.lap_count, 3);
}

#[test]
fn typed_and_raw_user_data_share_one_table() {
    let registry = engines::builtin().unwrap();

    let mut description = Writer::new();
    description.write_u8(1);
    fresh_names(&mut description, &["uid123", "Alpine", "Nadeo"]);
    description.write_string("Mixed").unwrap();
    description.write_u8(0);
    description.write_bool(true);
    let description = description.into_bytes();
    let thumbnail = vec![0x5A; 12];

    let mut body = Writer::new();
    body.write_u32(FACADE);
    let bytes = gbx_file(
        CGAME_CTN_CHALLENGE,
        &[
            (0x0304_3003, false, description.clone()),
            (0x0304_3007, true, thumbnail.clone()),
        ],
        1,
        &body.into_bytes(),
    );

    let mut gbx = Gbx::parse(&bytes, &registry, &ReadSettings::default()).unwrap();
    let entries: Vec<(u32, &str, bool)> = gbx
        .header_chunks()
        .map(|c| (c.id, c.kind.name(), c.heavy))
        .collect();
    assert_eq!(
        entries,
        [(0x0304_3003, "read-write", false), (0x0304_3007, "opaque", true)]
    );
    assert!(gbx.node().unwrap().get::<CGameCtnChallenge>().unwrap().locked);

    let out = gbx.write(&registry, &WriteSettings::default()).unwrap();
    assert_eq!(out, bytes);

    let at = 3 + 2 + 4 + 4;
    let field = |i: usize| u32::from_le_bytes(out[at + i * 4..at + i * 4 + 4].try_into().unwrap());
    let sizes = (field(3) & !HEAVY_BIT) + (field(5) & !HEAVY_BIT);
    assert_eq!(field(5) & HEAVY_BIT, HEAVY_BIT);
    assert_eq!(field(0), 8 * field(1) + 4 + sizes);
    assert_eq!(sizes as usize, description.len() + thumbnail.len());
}
