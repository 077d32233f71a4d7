mod common;

use anyhow::Result;
use common::*;
use nesium_ppu::{BankUsage, Error, Ppu, PpuState, Region, SaveState, Snapshot, SnapshotMeta};

fn busy_ppu() -> (Ppu, ScriptedHost) {
    let (mut ppu, mut host) = powered(Region::Ntsc);
    let sprites = [[50, SOLID_TILE, 0x00, 100], [90, SOLID_TILE, 0x41, 20]];
    load_scene(&mut ppu, &mut host, SOLID_TILE, &sprites, 0x1E);
    ppu.write_register(0x2000, 0x80, &mut host);
    run_cycles(&mut ppu, &mut host, 123_457);
    (ppu, host)
}

#[test]
fn postcard_round_trip_is_byte_identical() -> Result<()> {
    let (ppu, _host) = busy_ppu();
    let snapshot = ppu.save(SnapshotMeta {
        tick: ppu.frame_count(),
        ..SnapshotMeta::default()
    })?;
    let bytes = snapshot.to_postcard_bytes()?;

    let decoded: Snapshot<PpuState> = Snapshot::from_postcard_bytes(&bytes)?;
    assert_eq!(decoded, snapshot);
    assert_eq!(decoded.meta.format_version, Ppu::FORMAT_VERSION);
    assert_eq!(decoded.to_postcard_bytes()?, bytes);

    let state = PpuState::from_postcard_bytes(&snapshot.data.to_postcard_bytes()?)?;
    assert_eq!(state.frame_count(), ppu.frame_count());
    assert_eq!(state.region(), Region::Ntsc);
    Ok(())
}

#[test]
fn restored_core_continues_identically() -> Result<()> {
    let (mut uninterrupted, mut host) = busy_ppu();
    let snapshot = uninterrupted.save(SnapshotMeta::default())?;

    let mut restored = Ppu::new(Region::Ntsc);
    let mut restored_host = host.clone();
    restored.load(&snapshot)?;

    for _ in 0..2 {
        run_frames(&mut uninterrupted, &mut host, 1);
        run_frames(&mut restored, &mut restored_host, 1);
    }

    assert_eq!(restored.frame().render(), uninterrupted.frame().render());
    assert_eq!(restored.scanline(), uninterrupted.scanline());
    assert_eq!(restored.cycle(), uninterrupted.cycle());
    assert_eq!(
        restored.save(SnapshotMeta::default())?.data,
        uninterrupted.save(SnapshotMeta::default())?.data
    );
    assert_eq!(restored_host.history, host.history);
    Ok(())
}

#[test]
fn layout_mismatch_is_rejected() -> Result<()> {
    let (ppu, _host) = busy_ppu();
    let snapshot = ppu.save(SnapshotMeta::default())?;

    let mut target = Ppu::new(Region::Ntsc);
    target.set_bank_usage(BankUsage {
        name_tables: 2,
        pattern_vram: true,
    })?;
    let before = target.save(SnapshotMeta::default())?;

    let err = target.load(&snapshot).expect_err("layout differs");
    assert!(matches!(err, Error::StateLayout { bank: "name table", .. }));
    assert_eq!(target.save(SnapshotMeta::default())?, before);
    Ok(())
}

#[test]
fn truncated_bytes_fail_to_decode() -> Result<()> {
    let (ppu, _host) = busy_ppu();
    let bytes = ppu.save(SnapshotMeta::default())?.data.to_postcard_bytes()?;
    assert!(PpuState::from_postcard_bytes(&bytes[..bytes.len() / 2]).is_err());
    Ok(())
}
