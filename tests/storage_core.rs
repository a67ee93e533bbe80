//! Integration tests exercising the repository façade against the
//! simulation backend, the way a hosted test harness would. These cover
//! fill-and-compact, TMR voting, tombstone-survives-reboot, purge, and
//! reset idempotence.

use nanosat_storage_core::config::MediaGeometry;
use nanosat_storage_core::flight_plan::FlightPlanEntry;
use nanosat_storage_core::media::simulation::SimulatedMedia;
use nanosat_storage_core::payload::PayloadSchema;
use nanosat_storage_core::repository::Repository;
use nanosat_storage_core::value32::Value32;

type Media = SimulatedMedia<512, 2048>;

const FPL_QUEUE_INDEX: u32 = 0;

fn geometry(fp_max_entries: u32) -> MediaGeometry {
    MediaGeometry::new(0, fp_max_entries, 1, 1)
        .with_section(2048)
        .with_page(512)
        .with_fram_size(1024)
}

fn repo(g: MediaGeometry) -> Repository<Media, Media> {
    let flash = Media::new(2048 * 8, 0);
    let fram = Media::new(2048, 1024);
    Repository::storage_init(g, flash, fram)
}

// N_max=4: three live entries plus the newly-inserted fourth must all fit
// in one section for this compaction-then-succeed sequence to be
// reachable at all (N_max=3 could never hold four simultaneously live
// entries).
#[test]
fn fill_and_compact() {
    let g = geometry(4);
    let repo = repo(g);
    repo.storage_table_status_init(4, &[], true).unwrap();
    repo.storage_table_flight_plan_init(4, true, FPL_QUEUE_INDEX).unwrap();

    for t in [100, 200, 300] {
        let (entry, _) = FlightPlanEntry::new(t, 0, 0, 1, "ping", "");
        repo.flight_plan_set(&entry).unwrap();
    }
    repo.flight_plan_delete_row(200).unwrap();

    let (e400, _) = FlightPlanEntry::new(400, 0, 0, 1, "ping", "");
    repo.flight_plan_set(&e400).unwrap();
    let (e500, _) = FlightPlanEntry::new(500, 0, 0, 1, "ping", "");
    repo.flight_plan_set(&e500).unwrap();

    assert!(repo.flight_plan_get_st(200).unwrap().is_none());
    for t in [100, 300, 400, 500] {
        assert!(repo.flight_plan_get_st(t).unwrap().is_some(), "expected {} to survive compaction", t);
    }
}

#[test]
fn tmr_voting_tolerates_single_corruption_but_not_double() {
    let g = geometry(0).with_triple_write(true);
    let repo = repo(g);
    repo.storage_table_status_init(8, &[], true).unwrap();
    repo.status_set_value_idx(7, Value32::from_i32(0xA5)).unwrap();
    assert_eq!(repo.status_get_value_idx(7).unwrap().as_i32(), 0xA5);

    let (flash, mut fram) = repo.into_media();

    // Flip the first physical copy only; majority among copies 2 and 3 wins.
    use nanosat_storage_core::media::FramMedia;
    fram.fram_write(7 * 4, &0u32.to_le_bytes()).unwrap();

    let repo = Repository::storage_init(g, flash, fram);
    repo.storage_table_status_init(8, &[], false).unwrap();
    assert_eq!(repo.status_get_value_idx(7).unwrap().as_i32(), 0xA5);

    let (flash, mut fram) = repo.into_media();
    fram.fram_write((8 + 7) * 4, &1u32.to_le_bytes()).unwrap();
    let repo = Repository::storage_init(g, flash, fram);
    repo.storage_table_status_init(8, &[], false).unwrap();
    assert!(repo.status_get_value_idx(7).is_err());
}

#[test]
fn tombstone_survives_reboot() {
    let g = geometry(4);
    let repo = repo(g);
    repo.storage_table_status_init(4, &[], true).unwrap();
    repo.storage_table_flight_plan_init(4, true, FPL_QUEUE_INDEX).unwrap();

    let (e100, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
    let (e200, _) = FlightPlanEntry::new(200, 0, 0, 1, "ping", "");
    repo.flight_plan_set(&e100).unwrap();
    repo.flight_plan_set(&e200).unwrap();
    repo.flight_plan_delete_row(100).unwrap();

    let (flash, fram) = repo.into_media();
    let repo = Repository::storage_init(g, flash, fram);
    repo.storage_table_status_init(4, &[], false).unwrap();
    repo.storage_table_flight_plan_init(4, false, FPL_QUEUE_INDEX).unwrap();

    assert!(repo.flight_plan_get_st(100).unwrap().is_none());
    assert!(repo.flight_plan_get_st(200).unwrap().is_some());
    // The second lookup above already decremented fpl_queue by one;
    // recount so the assertion reflects what a fresh purge would see.
    repo.fp_purge(i32::MIN).unwrap();
    assert_eq!(repo.status_get_value_idx(FPL_QUEUE_INDEX).unwrap().as_i32(), 1);
}

#[test]
fn purge_removes_only_due_entries() {
    let g = geometry(4);
    let repo = repo(g);
    repo.storage_table_status_init(4, &[], true).unwrap();
    repo.storage_table_flight_plan_init(4, true, FPL_QUEUE_INDEX).unwrap();

    for t in [500, 1500, 2500] {
        let (entry, _) = FlightPlanEntry::new(t, 0, 0, 1, "ping", "");
        repo.flight_plan_set(&entry).unwrap();
    }

    let purged = repo.fp_purge(1000).unwrap();
    assert_eq!(purged, 1);
    assert!(repo.flight_plan_get_st(500).unwrap().is_none());
    assert_eq!(repo.status_get_value_idx(FPL_QUEUE_INDEX).unwrap().as_i32(), 2);
}

#[test]
fn reset_is_idempotent() {
    let g = geometry(4);
    let repo = repo(g);
    repo.storage_table_status_init(4, &[], true).unwrap();
    repo.storage_table_flight_plan_init(4, true, FPL_QUEUE_INDEX).unwrap();

    let (entry, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
    repo.flight_plan_set(&entry).unwrap();

    repo.flight_plan_reset().unwrap();
    repo.flight_plan_reset().unwrap();

    for k in 0..4 {
        assert!(repo.flight_plan_get_idx(k).unwrap().is_none());
    }
    assert_eq!(repo.status_get_value_idx(FPL_QUEUE_INDEX).unwrap().as_i32(), 0);
}

// A record whose size exceeds the configured page size can never be
// placed without straddling. `PayloadSchema::new` only bounds size
// against a fixed 512-byte ceiling, not against whatever `PAGE` a given
// geometry configures, so this is the one case where the address
// formula's own alignment check legitimately rejects a write.
#[test]
fn record_larger_than_the_configured_page_is_rejected() {
    type SmallMedia = SimulatedMedia<256, 1024>;
    let g = MediaGeometry::new(0, 0, 1, 1).with_section(1024).with_page(256).with_fram_size(256);
    let flash = SmallMedia::new(1024 * 8, 0);
    let fram = SmallMedia::new(1024, 256);
    let repo = Repository::storage_init(g, flash, fram);

    let schema = PayloadSchema::new(300, 0, "%f", "x").unwrap();
    repo.storage_table_payload_init(core::slice::from_ref(&schema), true).unwrap();
    assert!(repo.payload_set_data(0, 0, &[0u8; 300]).is_err());
}
