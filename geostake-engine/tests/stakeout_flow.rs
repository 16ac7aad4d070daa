use geostake_core::entity::{CadEntity, bounds_of};
use geostake_core::geometry::Point2;
use geostake_engine::alignment::{Alignment, AlignmentVertex, point_from_chainage_offset};
use geostake_engine::fix::{FixType, Observation};
use geostake_engine::stakeout::{
    StakeStatus, StakeTarget, StakeoutInputs, StakeoutState, Tolerances, accept, recompute,
};
use geostake_engine::transform::{CoordinateTransform, LocalPlaneProjector};

fn road() -> Alignment {
    Alignment::new(vec![
        AlignmentVertex::new(Point2::new(0.0, 0.0), Some(10.0)),
        AlignmentVertex::new(Point2::new(60.0, 80.0), Some(12.0)),
        AlignmentVertex::new(Point2::new(160.0, 80.0), Some(11.0)),
        AlignmentVertex::new(Point2::new(160.0, 200.0), Some(15.0)),
    ])
    .expect("构造线路失败")
}

#[test]
fn chainage_offset_round_trip_reproduces_query() {
    let alignment = road();
    let queries = [
        Point2::new(20.0, 20.0),
        Point2::new(35.0, 50.0),
        Point2::new(100.0, 83.0),
        Point2::new(150.0, 150.0),
        Point2::new(171.0, 130.0),
    ];
    for query in queries {
        let projection = alignment.project(query).expect("投影失败");
        let restored = point_from_chainage_offset(&alignment, projection.chain_m, projection.offset_m);
        assert!(
            restored.point.distance_to(query) < 1e-9,
            "query {query:?} restored as {:?}",
            restored.point
        );
    }
}

#[test]
fn chain_is_monotonic_along_the_path() {
    let alignment = road();
    let stations = alignment.stations(5.0).expect("桩点生成失败");
    let mut previous = -1.0;
    for station in &stations {
        let projection = alignment.project(station.position()).expect("投影失败");
        assert!(
            projection.chain_m + 1e-9 >= previous,
            "chain went backwards at {}",
            station.chain_m
        );
        previous = projection.chain_m;
    }
    assert!((previous - alignment.total_length()).abs() < 1e-9);
}

#[test]
fn live_fix_feed_drives_point_stakeout_to_saved() {
    let projector = LocalPlaneProjector::with_false_origin(41.0, 29.0, 5000.0, 5000.0)
        .expect("投影原点无效");
    let (lat, lon) = projector.inverse(5012.0, 5007.5).expect("反算失败");
    let target = StakeTarget::Point {
        name: "BM7".into(),
        position: Point2::new(5012.0, 5007.5),
        elevation: Some(120.0),
    };
    let tolerances = Tolerances::default();

    let approach = [(4990.0, 4995.0), (5005.0, 5003.0), (5011.98, 5007.47)];
    let mut state = StakeoutState::default();
    let mut statuses = Vec::new();
    for (step, (e, n)) in approach.into_iter().enumerate() {
        let (lat, lon) = projector.inverse(e, n).expect("反算失败");
        let obs = Observation {
            epoch_ms: 1_000 * step as u64,
            ..Observation::at(FixType::RtkFix, lat, lon, Some(120.01))
        };
        state = recompute(
            state,
            &StakeoutInputs {
                observation: Some(&obs),
                target: Some(&target),
                tolerances: &tolerances,
                transform: &projector,
            },
        );
        statuses.push(state.status);
    }
    assert_eq!(
        statuses,
        vec![
            StakeStatus::OutOfTolerance,
            StakeStatus::OutOfTolerance,
            StakeStatus::WithinTolerance
        ]
    );

    let record = accept(&mut state).expect("保存失败");
    assert_eq!(record.name, "BM7_STK");
    assert!((record.latitude.expect("纬度") - lat).abs() < 1e-6);
    assert!((record.longitude.expect("经度") - lon).abs() < 1e-6);
    assert_eq!(state.status, StakeStatus::Saved);
}

#[test]
fn losing_fix_returns_to_no_fix() {
    let target = StakeTarget::Entity {
        entity: CadEntity::line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "ROAD"),
    };
    let tolerances = Tolerances::default();
    let projector = LocalPlaneProjector::new(0.0, 0.0).expect("投影原点无效");
    let (lat, lon) = projector.inverse(5.0, 0.02).expect("反算失败");
    let good = Observation::at(FixType::RtkFloat, lat, lon, None);
    let state = recompute(
        StakeoutState::default(),
        &StakeoutInputs {
            observation: Some(&good),
            target: Some(&target),
            tolerances: &tolerances,
            transform: &projector,
        },
    );
    assert_eq!(state.status, StakeStatus::WithinTolerance);

    let lost = Observation {
        lat_deg: None,
        ..good.clone()
    };
    let state = recompute(
        state,
        &StakeoutInputs {
            observation: Some(&lost),
            target: Some(&target),
            tolerances: &tolerances,
            transform: &projector,
        },
    );
    assert_eq!(state.status, StakeStatus::NoFix);
    assert!(state.position.is_none());
    assert!(state.result.checks.is_empty());
}

#[test]
fn bounds_contain_every_snap_vertex() {
    let entities = vec![
        CadEntity::polyline(
            [Point2::new(-5.0, 2.0), Point2::new(3.0, 9.0), Point2::new(8.0, -4.0)],
            false,
            "A",
        ),
        CadEntity::circle(Point2::new(20.0, 20.0), 3.0, "B"),
        CadEntity::text(Point2::new(-12.0, 30.0), "NOTE", 2.5, "T"),
    ];
    let bounds = bounds_of(&entities);
    for entity in &entities {
        for vertex in entity.snap_vertices() {
            assert!(bounds.contains(vertex), "{vertex:?} outside {bounds:?}");
        }
    }
}
