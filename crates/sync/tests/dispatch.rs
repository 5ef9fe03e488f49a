use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use scenelink::{
    Command, Dispatcher, EntityKind, MemoryHost, Outcome, Pose, PrimitiveKind, PrimitiveParams,
    SceneArchive, SceneError, ShapeFrame,
};

fn cube_a() -> Command {
    Command::AddRigidBodyPrimitive {
        name: "cube_a".to_string(),
        primitive_kind: PrimitiveKind::Cube,
        params: PrimitiveParams {
            size: 1.0,
            location: Vec3::new(0.0, 0.1, 0.0),
            scale: Vec3::new(0.2, 0.2, 1.0),
            ..PrimitiveParams::default()
        },
    }
}

fn pose_at(frame: u32) -> Command {
    Command::UpdateRigidBodyPose {
        name: "cube_a".to_string(),
        pose: Pose::new(
            Vec3::new(0.0, 0.0, 0.1 + 0.01 * frame as f32),
            Quat::from_rotation_z(frame as f32 * 0.05),
        ),
        frame_index: frame,
    }
}

fn sheet(z: f32) -> Vec<Vec3> {
    vec![
        Vec3::new(0.0, 0.0, z),
        Vec3::new(1.0, 0.0, z),
        Vec3::new(1.0, 1.0, z),
        Vec3::new(0.0, 1.0, z),
    ]
}

fn cloud(frame_index: u32, prev_frame_index: Option<u32>) -> Command {
    Command::SetPointCloud(ShapeFrame {
        name: "cloud".to_string(),
        vertices: sheet(frame_index as f32 * 0.1),
        faces: Vec::new(),
        frame_index,
        prev_frame_index,
    })
}

fn mesh(frame_index: u32, prev_frame_index: Option<u32>, vertices: Vec<Vec3>) -> Command {
    let faces = if vertices.len() >= 4 {
        vec![vec![0, 1, 2, 3]]
    } else {
        vec![vec![0, 1, 2]]
    };
    Command::SetDeformableMesh(ShapeFrame {
        name: "sheet".to_string(),
        vertices,
        faces,
        frame_index,
        prev_frame_index,
    })
}

#[test]
fn cube_with_ten_poses() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());
    dispatcher.dispatch(cube_a()).unwrap();

    for frame in (0..100).step_by(10) {
        dispatcher.dispatch(pose_at(frame)).unwrap();
    }

    let host = dispatcher.host();
    let object = host.object_by_name("cube_a").unwrap();
    assert_eq!(object.location_keys.len(), 10);
    assert_eq!(object.rotation_keys.len(), 10);
    let keyed: Vec<u32> = object.location_keys.keys().copied().collect();
    let expected: Vec<u32> = (0..100).step_by(10).collect();
    assert_eq!(keyed, expected);

    let last = object.location_keys[&90];
    assert!((last.z - 1.0).abs() < 1e-5);

    // Scale is baked into the cube geometry.
    let max_z = object.vertices.iter().map(|v| v.z).fold(f32::MIN, f32::max);
    assert!((max_z - 0.5).abs() < 1e-5);

    let entity = dispatcher.registry().lookup("cube_a").unwrap();
    assert_eq!(entity.kind, EntityKind::RigidBody);
    assert_eq!(entity.last_frame_index, Some(90));
}

#[test]
fn repeated_pose_at_same_frame_keeps_last() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());
    dispatcher.dispatch(cube_a()).unwrap();

    dispatcher.dispatch(pose_at(10)).unwrap();
    dispatcher
        .dispatch(Command::UpdateRigidBodyPose {
            name: "cube_a".to_string(),
            pose: Pose::new(Vec3::splat(5.0), Quat::IDENTITY),
            frame_index: 10,
        })
        .unwrap();

    let object = dispatcher.host().object_by_name("cube_a").unwrap();
    assert_eq!(object.location_keys.len(), 1);
    assert_eq!(object.location_keys[&10], Vec3::splat(5.0));
    assert_eq!(object.rotation_keys[&10], Quat::IDENTITY);
}

#[test]
fn cloud_two_frames_then_finish() {
    let dir = std::env::temp_dir().join(format!("scenelink-dispatch-{}", std::process::id()));
    let mut dispatcher = Dispatcher::new(MemoryHost::with_output_dir(&dir));

    dispatcher.dispatch(cloud(0, None)).unwrap();
    dispatcher.dispatch(cloud(10, Some(0))).unwrap();
    let outcome = dispatcher
        .dispatch(Command::FinishAnimation {
            experiment_name: "test_10".to_string(),
            end_frame_index: 100,
        })
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Finished {
            experiment_name: "test_10".to_string(),
            end_frame_index: 100
        }
    );

    let host = dispatcher.host();
    assert_eq!(host.frame_range(), Some((0, 100)));
    assert_eq!(host.persisted(), ["test_10".to_string()]);

    let first = host.shape_key_by_tag("cloud", "frame_0").unwrap();
    let second = host.shape_key_by_tag("cloud", "frame_10").unwrap();
    assert_eq!(first.weight_at(0), 1.0);
    assert_eq!(first.weight_at(10), 0.0);
    assert_eq!(second.weight_at(0), 0.0);
    assert_eq!(second.weight_at(10), 1.0);

    let archive = SceneArchive::read(&dir.join("test_10.scene")).unwrap();
    assert_eq!((archive.frame_start, archive.frame_end), (0, 100));
    let object = archive.object("cloud").unwrap();
    assert_eq!(object.shape_keys.len(), 2);
    assert_eq!(object.shape_keys[1].tag, "frame_10");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn shape_key_chain_shows_exactly_one_key() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());

    dispatcher.dispatch(cloud(0, None)).unwrap();
    dispatcher.dispatch(cloud(10, Some(0))).unwrap();
    dispatcher.dispatch(cloud(20, Some(10))).unwrap();

    let host = dispatcher.host();
    let keys: Vec<_> = ["frame_0", "frame_10", "frame_20"]
        .iter()
        .map(|tag| host.shape_key_by_tag("cloud", tag).unwrap())
        .collect();

    for (i, frame) in [0u32, 10, 20].into_iter().enumerate() {
        for (j, key) in keys.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_eq!(key.weight_at(frame), expected, "key {j} at frame {frame}");
        }
    }

    assert_eq!(keys[0].weight_keys, BTreeMap::from([(0, 1.0), (10, 0.0)]));
    assert_eq!(
        keys[1].weight_keys,
        BTreeMap::from([(0, 0.0), (10, 1.0), (20, 0.0)])
    );
    assert_eq!(keys[2].weight_keys, BTreeMap::from([(10, 0.0), (20, 1.0)]));

    assert_eq!(
        dispatcher.registry().lookup("cloud").unwrap().shape_key_history,
        vec![0, 10, 20]
    );
}

#[test]
fn replayed_middle_frame_keeps_one_key_showing() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());

    dispatcher.dispatch(cloud(0, None)).unwrap();
    dispatcher.dispatch(cloud(10, Some(0))).unwrap();
    dispatcher.dispatch(cloud(20, Some(10))).unwrap();
    dispatcher.dispatch(cloud(10, Some(0))).unwrap();

    let host = dispatcher.host();
    let object = host.object_by_name("cloud").unwrap();
    assert_eq!(object.shape_keys.len(), 4);

    for frame in [0u32, 10, 20] {
        let shown: Vec<&str> = object
            .shape_keys
            .iter()
            .map(|&key| host.shape_key(key).unwrap())
            .filter(|key| key.weight_at(frame) == 1.0)
            .map(|key| key.tag.as_str())
            .collect();
        assert_eq!(shown.len(), 1, "frame {frame} shows {shown:?}");
        assert_eq!(shown[0], format!("frame_{frame}"));
    }

    let replacement = host.shape_key(object.shape_keys[3]).unwrap();
    assert_eq!(
        replacement.weight_keys,
        BTreeMap::from([(0, 0.0), (10, 1.0), (20, 0.0)])
    );
    assert_eq!(
        dispatcher.registry().lookup("cloud").unwrap().shape_key_history,
        vec![0, 10, 20]
    );
}

#[test]
fn identical_pose_repeated_matches_single_pose() {
    let mut once = Dispatcher::new(MemoryHost::new());
    once.dispatch(cube_a()).unwrap();
    once.dispatch(pose_at(30)).unwrap();

    let mut repeated = Dispatcher::new(MemoryHost::new());
    repeated.dispatch(cube_a()).unwrap();
    for _ in 0..5 {
        repeated.dispatch(pose_at(30)).unwrap();
    }

    let a = once.host().object_by_name("cube_a").unwrap();
    let b = repeated.host().object_by_name("cube_a").unwrap();
    assert_eq!(a.location_keys, b.location_keys);
    assert_eq!(a.rotation_keys, b.rotation_keys);
    assert_eq!(a.pose, b.pose);

    let a = once.registry().lookup("cube_a").unwrap();
    let b = repeated.registry().lookup("cube_a").unwrap();
    assert_eq!(a.pose, b.pose);
    assert_eq!(a.last_frame_index, b.last_frame_index);
}

#[test]
fn finish_sets_frame_range_once() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());
    dispatcher.dispatch(cube_a()).unwrap();

    let finish = Command::FinishAnimation {
        experiment_name: "exp".to_string(),
        end_frame_index: 100,
    };
    dispatcher.dispatch(finish.clone()).unwrap();
    assert_eq!(dispatcher.host().frame_range(), Some((0, 100)));
    assert_eq!(dispatcher.host().frame_range_writes(), 1);

    let err = dispatcher.dispatch(finish).unwrap_err();
    assert!(matches!(err, SceneError::Finished));
    assert_eq!(dispatcher.host().frame_range_writes(), 1);
    assert_eq!(dispatcher.host().persisted(), ["exp".to_string()]);
}

#[test]
fn point_cloud_is_created_once() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());

    let first = dispatcher.dispatch(cloud(0, None)).unwrap();
    let second = dispatcher.dispatch(cloud(10, Some(0))).unwrap();

    assert!(matches!(first, Outcome::Applied { created: true, .. }));
    assert!(matches!(second, Outcome::Applied { created: false, .. }));
    assert_eq!(dispatcher.host().object_count(), 1);
    assert_eq!(dispatcher.registry().count_of(EntityKind::PointCloud), 1);
}

#[test]
fn deformable_geometry_is_replaced() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());

    dispatcher.dispatch(mesh(0, None, sheet(0.0))).unwrap();
    dispatcher
        .dispatch(mesh(10, Some(0), vec![Vec3::ZERO, Vec3::X, Vec3::Y]))
        .unwrap();

    let object = dispatcher.host().object_by_name("sheet").unwrap();
    assert_eq!(object.vertices.len(), 3);
    assert_eq!(object.faces, vec![vec![0, 1, 2]]);
    assert_eq!(object.shape_keys.len(), 2);

    let first = dispatcher.host().shape_key_by_tag("sheet", "frame_0").unwrap();
    assert_eq!(first.vertices.len(), 4);
}

#[test]
fn replayed_frame_is_idempotent_for_history() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());

    dispatcher.dispatch(cloud(0, None)).unwrap();
    dispatcher.dispatch(cloud(0, None)).unwrap();

    let entity = dispatcher.registry().lookup("cloud").unwrap();
    assert_eq!(entity.shape_key_history, vec![0]);
    assert_eq!(entity.shape_key_count(), 1);

    let host = dispatcher.host();
    let object = host.object_by_name("cloud").unwrap();
    let shown: Vec<f32> = object
        .shape_keys
        .iter()
        .map(|&key| host.shape_key(key).unwrap().weight_at(0))
        .collect();
    assert_eq!(shown, vec![0.0, 1.0]);
}

#[test]
fn unknown_entity_leaves_scene_unchanged() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());
    dispatcher.dispatch(cube_a()).unwrap();

    let err = dispatcher
        .dispatch(Command::UpdateRigidBodyPose {
            name: "cube_b".to_string(),
            pose: Pose::IDENTITY,
            frame_index: 0,
        })
        .unwrap_err();
    assert!(matches!(err, SceneError::UnknownEntity { .. }));

    assert_eq!(dispatcher.registry().len(), 1);
    assert!(!dispatcher.registry().contains("cube_b"));
    let object = dispatcher.host().object_by_name("cube_a").unwrap();
    assert!(object.location_keys.is_empty());

    // The stream carries on after a rejected command.
    dispatcher.dispatch(pose_at(0)).unwrap();
}

#[test]
fn name_cannot_change_kind() {
    let mut dispatcher = Dispatcher::new(MemoryHost::new());
    dispatcher.dispatch(cloud(0, None)).unwrap();

    let err = dispatcher
        .dispatch(Command::SetDeformableMesh(ShapeFrame {
            name: "cloud".to_string(),
            vertices: sheet(0.0),
            faces: Vec::new(),
            frame_index: 10,
            prev_frame_index: Some(0),
        }))
        .unwrap_err();

    assert!(matches!(
        err,
        SceneError::KindMismatch {
            expected: EntityKind::DeformableMesh,
            found: EntityKind::PointCloud,
            ..
        }
    ));
    assert_eq!(dispatcher.host().object_count(), 1);
}
