use std::rc::Rc;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Quat, Vec3};
use immersive_sphere::content::{Content, ImageContent};
use immersive_sphere::render::{RenderList, ShaderProgram, SphereMesh, SPHERE_SEGMENTS};
use immersive_sphere::{Scene, SphereSettings};

fn bench_mesh(c: &mut Criterion) {
    c.bench_function("sphere_mesh_generate", |b| {
        b.iter(|| {
            SphereMesh::generate(
                black_box(Vec3::new(640.0, 360.0, 10.0)),
                black_box(300.0),
                SPHERE_SEGMENTS,
                2100.0,
                1050.0,
            )
        })
    });
}

fn bench_scene(c: &mut Criterion) {
    let mut scene = Scene::with_shaders(
        SphereSettings::default(),
        Arc::new(ShaderProgram::offaxis()),
        Arc::new(ShaderProgram::spherize()),
    );
    let content: Rc<dyn Content> = Rc::new(ImageContent::solid(64, 64, [255, 255, 255, 255]));
    for i in 0..16 {
        let id = scene.create_object();
        if let Some(object) = scene.object_mut(id) {
            object.set_texture(&content);
            object.rotation = Quat::from_rotation_z(i as f32 * 0.4);
        }
    }

    let mut list = RenderList::new();
    c.bench_function("scene_record_frame", |b| {
        b.iter(|| {
            list.clear();
            scene.update();
            scene.render(&mut list);
            scene.draw_sphere(Vec3::ZERO, 300.0, &mut list);
            black_box(list.len())
        })
    });
}

criterion_group!(benches, bench_mesh, bench_scene);
criterion_main!(benches);
