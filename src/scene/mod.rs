//! The sphere scene
//!
//! A [`Scene`] owns the canvas, the shared shader programs and the ordered
//! list of [`SphereObject`]s. Per frame the host calls `update`, `render`
//! (composite every object into the canvas) and then `draw` or
//! `draw_sphere` to present it.

mod canvas;
mod object;
mod transition;

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;

use crate::render::{RenderList, RenderOp, ShaderKind, ShaderProgram, SphereWarp, TRANSPARENT_BLACK};
use crate::settings::SphereSettings;

pub use canvas::Canvas;
pub use object::SphereObject;
pub use transition::{FadeState, FadeStep, FadeTransition, DEFAULT_FADE_STEP, FULL_ALPHA};

/// Handle to an object in a [`Scene`]. Objects live as long as the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Canvas, shaders and objects for one spherical display
pub struct Scene {
    settings: SphereSettings,
    size: u32,
    canvas: Canvas,
    offaxis: Arc<ShaderProgram>,
    warp: SphereWarp,
    objects: Vec<SphereObject>,
}

impl Scene {
    /// Build a scene, loading both programs from the configured locations.
    pub fn new(settings: SphereSettings) -> Self {
        let offaxis = ShaderProgram::load(ShaderKind::Offaxis, &settings.offaxis_shader);
        let spherize = ShaderProgram::load(ShaderKind::Spherize, &settings.spherize_shader);
        Self::with_shaders(settings, Arc::new(offaxis), Arc::new(spherize))
    }

    /// Build a scene around already loaded programs
    pub fn with_shaders(
        mut settings: SphereSettings,
        offaxis: Arc<ShaderProgram>,
        spherize: Arc<ShaderProgram>,
    ) -> Self {
        settings.clamp_ranges();
        let size = settings.sphere_resolution;
        let canvas = Canvas::new(size);
        let warp = SphereWarp::new(spherize, canvas.width(), canvas.height());

        tracing::info!(
            "Sphere scene: canvas {}x{}, offaxis '{}'",
            canvas.width(),
            canvas.height(),
            offaxis.name()
        );

        Self {
            settings,
            size,
            canvas,
            offaxis,
            warp,
            objects: Vec::new(),
        }
    }

    /// Add an empty object, set up for this canvas. Draw order is creation
    /// order.
    pub fn create_object(&mut self) -> ObjectId {
        let mut object = SphereObject::new(Some(Arc::clone(&self.offaxis)));
        object.setup(self.size as f32);
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    /// Add an object showing an image. Load failures are logged and the
    /// object is still created.
    pub fn create_object_from_image(&mut self, path: impl AsRef<Path>) -> ObjectId {
        let id = self.create_object();
        let _ = self.objects[id.0].load_image(path);
        id
    }

    /// Add an object playing a video. Load failures are logged and the
    /// object is still created.
    pub fn create_object_from_video(&mut self, path: impl AsRef<Path>) -> ObjectId {
        let id = self.create_object();
        let _ = self.objects[id.0].load_video(path);
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&SphereObject> {
        self.objects.get(id.0)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SphereObject> {
        self.objects.get_mut(id.0)
    }

    /// Objects in draw order
    pub fn objects(&self) -> &[SphereObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SphereObject] {
        &mut self.objects
    }

    /// The shared offaxis program
    pub fn shader_reference(&self) -> Arc<ShaderProgram> {
        Arc::clone(&self.offaxis)
    }

    /// The spherize program used by `draw`
    pub fn spherize_program(&self) -> &ShaderProgram {
        self.warp.program()
    }

    /// Advance video and fades on every object
    pub fn update(&mut self) {
        for object in &mut self.objects {
            object.update();
        }
    }

    /// Start drawing into the canvas. No-op if already begun.
    pub fn begin(&mut self, list: &mut RenderList) {
        self.canvas.begin(list);
    }

    /// Stop drawing into the canvas. No-op if not begun.
    pub fn end(&mut self, list: &mut RenderList) {
        self.canvas.end(list);
    }

    /// Composite every object into the canvas
    pub fn render(&mut self, list: &mut RenderList) {
        self.canvas.begin(list);
        list.push(RenderOp::Clear(TRANSPARENT_BLACK));
        for object in &self.objects {
            object.draw(list);
        }
        self.canvas.end(list);
    }

    /// Present the canvas warped for the sphere or as the flat preview
    pub fn draw(&self, viewport_width: u32, viewport_height: u32, list: &mut RenderList) {
        self.warp.draw(&self.settings, viewport_width, viewport_height, list);
    }

    /// Present the canvas wrapped on a sphere mesh
    pub fn draw_sphere(&self, position: Vec3, radius: f32, list: &mut RenderList) {
        self.warp.draw_sphere(position, radius, list);
    }

    pub fn settings(&self) -> &SphereSettings {
        &self.settings
    }

    /// Runtime tunables. `sphere_resolution` is fixed at construction;
    /// changing it here has no effect on the canvas.
    pub fn settings_mut(&mut self) -> &mut SphereSettings {
        &mut self.settings
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Sphere resolution S
    pub fn size(&self) -> u32 {
        self.size
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{temp_gif, temp_png};
    use super::*;

    fn settings(size: u32) -> SphereSettings {
        SphereSettings {
            sphere_resolution: size,
            ..SphereSettings::default()
        }
    }

    fn scene() -> Scene {
        Scene::with_shaders(
            settings(64),
            Arc::new(ShaderProgram::offaxis()),
            Arc::new(ShaderProgram::spherize()),
        )
    }

    #[test]
    fn test_new_loads_configured_programs() {
        let mut config = settings(32);
        config.offaxis_shader = "/missing/offaxis".to_string();
        let scene = Scene::new(config);
        assert_eq!(scene.shader_reference().kind(), ShaderKind::Offaxis);
        assert_eq!(scene.shader_reference().name(), "/missing/offaxis");
        assert_eq!((scene.canvas().width(), scene.canvas().height()), (64, 32));
    }

    #[test]
    fn test_oversized_resolution_is_clamped() {
        let scene = Scene::with_shaders(
            settings(3_000_000_000),
            Arc::new(ShaderProgram::offaxis()),
            Arc::new(ShaderProgram::spherize()),
        );
        assert_eq!(scene.size(), SphereSettings::SPHERE_RESOLUTION_RANGE.1);
        assert_eq!((scene.canvas().width(), scene.canvas().height()), (16384, 8192));
    }

    #[test]
    fn test_objects_share_the_offaxis_program() {
        let mut scene = scene();
        let a = scene.create_object();
        let b = scene.create_object();

        let shared = scene.shader_reference();
        for id in [a, b] {
            let object = scene.object(id).unwrap();
            assert!(Arc::ptr_eq(object.shader().unwrap(), &shared));
            assert_eq!(object.canvas_size(), glam::Vec2::new(128.0, 64.0));
        }
        assert_eq!(Arc::strong_count(&shared), 4);
    }

    #[test]
    fn test_render_brackets_and_orders_objects() {
        let png = temp_png("scene_render", 4, 4);
        let mut scene = scene();
        let first = scene.create_object_from_image(&png);
        let second = scene.create_object_from_image(&png);
        scene.object_mut(first).unwrap().rotation = glam::Quat::from_rotation_y(1.0);

        let mut list = RenderList::new();
        scene.render(&mut list);

        let ops = list.ops();
        assert!(matches!(ops[0], RenderOp::BeginCanvas));
        assert!(matches!(ops[4], RenderOp::Clear(c) if c == TRANSPARENT_BLACK));
        assert!(matches!(ops.last(), Some(RenderOp::EndCanvas)));
        assert_eq!(list.draw_count(), 2);

        let quats = list.uniforms_named("quat");
        assert_eq!(quats.len(), 2);
        assert_eq!(
            quats[0],
            crate::render::UniformValue::Vec4(scene.object(first).unwrap().rotation.to_array())
        );
        assert_eq!(
            quats[1],
            crate::render::UniformValue::Vec4(scene.object(second).unwrap().rotation.to_array())
        );
        assert!(!scene.canvas().is_begun());
        let _ = std::fs::remove_file(png);
    }

    #[test]
    fn test_render_inside_host_bracket() {
        let mut scene = scene();
        let mut list = RenderList::new();
        scene.begin(&mut list);
        scene.begin(&mut list);
        scene.render(&mut list);
        scene.end(&mut list);

        let begins = list.ops().iter().filter(|op| matches!(op, RenderOp::BeginCanvas)).count();
        let ends = list.ops().iter().filter(|op| matches!(op, RenderOp::EndCanvas)).count();
        assert_eq!((begins, ends), (1, 1));
    }

    #[test]
    fn test_transparent_objects_skipped() {
        let png = temp_png("scene_transparent", 2, 2);
        let mut scene = scene();
        let id = scene.create_object_from_image(&png);
        scene.object_mut(id).unwrap().make_transparent();

        let mut list = RenderList::new();
        scene.render(&mut list);
        assert_eq!(list.draw_count(), 0);
        assert_eq!(list.texture_bind_count(), 0);
        let _ = std::fs::remove_file(png);
    }

    #[test]
    fn test_failed_loads_still_create_objects() {
        let mut scene = scene();
        let image = scene.create_object_from_image("/no/such.png");
        let video = scene.create_object_from_video("/no/such.gif");
        assert_eq!(scene.objects().len(), 2);
        assert!(!scene.object(image).unwrap().has_content());
        assert!(!scene.object(video).unwrap().has_content());
    }

    #[test]
    fn test_update_drives_every_object() {
        let gif = temp_gif("scene_update", 2);
        let mut scene = scene();
        let id = scene.create_object();
        scene.object_mut(id).unwrap().fade_to_video(&gif, None);

        for _ in 0..26 {
            scene.update();
        }
        let object = scene.object(id).unwrap();
        assert!(object.is_video());
        assert_eq!(object.transition().state(), FadeState::FadingIn);
        let _ = std::fs::remove_file(gif);
    }

    #[test]
    fn test_draw_follows_render_mode() {
        let mut scene = scene();
        let mut preview = RenderList::new();
        scene.draw(400, 200, &mut preview);
        assert!(preview.uniforms_named("fov").is_empty());

        scene.settings_mut().render_for_sphere = true;
        let mut warped = RenderList::new();
        scene.draw(400, 200, &mut warped);
        assert_eq!(warped.uniforms_named("fov").len(), 1);
    }

    #[test]
    fn test_draw_sphere_strips() {
        let scene = scene();
        let mut list = RenderList::new();
        scene.draw_sphere(Vec3::new(0.0, 0.0, 0.0), 100.0, &mut list);
        assert_eq!(list.strip_vertex_counts(), vec![202; 50]);
    }
}
