//! A placed piece of content on the sphere
//!
//! Objects are positioned by a rotation quaternion rather than x/y
//! coordinates. Each object covers the whole canvas with one quad; the
//! offaxis program rotates canvas directions into the object's local frame
//! and samples the content there.

use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use glam::{Quat, Vec2};

use super::transition::{FadeStep, FadeTransition};
use crate::content::{self, Content, ContentError, ContentTexture};
use crate::render::{Color, Quad, RenderList, RenderOp, ShaderProgram, TextureBinding, UniformValue, WHITE};

/// Where an object's content comes from
enum ContentSlot {
    Empty,
    /// Decoded and owned by the object
    Owned(Box<dyn Content>),
    /// Managed by the caller; never dropped here
    External(Weak<dyn Content>),
}

/// One piece of image or video content placed on the sphere
pub struct SphereObject {
    /// Placement on the sphere
    pub rotation: Quat,
    /// Per-vertex color; alpha is driven by fades
    pub tint: Color,
    /// Content size multiplier
    pub scale: Vec2,

    content: ContentSlot,
    content_path: Option<PathBuf>,
    offaxis: Option<Arc<ShaderProgram>>,
    canvas_size: Vec2,
    transition: FadeTransition,
}

impl Default for SphereObject {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SphereObject {
    /// Create an object that draws with `offaxis`.
    ///
    /// Call [`Self::setup`] before the first draw.
    pub fn new(offaxis: Option<Arc<ShaderProgram>>) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            tint: WHITE,
            scale: Vec2::ONE,
            content: ContentSlot::Empty,
            content_path: None,
            offaxis,
            canvas_size: Vec2::ZERO,
            transition: FadeTransition::new(),
        }
    }

    /// Size the quad to a `2 * canvas_size` by `canvas_size` canvas and reset
    /// the fade.
    pub fn setup(&mut self, canvas_size: f32) {
        self.canvas_size = Vec2::new(canvas_size * 2.0, canvas_size);
        self.transition.reset();
    }

    /// Replace the content with a still image.
    ///
    /// On failure the previous content stays in place.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<(), ContentError> {
        let path = path.as_ref();
        match content::load_image(path) {
            Ok(image) => {
                self.content = ContentSlot::Owned(Box::new(image));
                self.content_path = Some(path.to_path_buf());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Sphere object: image couldn't load: {}", e);
                Err(e)
            }
        }
    }

    /// Replace the content with a looping video and start playback.
    ///
    /// On failure the object has no content.
    pub fn load_video(&mut self, path: impl AsRef<Path>) -> Result<(), ContentError> {
        let path = path.as_ref();
        self.content = ContentSlot::Empty;
        self.content_path = None;

        match content::open_video(path) {
            Ok(video) => {
                self.content = ContentSlot::Owned(Box::new(video));
                self.content_path = Some(path.to_path_buf());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Sphere object: video couldn't load: {}", e);
                Err(e)
            }
        }
    }

    /// Draw caller-managed content. The caller keeps ownership; the object
    /// only holds a weak handle.
    pub fn set_texture(&mut self, content: &Rc<dyn Content>) {
        self.content = ContentSlot::External(Rc::downgrade(content));
        self.content_path = None;
    }

    /// Fade out, swap to `path` while invisible, then fade back in.
    pub fn fade_to_video(&mut self, path: impl Into<PathBuf>, duration_hint: Option<Duration>) {
        let path = path.into();
        tracing::debug!("Sphere object: fading to {}", path.display());
        self.transition.fade_out_to(path, duration_hint);
    }

    /// Abort a pending swap and fade back in. Returns false if none was
    /// pending.
    pub fn cancel_fade(&mut self) -> bool {
        let cancelled = self.transition.cancel();
        if cancelled {
            tracing::debug!("Sphere object: fade cancelled");
        }
        cancelled
    }

    /// Advance video playback and the fade by one frame
    pub fn update(&mut self) {
        if let ContentSlot::Owned(content) = &mut self.content {
            if content.is_video() {
                content.advance();
            }
        }

        match self.transition.step() {
            FadeStep::Idle => return,
            FadeStep::SwapContent(next) => {
                // Failure is logged by load_video; the fade-in continues
                let _ = self.load_video(&next);
            }
            FadeStep::Stepped => {}
            FadeStep::FadedIn => tracing::debug!("Sphere object: fade complete"),
        }
        // Fading always runs on a white tint
        self.tint = [1.0, 1.0, 1.0, self.transition.opacity()];
    }

    /// Record this object's offaxis pass
    pub fn draw(&self, list: &mut RenderList) {
        if self.is_transparent() {
            return;
        }

        let Some(shader) = &self.offaxis else {
            tracing::error!("Sphere object: the shader is missing");
            return;
        };

        let texture = self.content_texture();
        if texture.is_none() {
            tracing::error!("Sphere object: the content is missing");
        }
        let texture_size = texture
            .as_ref()
            .map(|t| [t.width() as f32, t.height() as f32])
            .unwrap_or([0.0, 0.0]);

        list.push(RenderOp::BeginShader(Arc::clone(shader)));
        list.push(RenderOp::SetUniform {
            name: ShaderProgram::CANVAS_DIMENSIONS,
            value: UniformValue::Vec2(self.canvas_size.to_array()),
        });
        list.push(RenderOp::SetUniform {
            name: ShaderProgram::TEXTURE_DIMENSIONS,
            value: UniformValue::Vec2(texture_size),
        });
        list.push(RenderOp::SetUniform {
            name: ShaderProgram::TEXTURE_SCALE,
            value: UniformValue::Vec2(self.scale.to_array()),
        });
        list.push(RenderOp::SetUniform {
            name: ShaderProgram::QUAT,
            value: UniformValue::Vec4(self.rotation.to_array()),
        });

        let bound = texture.is_some();
        if let Some(texture) = texture {
            list.push(RenderOp::BindTexture(TextureBinding::Content(texture)));
        }
        list.push(RenderOp::DrawQuad(self.quad()));
        if bound {
            list.push(RenderOp::UnbindTexture);
        }
        list.push(RenderOp::EndShader);
    }

    /// Hide the object without touching its content
    pub fn make_transparent(&mut self) {
        self.tint = [0.0, 0.0, 0.0, 0.0];
    }

    pub fn is_transparent(&self) -> bool {
        self.tint[3] < f32::EPSILON
    }

    /// Canvas-covering quad with per-corner tint
    pub fn quad(&self) -> Quad {
        let Vec2 { x: w, y: h } = self.canvas_size;
        let corners = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
        Quad {
            positions: corners,
            tex_coords: corners,
            colors: [self.tint; 4],
        }
    }

    /// Canvas dimensions fixed by `setup`
    pub fn canvas_size(&self) -> Vec2 {
        self.canvas_size
    }

    pub fn has_content(&self) -> bool {
        match &self.content {
            ContentSlot::Empty => false,
            ContentSlot::Owned(_) => true,
            ContentSlot::External(weak) => weak.strong_count() > 0,
        }
    }

    /// Whether the owned content advances per frame
    pub fn is_video(&self) -> bool {
        matches!(&self.content, ContentSlot::Owned(c) if c.is_video())
    }

    /// Whether the content is caller-managed
    pub fn is_external(&self) -> bool {
        matches!(self.content, ContentSlot::External(_))
    }

    /// File the current owned content was loaded from
    pub fn content_path(&self) -> Option<&Path> {
        self.content_path.as_deref()
    }

    /// Pixel size of the current content
    pub fn content_size(&self) -> Option<(u32, u32)> {
        self.content_texture().map(|t| (t.width(), t.height()))
    }

    /// Texture snapshot of the current content
    pub fn content_texture(&self) -> Option<ContentTexture> {
        match &self.content {
            ContentSlot::Empty => None,
            ContentSlot::Owned(content) => Some(content.texture()),
            ContentSlot::External(weak) => weak.upgrade().map(|content| content.texture()),
        }
    }

    pub fn transition(&self) -> &FadeTransition {
        &self.transition
    }

    pub fn shader(&self) -> Option<&Arc<ShaderProgram>> {
        self.offaxis.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ImageContent;
    use crate::scene::test_support::{temp_gif, temp_png};
    use crate::scene::FadeState;

    fn object() -> SphereObject {
        let mut object = SphereObject::new(Some(Arc::new(ShaderProgram::offaxis())));
        object.setup(1050.0);
        object
    }

    #[test]
    fn test_setup_sizes_quad() {
        let object = object();
        assert_eq!(object.canvas_size(), Vec2::new(2100.0, 1050.0));
        let quad = object.quad();
        assert_eq!(quad.positions[2], [2100.0, 1050.0]);
        assert_eq!(quad.colors, [WHITE; 4]);
        assert_eq!(object.transition().alpha(), 255);
        assert_eq!(object.transition().step_size(), 10);
    }

    #[test]
    fn test_load_image_is_visible() {
        let path = temp_png("object_load", 8, 4);
        let mut object = object();
        object.load_image(&path).unwrap();

        assert!(!object.is_transparent());
        assert!(object.has_content());
        assert!(!object.is_video());
        assert_eq!(object.content_size(), Some((8, 4)));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_failed_image_keeps_previous_content() {
        let path = temp_png("object_keep", 2, 2);
        let mut object = object();
        object.load_image(&path).unwrap();

        assert!(object.load_image("/no/such/image.png").is_err());
        assert!(object.has_content());
        assert_eq!(object.content_path(), Some(path.as_path()));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_failed_video_leaves_no_content() {
        let path = temp_png("object_video_fail", 2, 2);
        let mut object = object();
        object.load_image(&path).unwrap();

        assert!(object.load_video("/no/such/clip.gif").is_err());
        assert!(!object.has_content());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_draw_records_offaxis_pass() {
        let path = temp_png("object_draw", 8, 4);
        let mut object = object();
        object.load_image(&path).unwrap();
        object.rotation = Quat::from_rotation_y(0.5);
        object.scale = Vec2::new(2.0, 3.0);

        let mut list = RenderList::new();
        object.draw(&mut list);

        assert!(matches!(list.ops()[0], RenderOp::BeginShader(_)));
        assert!(matches!(list.ops().last(), Some(RenderOp::EndShader)));
        assert_eq!(list.texture_bind_count(), 1);
        assert_eq!(list.draw_count(), 1);
        assert_eq!(
            list.uniforms_named("canvasDimensions"),
            vec![UniformValue::Vec2([2100.0, 1050.0])]
        );
        assert_eq!(list.uniforms_named("textureDimensions"), vec![UniformValue::Vec2([8.0, 4.0])]);
        assert_eq!(list.uniforms_named("textureScale"), vec![UniformValue::Vec2([2.0, 3.0])]);
        assert_eq!(
            list.uniforms_named("quat"),
            vec![UniformValue::Vec4(object.rotation.to_array())]
        );
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_transparent_object_draws_nothing() {
        let path = temp_png("object_transparent", 2, 2);
        let mut object = object();
        object.load_image(&path).unwrap();
        object.make_transparent();
        assert!(object.is_transparent());

        let mut list = RenderList::new();
        object.draw(&mut list);
        assert_eq!(list.texture_bind_count(), 0);
        assert_eq!(list.draw_count(), 0);
        assert!(list.is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_shader_skips_draw() {
        let mut object = SphereObject::new(None);
        object.setup(16.0);
        object.set_texture(&(Rc::new(ImageContent::solid(2, 2, [255; 4])) as Rc<dyn Content>));

        let mut list = RenderList::new();
        object.draw(&mut list);
        assert!(list.is_empty());
    }

    #[test]
    fn test_missing_content_still_draws() {
        let object = object();
        let mut list = RenderList::new();
        object.draw(&mut list);

        assert_eq!(list.draw_count(), 1);
        assert_eq!(list.texture_bind_count(), 0);
        assert_eq!(list.uniforms_named("textureDimensions"), vec![UniformValue::Vec2([0.0, 0.0])]);
    }

    #[test]
    fn test_external_content_is_not_owned() {
        let external: Rc<dyn Content> = Rc::new(ImageContent::solid(4, 4, [0, 0, 255, 255]));
        let mut object = object();
        object.set_texture(&external);

        assert!(object.is_external());
        assert!(!object.is_video());
        assert_eq!(object.content_size(), Some((4, 4)));
        assert_eq!(Rc::strong_count(&external), 1);

        drop(object);
        assert_eq!(external.width(), 4);
    }

    #[test]
    fn test_external_content_dropped_by_caller() {
        let external: Rc<dyn Content> = Rc::new(ImageContent::solid(4, 4, [0; 4]));
        let mut object = object();
        object.set_texture(&external);
        drop(external);

        assert!(!object.has_content());
        let mut list = RenderList::new();
        object.draw(&mut list);
        assert_eq!(list.texture_bind_count(), 0);
    }

    #[test]
    fn test_fade_swaps_video_at_zero() {
        let gif = temp_gif("object_fade", 3);
        let mut object = object();
        object.fade_to_video(&gif, None);

        for _ in 0..25 {
            object.update();
        }
        assert_eq!(object.transition().alpha(), 5);
        assert!(!object.has_content());
        assert!((object.tint[3] - 5.0 / 255.0).abs() < 1e-6);

        object.update();
        assert_eq!(object.transition().alpha(), 0);
        assert_eq!(object.transition().target(), 255);
        assert!(object.is_video());
        assert_eq!(object.content_path(), Some(gif.as_path()));
        assert!(object.is_transparent());

        for _ in 0..26 {
            object.update();
        }
        assert_eq!(object.transition().state(), FadeState::Idle);
        assert_eq!(object.tint[3], 1.0);
        let _ = std::fs::remove_file(gif);
    }

    #[test]
    fn test_refade_loads_only_latest() {
        let first = temp_gif("object_first", 2);
        let second = temp_gif("object_second", 2);
        let mut object = object();

        object.fade_to_video(&first, None);
        for _ in 0..10 {
            object.update();
        }
        object.fade_to_video(&second, None);
        for _ in 0..60 {
            object.update();
        }

        assert_eq!(object.content_path(), Some(second.as_path()));
        assert!(object.transition().is_idle());
        let _ = std::fs::remove_file(first);
        let _ = std::fs::remove_file(second);
    }

    #[test]
    fn test_failed_swap_still_fades_in() {
        let mut object = object();
        object.fade_to_video("/no/such/clip.gif", None);
        for _ in 0..60 {
            object.update();
        }
        assert!(!object.has_content());
        assert_eq!(object.transition().alpha(), 255);
        assert!(!object.is_transparent());
    }

    #[test]
    fn test_idle_update_keeps_tint() {
        let mut object = object();
        object.make_transparent();
        object.update();
        assert!(object.is_transparent());
    }

    #[test]
    fn test_fade_after_make_transparent_returns_white() {
        let mut object = object();
        object.make_transparent();
        object.fade_to_video("/no/such/clip.gif", None);
        for _ in 0..60 {
            object.update();
        }
        assert_eq!(object.tint, WHITE);
    }

    #[test]
    fn test_fade_resets_custom_tint() {
        let mut object = object();
        object.tint = [1.0, 0.0, 0.0, 1.0];
        object.fade_to_video("/no/such/clip.gif", None);
        object.update();
        assert_eq!(&object.tint[..3], &[1.0, 1.0, 1.0]);
        assert!((object.tint[3] - 245.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_cancel_fade() {
        let mut object = object();
        assert!(!object.cancel_fade());
        object.fade_to_video("/never/loaded.gif", None);
        object.update();
        assert!(object.cancel_fade());
        for _ in 0..5 {
            object.update();
        }
        assert!(object.transition().is_idle());
        assert_eq!(object.tint[3], 1.0);
    }

    #[test]
    fn test_video_advances_on_update() {
        let gif = temp_gif("object_advance", 3);
        let mut object = object();
        object.load_video(&gif).unwrap();

        let before = object.content_texture().unwrap().revision;
        object.update();
        let after = object.content_texture().unwrap().revision;
        assert_eq!(after, before + 1);
        let _ = std::fs::remove_file(gif);
    }
}
