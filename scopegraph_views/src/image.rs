// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Intensity images and the view that shows them as a texture.

use kurbo::Rect;
use scopegraph::{Accepts, Capabilities, Context, Node, signal};
use scopegraph_gui::{
    BackendError, Canvas, Command, ContentChanged, DrawOpaque, QuerySize, Texture, label_color,
    unit_to_byte,
};
use tracing::{debug, error};

use crate::error::ViewError;
use crate::notify_changed;

/// A row-major grid of intensities.
///
/// Values in `0..1` are gray levels. In an image whose maximum exceeds one,
/// values of one and above are label ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Image {
    /// An image over `data`, which must hold `width * height` values.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, ViewError> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok();
        if expected != Some(data.len()) {
            return Err(ViewError::Shape {
                width,
                height,
                depth: 1,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// An image with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        let len = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or_default();
        Self {
            width,
            height,
            data: vec![value; len],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the image has no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw values, row by row.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The value at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.data.get(index).copied()
    }

    /// The largest value, or `None` for an empty image.
    pub fn max(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::max)
    }

    /// The extent of the image in its own coordinates, one unit per pixel.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    /// Convert to tightly packed RGBA.
    pub fn to_rgba(&self) -> Vec<u8> {
        let labels = self.max().is_some_and(|max| max > 1.0);
        let mut rgba = Vec::with_capacity(self.data.len() * 4);
        for &value in &self.data {
            let [r, g, b] = if labels && value >= 1.0 {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "Label ids are stored as whole, positive floats."
                )]
                let id = value as u64;
                label_color(id)
            } else {
                [unit_to_byte(f64::from(value)); 3]
            };
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
        rgba
    }
}

/// Replace the image of an [`ImageView`].
#[derive(Clone, Debug, Default)]
pub struct SetImage {
    /// The new image. Taken by the receiving view.
    pub image: Image,
}

signal!(SetImage);

/// Shows an [`Image`] as a textured quad from `(0, 0)` to `(width, height)`.
///
/// The texture is uploaded on the first opaque draw after the image changed.
#[derive(Debug, Default)]
pub struct ImageView {
    image: Image,
    texture: Option<Texture>,
    dirty: bool,
}

impl ImageView {
    /// A view showing `image`.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            texture: None,
            dirty: true,
        }
    }

    /// The shown image.
    pub fn image(&self) -> &Image {
        &self.image
    }

    fn upload(&mut self, canvas: &Canvas) -> Result<(), BackendError> {
        let texture = match self.texture.take() {
            Some(texture) => texture,
            None => canvas.create_texture()?,
        };
        texture.upload(self.image.width, self.image.height, &self.image.to_rgba())?;
        debug!(
            width = self.image.width,
            height = self.image.height,
            "image texture uploaded"
        );
        self.texture = Some(texture);
        self.dirty = false;
        Ok(())
    }
}

impl Accepts<DrawOpaque> for ImageView {
    fn on_signal(&mut self, draw: &mut DrawOpaque, _: &mut Context<'_>) {
        if self.image.is_empty() {
            return;
        }
        let canvas = draw.canvas().clone();
        if (self.dirty || self.texture.is_none())
            && let Err(err) = self.upload(&canvas)
        {
            error!(%err, "could not upload image texture");
            return;
        }
        let Some(texture) = &self.texture else {
            return;
        };
        canvas.submit(Command::Color([1.0, 1.0, 1.0, 1.0]));
        canvas.submit(Command::TexturedQuad {
            texture: texture.id(),
            rect: self.image.bounds(),
        });
    }
}

impl Accepts<QuerySize> for ImageView {
    fn on_signal(&mut self, query: &mut QuerySize, _: &mut Context<'_>) {
        if !self.image.is_empty() {
            query.fit(self.image.bounds());
        }
    }
}

impl Accepts<SetImage> for ImageView {
    fn on_signal(&mut self, signal: &mut SetImage, cx: &mut Context<'_>) {
        self.image = core::mem::take(&mut signal.image);
        self.dirty = true;
        notify_changed(cx);
    }
}

impl Node for ImageView {
    fn declare(caps: &mut Capabilities<Self>) {
        caps.accepts::<DrawOpaque>()
            .accepts::<QuerySize>()
            .accepts::<SetImage>()
            .provides::<ContentChanged>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegraph::NodeId;
    use scopegraph_gui::{ContextSettings, Recorder, Window, WindowMode};
    use std::rc::Rc;

    fn window_with(image: Image) -> (Window, Rc<Recorder>, NodeId) {
        let recorder = Rc::new(Recorder::new());
        let mut window = Window::new(
            WindowMode::default(),
            &ContextSettings::default(),
            recorder.clone(),
        )
        .unwrap();
        let view = window.add(ImageView::new(image)).unwrap();
        window.validate().unwrap();
        (window, recorder, view)
    }

    #[test]
    fn shape_is_checked() {
        assert_eq!(
            Image::new(2, 2, vec![0.0; 3]).unwrap_err(),
            ViewError::Shape {
                width: 2,
                height: 2,
                depth: 1,
                len: 3
            }
        );
        let image = Image::new(2, 1, vec![0.25, 0.5]).unwrap();
        assert_eq!(image.get(1, 0), Some(0.5));
        assert_eq!(image.get(2, 0), None);
    }

    #[test]
    fn labels_are_colored_and_intensities_gray() {
        let image = Image::new(3, 1, vec![0.5, 3.0, 0.0]).unwrap();
        let rgba = image.to_rgba();
        assert_eq!(&rgba[0..4], &[128, 128, 128, 255]);
        let [r, g, b] = label_color(3);
        assert_eq!(&rgba[4..8], &[r, g, b, 255]);
        assert_eq!(&rgba[8..12], &[0, 0, 0, 255]);

        // Without labels, 1.0 is plain white.
        let gray = Image::new(1, 1, vec![1.0]).unwrap();
        assert_eq!(gray.to_rgba(), vec![255, 255, 255, 255]);
    }

    #[test]
    fn texture_is_uploaded_lazily_once() {
        let (mut window, recorder, _view) = window_with(Image::filled(4, 3, 0.5));
        assert_eq!(recorder.uploads(), 0);
        window.redraw().unwrap();
        assert_eq!(recorder.uploads(), 1);
        assert_eq!(recorder.live_textures(), 1);
        let commands = recorder.take_commands();
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::TexturedQuad { rect, .. } if *rect == Rect::new(0.0, 0.0, 4.0, 3.0)
        )));

        window.set_dirty();
        window.redraw().unwrap();
        assert_eq!(recorder.uploads(), 1, "unchanged images are not re-uploaded");
    }

    #[test]
    fn set_image_replaces_content() {
        let (mut window, recorder, view) = window_with(Image::default());
        window.redraw().unwrap();
        assert_eq!(recorder.uploads(), 0, "nothing to show yet");
        assert_eq!(window.content_size().unwrap().size(), None);

        window
            .graph_mut()
            .send_down(
                view,
                &mut SetImage {
                    image: Image::filled(8, 2, 0.1),
                },
            )
            .unwrap();
        assert!(window.is_dirty());
        assert_eq!(
            window.content_size().unwrap().rect(),
            Some(Rect::new(0.0, 0.0, 8.0, 2.0))
        );
        window.redraw().unwrap();
        assert_eq!(recorder.uploads(), 1);
        assert_eq!(recorder.texture_size(recorder_texture(&window, view)), Some((8, 2)));
    }

    fn recorder_texture(window: &Window, view: NodeId) -> scopegraph_gui::TextureId {
        window
            .graph()
            .get::<ImageView>(view)
            .and_then(|v| v.texture.as_ref())
            .map(Texture::id)
            .unwrap()
    }

    #[test]
    fn failed_uploads_skip_drawing() {
        let recorder = Rc::new(Recorder::failing());
        let mut window = Window::new(
            WindowMode::default(),
            &ContextSettings::default(),
            recorder.clone(),
        )
        .unwrap();
        window.add(ImageView::new(Image::filled(2, 2, 0.5))).unwrap();
        window.redraw().unwrap();
        assert!(
            !recorder
                .take_commands()
                .iter()
                .any(|c| matches!(c, Command::TexturedQuad { .. }))
        );
    }
}
