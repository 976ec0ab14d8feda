use super::resources::ResourcesDictionary;
use crate::geometry::Rectangle;
use crate::objects::ObjectId;

/// A page waiting to be written.
///
/// Boxes default the way readers resolve them: a missing crop box is the
/// media box and the bleed, trim and art boxes fall back to the crop box.
/// Only boxes that differ from their fallback are written.
///
/// # Example
///
/// ```rust
/// use pdfweave::{DocumentContext, Page, WriterConfig};
///
/// let mut context = DocumentContext::new(Vec::new(), WriterConfig::default());
/// context.write_header()?;
///
/// let mut page = Page::letter();
/// context.write_page_content(&mut page, b"0 0 m 100 100 l S")?;
/// context.write_page(&page)?;
/// context.finalize_new_pdf()?;
/// # Ok::<(), pdfweave::PdfError>(())
/// ```
#[derive(Debug)]
pub struct Page {
    media_box: Rectangle,
    crop_box: Option<Rectangle>,
    bleed_box: Option<Rectangle>,
    trim_box: Option<Rectangle>,
    art_box: Option<Rectangle>,
    rotate: Option<i32>,
    resources: ResourcesDictionary,
    contents: Vec<ObjectId>,
}

impl Page {
    pub fn new(media_box: Rectangle) -> Self {
        Self {
            media_box,
            crop_box: None,
            bleed_box: None,
            trim_box: None,
            art_box: None,
            rotate: None,
            resources: ResourcesDictionary::new(),
            contents: Vec::new(),
        }
    }

    pub fn letter() -> Self {
        Self::new(Rectangle::letter())
    }

    pub fn a4() -> Self {
        Self::new(Rectangle::a4())
    }

    pub fn media_box(&self) -> Rectangle {
        self.media_box
    }

    pub fn set_media_box(&mut self, media_box: Rectangle) {
        self.media_box = media_box;
    }

    pub fn crop_box(&self) -> Option<Rectangle> {
        self.crop_box
    }

    pub fn set_crop_box(&mut self, crop_box: Rectangle) {
        self.crop_box = Some(crop_box);
    }

    /// Crop box as a reader would resolve it
    pub fn effective_crop_box(&self) -> Rectangle {
        self.crop_box.unwrap_or(self.media_box)
    }

    pub fn bleed_box(&self) -> Option<Rectangle> {
        self.bleed_box
    }

    pub fn set_bleed_box(&mut self, bleed_box: Rectangle) {
        self.bleed_box = Some(bleed_box);
    }

    pub fn trim_box(&self) -> Option<Rectangle> {
        self.trim_box
    }

    pub fn set_trim_box(&mut self, trim_box: Rectangle) {
        self.trim_box = Some(trim_box);
    }

    pub fn art_box(&self) -> Option<Rectangle> {
        self.art_box
    }

    pub fn set_art_box(&mut self, art_box: Rectangle) {
        self.art_box = Some(art_box);
    }

    pub fn rotate(&self) -> Option<i32> {
        self.rotate
    }

    /// Rotation in degrees, normalized to a multiple of 90 in `0..360`.
    pub fn set_rotate(&mut self, degrees: i32) {
        self.rotate = Some((degrees / 90 * 90).rem_euclid(360));
    }

    pub fn resources(&self) -> &ResourcesDictionary {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourcesDictionary {
        &mut self.resources
    }

    pub fn contents(&self) -> &[ObjectId] {
        &self.contents
    }

    /// Append an already written content stream
    pub fn add_content(&mut self, content: ObjectId) {
        self.contents.push(content);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::letter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_crop_box() {
        let mut page = Page::a4();
        assert_eq!(page.effective_crop_box(), Rectangle::a4());
        let crop = Rectangle::from_position_and_size(10.0, 10.0, 200.0, 200.0);
        page.set_crop_box(crop);
        assert_eq!(page.effective_crop_box(), crop);
    }

    #[test]
    fn test_rotation_is_normalized() {
        let mut page = Page::letter();
        page.set_rotate(-90);
        assert_eq!(page.rotate(), Some(270));
        page.set_rotate(450);
        assert_eq!(page.rotate(), Some(90));
        page.set_rotate(100);
        assert_eq!(page.rotate(), Some(90));
    }

    #[test]
    fn test_pages_get_their_own_resources() {
        let a = Page::letter();
        let b = Page::letter();
        assert_ne!(a.resources().id(), b.resources().id());
        assert!(a.contents().is_empty());
    }
}
