//! Content-stream processor that reports drawn images to a listener.

use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use tracing::{debug, trace, warn};

use super::document::PdfDocument;
use super::image::PdfImage;
use super::inline::{self, Segment};
use super::matrix::Matrix;
use crate::error::PdfError;

/// Kinds of events a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An image XObject was painted with `Do`, or an inline image was drawn.
    RenderImage,
}

/// An event emitted while interpreting page content.
pub enum RenderEvent<'a> {
    Image(ImageRenderInfo<'a>),
}

impl RenderEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            RenderEvent::Image(_) => EventKind::RenderImage,
        }
    }
}

/// Details of one image invocation.
pub struct ImageRenderInfo<'a> {
    doc: &'a PdfDocument,
    stream: &'a Stream,
    /// Page the image was drawn on (1-indexed).
    pub page: u32,
    /// Resource name used by the `Do` operator; empty for inline images.
    pub name: String,
    /// Whether the image was embedded in the content stream with `BI`.
    pub inline: bool,
    /// Object id of the image XObject, if it was referenced indirectly.
    pub object_id: Option<ObjectId>,
    /// Transformation matrix in effect when the image was drawn.
    pub ctm: Matrix,
    /// Number of form XObjects enclosing the invocation.
    pub form_depth: usize,
}

impl<'a> ImageRenderInfo<'a> {
    /// The image, ready to decode.
    pub fn image(&self) -> Result<PdfImage<'a>, PdfError> {
        PdfImage::from_stream(self.doc.inner(), self.stream)
    }

    /// Short description for logs and reports.
    pub fn label(&self) -> String {
        if self.inline {
            "inline image".to_string()
        } else {
            format!("/{}", self.name)
        }
    }
}

/// Receives events from a [`ContentProcessor`].
pub trait RenderListener {
    /// Events this listener wants to receive.
    fn supported_events(&self) -> &[EventKind];

    /// Handle one event. An error stops processing.
    fn event_occurred(&mut self, event: &RenderEvent<'_>) -> crate::Result<()>;
}

/// Interprets page content streams and forwards events to a listener.
pub struct ContentProcessor<'a, L: RenderListener> {
    doc: &'a PdfDocument,
    listener: &'a mut L,
    include_forms: bool,
    /// Forms currently being interpreted, innermost last.
    form_stack: Vec<ObjectId>,
    events: usize,
}

impl<'a, L: RenderListener> ContentProcessor<'a, L> {
    /// Create a processor that follows form XObjects.
    pub fn new(doc: &'a PdfDocument, listener: &'a mut L) -> Self {
        Self {
            doc,
            listener,
            include_forms: true,
            form_stack: Vec::new(),
            events: 0,
        }
    }

    /// Follow (or ignore) form XObjects.
    pub fn with_forms(mut self, include_forms: bool) -> Self {
        self.include_forms = include_forms;
        self
    }

    /// Number of events delivered to the listener so far.
    pub fn events_delivered(&self) -> usize {
        self.events
    }

    /// Interpret the content of one page.
    pub fn process_page(&mut self, page: u32, page_id: ObjectId) -> crate::Result<()> {
        let content = self.doc.page_content(page_id)?;
        let resources = self.doc.page_resources(page_id);
        if resources.is_none() {
            debug!("Page {} has no resources", page);
        }
        self.process_content(page, &content, resources, Matrix::identity())
    }

    fn process_content(
        &mut self,
        page: u32,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> crate::Result<()> {
        let xobjects = resources
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| self.doc.resolve_dict(obj));

        let mut stack: Vec<Matrix> = Vec::new();
        let mut ctm = ctm;

        for segment in inline::split(content) {
            let bytes = match segment {
                Segment::Operators(bytes) => bytes,
                Segment::InlineImage(stream) => {
                    self.invoke_inline_image(page, stream, resources, ctm)?;
                    continue;
                }
                Segment::Broken(reason) => return Err(PdfError::Content { page, reason }.into()),
            };

            let content = Content::decode(bytes).map_err(|e| PdfError::Content {
                page,
                reason: e.to_string(),
            })?;

            for op in &content.operations {
                match op.operator.as_str() {
                    "q" => stack.push(ctm),
                    "Q" => {
                        if let Some(saved) = stack.pop() {
                            ctm = saved;
                        }
                    }
                    "cm" => match Matrix::from_operands(&op.operands) {
                        Some(m) => ctm = m.multiply(&ctm),
                        None => trace!("Ignoring malformed cm on page {}", page),
                    },
                    "Do" => {
                        let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                            continue;
                        };
                        self.invoke_xobject(page, name, xobjects, resources, ctm)?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn invoke_inline_image(
        &mut self,
        page: u32,
        mut stream: Stream,
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> crate::Result<()> {
        // Inline images may name a color space from the page resources.
        let named = match stream.dict.get(b"ColorSpace") {
            Ok(Object::Name(name)) if !is_device_color_space(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = named {
            let resolved = resources
                .and_then(|res| res.get(b"ColorSpace").ok())
                .and_then(|obj| self.doc.resolve_dict(obj))
                .and_then(|spaces| spaces.get(&name).ok());
            match resolved {
                Some(space) => stream.dict.set("ColorSpace", space.clone()),
                None => debug!(
                    "Color space /{} of inline image on page {} not in resources",
                    String::from_utf8_lossy(&name),
                    page
                ),
            }
        }

        trace!("Inline image on page {} ({} bytes)", page, stream.content.len());
        let info = ImageRenderInfo {
            doc: self.doc,
            stream: &stream,
            page,
            name: String::new(),
            inline: true,
            object_id: None,
            ctm,
            form_depth: self.form_stack.len(),
        };
        self.emit(RenderEvent::Image(info))
    }

    fn invoke_xobject(
        &mut self,
        page: u32,
        name: &[u8],
        xobjects: Option<&'a Dictionary>,
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> crate::Result<()> {
        let display_name = String::from_utf8_lossy(name).into_owned();
        let Some(entry) = xobjects.and_then(|x| x.get(name).ok()) else {
            warn!("XObject /{} not found in resources of page {}", display_name, page);
            return Ok(());
        };
        let Some((object_id, Object::Stream(stream))) = self.doc.resolve(entry) else {
            warn!("XObject /{} on page {} is not a stream", display_name, page);
            return Ok(());
        };

        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();
        match subtype {
            Some(b"Image") => {
                let (w, h) = ctm.scale();
                trace!("Image /{} on page {} drawn at {:.1}x{:.1}pt", display_name, page, w, h);

                let info = ImageRenderInfo {
                    doc: self.doc,
                    stream,
                    page,
                    name: display_name,
                    inline: false,
                    object_id,
                    ctm,
                    form_depth: self.form_stack.len(),
                };
                self.emit(RenderEvent::Image(info))
            }
            Some(b"Form") if self.include_forms => {
                if let Some(id) = object_id {
                    if self.form_stack.contains(&id) {
                        warn!("Form /{} on page {} draws itself, skipping", display_name, page);
                        return Ok(());
                    }
                    self.form_stack.push(id);
                }

                let result = self.process_form(page, stream, resources, ctm);

                if object_id.is_some() {
                    self.form_stack.pop();
                }
                result
            }
            _ => {
                trace!("Ignoring XObject /{} on page {}", display_name, page);
                Ok(())
            }
        }
    }

    fn process_form(
        &mut self,
        page: u32,
        form: &'a Stream,
        parent_resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> crate::Result<()> {
        let form_matrix = form
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|m| Matrix::from_operands(m))
            .unwrap_or_default();

        let resources = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| self.doc.resolve_dict(obj))
            .or(parent_resources);

        let content = match form.decompressed_content() {
            Ok(data) => data,
            Err(_) => form.content.clone(),
        };

        self.process_content(page, &content, resources, form_matrix.multiply(&ctm))
    }

    fn emit(&mut self, event: RenderEvent<'_>) -> crate::Result<()> {
        if !self.listener.supported_events().contains(&event.kind()) {
            return Ok(());
        }
        self.events += 1;
        self.listener.event_occurred(&event)
    }
}

fn is_device_color_space(name: &[u8]) -> bool {
    matches!(name, b"DeviceGray" | b"DeviceRGB" | b"DeviceCMYK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{draw, TestPdfBuilder};
    use lopdf::content::Operation;
    use pretty_assertions::assert_eq;

    /// Records every image event it sees.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(u32, String, usize, (f32, f32))>,
    }

    impl RenderListener for Recorder {
        fn supported_events(&self) -> &[EventKind] {
            &[EventKind::RenderImage]
        }

        fn event_occurred(&mut self, event: &RenderEvent<'_>) -> crate::Result<()> {
            match event {
                RenderEvent::Image(info) => {
                    self.seen.push((info.page, info.name.clone(), info.form_depth, info.ctm.scale()));
                }
            }
            Ok(())
        }
    }

    /// Subscribes to nothing.
    struct Deaf;

    impl RenderListener for Deaf {
        fn supported_events(&self) -> &[EventKind] {
            &[]
        }

        fn event_occurred(&mut self, _event: &RenderEvent<'_>) -> crate::Result<()> {
            panic!("no events expected");
        }
    }

    fn run(doc: &PdfDocument, include_forms: bool) -> Vec<(u32, String, usize, (f32, f32))> {
        let mut recorder = Recorder::default();
        {
            let mut processor = ContentProcessor::new(doc, &mut recorder).with_forms(include_forms);
            for (page, id) in doc.page_ids() {
                processor.process_page(page, id).unwrap();
            }
        }
        recorder.seen
    }

    #[test]
    fn test_images_in_drawing_order() {
        let mut pdf = TestPdfBuilder::new();
        let a = pdf.rgb_image(2, 2, [255, 0, 0]);
        let b = pdf.gray_image(3, 1, 128);
        let mut ops = draw("B");
        ops.extend(draw("A"));
        pdf.page(&[("A", a), ("B", b)], ops);
        pdf.page(&[("A", a)], draw("A"));

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        let names: Vec<(u32, String)> = run(&doc, true).into_iter().map(|(p, n, _, _)| (p, n)).collect();

        assert_eq!(
            names,
            vec![(1, "B".to_string()), (1, "A".to_string()), (2, "A".to_string())]
        );
    }

    #[test]
    fn test_repeated_invocation_emits_twice() {
        let mut pdf = TestPdfBuilder::new();
        let a = pdf.rgb_image(1, 1, [0, 0, 0]);
        let mut ops = draw("A");
        ops.extend(draw("A"));
        pdf.page(&[("A", a)], ops);

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        assert_eq!(run(&doc, true).len(), 2);
    }

    #[test]
    fn test_ctm_tracks_cm_and_restore() {
        let mut pdf = TestPdfBuilder::new();
        let a = pdf.rgb_image(1, 1, [0, 0, 0]);
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()]),
            Operation::new("cm", vec![50.into(), 0.into(), 0.into(), 25.into(), 0.into(), 0.into()]),
            Operation::new("Do", vec![Object::Name(b"A".to_vec())]),
            Operation::new("Q", vec![]),
            Operation::new("Do", vec![Object::Name(b"A".to_vec())]),
        ];
        pdf.page(&[("A", a)], ops);

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        let scales: Vec<(f32, f32)> = run(&doc, true).into_iter().map(|(_, _, _, s)| s).collect();

        assert_eq!(scales, vec![(100.0, 50.0), (1.0, 1.0)]);
    }

    #[test]
    fn test_form_xobjects_are_followed() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        let form = pdf.form(&[("Inner", img)], draw("Inner"));
        let mut ops = draw("Outer");
        ops.extend(draw("Fm0"));
        pdf.page(&[("Outer", img), ("Fm0", form)], ops);

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();

        let seen = run(&doc, true);
        let names: Vec<(&str, usize)> = seen.iter().map(|(_, n, d, _)| (n.as_str(), *d)).collect();
        assert_eq!(names, vec![("Outer", 0), ("Inner", 1)]);

        assert_eq!(run(&doc, false).len(), 1);
    }

    #[test]
    fn test_form_without_resources_uses_parent() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        let form = pdf.form(&[], draw("Im0"));
        pdf.page(&[("Im0", img), ("Fm0", form)], draw("Fm0"));

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        assert_eq!(run(&doc, true).len(), 1);
    }

    #[test]
    fn test_self_referencing_form_terminates() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        let form = pdf.recursive_form("Self", &[("Im0", img)]);
        pdf.page(&[("Fm0", form)], draw("Fm0"));

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        assert_eq!(run(&doc, true).len(), 1);
    }

    #[test]
    fn test_missing_xobject_is_ignored() {
        let mut pdf = TestPdfBuilder::new();
        pdf.page(&[], draw("Nope"));

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        assert!(run(&doc, true).is_empty());
    }

    #[test]
    fn test_unsubscribed_listener_gets_nothing() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        pdf.page(&[("Im0", img)], draw("Im0"));
        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();

        let mut deaf = Deaf;
        let mut processor = ContentProcessor::new(&doc, &mut deaf);
        processor.process_page(1, doc.page_id(1).unwrap()).unwrap();
        assert_eq!(processor.events_delivered(), 0);
    }

    #[test]
    fn test_inline_images_are_reported_in_order() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        pdf.page_with_content(
            &[("Im0", img)],
            b"q 10 0 0 10 0 0 cm /Im0 Do Q\nq 5 0 0 5 0 0 cm BI /W 1 /H 1 /CS /RGB /BPC 8 ID \x00\xff\x00 EI Q\n/Im0 Do",
        );

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        let seen = run(&doc, true);
        let names: Vec<(&str, (f32, f32))> = seen.iter().map(|(_, n, _, s)| (n.as_str(), *s)).collect();

        assert_eq!(names, vec![("Im0", (10.0, 10.0)), ("", (5.0, 5.0)), ("Im0", (1.0, 1.0))]);
    }

    #[test]
    fn test_filtered_inline_image_keeps_rest_of_page() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        pdf.page_with_content(
            &[("Im0", img)],
            b"/Im0 Do BI /W 1 /H 1 /CS /RGB /BPC 8 /F /AHx ID 00ff00> EI /Im0 Do",
        );

        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();
        assert_eq!(run(&doc, true).len(), 3);
    }

    #[test]
    fn test_unterminated_inline_image_is_content_error() {
        let mut pdf = TestPdfBuilder::new();
        let img = pdf.rgb_image(1, 1, [0, 0, 0]);
        pdf.page_with_content(&[("Im0", img)], b"/Im0 Do BI /W 1 /H 1 /F /Fl ID xyz");
        let doc = PdfDocument::load_mem(&pdf.build(), "").unwrap();

        let mut recorder = Recorder::default();
        let err = ContentProcessor::new(&doc, &mut recorder)
            .process_page(1, doc.page_id(1).unwrap())
            .unwrap_err();

        assert!(matches!(err, crate::ExtractError::Pdf(PdfError::Content { page: 1, .. })));
        assert_eq!(recorder.seen.len(), 1);
    }
}
