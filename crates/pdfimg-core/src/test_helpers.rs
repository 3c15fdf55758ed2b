//! Builders for small PDF fixtures used in unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Paint the XObject `name` into a 100x100 square.
pub(crate) fn draw(name: &str) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("cm", vec![100.into(), 0.into(), 0.into(), 100.into(), 0.into(), 0.into()]),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

fn xobject_dict(xobjects: &[(&str, ObjectId)]) -> Dictionary {
    let mut dict = Dictionary::new();
    for (name, id) in xobjects {
        dict.set(*name, Object::Reference(*id));
    }
    dict
}

fn encode(operations: Vec<Operation>) -> Vec<u8> {
    Content { operations }.encode().unwrap()
}

/// Incrementally builds a PDF document in memory.
pub(crate) struct TestPdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    inherited: Option<Dictionary>,
}

impl TestPdfBuilder {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self { doc, pages_id, kids: Vec::new(), inherited: None }
    }

    /// Uncompressed 8-bit DeviceRGB image filled with one color.
    pub(crate) fn rgb_image(&mut self, width: u32, height: u32, rgb: [u8; 3]) -> ObjectId {
        let data = rgb.repeat((width * height) as usize);
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            data,
        ))
    }

    /// Uncompressed 8-bit DeviceGray image filled with one level.
    pub(crate) fn gray_image(&mut self, width: u32, height: u32, level: u8) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![level; (width * height) as usize],
        ))
    }

    /// Image stream with a filter we do not decode.
    pub(crate) fn jbig2_image(&mut self) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
                "Filter" => "JBIG2Decode",
            },
            vec![0; 8],
        ))
    }

    /// Form XObject with its own resources (none if `xobjects` is empty).
    pub(crate) fn form(&mut self, xobjects: &[(&str, ObjectId)], operations: Vec<Operation>) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        };
        if !xobjects.is_empty() {
            dict.set("Resources", dictionary! { "XObject" => xobject_dict(xobjects) });
        }
        self.doc.add_object(Stream::new(dict, encode(operations)))
    }

    /// Form that draws `xobjects` and then itself under `self_name`.
    pub(crate) fn recursive_form(&mut self, self_name: &str, xobjects: &[(&str, ObjectId)]) -> ObjectId {
        let id = self.doc.new_object_id();
        let mut all = xobjects.to_vec();
        all.push((self_name, id));

        let mut operations = Vec::new();
        for (name, _) in &all {
            operations.extend(draw(name));
        }

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
            "Resources" => dictionary! { "XObject" => xobject_dict(&all) },
        };
        self.doc.objects.insert(id, Object::Stream(Stream::new(dict, encode(operations))));
        id
    }

    /// Put XObject resources on the page tree root for pages to inherit.
    pub(crate) fn inherit_xobjects(&mut self, xobjects: &[(&str, ObjectId)]) {
        self.inherited = Some(dictionary! { "XObject" => xobject_dict(xobjects) });
    }

    /// Add a page with its own XObject resources.
    pub(crate) fn page(&mut self, xobjects: &[(&str, ObjectId)], operations: Vec<Operation>) -> ObjectId {
        let resources = dictionary! { "XObject" => xobject_dict(xobjects) };
        self.add_page(Some(resources), encode(operations))
    }

    /// Add a page whose content stream is written out verbatim.
    pub(crate) fn page_with_content(&mut self, xobjects: &[(&str, ObjectId)], content: &[u8]) -> ObjectId {
        let resources = dictionary! { "XObject" => xobject_dict(xobjects) };
        self.add_page(Some(resources), content.to_vec())
    }

    /// Add a page that relies on inherited resources.
    pub(crate) fn page_without_resources(&mut self, operations: Vec<Operation>) -> ObjectId {
        self.add_page(None, encode(operations))
    }

    fn add_page(&mut self, resources: Option<Dictionary>, content: Vec<u8>) -> ObjectId {
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
        };
        if let Some(resources) = resources {
            page.set("Resources", resources);
        }
        let id = self.doc.add_object(page);
        self.kids.push(id.into());
        id
    }

    /// Serialize the document.
    pub(crate) fn build(mut self) -> Vec<u8> {
        self.finish_tree();
        save(&mut self.doc)
    }

    /// Serialize the document with RC4 encryption under `password`.
    pub(crate) fn build_encrypted(mut self, password: &str) -> Vec<u8> {
        self.finish_tree();
        encrypt(&mut self.doc, password);
        save(&mut self.doc)
    }

    fn finish_tree(&mut self) {
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Count" => self.kids.len() as i64,
            "Kids" => std::mem::take(&mut self.kids),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        if let Some(resources) = self.inherited.take() {
            pages.set("Resources", resources);
        }
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
    }
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Apply the standard security handler (revision 2, 40-bit RC4) in place.
fn encrypt(doc: &mut Document, password: &str) {
    let file_id = Object::String(b"pdfimg-fixture-1".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 2,
        "R" => 2,
        "Length" => 40,
        "P" => -4,
        "O" => Object::String(vec![0x55; 32], StringFormat::Hexadecimal),
        "CF" => dictionary! { "StdCF" => dictionary! { "CFM" => "V2" } },
    });
    doc.trailer.set("Encrypt", encrypt_id);

    let key = lopdf::encryption::get_encryption_key(doc, password, false).unwrap();
    let check = rc4(&key, &PASSWORD_PAD);
    doc.get_object_mut(encrypt_id)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("U", Object::String(check, StringFormat::Hexadecimal));

    // RC4 is symmetric, so decrypting plain content encrypts it.
    for (&id, obj) in doc.objects.iter_mut() {
        if id == encrypt_id {
            continue;
        }
        let Ok(encrypted) = lopdf::encryption::decrypt_object(&key, id, &*obj, false) else {
            continue;
        };
        match obj {
            Object::Stream(stream) => stream.set_content(encrypted),
            Object::String(content, _) => *content = encrypted,
            _ => {}
        }
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            byte ^ state[state[i as usize].wrapping_add(state[j as usize]) as usize]
        })
        .collect()
}
