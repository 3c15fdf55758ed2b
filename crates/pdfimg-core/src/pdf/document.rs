//! Loaded PDF documents and page lookups using lopdf.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::Result;
use crate::error::PdfError;

/// A parsed PDF with at least one page.
pub struct PdfDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    /// Open a PDF file, decrypting it with `password` when needed.
    pub fn open(path: &Path, password: &str) -> Result<Self> {
        let document = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        debug!("Read {}", path.display());
        Self::from_document(document, password)
    }

    /// Load a PDF from bytes, decrypting it with `password` when needed.
    pub fn load_mem(data: &[u8], password: &str) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;
        Self::from_document(document, password)
    }

    fn from_document(mut document: Document, password: &str) -> Result<Self> {
        if document.is_encrypted() {
            if document.decrypt(password).is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF");
        }

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", pages.len());
        Ok(Self { document, pages })
    }

    /// The underlying lopdf document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Number of decimal digits in the page count, used to pad page numbers.
    pub fn page_digits(&self) -> usize {
        self.page_count().to_string().len()
    }

    /// Page numbers (1-indexed) and their object ids, in page order.
    pub fn page_ids(&self) -> impl Iterator<Item = (u32, ObjectId)> + '_ {
        self.pages.iter().map(|(number, id)| (*number, *id))
    }

    /// Object id of a page.
    pub fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages.get(&page).copied().ok_or(PdfError::InvalidPage(page))
    }

    /// Decompressed and concatenated content streams of a page.
    pub fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        Ok(self.document.get_page_content(page_id)?)
    }

    /// Resources dictionary for a page, handling inheritance.
    pub fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut node_id = page_id;
        // Page trees are shallow; the bound only stops malformed Parent cycles.
        for _ in 0..64 {
            let dict = self.document.get_dictionary(node_id).ok()?;

            if let Ok(resources) = dict.get(b"Resources") {
                if let Some(res_dict) = self.resolve_dict(resources) {
                    return Some(res_dict);
                }
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => node_id = *parent_id,
                _ => return None,
            }
        }
        None
    }

    /// Follow a reference (if any) and return the dictionary it points to.
    pub fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.document.dereference(obj) {
            Ok((_, Object::Dictionary(dict))) => Some(dict),
            _ => None,
        }
    }

    /// Follow a reference (if any) and return the object it points to.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Option<(Option<ObjectId>, &'a Object)> {
        self.document.dereference(obj).ok()
    }
}
