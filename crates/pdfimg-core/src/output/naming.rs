//! File names for extracted images.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// How extracted image files are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingScheme {
    /// `Page-{page}-Image-{index}.{ext}`
    #[default]
    PageIndex,
    /// 32 random hex characters.
    Random,
}

impl NamingScheme {
    /// Build a namer for a document with `page_digits` digits in its page count.
    pub fn namer(&self, page_digits: usize) -> Box<dyn ImageNamer> {
        match self {
            NamingScheme::PageIndex => Box::new(PageIndexNamer::new(page_digits)),
            NamingScheme::Random => Box::new(RandomNamer::new()),
        }
    }
}

/// Produces a file name for each image saved.
pub trait ImageNamer {
    /// Called before the first image of each page.
    fn start_page(&mut self, _page: u32) {}

    /// Name for the next image, with extension `ext`.
    fn next_name(&mut self, ext: &str) -> String;
}

/// Names images by page number and their position on the page.
pub struct PageIndexNamer {
    digits: usize,
    page: u32,
    count: u32,
}

impl PageIndexNamer {
    pub fn new(digits: usize) -> Self {
        Self { digits, page: 1, count: 0 }
    }
}

impl ImageNamer for PageIndexNamer {
    fn start_page(&mut self, page: u32) {
        self.page = page;
        self.count = 0;
    }

    fn next_name(&mut self, ext: &str) -> String {
        self.count += 1;
        format!(
            "Page-{:0width$}-Image-{:03}.{}",
            self.page,
            self.count,
            ext,
            width = self.digits
        )
    }
}

/// Names images with random identifiers, unique within one run.
#[derive(Default)]
pub struct RandomNamer {
    issued: HashSet<u128>,
}

impl RandomNamer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageNamer for RandomNamer {
    fn next_name(&mut self, ext: &str) -> String {
        let id = loop {
            let candidate: u128 = rand::random();
            if self.issued.insert(candidate) {
                break candidate;
            }
        };
        format!("{:032x}.{}", id, ext)
    }
}
