use image::{ImageBuffer, Rgba};
use lopdf::Document;
use std::collections::HashMap;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    /// 1-based page number, the order pages are rendered and displayed in.
    pub number: u32,
    pub intrinsic_size: PageSize,
}

/// Fatal to the whole document: nothing renders after one of these.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("document is password protected; viewing is restricted without re-ingestion of raw bytes")]
    Encrypted,
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("document has no pages")]
    NoPages,
}

/// Per-page render failures. The caller skips the page and continues.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid document handle {0}")]
    InvalidHandle(u64),
    #[error("page index {page_index} out of range (page_count={page_count})")]
    PageOutOfRange { page_index: u32, page_count: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// Decode a raw byte stream into a paginated document and rasterize its
/// pages. Decoding always consumes the complete buffer: container-level
/// permission metadata is stripped by re-ingesting raw bytes instead of
/// deferring to a restricted native viewer.
pub trait DocumentEngine {
    fn decode(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, DecodeError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, RenderError>;
    fn page_handles(&self, handle: DocumentHandle) -> Result<Vec<PageHandle>, RenderError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, RenderError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, RenderError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), RenderError>;
}

#[derive(Debug, Clone)]
struct DecodedDocument {
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DecodedDocument>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, DecodeError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(DecodeError::Encrypted);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or_default();

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(DecodeError::NoPages);
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DecodedDocument, RenderError> {
        self.docs.get(&handle).ok_or(RenderError::InvalidHandle(handle.raw()))
    }
}

impl DocumentEngine for LopdfEngine {
    fn decode(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, DecodeError> {
        let page_sizes = Self::parse_sizes(&bytes)?;
        log::debug!("decoded document with {} pages", page_sizes.len());

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DecodedDocument { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, RenderError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_handles(&self, handle: DocumentHandle) -> Result<Vec<PageHandle>, RenderError> {
        let record = self.record(handle)?;

        Ok(record
            .page_sizes
            .iter()
            .enumerate()
            .map(|(index, size)| PageHandle {
                number: index as u32 + 1,
                intrinsic_size: *size,
            })
            .collect())
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, RenderError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(
            RenderError::PageOutOfRange {
                page_index,
                page_count: record.page_sizes.len() as u32,
            },
        )
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<RgbaImage, RenderError> {
        let page_size = self.page_size(handle, page_index)?;
        let scale = if scale <= 0.0 { 1.0 } else { scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), RenderError> {
        self.docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(RenderError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    pub struct PdfiumEngine {
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, RenderError> {
            let _ = Pdfium::bind_to_system_library().map_err(|err| {
                RenderError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self { inner: LopdfEngine::default() })
        }
    }

    impl DocumentEngine for PdfiumEngine {
        fn decode(&mut self, bytes: Vec<u8>) -> Result<DocumentHandle, DecodeError> {
            self.inner.decode(bytes)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, RenderError> {
            self.inner.page_count(handle)
        }

        fn page_handles(
            &self,
            handle: DocumentHandle,
        ) -> Result<Vec<PageHandle>, RenderError> {
            self.inner.page_handles(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, RenderError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            page_index: u32,
            scale: f32,
        ) -> Result<RgbaImage, RenderError> {
            self.inner.render_page(handle, page_index, scale)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), RenderError> {
            self.inner.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures {
    //! Programmatically built documents for tests. The workspace carries no
    //! binary fixtures; anything that needs a parseable PDF builds one here.

    use lopdf::{dictionary, Document, Object, Stream};

    /// A minimal well-formed PDF with `pages` empty Letter-sized pages.
    pub fn pdf_with_pages(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("in-memory save cannot fail");
        bytes
    }

    /// Valid PDF bytes carrying an `/Encrypt` marker, which the engine
    /// rejects before parsing.
    pub fn encrypted_marker_pdf() -> Vec<u8> {
        let mut bytes = pdf_with_pages(1);
        bytes.extend_from_slice(b"\n%/Encrypt\n");
        bytes
    }

    /// Bytes no PDF parser accepts.
    pub fn corrupt_bytes() -> Vec<u8> {
        b"this is not a pdf".to_vec()
    }
}
