//! Document loaders that turn uploaded files into pages.
//!
//! [`ExtensionLoader`] picks a loader from the file extension. Plain text is
//! always available; PDF needs the `pdf` feature.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::Page;
use crate::error::{RagError, Result};

/// Reads a file into numbered pages.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load `path`, returning its pages in order. Page numbers start at 1.
    async fn load(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Loads UTF-8 text files. Form feeds (`\x0c`) separate pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl TextLoader {
    /// Split already-decoded text into pages.
    pub fn pages_from_text(text: &str) -> Vec<Page> {
        text.split('\x0c')
            .enumerate()
            .map(|(i, page)| Page { text: page.to_string(), page: i as u32 + 1 })
            .collect()
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let bytes = tokio::fs::read(path).await.map_err(|e| RagError::LoaderError {
            loader: "text".to_string(),
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| RagError::LoaderError {
            loader: "text".to_string(),
            message: format!("{} is not valid UTF-8: {e}", path.display()),
        })?;
        let pages = Self::pages_from_text(&text);
        debug!(path = %path.display(), page_count = pages.len(), "loaded text document");
        Ok(pages)
    }
}

/// Loads PDF files, one [`Page`] per PDF page.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

#[cfg(feature = "pdf")]
#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let bytes = tokio::fs::read(path).await.map_err(|e| RagError::LoaderError {
            loader: "pdf".to_string(),
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let texts = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
            .map_err(|e| RagError::LoaderError { loader: "pdf".to_string(), message: e.to_string() })?
            .map_err(|e| RagError::LoaderError {
                loader: "pdf".to_string(),
                message: format!("failed to extract text from {}: {e}", path.display()),
            })?;
        let pages: Vec<Page> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page { text, page: i as u32 + 1 })
            .collect();
        debug!(path = %path.display(), page_count = pages.len(), "loaded pdf document");
        Ok(pages)
    }
}

/// Dispatches on the lowercased file extension.
///
/// Files with no registered extension go to the fallback, a [`TextLoader`]
/// unless replaced.
#[derive(Clone)]
pub struct ExtensionLoader {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
    fallback: Arc<dyn DocumentLoader>,
}

impl ExtensionLoader {
    /// Text for everything, plus [`PdfLoader`] for `.pdf` when built with
    /// the `pdf` feature.
    pub fn new() -> Self {
        let loader = Self { loaders: HashMap::new(), fallback: Arc::new(TextLoader) };
        #[cfg(feature = "pdf")]
        let loader = loader.with_loader("pdf", Arc::new(PdfLoader));
        loader
    }

    /// Route files ending in `.{extension}` to `loader`.
    pub fn with_loader(mut self, extension: &str, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loaders.insert(extension.trim_start_matches('.').to_ascii_lowercase(), loader);
        self
    }

    pub fn with_fallback(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.fallback = loader;
        self
    }

    fn loader_for(&self, path: &Path) -> &Arc<dyn DocumentLoader> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.loaders.get(&ext.to_ascii_lowercase()))
            .unwrap_or(&self.fallback)
    }
}

impl Default for ExtensionLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentLoader for ExtensionLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        self.loader_for(path).load(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl DocumentLoader for Fixed {
        async fn load(&self, _path: &Path) -> Result<Vec<Page>> {
            Ok(vec![Page { text: self.0.to_string(), page: 1 }])
        }
    }

    #[tokio::test]
    async fn extension_picks_the_loader() {
        let loader = ExtensionLoader::new()
            .with_loader(".DOCX", Arc::new(Fixed("docx")))
            .with_fallback(Arc::new(Fixed("fallback")));

        let pages = loader.load(Path::new("/tmp/report.docx")).await.unwrap();
        assert_eq!(pages[0].text, "docx");
        let pages = loader.load(Path::new("/tmp/Report.DocX")).await.unwrap();
        assert_eq!(pages[0].text, "docx");
        let pages = loader.load(Path::new("/tmp/notes")).await.unwrap();
        assert_eq!(pages[0].text, "fallback");
    }

    #[tokio::test]
    async fn default_loader_reads_text() {
        let path = std::env::temp_dir().join(format!("kt-rag-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "first\x0csecond").await.unwrap();
        let pages = ExtensionLoader::default().load(&path).await;
        tokio::fs::remove_file(&path).await.ok();
        let pages = pages.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], Page { text: "second".into(), page: 2 });
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn pdf_extension_routes_to_the_pdf_loader() {
        let path = std::env::temp_dir().join(format!("kt-rag-{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"not a pdf").await.unwrap();
        let result = ExtensionLoader::default().load(&path).await;
        tokio::fs::remove_file(&path).await.ok();
        match result {
            Err(RagError::LoaderError { loader, .. }) => assert_eq!(loader, "pdf"),
            other => panic!("expected a pdf loader error, got {other:?}"),
        }
    }

    #[test]
    fn form_feeds_split_pages() {
        let pages = TextLoader::pages_from_text("one\x0ctwo\x0cthree");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], Page { text: "three".into(), page: 3 });
    }

    #[test]
    fn text_without_form_feed_is_one_page() {
        let pages = TextLoader::pages_from_text("just text");
        assert_eq!(pages, vec![Page { text: "just text".into(), page: 1 }]);
    }

    #[tokio::test]
    async fn missing_file_is_a_loader_error() {
        let err = TextLoader.load(Path::new("/definitely/not/here.txt")).await.unwrap_err();
        assert!(matches!(err, RagError::LoaderError { .. }));
    }
}
