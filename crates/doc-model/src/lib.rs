use serde::{Deserialize, Serialize};

mod container;

pub use container::{
    EmbedKind, HideState, Node, NodeContent, NodeId, RenderSurface, ViewerTree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Image,
    PaginatedDocument,
}

impl DocumentKind {
    pub fn for_locator(locator: &str) -> Self {
        let path = locator
            .split(['?', '#'])
            .next()
            .unwrap_or(locator);

        if path.to_ascii_lowercase().ends_with(".pdf") {
            Self::PaginatedDocument
        } else {
            Self::Image
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerRequest {
    pub source_url: String,
    pub kind: DocumentKind,
}

impl ViewerRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        let source_url = source_url.into();
        let kind = DocumentKind::for_locator(&source_url);
        Self { source_url, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerPhase {
    Closed,
    Loading,
    Rendered,
    Error,
}

impl ViewerPhase {
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

pub const THEME_PREFERENCE_KEY: &str = "dark_mode";
pub const DARK_STYLE_HOOK: &str = "dark";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThemePreference {
    pub dark_mode: bool,
}

impl ThemePreference {
    pub fn style_hook(self) -> Option<&'static str> {
        self.dark_mode.then_some(DARK_STYLE_HOOK)
    }

    pub fn apply_to_hooks(self, hooks: &mut Vec<String>) {
        hooks.retain(|hook| hook != DARK_STYLE_HOOK);
        if self.dark_mode {
            hooks.push(DARK_STYLE_HOOK.to_owned());
        }
    }

    pub fn toggled(self) -> Self {
        Self { dark_mode: !self.dark_mode }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_extension_selects_paginated_document_kind() {
        assert_eq!(
            DocumentKind::for_locator("/certificates/CERTIFICATE.pdf"),
            DocumentKind::PaginatedDocument
        );
        assert_eq!(
            DocumentKind::for_locator("https://example.com/cert.PDF"),
            DocumentKind::PaginatedDocument
        );
        assert_eq!(
            DocumentKind::for_locator("https://example.com/cert.pdf?download=1"),
            DocumentKind::PaginatedDocument
        );
    }

    #[test]
    fn non_pdf_locator_selects_image_kind() {
        assert_eq!(DocumentKind::for_locator("/certificates/badge.png"), DocumentKind::Image);
        assert_eq!(DocumentKind::for_locator("photo.jpg"), DocumentKind::Image);
        assert_eq!(DocumentKind::for_locator("no-extension"), DocumentKind::Image);
    }

    #[test]
    fn request_derives_kind_from_locator() {
        let request = ViewerRequest::new("/certificates/CERTIFICATE.pdf");
        assert_eq!(request.kind, DocumentKind::PaginatedDocument);

        let request = ViewerRequest::new("/certificates/badge.png");
        assert_eq!(request.kind, DocumentKind::Image);
    }

    #[test]
    fn theme_preference_mirrors_to_style_hooks() {
        let mut hooks = vec!["menu-open".to_owned()];

        ThemePreference { dark_mode: true }.apply_to_hooks(&mut hooks);
        assert_eq!(hooks, vec!["menu-open".to_owned(), DARK_STYLE_HOOK.to_owned()]);

        ThemePreference { dark_mode: false }.apply_to_hooks(&mut hooks);
        assert_eq!(hooks, vec!["menu-open".to_owned()]);
    }

    #[test]
    fn closed_phase_is_not_open() {
        assert!(!ViewerPhase::Closed.is_open());
        assert!(ViewerPhase::Loading.is_open());
        assert!(ViewerPhase::Rendered.is_open());
        assert!(ViewerPhase::Error.is_open());
    }
}
