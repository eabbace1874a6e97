//! Conversion entry points: SVG text in, vector drawable text or a
//! diagnostic report out.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use tracing::{debug, info_span};

use crate::diagnostic::{Diagnostic, Level, format_diagnostics};
use crate::error::ConvertError;
use crate::svg::{SvgTree, TreeBuilder};
use crate::xml::parse_xml;

/// Warnings fail a conversion just like errors.
pub const WARNINGS_ARE_FATAL: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub success: bool,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl ConversionResult {
    fn ok(content: String) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }
}

/// Converts one SVG document. `filename` is only used for logging.
pub fn convert(text: &str, filename: &str) -> ConversionResult {
    let span = info_span!("convert", file = filename);
    let _guard = span.enter();
    match catch_unwind(AssertUnwindSafe(|| convert_checked(text))) {
        Ok(Ok(content)) => ConversionResult::ok(content),
        Ok(Err(error)) => ConversionResult::failed(error.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Unexpected failure during conversion".to_string());
            ConversionResult::failed(message)
        }
    }
}

fn convert_checked(text: &str) -> Result<String, ConvertError> {
    let tree = convert_to_tree(text)?;
    let fatal = tree
        .diagnostics()
        .iter()
        .any(|diagnostic| WARNINGS_ARE_FATAL || diagnostic.level == Level::Error);
    if fatal {
        return Err(ConvertError::Diagnostics(format_diagnostics(tree.diagnostics())));
    }
    Ok(tree.write_xml())
}

/// Parses, resolves, flattens and validates `text`. The returned tree may
/// still carry diagnostics; failures that prevent building a tree at all
/// are returned as errors.
pub fn convert_to_tree(text: &str) -> Result<SvgTree, ConvertError> {
    let document = parse_xml(text);
    let xml_diagnostics: Vec<Diagnostic> = document
        .diagnostics()
        .iter()
        .map(|diagnostic| Diagnostic::error(diagnostic.line, diagnostic.message.clone()))
        .collect();
    let Some(root) = document.root() else {
        return Err(ConvertError::Xml(format_diagnostics(&xml_diagnostics)));
    };
    let root_element = document
        .element(root)
        .ok_or_else(|| ConvertError::Xml(format_diagnostics(&xml_diagnostics)))?;
    if root_element.name != "svg" {
        let error = Diagnostic::error(root_element.line, "Not a proper SVG file");
        return Err(ConvertError::Diagnostics(format_diagnostics(&[error])));
    }

    let mut tree = SvgTree::new();
    for diagnostic in xml_diagnostics {
        tree.log_error(diagnostic.line, diagnostic.message);
    }
    if !tree.parse_dimensions(&document, root) {
        tree.log_error(root_element.line, "Missing \"viewBox\" in <svg> element");
        return Err(ConvertError::Diagnostics(format_diagnostics(tree.diagnostics())));
    }

    TreeBuilder::new(&document, &mut tree).build(root);
    debug!(nodes = tree.node_count(), "built svg tree");
    tree.resolve_gradient_references();
    tree.resolve_use_references();
    tree.handle_clip_paths();
    tree.apply_style_classes();
    tree.flatten()?;
    tree.validate();
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="24" height="24">
  <rect x="2" y="2" width="20" height="20" fill="#ff0000"/>
</svg>"##;

    #[test]
    fn rect_becomes_single_filled_path() {
        let result = convert(RECT, "rect.svg");
        assert!(result.success, "{:?}", result.error);
        let content = result.content.unwrap();
        assert_eq!(content.matches("<path").count(), 1);
        assert!(content.contains("android:fillColor=\"#FF0000\""));
        assert!(content.contains("android:pathData=\"M2,2h20v20h-20v-20z\""));
        assert!(!content.contains("strokeWidth"));
        assert!(content.contains("android:width=\"24dp\""));
        assert!(!content.contains("xmlns:aapt"));
    }

    #[test]
    fn warnings_fail_the_conversion() {
        assert!(WARNINGS_ARE_FATAL);
        let svg = r#"<svg viewBox="0 0 10 10"><rect width="4" height="4"/><text>hi</text></svg>"#;
        let result = convert(svg, "text.svg");
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("WARNING @ line 1: <text> is not supported")
        );
    }

    #[test]
    fn rejects_non_svg_root() {
        let result = convert("<html/>", "page.html");
        assert_eq!(
            result.error.as_deref(),
            Some("ERROR @ line 1: Not a proper SVG file")
        );
    }

    #[test]
    fn reports_missing_view_box() {
        let result = convert("<svg><rect width=\"1\" height=\"1\"/></svg>", "a.svg");
        assert_eq!(
            result.error.as_deref(),
            Some("ERROR @ line 1: Missing \"viewBox\" in <svg> element")
        );
    }

    #[test]
    fn empty_document_has_no_content() {
        let result = convert(r#"<svg viewBox="0 0 4 4"><g/></svg>"#, "empty.svg");
        assert_eq!(result.error.as_deref(), Some("ERROR: No vector content found"));
    }

    #[test]
    fn missing_root_is_reported() {
        let result = convert("   ", "blank.svg");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No root element"));
    }

    #[test]
    fn invalid_path_data_fails() {
        let svg = r#"<svg viewBox="0 0 4 4"><path d="M0 0 L1"/></svg>"#;
        let result = convert(svg, "bad.svg");
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid path data @ line 1"));
    }
}
