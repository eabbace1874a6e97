use serde::Deserialize;
use svg2vd::{ConversionResult, convert};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertOptions {
    file_name: Option<String>,
}

fn parse_options(options_json: Option<String>) -> Result<ConvertOptions, String> {
    match options_json {
        Some(raw_options) => {
            serde_json::from_str::<ConvertOptions>(&raw_options).map_err(|error| error.to_string())
        }
        None => Ok(ConvertOptions::default()),
    }
}

fn convert_with_options(text: &str, options: ConvertOptions) -> Result<String, String> {
    let file_name = options.file_name.as_deref().unwrap_or("input.svg");
    match convert(text, file_name) {
        ConversionResult {
            success: true,
            content: Some(content),
            ..
        } => Ok(content),
        ConversionResult { error, .. } => Err(error.unwrap_or_default()),
    }
}

/// Converts SVG text into vector drawable XML. Conversion diagnostics are
/// thrown as the error string.
#[wasm_bindgen]
pub fn convert_svg(text: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = parse_options(options_json).map_err(|error| JsValue::from_str(&error))?;
    convert_with_options(text, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{ConvertOptions, convert_with_options, parse_options};

    #[test]
    fn converts_simple_icon() {
        let svg = r##"<svg viewBox="0 0 24 24"><circle cx="12" cy="12" r="10" fill="#fff"/></svg>"##;
        let options = parse_options(Some(r#"{"fileName": "dot.svg"}"#.to_string())).unwrap();
        assert_eq!(options.file_name.as_deref(), Some("dot.svg"));
        let xml = convert_with_options(svg, options).expect("circle should convert");
        assert!(xml.contains("<vector"));
        assert!(xml.contains("android:fillColor=\"#FFFFFF\""));
    }

    #[test]
    fn returns_diagnostics_as_error() {
        let error = convert_with_options("<svg/>", ConvertOptions::default()).unwrap_err();
        assert!(error.contains("viewBox"));
    }

    #[test]
    fn rejects_malformed_options() {
        assert!(parse_options(Some("{".to_string())).is_err());
    }
}
