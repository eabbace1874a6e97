use once_cell::sync::Lazy;
use regex::Regex;

static RGB_FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgba?\(\s*([^,\s)]+)\s*[,\s]\s*([^,\s)]+)\s*[,\s]\s*([^,\s)/]+)\s*(?:[,/]\s*([^,\s)]+)\s*)?\)$")
        .unwrap()
});

/// Converts an SVG color value to the vector drawable notation: `#RRGGBB`
/// for opaque colors, `#AARRGGBB` otherwise. Returns `None` for values that
/// are not colors (`none`, `url(...)`, `currentColor`, garbage).
pub fn svg_color_to_vd(value: &str) -> Option<String> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    if lower == "transparent" {
        return Some("#00000000".to_string());
    }
    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex(hex).map(format_rgba);
    }
    if let Some(caps) = RGB_FUNCTION_RE.captures(&lower) {
        let red = parse_channel(&caps[1])?;
        let green = parse_channel(&caps[2])?;
        let blue = parse_channel(&caps[3])?;
        let alpha = match caps.get(4) {
            Some(alpha) => parse_alpha(alpha.as_str())?,
            None => 255,
        };
        return Some(format_rgba([red, green, blue, alpha]));
    }
    named_color(&lower).map(|rgb| format_rgba([rgb[0], rgb[1], rgb[2], 255]))
}

/// Applies an additional alpha multiplier to a converted color.
pub fn with_alpha(color: &str, alpha: f64) -> String {
    match parse_drawable(color) {
        Some([r, g, b, a]) => {
            let scaled = (f64::from(a) * alpha.clamp(0.0, 1.0)).round() as u8;
            format_rgba([r, g, b, scaled])
        }
        None => color.to_string(),
    }
}

/// True when a converted color has zero alpha, i.e. paints nothing.
pub fn is_transparent(color: &str) -> bool {
    matches!(parse_drawable(color), Some([_, _, _, 0]))
}

pub fn is_opaque_white(color: &str) -> bool {
    matches!(parse_drawable(color), Some([255, 255, 255, 255]))
}

/// Reads a color in drawable notation back into RGBA channels.
fn parse_drawable(color: &str) -> Option<[u8; 4]> {
    let hex = color.strip_prefix('#')?;
    match hex.len() {
        6 => parse_hex(hex),
        8 => parse_hex(hex).map(|[a, r, g, b]| [r, g, b, a]),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |index: usize| u8::from_str_radix(&hex[index..index + 1], 16).ok();
    let byte = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();
    match hex.len() {
        3 => Some([nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17, 255]),
        4 => Some([
            nibble(0)? * 17,
            nibble(1)? * 17,
            nibble(2)? * 17,
            nibble(3)? * 17,
        ]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

fn format_rgba([red, green, blue, alpha]: [u8; 4]) -> String {
    if alpha == 255 {
        format!("#{red:02X}{green:02X}{blue:02X}")
    } else {
        format!("#{alpha:02X}{red:02X}{green:02X}{blue:02X}")
    }
}

fn parse_channel(text: &str) -> Option<u8> {
    let value = match text.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok()? * 255.0 / 100.0,
        None => text.parse::<f64>().ok()?,
    };
    value.is_finite().then(|| value.clamp(0.0, 255.0).round() as u8)
}

fn parse_alpha(text: &str) -> Option<u8> {
    let value = match text.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok()? / 100.0,
        None => text.parse::<f64>().ok()?,
    };
    value
        .is_finite()
        .then(|| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn named_color(name: &str) -> Option<[u8; 3]> {
    NAMED_COLORS
        .binary_search_by(|(candidate, _)| candidate.cmp(&name))
        .ok()
        .map(|index| NAMED_COLORS[index].1)
}

/// CSS named colors, sorted by name.
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("aliceblue", [240, 248, 255]),
    ("antiquewhite", [250, 235, 215]),
    ("aqua", [0, 255, 255]),
    ("aquamarine", [127, 255, 212]),
    ("azure", [240, 255, 255]),
    ("beige", [245, 245, 220]),
    ("bisque", [255, 228, 196]),
    ("black", [0, 0, 0]),
    ("blanchedalmond", [255, 235, 205]),
    ("blue", [0, 0, 255]),
    ("blueviolet", [138, 43, 226]),
    ("brown", [165, 42, 42]),
    ("burlywood", [222, 184, 135]),
    ("cadetblue", [95, 158, 160]),
    ("chartreuse", [127, 255, 0]),
    ("chocolate", [210, 105, 30]),
    ("coral", [255, 127, 80]),
    ("cornflowerblue", [100, 149, 237]),
    ("cornsilk", [255, 248, 220]),
    ("crimson", [220, 20, 60]),
    ("cyan", [0, 255, 255]),
    ("darkblue", [0, 0, 139]),
    ("darkcyan", [0, 139, 139]),
    ("darkgoldenrod", [184, 134, 11]),
    ("darkgray", [169, 169, 169]),
    ("darkgreen", [0, 100, 0]),
    ("darkgrey", [169, 169, 169]),
    ("darkkhaki", [189, 183, 107]),
    ("darkmagenta", [139, 0, 139]),
    ("darkolivegreen", [85, 107, 47]),
    ("darkorange", [255, 140, 0]),
    ("darkorchid", [153, 50, 204]),
    ("darkred", [139, 0, 0]),
    ("darksalmon", [233, 150, 122]),
    ("darkseagreen", [143, 188, 143]),
    ("darkslateblue", [72, 61, 139]),
    ("darkslategray", [47, 79, 79]),
    ("darkslategrey", [47, 79, 79]),
    ("darkturquoise", [0, 206, 209]),
    ("darkviolet", [148, 0, 211]),
    ("deeppink", [255, 20, 147]),
    ("deepskyblue", [0, 191, 255]),
    ("dimgray", [105, 105, 105]),
    ("dimgrey", [105, 105, 105]),
    ("dodgerblue", [30, 144, 255]),
    ("firebrick", [178, 34, 34]),
    ("floralwhite", [255, 250, 240]),
    ("forestgreen", [34, 139, 34]),
    ("fuchsia", [255, 0, 255]),
    ("gainsboro", [220, 220, 220]),
    ("ghostwhite", [248, 248, 255]),
    ("gold", [255, 215, 0]),
    ("goldenrod", [218, 165, 32]),
    ("gray", [128, 128, 128]),
    ("green", [0, 128, 0]),
    ("greenyellow", [173, 255, 47]),
    ("grey", [128, 128, 128]),
    ("honeydew", [240, 255, 240]),
    ("hotpink", [255, 105, 180]),
    ("indianred", [205, 92, 92]),
    ("indigo", [75, 0, 130]),
    ("ivory", [255, 255, 240]),
    ("khaki", [240, 230, 140]),
    ("lavender", [230, 230, 250]),
    ("lavenderblush", [255, 240, 245]),
    ("lawngreen", [124, 252, 0]),
    ("lemonchiffon", [255, 250, 205]),
    ("lightblue", [173, 216, 230]),
    ("lightcoral", [240, 128, 128]),
    ("lightcyan", [224, 255, 255]),
    ("lightgoldenrodyellow", [250, 250, 210]),
    ("lightgray", [211, 211, 211]),
    ("lightgreen", [144, 238, 144]),
    ("lightgrey", [211, 211, 211]),
    ("lightpink", [255, 182, 193]),
    ("lightsalmon", [255, 160, 122]),
    ("lightseagreen", [32, 178, 170]),
    ("lightskyblue", [135, 206, 250]),
    ("lightslategray", [119, 136, 153]),
    ("lightslategrey", [119, 136, 153]),
    ("lightsteelblue", [176, 196, 222]),
    ("lightyellow", [255, 255, 224]),
    ("lime", [0, 255, 0]),
    ("limegreen", [50, 205, 50]),
    ("linen", [250, 240, 230]),
    ("magenta", [255, 0, 255]),
    ("maroon", [128, 0, 0]),
    ("mediumaquamarine", [102, 205, 170]),
    ("mediumblue", [0, 0, 205]),
    ("mediumorchid", [186, 85, 211]),
    ("mediumpurple", [147, 112, 219]),
    ("mediumseagreen", [60, 179, 113]),
    ("mediumslateblue", [123, 104, 238]),
    ("mediumspringgreen", [0, 250, 154]),
    ("mediumturquoise", [72, 209, 204]),
    ("mediumvioletred", [199, 21, 133]),
    ("midnightblue", [25, 25, 112]),
    ("mintcream", [245, 255, 250]),
    ("mistyrose", [255, 228, 225]),
    ("moccasin", [255, 228, 181]),
    ("navajowhite", [255, 222, 173]),
    ("navy", [0, 0, 128]),
    ("oldlace", [253, 245, 230]),
    ("olive", [128, 128, 0]),
    ("olivedrab", [107, 142, 35]),
    ("orange", [255, 165, 0]),
    ("orangered", [255, 69, 0]),
    ("orchid", [218, 112, 214]),
    ("palegoldenrod", [238, 232, 170]),
    ("palegreen", [152, 251, 152]),
    ("paleturquoise", [175, 238, 238]),
    ("palevioletred", [219, 112, 147]),
    ("papayawhip", [255, 239, 213]),
    ("peachpuff", [255, 218, 185]),
    ("peru", [205, 133, 63]),
    ("pink", [255, 192, 203]),
    ("plum", [221, 160, 221]),
    ("powderblue", [176, 224, 230]),
    ("purple", [128, 0, 128]),
    ("rebeccapurple", [102, 51, 153]),
    ("red", [255, 0, 0]),
    ("rosybrown", [188, 143, 143]),
    ("royalblue", [65, 105, 225]),
    ("saddlebrown", [139, 69, 19]),
    ("salmon", [250, 128, 114]),
    ("sandybrown", [244, 164, 96]),
    ("seagreen", [46, 139, 87]),
    ("seashell", [255, 245, 238]),
    ("sienna", [160, 82, 45]),
    ("silver", [192, 192, 192]),
    ("skyblue", [135, 206, 235]),
    ("slateblue", [106, 90, 205]),
    ("slategray", [112, 128, 144]),
    ("slategrey", [112, 128, 144]),
    ("snow", [255, 250, 250]),
    ("springgreen", [0, 255, 127]),
    ("steelblue", [70, 130, 180]),
    ("tan", [210, 180, 140]),
    ("teal", [0, 128, 128]),
    ("thistle", [216, 191, 216]),
    ("tomato", [255, 99, 71]),
    ("turquoise", [64, 224, 208]),
    ("violet", [238, 130, 238]),
    ("wheat", [245, 222, 179]),
    ("white", [255, 255, 255]),
    ("whitesmoke", [245, 245, 245]),
    ("yellow", [255, 255, 0]),
    ("yellowgreen", [154, 205, 50]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_hex_forms() {
        assert_eq!(svg_color_to_vd("#f00").as_deref(), Some("#FF0000"));
        assert_eq!(svg_color_to_vd("#00ff0080").as_deref(), Some("#8000FF00"));
        assert_eq!(svg_color_to_vd("#123456").as_deref(), Some("#123456"));
        assert_eq!(svg_color_to_vd("#12345"), None);
    }

    #[test]
    fn converts_functions_and_names() {
        assert_eq!(
            svg_color_to_vd("rgb(255, 0, 0)").as_deref(),
            Some("#FF0000")
        );
        assert_eq!(
            svg_color_to_vd("rgba(0,0,255,0.5)").as_deref(),
            Some("#800000FF")
        );
        assert_eq!(
            svg_color_to_vd("rgb(100%, 0%, 0%)").as_deref(),
            Some("#FF0000")
        );
        assert_eq!(svg_color_to_vd("White").as_deref(), Some("#FFFFFF"));
        assert_eq!(
            svg_color_to_vd("transparent").as_deref(),
            Some("#00000000")
        );
        assert_eq!(svg_color_to_vd("none"), None);
        assert_eq!(svg_color_to_vd("url(#g)"), None);
    }

    #[test]
    fn named_colors_are_sorted() {
        assert!(NAMED_COLORS.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn alpha_helpers() {
        assert_eq!(with_alpha("#FF0000", 0.5), "#80FF0000");
        assert!(is_opaque_white("#FFFFFF"));
        assert!(!is_opaque_white("#80FFFFFF"));
        assert!(is_transparent("#00000000"));
    }
}
