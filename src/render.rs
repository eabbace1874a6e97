use anyhow::{Context, Result};
use std::path::Path;

/// Writes converted content to `output`, creating parent directories, or to
/// stdout when no path is given.
pub fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn writes_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("icon.xml");
        write_output("<vector/>", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<vector/>");
    }
}
