//! Mind-map ingestion and tree flattening
//!
//! Accepts XMind documents, either a `.xmind` archive (a zip whose
//! `content.json` member holds the sheet array) or the bare JSON, and
//! flattens each sheet's topic tree into enumerated root-to-leaf path
//! strings for the requirement prompt.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CasegenError, Result};

const PATH_SEPARATOR: &str = " - ";
const DOC_HEADER: &str = "# 需求路径";
const NO_PATHS_SENTINEL: &str = "未找到有效的需求路径";
const ARCHIVE_CONTENT_MEMBER: &str = "content.json";
const ZIP_MAGIC: &[u8] = b"PK";

/// One sheet of the mind-map document
#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    /// Sheet name (not used for flattening; the root topic's title seeds
    /// the path instead)
    #[serde(default)]
    pub title: String,

    #[serde(rename = "rootTopic", default)]
    pub root_topic: Option<Topic>,
}

/// A topic node; ownership is strictly hierarchical
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Topic {
    pub title: String,
    pub labels: Vec<String>,
    pub markers: Vec<Marker>,
    pub children: Option<Children>,
    pub notes: Option<Notes>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Children {
    pub attached: Vec<Topic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Marker {
    #[serde(rename = "markerId", default)]
    pub marker_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Notes {
    pub plain: Option<PlainNote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlainNote {
    pub content: String,
}

impl Topic {
    fn subtopics(&self) -> &[Topic] {
        self.children
            .as_ref()
            .map(|children| children.attached.as_slice())
            .unwrap_or(&[])
    }

    fn note_text(&self) -> Option<&str> {
        let text = self.notes.as_ref()?.plain.as_ref()?.content.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Title decorated with `#labels` and priority markers.
    ///
    /// A title-less node has no label at all: it contributes nothing to
    /// the path, but traversal continues through it.
    fn display_label(&self) -> Option<String> {
        if self.title.is_empty() {
            return None;
        }

        let mut label = self.title.clone();

        if !self.labels.is_empty() {
            let tags: Vec<String> = self.labels.iter().map(|l| format!("#{}", l)).collect();
            label.push_str(&format!(" ({})", tags.join(", ")));
        }

        for marker in &self.markers {
            if marker.marker_id.contains("priority") {
                if let Some(num) = marker.marker_id.rsplit('-').next() {
                    label.push_str(&format!(" [优先级:{}]", num));
                }
            }
        }

        Some(label)
    }
}

/// Flatten every sheet into root-to-leaf path strings.
///
/// Depth-first, pre-order; each sheet seeds the path with its root
/// topic's title and descends into the root's children. Internal nodes
/// never emit; a leaf emits its joined path plus optional note and link
/// annotation strings.
pub fn flatten_sheets(sheets: &[Sheet]) -> Vec<String> {
    let mut paths = Vec::new();

    for sheet in sheets {
        let Some(root) = &sheet.root_topic else {
            continue;
        };
        if root.title.is_empty() {
            continue;
        }

        let seed = vec![root.title.clone()];
        for topic in root.subtopics() {
            walk(topic, &seed, &mut paths);
        }
    }

    paths
}

fn walk(topic: &Topic, inherited: &[String], out: &mut Vec<String>) {
    let mut path = inherited.to_vec();
    if let Some(label) = topic.display_label() {
        path.push(label);
    }

    let subtopics = topic.subtopics();
    if !subtopics.is_empty() {
        for child in subtopics {
            walk(child, &path, out);
        }
        return;
    }

    if path.is_empty() {
        return;
    }

    let joined = path.join(PATH_SEPARATOR);
    out.push(joined.clone());

    if let Some(note) = topic.note_text() {
        out.push(format!("{} (备注: {})", joined, note));
    }
    if let Some(link) = topic.href.as_deref().filter(|href| !href.is_empty()) {
        out.push(format!("{} (链接: {})", joined, link));
    }
}

/// Render the flattened paths as a numbered requirement document.
///
/// Never returns an empty document: no paths yields the sentinel line.
pub fn render_document(paths: &[String]) -> String {
    if paths.is_empty() {
        return NO_PATHS_SENTINEL.to_string();
    }

    let mut doc = format!("{}\n\n", DOC_HEADER);
    for (index, path) in paths.iter().enumerate() {
        doc.push_str(&format!("{}. {}\n", index + 1, path));
    }
    doc
}

/// Load a mind-map document from disk.
///
/// `.xmind` archives are recognized by the zip magic and read through
/// their `content.json` member; anything else is parsed as bare JSON.
pub fn load_document(path: &Path) -> Result<Vec<Sheet>> {
    let bytes = std::fs::read(path)?;

    let content = if bytes.starts_with(ZIP_MAGIC) {
        read_archive_content(&bytes)?
    } else {
        bytes
    };

    parse_sheets(&content)
}

fn parse_sheets(content: &[u8]) -> Result<Vec<Sheet>> {
    serde_json::from_slice(content).map_err(|e| CasegenError::MindMap {
        reason: format!("invalid mind-map document: {}", e),
    })
}

fn read_archive_content(bytes: &[u8]) -> Result<Vec<u8>> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| CasegenError::MindMap {
        reason: format!("unreadable archive: {}", e),
    })?;

    let mut entry = archive
        .by_name(ARCHIVE_CONTENT_MEMBER)
        .map_err(|e| CasegenError::MindMap {
            reason: format!("archive has no {}: {}", ARCHIVE_CONTENT_MEMBER, e),
        })?;

    let mut content = Vec::new();
    entry.read_to_end(&mut content)?;
    Ok(content)
}

/// Flatten a mind-map file into the numbered requirement document.
///
/// Never propagates failures past this boundary: any load or parse error
/// is rendered as a single diagnostic line instead.
pub fn flatten_file(path: &Path) -> String {
    match load_document(path) {
        Ok(sheets) => render_document(&flatten_sheets(&sheets)),
        Err(err) => format!("思维导图解析失败: {}", err),
    }
}

/// Parse sheets out of an in-memory JSON value (used by callers that
/// already hold the decoded document).
pub fn sheets_from_value(value: Value) -> Result<Vec<Sheet>> {
    serde_json::from_value(value).map_err(|e| CasegenError::MindMap {
        reason: format!("invalid mind-map document: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sheets(value: Value) -> Vec<Sheet> {
        sheets_from_value(value).unwrap()
    }

    /// Sheet "S" with topic "A" and leaf child "B"
    fn simple_tree() -> Vec<Sheet> {
        sheets(json!([{
            "title": "Sheet 1",
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "title": "A",
                    "children": {"attached": [{"title": "B"}]}
                }]}
            }
        }]))
    }

    #[test]
    fn single_branch_yields_one_path() {
        let paths = flatten_sheets(&simple_tree());
        assert_eq!(paths, vec!["S - A - B".to_string()]);
    }

    #[test]
    fn internal_nodes_never_emit() {
        let paths = flatten_sheets(&simple_tree());
        assert!(!paths.iter().any(|p| p == "S - A"));
    }

    #[test]
    fn flattening_is_idempotent() {
        let tree = simple_tree();
        assert_eq!(flatten_sheets(&tree), flatten_sheets(&tree));
    }

    #[test]
    fn leaf_note_emits_second_string() {
        let tree = sheets(json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "title": "A",
                    "notes": {"plain": {"content": "n"}}
                }]}
            }
        }]));

        let paths = flatten_sheets(&tree);
        assert_eq!(paths, vec!["S - A".to_string(), "S - A (备注: n)".to_string()]);
    }

    #[test]
    fn leaf_link_emits_annotation() {
        let tree = sheets(json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "title": "A",
                    "href": "https://example.com/prd"
                }]}
            }
        }]));

        let paths = flatten_sheets(&tree);
        assert_eq!(
            paths,
            vec![
                "S - A".to_string(),
                "S - A (链接: https://example.com/prd)".to_string(),
            ]
        );
    }

    #[test]
    fn priority_marker_decorates_label() {
        let tree = sheets(json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "title": "A",
                    "markers": [{"markerId": "priority-1"}]
                }]}
            }
        }]));

        let paths = flatten_sheets(&tree);
        assert_eq!(paths, vec!["S - A [优先级:1]".to_string()]);
    }

    #[test]
    fn non_priority_markers_are_ignored() {
        let tree = sheets(json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "title": "A",
                    "markers": [{"markerId": "flag-red"}, {"markerId": "priority-2"}]
                }]}
            }
        }]));

        let paths = flatten_sheets(&tree);
        assert_eq!(paths, vec!["S - A [优先级:2]".to_string()]);
    }

    #[test]
    fn labels_append_hash_tags() {
        let tree = sheets(json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "title": "A",
                    "labels": ["login", "p0"]
                }]}
            }
        }]));

        let paths = flatten_sheets(&tree);
        assert_eq!(paths, vec!["S - A (#login, #p0)".to_string()]);
    }

    #[test]
    fn missing_title_skips_segment_without_aborting() {
        let tree = sheets(json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{
                    "children": {"attached": [{"title": "B"}]}
                }]}
            }
        }]));

        let paths = flatten_sheets(&tree);
        assert_eq!(paths, vec!["S - B".to_string()]);
    }

    #[test]
    fn sheets_are_processed_independently_in_order() {
        let tree = sheets(json!([
            {"rootTopic": {"title": "S1", "children": {"attached": [{"title": "A"}]}}},
            {"rootTopic": {"title": "S2", "children": {"attached": [{"title": "B"}]}}}
        ]));

        let paths = flatten_sheets(&tree);
        assert_eq!(paths, vec!["S1 - A".to_string(), "S2 - B".to_string()]);
    }

    #[test]
    fn empty_tree_renders_sentinel() {
        assert_eq!(render_document(&[]), NO_PATHS_SENTINEL);

        let no_topics = sheets(json!([{"rootTopic": {"title": "S"}}]));
        assert_eq!(render_document(&flatten_sheets(&no_topics)), NO_PATHS_SENTINEL);
    }

    #[test]
    fn document_is_numbered_with_header() {
        let doc = render_document(&["S - A".to_string(), "S - B".to_string()]);
        assert_eq!(doc, "# 需求路径\n\n1. S - A\n2. S - B\n");
    }

    #[test]
    fn flatten_file_converts_errors_to_diagnostic_string() {
        let result = flatten_file(Path::new("/nonexistent/map.xmind"));
        assert!(result.starts_with("思维导图解析失败:"), "{result}");
    }

    #[test]
    fn flatten_file_reads_bare_json() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{"title": "A"}]}
            }
        }]);
        file.write_all(content.to_string().as_bytes()).unwrap();

        let doc = flatten_file(file.path());
        assert_eq!(doc, "# 需求路径\n\n1. S - A\n");
    }

    #[test]
    fn flatten_file_reads_xmind_archive() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let file = tempfile::NamedTempFile::new().unwrap();
        let mut archive = zip::ZipWriter::new(file.reopen().unwrap());
        archive
            .start_file("content.json", SimpleFileOptions::default())
            .unwrap();
        let content = json!([{
            "rootTopic": {
                "title": "S",
                "children": {"attached": [{"title": "A", "children": {"attached": [{"title": "B"}]}}]}
            }
        }]);
        archive.write_all(content.to_string().as_bytes()).unwrap();
        archive.finish().unwrap();

        let doc = flatten_file(file.path());
        assert_eq!(doc, "# 需求路径\n\n1. S - A - B\n");
    }
}
